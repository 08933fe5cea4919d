//! `RevertDecoder`: turns raw revert bytes into something readable.
//!
//! Decode priority:
//! 1. Empty data          → `RevertKind::Empty`
//! 2. `0x08c379a0` prefix → `RevertKind::RevertString`   (Error(string))
//! 3. `0x4e487b71` prefix → `RevertKind::Panic`          (Panic(uint256))
//! 4. Known rich error    → `RevertKind::Rich`, with any wrapped payload
//!    decoded recursively into `cause`
//! 5. Fallback            → `RevertKind::Raw`

use std::fmt;

use alloy_sol_types::{Panic, Revert as RevertString, SolError};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorCategory, ZeroExError};

/// Wrapped errors nest at most this deep before decoding stops.
const MAX_NESTING: usize = 8;

/// The classified revert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevertKind {
    Empty,
    RevertString {
        message: String,
    },
    Panic {
        code: u64,
        meaning: String,
    },
    Rich {
        /// Solidity error name, e.g. `"OnlyOwnerError"`.
        name: String,
        category: ErrorCategory,
        /// Rendered error with its fields.
        message: String,
    },
    Raw {
        /// The 4-byte selector, hex-encoded without `0x`, or `"none"`.
        selector: String,
    },
}

impl fmt::Display for RevertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty revert"),
            Self::RevertString { message } => write!(f, "reverted: {message}"),
            Self::Panic { code, meaning } => write!(f, "panic 0x{code:02x}: {meaning}"),
            Self::Rich { name, message, .. } => write!(f, "{name}: {message}"),
            Self::Raw { selector } => write!(f, "raw revert (selector 0x{selector})"),
        }
    }
}

/// The result of decoding one revert payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRevert {
    pub kind: RevertKind,
    /// Raw revert bytes, hex-encoded with `0x`.
    pub raw_data: String,
    pub selector: Option<[u8; 4]>,
    pub suggestion: Option<String>,
    /// Decoded payload wrapped inside this error, if any.
    pub cause: Option<Box<DecodedRevert>>,
}

impl DecodedRevert {
    /// Innermost decoded cause (self if nothing is wrapped).
    pub fn root_cause(&self) -> &DecodedRevert {
        let mut current = self;
        while let Some(next) = current.cause.as_deref() {
            current = next;
        }
        current
    }
}

impl fmt::Display for DecodedRevert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(cause) = &self.cause {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }
}

/// Stateless revert decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevertDecoder;

impl RevertDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, data: &[u8]) -> DecodedRevert {
        self.decode_nested(data, 0)
    }

    fn decode_nested(&self, data: &[u8], depth: usize) -> DecodedRevert {
        let raw_data = format!("0x{}", hex::encode(data));
        let selector: Option<[u8; 4]> = data.get(..4).and_then(|s| s.try_into().ok());

        if data.is_empty() {
            return DecodedRevert {
                kind: RevertKind::Empty,
                raw_data,
                selector: None,
                suggestion: Some(
                    "Reverted with no data: missing code, a failed ETH transfer or a static-call write."
                        .into(),
                ),
                cause: None,
            };
        }

        if let Ok(revert) = RevertString::abi_decode(data, false) {
            let suggestion = revert_string_suggestion(&revert.reason);
            return DecodedRevert {
                kind: RevertKind::RevertString { message: revert.reason },
                raw_data,
                selector,
                suggestion,
                cause: None,
            };
        }

        if let Ok(panic) = Panic::abi_decode(data, false) {
            let code = u64::try_from(panic.code).unwrap_or(u64::MAX);
            return DecodedRevert {
                kind: RevertKind::Panic { code, meaning: panic_meaning(code).to_string() },
                raw_data,
                selector,
                suggestion: Some(format!("Solidity assert violation (panic code 0x{code:02x}).")),
                cause: None,
            };
        }

        if let Some(err) = ZeroExError::abi_decode(data) {
            let cause = match err.inner_revert_data() {
                Some(inner) if depth < MAX_NESTING => {
                    Some(Box::new(self.decode_nested(inner, depth + 1)))
                }
                _ => None,
            };
            return DecodedRevert {
                kind: RevertKind::Rich {
                    name: err.name().to_string(),
                    category: err.category(),
                    message: err.to_string(),
                },
                raw_data,
                selector,
                suggestion: rich_error_suggestion(&err),
                cause,
            };
        }

        DecodedRevert {
            kind: RevertKind::Raw {
                selector: selector.map(hex::encode).unwrap_or_else(|| "none".into()),
            },
            raw_data,
            selector,
            suggestion: None,
            cause: None,
        }
    }
}

/// Map a Solidity panic code to a human-readable description.
pub fn panic_meaning(code: u64) -> &'static str {
    match code {
        0x00 => "generic compiler-inserted panic",
        0x01 => "assert() called with false condition",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x31 => ".pop() on empty array",
        0x32 => "out-of-bounds array access",
        _ => "unknown panic code",
    }
}

fn revert_string_suggestion(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    if lower.contains("invalid_sender") {
        Some("Migrations may only be run by the account that deployed them.".into())
    } else if lower.contains("insufficient_balance") {
        Some("The account balance is too low for this transfer.".into())
    } else if lower.contains("allowance") {
        Some("Approve the allowance target before spending tokens.".into())
    } else {
        None
    }
}

fn rich_error_suggestion(err: &ZeroExError) -> Option<String> {
    let hint = match err {
        ZeroExError::OnlyOwner { .. } => "Only the proxy owner may call this function.",
        ZeroExError::NotImplemented { .. } => {
            "No feature is registered for this selector. Run the migration that adds it."
        }
        ZeroExError::NoRollbackHistory { .. } => "The selector has no earlier implementation.",
        ZeroExError::IllegalReentrancy { .. } => {
            "Meta-transaction entry points cannot be re-entered during execution."
        }
        ZeroExError::IncompleteERC20Transform { .. } => {
            "The transformations produced less output than the minimum. Re-quote or lower the minimum."
        }
        ZeroExError::MetaTransactionAlreadyExecuted { .. } => {
            "This meta-transaction was already executed; sign a new one with a fresh salt."
        }
        ZeroExError::MetaTransactionExpired { .. } => "The meta-transaction expired.",
        ZeroExError::SignatureValidation { .. } => "The signature does not match the signer.",
        ZeroExError::UnauthorizedTransformer { .. } => {
            "Only transformers deployed by the configured transformer deployer may run."
        }
        _ => return None,
    };
    Some(hint.to_string())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
