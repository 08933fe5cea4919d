//! Raw revert payloads.

use std::fmt;

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{Panic, Revert as RevertString, SolError};

use crate::errors::ZeroExError;

/// A failed frame: the ABI-encoded revert data, as an EVM would return it.
///
/// Contracts return `Err(Revert)` from [`Contract::execute`](crate::Contract::execute);
/// the host then rolls back every state change made by that frame.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Revert {
    data: Bytes,
}

impl Revert {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// A bare `revert()` with no data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `Error(string)`, as produced by `require(cond, "reason")`.
    pub fn reason(message: impl Into<String>) -> Self {
        Self::new(RevertString { reason: message.into() }.abi_encode())
    }

    /// `Panic(uint256)`.
    pub fn panic(code: u64) -> Self {
        Self::new(Panic { code: U256::from(code) }.abi_encode())
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Typed rich error, if the payload is one.
    pub fn rich(&self) -> Option<ZeroExError> {
        ZeroExError::abi_decode(&self.data)
    }

    /// Revert string, if the payload is `Error(string)`.
    pub fn reason_string(&self) -> Option<String> {
        RevertString::abi_decode(&self.data, false).ok().map(|r| r.reason)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<ZeroExError> for Revert {
    fn from(err: ZeroExError) -> Self {
        Self::new(err.abi_encode())
    }
}

impl fmt::Debug for Revert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rich() {
            Some(err) => write!(f, "Revert({err:?})"),
            None => match self.reason_string() {
                Some(reason) => write!(f, "Revert({reason:?})"),
                None => write!(f, "Revert({})", self.data),
            },
        }
    }
}

impl fmt::Display for Revert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = self.rich() {
            return write!(f, "{}: {err}", err.name());
        }
        if let Some(reason) = self.reason_string() {
            return write!(f, "reverted: {reason}");
        }
        if self.data.is_empty() {
            f.write_str("reverted without data")
        } else {
            write!(f, "reverted with {}", self.data)
        }
    }
}

impl std::error::Error for Revert {}
