//! Rich revert errors raised by the ZeroEx contracts.
//!
//! Every error is ABI-encoded exactly like the Solidity custom error it
//! mirrors (`selector ‖ abi(args)`), so a failure can travel up through any
//! number of frames as raw bytes and still be decoded by the outermost caller.

use std::fmt;

use alloy_primitives::{Address, Bytes, Selector, B256, U256};
use alloy_sol_types::{sol, SolError, SolInterface};
use serde::{Deserialize, Serialize};
use thiserror::Error;

sol! {
    #![sol(all_derives)]

    /// ABI definitions of every rich error.
    interface IZeroExRichErrors {
        // common
        error OnlyCallableBySelfError(address sender);
        error IllegalReentrancyError(bytes4 selector, uint256 reentrancy_flags);

        // ownable
        error OnlyOwnerError(address sender, address owner);
        error TransferOwnerToZeroError();
        error MigrateCallFailedError(address target, bytes result_data);

        // proxy / bootstrap
        error NotImplementedError(bytes4 selector);
        error InvalidBootstrapCallerError(address actual, address expected);
        error InvalidDieCallerError(address actual, address expected);
        error BootstrapCallFailedError(address target, bytes result_data);
        error AlreadyBootstrappedError();

        // function registry
        error NoRollbackHistoryError(bytes4 selector);

        // authorizable
        error SenderNotAuthorizedError(address sender);
        error TargetAlreadyAuthorizedError(address target);
        error TargetNotAuthorizedError(address target);
        error ZeroCantBeAuthorizedError();
        error AuthorizedAddressMismatchError(address authorized, address target);
        error IndexOutOfBoundsError(uint256 index, uint256 length);

        // token spender
        error SpenderERC20TransferFromFailedError(address token, address owner, address to, uint256 amount, bytes error_data);

        // puppets
        error PuppetExecuteFailedError(address puppet, address call_target, bytes call_data, uint256 call_value, bytes error_data);
        error PuppetExecuteWithFailedError(address puppet, address call_target, bytes call_data, bytes error_data);
        error InvalidPuppetInstanceError(address puppet);
        error PuppetNotAcquiredError(address puppet);

        // transform pipeline
        error InsufficientEthAttachedError(uint256 eth_attached, uint256 eth_needed);
        error IncompleteERC20TransformError(address output_token, uint256 output_token_amount, uint256 min_output_token_amount);
        error NegativeTransformERC20OutputError(address output_token, uint256 output_token_lost_amount);
        error UnauthorizedTransformerError(address transformer, address deployer);
        error ERC20TransformerFailedError(address transformer, bytes result_data);
        error OnlyCallableByDeployerError(address caller, address deployer);
        error InvalidExecutionContextError(address actual_context, address expected_context);
        error InvalidTransformDataError(uint8 error_code, bytes transform_data);
        error IncompleteFillSellQuoteError(address sell_token, uint256 sold_amount, uint256 sell_amount);
        error IncompleteFillBuyQuoteError(address buy_token, uint256 bought_amount, uint256 buy_amount);
        error InsufficientProtocolFeeError(uint256 eth_balance, uint256 eth_needed);
        error InvalidERC20AssetDataError(bytes asset_data);
        error InvalidTakerFeeTokenError(address token);

        // meta-transactions
        error InvalidMetaTransactionsArrayLengthsError(uint256 mtx_count, uint256 signature_count);
        error MetaTransactionUnsupportedFunctionError(bytes32 mtx_hash, bytes4 selector);
        error MetaTransactionWrongSenderError(bytes32 mtx_hash, address sender, address expected_sender);
        error MetaTransactionExpiredError(bytes32 mtx_hash, uint256 time, uint256 expiration_time);
        error MetaTransactionGasPriceError(bytes32 mtx_hash, uint256 gas_price, uint256 min_gas_price, uint256 max_gas_price);
        error MetaTransactionInsufficientEthError(bytes32 mtx_hash, uint256 eth_balance, uint256 eth_required);
        error MetaTransactionInvalidSignatureError(bytes32 mtx_hash, bytes signature, bytes err_data);
        error MetaTransactionAlreadyExecutedError(bytes32 mtx_hash, uint256 executed_block_number);
        error MetaTransactionCallFailedError(bytes32 mtx_hash, bytes call_data, bytes return_data);

        // signatures
        error SignatureValidationError(uint8 code, bytes32 hash, address signer_address, bytes signature);

        // math
        error Uint256BinOpError(uint8 operation, uint256 a, uint256 b);
    }
}

use IZeroExRichErrors::IZeroExRichErrorsErrors as RichErrorAbi;

// ─── Error codes ──────────────────────────────────────────────────────────────

/// Reason code carried by `SignatureValidationError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureValidationErrorCode {
    AlwaysInvalid = 0,
    InvalidLength = 1,
    Unsupported = 2,
    Illegal = 3,
    WrongSigner = 4,
    BadSignatureData = 5,
}

impl TryFrom<u8> for SignatureValidationErrorCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        Ok(match code {
            0 => Self::AlwaysInvalid,
            1 => Self::InvalidLength,
            2 => Self::Unsupported,
            3 => Self::Illegal,
            4 => Self::WrongSigner,
            5 => Self::BadSignatureData,
            other => return Err(other),
        })
    }
}

/// Reason code carried by `InvalidTransformDataError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InvalidTransformDataErrorCode {
    InvalidTokens = 0,
    InvalidArrayLength = 1,
}

/// Operation code carried by `Uint256BinOpError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinOp {
    Addition = 0,
    Multiplication = 1,
    Subtraction = 2,
    Division = 3,
}

// ─── ErrorCategory ────────────────────────────────────────────────────────────

/// Coarse grouping of rich errors, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller lacks the right to invoke the operation.
    AccessControl,
    /// Registry or lifecycle state forbids the operation.
    State,
    /// A puppet failed or was misused.
    Puppet,
    /// Transform pipeline or one of its transformers failed.
    Transform,
    /// Meta-transaction validation or execution failed.
    MetaTransaction,
    /// Signature was rejected.
    Signature,
    /// Arithmetic overflow / underflow / division by zero.
    Math,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AccessControl => "access-control",
            Self::State => "state",
            Self::Puppet => "puppet",
            Self::Transform => "transform",
            Self::MetaTransaction => "meta-transaction",
            Self::Signature => "signature",
            Self::Math => "math",
        };
        f.write_str(s)
    }
}

// ─── ZeroExError ──────────────────────────────────────────────────────────────

macro_rules! rich_errors {
    ($(
        $(#[$meta:meta])*
        $variant:ident => $abi:ident [$category:ident] { $($field:ident : $ty:ty),* $(,)? }
    ),* $(,)?) => {
        /// Typed view of every rich revert error.
        #[derive(Debug, Clone, PartialEq, Eq, Error)]
        pub enum ZeroExError {
            $(
                $(#[$meta])*
                $variant { $($field: $ty),* },
            )*
        }

        impl ZeroExError {
            /// ABI-encode as `selector ‖ args`.
            pub fn abi_encode(&self) -> Bytes {
                match self {
                    $(
                        Self::$variant { $($field),* } => {
                            IZeroExRichErrors::$abi { $($field: $field.clone()),* }
                                .abi_encode()
                                .into()
                        }
                    )*
                }
            }

            /// Decode a revert payload; `None` if it is not a rich error.
            pub fn abi_decode(data: &[u8]) -> Option<Self> {
                let decoded = RichErrorAbi::abi_decode(data, false).ok()?;
                Some(match decoded {
                    $(
                        RichErrorAbi::$abi(e) => {
                            let _ = &e;
                            Self::$variant { $($field: e.$field),* }
                        }
                    )*
                })
            }

            /// Solidity name of the error.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant { .. } => stringify!($abi), )*
                }
            }

            /// 4-byte selector of the error.
            pub fn selector(&self) -> Selector {
                match self {
                    $( Self::$variant { .. } => Selector::from(<IZeroExRichErrors::$abi as SolError>::SELECTOR), )*
                }
            }

            pub fn category(&self) -> ErrorCategory {
                match self {
                    $( Self::$variant { .. } => ErrorCategory::$category, )*
                }
            }
        }
    };
}

rich_errors! {
    #[error("only callable by self (sender {sender})")]
    OnlyCallableBySelf => OnlyCallableBySelfError [AccessControl] { sender: Address },
    #[error("illegal reentrancy into {selector} (flags {reentrancy_flags:#x})")]
    IllegalReentrancy => IllegalReentrancyError [State] { selector: Selector, reentrancy_flags: U256 },

    #[error("only owner {owner} may call (sender {sender})")]
    OnlyOwner => OnlyOwnerError [AccessControl] { sender: Address, owner: Address },
    #[error("cannot transfer ownership to the zero address")]
    TransferOwnerToZero => TransferOwnerToZeroError [State] {},
    #[error("migration call to {target} failed: {result_data}")]
    MigrateCallFailed => MigrateCallFailedError [State] { target: Address, result_data: Bytes },

    #[error("no implementation registered for {selector}")]
    NotImplemented => NotImplementedError [State] { selector: Selector },
    #[error("bootstrap caller {actual} is not {expected}")]
    InvalidBootstrapCaller => InvalidBootstrapCallerError [AccessControl] { actual: Address, expected: Address },
    #[error("die caller {actual} is not {expected}")]
    InvalidDieCaller => InvalidDieCallerError [AccessControl] { actual: Address, expected: Address },
    #[error("bootstrap call to {target} failed: {result_data}")]
    BootstrapCallFailed => BootstrapCallFailedError [State] { target: Address, result_data: Bytes },
    #[error("proxy already bootstrapped")]
    AlreadyBootstrapped => AlreadyBootstrappedError [State] {},

    #[error("no rollback history for {selector}")]
    NoRollbackHistory => NoRollbackHistoryError [State] { selector: Selector },

    #[error("sender {sender} is not authorized")]
    SenderNotAuthorized => SenderNotAuthorizedError [AccessControl] { sender: Address },
    #[error("{target} is already authorized")]
    TargetAlreadyAuthorized => TargetAlreadyAuthorizedError [State] { target: Address },
    #[error("{target} is not authorized")]
    TargetNotAuthorized => TargetNotAuthorizedError [State] { target: Address },
    #[error("the zero address cannot be authorized")]
    ZeroCantBeAuthorized => ZeroCantBeAuthorizedError [State] {},
    #[error("authorized address at index is {authorized}, not {target}")]
    AuthorizedAddressMismatch => AuthorizedAddressMismatchError [State] { authorized: Address, target: Address },
    #[error("index {index} out of bounds (length {length})")]
    IndexOutOfBounds => IndexOutOfBoundsError [State] { index: U256, length: U256 },

    #[error("transferFrom of {amount} {token} from {owner} to {to} failed: {error_data}")]
    SpenderERC20TransferFromFailed => SpenderERC20TransferFromFailedError [Transform] {
        token: Address, owner: Address, to: Address, amount: U256, error_data: Bytes,
    },

    #[error("puppet {puppet} call to {call_target} (value {call_value}) failed: {error_data}")]
    PuppetExecuteFailed => PuppetExecuteFailedError [Puppet] {
        puppet: Address, call_target: Address, call_data: Bytes, call_value: U256, error_data: Bytes,
    },
    #[error("puppet {puppet} delegatecall to {call_target} failed: {error_data}")]
    PuppetExecuteWithFailed => PuppetExecuteWithFailedError [Puppet] {
        puppet: Address, call_target: Address, call_data: Bytes, error_data: Bytes,
    },
    #[error("{puppet} is not a puppet of this pool")]
    InvalidPuppetInstance => InvalidPuppetInstanceError [Puppet] { puppet: Address },
    #[error("puppet {puppet} is not acquired")]
    PuppetNotAcquired => PuppetNotAcquiredError [Puppet] { puppet: Address },

    #[error("insufficient ETH attached: {eth_attached} < {eth_needed}")]
    InsufficientEthAttached => InsufficientEthAttachedError [Transform] { eth_attached: U256, eth_needed: U256 },
    #[error("incomplete transform of {output_token}: got {output_token_amount}, wanted {min_output_token_amount}")]
    IncompleteERC20Transform => IncompleteERC20TransformError [Transform] {
        output_token: Address, output_token_amount: U256, min_output_token_amount: U256,
    },
    #[error("transform lost {output_token_lost_amount} of {output_token}")]
    NegativeTransformERC20Output => NegativeTransformERC20OutputError [Transform] {
        output_token: Address, output_token_lost_amount: U256,
    },
    #[error("transformer {transformer} was not deployed by {deployer}")]
    UnauthorizedTransformer => UnauthorizedTransformerError [AccessControl] { transformer: Address, deployer: Address },
    #[error("transformer {transformer} failed: {result_data}")]
    ERC20TransformerFailed => ERC20TransformerFailedError [Transform] { transformer: Address, result_data: Bytes },
    #[error("only deployer {deployer} may call (caller {caller})")]
    OnlyCallableByDeployer => OnlyCallableByDeployerError [AccessControl] { caller: Address, deployer: Address },
    #[error("invalid execution context {actual_context} (expected {expected_context})")]
    InvalidExecutionContext => InvalidExecutionContextError [AccessControl] {
        actual_context: Address, expected_context: Address,
    },
    #[error("invalid transform data (code {error_code}): {transform_data}")]
    InvalidTransformData => InvalidTransformDataError [Transform] { error_code: u8, transform_data: Bytes },
    #[error("incomplete sell quote fill of {sell_token}: sold {sold_amount} of {sell_amount}")]
    IncompleteFillSellQuote => IncompleteFillSellQuoteError [Transform] {
        sell_token: Address, sold_amount: U256, sell_amount: U256,
    },
    #[error("incomplete buy quote fill of {buy_token}: bought {bought_amount} of {buy_amount}")]
    IncompleteFillBuyQuote => IncompleteFillBuyQuoteError [Transform] {
        buy_token: Address, bought_amount: U256, buy_amount: U256,
    },
    #[error("insufficient protocol fee: balance {eth_balance} < {eth_needed}")]
    InsufficientProtocolFee => InsufficientProtocolFeeError [Transform] { eth_balance: U256, eth_needed: U256 },
    #[error("invalid ERC20 asset data {asset_data}")]
    InvalidERC20AssetData => InvalidERC20AssetDataError [Transform] { asset_data: Bytes },
    #[error("invalid taker fee token {token}")]
    InvalidTakerFeeToken => InvalidTakerFeeTokenError [Transform] { token: Address },

    #[error("{mtx_count} meta-transactions but {signature_count} signatures")]
    InvalidMetaTransactionsArrayLengths => InvalidMetaTransactionsArrayLengthsError [MetaTransaction] {
        mtx_count: U256, signature_count: U256,
    },
    #[error("meta-transaction {mtx_hash} calls unsupported function {selector}")]
    MetaTransactionUnsupportedFunction => MetaTransactionUnsupportedFunctionError [MetaTransaction] {
        mtx_hash: B256, selector: Selector,
    },
    #[error("meta-transaction {mtx_hash} must be sent by {expected_sender}, not {sender}")]
    MetaTransactionWrongSender => MetaTransactionWrongSenderError [MetaTransaction] {
        mtx_hash: B256, sender: Address, expected_sender: Address,
    },
    #[error("meta-transaction {mtx_hash} expired at {expiration_time} (now {time})")]
    MetaTransactionExpired => MetaTransactionExpiredError [MetaTransaction] {
        mtx_hash: B256, time: U256, expiration_time: U256,
    },
    #[error("meta-transaction {mtx_hash} gas price {gas_price} outside [{min_gas_price}, {max_gas_price}]")]
    MetaTransactionGasPrice => MetaTransactionGasPriceError [MetaTransaction] {
        mtx_hash: B256, gas_price: U256, min_gas_price: U256, max_gas_price: U256,
    },
    #[error("meta-transaction {mtx_hash} needs {eth_required} wei, proxy holds {eth_balance}")]
    MetaTransactionInsufficientEth => MetaTransactionInsufficientEthError [MetaTransaction] {
        mtx_hash: B256, eth_balance: U256, eth_required: U256,
    },
    #[error("meta-transaction {mtx_hash} has an invalid signature: {err_data}")]
    MetaTransactionInvalidSignature => MetaTransactionInvalidSignatureError [MetaTransaction] {
        mtx_hash: B256, signature: Bytes, err_data: Bytes,
    },
    #[error("meta-transaction {mtx_hash} already executed in block {executed_block_number}")]
    MetaTransactionAlreadyExecuted => MetaTransactionAlreadyExecutedError [MetaTransaction] {
        mtx_hash: B256, executed_block_number: U256,
    },
    #[error("meta-transaction {mtx_hash} call failed: {return_data}")]
    MetaTransactionCallFailed => MetaTransactionCallFailedError [MetaTransaction] {
        mtx_hash: B256, call_data: Bytes, return_data: Bytes,
    },

    #[error("signature validation failed (code {code}) for {hash} by {signer_address}")]
    SignatureValidation => SignatureValidationError [Signature] {
        code: u8, hash: B256, signer_address: Address, signature: Bytes,
    },

    #[error("uint256 operation {operation} overflowed on ({a}, {b})")]
    Uint256BinOp => Uint256BinOpError [Math] { operation: u8, a: U256, b: U256 },
}

impl ZeroExError {
    pub fn signature(
        code: SignatureValidationErrorCode,
        hash: B256,
        signer_address: Address,
        signature: impl Into<Bytes>,
    ) -> Self {
        Self::SignatureValidation {
            code: code as u8,
            hash,
            signer_address,
            signature: signature.into(),
        }
    }

    pub fn invalid_transform_data(
        code: InvalidTransformDataErrorCode,
        transform_data: impl Into<Bytes>,
    ) -> Self {
        Self::InvalidTransformData {
            error_code: code as u8,
            transform_data: transform_data.into(),
        }
    }

    pub fn bin_op(operation: BinOp, a: U256, b: U256) -> Self {
        Self::Uint256BinOp { operation: operation as u8, a, b }
    }

    /// Revert payload nested inside a wrapping error, if this variant wraps one.
    pub fn inner_revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::MigrateCallFailed { result_data, .. }
            | Self::BootstrapCallFailed { result_data, .. }
            | Self::ERC20TransformerFailed { result_data, .. } => Some(result_data),
            Self::SpenderERC20TransferFromFailed { error_data, .. }
            | Self::PuppetExecuteFailed { error_data, .. }
            | Self::PuppetExecuteWithFailed { error_data, .. } => Some(error_data),
            Self::MetaTransactionInvalidSignature { err_data, .. } => Some(err_data),
            Self::MetaTransactionCallFailed { return_data, .. } => Some(return_data),
            _ => None,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
