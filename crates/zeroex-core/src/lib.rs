//! # zeroex-core
//!
//! The deterministic execution host the ZeroEx contracts run on.
//!
//! Contracts are plain Rust values implementing [`Contract`]. The [`Evm`]
//! host gives them call / delegatecall / staticcall frames, per-account
//! namespaced storage, ETH balances, CREATE-style address derivation,
//! self-destruct and event logs. A frame that returns `Err(Revert)` has all
//! of its state changes rolled back, exactly like an EVM revert.
//!
//! Failures are carried as ABI-encoded revert payloads ([`Revert`]) so they
//! can be re-wrapped by outer frames; [`ZeroExError`] is the typed view of
//! the rich errors and [`RevertDecoder`] turns any payload back into
//! something a human can read.

pub mod artifacts;
pub mod config;
pub mod constants;
pub mod contract;
pub mod decoder;
pub mod errors;
pub mod evm;
pub mod math;
pub mod revert;
pub mod signature;
pub mod storage;

pub use artifacts::{init_code, ArtifactRegistry, InitCode};
pub use config::{ConfigError, LogConfig, SimulatorConfig};
pub use contract::{CallKind, Contract, Frame};
pub use decoder::{DecodedRevert, RevertDecoder, RevertKind};
pub use errors::{
    BinOp, ErrorCategory, InvalidTransformDataErrorCode, SignatureValidationErrorCode, ZeroExError,
};
pub use evm::{Account, BlockEnv, Evm, Log, TxEnv, MAX_CALL_DEPTH};
pub use revert::Revert;
pub use signature::SignatureType;
pub use storage::{StorageArena, StorageId, StorageRegion};

/// Re-exported so downstream crates share one copy of the ABI toolkit.
pub use alloy_primitives;
pub use alloy_sol_types;
