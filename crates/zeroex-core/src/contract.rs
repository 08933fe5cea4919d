//! The `Contract` trait and the call frame handed to it.

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::SolCall;

use crate::evm::Evm;
use crate::revert::Revert;

/// How a frame was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    Create,
}

/// Execution context of one contract invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: CallKind,
    /// `address(this)`: whose storage and balance the code acts on.
    pub address: Address,
    /// The account whose code is running. Differs from `address` only under
    /// delegatecall.
    pub code_address: Address,
    /// `msg.sender`.
    pub caller: Address,
    /// `msg.value`.
    pub value: U256,
    /// `msg.data`.
    pub input: Bytes,
    pub is_static: bool,
}

impl Frame {
    /// First four bytes of the calldata, zero-padded when shorter.
    pub fn selector(&self) -> Selector {
        let mut selector = [0u8; 4];
        let n = self.input.len().min(4);
        selector[..n].copy_from_slice(&self.input[..n]);
        Selector::from(selector)
    }

    /// Decode the calldata as call `C`; trailing bytes are ignored.
    pub fn decode<C: SolCall>(&self) -> Result<C, Revert> {
        C::abi_decode(&self.input, false).map_err(|_| Revert::empty())
    }

    /// `true` when running under another account's storage.
    pub fn is_delegated(&self) -> bool {
        self.address != self.code_address
    }
}

/// Contract code.
///
/// Implementations are immutable once deployed (their fields play the role
/// of Solidity immutables); all mutable state goes through [`Evm`] storage.
pub trait Contract: Send + Sync {
    /// Artifact name, used in traces.
    fn name(&self) -> &'static str;

    /// Constructor body, run once inside the creation frame.
    fn construct(&self, _evm: &mut Evm, _frame: &Frame) -> Result<(), Revert> {
        Ok(())
    }

    /// Handle one call. Returning `Err` reverts the frame.
    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert>;
}
