//! `AllowanceTarget`: the contract users approve. Authorized callers (the
//! proxy) can make it call anything, which is how `TokenSpender` pulls
//! tokens.

use alloy_primitives::Bytes;
use alloy_sol_types::{sol, SolCall};
use tracing::trace;

use zeroex_core::{Contract, Evm, Frame, Revert};

use crate::authorizable;

sol! {
    #![sol(all_derives)]

    interface IAllowanceTarget {
        function executeCall(address target, bytes callData) external returns (bytes resultData);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowanceTarget;

impl Contract for AllowanceTarget {
    fn name(&self) -> &'static str {
        "AllowanceTarget"
    }

    fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
        authorizable::init(evm, frame)
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        if frame.selector().0 == IAllowanceTarget::executeCallCall::SELECTOR {
            authorizable::only_authorized(evm, frame)?;
            let call: IAllowanceTarget::executeCallCall = frame.decode()?;
            trace!(target = %call.target, "allowance target call");
            let result = evm.call(frame.address, call.target, frame.value, call.callData)?;
            return Ok(IAllowanceTarget::executeCallCall::abi_encode_returns(&(result,)).into());
        }
        authorizable::dispatch(evm, frame).unwrap_or_else(|| Err(Revert::empty()))
    }
}
