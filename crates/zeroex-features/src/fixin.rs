//! Helpers shared by every feature running behind the proxy.

use alloy_primitives::{Bytes, FixedBytes, Selector, U256};
use alloy_sol_types::SolValue;
use tracing::debug;

use zeroex_core::constants::MIGRATE_SUCCESS;
use zeroex_core::{Evm, Frame, Revert, ZeroExError};

use crate::ownable::OwnableStorage;
use crate::registry::ISimpleFunctionRegistry;

/// Revert unless the proxy is calling itself.
pub fn only_self(frame: &Frame) -> Result<(), Revert> {
    if frame.caller != frame.address {
        return Err(ZeroExError::OnlyCallableBySelf { sender: frame.caller }.into());
    }
    Ok(())
}

/// Revert unless the caller is the proxy owner.
pub fn only_owner(evm: &Evm, frame: &Frame) -> Result<(), Revert> {
    let owner = evm.storage(frame.address, |s: &OwnableStorage| s.owner);
    if frame.caller != owner {
        return Err(ZeroExError::OnlyOwner { sender: frame.caller, owner }.into());
    }
    Ok(())
}

/// Register `selector` to the implementation currently running.
///
/// Goes through the proxy's own `extend`, so it only works while the proxy
/// owns itself (inside `Ownable.migrate`).
pub fn register_feature_function(evm: &mut Evm, frame: &Frame, selector: [u8; 4]) -> Result<(), Revert> {
    let call = ISimpleFunctionRegistry::extendCall {
        selector: Selector::from(selector),
        implementation: frame.code_address,
    };
    evm.call_sol(frame.address, frame.address, U256::ZERO, &call)?;
    debug!(proxy = %frame.address, selector = %Selector::from(selector), implementation = %frame.code_address, "feature function registered");
    Ok(())
}

/// ABI-encoded `MIGRATE_SUCCESS`.
pub fn migrate_success() -> Bytes {
    MIGRATE_SUCCESS.abi_encode().into()
}

/// `true` if `output` is the ABI encoding of the `bytes4` `magic`.
pub fn returned_magic(output: &[u8], magic: Selector) -> bool {
    FixedBytes::<4>::abi_decode(output, true).is_ok_and(|value| value == magic)
}
