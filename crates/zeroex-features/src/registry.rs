//! `SimpleFunctionRegistry`: owner-controlled selector → implementation
//! table with per-selector rollback history.
//!
//! Only non-zero implementations are pushed onto the history, so a rollback
//! always lands on a usable implementation, never on the unset state.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::{debug, info};

use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::fixin::{migrate_success, only_owner, only_self};
use crate::proxy::ProxyStorage;

sol! {
    #![sol(all_derives)]

    interface ISimpleFunctionRegistry {
        event ProxyFunctionUpdated(bytes4 indexed selector, address oldImpl, address newImpl);

        function bootstrap() external returns (bytes4 success);
        function rollback(bytes4 selector) external;
        function extend(bytes4 selector, address implementation) external;
        function _extendSelf(bytes4 selector, address implementation) external;
        function getRollbackLength(bytes4 selector) external view returns (uint256 rollbackLength);
        function getRollbackEntryAtIndex(bytes4 selector, uint256 idx) external view returns (address implementation);
    }
}

use ISimpleFunctionRegistry::ISimpleFunctionRegistryCalls as RegistryCall;

/// Previous implementations per selector, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RegistryStorage {
    pub history: HashMap<Selector, Vec<Address>>,
}

impl StorageRegion for RegistryStorage {
    const ID: StorageId = StorageId::SimpleFunctionRegistry;
}

/// Point `selector` at `implementation` in the proxy at `proxy`, saving the
/// old implementation (if any) for rollback.
pub fn extend(evm: &mut Evm, proxy: Address, selector: Selector, implementation: Address) -> Result<(), Revert> {
    let old = evm.storage_mut(proxy, |s: &mut ProxyStorage| {
        let old = s.implementation(selector);
        s.set(selector, implementation);
        old
    })?;
    if old != Address::ZERO {
        evm.storage_mut(proxy, |s: &mut RegistryStorage| {
            s.history.entry(selector).or_default().push(old);
        })?;
    }
    evm.emit(
        proxy,
        &ISimpleFunctionRegistry::ProxyFunctionUpdated { selector, oldImpl: old, newImpl: implementation },
    )?;
    debug!(%proxy, %selector, old = %old, new = %implementation, "function extended");
    Ok(())
}

fn rollback(evm: &mut Evm, proxy: Address, selector: Selector) -> Result<(), Revert> {
    let previous = evm.storage_mut(proxy, |s: &mut RegistryStorage| {
        s.history.get_mut(&selector).and_then(Vec::pop)
    })?;
    let Some(previous) = previous else {
        return Err(ZeroExError::NoRollbackHistory { selector }.into());
    };
    let current = evm.storage_mut(proxy, |s: &mut ProxyStorage| {
        let current = s.implementation(selector);
        s.set(selector, previous);
        current
    })?;
    evm.emit(
        proxy,
        &ISimpleFunctionRegistry::ProxyFunctionUpdated { selector, oldImpl: current, newImpl: previous },
    )?;
    info!(%proxy, %selector, from = %current, to = %previous, "function rolled back");
    Ok(())
}

/// The registry feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFunctionRegistry;

impl SimpleFunctionRegistry {
    /// Functions this feature installs on the proxy.
    pub const SELECTORS: [[u8; 4]; 5] = [
        ISimpleFunctionRegistry::rollbackCall::SELECTOR,
        ISimpleFunctionRegistry::extendCall::SELECTOR,
        ISimpleFunctionRegistry::_extendSelfCall::SELECTOR,
        ISimpleFunctionRegistry::getRollbackLengthCall::SELECTOR,
        ISimpleFunctionRegistry::getRollbackEntryAtIndexCall::SELECTOR,
    ];
}

impl Contract for SimpleFunctionRegistry {
    fn name(&self) -> &'static str {
        "SimpleFunctionRegistry"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        let call = RegistryCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())?;
        match call {
            RegistryCall::bootstrap(_) => {
                // The registry cannot register itself through itself.
                for selector in Self::SELECTORS {
                    extend(evm, proxy, Selector::from(selector), frame.code_address)?;
                }
                Ok(migrate_success())
            }
            RegistryCall::rollback(c) => {
                only_owner(evm, frame)?;
                rollback(evm, proxy, c.selector)?;
                Ok(Bytes::new())
            }
            RegistryCall::extend(c) => {
                only_owner(evm, frame)?;
                extend(evm, proxy, c.selector, c.implementation)?;
                Ok(Bytes::new())
            }
            RegistryCall::_extendSelf(c) => {
                only_self(frame)?;
                extend(evm, proxy, c.selector, c.implementation)?;
                Ok(Bytes::new())
            }
            RegistryCall::getRollbackLength(c) => {
                let length = evm.storage(proxy, |s: &RegistryStorage| {
                    s.history.get(&c.selector).map_or(0, Vec::len)
                });
                Ok(ISimpleFunctionRegistry::getRollbackLengthCall::abi_encode_returns(&(U256::from(length),)).into())
            }
            RegistryCall::getRollbackEntryAtIndex(c) => {
                let history = evm.storage(proxy, |s: &RegistryStorage| {
                    s.history.get(&c.selector).cloned().unwrap_or_default()
                });
                let entry = usize::try_from(c.idx).ok().and_then(|i| history.get(i).copied());
                let Some(implementation) = entry else {
                    return Err(ZeroExError::IndexOutOfBounds {
                        index: c.idx,
                        length: U256::from(history.len()),
                    }
                    .into());
                };
                Ok(ISimpleFunctionRegistry::getRollbackEntryAtIndexCall::abi_encode_returns(&(implementation,)).into())
            }
        }
    }
}
