//! `PuppetPool`: lends puppets to features that need a sandbox.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::debug;

use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::fixin::{migrate_success, only_owner, only_self, register_feature_function};
use crate::puppet::Puppet;

sol! {
    #![sol(all_derives)]

    interface IPuppetPool {
        event PuppetCreated(address puppet);

        function migrate() external returns (bytes4 success);
        function _acquirePuppet() external returns (address puppet);
        function _releasePuppet(address puppet) external;
        function createFreePuppet() external;
        function getFreePuppetsCount() external view returns (uint256 count);
    }
}

use IPuppetPool::IPuppetPoolCalls as PoolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PuppetState {
    #[default]
    Invalid,
    InUse,
    Free,
}

#[derive(Debug, Clone, Default)]
pub struct PuppetPoolStorage {
    pub states: HashMap<Address, PuppetState>,
    pub free: Vec<Address>,
}

impl StorageRegion for PuppetPoolStorage {
    const ID: StorageId = StorageId::PuppetPool;
}

impl PuppetPoolStorage {
    pub fn state(&self, puppet: Address) -> PuppetState {
        self.states.get(&puppet).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PuppetPool;

impl PuppetPool {
    pub const SELECTORS: [[u8; 4]; 4] = [
        IPuppetPool::_acquirePuppetCall::SELECTOR,
        IPuppetPool::_releasePuppetCall::SELECTOR,
        IPuppetPool::createFreePuppetCall::SELECTOR,
        IPuppetPool::getFreePuppetsCountCall::SELECTOR,
    ];

    fn create_puppet(evm: &mut Evm, proxy: Address, state: PuppetState) -> Result<Address, Revert> {
        let puppet = evm.create(proxy, Arc::new(Puppet::new(proxy)), U256::ZERO)?;
        evm.storage_mut(proxy, |s: &mut PuppetPoolStorage| {
            s.states.insert(puppet, state);
            if state == PuppetState::Free {
                s.free.push(puppet);
            }
        })?;
        evm.emit(proxy, &IPuppetPool::PuppetCreated { puppet })?;
        debug!(%proxy, %puppet, ?state, "puppet created");
        Ok(puppet)
    }

    fn acquire(evm: &mut Evm, proxy: Address) -> Result<Address, Revert> {
        let reused = evm.storage_mut(proxy, |s: &mut PuppetPoolStorage| {
            let puppet = s.free.pop()?;
            s.states.insert(puppet, PuppetState::InUse);
            Some(puppet)
        })?;
        match reused {
            Some(puppet) => {
                debug!(%proxy, %puppet, "puppet acquired");
                Ok(puppet)
            }
            None => Self::create_puppet(evm, proxy, PuppetState::InUse),
        }
    }

    fn release(evm: &mut Evm, proxy: Address, puppet: Address) -> Result<(), Revert> {
        match evm.storage(proxy, |s: &PuppetPoolStorage| s.state(puppet)) {
            PuppetState::Invalid => Err(ZeroExError::InvalidPuppetInstance { puppet }.into()),
            PuppetState::Free => Err(ZeroExError::PuppetNotAcquired { puppet }.into()),
            PuppetState::InUse => {
                evm.storage_mut(proxy, |s: &mut PuppetPoolStorage| {
                    s.states.insert(puppet, PuppetState::Free);
                    s.free.push(puppet);
                })?;
                debug!(%proxy, %puppet, "puppet released");
                Ok(())
            }
        }
    }
}

impl Contract for PuppetPool {
    fn name(&self) -> &'static str {
        "PuppetPool"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        match PoolCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            PoolCall::migrate(_) => {
                for selector in Self::SELECTORS {
                    register_feature_function(evm, frame, selector)?;
                }
                Ok(migrate_success())
            }
            PoolCall::_acquirePuppet(_) => {
                only_self(frame)?;
                let puppet = Self::acquire(evm, proxy)?;
                Ok(IPuppetPool::_acquirePuppetCall::abi_encode_returns(&(puppet,)).into())
            }
            PoolCall::_releasePuppet(c) => {
                only_self(frame)?;
                Self::release(evm, proxy, c.puppet)?;
                Ok(Bytes::new())
            }
            PoolCall::createFreePuppet(_) => {
                only_owner(evm, frame)?;
                Self::create_puppet(evm, proxy, PuppetState::Free)?;
                Ok(Bytes::new())
            }
            PoolCall::getFreePuppetsCount(_) => {
                let count = evm.storage(proxy, |s: &PuppetPoolStorage| s.free.len());
                Ok(IPuppetPool::getFreePuppetsCountCall::abi_encode_returns(&(U256::from(count),)).into())
            }
        }
    }
}

/// Run `f` with a puppet borrowed from the pool of `proxy`.
///
/// The puppet goes back to the pool on both exit paths; if `f` fails its
/// error is returned after the release.
pub fn with_puppet<T>(
    evm: &mut Evm,
    proxy: Address,
    f: impl FnOnce(&mut Evm, Address) -> Result<T, Revert>,
) -> Result<T, Revert> {
    let puppet = evm.call_sol(proxy, proxy, U256::ZERO, &IPuppetPool::_acquirePuppetCall {})?.puppet;
    let result = f(evm, puppet);
    evm.call_sol(proxy, proxy, U256::ZERO, &IPuppetPool::_releasePuppetCall { puppet })?;
    result
}

/// Number of free puppets held by the pool of `proxy`.
pub fn free_puppets(evm: &Evm, proxy: Address) -> usize {
    evm.storage(proxy, |s: &PuppetPoolStorage| s.free.len())
}
