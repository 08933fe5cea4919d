//! `ZeroEx`: the ExchangeProxy.
//!
//! The proxy itself knows only one function, `getFunctionImplementation`.
//! Everything else is looked up by selector in [`ProxyStorage`] and
//! delegate-called, so features run against the proxy's balance and storage.
//! On construction it deploys a [`BootstrapFeature`] and registers its
//! `bootstrap` function, which the deployer uses once to install the real
//! features.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::{sol, SolCall};
use tracing::{debug, trace};

use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::bootstrap::{BootstrapFeature, IBootstrapFeature};

sol! {
    #![sol(all_derives)]

    interface IZeroEx {
        function getFunctionImplementation(bytes4 selector) external view returns (address implementation);
    }
}

/// Selector → implementation table, plus the one-shot bootstrap flag.
#[derive(Debug, Clone, Default)]
pub struct ProxyStorage {
    pub impls: HashMap<Selector, Address>,
    pub bootstrapped: bool,
}

impl StorageRegion for ProxyStorage {
    const ID: StorageId = StorageId::Proxy;
}

impl ProxyStorage {
    pub fn implementation(&self, selector: Selector) -> Address {
        self.impls.get(&selector).copied().unwrap_or_default()
    }

    /// Set or clear (`Address::ZERO`) the implementation of `selector`.
    pub fn set(&mut self, selector: Selector, implementation: Address) {
        if implementation == Address::ZERO {
            self.impls.remove(&selector);
        } else {
            self.impls.insert(selector, implementation);
        }
    }

    /// Registered selectors, sorted.
    pub fn selectors(&self) -> Vec<Selector> {
        let mut selectors: Vec<Selector> = self.impls.keys().copied().collect();
        selectors.sort_unstable();
        selectors
    }
}

/// Registered selectors of the proxy at `proxy` with their implementations.
pub fn function_table(evm: &Evm, proxy: Address) -> Vec<(Selector, Address)> {
    evm.storage(proxy, |s: &ProxyStorage| {
        s.selectors().into_iter().map(|sel| (sel, s.implementation(sel))).collect()
    })
}

/// The proxy contract. Whoever deploys it becomes the bootstrapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroEx;

impl Contract for ZeroEx {
    fn name(&self) -> &'static str {
        "ZeroEx"
    }

    fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
        let bootstrap = evm.create(frame.address, Arc::new(BootstrapFeature::new(frame.caller)), U256::ZERO)?;
        evm.storage_mut(frame.address, |s: &mut ProxyStorage| {
            s.set(Selector::from(IBootstrapFeature::bootstrapCall::SELECTOR), bootstrap);
        })?;
        debug!(proxy = %frame.address, bootstrapper = %frame.caller, %bootstrap, "proxy deployed");
        Ok(())
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        if frame.input.is_empty() {
            return Ok(Bytes::new());
        }
        let selector = frame.selector();
        if selector.0 == IZeroEx::getFunctionImplementationCall::SELECTOR {
            let call: IZeroEx::getFunctionImplementationCall = frame.decode()?;
            let implementation = evm.storage(frame.address, |s: &ProxyStorage| s.implementation(call.selector));
            return Ok(IZeroEx::getFunctionImplementationCall::abi_encode_returns(&(implementation,)).into());
        }
        let implementation = evm.storage(frame.address, |s: &ProxyStorage| s.implementation(selector));
        if implementation == Address::ZERO {
            return Err(ZeroExError::NotImplemented { selector }.into());
        }
        trace!(proxy = %frame.address, %selector, %implementation, "dispatch");
        evm.delegate_call(frame, implementation, frame.input.clone())
    }
}
