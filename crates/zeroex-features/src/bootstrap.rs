//! `BootstrapFeature`: the proxy's only function before migration.
//!
//! `bootstrap(target, callData)` may be called once, by the account that
//! deployed the proxy. It unregisters itself, destroys its own code and then
//! delegate-calls `target`, which installs the real features.

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::{debug, info};

use zeroex_core::constants::MIGRATE_SUCCESS;
use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::fixin::returned_magic;
use crate::proxy::ProxyStorage;

sol! {
    #![sol(all_derives)]

    interface IBootstrapFeature {
        function bootstrap(address target, bytes callData) external;
        function die() external;
    }
}

use IBootstrapFeature::IBootstrapFeatureCalls as BootstrapCall;

/// Lives in the feature's own account: the proxy that created it.
#[derive(Debug, Clone, Default)]
pub struct BootstrapStorage {
    pub deployer: Address,
}

impl StorageRegion for BootstrapStorage {
    const ID: StorageId = StorageId::Bootstrap;
}

#[derive(Debug, Clone, Copy)]
pub struct BootstrapFeature {
    bootstrap_caller: Address,
}

impl BootstrapFeature {
    pub fn new(bootstrap_caller: Address) -> Self {
        Self { bootstrap_caller }
    }

    fn bootstrap(&self, evm: &mut Evm, frame: &Frame, target: Address, call_data: Bytes) -> Result<Bytes, Revert> {
        if frame.caller != self.bootstrap_caller {
            return Err(ZeroExError::InvalidBootstrapCaller {
                actual: frame.caller,
                expected: self.bootstrap_caller,
            }
            .into());
        }
        let already = evm.storage_mut(frame.address, |s: &mut ProxyStorage| {
            let already = s.bootstrapped;
            s.bootstrapped = true;
            s.set(Selector::from(IBootstrapFeature::bootstrapCall::SELECTOR), Address::ZERO);
            already
        })?;
        if already {
            return Err(ZeroExError::AlreadyBootstrapped {}.into());
        }

        // Self-destruct the implementation; it is useless from here on.
        evm.call(frame.address, frame.code_address, U256::ZERO, IBootstrapFeature::dieCall {}.abi_encode())?;

        let result = evm
            .delegate_call(frame, target, call_data)
            .map_err(|revert| ZeroExError::BootstrapCallFailed { target, result_data: revert.into_data() })?;
        if !returned_magic(&result, MIGRATE_SUCCESS) {
            return Err(ZeroExError::BootstrapCallFailed { target, result_data: result }.into());
        }
        info!(proxy = %frame.address, %target, "proxy bootstrapped");
        Ok(Bytes::new())
    }

    fn die(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let deployer = evm.storage(frame.address, |s: &BootstrapStorage| s.deployer);
        if frame.caller != deployer {
            return Err(ZeroExError::InvalidDieCaller { actual: frame.caller, expected: deployer }.into());
        }
        evm.self_destruct(frame.address, self.bootstrap_caller)?;
        debug!(feature = %frame.address, "bootstrap feature destroyed");
        Ok(Bytes::new())
    }
}

impl Contract for BootstrapFeature {
    fn name(&self) -> &'static str {
        "BootstrapFeature"
    }

    fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
        evm.storage_mut(frame.address, |s: &mut BootstrapStorage| s.deployer = frame.caller)
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        match BootstrapCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            BootstrapCall::bootstrap(c) => self.bootstrap(evm, frame, c.target, c.callData),
            BootstrapCall::die(_) => self.die(evm, frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{function_table, ZeroEx};
    use alloy_primitives::address;
    use alloy_sol_types::SolValue;
    use std::sync::Arc;

    const DEPLOYER: Address = address!("00000000000000000000000000000000000de910");

    sol! {
        #![sol(all_derives)]

        function migrate() returns (bytes4);
    }

    /// Delegate-called migration that records nothing and returns `magic`.
    struct Migrator {
        magic: [u8; 4],
    }

    impl Contract for Migrator {
        fn name(&self) -> &'static str {
            "Migrator"
        }

        fn execute(&self, _evm: &mut Evm, _frame: &Frame) -> Result<Bytes, Revert> {
            Ok(alloy_primitives::FixedBytes::<4>::from(self.magic).abi_encode().into())
        }
    }

    fn setup(magic: [u8; 4]) -> (Evm, Address, Address, Address) {
        let mut evm = Evm::default();
        let proxy = evm.deploy(DEPLOYER, Arc::new(ZeroEx), U256::ZERO).unwrap();
        let feature = function_table(&evm, proxy)[0].1;
        let migrator = evm.deploy(DEPLOYER, Arc::new(Migrator { magic }), U256::ZERO).unwrap();
        (evm, proxy, feature, migrator)
    }

    fn bootstrap_call(target: Address) -> IBootstrapFeature::bootstrapCall {
        IBootstrapFeature::bootstrapCall { target, callData: migrateCall {}.abi_encode().into() }
    }

    #[test]
    fn bootstrap_runs_once_and_destroys_feature() {
        let (mut evm, proxy, feature, migrator) = setup(MIGRATE_SUCCESS.0);
        evm.transact_sol(DEPLOYER, proxy, U256::ZERO, &bootstrap_call(migrator)).unwrap();
        assert!(!evm.has_code(feature));
        assert!(function_table(&evm, proxy).is_empty());

        let err = evm.transact_sol(DEPLOYER, proxy, U256::ZERO, &bootstrap_call(migrator)).err().unwrap();
        assert!(matches!(err.rich(), Some(ZeroExError::NotImplemented { .. })));
    }

    #[test]
    fn only_the_deployer_may_bootstrap() {
        let (mut evm, proxy, feature, migrator) = setup(MIGRATE_SUCCESS.0);
        let stranger = address!("0000000000000000000000000000000000005a5a");
        let err = evm.transact_sol(stranger, proxy, U256::ZERO, &bootstrap_call(migrator)).err().unwrap();
        assert_eq!(
            err.rich(),
            Some(ZeroExError::InvalidBootstrapCaller { actual: stranger, expected: DEPLOYER })
        );
        assert!(evm.has_code(feature));
    }

    #[test]
    fn wrong_magic_reverts_everything() {
        let (mut evm, proxy, feature, migrator) = setup([0, 0, 0, 1]);
        let err = evm.transact_sol(DEPLOYER, proxy, U256::ZERO, &bootstrap_call(migrator)).err().unwrap();
        assert!(matches!(err.rich(), Some(ZeroExError::BootstrapCallFailed { target, .. }) if target == migrator));
        assert!(evm.has_code(feature));
        assert_eq!(function_table(&evm, proxy).len(), 1);
    }

    #[test]
    fn die_is_proxy_only() {
        let (mut evm, proxy, feature, _) = setup(MIGRATE_SUCCESS.0);
        let err = evm.transact_sol(DEPLOYER, feature, U256::ZERO, &IBootstrapFeature::dieCall {}).err().unwrap();
        assert_eq!(err.rich(), Some(ZeroExError::InvalidDieCaller { actual: DEPLOYER, expected: proxy }));
    }
}
