//! `FullMigration`: an initial migration followed by every other feature.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::{debug, info};

use zeroex_core::{Contract, Evm, Frame, Revert};

use crate::allowance_target::AllowanceTarget;
use crate::authorizable::IAuthorizable;
use crate::meta_transactions::IMetaTransactions;
use crate::ownable::IOwnable;
use crate::puppet_pool::IPuppetPool;
use crate::signature_validator::ISignatureValidator;
use crate::token_spender::ITokenSpender;
use crate::transform_erc20::ITransformERC20;

use super::initial::{IInitialMigration, InitialMigration};
use super::{die, require_sender, FeatureSet, MigrationStorage};

sol! {
    #![sol(all_derives)]

    interface IFullMigration {
        struct Features {
            address registry;
            address ownable;
            address tokenSpender;
            address puppetPool;
            address transformERC20;
            address signatureValidator;
            address metaTransactions;
        }

        struct MigrateOpts {
            address transformerDeployer;
        }

        function deploy(address owner, Features features, MigrateOpts migrateOpts) external returns (address zeroEx);
        function getBootstrapper() external view returns (address bootstrapper);
        function die(address ethRecipient) external;
    }
}

use IFullMigration::IFullMigrationCalls as FullCall;

pub const NAME: &str = "FullMigration";

#[derive(Debug, Clone, Copy)]
pub struct FullMigration {
    initialize_caller: Address,
}

impl FullMigration {
    pub fn new(initialize_caller: Address) -> Self {
        Self { initialize_caller }
    }

    fn deploy(
        &self,
        evm: &mut Evm,
        frame: &Frame,
        owner: Address,
        features: IFullMigration::Features,
        opts: IFullMigration::MigrateOpts,
    ) -> Result<Address, Revert> {
        require_sender(frame, NAME, self.initialize_caller)?;
        let this = frame.address;
        let bootstrapper = evm.storage(this, |s: &MigrationStorage| s.bootstrapper);

        // The proxy stays ours until every feature is in.
        let initial = IInitialMigration::deployCall {
            owner: this,
            features: IInitialMigration::BootstrapFeatures { registry: features.registry, ownable: features.ownable },
        };
        let zero_ex = evm.call_sol(this, bootstrapper, U256::ZERO, &initial)?.zeroEx;

        let allowance_target = evm.create(this, Arc::new(AllowanceTarget), U256::ZERO)?;
        evm.call_sol(this, allowance_target, U256::ZERO, &IAuthorizable::addAuthorizedAddressCall { target: zero_ex })?;
        evm.call_sol(this, allowance_target, U256::ZERO, &IAuthorizable::transferOwnershipCall { newOwner: owner })?;

        let steps: [(Address, Vec<u8>); 5] = [
            (
                features.tokenSpender,
                ITokenSpender::migrateCall { allowanceTarget: allowance_target }.abi_encode(),
            ),
            (features.puppetPool, IPuppetPool::migrateCall {}.abi_encode()),
            (
                features.transformERC20,
                ITransformERC20::migrateCall { transformerDeployer: opts.transformerDeployer }.abi_encode(),
            ),
            (features.signatureValidator, ISignatureValidator::migrateCall {}.abi_encode()),
            (features.metaTransactions, IMetaTransactions::migrateCall {}.abi_encode()),
        ];
        for (target, data) in steps {
            let call = IOwnable::migrateCall { target, data: data.into(), newOwner: this };
            evm.call_sol(this, zero_ex, U256::ZERO, &call)?;
            debug!(%zero_ex, feature = %target, "feature migrated");
        }

        evm.call_sol(this, zero_ex, U256::ZERO, &IOwnable::transferOwnershipCall { newOwner: owner })?;
        evm.call_sol(this, this, U256::ZERO, &IFullMigration::dieCall { ethRecipient: owner })?;
        info!(migrator = %this, %zero_ex, %owner, %allowance_target, "full migration complete");
        Ok(zero_ex)
    }
}

impl Contract for FullMigration {
    fn name(&self) -> &'static str {
        NAME
    }

    /// Creates the inner `InitialMigration`, which only this contract may use.
    fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
        let bootstrapper = evm.create(frame.address, Arc::new(InitialMigration::new(frame.address)), U256::ZERO)?;
        evm.storage_mut(frame.address, |s: &mut MigrationStorage| s.bootstrapper = bootstrapper)
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        match FullCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            FullCall::deploy(c) => {
                let zero_ex = self.deploy(evm, frame, c.owner, c.features, c.migrateOpts)?;
                Ok(IFullMigration::deployCall::abi_encode_returns(&(zero_ex,)).into())
            }
            FullCall::getBootstrapper(_) => {
                let bootstrapper = evm.storage(frame.address, |s: &MigrationStorage| s.bootstrapper);
                Ok(IFullMigration::getBootstrapperCall::abi_encode_returns(&(bootstrapper,)).into())
            }
            FullCall::die(c) => die(evm, frame, NAME, c.ethRecipient),
        }
    }
}

/// A deployed, not yet used `FullMigration`. `deploy` consumes it.
#[derive(Debug)]
pub struct FullMigrationHandle {
    address: Address,
}

impl FullMigrationHandle {
    pub fn deploy_new(evm: &mut Evm, from: Address) -> Result<Self, Revert> {
        let address = evm.deploy(from, Arc::new(FullMigration::new(from)), U256::ZERO)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Deploy a proxy with every feature in `features`, owned by `owner`.
    pub fn deploy(
        self,
        evm: &mut Evm,
        from: Address,
        owner: Address,
        features: &FeatureSet,
        transformer_deployer: Address,
    ) -> Result<Address, Revert> {
        let call = IFullMigration::deployCall {
            owner,
            features: features.to_sol(),
            migrateOpts: IFullMigration::MigrateOpts { transformerDeployer: transformer_deployer },
        };
        Ok(evm.transact_sol(from, self.address, U256::ZERO, &call)?.zeroEx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const DEPLOYER: Address = address!("00000000000000000000000000000000000de910");
    const OWNER: Address = address!("0000000000000000000000000000000000000001");

    #[test]
    fn bootstrapper_is_created_by_the_migration() {
        let mut evm = Evm::default();
        let migration = FullMigrationHandle::deploy_new(&mut evm, DEPLOYER).unwrap();
        let bootstrapper = evm
            .transact_sol(DEPLOYER, migration.address(), U256::ZERO, &IFullMigration::getBootstrapperCall {})
            .unwrap()
            .bootstrapper;
        assert_eq!(bootstrapper, migration.address().create(1));
        assert!(evm.has_code(bootstrapper));
    }

    #[test]
    fn inner_migration_rejects_direct_use() {
        let mut evm = Evm::default();
        let migration = FullMigrationHandle::deploy_new(&mut evm, DEPLOYER).unwrap();
        let bootstrapper = migration.address().create(1);
        let call = IInitialMigration::deployCall {
            owner: OWNER,
            features: IInitialMigration::BootstrapFeatures { registry: OWNER, ownable: OWNER },
        };
        let err = evm.transact_sol(DEPLOYER, bootstrapper, U256::ZERO, &call).err().unwrap();
        assert_eq!(err.reason_string().as_deref(), Some("InitialMigration/INVALID_SENDER"));
    }

    #[test]
    fn rejects_other_senders() {
        let mut evm = Evm::default();
        let features = FeatureSet::deploy(&mut evm, DEPLOYER).unwrap();
        let migration = FullMigrationHandle::deploy_new(&mut evm, DEPLOYER).unwrap();
        let err = migration.deploy(&mut evm, OWNER, OWNER, &features, Address::ZERO).unwrap_err();
        assert_eq!(err.reason_string().as_deref(), Some("FullMigration/INVALID_SENDER"));
    }
}
