//! One-shot migrators that deploy and wire up a `ZeroEx` proxy.
//!
//! [`InitialMigration`] deploys the proxy and bootstraps the two features a
//! proxy cannot live without (registry and ownership). [`FullMigration`]
//! runs an initial migration and then installs every other feature through
//! `Ownable.migrate`. Both destroy themselves once they are done, so each
//! instance can deploy exactly one proxy.

pub mod full;
pub mod initial;

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::SolCall;
use serde::Serialize;
use tracing::{debug, info};

use zeroex_core::constants::MIGRATE_SUCCESS;
use zeroex_core::{Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::fixin::{migrate_success, returned_magic};
use crate::meta_transactions::{IMetaTransactions, MetaTransactions};
use crate::ownable::{IOwnable, Ownable};
use crate::puppet_pool::{IPuppetPool, PuppetPool};
use crate::registry::{ISimpleFunctionRegistry, SimpleFunctionRegistry};
use crate::signature_validator::{ISignatureValidator, SignatureValidator};
use crate::token_spender::{ITokenSpender, TokenSpender};
use crate::transform_erc20::{ITransformERC20, TransformERC20};

pub use full::{FullMigration, FullMigrationHandle, IFullMigration};
pub use initial::{IInitialMigration, InitialMigration, InitialMigrationHandle};

/// Lives in a `FullMigration`'s own account.
#[derive(Debug, Clone, Default)]
pub struct MigrationStorage {
    /// The inner `InitialMigration` that bootstraps the new proxy.
    pub bootstrapper: Address,
}

impl StorageRegion for MigrationStorage {
    const ID: StorageId = StorageId::Migration;
}

/// Bootstrap body shared by the migrators. Runs delegated into the proxy:
/// installs the registry and ownership features, then hands the proxy to
/// `owner`.
pub(crate) fn bootstrap_proxy(
    evm: &mut Evm,
    frame: &Frame,
    owner: Address,
    registry: Address,
    ownable: Address,
) -> Result<Bytes, Revert> {
    let proxy = frame.address;
    bootstrap_feature(evm, frame, registry, ISimpleFunctionRegistry::bootstrapCall {}.abi_encode())?;
    bootstrap_feature(evm, frame, ownable, IOwnable::bootstrapCall {}.abi_encode())?;
    evm.call_sol(proxy, proxy, U256::ZERO, &IOwnable::transferOwnershipCall { newOwner: owner })?;
    debug!(%proxy, %registry, %ownable, %owner, "core features bootstrapped");
    Ok(migrate_success())
}

fn bootstrap_feature(evm: &mut Evm, frame: &Frame, target: Address, input: Vec<u8>) -> Result<(), Revert> {
    let result = evm
        .delegate_call(frame, target, input)
        .map_err(|revert| ZeroExError::BootstrapCallFailed { target, result_data: revert.into_data() })?;
    if !returned_magic(&result, MIGRATE_SUCCESS) {
        return Err(ZeroExError::BootstrapCallFailed { target, result_data: result }.into());
    }
    Ok(())
}

/// `die(ethRecipient)` body: only the migrator itself may call it.
pub(crate) fn die(evm: &mut Evm, frame: &Frame, name: &str, eth_recipient: Address) -> Result<Bytes, Revert> {
    if frame.caller != frame.address {
        return Err(Revert::reason(format!("{name}/INVALID_SENDER")));
    }
    evm.self_destruct(frame.address, eth_recipient)?;
    debug!(migrator = %frame.address, %eth_recipient, "migrator destroyed");
    Ok(Bytes::new())
}

/// Revert with `<name>/INVALID_SENDER` unless `frame.caller` is `expected`.
pub(crate) fn require_sender(frame: &Frame, name: &str, expected: Address) -> Result<(), Revert> {
    if frame.caller != expected {
        return Err(Revert::reason(format!("{name}/INVALID_SENDER")));
    }
    Ok(())
}

// ─── Deployment helpers ────────────────────────────────────────────────────

/// Addresses of every feature implementation a full migration installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureSet {
    pub registry: Address,
    pub ownable: Address,
    pub token_spender: Address,
    pub puppet_pool: Address,
    pub transform_erc20: Address,
    pub signature_validator: Address,
    pub meta_transactions: Address,
}

impl FeatureSet {
    /// Deploy one instance of each feature from `deployer`.
    pub fn deploy(evm: &mut Evm, deployer: Address) -> Result<Self, Revert> {
        Ok(Self {
            registry: evm.deploy(deployer, Arc::new(SimpleFunctionRegistry), U256::ZERO)?,
            ownable: evm.deploy(deployer, Arc::new(Ownable), U256::ZERO)?,
            token_spender: evm.deploy(deployer, Arc::new(TokenSpender), U256::ZERO)?,
            puppet_pool: evm.deploy(deployer, Arc::new(PuppetPool), U256::ZERO)?,
            transform_erc20: evm.deploy(deployer, Arc::new(TransformERC20), U256::ZERO)?,
            signature_validator: evm.deploy(deployer, Arc::new(SignatureValidator), U256::ZERO)?,
            meta_transactions: evm.deploy(deployer, Arc::new(MetaTransactions), U256::ZERO)?,
        })
    }

    pub fn to_sol(&self) -> IFullMigration::Features {
        IFullMigration::Features {
            registry: self.registry,
            ownable: self.ownable,
            tokenSpender: self.token_spender,
            puppetPool: self.puppet_pool,
            transformERC20: self.transform_erc20,
            signatureValidator: self.signature_validator,
            metaTransactions: self.meta_transactions,
        }
    }
}

/// Result of [`deploy_exchange_proxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeployedProxy {
    pub zero_ex: Address,
    pub owner: Address,
    pub migrator: Address,
    pub allowance_target: Address,
    pub transformer_deployer: Address,
    pub features: FeatureSet,
}

/// Deploy every feature, a `FullMigration` and through it a fully migrated
/// proxy owned by `owner`. Everything is sent from `deployer`.
pub fn deploy_exchange_proxy(
    evm: &mut Evm,
    deployer: Address,
    owner: Address,
    transformer_deployer: Address,
) -> Result<DeployedProxy, Revert> {
    let features = FeatureSet::deploy(evm, deployer)?;
    let migration = FullMigrationHandle::deploy_new(evm, deployer)?;
    let migrator = migration.address();
    let zero_ex = migration.deploy(evm, deployer, owner, &features, transformer_deployer)?;
    let allowance_target = evm
        .static_call_sol(deployer, zero_ex, &ITokenSpender::getAllowanceTargetCall {})?
        .target;
    info!(%zero_ex, %owner, %migrator, %allowance_target, "exchange proxy deployed");
    Ok(DeployedProxy { zero_ex, owner, migrator, allowance_target, transformer_deployer, features })
}

/// Human-readable signatures of every function a migrated proxy can
/// register, keyed by selector.
pub fn known_selectors() -> BTreeMap<Selector, &'static str> {
    let mut table = BTreeMap::new();
    let mut add = |selector: [u8; 4], signature: &'static str| {
        table.insert(Selector::from(selector), signature);
    };
    add(ISimpleFunctionRegistry::bootstrapCall::SELECTOR, ISimpleFunctionRegistry::bootstrapCall::SIGNATURE);
    add(ISimpleFunctionRegistry::rollbackCall::SELECTOR, ISimpleFunctionRegistry::rollbackCall::SIGNATURE);
    add(ISimpleFunctionRegistry::extendCall::SELECTOR, ISimpleFunctionRegistry::extendCall::SIGNATURE);
    add(ISimpleFunctionRegistry::_extendSelfCall::SELECTOR, ISimpleFunctionRegistry::_extendSelfCall::SIGNATURE);
    add(
        ISimpleFunctionRegistry::getRollbackLengthCall::SELECTOR,
        ISimpleFunctionRegistry::getRollbackLengthCall::SIGNATURE,
    );
    add(
        ISimpleFunctionRegistry::getRollbackEntryAtIndexCall::SELECTOR,
        ISimpleFunctionRegistry::getRollbackEntryAtIndexCall::SIGNATURE,
    );
    add(IOwnable::transferOwnershipCall::SELECTOR, IOwnable::transferOwnershipCall::SIGNATURE);
    add(IOwnable::ownerCall::SELECTOR, IOwnable::ownerCall::SIGNATURE);
    add(IOwnable::migrateCall::SELECTOR, IOwnable::migrateCall::SIGNATURE);
    add(ITokenSpender::_spendERC20TokensCall::SELECTOR, ITokenSpender::_spendERC20TokensCall::SIGNATURE);
    add(
        ITokenSpender::getSpendableERC20BalanceOfCall::SELECTOR,
        ITokenSpender::getSpendableERC20BalanceOfCall::SIGNATURE,
    );
    add(ITokenSpender::getAllowanceTargetCall::SELECTOR, ITokenSpender::getAllowanceTargetCall::SIGNATURE);
    add(IPuppetPool::_acquirePuppetCall::SELECTOR, IPuppetPool::_acquirePuppetCall::SIGNATURE);
    add(IPuppetPool::_releasePuppetCall::SELECTOR, IPuppetPool::_releasePuppetCall::SIGNATURE);
    add(IPuppetPool::createFreePuppetCall::SELECTOR, IPuppetPool::createFreePuppetCall::SIGNATURE);
    add(IPuppetPool::getFreePuppetsCountCall::SELECTOR, IPuppetPool::getFreePuppetsCountCall::SIGNATURE);
    add(ITransformERC20::transformERC20Call::SELECTOR, ITransformERC20::transformERC20Call::SIGNATURE);
    add(ITransformERC20::_transformERC20Call::SELECTOR, ITransformERC20::_transformERC20Call::SIGNATURE);
    add(
        ITransformERC20::setTransformerDeployerCall::SELECTOR,
        ITransformERC20::setTransformerDeployerCall::SIGNATURE,
    );
    add(
        ITransformERC20::getTransformerDeployerCall::SELECTOR,
        ITransformERC20::getTransformerDeployerCall::SIGNATURE,
    );
    add(ITransformERC20::setQuoteSignerCall::SELECTOR, ITransformERC20::setQuoteSignerCall::SIGNATURE);
    add(ITransformERC20::getQuoteSignerCall::SELECTOR, ITransformERC20::getQuoteSignerCall::SIGNATURE);
    add(
        ISignatureValidator::validateHashSignatureCall::SELECTOR,
        ISignatureValidator::validateHashSignatureCall::SIGNATURE,
    );
    add(
        ISignatureValidator::isValidHashSignatureCall::SELECTOR,
        ISignatureValidator::isValidHashSignatureCall::SIGNATURE,
    );
    add(
        IMetaTransactions::executeMetaTransactionCall::SELECTOR,
        IMetaTransactions::executeMetaTransactionCall::SIGNATURE,
    );
    add(
        IMetaTransactions::batchExecuteMetaTransactionsCall::SELECTOR,
        IMetaTransactions::batchExecuteMetaTransactionsCall::SIGNATURE,
    );
    add(
        IMetaTransactions::getMetaTransactionExecutedBlockCall::SELECTOR,
        IMetaTransactions::getMetaTransactionExecutedBlockCall::SIGNATURE,
    );
    add(
        IMetaTransactions::getMetaTransactionHashExecutedBlockCall::SELECTOR,
        IMetaTransactions::getMetaTransactionHashExecutedBlockCall::SIGNATURE,
    );
    add(IMetaTransactions::getMetaTransactionHashCall::SELECTOR, IMetaTransactions::getMetaTransactionHashCall::SIGNATURE);
    table
}
