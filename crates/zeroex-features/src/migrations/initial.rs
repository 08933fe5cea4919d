//! `InitialMigration`: deploys a bare proxy with only the registry and
//! ownership features installed.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::info;

use zeroex_core::{Contract, Evm, Frame, Revert};

use crate::bootstrap::IBootstrapFeature;
use crate::proxy::ZeroEx;

use super::{bootstrap_proxy, die, require_sender};

sol! {
    #![sol(all_derives)]

    interface IInitialMigration {
        struct BootstrapFeatures {
            address registry;
            address ownable;
        }

        function deploy(address owner, BootstrapFeatures features) external returns (address zeroEx);
        function bootstrap(address owner, BootstrapFeatures features) external returns (bytes4 success);
        function die(address ethRecipient) external;
    }
}

use IInitialMigration::IInitialMigrationCalls as InitialCall;

pub const NAME: &str = "InitialMigration";

#[derive(Debug, Clone, Copy)]
pub struct InitialMigration {
    initialize_caller: Address,
}

impl InitialMigration {
    /// A migrator whose `deploy` only `initialize_caller` may call.
    pub fn new(initialize_caller: Address) -> Self {
        Self { initialize_caller }
    }

    fn deploy(
        &self,
        evm: &mut Evm,
        frame: &Frame,
        owner: Address,
        features: IInitialMigration::BootstrapFeatures,
    ) -> Result<Address, Revert> {
        require_sender(frame, NAME, self.initialize_caller)?;
        let this = frame.address;
        let zero_ex = evm.create(this, Arc::new(ZeroEx), U256::ZERO)?;

        let bootstrap = IInitialMigration::bootstrapCall { owner, features };
        let call = IBootstrapFeature::bootstrapCall { target: this, callData: bootstrap.abi_encode().into() };
        evm.call_sol(this, zero_ex, U256::ZERO, &call)?;

        evm.call_sol(this, this, U256::ZERO, &IInitialMigration::dieCall { ethRecipient: owner })?;
        info!(migrator = %this, %zero_ex, %owner, "initial migration complete");
        Ok(zero_ex)
    }
}

impl Contract for InitialMigration {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        match InitialCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            InitialCall::deploy(c) => {
                let zero_ex = self.deploy(evm, frame, c.owner, c.features)?;
                Ok(IInitialMigration::deployCall::abi_encode_returns(&(zero_ex,)).into())
            }
            InitialCall::bootstrap(c) => {
                bootstrap_proxy(evm, frame, c.owner, c.features.registry, c.features.ownable)
            }
            InitialCall::die(c) => die(evm, frame, NAME, c.ethRecipient),
        }
    }
}

/// A deployed, not yet used `InitialMigration`. `deploy` consumes it.
#[derive(Debug)]
pub struct InitialMigrationHandle {
    address: Address,
}

impl InitialMigrationHandle {
    /// Deploy a migrator from `from`, who is also the only allowed caller.
    pub fn deploy_new(evm: &mut Evm, from: Address) -> Result<Self, Revert> {
        let address = evm.deploy(from, Arc::new(InitialMigration::new(from)), U256::ZERO)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Deploy and bootstrap a proxy owned by `owner`.
    pub fn deploy(
        self,
        evm: &mut Evm,
        from: Address,
        owner: Address,
        registry: Address,
        ownable: Address,
    ) -> Result<Address, Revert> {
        let call = IInitialMigration::deployCall {
            owner,
            features: IInitialMigration::BootstrapFeatures { registry, ownable },
        };
        Ok(evm.transact_sol(from, self.address, U256::ZERO, &call)?.zeroEx)
    }
}
