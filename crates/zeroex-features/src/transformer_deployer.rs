//! `TransformerDeployer`: the only trusted source of transformers.
//!
//! Authorized accounts deploy transformers from init code and can later
//! kill them. `TransformERC20` refuses transformers this contract has no
//! deployment nonce for.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::info;

use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion};

use crate::authorizable::{self, AuthorizableStorage};
use crate::transformers::IKillable;

sol! {
    #![sol(all_derives)]

    interface ITransformerDeployer {
        event Deployed(address deployedAddress, uint256 nonce, address sender);
        event Killed(address target, address sender);

        function deploy(bytes initCode) external payable returns (address deployedAddress);
        function kill(address target, address ethRecipient) external;
        function toDeploymentNonce(address deployedAddress) external view returns (uint256 deploymentNonce);
        function nonce() external view returns (uint256 deploymentNonce);
    }
}

use ITransformerDeployer::ITransformerDeployerCalls as DeployerCall;

#[derive(Debug, Clone, Default)]
pub struct TransformerDeployerStorage {
    pub to_deployment_nonce: HashMap<Address, u64>,
}

impl StorageRegion for TransformerDeployerStorage {
    const ID: StorageId = StorageId::TransformerDeployer;
}

#[derive(Debug, Clone, Default)]
pub struct TransformerDeployer {
    initial_authorities: Vec<Address>,
}

impl TransformerDeployer {
    pub fn new(initial_authorities: Vec<Address>) -> Self {
        Self { initial_authorities }
    }

    /// Deploy a deployer from `owner` that trusts `authorities`.
    pub fn deploy_new(evm: &mut Evm, owner: Address, authorities: Vec<Address>) -> Result<Address, Revert> {
        evm.deploy(owner, Arc::new(Self::new(authorities)), U256::ZERO)
    }

    fn deploy(evm: &mut Evm, frame: &Frame, init_code: &[u8]) -> Result<Address, Revert> {
        authorizable::only_authorized(evm, frame)?;
        let deployer = frame.address;
        let nonce = evm.nonce(deployer);
        let deployed = evm.create_from_init_code(deployer, init_code, frame.value)?;
        evm.storage_mut(deployer, |s: &mut TransformerDeployerStorage| {
            s.to_deployment_nonce.insert(deployed, nonce);
        })?;
        evm.emit(
            deployer,
            &ITransformerDeployer::Deployed { deployedAddress: deployed, nonce: U256::from(nonce), sender: frame.caller },
        )?;
        info!(%deployer, %deployed, nonce, sender = %frame.caller, "transformer deployed");
        Ok(deployed)
    }

    fn kill(evm: &mut Evm, frame: &Frame, target: Address, eth_recipient: Address) -> Result<(), Revert> {
        authorizable::only_authorized(evm, frame)?;
        evm.call_sol(frame.address, target, U256::ZERO, &IKillable::dieCall { ethRecipient: eth_recipient })?;
        evm.emit(frame.address, &ITransformerDeployer::Killed { target, sender: frame.caller })?;
        info!(deployer = %frame.address, %target, "transformer killed");
        Ok(())
    }
}

impl Contract for TransformerDeployer {
    fn name(&self) -> &'static str {
        "TransformerDeployer"
    }

    fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
        authorizable::init(evm, frame)?;
        evm.storage_mut(frame.address, |s: &mut AuthorizableStorage| {
            for authority in &self.initial_authorities {
                if !s.is_authorized(*authority) {
                    s.authorities.push(*authority);
                }
            }
        })
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let Ok(call) = DeployerCall::abi_decode(&frame.input, false) else {
            return authorizable::dispatch(evm, frame).unwrap_or_else(|| Err(Revert::empty()));
        };
        let this = frame.address;
        let out = match call {
            DeployerCall::deploy(c) => {
                let deployed = Self::deploy(evm, frame, &c.initCode)?;
                ITransformerDeployer::deployCall::abi_encode_returns(&(deployed,))
            }
            DeployerCall::kill(c) => {
                Self::kill(evm, frame, c.target, c.ethRecipient)?;
                Vec::new()
            }
            DeployerCall::toDeploymentNonce(c) => {
                let nonce = evm.storage(this, |s: &TransformerDeployerStorage| {
                    s.to_deployment_nonce.get(&c.deployedAddress).copied().unwrap_or_default()
                });
                ITransformerDeployer::toDeploymentNonceCall::abi_encode_returns(&(U256::from(nonce),))
            }
            DeployerCall::nonce(_) => {
                ITransformerDeployer::nonceCall::abi_encode_returns(&(U256::from(evm.nonce(this)),))
            }
        };
        Ok(out.into())
    }
}
