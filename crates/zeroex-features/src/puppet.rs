//! `Puppet`: a disposable wallet owned by the proxy.
//!
//! Arbitrary calls (order fills, transformers) run from a puppet so they
//! never see the proxy's storage or the allowances users granted it.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::debug;

use zeroex_core::{Contract, Evm, Frame, Revert, ZeroExError};

sol! {
    #![sol(all_derives)]

    interface IPuppet {
        /// Trace of a successful `execute`.
        event PuppetExecuted(address indexed target, uint256 value, bytes callData, bytes resultData);

        function execute(address target, bytes callData, uint256 value) external payable returns (bytes resultData);
        function executeWith(address target, bytes callData) external payable returns (bytes resultData);
        function owner() external view returns (address ownerAddress);
    }
}

use IPuppet::IPuppetCalls as PuppetCall;

#[derive(Debug, Clone, Copy)]
pub struct Puppet {
    owner: Address,
}

impl Puppet {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    fn only_owner(&self, frame: &Frame) -> Result<(), Revert> {
        if frame.caller != self.owner {
            return Err(ZeroExError::OnlyOwner { sender: frame.caller, owner: self.owner }.into());
        }
        Ok(())
    }
}

impl Contract for Puppet {
    fn name(&self) -> &'static str {
        "Puppet"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        // Plain ETH.
        if frame.input.is_empty() {
            return Ok(Bytes::new());
        }
        let puppet = frame.address;
        match PuppetCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            PuppetCall::execute(c) => {
                self.only_owner(frame)?;
                debug!(%puppet, target = %c.target, value = %c.value, "puppet call");
                let result = evm.call(puppet, c.target, c.value, c.callData.clone()).map_err(|revert| {
                    ZeroExError::PuppetExecuteFailed {
                        puppet,
                        call_target: c.target,
                        call_data: c.callData.clone(),
                        call_value: c.value,
                        error_data: revert.into_data(),
                    }
                })?;
                let trace = IPuppet::PuppetExecuted {
                    target: c.target,
                    value: c.value,
                    callData: c.callData,
                    resultData: result.clone(),
                };
                evm.emit(puppet, &trace)?;
                Ok(IPuppet::executeCall::abi_encode_returns(&(result,)).into())
            }
            PuppetCall::executeWith(c) => {
                self.only_owner(frame)?;
                debug!(%puppet, target = %c.target, "puppet delegatecall");
                let result = evm.delegate_call(frame, c.target, c.callData.clone()).map_err(|revert| {
                    ZeroExError::PuppetExecuteWithFailed {
                        puppet,
                        call_target: c.target,
                        call_data: c.callData,
                        error_data: revert.into_data(),
                    }
                })?;
                Ok(IPuppet::executeWithCall::abi_encode_returns(&(result,)).into())
            }
            PuppetCall::owner(_) => Ok(IPuppet::ownerCall::abi_encode_returns(&(self.owner,)).into()),
        }
    }
}

/// `puppet.execute(target, callData, value)` made by `owner`.
pub fn puppet_execute(
    evm: &mut Evm,
    owner: Address,
    puppet: Address,
    target: Address,
    call_data: Bytes,
    value: U256,
) -> Result<Bytes, Revert> {
    let call = IPuppet::executeCall { target, callData: call_data, value };
    Ok(evm.call_sol(owner, puppet, U256::ZERO, &call)?.resultData)
}

/// `puppet.executeWith(target, callData)` made by `owner`.
pub fn puppet_execute_with(
    evm: &mut Evm,
    owner: Address,
    puppet: Address,
    target: Address,
    call_data: Bytes,
) -> Result<Bytes, Revert> {
    let call = IPuppet::executeWithCall { target, callData: call_data };
    Ok(evm.call_sol(owner, puppet, U256::ZERO, &call)?.resultData)
}
