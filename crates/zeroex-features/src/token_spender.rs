//! `TokenSpender`: pulls user tokens through the `AllowanceTarget`.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::debug;

use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};
use zeroex_tokens::compat::{self, is_success_return};
use zeroex_tokens::IERC20Token;

use crate::allowance_target::IAllowanceTarget;
use crate::fixin::{migrate_success, only_self, register_feature_function};

sol! {
    #![sol(all_derives)]

    interface ITokenSpender {
        function migrate(address allowanceTarget) external returns (bytes4 success);
        function _spendERC20Tokens(address token, address owner, address to, uint256 amount) external;
        function getSpendableERC20BalanceOf(address token, address owner) external view returns (uint256 amount);
        function getAllowanceTarget() external view returns (address target);
    }
}

use ITokenSpender::ITokenSpenderCalls as SpenderCall;

#[derive(Debug, Clone, Default)]
pub struct TokenSpenderStorage {
    pub allowance_target: Address,
}

impl StorageRegion for TokenSpenderStorage {
    const ID: StorageId = StorageId::TokenSpender;
}

/// `transferFrom(owner, to, amount)` on `token`, executed by the allowance
/// target of the proxy at `proxy`.
pub fn spend_erc20_tokens(
    evm: &mut Evm,
    proxy: Address,
    token: Address,
    owner: Address,
    to: Address,
    amount: U256,
) -> Result<(), Revert> {
    let allowance_target = evm.storage(proxy, |s: &TokenSpenderStorage| s.allowance_target);
    let fail = |error_data: Bytes| -> Revert {
        ZeroExError::SpenderERC20TransferFromFailed { token, owner, to, amount, error_data }.into()
    };
    if !evm.has_code(token) {
        return Err(fail(Bytes::new()));
    }
    let call = IAllowanceTarget::executeCallCall {
        target: token,
        callData: IERC20Token::transferFromCall { from: owner, to, amount }.abi_encode().into(),
    };
    match evm.call_sol(proxy, allowance_target, U256::ZERO, &call) {
        Ok(ret) if is_success_return(&ret.resultData) => {
            debug!(%token, %owner, %to, %amount, "tokens spent");
            Ok(())
        }
        Ok(ret) => Err(fail(ret.resultData)),
        Err(revert) => Err(fail(revert.into_data())),
    }
}

/// `min(allowance to the allowance target, balance)` of `owner`.
pub fn spendable_balance(evm: &mut Evm, proxy: Address, token: Address, owner: Address) -> Result<U256, Revert> {
    let allowance_target = evm.storage(proxy, |s: &TokenSpenderStorage| s.allowance_target);
    let allowance = compat::allowance(evm, proxy, token, owner, allowance_target)?;
    let balance = compat::balance_of(evm, proxy, token, owner)?;
    Ok(allowance.min(balance))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSpender;

impl TokenSpender {
    pub const SELECTORS: [[u8; 4]; 3] = [
        ITokenSpender::_spendERC20TokensCall::SELECTOR,
        ITokenSpender::getSpendableERC20BalanceOfCall::SELECTOR,
        ITokenSpender::getAllowanceTargetCall::SELECTOR,
    ];
}

impl Contract for TokenSpender {
    fn name(&self) -> &'static str {
        "TokenSpender"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        match SpenderCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            SpenderCall::migrate(c) => {
                evm.storage_mut(proxy, |s: &mut TokenSpenderStorage| s.allowance_target = c.allowanceTarget)?;
                for selector in Self::SELECTORS {
                    register_feature_function(evm, frame, selector)?;
                }
                Ok(migrate_success())
            }
            SpenderCall::_spendERC20Tokens(c) => {
                only_self(frame)?;
                spend_erc20_tokens(evm, proxy, c.token, c.owner, c.to, c.amount)?;
                Ok(Bytes::new())
            }
            SpenderCall::getSpendableERC20BalanceOf(c) => {
                let amount = spendable_balance(evm, proxy, c.token, c.owner)?;
                Ok(ITokenSpender::getSpendableERC20BalanceOfCall::abi_encode_returns(&(amount,)).into())
            }
            SpenderCall::getAllowanceTarget(_) => {
                let target = evm.storage(proxy, |s: &TokenSpenderStorage| s.allowance_target);
                Ok(ITokenSpender::getAllowanceTargetCall::abi_encode_returns(&(target,)).into())
            }
        }
    }
}
