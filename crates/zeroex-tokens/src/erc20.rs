//! A mintable ERC20 token.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface, SolValue};
use serde::{Deserialize, Serialize};
use tracing::trace;

use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion};

sol! {
    #![sol(all_derives)]

    interface IERC20Token {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);

        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IMintableERC20Token {
        function mint(address to, uint256 amount) external;
        function burn(address from, uint256 amount) external;
    }
}

use IERC20Token::IERC20TokenCalls as Erc20Call;
use IMintableERC20Token::IMintableERC20TokenCalls as MintCall;

/// How `transfer`, `transferFrom` and `approve` report their outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStyle {
    /// Return `true`, revert on failure.
    #[default]
    Standard,
    /// Return nothing, revert on failure (USDT style).
    NoReturnData,
    /// Return `false` on failure instead of reverting.
    ReturnsFalse,
}

/// Balances and allowances.
#[derive(Debug, Clone, Default)]
pub struct Erc20Storage {
    pub total_supply: U256,
    pub balances: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
}

impl StorageRegion for Erc20Storage {
    const ID: StorageId = StorageId::Erc20Token;
}

impl Erc20Storage {
    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).copied().unwrap_or_default()
    }
}

/// ERC20 token with open `mint` / `burn`, for funding test accounts.
#[derive(Debug, Clone)]
pub struct Erc20Token {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub style: ReturnStyle,
}

impl Erc20Token {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            style: ReturnStyle::Standard,
        }
    }

    pub fn with_style(mut self, style: ReturnStyle) -> Self {
        self.style = style;
        self
    }

    fn success(&self) -> Bytes {
        match self.style {
            ReturnStyle::NoReturnData => Bytes::new(),
            _ => true.abi_encode().into(),
        }
    }

    fn failure(&self, reason: &str) -> Result<Bytes, Revert> {
        match self.style {
            ReturnStyle::ReturnsFalse => Ok(false.abi_encode().into()),
            _ => Err(Revert::reason(reason)),
        }
    }

    fn move_tokens(
        evm: &mut Evm,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, Revert> {
        let moved = evm.storage_mut(token, |s: &mut Erc20Storage| {
            let from_balance = s.balance_of(from);
            if from_balance < amount {
                return false;
            }
            s.balances.insert(from, from_balance - amount);
            let to_balance = s.balance_of(to);
            s.balances.insert(to, to_balance.saturating_add(amount));
            true
        })?;
        if moved {
            evm.emit(token, &IERC20Token::Transfer { from, to, value: amount })?;
            trace!(%token, %from, %to, %amount, "erc20 transfer");
        }
        Ok(moved)
    }

    /// Handle `IERC20Token` calls on behalf of `token` (shared with WETH9).
    pub(crate) fn dispatch(&self, evm: &mut Evm, frame: &Frame, call: Erc20Call) -> Result<Bytes, Revert> {
        let token = frame.address;
        match call {
            Erc20Call::name(_) => Ok(IERC20Token::nameCall::abi_encode_returns(&(self.name.clone(),)).into()),
            Erc20Call::symbol(_) => {
                Ok(IERC20Token::symbolCall::abi_encode_returns(&(self.symbol.clone(),)).into())
            }
            Erc20Call::decimals(_) => {
                Ok(IERC20Token::decimalsCall::abi_encode_returns(&(self.decimals,)).into())
            }
            Erc20Call::totalSupply(_) => {
                let supply = evm.storage(token, |s: &Erc20Storage| s.total_supply);
                Ok(IERC20Token::totalSupplyCall::abi_encode_returns(&(supply,)).into())
            }
            Erc20Call::balanceOf(c) => {
                let balance = evm.storage(token, |s: &Erc20Storage| s.balance_of(c.owner));
                Ok(IERC20Token::balanceOfCall::abi_encode_returns(&(balance,)).into())
            }
            Erc20Call::allowance(c) => {
                let allowance = evm.storage(token, |s: &Erc20Storage| s.allowance(c.owner, c.spender));
                Ok(IERC20Token::allowanceCall::abi_encode_returns(&(allowance,)).into())
            }
            Erc20Call::transfer(c) => {
                if Self::move_tokens(evm, token, frame.caller, c.to, c.amount)? {
                    Ok(self.success())
                } else {
                    self.failure("ERC20/INSUFFICIENT_BALANCE")
                }
            }
            Erc20Call::transferFrom(c) => {
                let allowance = evm.storage(token, |s: &Erc20Storage| s.allowance(c.from, frame.caller));
                if c.from != frame.caller && allowance < c.amount {
                    return self.failure("ERC20/INSUFFICIENT_ALLOWANCE");
                }
                if !Self::move_tokens(evm, token, c.from, c.to, c.amount)? {
                    return self.failure("ERC20/INSUFFICIENT_BALANCE");
                }
                if c.from != frame.caller && allowance != U256::MAX {
                    evm.storage_mut(token, |s: &mut Erc20Storage| {
                        s.allowances.insert((c.from, frame.caller), allowance - c.amount);
                    })?;
                }
                Ok(self.success())
            }
            Erc20Call::approve(c) => {
                evm.storage_mut(token, |s: &mut Erc20Storage| {
                    s.allowances.insert((frame.caller, c.spender), c.amount);
                })?;
                evm.emit(
                    token,
                    &IERC20Token::Approval { owner: frame.caller, spender: c.spender, value: c.amount },
                )?;
                Ok(self.success())
            }
        }
    }

    pub(crate) fn mint(evm: &mut Evm, token: Address, to: Address, amount: U256) -> Result<(), Revert> {
        evm.storage_mut(token, |s: &mut Erc20Storage| {
            s.total_supply = s.total_supply.saturating_add(amount);
            let balance = s.balance_of(to);
            s.balances.insert(to, balance.saturating_add(amount));
        })?;
        evm.emit(token, &IERC20Token::Transfer { from: Address::ZERO, to, value: amount })
    }

    pub(crate) fn burn(evm: &mut Evm, token: Address, from: Address, amount: U256) -> Result<(), Revert> {
        let burned = evm.storage_mut(token, |s: &mut Erc20Storage| {
            let balance = s.balance_of(from);
            if balance < amount {
                return false;
            }
            s.balances.insert(from, balance - amount);
            s.total_supply -= amount;
            true
        })?;
        if !burned {
            return Err(Revert::reason("ERC20/INSUFFICIENT_BALANCE"));
        }
        evm.emit(token, &IERC20Token::Transfer { from, to: Address::ZERO, value: amount })
    }
}

impl Contract for Erc20Token {
    fn name(&self) -> &'static str {
        "ERC20Token"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        if let Ok(call) = MintCall::abi_decode(&frame.input, false) {
            match call {
                MintCall::mint(c) => Self::mint(evm, frame.address, c.to, c.amount)?,
                MintCall::burn(c) => Self::burn(evm, frame.address, c.from, c.amount)?,
            }
            return Ok(Bytes::new());
        }
        let call = Erc20Call::abi_decode(&frame.input, false).map_err(|_| Revert::empty())?;
        self.dispatch(evm, frame, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::sync::Arc;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    fn setup(style: ReturnStyle) -> (Evm, Address) {
        let mut evm = Evm::default();
        let token = evm
            .deploy(ALICE, Arc::new(Erc20Token::new("Token", "TKN", 18).with_style(style)), U256::ZERO)
            .unwrap();
        evm.transact_sol(ALICE, token, U256::ZERO, &IMintableERC20Token::mintCall { to: ALICE, amount: U256::from(100u64) })
            .unwrap();
        (evm, token)
    }

    fn balance(evm: &Evm, token: Address, owner: Address) -> U256 {
        evm.storage(token, |s: &Erc20Storage| s.balance_of(owner))
    }

    #[test]
    fn transfer_moves_balance_and_logs() {
        let (mut evm, token) = setup(ReturnStyle::Standard);
        let ok = evm
            .transact_sol(ALICE, token, U256::ZERO, &IERC20Token::transferCall { to: BOB, amount: U256::from(40u64) })
            .unwrap();
        assert!(ok._0);
        assert_eq!(balance(&evm, token, ALICE), U256::from(60u64));
        assert_eq!(balance(&evm, token, BOB), U256::from(40u64));
        assert_eq!(evm.events::<IERC20Token::Transfer>().len(), 2);
    }

    #[test]
    fn transfer_from_needs_allowance() {
        let (mut evm, token) = setup(ReturnStyle::Standard);
        let call = IERC20Token::transferFromCall { from: ALICE, to: BOB, amount: U256::from(10u64) };
        let err = evm.transact_sol(BOB, token, U256::ZERO, &call).err().unwrap();
        assert_eq!(err.reason_string().as_deref(), Some("ERC20/INSUFFICIENT_ALLOWANCE"));

        evm.transact_sol(ALICE, token, U256::ZERO, &IERC20Token::approveCall { spender: BOB, amount: U256::from(15u64) })
            .unwrap();
        evm.transact_sol(BOB, token, U256::ZERO, &call).unwrap();
        let remaining = evm.storage(token, |s: &Erc20Storage| s.allowance(ALICE, BOB));
        assert_eq!(remaining, U256::from(5u64));
    }

    #[test]
    fn unlimited_allowance_is_not_decremented() {
        let (mut evm, token) = setup(ReturnStyle::Standard);
        evm.transact_sol(ALICE, token, U256::ZERO, &IERC20Token::approveCall { spender: BOB, amount: U256::MAX })
            .unwrap();
        let call = IERC20Token::transferFromCall { from: ALICE, to: BOB, amount: U256::from(10u64) };
        evm.transact_sol(BOB, token, U256::ZERO, &call).unwrap();
        assert_eq!(evm.storage(token, |s: &Erc20Storage| s.allowance(ALICE, BOB)), U256::MAX);
    }

    #[test]
    fn no_return_data_style() {
        let (mut evm, token) = setup(ReturnStyle::NoReturnData);
        let out = evm
            .transact(ALICE, token, U256::ZERO, IERC20Token::transferCall { to: BOB, amount: U256::from(1u64) }.abi_encode())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn returns_false_style() {
        let (mut evm, token) = setup(ReturnStyle::ReturnsFalse);
        let ok = evm
            .transact_sol(BOB, token, U256::ZERO, &IERC20Token::transferCall { to: ALICE, amount: U256::from(1u64) })
            .unwrap();
        assert!(!ok._0);
    }

    #[test]
    fn burn_reduces_supply() {
        let (mut evm, token) = setup(ReturnStyle::Standard);
        evm.transact_sol(ALICE, token, U256::ZERO, &IMintableERC20Token::burnCall { from: ALICE, amount: U256::from(30u64) })
            .unwrap();
        let supply = evm.transact_sol(ALICE, token, U256::ZERO, &IERC20Token::totalSupplyCall {}).unwrap();
        assert_eq!(supply._0, U256::from(70u64));
    }
}
