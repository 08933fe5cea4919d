//! Wrapped ether.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolInterface};

use zeroex_core::{Contract, Evm, Frame, Revert};

use crate::erc20::{Erc20Storage, Erc20Token, IERC20Token::IERC20TokenCalls};

sol! {
    #![sol(all_derives)]

    interface IWETH9 {
        event Deposit(address indexed owner, uint256 value);
        event Withdrawal(address indexed owner, uint256 value);

        function deposit() external payable;
        function withdraw(uint256 amount) external;
    }
}

use IWETH9::IWETH9Calls;

/// WETH9: an ERC20 whose supply is backed 1:1 by ETH held in the contract.
/// Empty calldata deposits.
#[derive(Debug, Clone)]
pub struct Weth9 {
    token: Erc20Token,
}

impl Default for Weth9 {
    fn default() -> Self {
        Self { token: Erc20Token::new("Wrapped Ether", "WETH", 18) }
    }
}

impl Weth9 {
    pub fn new() -> Self {
        Self::default()
    }

    fn deposit(evm: &mut Evm, weth: Address, owner: Address, value: U256) -> Result<Bytes, Revert> {
        Erc20Token::mint(evm, weth, owner, value)?;
        evm.emit(weth, &IWETH9::Deposit { owner, value })?;
        Ok(Bytes::new())
    }

    fn withdraw(evm: &mut Evm, weth: Address, owner: Address, amount: U256) -> Result<Bytes, Revert> {
        let balance = evm.storage(weth, |s: &Erc20Storage| s.balance_of(owner));
        if balance < amount {
            return Err(Revert::reason("WETH9/INSUFFICIENT_BALANCE"));
        }
        Erc20Token::burn(evm, weth, owner, amount)?;
        evm.emit(weth, &IWETH9::Withdrawal { owner, value: amount })?;
        evm.call(weth, owner, amount, Bytes::new())?;
        Ok(Bytes::new())
    }
}

impl Contract for Weth9 {
    fn name(&self) -> &'static str {
        "WETH9"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        if frame.input.is_empty() {
            return Self::deposit(evm, frame.address, frame.caller, frame.value);
        }
        if let Ok(call) = IWETH9Calls::abi_decode(&frame.input, false) {
            return match call {
                IWETH9Calls::deposit(_) => Self::deposit(evm, frame.address, frame.caller, frame.value),
                IWETH9Calls::withdraw(c) => Self::withdraw(evm, frame.address, frame.caller, c.amount),
            };
        }
        let call = IERC20TokenCalls::abi_decode(&frame.input, false).map_err(|_| Revert::empty())?;
        self.token.dispatch(evm, frame, call)
    }
}
