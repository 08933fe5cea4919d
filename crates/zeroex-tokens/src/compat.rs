//! Calls into arbitrary ERC20 tokens that tolerate non-standard return data.
//!
//! A token call counts as successful if it does not revert and returns
//! either nothing or an ABI `true`.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};

use zeroex_core::constants::is_token_eth;
use zeroex_core::{Evm, Revert};

use crate::erc20::IERC20Token;

/// `true` if `output` is empty or decodes to `true`.
pub fn is_success_return(output: &[u8]) -> bool {
    output.is_empty() || bool::abi_decode(output, false).unwrap_or(false)
}

fn compat_call(evm: &mut Evm, caller: Address, token: Address, data: Vec<u8>) -> Result<(), Revert> {
    if !evm.has_code(token) {
        return Err(Revert::empty());
    }
    let output = evm.call(caller, token, U256::ZERO, data)?;
    if is_success_return(&output) {
        Ok(())
    } else {
        Err(Revert::new(output))
    }
}

/// `token.transfer(to, amount)` made by `caller`.
pub fn compat_transfer(
    evm: &mut Evm,
    caller: Address,
    token: Address,
    to: Address,
    amount: U256,
) -> Result<(), Revert> {
    compat_call(evm, caller, token, IERC20Token::transferCall { to, amount }.abi_encode())
}

/// `token.transferFrom(from, to, amount)` made by `caller`.
pub fn compat_transfer_from(
    evm: &mut Evm,
    caller: Address,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), Revert> {
    compat_call(evm, caller, token, IERC20Token::transferFromCall { from, to, amount }.abi_encode())
}

/// `token.approve(spender, amount)` made by `caller`.
pub fn compat_approve(
    evm: &mut Evm,
    caller: Address,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), Revert> {
    compat_call(evm, caller, token, IERC20Token::approveCall { spender, amount }.abi_encode())
}

/// Raise `caller`'s allowance for `spender` to unlimited if it is below `amount`.
pub fn approve_if_below(
    evm: &mut Evm,
    caller: Address,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), Revert> {
    if allowance(evm, caller, token, caller, spender)? < amount {
        compat_approve(evm, caller, token, spender, U256::MAX)?;
    }
    Ok(())
}

/// `token.balanceOf(owner)`; the ETH pseudo token reads the native balance.
pub fn balance_of(evm: &mut Evm, caller: Address, token: Address, owner: Address) -> Result<U256, Revert> {
    if is_token_eth(token) {
        return Ok(evm.balance(owner));
    }
    Ok(evm.static_call_sol(caller, token, &IERC20Token::balanceOfCall { owner })?._0)
}

/// `token.allowance(owner, spender)`.
pub fn allowance(
    evm: &mut Evm,
    caller: Address,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, Revert> {
    Ok(evm.static_call_sol(caller, token, &IERC20Token::allowanceCall { owner, spender })?._0)
}

/// Send `amount` of `token` (or ETH) from `caller` to `to`.
pub fn transfer_token_or_eth(
    evm: &mut Evm,
    caller: Address,
    token: Address,
    to: Address,
    amount: U256,
) -> Result<(), Revert> {
    if is_token_eth(token) {
        evm.call(caller, to, amount, Bytes::new()).map(drop)
    } else {
        compat_transfer(evm, caller, token, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erc20::{Erc20Token, IMintableERC20Token, ReturnStyle};
    use alloy_primitives::address;
    use std::sync::Arc;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    fn token(evm: &mut Evm, style: ReturnStyle) -> Address {
        let token = evm
            .deploy(ALICE, Arc::new(Erc20Token::new("T", "T", 18).with_style(style)), U256::ZERO)
            .unwrap();
        evm.call_sol(ALICE, token, U256::ZERO, &IMintableERC20Token::mintCall { to: ALICE, amount: U256::from(10u64) })
            .unwrap();
        token
    }

    #[test]
    fn success_return_detection() {
        assert!(is_success_return(&[]));
        assert!(is_success_return(&true.abi_encode()));
        assert!(!is_success_return(&false.abi_encode()));
        assert!(!is_success_return(&[1, 2, 3]));
    }

    #[test]
    fn works_with_every_return_style() {
        for style in [ReturnStyle::Standard, ReturnStyle::NoReturnData, ReturnStyle::ReturnsFalse] {
            let mut evm = Evm::default();
            let token = token(&mut evm, style);
            compat_transfer(&mut evm, ALICE, token, BOB, U256::from(4u64)).unwrap();
            assert_eq!(balance_of(&mut evm, ALICE, token, BOB).unwrap(), U256::from(4u64));
            assert!(compat_transfer(&mut evm, BOB, token, ALICE, U256::from(5u64)).is_err());
        }
    }

    #[test]
    fn approve_if_below_sets_unlimited() {
        let mut evm = Evm::default();
        let token = token(&mut evm, ReturnStyle::Standard);
        approve_if_below(&mut evm, ALICE, token, BOB, U256::from(3u64)).unwrap();
        assert_eq!(allowance(&mut evm, ALICE, token, ALICE, BOB).unwrap(), U256::MAX);
    }

    #[test]
    fn eth_pseudo_token() {
        let mut evm = Evm::default();
        evm.fund(ALICE, U256::from(9u64));
        let eth = zeroex_core::constants::ETH_TOKEN_ADDRESS;
        transfer_token_or_eth(&mut evm, ALICE, eth, BOB, U256::from(2u64)).unwrap();
        assert_eq!(balance_of(&mut evm, ALICE, eth, BOB).unwrap(), U256::from(2u64));
    }

    #[test]
    fn codeless_token_fails() {
        let mut evm = Evm::default();
        assert!(compat_transfer(&mut evm, ALICE, BOB, ALICE, U256::from(1u64)).is_err());
    }
}
