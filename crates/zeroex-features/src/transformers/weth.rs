//! Wraps ETH into WETH and back.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use tracing::debug;

use zeroex_core::constants::{is_token_eth, MAX_UINT256};
use zeroex_core::{Evm, InvalidTransformDataErrorCode, Revert, ZeroExError};
use zeroex_tokens::{compat, IWETH9};

use super::{decode_transform_data, TransformContext, Transformer};

sol! {
    #![sol(all_derives)]

    /// `token` is what gets converted: ETH is wrapped, WETH is unwrapped.
    struct WethTransformData {
        address token;
        uint256 amount;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WethTransformer {
    weth: Address,
}

impl WethTransformer {
    pub fn new(weth: Address) -> Self {
        Self { weth }
    }
}

impl Transformer for WethTransformer {
    const NAME: &'static str = "WethTransformer";

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, data: &Bytes) -> Result<(), Revert> {
        let WethTransformData { token, amount } = decode_transform_data(data)?;
        let wallet = ctx.wallet;
        if is_token_eth(token) {
            let amount = if amount == MAX_UINT256 { evm.balance(wallet) } else { amount };
            evm.call(wallet, self.weth, amount, IWETH9::depositCall {}.abi_encode())?;
            debug!(%wallet, %amount, "wrapped ETH");
        } else if token == self.weth {
            let amount = if amount == MAX_UINT256 {
                compat::balance_of(evm, wallet, self.weth, wallet)?
            } else {
                amount
            };
            evm.call_sol(wallet, self.weth, U256::ZERO, &IWETH9::withdrawCall { amount })?;
            debug!(%wallet, %amount, "unwrapped WETH");
        } else {
            return Err(ZeroExError::invalid_transform_data(InvalidTransformDataErrorCode::InvalidTokens, data.clone()).into());
        }
        Ok(())
    }
}
