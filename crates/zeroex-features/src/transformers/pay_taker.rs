//! Sends tokens left in the wallet to the taker.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::sol;
use tracing::debug;

use zeroex_core::constants::MAX_UINT256;
use zeroex_core::{Evm, Revert};
use zeroex_tokens::compat::{balance_of, transfer_token_or_eth};

use super::{decode_transform_data, TransformContext, Transformer};

sol! {
    #![sol(all_derives)]

    /// A missing or `MAX_UINT256` amount pays the whole balance.
    struct PayTakerTransformData {
        address[] tokens;
        uint256[] amounts;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayTakerTransformer;

/// `amount`, or the wallet's whole balance of `token` for the sentinel.
pub(crate) fn resolve_amount(
    evm: &mut Evm,
    wallet: Address,
    token: Address,
    amount: Option<U256>,
) -> Result<U256, Revert> {
    match amount {
        Some(amount) if amount != MAX_UINT256 => Ok(amount),
        _ => balance_of(evm, wallet, token, wallet),
    }
}

impl Transformer for PayTakerTransformer {
    const NAME: &'static str = "PayTakerTransformer";

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, data: &Bytes) -> Result<(), Revert> {
        let PayTakerTransformData { tokens, amounts } = decode_transform_data(data)?;
        for (i, token) in tokens.into_iter().enumerate() {
            let amount = resolve_amount(evm, ctx.wallet, token, amounts.get(i).copied())?;
            if amount.is_zero() {
                continue;
            }
            transfer_token_or_eth(evm, ctx.wallet, token, ctx.taker, amount)?;
            debug!(taker = %ctx.taker, %token, %amount, "paid taker");
        }
        Ok(())
    }
}
