//! Pays fixed affiliate fees out of the wallet.

use alloy_primitives::Bytes;
use alloy_sol_types::sol;
use tracing::debug;

use zeroex_core::{Evm, Revert};
use zeroex_tokens::compat::transfer_token_or_eth;

use super::pay_taker::resolve_amount;
use super::{decode_transform_data, TransformContext, Transformer};

sol! {
    #![sol(all_derives)]

    struct TokenFee {
        address token;
        uint256 amount;
        address recipient;
    }

    struct AffiliateFeeTransformData {
        TokenFee[] fees;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AffiliateFeeTransformer;

impl Transformer for AffiliateFeeTransformer {
    const NAME: &'static str = "AffiliateFeeTransformer";

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, data: &Bytes) -> Result<(), Revert> {
        let AffiliateFeeTransformData { fees } = decode_transform_data(data)?;
        for fee in fees {
            let amount = resolve_amount(evm, ctx.wallet, fee.token, Some(fee.amount))?;
            if amount.is_zero() {
                continue;
            }
            transfer_token_or_eth(evm, ctx.wallet, fee.token, fee.recipient, amount)?;
            debug!(token = %fee.token, recipient = %fee.recipient, %amount, "affiliate fee paid");
        }
        Ok(())
    }
}
