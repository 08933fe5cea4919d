//! Fills a quote made of legacy Exchange orders.
//!
//! Orders are filled in sequence until `fillAmount` of the sell token is
//! sold (sell side) or of the buy token is bought (buy side). A failing order
//! is skipped; only the final total is enforced.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolValue;
use tracing::{debug, warn};

use zeroex_core::constants::{is_token_eth, MAX_UINT256};
use zeroex_core::math::{get_partial_amount_ceil, safe_add, safe_mul, safe_sub};
use zeroex_core::{Evm, InvalidTransformDataErrorCode, Revert, ZeroExError};
use zeroex_tokens::asset_data::ERC20_PROXY_ID;
use zeroex_tokens::compat::{approve_if_below, balance_of};
use zeroex_tokens::{decode_erc20_asset_data, ILegacyExchange, LibOrder};

use super::{decode_transform_data, TransformContext, Transformer};

/// Which amount `fillAmount` is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Side {
    Sell = 0,
    Buy = 1,
}

impl TryFrom<U256> for Side {
    type Error = U256;

    fn try_from(side: U256) -> Result<Self, U256> {
        if side == U256::from(Self::Sell as u8) {
            Ok(Self::Sell)
        } else if side == U256::from(Self::Buy as u8) {
            Ok(Self::Buy)
        } else {
            Err(side)
        }
    }
}

type DataTuple = (U256, Address, Address, Vec<LibOrder::Order>, Vec<Bytes>, Vec<U256>, U256);

/// Transform data, encoded as the tuple
/// `(uint8 side, address sellToken, address buyToken, Order[] orders,
/// bytes[] signatures, uint256[] maxOrderFillAmounts, uint256 fillAmount)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FillQuoteTransformData {
    pub side: Side,
    pub sell_token: Address,
    pub buy_token: Address,
    pub orders: Vec<LibOrder::Order>,
    pub signatures: Vec<Bytes>,
    /// Per-order caps; missing entries mean uncapped, zero skips the order.
    pub max_order_fill_amounts: Vec<U256>,
    /// `MAX_UINT256` on the sell side sells the whole wallet balance.
    pub fill_amount: U256,
}

impl FillQuoteTransformData {
    pub fn abi_encode(&self) -> Bytes {
        let tuple: DataTuple = (
            U256::from(self.side as u8),
            self.sell_token,
            self.buy_token,
            self.orders.clone(),
            self.signatures.clone(),
            self.max_order_fill_amounts.clone(),
            self.fill_amount,
        );
        tuple.abi_encode().into()
    }

    pub fn abi_decode(data: &[u8]) -> Result<Self, Revert> {
        let (side, sell_token, buy_token, orders, signatures, max_order_fill_amounts, fill_amount) =
            decode_transform_data::<DataTuple>(data)?;
        Ok(Self {
            side: Side::try_from(side).map_err(|_| Revert::empty())?,
            sell_token,
            buy_token,
            orders,
            signatures,
            max_order_fill_amounts,
            fill_amount,
        })
    }
}

/// Running totals of one quote fill.
#[derive(Debug, Default)]
struct FillState {
    sold: U256,
    bought: U256,
    protocol_fee: U256,
    eth_remaining: U256,
}

/// Outcome of one order, in quote terms.
#[derive(Debug, Default)]
struct OrderResult {
    taker_token_sold: U256,
    maker_token_bought: U256,
    protocol_fee_paid: U256,
}

#[derive(Debug, Clone, Copy)]
pub struct FillQuoteTransformer {
    exchange: Address,
}

impl FillQuoteTransformer {
    pub fn new(exchange: Address) -> Self {
        Self { exchange }
    }

    /// Token in `asset_data`; empty data is the zero address.
    fn fee_token(asset_data: &Bytes) -> Result<Address, Revert> {
        if asset_data.is_empty() {
            return Ok(Address::ZERO);
        }
        decode_erc20_asset_data(asset_data)
            .ok_or_else(|| ZeroExError::InvalidERC20AssetData { asset_data: asset_data.clone() }.into())
    }

    fn sell_to_order(
        &self,
        evm: &mut Evm,
        wallet: Address,
        data: &FillQuoteTransformData,
        order: &LibOrder::Order,
        signature: &Bytes,
        sell_amount: U256,
        state: &FillState,
    ) -> Result<OrderResult, Revert> {
        let fee_token = Self::fee_token(&order.takerFeeAssetData)?;
        let mut fill = sell_amount;
        if !order.takerFee.is_zero() {
            if fee_token == data.buy_token {
                // Fee comes out of the bought tokens.
                let proxy = self.asset_proxy(evm, wallet)?;
                approve_if_below(evm, wallet, fee_token, proxy, order.takerFee)?;
            } else if fee_token == data.sell_token {
                // Leave room for the fee in the sold tokens, rounding up so the
                // fill plus the floored fee still sums to `sell_amount`.
                fill = get_partial_amount_ceil(
                    order.takerAssetAmount,
                    safe_add(order.takerAssetAmount, order.takerFee)?,
                    sell_amount,
                )?;
            } else {
                return Err(ZeroExError::InvalidTakerFeeToken { token: fee_token }.into());
            }
        }
        let fill = fill.min(order.takerAssetAmount);
        let results = self.fill_order(evm, wallet, order, signature, fill, state);
        Self::order_result(results, fee_token, data)
    }

    fn buy_from_order(
        &self,
        evm: &mut Evm,
        wallet: Address,
        data: &FillQuoteTransformData,
        order: &LibOrder::Order,
        signature: &Bytes,
        buy_amount: U256,
        state: &FillState,
    ) -> Result<OrderResult, Revert> {
        let fee_token = Self::fee_token(&order.takerFeeAssetData)?;
        let mut fill = get_partial_amount_ceil(order.takerAssetAmount, order.makerAssetAmount, buy_amount)?;
        if !order.takerFee.is_zero() {
            if fee_token == data.buy_token {
                // Part of the bought tokens go to the fee.
                fill = get_partial_amount_ceil(
                    order.takerAssetAmount,
                    safe_sub(order.makerAssetAmount, order.takerFee)?,
                    buy_amount,
                )?;
                let proxy = self.asset_proxy(evm, wallet)?;
                approve_if_below(evm, wallet, fee_token, proxy, order.takerFee)?;
            } else if fee_token != data.sell_token {
                return Err(ZeroExError::InvalidTakerFeeToken { token: fee_token }.into());
            }
        }
        let fill = fill.min(order.takerAssetAmount);
        let results = self.fill_order(evm, wallet, order, signature, fill, state);
        Self::order_result(results, fee_token, data)
    }

    fn order_result(
        results: LibOrder::FillResults,
        fee_token: Address,
        data: &FillQuoteTransformData,
    ) -> Result<OrderResult, Revert> {
        let mut bought = results.makerAssetFilledAmount;
        let mut sold = results.takerAssetFilledAmount;
        if fee_token == data.buy_token {
            bought = safe_sub(bought, results.takerFeePaid)?;
        } else if fee_token == data.sell_token {
            sold = safe_add(sold, results.takerFeePaid)?;
        }
        Ok(OrderResult {
            taker_token_sold: sold,
            maker_token_bought: bought,
            protocol_fee_paid: results.protocolFeePaid,
        })
    }

    /// Fill one order; a revert from the exchange yields empty results.
    fn fill_order(
        &self,
        evm: &mut Evm,
        wallet: Address,
        order: &LibOrder::Order,
        signature: &Bytes,
        fill: U256,
        state: &FillState,
    ) -> LibOrder::FillResults {
        let call = ILegacyExchange::fillOrderCall {
            order: order.clone(),
            takerAssetFillAmount: fill,
            signature: signature.clone(),
        };
        match evm.call_sol(wallet, self.exchange, state.protocol_fee, &call) {
            Ok(ret) => ret.fillResults,
            Err(revert) => {
                warn!(maker = %order.makerAddress, %fill, %revert, "order fill failed, skipping");
                empty_fill_results()
            }
        }
    }

    fn asset_proxy(&self, evm: &mut Evm, wallet: Address) -> Result<Address, Revert> {
        let call = ILegacyExchange::getAssetProxyCall { assetProxyId: ERC20_PROXY_ID.into() };
        Ok(evm.static_call_sol(wallet, self.exchange, &call)?._0)
    }
}

fn empty_fill_results() -> LibOrder::FillResults {
    LibOrder::FillResults {
        makerAssetFilledAmount: U256::ZERO,
        takerAssetFilledAmount: U256::ZERO,
        makerFeePaid: U256::ZERO,
        takerFeePaid: U256::ZERO,
        protocolFeePaid: U256::ZERO,
    }
}

impl Transformer for FillQuoteTransformer {
    const NAME: &'static str = "FillQuoteTransformer";

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, raw: &Bytes) -> Result<(), Revert> {
        let mut data = FillQuoteTransformData::abi_decode(raw)?;
        let wallet = ctx.wallet;

        if is_token_eth(data.sell_token) || is_token_eth(data.buy_token) {
            return Err(
                ZeroExError::invalid_transform_data(InvalidTransformDataErrorCode::InvalidTokens, raw.clone()).into()
            );
        }
        if data.orders.len() != data.signatures.len() {
            return Err(ZeroExError::invalid_transform_data(
                InvalidTransformDataErrorCode::InvalidArrayLength,
                raw.clone(),
            )
            .into());
        }

        if data.side == Side::Sell && data.fill_amount == MAX_UINT256 {
            data.fill_amount = balance_of(evm, wallet, data.sell_token, wallet)?;
        }
        let proxy = self.asset_proxy(evm, wallet)?;
        approve_if_below(evm, wallet, data.sell_token, proxy, data.fill_amount)?;

        let multiplier = evm
            .static_call_sol(wallet, self.exchange, &ILegacyExchange::protocolFeeMultiplierCall {})?
            ._0;
        let mut state = FillState {
            protocol_fee: safe_mul(multiplier, evm.tx().gas_price)?,
            eth_remaining: evm.balance(wallet),
            ..FillState::default()
        };

        for (i, order) in data.orders.iter().enumerate() {
            let filled = match data.side {
                Side::Sell => state.sold,
                Side::Buy => state.bought,
            };
            if filled >= data.fill_amount {
                break;
            }
            if state.eth_remaining < state.protocol_fee {
                return Err(ZeroExError::InsufficientProtocolFee {
                    eth_balance: state.eth_remaining,
                    eth_needed: state.protocol_fee,
                }
                .into());
            }

            let mut remaining = data.fill_amount - filled;
            if let Some(cap) = data.max_order_fill_amounts.get(i) {
                remaining = remaining.min(*cap);
            }
            let signature = &data.signatures[i];
            if remaining.is_zero() || signature.is_empty() {
                debug!(index = i, "order skipped");
                continue;
            }

            let result = match data.side {
                Side::Sell => self.sell_to_order(evm, wallet, &data, order, signature, remaining, &state)?,
                Side::Buy => self.buy_from_order(evm, wallet, &data, order, signature, remaining, &state)?,
            };
            state.sold = safe_add(state.sold, result.taker_token_sold)?;
            state.bought = safe_add(state.bought, result.maker_token_bought)?;
            state.eth_remaining = safe_sub(state.eth_remaining, result.protocol_fee_paid)?;
        }

        match data.side {
            Side::Sell if state.sold < data.fill_amount => Err(ZeroExError::IncompleteFillSellQuote {
                sell_token: data.sell_token,
                sold_amount: state.sold,
                sell_amount: data.fill_amount,
            }
            .into()),
            Side::Buy if state.bought < data.fill_amount => Err(ZeroExError::IncompleteFillBuyQuote {
                buy_token: data.buy_token,
                bought_amount: state.bought,
                buy_amount: data.fill_amount,
            }
            .into()),
            _ => {
                debug!(%wallet, sold = %state.sold, bought = %state.bought, "quote filled");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use zeroex_tokens::encode_erc20_asset_data;

    fn order() -> LibOrder::Order {
        LibOrder::Order {
            makerAddress: address!("00000000000000000000000000000000000000aa"),
            takerAddress: Address::ZERO,
            feeRecipientAddress: Address::ZERO,
            senderAddress: Address::ZERO,
            makerAssetAmount: U256::from(100u64),
            takerAssetAmount: U256::from(50u64),
            makerFee: U256::ZERO,
            takerFee: U256::ZERO,
            expirationTimeSeconds: U256::from(1_000u64),
            salt: U256::from(1u64),
            makerAssetData: Bytes::new(),
            takerAssetData: Bytes::new(),
            makerFeeAssetData: Bytes::new(),
            takerFeeAssetData: Bytes::new(),
        }
    }

    #[test]
    fn data_survives_encoding() {
        let data = FillQuoteTransformData {
            side: Side::Buy,
            sell_token: address!("0000000000000000000000000000000000000001"),
            buy_token: address!("0000000000000000000000000000000000000002"),
            orders: vec![order(), order()],
            signatures: vec![Bytes::from(vec![1]), Bytes::new()],
            max_order_fill_amounts: vec![U256::from(7u64)],
            fill_amount: U256::from(99u64),
        };
        assert_eq!(FillQuoteTransformData::abi_decode(&data.abi_encode()).unwrap(), data);
    }

    #[test]
    fn unknown_side_is_rejected() {
        let tuple: DataTuple = (U256::from(2u64), Address::ZERO, Address::ZERO, vec![], vec![], vec![], U256::ZERO);
        assert!(FillQuoteTransformData::abi_decode(&tuple.abi_encode()).is_err());
    }

    #[test]
    fn fee_token_requires_erc20_asset_data() {
        assert_eq!(FillQuoteTransformer::fee_token(&Bytes::new()).unwrap(), Address::ZERO);
        let token = address!("00000000000000000000000000000000000000cc");
        assert_eq!(FillQuoteTransformer::fee_token(&encode_erc20_asset_data(token)).unwrap(), token);
        let bad = Bytes::from(vec![0xde, 0xad]);
        assert_eq!(
            FillQuoteTransformer::fee_token(&bad).unwrap_err().rich(),
            Some(ZeroExError::InvalidERC20AssetData { asset_data: bad })
        );
    }

    #[test]
    fn fee_adjustment_rounds_toward_the_protocol() {
        let mut order = order();
        order.takerFee = U256::from(10u64);
        let results = LibOrder::FillResults {
            makerAssetFilledAmount: U256::from(100u64),
            takerAssetFilledAmount: U256::from(50u64),
            makerFeePaid: U256::ZERO,
            takerFeePaid: U256::from(10u64),
            protocolFeePaid: U256::from(3u64),
        };
        let data = FillQuoteTransformData {
            side: Side::Sell,
            sell_token: address!("0000000000000000000000000000000000000001"),
            buy_token: address!("0000000000000000000000000000000000000002"),
            orders: vec![],
            signatures: vec![],
            max_order_fill_amounts: vec![],
            fill_amount: U256::ZERO,
        };
        let in_sell = FillQuoteTransformer::order_result(results.clone(), data.sell_token, &data).unwrap();
        assert_eq!(in_sell.taker_token_sold, U256::from(60u64));
        assert_eq!(in_sell.maker_token_bought, U256::from(100u64));
        let in_buy = FillQuoteTransformer::order_result(results, data.buy_token, &data).unwrap();
        assert_eq!(in_buy.taker_token_sold, U256::from(50u64));
        assert_eq!(in_buy.maker_token_bought, U256::from(90u64));
        assert_eq!(in_buy.protocol_fee_paid, U256::from(3u64));
    }
}
