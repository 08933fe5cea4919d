//! Legacy 0x v3 Exchange, reduced to what quote filling needs.
//!
//! Only ERC20 asset data is supported, and the exchange moves tokens itself
//! (`getAssetProxy` returns the exchange), so takers and makers approve the
//! exchange address directly. The protocol fee is always paid in ETH; any
//! value sent above it is refunded to the caller.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolCall, SolInterface, SolStruct};
use tracing::debug;

use zeroex_core::math::{get_partial_amount_floor, safe_add, safe_mul, safe_sub};
use zeroex_core::signature::validate_hash_signature;
use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::asset_data::decode_erc20_asset_data;
use crate::compat::compat_transfer_from;

sol! {
    #![sol(all_derives)]

    library LibOrder {
        struct Order {
            address makerAddress;
            address takerAddress;
            address feeRecipientAddress;
            address senderAddress;
            uint256 makerAssetAmount;
            uint256 takerAssetAmount;
            uint256 makerFee;
            uint256 takerFee;
            uint256 expirationTimeSeconds;
            uint256 salt;
            bytes makerAssetData;
            bytes takerAssetData;
            bytes makerFeeAssetData;
            bytes takerFeeAssetData;
        }

        struct FillResults {
            uint256 makerAssetFilledAmount;
            uint256 takerAssetFilledAmount;
            uint256 makerFeePaid;
            uint256 takerFeePaid;
            uint256 protocolFeePaid;
        }
    }

    interface ILegacyExchange {
        event Fill(
            address indexed makerAddress,
            address indexed feeRecipientAddress,
            bytes32 indexed orderHash,
            address takerAddress,
            address senderAddress,
            uint256 makerAssetFilledAmount,
            uint256 takerAssetFilledAmount,
            uint256 makerFeePaid,
            uint256 takerFeePaid,
            uint256 protocolFeePaid
        );

        event Cancel(
            address indexed makerAddress,
            address indexed feeRecipientAddress,
            bytes32 indexed orderHash,
            address senderAddress
        );

        function fillOrder(LibOrder.Order order, uint256 takerAssetFillAmount, bytes signature)
            external
            payable
            returns (LibOrder.FillResults fillResults);
        function cancelOrder(LibOrder.Order order) external;
        function getOrderHash(LibOrder.Order order) external view returns (bytes32 orderHash);
        function filled(bytes32 orderHash) external view returns (uint256);
        function cancelled(bytes32 orderHash) external view returns (bool);
        function protocolFeeMultiplier() external view returns (uint256);
        function getAssetProxy(bytes4 assetProxyId) external view returns (address);
    }
}

use ILegacyExchange::ILegacyExchangeCalls as ExchangeCall;
use LibOrder::{FillResults, Order};

/// EIP-712 domain of a v3 exchange deployment.
pub fn exchange_domain(chain_id: u64, exchange: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some("0x Protocol".into()),
        Some("3.0.0".into()),
        Some(U256::from(chain_id)),
        Some(exchange),
        None,
    )
}

/// EIP-712 hash of `order` on the exchange at `exchange`.
pub fn order_hash(order: &Order, chain_id: u64, exchange: Address) -> B256 {
    order.eip712_signing_hash(&exchange_domain(chain_id, exchange))
}

/// Filled taker amounts and cancellations, keyed by order hash.
#[derive(Debug, Clone, Default)]
pub struct ExchangeStorage {
    pub filled: HashMap<B256, U256>,
    pub cancelled: HashSet<B256>,
}

impl StorageRegion for ExchangeStorage {
    const ID: StorageId = StorageId::Exchange;
}

/// Amounts settled by one fill, rounded down in the maker's favour.
pub fn calculate_fill_results(
    order: &Order,
    taker_asset_filled_amount: U256,
    protocol_fee: U256,
) -> Result<FillResults, ZeroExError> {
    let taker_amount = order.takerAssetAmount;
    Ok(FillResults {
        takerAssetFilledAmount: taker_asset_filled_amount,
        makerAssetFilledAmount: get_partial_amount_floor(
            taker_asset_filled_amount,
            taker_amount,
            order.makerAssetAmount,
        )?,
        makerFeePaid: get_partial_amount_floor(taker_asset_filled_amount, taker_amount, order.makerFee)?,
        takerFeePaid: get_partial_amount_floor(taker_asset_filled_amount, taker_amount, order.takerFee)?,
        protocolFeePaid: protocol_fee,
    })
}

/// The exchange contract. `protocol_fee_multiplier * gasprice` wei is owed
/// per fill.
#[derive(Debug, Clone, Copy)]
pub struct Exchange {
    pub protocol_fee_multiplier: U256,
}

impl Exchange {
    pub fn new(protocol_fee_multiplier: u64) -> Self {
        Self { protocol_fee_multiplier: U256::from(protocol_fee_multiplier) }
    }

    fn erc20_token(asset_data: &[u8]) -> Result<Address, Revert> {
        decode_erc20_asset_data(asset_data).ok_or_else(|| Revert::reason("Exchange/UNSUPPORTED_ASSET_PROXY"))
    }

    fn fill_order(
        &self,
        evm: &mut Evm,
        frame: &Frame,
        order: Order,
        fill_amount: U256,
        signature: Bytes,
    ) -> Result<FillResults, Revert> {
        let exchange = frame.address;
        let taker = frame.caller;
        let hash = order_hash(&order, evm.chain_id(), exchange);
        let (filled, cancelled) = evm.storage(exchange, |s: &ExchangeStorage| {
            (s.filled.get(&hash).copied().unwrap_or_default(), s.cancelled.contains(&hash))
        });

        if order.makerAssetAmount.is_zero() || order.takerAssetAmount.is_zero() {
            return Err(Revert::reason("Exchange/INVALID_ORDER"));
        }
        if U256::from(evm.block().timestamp) >= order.expirationTimeSeconds {
            return Err(Revert::reason("Exchange/ORDER_EXPIRED"));
        }
        if cancelled {
            return Err(Revert::reason("Exchange/ORDER_CANCELLED"));
        }
        if filled >= order.takerAssetAmount {
            return Err(Revert::reason("Exchange/ORDER_FULLY_FILLED"));
        }
        if order.takerAddress != Address::ZERO && order.takerAddress != taker {
            return Err(Revert::reason("Exchange/INVALID_TAKER"));
        }
        if order.senderAddress != Address::ZERO && order.senderAddress != taker {
            return Err(Revert::reason("Exchange/INVALID_SENDER"));
        }
        if filled.is_zero()
            && validate_hash_signature(evm, exchange, hash, order.makerAddress, &signature).is_err()
        {
            return Err(Revert::reason("Exchange/INVALID_ORDER_SIGNATURE"));
        }
        if fill_amount.is_zero() {
            return Err(Revert::reason("Exchange/INVALID_TAKER_AMOUNT"));
        }

        let protocol_fee = safe_mul(self.protocol_fee_multiplier, evm.tx().gas_price)?;
        if frame.value < protocol_fee {
            return Err(Revert::reason("Exchange/INSUFFICIENT_PROTOCOL_FEE"));
        }

        let remaining = safe_sub(order.takerAssetAmount, filled)?;
        let results = calculate_fill_results(&order, fill_amount.min(remaining), protocol_fee)?;
        let new_filled = safe_add(filled, results.takerAssetFilledAmount)?;
        evm.storage_mut(exchange, |s: &mut ExchangeStorage| {
            s.filled.insert(hash, new_filled);
        })?;

        let maker = order.makerAddress;
        let fee_recipient = order.feeRecipientAddress;
        let maker_token = Self::erc20_token(&order.makerAssetData)?;
        let taker_token = Self::erc20_token(&order.takerAssetData)?;
        compat_transfer_from(evm, exchange, taker_token, taker, maker, results.takerAssetFilledAmount)?;
        compat_transfer_from(evm, exchange, maker_token, maker, taker, results.makerAssetFilledAmount)?;
        if !results.takerFeePaid.is_zero() {
            let fee_token = Self::erc20_token(&order.takerFeeAssetData)?;
            compat_transfer_from(evm, exchange, fee_token, taker, fee_recipient, results.takerFeePaid)?;
        }
        if !results.makerFeePaid.is_zero() {
            let fee_token = Self::erc20_token(&order.makerFeeAssetData)?;
            compat_transfer_from(evm, exchange, fee_token, maker, fee_recipient, results.makerFeePaid)?;
        }

        let refund = frame.value - protocol_fee;
        if !refund.is_zero() {
            evm.call(exchange, taker, refund, Bytes::new())?;
        }

        evm.emit(
            exchange,
            &ILegacyExchange::Fill {
                makerAddress: maker,
                feeRecipientAddress: fee_recipient,
                orderHash: hash,
                takerAddress: taker,
                senderAddress: taker,
                makerAssetFilledAmount: results.makerAssetFilledAmount,
                takerAssetFilledAmount: results.takerAssetFilledAmount,
                makerFeePaid: results.makerFeePaid,
                takerFeePaid: results.takerFeePaid,
                protocolFeePaid: results.protocolFeePaid,
            },
        )?;
        debug!(
            order = %hash,
            %taker,
            maker_filled = %results.makerAssetFilledAmount,
            taker_filled = %results.takerAssetFilledAmount,
            "order filled"
        );
        Ok(results)
    }

    fn cancel_order(evm: &mut Evm, frame: &Frame, order: Order) -> Result<(), Revert> {
        if order.makerAddress != frame.caller {
            return Err(Revert::reason("Exchange/INVALID_MAKER"));
        }
        let hash = order_hash(&order, evm.chain_id(), frame.address);
        evm.storage_mut(frame.address, |s: &mut ExchangeStorage| {
            s.cancelled.insert(hash);
        })?;
        evm.emit(
            frame.address,
            &ILegacyExchange::Cancel {
                makerAddress: order.makerAddress,
                feeRecipientAddress: order.feeRecipientAddress,
                orderHash: hash,
                senderAddress: frame.caller,
            },
        )
    }
}

impl Contract for Exchange {
    fn name(&self) -> &'static str {
        "Exchange"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let call = ExchangeCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())?;
        let exchange = frame.address;
        let out = match call {
            ExchangeCall::fillOrder(c) => {
                let results = self.fill_order(evm, frame, c.order, c.takerAssetFillAmount, c.signature)?;
                ILegacyExchange::fillOrderCall::abi_encode_returns(&(results,))
            }
            ExchangeCall::cancelOrder(c) => {
                Self::cancel_order(evm, frame, c.order)?;
                Vec::new()
            }
            ExchangeCall::getOrderHash(c) => {
                let hash = order_hash(&c.order, evm.chain_id(), exchange);
                ILegacyExchange::getOrderHashCall::abi_encode_returns(&(hash,))
            }
            ExchangeCall::filled(c) => {
                let filled = evm.storage(exchange, |s: &ExchangeStorage| {
                    s.filled.get(&c.orderHash).copied().unwrap_or_default()
                });
                ILegacyExchange::filledCall::abi_encode_returns(&(filled,))
            }
            ExchangeCall::cancelled(c) => {
                let cancelled = evm.storage(exchange, |s: &ExchangeStorage| s.cancelled.contains(&c.orderHash));
                ILegacyExchange::cancelledCall::abi_encode_returns(&(cancelled,))
            }
            ExchangeCall::protocolFeeMultiplier(_) => {
                ILegacyExchange::protocolFeeMultiplierCall::abi_encode_returns(&(self.protocol_fee_multiplier,))
            }
            ExchangeCall::getAssetProxy(_) => ILegacyExchange::getAssetProxyCall::abi_encode_returns(&(exchange,)),
        };
        Ok(out.into())
    }
}
