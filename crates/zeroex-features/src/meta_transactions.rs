//! `MetaTransactions`: lets a relayer submit calls signed by someone else.
//!
//! A meta-transaction is an EIP-712 signed `MetaTransactionData`. It can be
//! executed once, within its gas price bounds and before it expires, and
//! only runs `transformERC20` with the signer as taker.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, Selector, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolCall, SolInterface, SolStruct};
use tracing::{debug, info};

use zeroex_core::signature::validate_hash_signature;
use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::fixin::{migrate_success, register_feature_function};
use crate::reentrancy::{with_reentrancy_guard, REENTRANCY_MTX};
use crate::token_spender::ITokenSpender;
use crate::transform_erc20::{call_data_hash, ITransformERC20};

sol! {
    #![sol(all_derives)]

    struct MetaTransactionData {
        address signer;
        address sender;
        uint256 minGasPrice;
        uint256 maxGasPrice;
        uint256 expirationTimeSeconds;
        uint256 salt;
        bytes callData;
        uint256 value;
        address feeToken;
        uint256 feeAmount;
    }

    interface IMetaTransactions {
        event MetaTransactionExecuted(bytes32 hash, bytes4 indexed selector, address signer, address sender);

        function migrate() external returns (bytes4 success);
        function executeMetaTransaction(MetaTransactionData mtx, bytes signature)
            external
            payable
            returns (bytes returnResult);
        function batchExecuteMetaTransactions(MetaTransactionData[] mtxs, bytes[] signatures)
            external
            payable
            returns (bytes[] returnResults);
        function getMetaTransactionExecutedBlock(MetaTransactionData mtx) external view returns (uint256 blockNumber);
        function getMetaTransactionHashExecutedBlock(bytes32 mtxHash) external view returns (uint256 blockNumber);
        function getMetaTransactionHash(MetaTransactionData mtx) external view returns (bytes32 mtxHash);
    }
}

use IMetaTransactions::IMetaTransactionsCalls as MtxCall;

#[derive(Debug, Clone, Default)]
pub struct MetaTransactionsStorage {
    /// Block each executed meta-transaction hash ran in.
    pub executed_block: HashMap<B256, U256>,
}

impl StorageRegion for MetaTransactionsStorage {
    const ID: StorageId = StorageId::MetaTransactions;
}

/// EIP-712 domain of the proxy at `proxy`.
pub fn proxy_domain(chain_id: u64, proxy: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some("ZeroEx".into()),
        Some("1.0.0".into()),
        Some(U256::from(chain_id)),
        Some(proxy),
        None,
    )
}

pub fn meta_transaction_hash(mtx: &MetaTransactionData, chain_id: u64, proxy: Address) -> B256 {
    mtx.eip712_signing_hash(&proxy_domain(chain_id, proxy))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetaTransactions;

impl MetaTransactions {
    pub const SELECTORS: [[u8; 4]; 5] = [
        IMetaTransactions::executeMetaTransactionCall::SELECTOR,
        IMetaTransactions::batchExecuteMetaTransactionsCall::SELECTOR,
        IMetaTransactions::getMetaTransactionExecutedBlockCall::SELECTOR,
        IMetaTransactions::getMetaTransactionHashExecutedBlockCall::SELECTOR,
        IMetaTransactions::getMetaTransactionHashCall::SELECTOR,
    ];

    fn executed_block(evm: &Evm, proxy: Address, hash: B256) -> U256 {
        evm.storage(proxy, |s: &MetaTransactionsStorage| s.executed_block.get(&hash).copied().unwrap_or_default())
    }

    fn validate(
        evm: &mut Evm,
        proxy: Address,
        sender: Address,
        hash: B256,
        mtx: &MetaTransactionData,
        signature: &Bytes,
    ) -> Result<(), Revert> {
        if mtx.sender != Address::ZERO && mtx.sender != sender {
            return Err(ZeroExError::MetaTransactionWrongSender { mtx_hash: hash, sender, expected_sender: mtx.sender }
                .into());
        }
        let now = U256::from(evm.block().timestamp);
        if mtx.expirationTimeSeconds <= now {
            return Err(ZeroExError::MetaTransactionExpired {
                mtx_hash: hash,
                time: now,
                expiration_time: mtx.expirationTimeSeconds,
            }
            .into());
        }
        let gas_price = evm.tx().gas_price;
        if gas_price < mtx.minGasPrice || gas_price > mtx.maxGasPrice {
            return Err(ZeroExError::MetaTransactionGasPrice {
                mtx_hash: hash,
                gas_price,
                min_gas_price: mtx.minGasPrice,
                max_gas_price: mtx.maxGasPrice,
            }
            .into());
        }
        let balance = evm.balance(proxy);
        if mtx.value > balance {
            return Err(ZeroExError::MetaTransactionInsufficientEth {
                mtx_hash: hash,
                eth_balance: balance,
                eth_required: mtx.value,
            }
            .into());
        }
        if let Err(err) = validate_hash_signature(evm, proxy, hash, mtx.signer, signature) {
            return Err(ZeroExError::MetaTransactionInvalidSignature {
                mtx_hash: hash,
                signature: signature.clone(),
                err_data: err.abi_encode(),
            }
            .into());
        }
        let executed = Self::executed_block(evm, proxy, hash);
        if !executed.is_zero() {
            return Err(ZeroExError::MetaTransactionAlreadyExecuted { mtx_hash: hash, executed_block_number: executed }
                .into());
        }
        Ok(())
    }

    /// Execute one meta-transaction without taking the reentrancy guard.
    fn execute_one(
        evm: &mut Evm,
        proxy: Address,
        sender: Address,
        mtx: MetaTransactionData,
        signature: Bytes,
    ) -> Result<Bytes, Revert> {
        let hash = meta_transaction_hash(&mtx, evm.chain_id(), proxy);
        Self::validate(evm, proxy, sender, hash, &mtx, &signature)?;

        let block = U256::from(evm.block().number);
        evm.storage_mut(proxy, |s: &mut MetaTransactionsStorage| {
            s.executed_block.insert(hash, block);
        })?;

        if !mtx.feeAmount.is_zero() {
            let spend = ITokenSpender::_spendERC20TokensCall {
                token: mtx.feeToken,
                owner: mtx.signer,
                to: sender,
                amount: mtx.feeAmount,
            };
            evm.call_sol(proxy, proxy, U256::ZERO, &spend)?;
        }

        let selector = mtx.callData.get(..4).map(Selector::from_slice).unwrap_or_default();
        if selector.0 != ITransformERC20::transformERC20Call::SELECTOR {
            return Err(ZeroExError::MetaTransactionUnsupportedFunction { mtx_hash: hash, selector }.into());
        }
        let result = Self::execute_transform_erc20(evm, proxy, hash, &mtx).map_err(|revert| {
            ZeroExError::MetaTransactionCallFailed {
                mtx_hash: hash,
                call_data: mtx.callData.clone(),
                return_data: revert.into_data(),
            }
        })?;

        evm.emit(
            proxy,
            &IMetaTransactions::MetaTransactionExecuted { hash, selector, signer: mtx.signer, sender },
        )?;
        info!(%proxy, %hash, signer = %mtx.signer, %sender, "meta-transaction executed");
        Ok(result)
    }

    /// Re-issue `transformERC20` calldata as `_transformERC20` on behalf of
    /// the signer.
    fn execute_transform_erc20(
        evm: &mut Evm,
        proxy: Address,
        hash: B256,
        mtx: &MetaTransactionData,
    ) -> Result<Bytes, Revert> {
        let call = ITransformERC20::transformERC20Call::abi_decode(&mtx.callData, false)
            .map_err(|_| Revert::empty())?;
        let inner = ITransformERC20::_transformERC20Call {
            callDataHash: call_data_hash(evm, proxy, &mtx.callData),
            taker: mtx.signer,
            inputToken: call.inputToken,
            outputToken: call.outputToken,
            inputTokenAmount: call.inputTokenAmount,
            minOutputTokenAmount: call.minOutputTokenAmount,
            transformations: call.transformations,
        };
        debug!(%proxy, mtx = %hash, "running transformERC20 for signer");
        evm.call(proxy, proxy, mtx.value, inner.abi_encode())
    }

    /// Send back ETH attached to this call that execution did not use.
    fn refund(evm: &mut Evm, frame: &Frame, initial_balance: U256) -> Result<(), Revert> {
        let balance = evm.balance(frame.address);
        if balance > initial_balance {
            let refund = balance - initial_balance;
            evm.call(frame.address, frame.caller, refund, Bytes::new())?;
            debug!(to = %frame.caller, %refund, "refunded attached ETH");
        }
        Ok(())
    }
}

impl Contract for MetaTransactions {
    fn name(&self) -> &'static str {
        "MetaTransactions"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        let sender = frame.caller;
        let initial_balance = evm.balance(proxy).saturating_sub(frame.value);
        let out = match MtxCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            MtxCall::migrate(_) => {
                for selector in Self::SELECTORS {
                    register_feature_function(evm, frame, selector)?;
                }
                return Ok(migrate_success());
            }
            MtxCall::executeMetaTransaction(c) => {
                let result = with_reentrancy_guard(evm, proxy, frame.selector(), REENTRANCY_MTX, |evm| {
                    Self::execute_one(evm, proxy, sender, c.mtx, c.signature)
                })?;
                Self::refund(evm, frame, initial_balance)?;
                IMetaTransactions::executeMetaTransactionCall::abi_encode_returns(&(result,))
            }
            MtxCall::batchExecuteMetaTransactions(c) => {
                if c.mtxs.len() != c.signatures.len() {
                    return Err(ZeroExError::InvalidMetaTransactionsArrayLengths {
                        mtx_count: U256::from(c.mtxs.len()),
                        signature_count: U256::from(c.signatures.len()),
                    }
                    .into());
                }
                let results = with_reentrancy_guard(evm, proxy, frame.selector(), REENTRANCY_MTX, |evm| {
                    c.mtxs
                        .into_iter()
                        .zip(c.signatures)
                        .map(|(mtx, signature)| Self::execute_one(evm, proxy, sender, mtx, signature))
                        .collect::<Result<Vec<_>, _>>()
                })?;
                Self::refund(evm, frame, initial_balance)?;
                IMetaTransactions::batchExecuteMetaTransactionsCall::abi_encode_returns(&(results,))
            }
            MtxCall::getMetaTransactionExecutedBlock(c) => {
                let hash = meta_transaction_hash(&c.mtx, evm.chain_id(), proxy);
                let block = Self::executed_block(evm, proxy, hash);
                IMetaTransactions::getMetaTransactionExecutedBlockCall::abi_encode_returns(&(block,))
            }
            MtxCall::getMetaTransactionHashExecutedBlock(c) => {
                let block = Self::executed_block(evm, proxy, c.mtxHash);
                IMetaTransactions::getMetaTransactionHashExecutedBlockCall::abi_encode_returns(&(block,))
            }
            MtxCall::getMetaTransactionHash(c) => {
                let hash = meta_transaction_hash(&c.mtx, evm.chain_id(), proxy);
                IMetaTransactions::getMetaTransactionHashCall::abi_encode_returns(&(hash,))
            }
        };
        Ok(out.into())
    }
}
