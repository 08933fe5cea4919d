//! `TransformERC20`: runs a chain of transformers inside a puppet and
//! checks what the taker ends up with.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolInterface, SolValue};
use tracing::{debug, info};

use zeroex_core::constants::{is_token_eth, MAX_UINT256, TRANSFORMER_SUCCESS};
use zeroex_core::math::safe_sub;
use zeroex_core::signature::is_valid_hash_signature;
use zeroex_core::{
    Contract, Evm, Frame, InvalidTransformDataErrorCode, Revert, StorageId, StorageRegion, ZeroExError,
};
use zeroex_tokens::compat::balance_of;

use crate::fixin::{migrate_success, only_owner, only_self, register_feature_function, returned_magic};
use crate::puppet::puppet_execute_with;
use crate::puppet_pool::with_puppet;
use crate::signed_call_data;
use crate::token_spender::{spendable_balance, ITokenSpender};
use crate::transformer_deployer::ITransformerDeployer;
use crate::transformers::IERC20Transformer;

sol! {
    #![sol(all_derives)]

    /// One step of a route.
    struct Transformation {
        address transformer;
        address[] tokens;
        uint256[] amounts;
        bytes data;
    }

    interface ITransformERC20 {
        event TransformedERC20(
            address indexed taker,
            address inputToken,
            address outputToken,
            uint256 inputTokenAmount,
            uint256 outputTokenAmount
        );
        event TransformerDeployerUpdated(address transformerDeployer);
        event QuoteSignerUpdated(address quoteSigner);

        function migrate(address transformerDeployer) external returns (bytes4 success);
        function setTransformerDeployer(address transformerDeployer) external;
        function getTransformerDeployer() external view returns (address deployer);
        function setQuoteSigner(address quoteSigner) external;
        function getQuoteSigner() external view returns (address signer);
        function transformERC20(
            address inputToken,
            address outputToken,
            uint256 inputTokenAmount,
            uint256 minOutputTokenAmount,
            Transformation[] transformations
        ) external payable returns (uint256 outputTokenAmount);
        function _transformERC20(
            bytes32 callDataHash,
            address taker,
            address inputToken,
            address outputToken,
            uint256 inputTokenAmount,
            uint256 minOutputTokenAmount,
            Transformation[] transformations
        ) external payable returns (uint256 outputTokenAmount);
    }
}

use ITransformERC20::ITransformERC20Calls as TransformCall;

#[derive(Debug, Clone, Default)]
pub struct TransformERC20Storage {
    pub transformer_deployer: Address,
    pub quote_signer: Address,
}

impl StorageRegion for TransformERC20Storage {
    const ID: StorageId = StorageId::TransformERC20;
}

/// Arguments of one transformation run.
#[derive(Debug, Clone)]
pub struct TransformArgs {
    pub call_data_hash: B256,
    pub taker: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input_token_amount: U256,
    pub min_output_token_amount: U256,
    pub transformations: Vec<Transformation>,
}

/// Hash handed to transformers: the signed body hash if the calldata carries
/// a valid quote-signer signature, zero otherwise.
pub fn call_data_hash(evm: &mut Evm, proxy: Address, input: &[u8]) -> B256 {
    let quote_signer = evm.storage(proxy, |s: &TransformERC20Storage| s.quote_signer);
    let parsed = signed_call_data::parse(input);
    match parsed.signature {
        Some(signature)
            if quote_signer != Address::ZERO
                && is_valid_hash_signature(evm, proxy, parsed.hash, quote_signer, &signature) =>
        {
            parsed.hash
        }
        _ => B256::ZERO,
    }
}

/// Run `args` on the proxy at `proxy` with `value` wei attached.
pub fn transform_erc20(evm: &mut Evm, proxy: Address, value: U256, args: TransformArgs) -> Result<U256, Revert> {
    let mut input_amount = args.input_token_amount;
    if is_token_eth(args.input_token) {
        if input_amount == MAX_UINT256 {
            input_amount = value;
        } else if value < input_amount {
            return Err(ZeroExError::InsufficientEthAttached { eth_attached: value, eth_needed: input_amount }.into());
        }
    }

    let output_amount = with_puppet(evm, proxy, |evm, puppet| {
        let balance_before = balance_of(evm, proxy, args.output_token, args.taker)?;

        if !is_token_eth(args.input_token) {
            if input_amount == MAX_UINT256 {
                input_amount = spendable_balance(evm, proxy, args.input_token, args.taker)?;
            }
            let spend = ITokenSpender::_spendERC20TokensCall {
                token: args.input_token,
                owner: args.taker,
                to: puppet,
                amount: input_amount,
            };
            evm.call_sol(proxy, proxy, U256::ZERO, &spend)?;
        }
        if !value.is_zero() {
            evm.call(proxy, puppet, value, Bytes::new())?;
        }

        let deployer = evm.storage(proxy, |s: &TransformERC20Storage| s.transformer_deployer);
        for (step, transformation) in args.transformations.iter().enumerate() {
            run_transformation(evm, proxy, puppet, deployer, &args, transformation)?;
            debug!(%proxy, %puppet, step, transformer = %transformation.transformer, "transformation done");
        }

        let balance_after = balance_of(evm, proxy, args.output_token, args.taker)?;
        if balance_after < balance_before {
            return Err(ZeroExError::NegativeTransformERC20Output {
                output_token: args.output_token,
                output_token_lost_amount: balance_before - balance_after,
            }
            .into());
        }
        Ok(safe_sub(balance_after, balance_before)?)
    })?;

    if output_amount < args.min_output_token_amount {
        return Err(ZeroExError::IncompleteERC20Transform {
            output_token: args.output_token,
            output_token_amount: output_amount,
            min_output_token_amount: args.min_output_token_amount,
        }
        .into());
    }

    evm.emit(
        proxy,
        &ITransformERC20::TransformedERC20 {
            taker: args.taker,
            inputToken: args.input_token,
            outputToken: args.output_token,
            inputTokenAmount: input_amount,
            outputTokenAmount: output_amount,
        },
    )?;
    info!(
        taker = %args.taker,
        input = %args.input_token,
        output = %args.output_token,
        %input_amount,
        %output_amount,
        "transformed ERC20"
    );
    Ok(output_amount)
}

fn run_transformation(
    evm: &mut Evm,
    proxy: Address,
    puppet: Address,
    deployer: Address,
    args: &TransformArgs,
    transformation: &Transformation,
) -> Result<(), Revert> {
    let transformer = transformation.transformer;
    if deployer != Address::ZERO {
        let call = ITransformerDeployer::toDeploymentNonceCall { deployedAddress: transformer };
        let nonce = evm.static_call_sol(proxy, deployer, &call)?.deploymentNonce;
        if nonce.is_zero() {
            return Err(ZeroExError::UnauthorizedTransformer { transformer, deployer }.into());
        }
    }
    if transformation.tokens.len() != transformation.amounts.len() {
        return Err(ZeroExError::invalid_transform_data(
            InvalidTransformDataErrorCode::InvalidArrayLength,
            transformation.abi_encode(),
        )
        .into());
    }

    let call = IERC20Transformer::transformCall {
        callDataHash: args.call_data_hash,
        taker: args.taker,
        tokens: transformation.tokens.clone(),
        amounts: transformation.amounts.clone(),
        data: transformation.data.clone(),
    };
    let result = puppet_execute_with(evm, proxy, puppet, transformer, call.abi_encode().into())?;
    if !returned_magic(&result, TRANSFORMER_SUCCESS) {
        return Err(ZeroExError::ERC20TransformerFailed { transformer, result_data: result }.into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransformERC20;

impl TransformERC20 {
    pub const SELECTORS: [[u8; 4]; 6] = [
        ITransformERC20::transformERC20Call::SELECTOR,
        ITransformERC20::_transformERC20Call::SELECTOR,
        ITransformERC20::setTransformerDeployerCall::SELECTOR,
        ITransformERC20::getTransformerDeployerCall::SELECTOR,
        ITransformERC20::setQuoteSignerCall::SELECTOR,
        ITransformERC20::getQuoteSignerCall::SELECTOR,
    ];
}

impl Contract for TransformERC20 {
    fn name(&self) -> &'static str {
        "TransformERC20"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        let out = match TransformCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            TransformCall::migrate(c) => {
                evm.storage_mut(proxy, |s: &mut TransformERC20Storage| {
                    s.transformer_deployer = c.transformerDeployer;
                })?;
                for selector in Self::SELECTORS {
                    register_feature_function(evm, frame, selector)?;
                }
                return Ok(migrate_success());
            }
            TransformCall::setTransformerDeployer(c) => {
                only_owner(evm, frame)?;
                evm.storage_mut(proxy, |s: &mut TransformERC20Storage| {
                    s.transformer_deployer = c.transformerDeployer;
                })?;
                evm.emit(
                    proxy,
                    &ITransformERC20::TransformerDeployerUpdated { transformerDeployer: c.transformerDeployer },
                )?;
                info!(%proxy, deployer = %c.transformerDeployer, "transformer deployer updated");
                Vec::new()
            }
            TransformCall::getTransformerDeployer(_) => {
                let deployer = evm.storage(proxy, |s: &TransformERC20Storage| s.transformer_deployer);
                ITransformERC20::getTransformerDeployerCall::abi_encode_returns(&(deployer,))
            }
            TransformCall::setQuoteSigner(c) => {
                only_owner(evm, frame)?;
                evm.storage_mut(proxy, |s: &mut TransformERC20Storage| s.quote_signer = c.quoteSigner)?;
                evm.emit(proxy, &ITransformERC20::QuoteSignerUpdated { quoteSigner: c.quoteSigner })?;
                info!(%proxy, signer = %c.quoteSigner, "quote signer updated");
                Vec::new()
            }
            TransformCall::getQuoteSigner(_) => {
                let signer = evm.storage(proxy, |s: &TransformERC20Storage| s.quote_signer);
                ITransformERC20::getQuoteSignerCall::abi_encode_returns(&(signer,))
            }
            TransformCall::transformERC20(c) => {
                let args = TransformArgs {
                    call_data_hash: call_data_hash(evm, proxy, &frame.input),
                    taker: frame.caller,
                    input_token: c.inputToken,
                    output_token: c.outputToken,
                    input_token_amount: c.inputTokenAmount,
                    min_output_token_amount: c.minOutputTokenAmount,
                    transformations: c.transformations,
                };
                let output = transform_erc20(evm, proxy, frame.value, args)?;
                ITransformERC20::transformERC20Call::abi_encode_returns(&(output,))
            }
            TransformCall::_transformERC20(c) => {
                only_self(frame)?;
                let args = TransformArgs {
                    call_data_hash: c.callDataHash,
                    taker: c.taker,
                    input_token: c.inputToken,
                    output_token: c.outputToken,
                    input_token_amount: c.inputTokenAmount,
                    min_output_token_amount: c.minOutputTokenAmount,
                    transformations: c.transformations,
                };
                let output = transform_erc20(evm, proxy, frame.value, args)?;
                ITransformERC20::_transformERC20Call::abi_encode_returns(&(output,))
            }
        };
        Ok(out.into())
    }
}
