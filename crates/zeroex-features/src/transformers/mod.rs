//! Transformers: stateless steps of a `transformERC20` route.
//!
//! A transformer is deployed once by the `TransformerDeployer` and then only
//! ever runs through `Puppet.executeWith`, i.e. delegate-called by a puppet,
//! so `address(this)` is the puppet wallet holding the tokens in flight.

pub mod affiliate_fee;
pub mod fill_quote;
pub mod pay_taker;
pub mod weth;

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolType, SolValue};
use tracing::{debug, info};

use zeroex_core::constants::TRANSFORMER_SUCCESS;
use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

pub use affiliate_fee::{AffiliateFeeTransformData, AffiliateFeeTransformer, TokenFee};
pub use fill_quote::{FillQuoteTransformData, FillQuoteTransformer, Side};
pub use pay_taker::{PayTakerTransformData, PayTakerTransformer};
pub use weth::{WethTransformData, WethTransformer};

sol! {
    #![sol(all_derives)]

    interface IERC20Transformer {
        function transform(
            bytes32 callDataHash,
            address taker,
            address[] tokens,
            uint256[] amounts,
            bytes data
        ) external returns (bytes4 success);
    }

    interface IKillable {
        function die(address ethRecipient) external;
    }
}

/// What a transformer sees of the call it is running in.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// The puppet wallet (`address(this)`).
    pub wallet: Address,
    /// The transformer's own deployment.
    pub code: Address,
    pub call_data_hash: B256,
    pub taker: Address,
    pub tokens: Vec<Address>,
    pub amounts: Vec<U256>,
}

/// One kind of transformation.
pub trait Transformer: Send + Sync + 'static {
    /// Artifact name the deployer instantiates it under.
    const NAME: &'static str;

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, data: &Bytes) -> Result<(), Revert>;
}

/// Account of the deployed transformer itself.
#[derive(Debug, Clone, Default)]
pub struct TransformerStorage {
    pub deployer: Address,
}

impl StorageRegion for TransformerStorage {
    const ID: StorageId = StorageId::Transformer;
}

/// Contract wrapper giving every transformer the `transform` / `die` ABI.
#[derive(Debug, Clone)]
pub struct TransformerContract<T> {
    inner: T,
}

impl<T: Transformer> TransformerContract<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    fn die(evm: &mut Evm, frame: &Frame, eth_recipient: Address) -> Result<(), Revert> {
        if frame.is_delegated() {
            return Err(ZeroExError::InvalidExecutionContext {
                actual_context: frame.address,
                expected_context: frame.code_address,
            }
            .into());
        }
        let deployer = evm.storage(frame.address, |s: &TransformerStorage| s.deployer);
        if frame.caller != deployer {
            return Err(ZeroExError::OnlyCallableByDeployer { caller: frame.caller, deployer }.into());
        }
        info!(transformer = %frame.address, %eth_recipient, name = T::NAME, "transformer killed");
        evm.self_destruct(frame.address, eth_recipient)
    }
}

impl<T: Transformer> Contract for TransformerContract<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
        evm.storage_mut(frame.address, |s: &mut TransformerStorage| s.deployer = frame.caller)
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        // Plain ETH.
        if frame.input.is_empty() {
            return Ok(Bytes::new());
        }
        if frame.selector().0 == IKillable::dieCall::SELECTOR {
            let call: IKillable::dieCall = frame.decode()?;
            Self::die(evm, frame, call.ethRecipient)?;
            return Ok(Bytes::new());
        }
        let call: IERC20Transformer::transformCall = frame.decode()?;
        let ctx = TransformContext {
            wallet: frame.address,
            code: frame.code_address,
            call_data_hash: call.callDataHash,
            taker: call.taker,
            tokens: call.tokens,
            amounts: call.amounts,
        };
        debug!(wallet = %ctx.wallet, transformer = %ctx.code, name = T::NAME, "transform");
        self.inner.transform(evm, &ctx, &call.data)?;
        Ok(IERC20Transformer::transformCall::abi_encode_returns(&(TRANSFORMER_SUCCESS,)).into())
    }
}

/// Decode `abi.encode(data)` as `D`; malformed data reverts without a reason.
pub fn decode_transform_data<D>(data: &[u8]) -> Result<D, Revert>
where
    D: SolValue + From<<D::SolType as SolType>::RustType>,
{
    D::abi_decode(data, false).map_err(|_| Revert::empty())
}

fn artifact<T: Transformer>(transformer: T) -> Arc<dyn Contract> {
    Arc::new(TransformerContract::new(transformer))
}

/// Make every transformer deployable through init code.
///
/// Constructor arguments: `WethTransformer(address weth)`,
/// `FillQuoteTransformer(address exchange)`, none for the others.
pub fn register_transformer_artifacts(evm: &mut Evm) {
    let artifacts = evm.artifacts_mut();
    artifacts.register(WethTransformer::NAME, |args| {
        let weth = decode_transform_data::<Address>(args)?;
        Ok(artifact(WethTransformer::new(weth)))
    });
    artifacts.register(FillQuoteTransformer::NAME, |args| {
        let exchange = decode_transform_data::<Address>(args)?;
        Ok(artifact(FillQuoteTransformer::new(exchange)))
    });
    artifacts.register(PayTakerTransformer::NAME, |_| Ok(artifact(PayTakerTransformer)));
    artifacts.register(AffiliateFeeTransformer::NAME, |_| Ok(artifact(AffiliateFeeTransformer)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use zeroex_core::init_code;

    const DEPLOYER: Address = address!("00000000000000000000000000000000000000de");
    const OTHER: Address = address!("00000000000000000000000000000000000000aa");

    #[test]
    fn die_is_deployer_only_and_sends_balance() {
        let mut evm = Evm::default();
        register_transformer_artifacts(&mut evm);
        let transformer = evm
            .create_from_init_code(DEPLOYER, &init_code(PayTakerTransformer::NAME, Bytes::new()), U256::ZERO)
            .unwrap();
        evm.fund(transformer, U256::from(5u64));

        let die = IKillable::dieCall { ethRecipient: OTHER };
        let err = evm.transact_sol(OTHER, transformer, U256::ZERO, &die).err().unwrap();
        assert_eq!(err.rich(), Some(ZeroExError::OnlyCallableByDeployer { caller: OTHER, deployer: DEPLOYER }));

        evm.transact_sol(DEPLOYER, transformer, U256::ZERO, &die).unwrap();
        assert!(!evm.has_code(transformer));
        assert_eq!(evm.balance(OTHER), U256::from(5u64));
    }

    #[test]
    fn unknown_artifact_args_revert() {
        let mut evm = Evm::default();
        register_transformer_artifacts(&mut evm);
        let code = init_code(WethTransformer::NAME, Bytes::from(vec![1, 2, 3]));
        assert!(evm.create_from_init_code(DEPLOYER, &code, U256::ZERO).unwrap_err().is_empty());
    }
}
