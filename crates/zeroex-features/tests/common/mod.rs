//! Shared fixture: a fully migrated proxy, a transformer deployer, tokens
//! and a few test-only transformers.
#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use k256::ecdsa::SigningKey;

use zeroex_core::signature::signer_address;
use zeroex_core::{init_code, Contract, Evm, Frame, Revert, StorageId, StorageRegion};
use zeroex_features::transformers::{decode_transform_data, TransformContext, TransformerContract};
use zeroex_features::{
    deploy_exchange_proxy, register_transformer_artifacts, DeployedProxy, ITransformERC20, ITransformerDeployer,
    PayTakerTransformer, Transformation, Transformer, TransformerDeployer,
};
use zeroex_features::transformers::PayTakerTransformData;
use zeroex_tokens::{Erc20Storage, Erc20Token, IERC20Token, IMintableERC20Token, ReturnStyle};

pub const DEPLOYER: Address = address!("00000000000000000000000000000000000de910");
pub const OWNER: Address = address!("0000000000000000000000000000000000000001");
pub const TAKER: Address = address!("0000000000000000000000000000000000007a4e");
pub const RELAYER: Address = address!("00000000000000000000000000000000000e1a10");
pub const STRANGER: Address = address!("0000000000000000000000000000000000005a5a");

pub const MINT_TRANSFORMER: &str = "MintTransformer";
pub const RECORDING_TRANSFORMER: &str = "RecordingTransformer";
pub const BAD_MAGIC_TRANSFORMER: &str = "BadMagicTransformer";

pub struct Fixture {
    pub evm: Evm,
    pub deployed: DeployedProxy,
    pub proxy: Address,
    pub allowance_target: Address,
    pub transformer_deployer: Address,
    pub sell_token: Address,
    pub buy_token: Address,
    pub pay_taker: Address,
    pub mint: Address,
}

impl Fixture {
    /// Migrated proxy with two tokens, a `PayTakerTransformer` and a
    /// `MintTransformer` deployed through the transformer deployer.
    pub fn new() -> Self {
        let mut evm = Evm::default();
        register_transformer_artifacts(&mut evm);
        register_test_transformers(&mut evm);

        let transformer_deployer = TransformerDeployer::deploy_new(&mut evm, DEPLOYER, vec![DEPLOYER]).unwrap();
        let deployed = deploy_exchange_proxy(&mut evm, DEPLOYER, OWNER, transformer_deployer).unwrap();
        let sell_token = deploy_token(&mut evm, "Sell", ReturnStyle::Standard);
        let buy_token = deploy_token(&mut evm, "Buy", ReturnStyle::Standard);

        let mut fixture = Self {
            evm,
            proxy: deployed.zero_ex,
            allowance_target: deployed.allowance_target,
            deployed,
            transformer_deployer,
            sell_token,
            buy_token,
            pay_taker: Address::ZERO,
            mint: Address::ZERO,
        };
        fixture.pay_taker = fixture.deploy_transformer(PayTakerTransformer::NAME, Bytes::new());
        fixture.mint = fixture.deploy_transformer(MINT_TRANSFORMER, Bytes::new());
        fixture
    }

    pub fn deploy_transformer(&mut self, artifact: &str, args: Bytes) -> Address {
        let call = ITransformerDeployer::deployCall { initCode: init_code(artifact, args) };
        self.evm.transact_sol(DEPLOYER, self.transformer_deployer, U256::ZERO, &call).unwrap().deployedAddress
    }

    /// Mint `amount` of `token` to `owner` and approve the allowance target.
    pub fn fund_and_approve(&mut self, token: Address, owner: Address, amount: U256) {
        mint(&mut self.evm, token, owner, amount);
        approve(&mut self.evm, token, owner, self.allowance_target, amount);
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        token_balance(&self.evm, token, owner)
    }

    pub fn transform(
        &mut self,
        from: Address,
        value: U256,
        call: &ITransformERC20::transformERC20Call,
    ) -> Result<U256, Revert> {
        self.evm.transact_sol(from, self.proxy, value, call).map(|r| r.outputTokenAmount)
    }
}

pub fn deploy_token(evm: &mut Evm, symbol: &str, style: ReturnStyle) -> Address {
    let token = Erc20Token::new(format!("{symbol} Token"), symbol, 18).with_style(style);
    evm.deploy(DEPLOYER, Arc::new(token), U256::ZERO).unwrap()
}

pub fn mint(evm: &mut Evm, token: Address, to: Address, amount: U256) {
    evm.transact_sol(DEPLOYER, token, U256::ZERO, &IMintableERC20Token::mintCall { to, amount }).unwrap();
}

/// Raw call: tokens in the no-return-data style answer with empty output.
pub fn approve(evm: &mut Evm, token: Address, owner: Address, spender: Address, amount: U256) {
    evm.transact(owner, token, U256::ZERO, IERC20Token::approveCall { spender, amount }.abi_encode()).unwrap();
}

pub fn token_balance(evm: &Evm, token: Address, owner: Address) -> U256 {
    evm.storage(token, |s: &Erc20Storage| s.balance_of(owner))
}

pub fn key(seed: u8) -> (SigningKey, Address) {
    let key = SigningKey::from_slice(&[seed; 32]).unwrap();
    let address = signer_address(&key);
    (key, address)
}

pub fn units(n: u64) -> U256 {
    U256::from(n)
}

// ─── Transformations ──────────────────────────────────────────────────────────

pub fn pay_taker(transformer: Address, tokens: Vec<Address>) -> Transformation {
    let data = PayTakerTransformData { tokens, amounts: vec![] };
    Transformation { transformer, tokens: vec![], amounts: vec![], data: data.abi_encode().into() }
}

pub fn mint_into_wallet(transformer: Address, token: Address, amount: U256) -> Transformation {
    Transformation { transformer, tokens: vec![], amounts: vec![], data: (token, amount).abi_encode().into() }
}

// ─── Test transformers ────────────────────────────────────────────────────────

/// Mints `(address token, uint256 amount)` into the wallet.
#[derive(Debug, Clone, Copy, Default)]
pub struct MintTransformer;

impl Transformer for MintTransformer {
    const NAME: &'static str = MINT_TRANSFORMER;

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, data: &Bytes) -> Result<(), Revert> {
        let (token, amount) = decode_transform_data::<(Address, U256)>(data)?;
        evm.call_sol(ctx.wallet, token, U256::ZERO, &IMintableERC20Token::mintCall { to: ctx.wallet, amount })?;
        Ok(())
    }
}

/// What the recording transformer saw, kept in the wallet.
#[derive(Debug, Clone, Default)]
pub struct RecordedCall {
    pub call_data_hash: B256,
    pub taker: Address,
}

impl StorageRegion for RecordedCall {
    const ID: StorageId = StorageId::TestContract;
}

/// Stores the call data hash and taker it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingTransformer;

impl Transformer for RecordingTransformer {
    const NAME: &'static str = RECORDING_TRANSFORMER;

    fn transform(&self, evm: &mut Evm, ctx: &TransformContext, _data: &Bytes) -> Result<(), Revert> {
        evm.storage_mut(ctx.wallet, |s: &mut RecordedCall| {
            s.call_data_hash = ctx.call_data_hash;
            s.taker = ctx.taker;
        })
    }
}

/// Accepts `transform` but answers with the wrong magic.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadMagicTransformer;

impl Contract for BadMagicTransformer {
    fn name(&self) -> &'static str {
        BAD_MAGIC_TRANSFORMER
    }

    fn execute(&self, _evm: &mut Evm, _frame: &Frame) -> Result<Bytes, Revert> {
        Ok(zeroex_features::transformers::IERC20Transformer::transformCall::abi_encode_returns(&(
            alloy_primitives::fixed_bytes!("deadbeef"),
        ))
        .into())
    }
}

pub fn register_test_transformers(evm: &mut Evm) {
    let artifacts = evm.artifacts_mut();
    artifacts.register(MINT_TRANSFORMER, |_| Ok(Arc::new(TransformerContract::new(MintTransformer)) as Arc<dyn Contract>));
    artifacts.register(RECORDING_TRANSFORMER, |_| {
        Ok(Arc::new(TransformerContract::new(RecordingTransformer)) as Arc<dyn Contract>)
    });
    artifacts.register(BAD_MAGIC_TRANSFORMER, |_| Ok(Arc::new(BadMagicTransformer) as Arc<dyn Contract>));
}
