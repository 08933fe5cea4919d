//! `transformERC20` end to end: spending, transformer runs and output checks.

mod common;

use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};

use common::*;
use zeroex_core::constants::{ETH_TOKEN_ADDRESS, MAX_UINT256};
use zeroex_core::{init_code, InvalidTransformDataErrorCode, RevertDecoder, RevertKind, ZeroExError};
use zeroex_features::puppet_pool::PuppetPoolStorage;
use zeroex_features::signed_call_data::sign_call_data;
use zeroex_features::transformers::{AffiliateFeeTransformData, PayTakerTransformData, TokenFee, WethTransformData};
use zeroex_features::{
    AffiliateFeeTransformer, ITokenSpender, ITransformERC20, PayTakerTransformer, Transformation, Transformer,
    WethTransformer,
};
use zeroex_tokens::{ReturnStyle, Weth9, IWETH9};

const FEE_RECIPIENT: Address = alloy_primitives::address!("0000000000000000000000000000000000000fee");

fn mint_and_pay(f: &Fixture, amount: u64) -> Vec<Transformation> {
    vec![mint_into_wallet(f.mint, f.buy_token, units(amount)), pay_taker(f.pay_taker, vec![f.buy_token])]
}

fn call(
    f: &Fixture,
    input: u64,
    min_output: u64,
    transformations: Vec<Transformation>,
) -> ITransformERC20::transformERC20Call {
    ITransformERC20::transformERC20Call {
        inputToken: f.sell_token,
        outputToken: f.buy_token,
        inputTokenAmount: units(input),
        minOutputTokenAmount: units(min_output),
        transformations,
    }
}

fn free_puppet(f: &Fixture) -> Address {
    f.evm.storage(f.proxy, |s: &PuppetPoolStorage| s.free[0])
}

#[test]
fn output_reaches_the_taker() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(100));
    let transformations = mint_and_pay(&f, 40);
    let output = f.transform(TAKER, U256::ZERO, &call(&f, 100, 40, transformations)).unwrap();

    assert_eq!(output, units(40));
    assert_eq!(f.balance(f.buy_token, TAKER), units(40));
    assert_eq!(f.balance(f.sell_token, TAKER), U256::ZERO);
    // the input stays in the puppet, which is back in the pool
    assert_eq!(f.balance(f.sell_token, free_puppet(&f)), units(100));

    let events = f.evm.events::<ITransformERC20::TransformedERC20>();
    assert_eq!(events.len(), 1);
    let (emitter, event) = &events[0];
    assert_eq!(*emitter, f.proxy);
    assert_eq!(event.taker, TAKER);
    assert_eq!(event.inputTokenAmount, units(100));
    assert_eq!(event.outputTokenAmount, units(40));
}

#[test]
fn shortfall_reports_exact_amounts() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(100));
    let transformations = mint_and_pay(&f, 40);
    let err = f.transform(TAKER, U256::ZERO, &call(&f, 100, 50, transformations)).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::IncompleteERC20Transform {
            output_token: f.buy_token,
            output_token_amount: units(40),
            min_output_token_amount: units(50),
        })
    );
    // nothing moved
    assert_eq!(f.balance(f.sell_token, TAKER), units(100));
    assert_eq!(f.balance(f.buy_token, TAKER), U256::ZERO);
}

#[test]
fn losing_output_tokens_is_rejected() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(100));
    let mut c = call(&f, 30, 0, vec![]);
    c.outputToken = f.sell_token;
    let err = f.transform(TAKER, U256::ZERO, &c).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::NegativeTransformERC20Output { output_token: f.sell_token, output_token_lost_amount: units(30) })
    );
}

#[test]
fn max_input_spends_the_spendable_balance() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(70));
    // a larger balance than allowance: only the allowance is spendable
    mint(&mut f.evm, f.sell_token, TAKER, units(30));
    let spendable = f
        .evm
        .transact_sol(
            TAKER,
            f.proxy,
            U256::ZERO,
            &ITokenSpender::getSpendableERC20BalanceOfCall { token: f.sell_token, owner: TAKER },
        )
        .unwrap()
        .amount;
    assert_eq!(spendable, units(70));

    let mut c = call(&f, 0, 1, mint_and_pay(&f, 1));
    c.inputTokenAmount = MAX_UINT256;
    f.transform(TAKER, U256::ZERO, &c).unwrap();
    assert_eq!(f.balance(f.sell_token, TAKER), units(30));
    let events = f.evm.events::<ITransformERC20::TransformedERC20>();
    assert_eq!(events[0].1.inputTokenAmount, units(70));
}

#[test]
fn spend_failure_is_wrapped() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let transformations = mint_and_pay(&f, 1);
    let err = f.transform(TAKER, U256::ZERO, &call(&f, 100, 0, transformations)).unwrap_err();
    match err.rich() {
        Some(ZeroExError::SpenderERC20TransferFromFailed { token, owner, amount, .. }) => {
            assert_eq!(token, f.sell_token);
            assert_eq!(owner, TAKER);
            assert_eq!(amount, units(100));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn non_compliant_input_token_is_spent() {
    let mut f = Fixture::new();
    let usdt = deploy_token(&mut f.evm, "USDT", ReturnStyle::NoReturnData);
    f.fund_and_approve(usdt, TAKER, units(25));
    let mut c = call(&f, 25, 5, mint_and_pay(&f, 5));
    c.inputToken = usdt;
    f.transform(TAKER, U256::ZERO, &c).unwrap();
    assert_eq!(f.balance(usdt, TAKER), U256::ZERO);
    assert_eq!(f.balance(usdt, free_puppet(&f)), units(25));
}

#[test]
fn transformers_must_come_from_the_deployer() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let rogue = f
        .evm
        .create_from_init_code(STRANGER, &init_code(PayTakerTransformer::NAME, Bytes::new()), U256::ZERO)
        .unwrap();
    let err = f.transform(TAKER, U256::ZERO, &call(&f, 10, 0, vec![pay_taker(rogue, vec![])])).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::UnauthorizedTransformer { transformer: rogue, deployer: f.transformer_deployer })
    );
}

#[test]
fn transformer_must_return_the_magic() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let bad = f.deploy_transformer(BAD_MAGIC_TRANSFORMER, Bytes::new());
    let err = f.transform(TAKER, U256::ZERO, &call(&f, 10, 0, vec![pay_taker(bad, vec![])])).unwrap_err();
    assert!(matches!(err.rich(), Some(ZeroExError::ERC20TransformerFailed { transformer, .. }) if transformer == bad));
}

#[test]
fn mismatched_tokens_and_amounts_are_rejected() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let mut step = pay_taker(f.pay_taker, vec![]);
    step.tokens = vec![f.sell_token];
    let err = f.transform(TAKER, U256::ZERO, &call(&f, 10, 0, vec![step.clone()])).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::invalid_transform_data(
            InvalidTransformDataErrorCode::InvalidArrayLength,
            step.abi_encode(),
        ))
    );
}

#[test]
fn failing_transformer_cause_is_decodable() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    // minting from a token that does not exist
    let step = mint_into_wallet(f.mint, STRANGER, units(1));
    let err = f.transform(TAKER, U256::ZERO, &call(&f, 10, 0, vec![step])).unwrap_err();
    assert!(matches!(err.rich(), Some(ZeroExError::PuppetExecuteWithFailed { .. })));
    let decoded = RevertDecoder::new().decode(err.data());
    assert_eq!(decoded.root_cause().kind, RevertKind::Empty);
}

#[test]
fn eth_input_needs_enough_value() {
    let mut f = Fixture::new();
    let mut c = call(&f, 1_000, 0, vec![]);
    c.inputToken = ETH_TOKEN_ADDRESS;
    f.evm.fund(TAKER, units(1_000));
    let err = f.transform(TAKER, units(500), &c).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::InsufficientEthAttached { eth_attached: units(500), eth_needed: units(1_000) })
    );
}

#[test]
fn eth_is_wrapped_for_the_taker() {
    let mut f = Fixture::new();
    let weth = f.evm.deploy(DEPLOYER, std::sync::Arc::new(Weth9::new()), U256::ZERO).unwrap();
    let wrapper = f.deploy_transformer(WethTransformer::NAME, weth.abi_encode().into());
    f.evm.fund(TAKER, units(1_000));

    let wrap = WethTransformData { token: ETH_TOKEN_ADDRESS, amount: MAX_UINT256 };
    let transformations = vec![
        Transformation { transformer: wrapper, tokens: vec![], amounts: vec![], data: wrap.abi_encode().into() },
        pay_taker(f.pay_taker, vec![weth]),
    ];
    let c = ITransformERC20::transformERC20Call {
        inputToken: ETH_TOKEN_ADDRESS,
        outputToken: weth,
        inputTokenAmount: MAX_UINT256,
        minOutputTokenAmount: units(1_000),
        transformations,
    };
    let output = f.transform(TAKER, units(1_000), &c).unwrap();
    assert_eq!(output, units(1_000));
    assert_eq!(f.balance(weth, TAKER), units(1_000));
    assert_eq!(f.evm.balance(TAKER), U256::ZERO);
    assert_eq!(f.evm.balance(weth), units(1_000));
}

#[test]
fn weth_is_unwrapped_for_the_taker() {
    let mut f = Fixture::new();
    let weth = f.evm.deploy(DEPLOYER, std::sync::Arc::new(Weth9::new()), U256::ZERO).unwrap();
    let unwrapper = f.deploy_transformer(WethTransformer::NAME, weth.abi_encode().into());
    f.evm.fund(TAKER, units(1_000));
    f.evm.transact_sol(TAKER, weth, units(1_000), &IWETH9::depositCall {}).unwrap();
    approve(&mut f.evm, weth, TAKER, f.allowance_target, MAX_UINT256);

    // the sentinel unwraps whatever the wallet holds
    let unwrap = WethTransformData { token: weth, amount: MAX_UINT256 };
    let transformations = vec![
        Transformation { transformer: unwrapper, tokens: vec![], amounts: vec![], data: unwrap.abi_encode().into() },
        pay_taker(f.pay_taker, vec![ETH_TOKEN_ADDRESS]),
    ];
    let c = ITransformERC20::transformERC20Call {
        inputToken: weth,
        outputToken: ETH_TOKEN_ADDRESS,
        inputTokenAmount: units(1_000),
        minOutputTokenAmount: units(1_000),
        transformations,
    };
    let output = f.transform(TAKER, U256::ZERO, &c).unwrap();
    assert_eq!(output, units(1_000));
    assert_eq!(f.evm.balance(TAKER), units(1_000));
    assert_eq!(f.balance(weth, TAKER), U256::ZERO);
    assert_eq!(f.evm.balance(weth), U256::ZERO);
}

#[test]
fn unwrapping_more_than_held_fails() {
    let mut f = Fixture::new();
    let weth = f.evm.deploy(DEPLOYER, std::sync::Arc::new(Weth9::new()), U256::ZERO).unwrap();
    let unwrapper = f.deploy_transformer(WethTransformer::NAME, weth.abi_encode().into());
    f.evm.fund(TAKER, units(100));
    f.evm.transact_sol(TAKER, weth, units(100), &IWETH9::depositCall {}).unwrap();
    approve(&mut f.evm, weth, TAKER, f.allowance_target, MAX_UINT256);

    let unwrap = WethTransformData { token: weth, amount: units(101) };
    let c = ITransformERC20::transformERC20Call {
        inputToken: weth,
        outputToken: ETH_TOKEN_ADDRESS,
        inputTokenAmount: units(100),
        minOutputTokenAmount: U256::ZERO,
        transformations: vec![Transformation {
            transformer: unwrapper,
            tokens: vec![],
            amounts: vec![],
            data: unwrap.abi_encode().into(),
        }],
    };
    let err = f.transform(TAKER, U256::ZERO, &c).unwrap_err();
    assert!(matches!(err.rich(), Some(ZeroExError::PuppetExecuteWithFailed { .. })));
    assert_eq!(f.balance(weth, TAKER), units(100));
}

#[test]
fn pay_taker_honours_explicit_amounts() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(100));
    let pay = PayTakerTransformData { tokens: vec![f.buy_token, f.sell_token], amounts: vec![units(30), MAX_UINT256] };
    let transformations = vec![
        mint_into_wallet(f.mint, f.buy_token, units(50)),
        Transformation { transformer: f.pay_taker, tokens: vec![], amounts: vec![], data: pay.abi_encode().into() },
    ];
    let output = f.transform(TAKER, U256::ZERO, &call(&f, 100, 30, transformations)).unwrap();

    assert_eq!(output, units(30));
    assert_eq!(f.balance(f.buy_token, TAKER), units(30));
    // the sentinel pays the whole input back
    assert_eq!(f.balance(f.sell_token, TAKER), units(100));
    // the rest stays behind in the puppet
    assert_eq!(f.balance(f.buy_token, free_puppet(&f)), units(20));
}

#[test]
fn affiliate_fee_is_taken_before_payout() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(100));
    let affiliate = f.deploy_transformer(AffiliateFeeTransformer::NAME, Bytes::new());
    let fees = AffiliateFeeTransformData {
        fees: vec![TokenFee { token: f.buy_token, amount: units(5), recipient: FEE_RECIPIENT }],
    };
    let transformations = vec![
        mint_into_wallet(f.mint, f.buy_token, units(50)),
        Transformation { transformer: affiliate, tokens: vec![], amounts: vec![], data: fees.abi_encode().into() },
        pay_taker(f.pay_taker, vec![f.buy_token, f.sell_token]),
    ];
    let output = f.transform(TAKER, U256::ZERO, &call(&f, 100, 45, transformations)).unwrap();
    assert_eq!(output, units(45));
    assert_eq!(f.balance(f.buy_token, FEE_RECIPIENT), units(5));
    // unused input is handed back too
    assert_eq!(f.balance(f.sell_token, TAKER), units(100));
}

#[test]
fn unsigned_calldata_gives_zero_hash() {
    let mut f = Fixture::new();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let recorder = f.deploy_transformer(RECORDING_TRANSFORMER, Bytes::new());
    let c = call(&f, 10, 0, vec![pay_taker(recorder, vec![])]);
    f.transform(TAKER, U256::ZERO, &c).unwrap();
    let recorded = f.evm.storage(free_puppet(&f), |s: &RecordedCall| s.clone());
    assert_eq!(recorded.call_data_hash, alloy_primitives::B256::ZERO);
    assert_eq!(recorded.taker, TAKER);
}

#[test]
fn quote_signer_signature_exposes_calldata_hash() {
    let mut f = Fixture::new();
    let (quote_key, quote_signer) = key(0x51);
    f.evm
        .transact_sol(OWNER, f.proxy, U256::ZERO, &ITransformERC20::setQuoteSignerCall { quoteSigner: quote_signer })
        .unwrap();
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let recorder = f.deploy_transformer(RECORDING_TRANSFORMER, Bytes::new());

    let body = call(&f, 10, 0, vec![pay_taker(recorder, vec![])]).abi_encode();
    let signed = sign_call_data(&quote_key, &body).unwrap();
    f.evm.transact(TAKER, f.proxy, U256::ZERO, signed).unwrap();
    let recorded = f.evm.storage(free_puppet(&f), |s: &RecordedCall| s.clone());
    assert_eq!(recorded.call_data_hash, keccak256(&body));

    // signed by someone else: zero hash
    let (other_key, _) = key(0x52);
    f.fund_and_approve(f.sell_token, TAKER, units(10));
    let signed = sign_call_data(&other_key, &body).unwrap();
    f.evm.transact(TAKER, f.proxy, U256::ZERO, signed).unwrap();
    let recorded = f.evm.storage(free_puppet(&f), |s: &RecordedCall| s.clone());
    assert_eq!(recorded.call_data_hash, alloy_primitives::B256::ZERO);
}

#[test]
fn only_the_owner_configures_transform_erc20() {
    let mut f = Fixture::new();
    let set = ITransformERC20::setTransformerDeployerCall { transformerDeployer: STRANGER };
    let err = f.evm.transact_sol(STRANGER, f.proxy, U256::ZERO, &set).err().unwrap();
    assert_eq!(err.rich(), Some(ZeroExError::OnlyOwner { sender: STRANGER, owner: OWNER }));
    f.evm.transact_sol(OWNER, f.proxy, U256::ZERO, &set).unwrap();
    assert_eq!(f.evm.events::<ITransformERC20::TransformerDeployerUpdated>().len(), 1);

    let inner = ITransformERC20::_transformERC20Call {
        callDataHash: Default::default(),
        taker: STRANGER,
        inputToken: f.sell_token,
        outputToken: f.buy_token,
        inputTokenAmount: U256::ZERO,
        minOutputTokenAmount: U256::ZERO,
        transformations: vec![],
    };
    let err = f.evm.transact_sol(STRANGER, f.proxy, U256::ZERO, &inner).err().unwrap();
    assert_eq!(err.rich(), Some(ZeroExError::OnlyCallableBySelf { sender: STRANGER }));
}
