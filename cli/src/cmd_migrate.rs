//! `zeroex migrate`: deploy a fully migrated proxy plus the standard
//! transformers, then report what was installed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolEvent, SolValue};
use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::info;

use zeroex_core::{init_code, Evm, Revert, RevertDecoder, SimulatorConfig};
use zeroex_features::{
    deploy_exchange_proxy, function_table, known_selectors, register_transformer_artifacts, AffiliateFeeTransformer,
    DeployedProxy, FillQuoteTransformer, IAuthorizable, IMetaTransactions, IOwnable, IPuppet, IPuppetPool,
    ISimpleFunctionRegistry, ITransformERC20, ITransformerDeployer, PayTakerTransformer, Transformer,
    TransformerDeployer, WethTransformer,
};
use zeroex_tokens::{Exchange, Weth9};

/// One row of the proxy's function table.
#[derive(Debug, Serialize)]
pub struct FunctionEntry {
    pub selector: String,
    pub signature: String,
    pub implementation: Address,
}

/// One emitted log, named when its topic is a known event.
#[derive(Debug, Serialize)]
pub struct EventEntry {
    pub emitter: Address,
    pub event: String,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Serialize)]
pub struct Deployment {
    pub chain_id: u64,
    pub deployer: Address,
    #[serde(flatten)]
    pub proxy: DeployedProxy,
    pub weth: Address,
    pub exchange: Address,
    pub transformers: BTreeMap<&'static str, Address>,
    pub functions: Vec<FunctionEntry>,
    pub events: Vec<EventEntry>,
}

/// Turn a revert into an error carrying its decoded description.
pub fn revert_error(revert: Revert) -> anyhow::Error {
    anyhow!("{}", RevertDecoder::new().decode(revert.data()))
}

/// Run a full deployment on a fresh host built from `config`.
pub fn deploy(config: &SimulatorConfig, deployer: Address, owner: Address) -> Result<Deployment> {
    let mut evm = Evm::from_config(config);
    evm.fund(deployer, U256::from(config.deployer_balance));
    register_transformer_artifacts(&mut evm);

    let transformer_deployer =
        TransformerDeployer::deploy_new(&mut evm, deployer, vec![deployer]).map_err(revert_error)?;
    let proxy = deploy_exchange_proxy(&mut evm, deployer, owner, transformer_deployer).map_err(revert_error)?;

    let weth = evm.deploy(deployer, Arc::new(Weth9::new()), U256::ZERO).map_err(revert_error)?;
    let exchange = evm
        .deploy(deployer, Arc::new(Exchange::new(config.protocol_fee_multiplier)), U256::ZERO)
        .map_err(revert_error)?;

    let mut transformers = BTreeMap::new();
    let standard: [(&'static str, Bytes); 4] = [
        (WethTransformer::NAME, weth.abi_encode().into()),
        (PayTakerTransformer::NAME, Bytes::new()),
        (AffiliateFeeTransformer::NAME, Bytes::new()),
        (FillQuoteTransformer::NAME, exchange.abi_encode().into()),
    ];
    for (name, args) in standard {
        let call = ITransformerDeployer::deployCall { initCode: init_code(name, args) };
        let address = evm
            .transact_sol(deployer, transformer_deployer, U256::ZERO, &call)
            .map_err(revert_error)?
            .deployedAddress;
        transformers.insert(name, address);
    }
    info!(zero_ex = %proxy.zero_ex, transformers = transformers.len(), "deployment complete");

    Ok(Deployment {
        chain_id: evm.chain_id(),
        deployer,
        functions: functions(&evm, proxy.zero_ex),
        events: events(&evm),
        proxy,
        weth,
        exchange,
        transformers,
    })
}

fn functions(evm: &Evm, proxy: Address) -> Vec<FunctionEntry> {
    let known = known_selectors();
    function_table(evm, proxy)
        .into_iter()
        .map(|(selector, implementation)| FunctionEntry {
            selector: format!("0x{}", hex::encode(selector)),
            signature: known.get(&selector).map_or_else(|| "<unknown>".to_string(), |s| s.to_string()),
            implementation,
        })
        .collect()
}

fn event_names() -> HashMap<B256, &'static str> {
    HashMap::from([
        (IOwnable::OwnershipTransferred::SIGNATURE_HASH, IOwnable::OwnershipTransferred::SIGNATURE),
        (IOwnable::Migrated::SIGNATURE_HASH, IOwnable::Migrated::SIGNATURE),
        (
            ISimpleFunctionRegistry::ProxyFunctionUpdated::SIGNATURE_HASH,
            ISimpleFunctionRegistry::ProxyFunctionUpdated::SIGNATURE,
        ),
        (IAuthorizable::AuthorizedAddressAdded::SIGNATURE_HASH, IAuthorizable::AuthorizedAddressAdded::SIGNATURE),
        (
            IAuthorizable::AuthorizedAddressRemoved::SIGNATURE_HASH,
            IAuthorizable::AuthorizedAddressRemoved::SIGNATURE,
        ),
        (IPuppetPool::PuppetCreated::SIGNATURE_HASH, IPuppetPool::PuppetCreated::SIGNATURE),
        (IPuppet::PuppetExecuted::SIGNATURE_HASH, IPuppet::PuppetExecuted::SIGNATURE),
        (
            ITransformERC20::TransformerDeployerUpdated::SIGNATURE_HASH,
            ITransformERC20::TransformerDeployerUpdated::SIGNATURE,
        ),
        (ITransformERC20::QuoteSignerUpdated::SIGNATURE_HASH, ITransformERC20::QuoteSignerUpdated::SIGNATURE),
        (ITransformERC20::TransformedERC20::SIGNATURE_HASH, ITransformERC20::TransformedERC20::SIGNATURE),
        (
            IMetaTransactions::MetaTransactionExecuted::SIGNATURE_HASH,
            IMetaTransactions::MetaTransactionExecuted::SIGNATURE,
        ),
        (ITransformerDeployer::Deployed::SIGNATURE_HASH, ITransformerDeployer::Deployed::SIGNATURE),
        (ITransformerDeployer::Killed::SIGNATURE_HASH, ITransformerDeployer::Killed::SIGNATURE),
    ])
}

fn events(evm: &Evm) -> Vec<EventEntry> {
    let names = event_names();
    evm.logs()
        .iter()
        .map(|log| {
            let topics = log.data.topics().to_vec();
            let event = topics
                .first()
                .and_then(|topic| names.get(topic))
                .map_or_else(|| "<unknown>".to_string(), |name| name.to_string());
            EventEntry { emitter: log.address, event, topics, data: log.data.data.clone() }
        })
        .collect()
}

pub fn run(config: &SimulatorConfig, deployer: Address, owner: Address, as_json: bool) -> Result<()> {
    let deployment = deploy(config, deployer, owner)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&deployment)?);
        return Ok(());
    }

    let proxy = &deployment.proxy;
    println!("ZeroEx proxy:          {}", proxy.zero_ex);
    println!("Owner:                 {}", proxy.owner);
    println!("Allowance target:      {}", proxy.allowance_target);
    println!("Transformer deployer:  {}", proxy.transformer_deployer);
    println!("Migrator (destroyed):  {}", proxy.migrator);
    println!("WETH:                  {}", deployment.weth);
    println!("Exchange:              {}", deployment.exchange);
    println!();
    println!("Transformers:");
    for (name, address) in &deployment.transformers {
        println!("  {name:24} {address}");
    }
    println!();
    println!("Functions ({}):", deployment.functions.len());
    for f in &deployment.functions {
        println!("  {} {:60} {}", f.selector, f.signature, f.implementation);
    }
    println!();
    println!("Events ({}):", deployment.events.len());
    for e in &deployment.events {
        println!("  {} {}", e.emitter, e.event);
    }
    Ok(())
}
