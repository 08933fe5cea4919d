//! # zeroex-features
//!
//! The ExchangeProxy and everything that runs behind it.
//!
//! [`ZeroEx`] is a selector → implementation dispatcher. Features are
//! stateless contracts that the proxy delegate-calls; they keep their state
//! in the proxy's namespaced storage and register their functions during a
//! migration. A freshly deployed proxy only knows `bootstrap`, which a
//! migrator ([`InitialMigration`] / [`FullMigration`]) uses once to install
//! the registry and ownership features before adding the rest.
//!
//! Token conversions run through [`TransformERC20`]: the taker's input
//! tokens move into a [`Puppet`] borrowed from the [`PuppetPool`], each
//! transformer is delegate-called from the puppet, and the taker's output
//! balance is checked at the end. [`MetaTransactions`] lets a relayer run
//! such a conversion on behalf of a signer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zeroex_core::Evm;
//! use zeroex_features::migrations::deploy_exchange_proxy;
//!
//! let mut evm = Evm::default();
//! let deployed = deploy_exchange_proxy(&mut evm, deployer, owner, transformer_deployer)?;
//! println!("proxy at {}", deployed.zero_ex);
//! ```

pub mod allowance_target;
pub mod authorizable;
pub mod bootstrap;
pub mod fixin;
pub mod meta_transactions;
pub mod migrations;
pub mod ownable;
pub mod proxy;
pub mod puppet;
pub mod puppet_pool;
pub mod reentrancy;
pub mod registry;
pub mod signature_validator;
pub mod signed_call_data;
pub mod token_spender;
pub mod transform_erc20;
pub mod transformer_deployer;
pub mod transformers;

pub use allowance_target::{AllowanceTarget, IAllowanceTarget};
pub use authorizable::IAuthorizable;
pub use bootstrap::{BootstrapFeature, IBootstrapFeature};
pub use meta_transactions::{meta_transaction_hash, IMetaTransactions, MetaTransactionData, MetaTransactions};
pub use migrations::{
    deploy_exchange_proxy, known_selectors, DeployedProxy, FeatureSet, FullMigration, FullMigrationHandle,
    InitialMigration, InitialMigrationHandle,
};
pub use ownable::{IOwnable, Ownable};
pub use proxy::{function_table, IZeroEx, ZeroEx};
pub use puppet::{IPuppet, Puppet};
pub use puppet_pool::{IPuppetPool, PuppetPool, PuppetState};
pub use registry::{ISimpleFunctionRegistry, SimpleFunctionRegistry};
pub use signature_validator::{ISignatureValidator, SignatureValidator};
pub use token_spender::{ITokenSpender, TokenSpender};
pub use transform_erc20::{ITransformERC20, TransformERC20, Transformation};
pub use transformer_deployer::{ITransformerDeployer, TransformerDeployer};
pub use transformers::{
    register_transformer_artifacts, AffiliateFeeTransformer, FillQuoteTransformer, PayTakerTransformer,
    Transformer, TransformerContract, WethTransformer,
};
