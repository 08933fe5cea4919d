//! # zeroex-tokens
//!
//! External contracts the ExchangeProxy trades against: ERC20 tokens (in
//! compliant and non-compliant return styles), WETH9, and the subset of the
//! legacy 0x Exchange that `fillOrder` needs.

pub mod asset_data;
pub mod compat;
pub mod erc20;
pub mod exchange;
pub mod weth;

pub use asset_data::{decode_erc20_asset_data, encode_erc20_asset_data};
pub use erc20::{Erc20Storage, Erc20Token, ReturnStyle, IERC20Token, IMintableERC20Token};
pub use exchange::{order_hash, Exchange, ExchangeStorage, ILegacyExchange, LibOrder};
pub use weth::{Weth9, IWETH9};
