//! Magic values shared across the protocol.

use alloy_primitives::{address, fixed_bytes, Address, Selector, U256};

/// Returned (ABI-encoded) by every migration entry point to signal success.
pub const MIGRATE_SUCCESS: Selector = fixed_bytes!("2c64c5ef");

/// Returned (ABI-encoded) by every transformer's `transform()` on success.
pub const TRANSFORMER_SUCCESS: Selector = fixed_bytes!("13c9929e");

/// Pseudo token address standing for native ETH.
pub const ETH_TOKEN_ADDRESS: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// "Use the whole available balance" amount sentinel.
pub const MAX_UINT256: U256 = U256::MAX;

/// Returns `true` if `token` is the ETH pseudo token.
pub fn is_token_eth(token: Address) -> bool {
    token == ETH_TOKEN_ADDRESS
}
