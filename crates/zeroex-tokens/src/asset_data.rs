//! Legacy Exchange asset data: `ERC20Token(address)` selector ‖ ABI address.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolCall};

sol! {
    /// Asset proxy id for ERC20 assets.
    function ERC20Token(address tokenAddress);
}

/// Length of well-formed ERC20 asset data.
pub const ERC20_ASSET_DATA_LENGTH: usize = 36;

/// Asset proxy id (`0xf47261b0`) for ERC20 assets.
pub const ERC20_PROXY_ID: [u8; 4] = ERC20TokenCall::SELECTOR;

pub fn encode_erc20_asset_data(token: Address) -> Bytes {
    ERC20TokenCall { tokenAddress: token }.abi_encode().into()
}

/// Token address of well-formed ERC20 asset data, `None` otherwise.
pub fn decode_erc20_asset_data(asset_data: &[u8]) -> Option<Address> {
    if asset_data.len() != ERC20_ASSET_DATA_LENGTH {
        return None;
    }
    ERC20TokenCall::abi_decode(asset_data, true).ok().map(|c| c.tokenAddress)
}
