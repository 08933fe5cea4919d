//! Bit-flag reentrancy guard kept in proxy storage.

use alloy_primitives::{Address, Selector, U256};
use tracing::trace;

use zeroex_core::{Evm, Revert, StorageId, StorageRegion, ZeroExError};

/// Flag shared by single and batch meta-transaction execution.
pub const REENTRANCY_MTX: U256 = U256::from_limbs([1, 0, 0, 0]);

#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuardStorage {
    pub flags: U256,
}

impl StorageRegion for ReentrancyGuardStorage {
    const ID: StorageId = StorageId::ReentrancyGuard;
}

/// Run `f` with `flag` raised on `proxy`.
///
/// Reverts `IllegalReentrancyError` if the flag is already up. The flag is
/// lowered again once `f` returns, whatever the outcome.
pub fn with_reentrancy_guard<T>(
    evm: &mut Evm,
    proxy: Address,
    selector: Selector,
    flag: U256,
    f: impl FnOnce(&mut Evm) -> Result<T, Revert>,
) -> Result<T, Revert> {
    let flags = evm.storage(proxy, |s: &ReentrancyGuardStorage| s.flags);
    if flags & flag != U256::ZERO {
        return Err(ZeroExError::IllegalReentrancy { selector, reentrancy_flags: flags }.into());
    }
    evm.storage_mut(proxy, |s: &mut ReentrancyGuardStorage| s.flags |= flag)?;
    trace!(%proxy, %selector, "reentrancy guard raised");
    let result = f(evm);
    evm.storage_mut(proxy, |s: &mut ReentrancyGuardStorage| s.flags &= !flag)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, fixed_bytes};

    const PROXY: Address = address!("0000000000000000000000000000000000000e0e");

    #[test]
    fn nested_entry_is_rejected_and_flag_cleared() {
        let mut evm = Evm::default();
        let selector = fixed_bytes!("deadbeef");
        let inner = with_reentrancy_guard(&mut evm, PROXY, selector, REENTRANCY_MTX, |evm| {
            Ok(with_reentrancy_guard(evm, PROXY, selector, REENTRANCY_MTX, |_| Ok(())))
        })
        .unwrap();
        assert_eq!(
            inner.unwrap_err().rich(),
            Some(ZeroExError::IllegalReentrancy { selector, reentrancy_flags: REENTRANCY_MTX })
        );
        assert_eq!(evm.storage(PROXY, |s: &ReentrancyGuardStorage| s.flags), U256::ZERO);

        // a failing body still lowers the flag
        let err = with_reentrancy_guard(&mut evm, PROXY, selector, REENTRANCY_MTX, |_| {
            Err::<(), _>(Revert::reason("nope"))
        })
        .unwrap_err();
        assert_eq!(err.reason_string().as_deref(), Some("nope"));
        assert_eq!(evm.storage(PROXY, |s: &ReentrancyGuardStorage| s.flags), U256::ZERO);
    }
}
