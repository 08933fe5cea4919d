//! `Ownable`: proxy ownership and the `migrate` entry point.

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::info;

use zeroex_core::constants::MIGRATE_SUCCESS;
use zeroex_core::{Contract, Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

use crate::fixin::{migrate_success, only_owner, returned_magic};
use crate::registry::ISimpleFunctionRegistry;

sol! {
    #![sol(all_derives)]

    interface IOwnable {
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);
        event Migrated(address caller, address migrator, address newOwner);

        function bootstrap() external returns (bytes4 success);
        function transferOwnership(address newOwner) external;
        function owner() external view returns (address ownerAddress);
        function migrate(address target, bytes data, address newOwner) external;
    }
}

use IOwnable::IOwnableCalls as OwnableCall;

#[derive(Debug, Clone, Default)]
pub struct OwnableStorage {
    pub owner: Address,
}

impl StorageRegion for OwnableStorage {
    const ID: StorageId = StorageId::Ownable;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ownable;

impl Ownable {
    pub const SELECTORS: [[u8; 4]; 3] = [
        IOwnable::transferOwnershipCall::SELECTOR,
        IOwnable::ownerCall::SELECTOR,
        IOwnable::migrateCall::SELECTOR,
    ];

    fn set_owner(evm: &mut Evm, proxy: Address, owner: Address) -> Result<Address, Revert> {
        evm.storage_mut(proxy, |s: &mut OwnableStorage| std::mem::replace(&mut s.owner, owner))
    }

    fn migrate(evm: &mut Evm, frame: &Frame, target: Address, data: Bytes, new_owner: Address) -> Result<(), Revert> {
        only_owner(evm, frame)?;
        let proxy = frame.address;
        // The proxy owns itself while the migration runs, so the migration
        // can call owner-only functions on it.
        Self::set_owner(evm, proxy, proxy)?;
        let result = evm
            .delegate_call(frame, target, data)
            .map_err(|revert| ZeroExError::MigrateCallFailed { target, result_data: revert.into_data() })?;
        if !returned_magic(&result, MIGRATE_SUCCESS) {
            return Err(ZeroExError::MigrateCallFailed { target, result_data: result }.into());
        }
        Self::set_owner(evm, proxy, new_owner)?;
        evm.emit(proxy, &IOwnable::Migrated { caller: frame.caller, migrator: target, newOwner: new_owner })?;
        info!(%proxy, migrator = %target, %new_owner, "migrated");
        Ok(())
    }
}

impl Contract for Ownable {
    fn name(&self) -> &'static str {
        "Ownable"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        match OwnableCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            OwnableCall::bootstrap(_) => {
                Self::set_owner(evm, proxy, proxy)?;
                for selector in Self::SELECTORS {
                    let call = ISimpleFunctionRegistry::_extendSelfCall {
                        selector: Selector::from(selector),
                        implementation: frame.code_address,
                    };
                    evm.call_sol(proxy, proxy, U256::ZERO, &call)?;
                }
                Ok(migrate_success())
            }
            OwnableCall::transferOwnership(c) => {
                only_owner(evm, frame)?;
                if c.newOwner == Address::ZERO {
                    return Err(ZeroExError::TransferOwnerToZero {}.into());
                }
                let previous = Self::set_owner(evm, proxy, c.newOwner)?;
                evm.emit(proxy, &IOwnable::OwnershipTransferred { previousOwner: previous, newOwner: c.newOwner })?;
                info!(%proxy, %previous, new = %c.newOwner, "ownership transferred");
                Ok(Bytes::new())
            }
            OwnableCall::owner(_) => {
                let owner = evm.storage(proxy, |s: &OwnableStorage| s.owner);
                Ok(IOwnable::ownerCall::abi_encode_returns(&(owner,)).into())
            }
            OwnableCall::migrate(c) => {
                Self::migrate(evm, frame, c.target, c.data, c.newOwner)?;
                Ok(Bytes::new())
            }
        }
    }
}
