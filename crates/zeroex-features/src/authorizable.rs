//! `Authorizable`: an owner plus a list of authorized addresses, for
//! standalone contracts outside the proxy (`AllowanceTarget`,
//! `TransformerDeployer`).

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use tracing::debug;

use zeroex_core::{Evm, Frame, Revert, StorageId, StorageRegion, ZeroExError};

sol! {
    #![sol(all_derives)]

    interface IAuthorizable {
        event AuthorizedAddressAdded(address indexed target, address indexed caller);
        event AuthorizedAddressRemoved(address indexed target, address indexed caller);
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);

        function addAuthorizedAddress(address target) external;
        function removeAuthorizedAddress(address target) external;
        function removeAuthorizedAddressAtIndex(address target, uint256 index) external;
        function getAuthorizedAddresses() external view returns (address[] authorities);
        function authorized(address target) external view returns (bool isAuthorized);
        function owner() external view returns (address ownerAddress);
        function transferOwnership(address newOwner) external;
    }
}

use IAuthorizable::IAuthorizableCalls as AuthorizableCall;

#[derive(Debug, Clone, Default)]
pub struct AuthorizableStorage {
    pub owner: Address,
    pub authorities: Vec<Address>,
}

impl StorageRegion for AuthorizableStorage {
    const ID: StorageId = StorageId::Authorizable;
}

impl AuthorizableStorage {
    pub fn is_authorized(&self, target: Address) -> bool {
        self.authorities.contains(&target)
    }
}

/// Constructor part: the deployer becomes the owner.
pub fn init(evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
    evm.storage_mut(frame.address, |s: &mut AuthorizableStorage| s.owner = frame.caller)
}

pub fn only_owner(evm: &Evm, frame: &Frame) -> Result<(), Revert> {
    let owner = evm.storage(frame.address, |s: &AuthorizableStorage| s.owner);
    if frame.caller != owner {
        return Err(ZeroExError::OnlyOwner { sender: frame.caller, owner }.into());
    }
    Ok(())
}

pub fn only_authorized(evm: &Evm, frame: &Frame) -> Result<(), Revert> {
    if !evm.storage(frame.address, |s: &AuthorizableStorage| s.is_authorized(frame.caller)) {
        return Err(ZeroExError::SenderNotAuthorized { sender: frame.caller }.into());
    }
    Ok(())
}

fn add(evm: &mut Evm, frame: &Frame, target: Address) -> Result<(), Revert> {
    if target == Address::ZERO {
        return Err(ZeroExError::ZeroCantBeAuthorized {}.into());
    }
    let added = evm.storage_mut(frame.address, |s: &mut AuthorizableStorage| {
        if s.is_authorized(target) {
            return false;
        }
        s.authorities.push(target);
        true
    })?;
    if !added {
        return Err(ZeroExError::TargetAlreadyAuthorized { target }.into());
    }
    evm.emit(frame.address, &IAuthorizable::AuthorizedAddressAdded { target, caller: frame.caller })?;
    debug!(contract = %frame.address, %target, "authority added");
    Ok(())
}

fn remove_at(evm: &mut Evm, frame: &Frame, target: Address, index: usize) -> Result<(), Revert> {
    evm.storage_mut(frame.address, |s: &mut AuthorizableStorage| {
        s.authorities.swap_remove(index);
    })?;
    evm.emit(frame.address, &IAuthorizable::AuthorizedAddressRemoved { target, caller: frame.caller })?;
    debug!(contract = %frame.address, %target, "authority removed");
    Ok(())
}

/// Handle `IAuthorizable` calls; `None` if `frame` is not one of them.
pub fn dispatch(evm: &mut Evm, frame: &Frame) -> Option<Result<Bytes, Revert>> {
    let call = AuthorizableCall::abi_decode(&frame.input, false).ok()?;
    Some(handle(evm, frame, call))
}

fn handle(evm: &mut Evm, frame: &Frame, call: AuthorizableCall) -> Result<Bytes, Revert> {
    let this = frame.address;
    match call {
        AuthorizableCall::addAuthorizedAddress(c) => {
            only_owner(evm, frame)?;
            add(evm, frame, c.target)?;
        }
        AuthorizableCall::removeAuthorizedAddress(c) => {
            only_owner(evm, frame)?;
            let index = evm.storage(this, |s: &AuthorizableStorage| {
                s.authorities.iter().position(|a| *a == c.target)
            });
            let index = index.ok_or(ZeroExError::TargetNotAuthorized { target: c.target })?;
            remove_at(evm, frame, c.target, index)?;
        }
        AuthorizableCall::removeAuthorizedAddressAtIndex(c) => {
            only_owner(evm, frame)?;
            let authorities = evm.storage(this, |s: &AuthorizableStorage| s.authorities.clone());
            if !authorities.contains(&c.target) {
                return Err(ZeroExError::TargetNotAuthorized { target: c.target }.into());
            }
            let Some(index) = usize::try_from(c.index).ok().filter(|i| *i < authorities.len()) else {
                return Err(ZeroExError::IndexOutOfBounds {
                    index: c.index,
                    length: U256::from(authorities.len()),
                }
                .into());
            };
            if authorities[index] != c.target {
                return Err(ZeroExError::AuthorizedAddressMismatch {
                    authorized: authorities[index],
                    target: c.target,
                }
                .into());
            }
            remove_at(evm, frame, c.target, index)?;
        }
        AuthorizableCall::getAuthorizedAddresses(_) => {
            let authorities = evm.storage(this, |s: &AuthorizableStorage| s.authorities.clone());
            return Ok(IAuthorizable::getAuthorizedAddressesCall::abi_encode_returns(&(authorities,)).into());
        }
        AuthorizableCall::authorized(c) => {
            let authorized = evm.storage(this, |s: &AuthorizableStorage| s.is_authorized(c.target));
            return Ok(IAuthorizable::authorizedCall::abi_encode_returns(&(authorized,)).into());
        }
        AuthorizableCall::owner(_) => {
            let owner = evm.storage(this, |s: &AuthorizableStorage| s.owner);
            return Ok(IAuthorizable::ownerCall::abi_encode_returns(&(owner,)).into());
        }
        AuthorizableCall::transferOwnership(c) => {
            only_owner(evm, frame)?;
            if c.newOwner == Address::ZERO {
                return Err(ZeroExError::TransferOwnerToZero {}.into());
            }
            let previous = evm.storage_mut(this, |s: &mut AuthorizableStorage| {
                std::mem::replace(&mut s.owner, c.newOwner)
            })?;
            evm.emit(this, &IAuthorizable::OwnershipTransferred { previousOwner: previous, newOwner: c.newOwner })?;
        }
    }
    Ok(Bytes::new())
}
