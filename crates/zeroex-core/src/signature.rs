//! Hash signature validation.
//!
//! A signature is `payload ‖ type`, where the trailing byte selects the
//! scheme:
//!
//! | type | scheme   | payload |
//! |------|----------|---------|
//! | 0    | Illegal  | always rejected |
//! | 1    | Invalid  | always rejected |
//! | 2    | EIP712   | `v ‖ r ‖ s` over the hash itself |
//! | 3    | EthSign  | `v ‖ r ‖ s` over `"\x19Ethereum Signed Message:\n32" ‖ hash` |
//! | 4    | Wallet   | opaque, checked by the signer's EIP-1271 `isValidSignature` |

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::{sol, SolCall};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{SignatureValidationErrorCode as Code, ZeroExError};
use crate::evm::Evm;

sol! {
    /// EIP-1271 contract wallet.
    interface IWallet {
        function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);
    }
}

/// `isValidSignature(bytes32,bytes)` selector, returned by wallets that
/// accept a signature.
pub const EIP1271_MAGIC_VALUE: [u8; 4] = IWallet::isValidSignatureCall::SELECTOR;

/// Length of an ECDSA signature: `v ‖ r ‖ s ‖ type`.
pub const ECDSA_SIGNATURE_LENGTH: usize = 66;

// ─── SignatureType ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureType {
    Illegal = 0,
    Invalid = 1,
    Eip712 = 2,
    EthSign = 3,
    Wallet = 4,
}

impl SignatureType {
    /// Number of defined types; any byte at or above this is unsupported.
    pub const COUNT: u8 = 5;

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Illegal,
            1 => Self::Invalid,
            2 => Self::Eip712,
            3 => Self::EthSign,
            4 => Self::Wallet,
            _ => return None,
        })
    }
}

// ─── ECDSA helpers ────────────────────────────────────────────────────────────

/// `keccak256("\x19Ethereum Signed Message:\n32" ‖ hash)`.
pub fn eth_sign_hash(hash: B256) -> B256 {
    let mut message = Vec::with_capacity(28 + 32);
    message.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    message.extend_from_slice(hash.as_slice());
    keccak256(message)
}

/// Address of a public key: last 20 bytes of `keccak256(x ‖ y)`.
pub fn public_key_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    Address::from_slice(&keccak256(&point.as_bytes()[1..])[12..])
}

/// Address controlled by a private key.
pub fn signer_address(key: &SigningKey) -> Address {
    public_key_address(key.verifying_key())
}

/// `ecrecover`: `None` where the precompile would return the zero address.
pub fn ecrecover(hash: B256, v: u8, r: B256, s: B256) -> Option<Address> {
    let recovery_id = RecoveryId::from_byte(v.checked_sub(27)?)?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(r.as_slice());
    rs[32..].copy_from_slice(s.as_slice());
    let signature = Signature::from_slice(&rs).ok()?;
    VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
        .ok()
        .map(|key| public_key_address(&key))
}

/// Sign `hash` with `key`, producing `v ‖ r ‖ s ‖ type`.
///
/// `EthSign` signs the prefixed hash; every other type signs `hash` as is.
pub fn sign_hash(
    key: &SigningKey,
    hash: B256,
    signature_type: SignatureType,
) -> Result<Bytes, k256::ecdsa::Error> {
    let digest = match signature_type {
        SignatureType::EthSign => eth_sign_hash(hash),
        _ => hash,
    };
    let (signature, recovery_id) = key.sign_prehash_recoverable(digest.as_slice())?;
    let mut out = Vec::with_capacity(ECDSA_SIGNATURE_LENGTH);
    out.push(27 + recovery_id.to_byte());
    out.extend_from_slice(&signature.to_bytes());
    out.push(signature_type as u8);
    Ok(out.into())
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Validate that `signer` signed `hash`.
///
/// `caller` is the account performing the check; it is the `msg.sender` of
/// the wallet callback for `Wallet` signatures.
pub fn validate_hash_signature(
    evm: &mut Evm,
    caller: Address,
    hash: B256,
    signer: Address,
    signature: &[u8],
) -> Result<(), ZeroExError> {
    let fail = |code: Code| ZeroExError::signature(code, hash, signer, signature.to_vec());

    let Some((&type_byte, payload)) = signature.split_last() else {
        return Err(fail(Code::InvalidLength));
    };
    let Some(signature_type) = SignatureType::from_byte(type_byte) else {
        return Err(fail(Code::Unsupported));
    };
    trace!(%hash, %signer, ?signature_type, "validating signature");

    match signature_type {
        SignatureType::Illegal => Err(fail(Code::Illegal)),
        SignatureType::Invalid => Err(fail(Code::AlwaysInvalid)),
        SignatureType::Eip712 | SignatureType::EthSign => {
            if signature.len() != ECDSA_SIGNATURE_LENGTH {
                return Err(fail(Code::InvalidLength));
            }
            let digest = match signature_type {
                SignatureType::EthSign => eth_sign_hash(hash),
                _ => hash,
            };
            let v = payload[0];
            let r = B256::from_slice(&payload[1..33]);
            let s = B256::from_slice(&payload[33..65]);
            match ecrecover(digest, v, r, s) {
                None => Err(fail(Code::BadSignatureData)),
                Some(recovered) if recovered == signer => Ok(()),
                Some(_) => Err(fail(Code::WrongSigner)),
            }
        }
        SignatureType::Wallet => {
            let call = IWallet::isValidSignatureCall {
                hash,
                signature: Bytes::copy_from_slice(payload),
            };
            match evm.static_call_sol(caller, signer, &call) {
                Ok(ret) if ret.magicValue.0 == EIP1271_MAGIC_VALUE => Ok(()),
                Ok(_) => Err(fail(Code::WrongSigner)),
                Err(_) => Err(fail(Code::BadSignatureData)),
            }
        }
    }
}

/// `true` iff [`validate_hash_signature`] would succeed.
pub fn is_valid_hash_signature(
    evm: &mut Evm,
    caller: Address,
    hash: B256,
    signer: Address,
    signature: &[u8],
) -> bool {
    validate_hash_signature(evm, caller, hash, signer, signature).is_ok()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
