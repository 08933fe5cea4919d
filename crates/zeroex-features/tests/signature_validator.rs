//! Hash signature checks exposed through the proxy.

mod common;

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolCall;

use common::*;
use zeroex_core::signature::{sign_hash, IWallet, EIP1271_MAGIC_VALUE};
use zeroex_core::{Contract, Evm, Frame, Revert, SignatureType, SignatureValidationErrorCode, ZeroExError};
use zeroex_features::ISignatureValidator;

/// EIP-1271 wallet that accepts the payload `"ok"` and remembers nothing.
struct OkWallet;

impl Contract for OkWallet {
    fn name(&self) -> &'static str {
        "OkWallet"
    }

    fn execute(&self, _evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let call = IWallet::isValidSignatureCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())?;
        let magic = if call.signature.as_ref() == b"ok" { EIP1271_MAGIC_VALUE } else { [0; 4] };
        Ok(IWallet::isValidSignatureCall::abi_encode_returns(&(FixedBytes::<4>::from(magic),)).into())
    }
}

fn is_valid(f: &mut Fixture, hash: B256, signer: Address, signature: &Bytes) -> bool {
    let call = ISignatureValidator::isValidHashSignatureCall { hash, signer, signature: signature.clone() };
    f.evm.transact_sol(STRANGER, f.proxy, U256::ZERO, &call).unwrap().isValid
}

fn validate(f: &mut Fixture, hash: B256, signer: Address, signature: &Bytes) -> Result<(), Revert> {
    let call = ISignatureValidator::validateHashSignatureCall { hash, signer, signature: signature.clone() };
    f.evm.transact_sol(STRANGER, f.proxy, U256::ZERO, &call).map(|_| ())
}

#[test]
fn ecdsa_signatures_validate_for_their_signer() {
    let mut f = Fixture::new();
    let (signer_key, signer) = key(0x11);
    let hash = keccak256(b"order");
    for signature_type in [SignatureType::Eip712, SignatureType::EthSign] {
        let signature = sign_hash(&signer_key, hash, signature_type).unwrap();
        assert!(is_valid(&mut f, hash, signer, &signature));
        validate(&mut f, hash, signer, &signature).unwrap();
    }
}

#[test]
fn wrong_signer_reports_the_code() {
    let mut f = Fixture::new();
    let (signer_key, _) = key(0x11);
    let (_, other) = key(0x12);
    let hash = keccak256(b"order");
    let signature = sign_hash(&signer_key, hash, SignatureType::Eip712).unwrap();

    assert!(!is_valid(&mut f, hash, other, &signature));
    let err = validate(&mut f, hash, other, &signature).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::signature(SignatureValidationErrorCode::WrongSigner, hash, other, signature))
    );
}

#[test]
fn answers_are_deterministic() {
    let mut f = Fixture::new();
    let (signer_key, signer) = key(0x11);
    let hash = keccak256(b"order");
    let good = sign_hash(&signer_key, hash, SignatureType::Eip712).unwrap();
    let bad = Bytes::from(vec![0x01]);
    for _ in 0..3 {
        assert!(is_valid(&mut f, hash, signer, &good));
        assert!(!is_valid(&mut f, hash, signer, &bad));
    }
    let first = validate(&mut f, hash, signer, &bad).unwrap_err();
    let second = validate(&mut f, hash, signer, &bad).unwrap_err();
    assert_eq!(first, second);
    assert_eq!(
        first.rich(),
        Some(ZeroExError::signature(SignatureValidationErrorCode::AlwaysInvalid, hash, signer, bad))
    );
}

#[test]
fn contract_wallets_are_asked() {
    let mut f = Fixture::new();
    let wallet = f.evm.deploy(DEPLOYER, Arc::new(OkWallet), U256::ZERO).unwrap();
    let hash = keccak256(b"order");
    let accepted = Bytes::from(b"ok\x04".to_vec());
    let refused = Bytes::from(b"no\x04".to_vec());

    assert!(is_valid(&mut f, hash, wallet, &accepted));
    let err = validate(&mut f, hash, wallet, &refused).unwrap_err();
    assert_eq!(
        err.rich(),
        Some(ZeroExError::signature(SignatureValidationErrorCode::WrongSigner, hash, wallet, refused))
    );
}

#[test]
fn empty_and_unknown_signatures_are_rejected() {
    let mut f = Fixture::new();
    let (_, signer) = key(0x11);
    let hash = keccak256(b"order");
    let cases = [
        (Bytes::new(), SignatureValidationErrorCode::InvalidLength),
        (Bytes::from(vec![0x00]), SignatureValidationErrorCode::Illegal),
        (Bytes::from(vec![0x09]), SignatureValidationErrorCode::Unsupported),
        (Bytes::from(vec![0x1b, 0x02]), SignatureValidationErrorCode::InvalidLength),
    ];
    for (signature, code) in cases {
        let err = validate(&mut f, hash, signer, &signature).unwrap_err();
        assert_eq!(err.rich(), Some(ZeroExError::signature(code, hash, signer, signature)));
    }
}
