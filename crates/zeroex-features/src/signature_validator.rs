//! `SignatureValidator`: exposes hash signature checks on the proxy.

use alloy_primitives::Bytes;
use alloy_sol_types::{sol, SolCall, SolInterface};

use zeroex_core::signature::{is_valid_hash_signature, validate_hash_signature};
use zeroex_core::{Contract, Evm, Frame, Revert};

use crate::fixin::{migrate_success, register_feature_function};

sol! {
    #![sol(all_derives)]

    interface ISignatureValidator {
        function migrate() external returns (bytes4 success);
        function validateHashSignature(bytes32 hash, address signer, bytes signature) external view;
        function isValidHashSignature(bytes32 hash, address signer, bytes signature) external view returns (bool isValid);
    }
}

use ISignatureValidator::ISignatureValidatorCalls as ValidatorCall;

#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureValidator;

impl SignatureValidator {
    pub const SELECTORS: [[u8; 4]; 2] = [
        ISignatureValidator::validateHashSignatureCall::SELECTOR,
        ISignatureValidator::isValidHashSignatureCall::SELECTOR,
    ];
}

impl Contract for SignatureValidator {
    fn name(&self) -> &'static str {
        "SignatureValidator"
    }

    fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
        let proxy = frame.address;
        match ValidatorCall::abi_decode(&frame.input, false).map_err(|_| Revert::empty())? {
            ValidatorCall::migrate(_) => {
                for selector in Self::SELECTORS {
                    register_feature_function(evm, frame, selector)?;
                }
                Ok(migrate_success())
            }
            ValidatorCall::validateHashSignature(c) => {
                validate_hash_signature(evm, proxy, c.hash, c.signer, &c.signature)?;
                Ok(Bytes::new())
            }
            ValidatorCall::isValidHashSignature(c) => {
                let valid = is_valid_hash_signature(evm, proxy, c.hash, c.signer, &c.signature);
                Ok(ISignatureValidator::isValidHashSignatureCall::abi_encode_returns(&(valid,)).into())
            }
        }
    }
}
