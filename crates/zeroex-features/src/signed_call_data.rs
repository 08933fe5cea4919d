//! Calldata carrying a trailing quote signature.
//!
//! Layout of the 96-byte trailer:
//!
//! ```text
//! word0 = magic (4 bytes) ‖ 27 zero bytes ‖ v
//! word1 = r
//! word2 = s
//! ```
//!
//! The signature is an EIP-712 type signature over `keccak256(body)`, where
//! `body` is the calldata without the trailer.

use alloy_primitives::{fixed_bytes, keccak256, Bytes, FixedBytes, B256};
use k256::ecdsa::SigningKey;

use zeroex_core::signature::{sign_hash, ECDSA_SIGNATURE_LENGTH};
use zeroex_core::SignatureType;

/// Marks a signed calldata trailer.
pub const SIGNED_CALL_DATA_MAGIC: FixedBytes<4> = fixed_bytes!("f86d1d92");

pub const TRAILER_LENGTH: usize = 96;

/// Calldata split into its signed body hash and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCallData {
    /// `keccak256` of the calldata without the trailer, or of the whole
    /// calldata if there is no trailer.
    pub hash: B256,
    /// `v ‖ r ‖ s ‖ 0x02`, present only when the trailer was found.
    pub signature: Option<Bytes>,
}

/// Parse `call_data`, looking for a signature trailer.
pub fn parse(call_data: &[u8]) -> SignedCallData {
    // selector plus at least the trailer
    if call_data.len() < 4 + TRAILER_LENGTH {
        return SignedCallData { hash: keccak256(call_data), signature: None };
    }
    let (body, trailer) = call_data.split_at(call_data.len() - TRAILER_LENGTH);
    let word0 = &trailer[..32];
    if word0[..4] != SIGNED_CALL_DATA_MAGIC[..] || word0[4..31].iter().any(|b| *b != 0) {
        return SignedCallData { hash: keccak256(call_data), signature: None };
    }
    let mut signature = Vec::with_capacity(ECDSA_SIGNATURE_LENGTH);
    signature.push(word0[31]);
    signature.extend_from_slice(&trailer[32..96]);
    signature.push(SignatureType::Eip712 as u8);
    SignedCallData { hash: keccak256(body), signature: Some(signature.into()) }
}

/// Append a trailer signed by `key` to `call_data`.
pub fn sign_call_data(key: &SigningKey, call_data: &[u8]) -> Result<Bytes, k256::ecdsa::Error> {
    let signature = sign_hash(key, keccak256(call_data), SignatureType::Eip712)?;
    let mut out = Vec::with_capacity(call_data.len() + TRAILER_LENGTH);
    out.extend_from_slice(call_data);
    out.extend_from_slice(SIGNED_CALL_DATA_MAGIC.as_slice());
    out.extend_from_slice(&[0u8; 27]);
    out.push(signature[0]);
    out.extend_from_slice(&signature[1..65]);
    Ok(out.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroex_core::signature::{signer_address, validate_hash_signature};
    use zeroex_core::Evm;

    fn key() -> SigningKey {
        SigningKey::from_slice(&[0x42; 32]).unwrap()
    }

    #[test]
    fn unsigned_calldata_hashes_whole() {
        let data = vec![0xab; 200];
        let parsed = parse(&data);
        assert_eq!(parsed.hash, keccak256(&data));
        assert!(parsed.signature.is_none());
    }

    #[test]
    fn signed_calldata_recovers_signer() {
        let body = hex::decode("415565b0000000000000000000000000000000000000000000000000000000000000002a").unwrap();
        let signed = sign_call_data(&key(), &body).unwrap();
        assert_eq!(signed.len(), body.len() + TRAILER_LENGTH);

        let parsed = parse(&signed);
        assert_eq!(parsed.hash, keccak256(&body));
        let signature = parsed.signature.unwrap();
        let mut evm = Evm::default();
        validate_hash_signature(&mut evm, Default::default(), parsed.hash, signer_address(&key()), &signature)
            .unwrap();
    }

    #[test]
    fn dirty_padding_is_not_a_trailer() {
        let body = vec![1u8; 36];
        let mut signed = sign_call_data(&key(), &body).unwrap().to_vec();
        signed[body.len() + 10] = 1;
        assert!(parse(&signed).signature.is_none());
    }
}
