//! Verification of the signatures authorizing transfers.
//!
//! Each chain configures the scheme its relayer contract checks: EIP-712 typed data or a packed
//! hash signed as a personal message. Both recover the signer from a 65 byte `r || s || v`
//! signature and require it to be the sender.

use crate::{
    chains::{ChainProfile, SchemeKind},
    error::SignatureError,
    types::TransferRequest,
};
use alloy::primitives::{Address, B256, Signature, U256};
use tracing::{debug, trace};

pub mod packed;
pub mod typed_data;

/// Parses a 65 byte `r || s || v` signature.
///
/// `v` may be given as a parity (`0`, `1`) or in the legacy form (`27`, `28`).
pub fn parse_signature(bytes: &[u8]) -> Result<Signature, SignatureError> {
    let bytes: &[u8; 65] =
        bytes.try_into().map_err(|_| SignatureError::InvalidLength(bytes.len()))?;

    let parity = match bytes[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => return Err(SignatureError::InvalidRecoveryId(v)),
    };

    Ok(Signature::new(
        U256::from_be_slice(&bytes[..32]),
        U256::from_be_slice(&bytes[32..64]),
        parity,
    ))
}

/// Verifies transfer authorizations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Returns the hash `request.from` must have signed for `contract` on `chain`.
    pub fn digest(
        &self,
        chain: &ChainProfile,
        contract: Address,
        request: &TransferRequest,
    ) -> B256 {
        match chain.signature_scheme {
            SchemeKind::TypedData => typed_data::signing_hash(
                &typed_data::domain(&chain.domain, chain.chain_id, contract),
                request,
            ),
            SchemeKind::PackedHash => packed::signing_hash(contract, request),
        }
    }

    /// Verifies that `signature` over `request` was produced by `request.from`.
    ///
    /// Returns the recovered signer.
    pub fn verify(
        &self,
        chain: &ChainProfile,
        contract: Address,
        request: &TransferRequest,
        signature: &[u8],
    ) -> Result<Address, SignatureError> {
        let signature = parse_signature(signature)?;
        let digest = self.digest(chain, contract, request);
        let scheme = chain.signature_scheme;
        trace!(chain_id = chain.chain_id, ?scheme, %digest, "Recovering signer");

        let recovered = signature.recover_address_from_prehash(&digest)?;
        if recovered != request.from {
            debug!(expected = %request.from, %recovered, "Signature mismatch");
            return Err(SignatureError::Mismatch { expected: request.from, recovered });
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::tests::sepolia;
    use alloy::signers::{SignerSync, local::PrivateKeySigner};

    fn request(from: Address) -> TransferRequest {
        TransferRequest {
            from,
            to: Address::repeat_byte(0xbb),
            token: Address::repeat_byte(0x22),
            amount: U256::from(1_000_000),
            relayerFee: U256::from(100_000),
            nonce: U256::from(3),
            deadline: U256::from(1_900_000_000u64),
        }
    }

    fn chain(scheme: SchemeKind) -> ChainProfile {
        let mut config = sepolia();
        config.signature_scheme = scheme;
        ChainProfile::from_config(config).unwrap()
    }

    fn sign(
        signer: &PrivateKeySigner,
        chain: &ChainProfile,
        request: &TransferRequest,
    ) -> Vec<u8> {
        let contract = chain.contract().unwrap();
        let digest = SignatureVerifier.digest(chain, contract, request);
        signer.sign_hash_sync(&digest).unwrap().as_bytes().to_vec()
    }

    #[test]
    fn accepts_signatures_from_the_sender() {
        let signer = PrivateKeySigner::random();
        for scheme in [SchemeKind::TypedData, SchemeKind::PackedHash] {
            let chain = chain(scheme);
            let request = request(signer.address());
            let signature = sign(&signer, &chain, &request);

            let recovered = SignatureVerifier
                .verify(&chain, chain.contract().unwrap(), &request, &signature)
                .unwrap();
            assert_eq!(recovered, signer.address());
        }
    }

    #[test]
    fn accepts_parity_recovery_ids() {
        let signer = PrivateKeySigner::random();
        let chain = chain(SchemeKind::TypedData);
        let request = request(signer.address());
        let mut signature = sign(&signer, &chain, &request);
        signature[64] -= 27;

        let contract = chain.contract().unwrap();
        assert!(SignatureVerifier.verify(&chain, contract, &request, &signature).is_ok());
    }

    #[test]
    fn tampered_requests_are_rejected() {
        let signer = PrivateKeySigner::random();
        for scheme in [SchemeKind::TypedData, SchemeKind::PackedHash] {
            let chain = chain(scheme);
            let contract = chain.contract().unwrap();
            let signed = request(signer.address());
            let signature = sign(&signer, &chain, &signed);

            let tampered = [
                TransferRequest { to: Address::repeat_byte(0xcc), ..signed.clone() },
                TransferRequest { amount: U256::from(2_000_000), ..signed.clone() },
                TransferRequest { nonce: U256::from(4), ..signed.clone() },
            ];
            for request in tampered {
                let err =
                    SignatureVerifier.verify(&chain, contract, &request, &signature).unwrap_err();
                assert!(matches!(err, SignatureError::Mismatch { .. }), "{err}");
            }
        }
    }

    #[test]
    fn signatures_are_bound_to_the_chain() {
        let signer = PrivateKeySigner::random();
        let chain = chain(SchemeKind::TypedData);
        let request = request(signer.address());
        let signature = sign(&signer, &chain, &request);

        let mut other = sepolia();
        other.chain_id = 84532;
        let other = ChainProfile::from_config(other).unwrap();
        assert!(matches!(
            SignatureVerifier.verify(&other, other.contract().unwrap(), &request, &signature),
            Err(SignatureError::Mismatch { .. })
        ));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(matches!(parse_signature(&[0u8; 64]), Err(SignatureError::InvalidLength(64))));

        let mut bytes = [1u8; 65];
        bytes[64] = 29;
        assert!(matches!(parse_signature(&bytes), Err(SignatureError::InvalidRecoveryId(29))));
    }
}
