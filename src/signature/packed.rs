//! Packed-hash authorization, signed as an EIP-191 personal message.

use crate::types::TransferRequest;
use alloy::{
    primitives::{Address, B256, eip191_hash_message, keccak256},
    sol_types::SolValue,
};

/// Computes `keccak256(abi.encodePacked(contract, from, to, token, amount, fee, nonce, deadline))`.
pub fn message_hash(contract: Address, request: &TransferRequest) -> B256 {
    keccak256(
        (
            contract,
            request.from,
            request.to,
            request.token,
            request.amount,
            request.relayerFee,
            request.nonce,
            request.deadline,
        )
            .abi_encode_packed(),
    )
}

/// Computes the hash recovered against: the message hash prefixed with
/// `"\x19Ethereum Signed Message:\n32"`.
pub fn signing_hash(contract: Address, request: &TransferRequest) -> B256 {
    eip191_hash_message(message_hash(contract, request))
}
