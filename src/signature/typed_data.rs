//! EIP-712 typed data authorization.

use crate::{config::DomainConfig, types::TransferRequest};
use alloy::{
    primitives::{Address, B256, ChainId, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};

sol! {
    /// The typed message a user signs to authorize a transfer.
    #[derive(Debug)]
    struct GaslessTransfer {
        address from;
        address to;
        address token;
        uint256 amount;
        uint256 relayerFee;
        uint256 nonce;
        uint256 deadline;
    }
}

impl From<&TransferRequest> for GaslessTransfer {
    fn from(request: &TransferRequest) -> Self {
        Self {
            from: request.from,
            to: request.to,
            token: request.token,
            amount: request.amount,
            relayerFee: request.relayerFee,
            nonce: request.nonce,
            deadline: request.deadline,
        }
    }
}

/// Builds the EIP-712 domain of a relayer contract.
pub fn domain(config: &DomainConfig, chain_id: ChainId, contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(config.name.clone().into()),
        Some(config.version.clone().into()),
        Some(U256::from(chain_id)),
        Some(contract),
        None,
    )
}

/// Computes the EIP-712 signing hash of a transfer.
pub fn signing_hash(domain: &Eip712Domain, request: &TransferRequest) -> B256 {
    GaslessTransfer::from(request).eip712_signing_hash(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    const TRANSFER_TYPE: &str = "GaslessTransfer(address from,address to,address token,\
        uint256 amount,uint256 relayerFee,uint256 nonce,uint256 deadline)";
    const DOMAIN_TYPE: &str =
        "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

    fn request() -> TransferRequest {
        TransferRequest {
            from: Address::repeat_byte(0xaa),
            to: Address::repeat_byte(0xbb),
            token: Address::repeat_byte(0x22),
            amount: U256::from(1_000_000),
            relayerFee: U256::from(100_000),
            nonce: U256::from(3),
            deadline: U256::from(1_900_000_000u64),
        }
    }

    #[test]
    fn type_hash_matches_the_contract_type_string() {
        let transfer = GaslessTransfer::from(&request());
        assert_eq!(transfer.eip712_type_hash(), keccak256(TRANSFER_TYPE));
    }

    #[test]
    fn signing_hash_follows_eip712_encoding() {
        let contract = Address::repeat_byte(0x11);
        let request = request();
        let config = DomainConfig::default();

        let mut encoded_domain = keccak256(DOMAIN_TYPE).to_vec();
        encoded_domain.extend_from_slice(keccak256(&config.name).as_slice());
        encoded_domain.extend_from_slice(keccak256(&config.version).as_slice());
        encoded_domain.extend_from_slice(&U256::from(11155111u64).to_be_bytes::<32>());
        encoded_domain.extend_from_slice(contract.into_word().as_slice());
        let separator = keccak256(&encoded_domain);

        let mut data = keccak256(TRANSFER_TYPE).to_vec();
        for address in [request.from, request.to, request.token] {
            data.extend_from_slice(address.into_word().as_slice());
        }
        for word in [request.amount, request.relayerFee, request.nonce, request.deadline] {
            data.extend_from_slice(&word.to_be_bytes::<32>());
        }
        let struct_hash = keccak256(&data);

        let mut digest = vec![0x19, 0x01];
        digest.extend_from_slice(separator.as_slice());
        digest.extend_from_slice(struct_hash.as_slice());

        let domain = domain(&config, 11155111, contract);
        assert_eq!(signing_hash(&domain, &request), keccak256(&digest));
    }
}
