//! Relayer signer.
//!
//! The relayer wallet signs the transactions that execute transfers and pays for their gas.
use alloy::{
    network::{EthereumWallet, FullSigner, TxSigner},
    primitives::{Address, Signature},
    signers::local::PrivateKeySigner,
};
use std::{fmt, ops::Deref, str::FromStr, sync::Arc};

/// Signer of relayer transactions.
#[derive(Clone)]
pub struct RelaySigner(Arc<dyn FullSigner<Signature> + Send + Sync>);

impl fmt::Debug for RelaySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelaySigner").field(&self.address()).finish()
    }
}

impl RelaySigner {
    /// Loads a hex encoded private key, with or without `0x` prefix.
    pub fn from_private_key(key: &str) -> eyre::Result<Self> {
        let signer = PrivateKeySigner::from_str(key.trim())
            .map_err(|err| eyre::eyre!("invalid relayer key: {err}"))?;
        Ok(Self::from(signer))
    }

    /// Returns the signer's address.
    pub fn address(&self) -> Address {
        TxSigner::address(&self.0)
    }

    /// Returns a wallet signing with this signer.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::new(self.0.clone())
    }
}

impl From<PrivateKeySigner> for RelaySigner {
    fn from(signer: PrivateKeySigner) -> Self {
        Self(Arc::new(signer))
    }
}

impl Deref for RelaySigner {
    type Target = dyn FullSigner<Signature> + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_keys_with_and_without_prefix() {
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();

        assert_eq!(RelaySigner::from_private_key(key).unwrap().address(), expected);
        assert_eq!(RelaySigner::from_private_key(&format!("0x{key}")).unwrap().address(), expected);
        assert!(RelaySigner::from_private_key("0x1234").is_err());
    }
}
