//! Transaction signing

use alloy_primitives::{keccak256, Address, Bytes};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use std::path::Path;
use std::str::FromStr;

use oracle_core::{CoreError, CoreResult, ExecutionError, ExecutionResult};

/// Account credentials used to sign transactions
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Signature over the keccak-256 hash of `message`
    fn sign(&self, message: &[u8]) -> ExecutionResult<Bytes>;
}

/// secp256k1 key held in memory
pub struct LocalKeySigner {
    wallet: LocalWallet,
}

impl LocalKeySigner {
    pub fn from_hex(key: &str) -> CoreResult<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet = LocalWallet::from_str(key)
            .map_err(|e| CoreError::KeyFile(format!("invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    /// Load a hex encoded private key from a file
    pub fn load_from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoreError::KeyFile(format!("{}: {}", path.display(), e)))?;
        Self::from_hex(&contents)
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl TxSigner for LocalKeySigner {
    fn address(&self) -> Address {
        Address::from(self.wallet.address().0)
    }

    fn sign(&self, message: &[u8]) -> ExecutionResult<Bytes> {
        let hash = keccak256(message);
        let signature = self
            .wallet
            .sign_hash(H256::from(hash.0))
            .map_err(|e| ExecutionError::SigningFailed(e.to_string()))?;
        Ok(Bytes::from(signature.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_from_key() {
        let signer = LocalKeySigner::from_hex(&format!("0x{}\n", KEY)).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(signer.address(), expected);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = LocalKeySigner::from_hex(KEY).unwrap();
        let first = signer.sign(b"submitBatch").unwrap();
        let second = signer.sign(b"submitBatch").unwrap();
        assert_eq!(first.len(), 65);
        assert_eq!(first, second);
        assert_ne!(first, signer.sign(b"other").unwrap());
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(LocalKeySigner::from_hex("zz"), Err(CoreError::KeyFile(_))));
        assert!(matches!(
            LocalKeySigner::load_from_file("/nonexistent/key.pem"),
            Err(CoreError::KeyFile(_))
        ));
    }
}
