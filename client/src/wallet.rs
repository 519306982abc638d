//! Signing wallet.
//!
//! A wallet is an Ed25519 key pair. Its address is the hex public key, which
//! is what the server records on receipts.

use agora_types::{KeyPair, PrivateKey, ProposalId, PublicKey, Signature, VoteType, WalletAddress};
use std::fmt;
use std::path::Path;

use crate::keystore::{self, KdfParams};
use crate::ClientError;

pub struct Wallet {
    keys: KeyPair,
    address: WalletAddress,
}

impl Wallet {
    pub fn generate() -> Self {
        Self::from_keypair(agora_crypto::generate_keypair())
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_keypair(agora_crypto::keypair_from_seed(seed))
    }

    pub fn from_private_hex(hex: &str) -> Result<Self, ClientError> {
        let private = PrivateKey::from_hex(hex).map_err(|e| ClientError::Key(e.to_string()))?;
        Ok(Self::from_keypair(agora_crypto::keypair_from_private(private)))
    }

    fn from_keypair(keys: KeyPair) -> Self {
        let address = agora_crypto::address_from_public_key(&keys.public);
        Self { keys, address }
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keys.public
    }

    /// Sign the canonical ballot message for `vote` on `proposal_id`.
    pub fn sign_ballot(&self, proposal_id: &ProposalId, vote: VoteType) -> Signature {
        agora_crypto::sign_ballot(proposal_id, vote, &self.keys.private)
    }

    /// Payload announced on the realtime channel.
    pub fn announcement(&self) -> serde_json::Value {
        serde_json::json!({ "address": self.address.as_str() })
    }

    /// Write the key to `path`, sealed under `passphrase`.
    pub fn save(&self, path: &Path, passphrase: &str) -> Result<(), ClientError> {
        self.save_with(path, passphrase, KdfParams::default())
    }

    pub fn save_with(&self, path: &Path, passphrase: &str, params: KdfParams) -> Result<(), ClientError> {
        let file = keystore::seal(&self.keys.private.0, self.address.as_str(), passphrase, params)?;
        keystore::save(&file, path)
    }

    pub fn load(path: &Path, passphrase: &str) -> Result<Self, ClientError> {
        let file = keystore::load(path)?;
        let seed = keystore::open(&file, passphrase)?;
        let wallet = Self::from_seed(&seed);
        if wallet.address.as_str() != file.address {
            return Err(ClientError::Key(format!(
                "key file {} does not match its address",
                path.display()
            )));
        }
        Ok(wallet)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_verify_against_address() {
        let wallet = Wallet::from_seed(&[9u8; 32]);
        let id = ProposalId::parse("01HZY3J6X8Q2V9T4M7N5K1B0CD").unwrap();
        let sig = wallet.sign_ballot(&id, VoteType::No);
        let key = agora_crypto::public_key_from_address(wallet.address()).unwrap();
        assert!(agora_crypto::verify_ballot(&id, VoteType::No, &sig, &key));
        assert!(!agora_crypto::verify_ballot(&id, VoteType::Yes, &sig, &key));
    }

    const FAST: KdfParams = KdfParams {
        memory: 1024,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn key_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/wallet.json");
        let wallet = Wallet::generate();
        wallet.save_with(&path, "pw", FAST).unwrap();
        let loaded = Wallet::load(&path, "pw").unwrap();
        assert_eq!(loaded.address(), wallet.address());
        assert!(Wallet::load(&path, "nope").is_err());
    }

    #[test]
    fn tampered_address_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let wallet = Wallet::from_seed(&[4u8; 32]);
        let mut file = keystore::seal(&[4u8; 32], "addr1", "pw", FAST).unwrap();
        keystore::save(&file, &path).unwrap();
        assert!(matches!(Wallet::load(&path, "pw"), Err(ClientError::Key(_))));

        file.address = wallet.address().to_string();
        keystore::save(&file, &path).unwrap();
        assert!(Wallet::load(&path, "pw").is_ok());
    }

    #[test]
    fn debug_hides_the_key() {
        let wallet = Wallet::from_seed(&[1u8; 32]);
        let shown = format!("{wallet:?}");
        assert!(!shown.contains(&"01".repeat(32)));
    }
}
