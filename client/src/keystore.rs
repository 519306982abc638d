//! Passphrase-encrypted wallet key files.
//!
//! The 32-byte Ed25519 seed is sealed with AES-256-GCM under a key derived
//! from the passphrase by Argon2id. The file records every parameter needed
//! to open it again, plus the wallet address in the clear so it can be shown
//! without the passphrase.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::Zeroizing;

use crate::ClientError;

const ARGON2_MEMORY_KIB: u32 = 65536; // 64 MB
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEYSTORE_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub version: u32,
    pub address: String,
    pub crypto: KeystoreCrypto,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded.
    pub salt: String,
    /// Hex-encoded.
    pub nonce: String,
    /// Hex-encoded.
    pub ciphertext: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

fn key_err(msg: impl Into<String>) -> ClientError {
    ClientError::Key(msg.into())
}

/// Seal `seed` for `address` under `passphrase`.
pub fn seal(
    seed: &[u8; 32],
    address: &str,
    passphrase: &str,
    params: KdfParams,
) -> Result<KeystoreFile, ClientError> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| key_err(format!("cipher init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), seed.as_ref())
        .map_err(|e| key_err(format!("encryption failed: {e}")))?;

    Ok(KeystoreFile {
        version: KEYSTORE_VERSION,
        address: address.to_string(),
        crypto: KeystoreCrypto {
            cipher: "aes-256-gcm".to_string(),
            kdf: "argon2id".to_string(),
            kdf_params: params,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        },
    })
}

/// Recover the seed. A wrong passphrase and a damaged file look the same.
pub fn open(file: &KeystoreFile, passphrase: &str) -> Result<Zeroizing<[u8; 32]>, ClientError> {
    if file.version != KEYSTORE_VERSION {
        return Err(key_err(format!("unsupported keystore version {}", file.version)));
    }
    if file.crypto.cipher != "aes-256-gcm" || file.crypto.kdf != "argon2id" {
        return Err(key_err(format!(
            "unsupported keystore scheme {}/{}",
            file.crypto.kdf, file.crypto.cipher
        )));
    }

    let salt = hex::decode(&file.crypto.salt).map_err(|e| key_err(format!("invalid salt: {e}")))?;
    let nonce = hex::decode(&file.crypto.nonce).map_err(|e| key_err(format!("invalid nonce: {e}")))?;
    let ciphertext = hex::decode(&file.crypto.ciphertext)
        .map_err(|e| key_err(format!("invalid ciphertext: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(key_err(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }

    let key = derive_key(passphrase, &salt, file.crypto.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| key_err(format!("cipher init failed: {e}")))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| key_err("wrong passphrase or corrupted key file"))?,
    );

    let seed: [u8; 32] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| key_err(format!("sealed key has {} bytes, expected 32", plaintext.len())))?;
    Ok(Zeroizing::new(seed))
}

pub fn save(file: &KeystoreFile, path: &Path) -> Result<(), ClientError> {
    let json = serde_json::to_string_pretty(file)
        .map_err(|e| key_err(format!("cannot encode key file: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| key_err(format!("cannot create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, json).map_err(|e| key_err(format!("cannot write {}: {e}", path.display())))
}

pub fn load(path: &Path) -> Result<KeystoreFile, ClientError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| key_err(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| key_err(format!("invalid key file {}: {e}", path.display())))
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; 32]>, ClientError> {
    let params = Params::new(params.memory, params.iterations, params.parallelism, Some(32))
        .map_err(|e| key_err(format!("invalid KDF parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut output[..])
        .map_err(|e| key_err(format!("key derivation failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small parameters keep tests fast; the format is the same.
    const FAST: KdfParams = KdfParams {
        memory: 1024,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn seal_then_open() {
        let file = seal(&[42u8; 32], "addr", "correct horse", FAST).unwrap();
        assert_eq!(*open(&file, "correct horse").unwrap(), [42u8; 32]);
        assert_eq!(file.crypto.kdf, "argon2id");
        assert_eq!(file.address, "addr");
    }

    #[test]
    fn wrong_passphrase_fails() {
        let file = seal(&[42u8; 32], "addr", "right", FAST).unwrap();
        assert!(matches!(open(&file, "wrong"), Err(ClientError::Key(_))));
    }

    #[test]
    fn salts_differ_between_seals() {
        let a = seal(&[7u8; 32], "addr", "pw", FAST).unwrap();
        let b = seal(&[7u8; 32], "addr", "pw", FAST).unwrap();
        assert_ne!(a.crypto.salt, b.crypto.salt);
        assert_ne!(a.crypto.ciphertext, b.crypto.ciphertext);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut file = seal(&[0u8; 32], "addr", "pw", FAST).unwrap();
        file.version = 9;
        assert!(open(&file, "pw").is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/key.json");
        let file = seal(&[3u8; 32], "addr", "pw", FAST).unwrap();
        save(&file, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(*open(&loaded, "pw").unwrap(), [3u8; 32]);
        assert!(load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn default_params_are_production_strength() {
        assert_eq!(KdfParams::default().memory, 65536);
        assert_eq!(KdfParams::default().iterations, 3);
    }
}
