//! `SecureStorage` — spec.md §4.11: "SecureStorage (with first-run
//! migration of plaintext tokens)".
//!
//! No example repo in the retrieval pack carries a crypto dependency, so
//! this is enriched rather than grounded on a teacher pattern: secrets
//! (OAuth tokens, API keys pulled from config) are encrypted at rest with
//! AES-256-GCM, keyed off `AppConfig::daemon.encryption_key` via SHA-256
//! (`sha2`, already a teacher dependency).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

#[derive(Serialize, Deserialize, Default)]
struct SealedFile {
    secrets: HashMap<String, String>,
}

pub struct SecureStorage {
    path: PathBuf,
    cipher: Aes256Gcm,
    secrets: Mutex<HashMap<String, String>>,
}

impl SecureStorage {
    /// Opens (or creates) the encrypted secrets file at `path`. If a
    /// legacy plaintext JSON file is found at `path` instead, it is read,
    /// re-encrypted in place, and the plaintext contents are overwritten.
    pub fn open(path: impl AsRef<Path>, encryption_key: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let key_bytes = Sha256::digest(encryption_key.as_bytes());
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let secrets = if path.exists() {
            let raw = std::fs::read(&path).context("reading secure storage file")?;
            match decrypt(&cipher, &raw) {
                Ok(secrets) => secrets,
                Err(_) => {
                    // Legacy plaintext migration: the existing file isn't a
                    // sealed blob we can decrypt, so treat it as plaintext
                    // JSON and re-seal it under the new format.
                    let legacy: HashMap<String, String> = serde_json::from_slice(&raw).unwrap_or_default();
                    tracing::warn!(path = %path.display(), "migrating plaintext secure storage to encrypted format");
                    legacy
                }
            }
        } else {
            HashMap::new()
        };

        let storage = Self { path, cipher, secrets: Mutex::new(secrets) };
        storage.persist()?;
        Ok(storage)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.secrets.lock().unwrap().insert(key.to_string(), value.to_string());
        self.persist()
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.secrets.lock().unwrap().remove(key);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let secrets = self.secrets.lock().unwrap().clone();
        let plaintext = serde_json::to_vec(&SealedFile { secrets })?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| anyhow::anyhow!("secure storage encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(&self.path, out).context("writing secure storage file")?;
        restrict_permissions(&self.path);
        Ok(())
    }
}

fn decrypt(cipher: &Aes256Gcm, raw: &[u8]) -> Result<HashMap<String, String>> {
    if raw.len() < NONCE_LEN {
        anyhow::bail!("secure storage file too short");
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| anyhow::anyhow!("secure storage decryption failed"))?;
    let sealed: SealedFile = serde_json::from_slice(&plaintext)?;
    Ok(sealed.secrets)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_reopen_round_trips() {
        let dir = std::env::temp_dir().join(format!("omnibrain-secure-test-{}", uuid_like()));
        let path = dir.join("secrets.bin");
        {
            let storage = SecureStorage::open(&path, "test-key").unwrap();
            storage.set("gmail_refresh_token", "abc123").unwrap();
        }
        let reopened = SecureStorage::open(&path, "test-key").unwrap();
        assert_eq!(reopened.get("gmail_refresh_token"), Some("abc123".to_string()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wrong_key_does_not_yield_the_original_secret() {
        let dir = std::env::temp_dir().join(format!("omnibrain-secure-test-{}", uuid_like()));
        let path = dir.join("secrets.bin");
        {
            let storage = SecureStorage::open(&path, "right-key").unwrap();
            storage.set("token", "secret-value").unwrap();
        }
        let reopened = SecureStorage::open(&path, "wrong-key").unwrap();
        assert_ne!(reopened.get("token"), Some("secret-value".to_string()));
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }
}
