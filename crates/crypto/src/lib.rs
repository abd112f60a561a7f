//! C2: the encryption manager (spec.md §4.2).
//!
//! Keys are `AEAD(global_key, shard_bytes) ++ AEAD(global_key, pk_bytes) ++
//! u64_le(len_of_first_cipher)`; the trailing length lets the shard be
//! recovered from an encrypted key without decrypting it, which is what
//! `k9db-kv`'s prefix extractor needs to hand `rocksdb` a real
//! `SliceTransform`. Values are `AEAD(user_key(shard), row_bytes)`.
//!
//! Per spec.md §4.2 this uses one process-wide random nonce rather than a
//! fresh nonce per message — a simplification the spec explicitly calls out
//! as acceptable for the benchmark harness this system was built for, not
//! something a production AEAD scheme should do.

mod error;

use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use parking_lot::RwLock;
use rand::RngCore;

pub use error::CryptoError;

const NONCE_LEN: usize = 12;
const LEN_TRAILER: usize = 8;

/// Extracts the leading shard portion of a row key, plain or encrypted —
/// the `rocksdb` prefix extractor and comparator both key off of this
/// (spec.md §4.2, "The ordered-KV store is configured with a prefix
/// extractor...").
pub fn shard_prefix(key_bytes: &[u8], encrypted: bool) -> &[u8] {
    if encrypted {
        encrypted_shard_slice(key_bytes)
    } else {
        plain_shard_slice(key_bytes)
    }
}

fn plain_shard_slice(key_bytes: &[u8]) -> &[u8] {
    match key_bytes.iter().position(|&b| b == k9db_codec::SEPARATOR) {
        Some(pos) => &key_bytes[..=pos],
        None => key_bytes,
    }
}

fn encrypted_shard_slice(key_bytes: &[u8]) -> &[u8] {
    if key_bytes.len() < LEN_TRAILER {
        return key_bytes;
    }
    let (body, trailer) = key_bytes.split_at(key_bytes.len() - LEN_TRAILER);
    let len = u64::from_le_bytes(trailer.try_into().expect("8 bytes")) as usize;
    if len > body.len() {
        return key_bytes;
    }
    &body[..len]
}

/// Manages the single global key (used for shard/pk ciphertext in row
/// keys) and the per-shard value keys (lazily generated on first write to a
/// shard, held only in memory — restarting the process loses them, per
/// spec.md §6.2).
pub struct EncryptionManager {
    enabled: bool,
    global_key: Aes256Gcm,
    nonce: [u8; NONCE_LEN],
    shard_keys: RwLock<HashMap<String, Aes256Gcm>>,
}

impl EncryptionManager {
    /// `enabled = false` compiles in the identity mode of spec.md §4.2:
    /// every `encrypt_*`/`decrypt_*` call is a no-op copy.
    pub fn new(enabled: bool) -> Self {
        let mut rng = rand::rng();
        let mut global_key_bytes = [0u8; 32];
        rng.fill_bytes(&mut global_key_bytes);
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        Self {
            enabled,
            global_key: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&global_key_bytes)),
            nonce,
            shard_keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn nonce(&self) -> &Nonce<typenum::U12> {
        Nonce::from_slice(&self.nonce)
    }

    fn aead_encrypt(cipher: &Aes256Gcm, nonce: &Nonce<typenum::U12>, plain: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher.encrypt(nonce, plain).map_err(|_| CryptoError::Encrypt)
    }

    fn aead_decrypt(cipher: &Aes256Gcm, nonce: &Nonce<typenum::U12>, ct: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher.decrypt(nonce, ct).map_err(|_| CryptoError::Decrypt)
    }

    /// `KEY = AEAD(global, shard) ++ AEAD(global, pk) ++ u64_le(len(shard_ct))`.
    pub fn encrypt_key(&self, shard: &[u8], pk: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.enabled {
            let mut out = Vec::with_capacity(shard.len() + pk.len() + 1);
            out.extend_from_slice(shard);
            out.push(k9db_codec::SEPARATOR);
            out.extend_from_slice(pk);
            return Ok(out);
        }
        let nonce = self.nonce();
        let shard_ct = Self::aead_encrypt(&self.global_key, nonce, shard)?;
        let pk_ct = Self::aead_encrypt(&self.global_key, nonce, pk)?;
        let mut out = Vec::with_capacity(shard_ct.len() + pk_ct.len() + LEN_TRAILER);
        let shard_len = shard_ct.len() as u64;
        out.extend_from_slice(&shard_ct);
        out.extend_from_slice(&pk_ct);
        out.extend_from_slice(&shard_len.to_le_bytes());
        Ok(out)
    }

    /// Recover `(shard, pk)` plaintext from an encrypted key.
    pub fn decrypt_key(&self, key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        if !self.enabled {
            let pos = key
                .iter()
                .position(|&b| b == k9db_codec::SEPARATOR)
                .ok_or(CryptoError::MalformedKey)?;
            return Ok((key[..pos].to_vec(), key[pos + 1..].to_vec()));
        }
        if key.len() < LEN_TRAILER {
            return Err(CryptoError::MalformedKey);
        }
        let (body, trailer) = key.split_at(key.len() - LEN_TRAILER);
        let shard_len = u64::from_le_bytes(trailer.try_into().expect("8 bytes")) as usize;
        if shard_len > body.len() {
            return Err(CryptoError::MalformedKey);
        }
        let (shard_ct, pk_ct) = body.split_at(shard_len);
        let nonce = self.nonce();
        let shard = Self::aead_decrypt(&self.global_key, nonce, shard_ct)?;
        let pk = Self::aead_decrypt(&self.global_key, nonce, pk_ct)?;
        Ok((shard, pk))
    }

    /// Encrypt only the shard bytes, for use as a `rocksdb` seek prefix
    /// (spec.md §4.2, "Seek prefixes encrypt only the shard bytes").
    pub fn encrypt_seek(&self, shard: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.enabled {
            return Ok(shard.to_vec());
        }
        Self::aead_encrypt(&self.global_key, self.nonce(), shard)
    }

    fn get_or_create_shard_key(&self, shard: &str) -> Aes256Gcm {
        if let Some(key) = self.shard_keys.read().get(shard) {
            return key.clone();
        }
        let mut guard = self.shard_keys.write();
        if let Some(key) = guard.get(shard) {
            return key.clone();
        }
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let key = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes));
        guard.insert(shard.to_string(), key.clone());
        key
    }

    /// `VAL = AEAD(user_key(shard), row_bytes)`.
    pub fn encrypt_value(&self, shard: &str, row_bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.enabled {
            return Ok(row_bytes.to_vec());
        }
        let key = self.get_or_create_shard_key(shard);
        Self::aead_encrypt(&key, self.nonce(), row_bytes)
    }

    pub fn decrypt_value(&self, shard: &str, ct: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.enabled {
            return Ok(ct.to_vec());
        }
        let key = self.get_or_create_shard_key(shard);
        Self::aead_decrypt(&key, self.nonce(), ct)
    }
}

// Re-exported so call sites don't need a direct `aes_gcm` dependency just to
// name the nonce-length generic.
mod typenum {
    pub use aes_gcm::aes::cipher::consts::U12;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_round_trips_with_encryption_on() {
        let mgr = EncryptionManager::new(true);
        let key = mgr.encrypt_key(b"user__5", b"42").unwrap();
        let (shard, pk) = mgr.decrypt_key(&key).unwrap();
        assert_eq!(shard, b"user__5");
        assert_eq!(pk, b"42");
    }

    #[test]
    fn shard_prefix_extraction_does_not_require_full_decrypt() {
        let mgr = EncryptionManager::new(true);
        let key = mgr.encrypt_key(b"user__5", b"42").unwrap();
        let prefix = shard_prefix(&key, true);
        let (shard, _) = mgr.decrypt_key(&key).unwrap();
        let shard_ct_from_full_decrypt_path = mgr.encrypt_seek(&shard).unwrap();
        assert_eq!(prefix, shard_ct_from_full_decrypt_path.as_slice());
    }

    #[test]
    fn value_round_trips_and_uses_per_shard_key() {
        let mgr = EncryptionManager::new(true);
        let ct_a = mgr.encrypt_value("user__1", b"row-a").unwrap();
        let ct_b = mgr.encrypt_value("user__2", b"row-a").unwrap();
        assert_ne!(ct_a, ct_b, "different shards must use different keys");
        assert_eq!(mgr.decrypt_value("user__1", &ct_a).unwrap(), b"row-a");
    }

    #[test]
    fn encryption_off_mode_is_identity() {
        let mgr = EncryptionManager::new(false);
        let key = mgr.encrypt_key(b"user__5", b"42").unwrap();
        assert_eq!(shard_prefix(&key, false), b"user__5\x1E");
        let (shard, pk) = mgr.decrypt_key(&key).unwrap();
        assert_eq!(shard, b"user__5");
        assert_eq!(pk, b"42");
        let val = mgr.encrypt_value("user__5", b"payload").unwrap();
        assert_eq!(val, b"payload");
    }
}
