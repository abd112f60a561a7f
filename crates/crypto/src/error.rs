use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("AEAD encryption failed")]
    Encrypt,
    #[error("AEAD decryption failed (wrong key or corrupted ciphertext)")]
    Decrypt,
    #[error("encrypted key is malformed: missing or truncated length trailer")]
    MalformedKey,
}
