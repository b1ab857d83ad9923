use thiserror::Error;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid nonce length: expected 16 bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Tag mismatch, padding failure, or no key version matched. The cause
    /// is deliberately not distinguished.
    #[error("Authentication failed")]
    AuthFailure,

    #[error("Key version {0} not found")]
    KeyNotFound(u32),

    #[error("Invalid key state: {0}")]
    KeyStateInvalid(String),

    #[error("Rotation too soon: active key is {age_days} days old, policy minimum is {min_days}")]
    RotationTooSoon { age_days: i64, min_days: u32 },

    #[error("Entropy source unavailable")]
    EntropyUnavailable,

    #[error("Startup self-test failed")]
    SelfTestFailed,

    #[error("Invalid rotation policy: {0}")]
    PolicyInvalid(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

pub type Result<T> = std::result::Result<T, CipherError>;
