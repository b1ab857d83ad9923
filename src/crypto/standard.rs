/// XChaCha20-Poly1305, the recommended default AEAD.
///
/// The EAMSA frame (crypto::aead) exists for compatibility with already
/// deployed data; new integrations should prefer this path. The 24-byte
/// nonce is large enough for random generation without practical collision
/// risk.
///
/// Frame layout: nonce[24] || ciphertext-with-tag.
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};

use crate::crypto::sensitive::SecretBytes32;
use crate::error::{CipherError, Result};

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Encrypt with XChaCha20-Poly1305, prepending the nonce so the frame is
/// self-contained.
pub fn seal(
    key: &SecretBytes32,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::Encryption(e.to_string()))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(nonce), payload)
        .map_err(|e| CipherError::Encryption(e.to_string()))?;

    let mut frame = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    frame.extend_from_slice(nonce);
    frame.extend_from_slice(&ciphertext);
    Ok(frame)
}

/// Decrypt a nonce-prefixed XChaCha20-Poly1305 frame. Any authentication
/// failure surfaces as `AuthFailure`.
pub fn open(key: &SecretBytes32, frame: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < NONCE_LEN + TAG_LEN {
        return Err(CipherError::InvalidFrame(format!(
            "{} bytes, minimum is {}",
            frame.len(),
            NONCE_LEN + TAG_LEN
        )));
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CipherError::AuthFailure)?;

    let (nonce, ciphertext) = frame.split_at(NONCE_LEN);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    cipher
        .decrypt(XNonce::from_slice(nonce), payload)
        .map_err(|_| CipherError::AuthFailure)
}
