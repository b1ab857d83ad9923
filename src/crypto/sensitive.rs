/// Wrapper for key material that is automatically zeroized on drop.
///
/// The zeroize crate's volatile writes guarantee the final overwrite is not
/// elided by the compiler.
use sha3::{Digest, Sha3_256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CipherError, Result};

/// A 32-byte secret that is zeroized when dropped. Built from owned bytes
/// via `From`, or from untrusted input via `try_from_slice`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes32([u8; 32]);

impl From<[u8; 32]> for SecretBytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl SecretBytes32 {
    /// Copy caller-supplied key material, rejecting anything that is not
    /// exactly 32 bytes.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Destroy the contents with `passes` rounds of a SHA3-256 derived
    /// stream XORed over the buffer, followed by a final zeroize. Used for
    /// the random-overwrite destruction method; `counter` must be unique
    /// per destruction so the streams never repeat.
    pub fn scrub(&mut self, passes: u32, counter: u64) {
        for pass in 0..passes {
            let mut hasher = Sha3_256::new();
            hasher.update(b"pass");
            hasher.update(pass.to_be_bytes());
            hasher.update(counter.to_be_bytes());
            let stream = hasher.finalize();
            for (byte, mask) in self.0.iter_mut().zip(stream.iter()) {
                *byte ^= mask;
            }
        }
        self.0.zeroize();
    }

    /// Test hook: true when every byte of the buffer is zero.
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_owned_bytes() {
        let key = SecretBytes32::from([0xAA; 32]);
        assert_eq!(key.as_bytes(), &[0xAA; 32]);
    }

    #[test]
    fn test_try_from_slice_enforces_length() {
        assert!(SecretBytes32::try_from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            SecretBytes32::try_from_slice(&[0u8; 16]),
            Err(CipherError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            SecretBytes32::try_from_slice(&[0u8; 33]),
            Err(CipherError::InvalidKeyLength(33))
        ));
    }

    #[test]
    fn test_scrub_leaves_zeros() {
        let mut key = SecretBytes32::from([0x7Fu8; 32]);
        key.scrub(3, 1);
        assert!(key.is_zeroed());
    }

    #[test]
    fn test_scrub_zero_passes_still_zeroizes() {
        let mut key = SecretBytes32::from([0x7Fu8; 32]);
        key.scrub(0, 2);
        assert!(key.is_zeroed());
    }

    #[test]
    fn test_is_zeroed_detects_live_material() {
        let key = SecretBytes32::from([0x01; 32]);
        assert!(!key.is_zeroed());
    }
}
