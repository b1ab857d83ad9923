/// Key derivation for the EAMSA construction.
///
/// Round keys, the HMAC auth key, and the CBC initialization vector are all
/// SHA3-512 derived from (master key, nonce). The input layouts here are
/// frozen: changing any of them breaks every frame already written. Backup
/// keys may additionally be derived from a passphrase with Argon2id
/// (t=3, m=256MB, p=4).
use argon2::{Algorithm, Argon2, Params, Version};
use sha3::{Digest, Sha3_512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::hash;
use crate::crypto::sensitive::SecretBytes32;
use crate::error::{CipherError, Result};

pub const MASTER_KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 16;
pub const ROUND_KEY_COUNT: usize = 11;
pub const ROUND_KEY_LEN: usize = 16;
pub const IV_LEN: usize = 64;

/// Argon2id parameters for passphrase-derived backup keys.
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_MEMORY_KIB: u32 = 262_144; // 256 MiB
const ARGON2_PARALLELISM: u32 = 4;

/// The ordered 11-entry round-key schedule. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RoundKeys([[u8; ROUND_KEY_LEN]; ROUND_KEY_COUNT]);

impl RoundKeys {
    pub fn key(&self, index: usize) -> &[u8; ROUND_KEY_LEN] {
        &self.0[index]
    }

    /// All subkeys must be pairwise distinct; checked at startup self-test.
    pub fn all_distinct(&self) -> bool {
        for i in 0..ROUND_KEY_COUNT {
            for j in (i + 1)..ROUND_KEY_COUNT {
                if self.0[i] == self.0[j] {
                    return false;
                }
            }
        }
        true
    }
}

/// Derive the 11 round subkeys.
///
/// subkey_i = SHA3-512(BE32(i+1) || master || nonce || shared_secret?)[0..16]
pub fn derive_round_keys(
    master: &SecretBytes32,
    nonce: &[u8; NONCE_LEN],
    shared_secret: Option<&[u8]>,
) -> RoundKeys {
    let mut keys = [[0u8; ROUND_KEY_LEN]; ROUND_KEY_COUNT];
    for (i, key) in keys.iter_mut().enumerate() {
        let mut hasher = Sha3_512::new();
        hasher.update((i as u32 + 1).to_be_bytes());
        hasher.update(master.as_bytes());
        hasher.update(nonce);
        if let Some(secret) = shared_secret {
            hasher.update(secret);
        }
        let digest = hasher.finalize();
        key.copy_from_slice(&digest[..ROUND_KEY_LEN]);
    }
    RoundKeys(keys)
}

/// 32-byte HMAC key: SHA3-512("AUTH" || master || nonce)[0..32].
pub fn derive_auth_key(master: &SecretBytes32, nonce: &[u8; NONCE_LEN]) -> SecretBytes32 {
    let digest = hash::sha3_512_concat(&[b"AUTH", master.as_bytes(), nonce]);
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest[..32]);
    SecretBytes32::from(key)
}

/// Key for the recommended XChaCha20-Poly1305 path:
/// SHA3-512("XAEAD" || master)[0..32].
pub fn derive_standard_key(master: &SecretBytes32) -> SecretBytes32 {
    let digest = hash::sha3_512_concat(&[b"XAEAD", master.as_bytes()]);
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest[..32]);
    SecretBytes32::from(key)
}

/// Everything the cipher needs for one nonce: round keys, auth key, and the
/// CBC IV (SHA3-512(nonce || master), never transmitted). Both sides derive
/// the same schedule from the frame nonce and their copy of the master key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeySchedule {
    pub nonce: [u8; NONCE_LEN],
    pub iv: [u8; IV_LEN],
    pub round_keys: RoundKeys,
    pub auth_key: SecretBytes32,
}

impl KeySchedule {
    pub fn derive(master: &SecretBytes32, nonce: &[u8; NONCE_LEN]) -> Self {
        let iv = hash::sha3_512_concat(&[nonce, master.as_bytes()]);
        Self {
            nonce: *nonce,
            iv,
            round_keys: derive_round_keys(master, nonce, None),
            auth_key: derive_auth_key(master, nonce),
        }
    }
}

/// Derive a 32-byte backup key from a passphrase using Argon2id.
pub fn derive_backup_key(passphrase: &[u8], salt: &[u8]) -> Result<SecretBytes32> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

    Ok(SecretBytes32::from(output))
}

/// Derive a backup key with reduced parameters for testing (fast but insecure).
#[cfg(test)]
pub fn derive_backup_key_test(passphrase: &[u8], salt: &[u8]) -> Result<SecretBytes32> {
    let params = Params::new(1024, 1, 1, Some(32))
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

    Ok(SecretBytes32::from(output))
}
