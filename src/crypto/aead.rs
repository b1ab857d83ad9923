/// Encrypt-then-MAC framing for the EAMSA construction.
///
/// Frame layout: ciphertext || nonce[16] || tag[64], where the tag is
/// HMAC-SHA3-512(auth_key, nonce || ciphertext). Decryption verifies the
/// tag before touching the ciphertext, and reports tag and padding failures
/// as the same `AuthFailure`.
use crate::crypto::block::{BlockTables, BLOCK_LEN};
use crate::crypto::hash::{self, TAG_LEN};
use crate::crypto::kdf::{KeySchedule, NONCE_LEN};
use crate::crypto::mode;
use crate::error::{CipherError, Result};

/// Nonce plus tag; the smallest possible frame adds one ciphertext block.
pub const FRAME_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// A parsed frame, borrowing the ciphertext and tag regions.
pub struct Frame<'a> {
    pub ciphertext: &'a [u8],
    pub nonce: [u8; NONCE_LEN],
    pub tag: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split a frame into its regions. Rejects frames shorter than the
    /// overhead and ciphertexts that are not a positive multiple of the
    /// block size.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < FRAME_OVERHEAD {
            return Err(CipherError::InvalidFrame(format!(
                "{} bytes, minimum is {}",
                bytes.len(),
                FRAME_OVERHEAD
            )));
        }
        let ciphertext_len = bytes.len() - FRAME_OVERHEAD;
        if ciphertext_len == 0 || ciphertext_len % BLOCK_LEN != 0 {
            return Err(CipherError::InvalidFrame(format!(
                "ciphertext length {ciphertext_len} is not a positive multiple of {BLOCK_LEN}"
            )));
        }

        let ciphertext = &bytes[..ciphertext_len];
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[ciphertext_len..ciphertext_len + NONCE_LEN]);
        let tag = &bytes[ciphertext_len + NONCE_LEN..];

        Ok(Self {
            ciphertext,
            nonce,
            tag,
        })
    }
}

/// Encrypt and authenticate under the given schedule.
pub fn seal(tables: &BlockTables, schedule: &KeySchedule, plaintext: &[u8]) -> Vec<u8> {
    let ciphertext = mode::encrypt_cbc(tables, schedule, plaintext);

    let mut tag_input = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    tag_input.extend_from_slice(&schedule.nonce);
    tag_input.extend_from_slice(&ciphertext);
    let tag = hash::hmac_sha3_512(schedule.auth_key.as_bytes(), &tag_input);

    let mut frame = ciphertext;
    frame.extend_from_slice(&schedule.nonce);
    frame.extend_from_slice(&tag);
    frame
}

/// Tag check only, in constant time. Used by the key-version trial loop,
/// which bounds each candidate to this cheap verification.
pub fn verify(schedule: &KeySchedule, frame: &Frame) -> bool {
    let mut tag_input = Vec::with_capacity(NONCE_LEN + frame.ciphertext.len());
    tag_input.extend_from_slice(&frame.nonce);
    tag_input.extend_from_slice(frame.ciphertext);
    let expected = hash::hmac_sha3_512(schedule.auth_key.as_bytes(), &tag_input);
    hash::verify_tag(&expected, frame.tag)
}

/// Verify, decrypt, and strip padding. The plaintext buffer is only
/// allocated after the tag matches.
pub fn open(tables: &BlockTables, schedule: &KeySchedule, frame: &Frame) -> Result<Vec<u8>> {
    if !verify(schedule, frame) {
        return Err(CipherError::AuthFailure);
    }
    let padded = mode::decrypt_cbc(tables, schedule, frame.ciphertext);
    mode::unpad(&padded).ok_or(CipherError::AuthFailure)
}
