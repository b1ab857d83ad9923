/// CBC composition over the block transform, with PKCS#7 padding at the
/// 64-byte block size.
///
/// Padding is always applied, so the pad length is in [1, 64] and an exact
/// multiple of the block size grows by one full block. The IV lives in the
/// schedule (SHA3-512 of nonce || master) and is re-derived on decrypt, not
/// transmitted.
use crate::crypto::block::{BlockTables, BLOCK_LEN};
use crate::crypto::kdf::KeySchedule;

/// Append PKCS#7 padding to a full multiple of the block size.
pub fn pad(plaintext: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_LEN - (plaintext.len() % BLOCK_LEN);
    let mut padded = Vec::with_capacity(plaintext.len() + pad_len);
    padded.extend_from_slice(plaintext);
    padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    padded
}

/// Validate and strip PKCS#7 padding. Returns None on any inconsistency;
/// the pad bytes are checked with an accumulated difference so the failing
/// position is not signalled.
pub fn unpad(padded: &[u8]) -> Option<Vec<u8>> {
    if padded.is_empty() || padded.len() % BLOCK_LEN != 0 {
        return None;
    }
    let pad_len = padded[padded.len() - 1] as usize;
    if pad_len == 0 || pad_len > BLOCK_LEN {
        return None;
    }
    let body_len = padded.len() - pad_len;
    let mut diff = 0u8;
    for &byte in &padded[body_len..] {
        diff |= byte ^ pad_len as u8;
    }
    if diff != 0 {
        return None;
    }
    Some(padded[..body_len].to_vec())
}

/// Pad and encrypt in CBC mode. The ciphertext is a positive multiple of
/// the block size.
pub fn encrypt_cbc(tables: &BlockTables, schedule: &KeySchedule, plaintext: &[u8]) -> Vec<u8> {
    let padded = pad(plaintext);
    let mut ciphertext = Vec::with_capacity(padded.len());

    let mut prev = schedule.iv;
    for chunk in padded.chunks_exact(BLOCK_LEN) {
        let mut block = [0u8; BLOCK_LEN];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = chunk[i] ^ prev[i];
        }
        tables.encrypt_block(&mut block, &schedule.round_keys);
        ciphertext.extend_from_slice(&block);
        prev = block;
    }
    ciphertext
}

/// Decrypt in CBC mode, returning the still-padded plaintext. The caller
/// validates padding so that its failure is indistinguishable from a tag
/// failure. `ciphertext` must be a positive multiple of the block size.
pub fn decrypt_cbc(tables: &BlockTables, schedule: &KeySchedule, ciphertext: &[u8]) -> Vec<u8> {
    debug_assert!(!ciphertext.is_empty() && ciphertext.len() % BLOCK_LEN == 0);

    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut prev = schedule.iv;
    for chunk in ciphertext.chunks_exact(BLOCK_LEN) {
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(chunk);
        tables.decrypt_block(&mut block, &schedule.round_keys);
        for (i, byte) in block.iter_mut().enumerate() {
            *byte ^= prev[i];
        }
        plaintext.extend_from_slice(&block);
        prev.copy_from_slice(chunk);
    }
    plaintext
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sensitive::SecretBytes32;

    fn test_schedule() -> KeySchedule {
        let mut master = [0u8; 32];
        for (i, b) in master.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut nonce = [0u8; 16];
        for (i, b) in nonce.iter_mut().enumerate() {
            *b = i as u8;
        }
        KeySchedule::derive(&SecretBytes32::from(master), &nonce)
    }

    #[test]
    fn test_pad_lengths() {
        assert_eq!(pad(&[]).len(), 64);
        assert_eq!(pad(&[0u8; 40]).len(), 64);
        assert_eq!(pad(&[0u8; 63]).len(), 64);
        // An exact block gains a full padding block of 64s.
        let padded = pad(&[0u8; 64]);
        assert_eq!(padded.len(), 128);
        assert!(padded[64..].iter().all(|&b| b == 64));
    }

    #[test]
    fn test_pad_unpad_roundtrip() {
        for len in [0usize, 1, 40, 63, 64, 65, 128] {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let stripped = unpad(&pad(&data)).unwrap();
            assert_eq!(stripped, data);
        }
    }

    #[test]
    fn test_unpad_rejects_bad_padding() {
        // Pad byte of zero.
        let mut padded = pad(b"hello");
        let len = padded.len();
        padded[len - 1] = 0;
        assert!(unpad(&padded).is_none());

        // Pad byte larger than the block.
        let mut padded = pad(b"hello");
        padded[len - 1] = 65;
        assert!(unpad(&padded).is_none());

        // Inconsistent pad bytes.
        let mut padded = pad(b"hello");
        padded[len - 2] ^= 0xFF;
        assert!(unpad(&padded).is_none());

        // Not a block multiple.
        assert!(unpad(&[1u8; 63]).is_none());
        assert!(unpad(&[]).is_none());
    }

    #[test]
    fn test_cbc_roundtrip() {
        let tables = BlockTables::new();
        let schedule = test_schedule();

        for len in [0usize, 1, 40, 64, 100, 256] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let ciphertext = encrypt_cbc(&tables, &schedule, &data);
            assert_eq!(ciphertext.len() % BLOCK_LEN, 0);
            assert!(!ciphertext.is_empty());

            let padded = decrypt_cbc(&tables, &schedule, &ciphertext);
            assert_eq!(unpad(&padded).unwrap(), data);
        }
    }

    #[test]
    fn test_cbc_identical_blocks_chain() {
        let tables = BlockTables::new();
        let schedule = test_schedule();

        // Two identical plaintext blocks must not produce identical
        // ciphertext blocks.
        let data = [0xABu8; 128];
        let ciphertext = encrypt_cbc(&tables, &schedule, &data);
        assert_ne!(ciphertext[..64], ciphertext[64..128]);
    }
}
