/// SHA3-512 and HMAC-SHA3-512 primitives.
///
/// The HMAC construction uses a 136-byte block with the standard 0x36/0x5c
/// pad constants. 136 bytes is the SHA3-256 rate, not SHA3-512's 72, but
/// the value is a frozen parameter of the frame format, which also rules
/// out the `hmac` crate here.
use sha3::{Digest, Sha3_512};
use subtle::ConstantTimeEq;

pub const DIGEST_LEN: usize = 64;
pub const TAG_LEN: usize = 64;
pub const FINGERPRINT_LEN: usize = 16;

const HMAC_BLOCK_LEN: usize = 136;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// Hash arbitrary data with SHA3-512.
pub fn sha3_512(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha3_512::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Hash a sequence of byte strings as one message.
pub fn sha3_512_concat(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&digest);
    out
}

/// HMAC-SHA3-512 over `message` with the scheme's 136-byte block.
///
/// Keys longer than the block are hashed first; shorter keys are
/// zero-padded.
pub fn hmac_sha3_512(key: &[u8], message: &[u8]) -> [u8; TAG_LEN] {
    let mut block_key = [0u8; HMAC_BLOCK_LEN];
    if key.len() > HMAC_BLOCK_LEN {
        block_key[..DIGEST_LEN].copy_from_slice(&sha3_512(key));
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut ipad = [0u8; HMAC_BLOCK_LEN];
    let mut opad = [0u8; HMAC_BLOCK_LEN];
    for i in 0..HMAC_BLOCK_LEN {
        ipad[i] = block_key[i] ^ IPAD;
        opad[i] = block_key[i] ^ OPAD;
    }

    let inner = sha3_512_concat(&[&ipad, message]);
    sha3_512_concat(&[&opad, &inner])
}

/// Constant-time tag comparison. No early exit on mismatch.
pub fn verify_tag(expected: &[u8; TAG_LEN], received: &[u8]) -> bool {
    if received.len() != TAG_LEN {
        return false;
    }
    expected[..].ct_eq(received).into()
}

/// Non-secret key identifier: first 16 bytes of SHA3-512(master key).
pub fn key_fingerprint(master: &[u8]) -> [u8; FINGERPRINT_LEN] {
    let digest = sha3_512(master);
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&digest[..FINGERPRINT_LEN]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_512_empty() {
        // FIPS 202 test vector for the empty message.
        let expected = hex::decode(
            "a69f73cca23a9ac5c8b567dc185a756e97c982164fe25859e0d1dcc1475c80a6\
             15b2123af1f5f94c11e3e9402c3ac558f500199d95b6d3e301758586281dcd26",
        )
        .unwrap();
        assert_eq!(sha3_512(b"").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_sha3_512_concat_matches_single() {
        let whole = sha3_512(b"hello world");
        let parts = sha3_512_concat(&[b"hello", b" ", b"world"]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn test_hmac_short_key() {
        let expected = hex::decode(
            "51df4607b244f4c9c910d61245d73a4d35cef6ec1f4671b43b93ab843d366c0c\
             4ae92e541dbbf44835d08a9599902da9868e13d731fb1bd74225fa71db538fd2",
        )
        .unwrap();
        assert_eq!(hmac_sha3_512(b"key", b"message").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_hmac_oversized_key_is_hashed_first() {
        let expected = hex::decode(
            "91ab8614a6698a7d2dd75a4ce5118ef9c45f4860d0aecfce71cc96d80415efaa\
             7026265270322d6487c758789c419b834726e36731e17a8e0e55a8257deb42af",
        )
        .unwrap();
        let long_key = [0x0bu8; 137];
        assert_eq!(hmac_sha3_512(&long_key, b"abc").as_slice(), expected.as_slice());
    }

    #[test]
    fn test_verify_tag() {
        let tag = hmac_sha3_512(b"k", b"m");
        assert!(verify_tag(&tag, &tag));

        let mut tampered = tag;
        tampered[0] ^= 0x01;
        assert!(!verify_tag(&tag, &tampered));

        let mut tail_tampered = tag;
        tail_tampered[TAG_LEN - 1] ^= 0x80;
        assert!(!verify_tag(&tag, &tail_tampered));

        assert!(!verify_tag(&tag, &tag[..32]));
    }

    #[test]
    fn test_key_fingerprint_is_digest_prefix() {
        let master = [0x42u8; 32];
        let fp = key_fingerprint(&master);
        assert_eq!(fp.as_slice(), &sha3_512(&master)[..16]);
    }
}
