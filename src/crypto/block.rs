/// The 64-byte block transform: a 16-round substitution-permutation network
/// over 512-bit blocks with final key whitening.
///
/// The eight S-boxes are a family derived from the AES S-box:
/// S_j[x] = rotl8(AES_SBOX[x ^ (0x25 * j)], j). Each member is bijective by
/// construction; `BlockTables::verify` re-checks this at startup and the
/// core refuses to run otherwise. The P-layer is the transpose-by-8 bit
/// permutation, which with MSB-first bit ordering is the 8x8 byte-matrix
/// transpose. The inverse tables are computed once at initialization.
///
/// The transform is branch-free on data: table lookups are indexed only by
/// byte value, with all tables preloaded.
use crate::crypto::kdf::{RoundKeys, ROUND_KEY_COUNT, ROUND_KEY_LEN};

pub const BLOCK_LEN: usize = 64;
pub const ROUNDS: usize = 16;

const ROUND_CONSTANT_BASE: u8 = 0x55;
const SBOX_COUNT: usize = 8;

/// Per-box XOR tweaks: 0x25 * j (mod 256) for box j.
const BOX_TWEAKS: [u8; SBOX_COUNT] = [0x00, 0x25, 0x4a, 0x6f, 0x94, 0xb9, 0xde, 0x03];

#[rustfmt::skip]
const AES_SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

/// Precomputed substitution and permutation tables, built once at startup
/// and shared immutably across threads.
pub struct BlockTables {
    sboxes: [[u8; 256]; SBOX_COUNT],
    inv_sboxes: [[u8; 256]; SBOX_COUNT],
    perm: [usize; BLOCK_LEN],
    inv_perm: [usize; BLOCK_LEN],
}

impl BlockTables {
    pub fn new() -> Self {
        let mut sboxes = [[0u8; 256]; SBOX_COUNT];
        let mut inv_sboxes = [[0u8; 256]; SBOX_COUNT];
        for j in 0..SBOX_COUNT {
            for x in 0..256 {
                let value = AES_SBOX[x ^ BOX_TWEAKS[j] as usize].rotate_left(j as u32);
                sboxes[j][x] = value;
                inv_sboxes[j][value as usize] = x as u8;
            }
        }

        // Transpose-by-8: byte B moves to 8*(B mod 8) + B/8. The inverse is
        // recovered by scan rather than assumed.
        let mut perm = [0usize; BLOCK_LEN];
        let mut inv_perm = [0usize; BLOCK_LEN];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = 8 * (i % 8) + i / 8;
        }
        for (i, &p) in perm.iter().enumerate() {
            inv_perm[p] = i;
        }

        Self {
            sboxes,
            inv_sboxes,
            perm,
            inv_perm,
        }
    }

    /// Check that every S-box is a bijection and the P-layer is a
    /// permutation. Run as part of the startup self-test; a failure here
    /// means the tables cannot be inverted and the core must not start.
    pub fn verify(&self) -> bool {
        for j in 0..SBOX_COUNT {
            let mut seen = [false; 256];
            for x in 0..256 {
                seen[self.sboxes[j][x] as usize] = true;
            }
            if seen.iter().any(|&hit| !hit) {
                return false;
            }
            for x in 0..256u16 {
                if self.inv_sboxes[j][self.sboxes[j][x as usize] as usize] != x as u8 {
                    return false;
                }
            }
        }
        let mut seen = [false; BLOCK_LEN];
        for &p in &self.perm {
            if p >= BLOCK_LEN || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        true
    }

    /// Forward transform: 16 rounds of substitute / permute / key mix /
    /// round constant, then whitening with subkey 10.
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN], keys: &RoundKeys) {
        for round in 0..ROUNDS {
            for (j, byte) in block.iter_mut().enumerate() {
                *byte = self.sboxes[j % SBOX_COUNT][*byte as usize];
            }

            let mut permuted = [0u8; BLOCK_LEN];
            for (i, slot) in permuted.iter_mut().enumerate() {
                *slot = block[self.perm[i]];
            }
            *block = permuted;

            let subkey = keys.key(round % ROUND_KEY_COUNT);
            let constant = ROUND_CONSTANT_BASE ^ (round as u8);
            for (j, byte) in block.iter_mut().enumerate() {
                *byte ^= subkey[j % ROUND_KEY_LEN] ^ constant;
            }
        }

        let whitening = keys.key(ROUND_KEY_COUNT - 1);
        for (j, byte) in block.iter_mut().enumerate() {
            *byte ^= whitening[j % ROUND_KEY_LEN];
        }
    }

    /// Inverse transform: undo whitening, then run the rounds backwards.
    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_LEN], keys: &RoundKeys) {
        let whitening = keys.key(ROUND_KEY_COUNT - 1);
        for (j, byte) in block.iter_mut().enumerate() {
            *byte ^= whitening[j % ROUND_KEY_LEN];
        }

        for round in (0..ROUNDS).rev() {
            let subkey = keys.key(round % ROUND_KEY_COUNT);
            let constant = ROUND_CONSTANT_BASE ^ (round as u8);
            for (j, byte) in block.iter_mut().enumerate() {
                *byte ^= subkey[j % ROUND_KEY_LEN] ^ constant;
            }

            let mut permuted = [0u8; BLOCK_LEN];
            for (i, slot) in permuted.iter_mut().enumerate() {
                *slot = block[self.inv_perm[i]];
            }
            *block = permuted;

            for (j, byte) in block.iter_mut().enumerate() {
                *byte = self.inv_sboxes[j % SBOX_COUNT][*byte as usize];
            }
        }
    }
}

impl Default for BlockTables {
    fn default() -> Self {
        Self::new()
    }
}
