/// Known-answer self-tests executed at startup.
///
/// Each vector pins a (key, nonce, plaintext) triple to the exact frame an
/// interoperable implementation must produce. The suite also checks S-box
/// bijectivity and subkey distinctness. Any failure leaves the core in a
/// permanent error state where every operation reports the self-test
/// failure.
use tracing::error;

use crate::crypto::aead::{self, Frame};
use crate::crypto::block::BlockTables;
use crate::crypto::kdf::{derive_round_keys, KeySchedule};
use crate::crypto::sensitive::SecretBytes32;
use crate::error::{CipherError, Result};

struct KatVector {
    id: &'static str,
    key: &'static str,
    nonce: &'static str,
    plaintext: &'static str,
    frame: &'static str,
}

const VECTORS: &[KatVector] = &[
    KatVector {
        id: "KAT-001",
        key: "0000000000000000000000000000000000000000000000000000000000000000",
        nonce: "00000000000000000000000000000000",
        plaintext: "0000000000000000000000000000000000000000000000000000000000000000\
                    0000000000000000000000000000000000000000000000000000000000000000",
        frame: "635812092bb36d6b34968424fcc3ade4e8170e916904c852098fdaf8330ec4a4\
                8d2400caf4f24a76aadaa4663828d54cae4373dc294be66c3469cb0a9250fb53\
                9fafb08b50756753eeffb73b62d090ba5a7aaaef885806a09e2a613593235b91\
                bcf47e77a1570e65e9cf38f56a579fd7b887148df7fdb8e3801e83afa733187f\
                000000000000000000000000000000007c3e8c4a8271382bdc07517bc0ce9d6f\
                b3e75633071dffc8ff9b2c0e2a586d9f71da673fda2d98ae2af8b8d548266a3b\
                ed88f3594836a7aba3298909e730b014",
    },
    KatVector {
        id: "KAT-002",
        key: "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        nonce: "000102030405060708090a0b0c0d0e0f",
        plaintext: "54686520717569636b2062726f776e20666f78206a756d7073206f7665722074\
                    6865206c617a7920646f67",
        frame: "af1fca0e01a804b42ce2db057473bc1811c786980e69ed83b07cefd308f246a7\
                7e780f41a246ac9c558c88652cab309f90e792cf46a3d5c3d4d6a7be36fb81b4\
                000102030405060708090a0b0c0d0e0f4e116ae7c1a7b9b7cb63e4a53f0ebe29\
                df1fb28945c7bbc1d259fe72ebe3b47705c4f419a7988b6f79da16bcc01178f2\
                94cff69e9fc82dc14f9ad2c96e1d7d1d",
    },
    KatVector {
        id: "KAT-003",
        key: "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        nonce: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        plaintext: "",
        frame: "0359b769f85cd53b1909bf14cf2a06e451b9a11875e7e87a587017bca9e9458a\
                a5d4b8119500343e1b530a5e757c43dff9e751493d56cb1b1f75da1f70ee35f9\
                aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa8e8873d570abfa5e81e01f498e307b56\
                a02993ccf5772a73a64e3d471743eb6061dcdb10d7dee0da7a9563f647b07314\
                f387d55b9c040ac451b673e4080419ec",
    },
];

/// Run the full startup suite against the given tables.
pub fn run_startup_tests(tables: &BlockTables) -> Result<()> {
    if !tables.verify() {
        return Err(CipherError::SelfTestFailed);
    }

    // Subkey distinctness for a fixed derivation.
    let mut master = [0u8; 32];
    for (i, b) in master.iter_mut().enumerate() {
        *b = i as u8;
    }
    let mut nonce = [0u8; 16];
    for (i, b) in nonce.iter_mut().enumerate() {
        *b = i as u8;
    }
    let round_keys = derive_round_keys(&SecretBytes32::from(master), &nonce, None);
    if !round_keys.all_distinct() {
        return Err(CipherError::SelfTestFailed);
    }

    for vector in VECTORS {
        verify_vector(tables, vector)?;
    }
    Ok(())
}

fn verify_vector(tables: &BlockTables, vector: &KatVector) -> Result<()> {
    let key = decode_fixed::<32>(vector.key)?;
    let nonce = decode_fixed::<16>(vector.nonce)?;
    let plaintext = decode(vector.plaintext)?;
    let expected_frame = decode(vector.frame)?;

    let schedule = KeySchedule::derive(&SecretBytes32::from(key), &nonce);

    let produced = aead::seal(tables, &schedule, &plaintext);
    if produced != expected_frame {
        error!(vector = vector.id, "known-answer frame mismatch");
        return Err(CipherError::SelfTestFailed);
    }

    let frame = Frame::parse(&expected_frame).map_err(|_| CipherError::SelfTestFailed)?;
    let opened =
        aead::open(tables, &schedule, &frame).map_err(|_| CipherError::SelfTestFailed)?;
    if opened != plaintext {
        error!(vector = vector.id, "known-answer decrypt mismatch");
        return Err(CipherError::SelfTestFailed);
    }
    Ok(())
}

fn decode(hex_str: &str) -> Result<Vec<u8>> {
    hex::decode(hex_str).map_err(|_| CipherError::SelfTestFailed)
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Result<[u8; N]> {
    let bytes = decode(hex_str)?;
    bytes.try_into().map_err(|_| CipherError::SelfTestFailed)
}
