#![allow(dead_code)]

use saltpack_crypto::{BoxKeyPair, BoxSecretKey, MessageKeys, PayloadKey};

pub const INPUT_STRING: &str = "Two roads diverged in a yellow wood, and sorry I could not travel both\n\
                                and be one traveller, long I stood, and looked down one as far as I\n\
                                could, to where it bent in the undergrowth.";

pub const EPHEMERAL_SECRET: &str = "5046adc1dba838867b2bbbfdd0c3423e58b57970b5267a90f57960924a87f196";
pub const ALICE_SECRET: &str = "5ce86efb75fa4e2c410f46e16de9f6acae1a1703528651b69bc176c088bef3ee";
pub const BOB_SECRET: &str = "aa3c626bc9c38c8c201878ebb1d5b0b50ac40e8986c78793db1d4ef369fca1ce";

pub fn key32(hex_str: &str) -> [u8; 32] {
    hex::decode(hex_str).unwrap().try_into().unwrap()
}

pub fn keypair(secret_hex: &str) -> BoxKeyPair {
    BoxKeyPair::from_secret(BoxSecretKey::from_bytes(key32(secret_hex)))
}

pub fn alice() -> BoxKeyPair {
    keypair(ALICE_SECRET)
}

pub fn bob() -> BoxKeyPair {
    keypair(BOB_SECRET)
}

/// Zero payload key and the fixture ephemeral keypair
pub fn fixture_keys() -> MessageKeys {
    MessageKeys {
        payload_key: PayloadKey::from_bytes([0u8; 32]),
        ephemeral: keypair(EPHEMERAL_SECRET),
    }
}

/// Feed `input` through `transform` in pieces of `split` bytes
pub fn run_chunked<T: saltpack_core::Transform>(transform: &mut T, input: &[u8], split: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for piece in input.chunks(split.max(1)) {
        out.extend(transform.update(piece).unwrap());
    }
    out.extend(transform.finish().unwrap());
    out
}

/// Deterministic filler bytes
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
