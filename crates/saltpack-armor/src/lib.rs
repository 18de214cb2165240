//! saltpack-armor: ASCII armor for saltpack messages
//!
//! # Overview
//! - `basex`: bijective base-X block codec (Base62 by default)
//! - `armor`: buffered armor/dearmor with `BEGIN ... SALTPACK ...` framing
//! - `stream`: push-based `ArmorStream` / `DearmorStream` with identical output

pub mod armor;
pub mod basex;
pub mod stream;

pub use armor::{
    armor, dearmor, ArmorHeaderInfo, ArmorOptions, DearmorOutput, DEFAULT_BLOCK_SIZE,
};
pub use basex::{
    decode_block, efficient_chars_sizes, encode_block, Alphabet, BASE62, BASE64, BASE85,
};
pub use stream::{ArmorStream, DearmorStream};
