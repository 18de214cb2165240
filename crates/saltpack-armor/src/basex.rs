//! Bijective base-X block codec
//!
//! A block of bytes is read as one unsigned big-endian integer and written out as a
//! fixed number of base-N digits, most significant first. The digit count depends only
//! on the alphabet size and the block length, so a short final block still decodes
//! unambiguously:
//!
//! ```text
//! chars = ceil(8 * bytes / log2(N))
//! bytes = floor(log2(N) / 8 * chars)
//! extra = floor(log2(N) * chars) - 8 * bytes
//! ```
//!
//! With Base62 a full 32-byte block takes 43 characters.

use saltpack_core::{SaltpackError, SaltpackResult};

/// A base-X alphabet. Digit value is the character's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alphabet {
    chars: &'static str,
}

/// `0-9A-Za-z`, the alphabet saltpack armor uses
pub const BASE62: Alphabet = Alphabet {
    chars: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",
};

pub const BASE64: Alphabet = Alphabet {
    chars: "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
};

/// Contains `.`, so it can only be used for raw armor
pub const BASE85: Alphabet = Alphabet {
    chars: "!\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstu",
};

impl Alphabet {
    pub fn as_str(&self) -> &'static str {
        self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn contains(&self, c: u8) -> bool {
        self.chars.as_bytes().contains(&c)
    }

    fn digit(&self, value: u32) -> char {
        char::from(self.chars.as_bytes()[value as usize])
    }

    fn value_of(&self, c: u8) -> Option<u32> {
        self.chars
            .as_bytes()
            .iter()
            .position(|&a| a == c)
            .map(|p| p as u32)
    }

    /// Characters needed for a block of `block_size` bytes
    pub fn char_block_size(&self, block_size: usize) -> usize {
        character_block_size(self.len(), block_size)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        BASE62
    }
}

/// Minimum number of characters needed to encode `bytes_size` bytes.
pub fn character_block_size(alphabet_size: usize, bytes_size: usize) -> usize {
    (8.0 * bytes_size as f64 / (alphabet_size as f64).log2()).ceil() as usize
}

/// Maximum number of bytes that `chars_size` characters can carry.
pub fn max_bytes_size(alphabet_size: usize, chars_size: usize) -> usize {
    ((alphabet_size as f64).log2() / 8.0 * chars_size as f64).floor() as usize
}

/// Bits left over when `chars_size` characters carry `bytes_size` bytes.
pub fn extra_bits(alphabet_size: usize, chars_size: usize, bytes_size: usize) -> usize {
    let total_bits = ((alphabet_size as f64).log2() * chars_size as f64).floor() as usize;
    total_bits.saturating_sub(8 * bytes_size)
}

/// Block sizes up to `chars_size_upper_bound` characters where efficiency improves.
///
/// Returns `(chars, bytes, bytes / chars)` triples with strictly increasing efficiency.
pub fn efficient_chars_sizes(
    alphabet_size: usize,
    chars_size_upper_bound: usize,
) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::new();
    let mut max_efficiency = 0.0;

    for chars_size in 1..chars_size_upper_bound {
        let bytes_size = max_bytes_size(alphabet_size, chars_size);
        let efficiency = bytes_size as f64 / chars_size as f64;

        if efficiency > max_efficiency {
            out.push((chars_size, bytes_size, efficiency));
            max_efficiency = efficiency;
        }
    }

    out
}

/// Encode one block of bytes.
pub fn encode_block(block: &[u8], alphabet: Alphabet, shift: bool) -> String {
    let n = alphabet.len();
    let chars_size = character_block_size(n, block.len());

    // One spare leading byte for the shifted value
    let mut num = Vec::with_capacity(block.len() + 1);
    num.push(0u8);
    num.extend_from_slice(block);

    if shift {
        shift_left(&mut num, extra_bits(n, chars_size, block.len()));
    }

    let mut places = vec![0u32; chars_size];
    for place in places.iter_mut().rev() {
        *place = div_rem(&mut num, n as u32);
    }

    places.into_iter().map(|p| alphabet.digit(p)).collect()
}

/// Decode one block of characters.
///
/// The block length must be one that [`encode_block`] can produce and the value must
/// fit the block's byte size. The output always has exactly that many bytes.
pub fn decode_block(block: &str, alphabet: Alphabet, shift: bool) -> SaltpackResult<Vec<u8>> {
    decode_block_bytes(block.as_bytes(), alphabet, shift)
}

pub(crate) fn decode_block_bytes(
    block: &[u8],
    alphabet: Alphabet,
    shift: bool,
) -> SaltpackResult<Vec<u8>> {
    let n = alphabet.len();
    let bytes_size = max_bytes_size(n, block.len());
    let expected = character_block_size(n, bytes_size);

    if block.len() != expected {
        return Err(SaltpackError::Format(format!(
            "illegal block size {}, expected {expected}",
            block.len()
        )));
    }

    let mut num = vec![0u8; bytes_size + 1];
    for &c in block {
        let value = alphabet.value_of(c).ok_or_else(|| {
            SaltpackError::Format(format!(
                "character {:?} is not in the armor alphabet",
                char::from(c)
            ))
        })?;
        if mul_add(&mut num, n as u32, value) != 0 {
            return Err(SaltpackError::format("armor block value out of range"));
        }
    }

    if shift {
        shift_right(&mut num, extra_bits(n, block.len(), bytes_size));
    }

    if num[0] != 0 {
        return Err(SaltpackError::format("armor block value out of range"));
    }
    num.remove(0);
    Ok(num)
}

/// `num = num / d`, returning the remainder
fn div_rem(num: &mut [u8], d: u32) -> u32 {
    let mut rem = 0u32;
    for byte in num.iter_mut() {
        let v = (rem << 8) | u32::from(*byte);
        *byte = (v / d) as u8;
        rem = v % d;
    }
    rem
}

/// `num = num * m + a`, returning the overflow
fn mul_add(num: &mut [u8], m: u32, a: u32) -> u32 {
    let mut carry = a;
    for byte in num.iter_mut().rev() {
        let v = u32::from(*byte) * m + carry;
        *byte = (v & 0xff) as u8;
        carry = v >> 8;
    }
    carry
}

fn shift_left(num: &mut [u8], bits: usize) {
    for _ in 0..bits {
        let mut carry = 0u8;
        for byte in num.iter_mut().rev() {
            let next = *byte >> 7;
            *byte = (*byte << 1) | carry;
            carry = next;
        }
    }
}

fn shift_right(num: &mut [u8], bits: usize) {
    for _ in 0..bits {
        let mut carry = 0u8;
        for byte in num.iter_mut() {
            let next = *byte & 1;
            *byte = (*byte >> 1) | (carry << 7);
            carry = next;
        }
    }
}
