//! Deterministic expansion of `(nonce, counter)` into round constants.
//!
//! SHA-256 in counter mode: block `b` is
//! `SHA-256(XOF_DOMAIN || nonce || counter_le64 || b_le64)`. Each digest is
//! read as eight little-endian 32-bit words (or four 64-bit words when `t`
//! is wider than 32 bits), masked to `bitlen(t)` bits and rejection-sampled
//! below `t`.

use sha2::{Digest, Sha256};

use crate::math::bit_len;

use super::params::CipherParams;

pub const XOF_DOMAIN: &[u8] = b"hhe-transcipher/round-constants";

/// Widest modulus [`Xof::next_field`] samples from.
pub const MAX_FIELD_BITS: u32 = 62;

pub struct Xof {
    prefix: Sha256,
    block: u64,
    buffer: [u8; 32],
    position: usize,
}

impl Xof {
    pub fn new(nonce: &[u8], counter: u64) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(XOF_DOMAIN);
        prefix.update(nonce);
        prefix.update(counter.to_le_bytes());
        Self {
            prefix,
            block: 0,
            buffer: [0; 32],
            position: 32,
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.position == self.buffer.len() {
            let mut hasher = self.prefix.clone();
            hasher.update(self.block.to_le_bytes());
            self.buffer.copy_from_slice(&hasher.finalize());
            self.block += 1;
            self.position = 0;
        }
        let word = &self.buffer[self.position..self.position + 4];
        self.position += 4;
        u32::from_le_bytes([word[0], word[1], word[2], word[3]])
    }

    /// Two consecutive 32-bit words, low word first.
    pub fn next_u64(&mut self) -> u64 {
        let low = u64::from(self.next_u32());
        let high = u64::from(self.next_u32());
        low | (high << 32)
    }

    /// Uniform element of `Z_modulus` for `2 <= modulus < 2^MAX_FIELD_BITS`.
    pub fn next_field(&mut self, modulus: u64) -> u64 {
        let bits = bit_len(modulus);
        debug_assert!((2..=MAX_FIELD_BITS).contains(&bits));
        let mask = u64::MAX >> (u64::BITS - bits);
        loop {
            let word = if bits > 32 { self.next_u64() } else { u64::from(self.next_u32()) };
            let candidate = word & mask;
            if candidate < modulus {
                return candidate;
            }
        }
    }
}

/// Round constants of one block, round-major and wire-minor.
pub fn round_constants(params: &CipherParams, nonce: &[u8], counter: u64, modulus: u64) -> Vec<u64> {
    let mut xof = Xof::new(nonce, counter);
    (0..params.round_constant_count())
        .map(|_| xof.next_field(modulus))
        .collect()
}
