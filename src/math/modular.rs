//! Word-sized modular arithmetic shared by the ring, encoder and cipher layers.
//!
//! Every modulus used by the crate is below `2^62`, so sums of two reduced
//! operands never overflow a `u64` and products are formed in `u128`.

#[inline]
pub fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    let s = a + b;
    if s >= q { s - q } else { s }
}

#[inline]
pub fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    if a >= b { a - b } else { a + q - b }
}

#[inline]
pub fn neg_mod(a: u64, q: u64) -> u64 {
    if a == 0 { 0 } else { q - a }
}

/// `(a * b) mod q`; the operands need not be reduced.
#[inline]
pub fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

/// `base^exponent mod q` by square-and-multiply.
pub fn pow_mod(mut base: u64, mut exponent: u64, q: u64) -> u64 {
    if q == 1 {
        return 0;
    }
    let mut acc = 1u64;
    base %= q;
    while exponent > 0 {
        if exponent & 1 == 1 {
            acc = mul_mod(acc, base, q);
        }
        base = mul_mod(base, base, q);
        exponent >>= 1;
    }
    acc
}

/// Multiplicative inverse of `value` modulo `q`.
///
/// # Panics
///
/// Panics if `value` and `q` are not coprime. All callers pass a prime modulus
/// and a value that is non-zero modulo it.
pub fn inv_mod(value: u64, q: u64) -> u64 {
    let (mut old_r, mut r) = (value as i128 % q as i128, q as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
    }
    assert_eq!(old_r, 1, "inv_mod: {value} is not invertible modulo {q}");
    old_s.rem_euclid(q as i128) as u64
}

/// Maps a residue in `[0, q)` to its representative in `(-q/2, q/2]`.
#[inline]
pub fn center(r: u64, q: u64) -> i64 {
    if r > q / 2 {
        r as i64 - q as i64
    } else {
        r as i64
    }
}

/// Reduces a signed integer into `[0, q)`.
#[inline]
pub fn reduce_signed(x: i64, q: u64) -> u64 {
    (x as i128).rem_euclid(q as i128) as u64
}

/// Reverses the lowest `bit_count` bits of `value`.
#[inline]
pub fn reverse_bits(value: usize, bit_count: u32) -> usize {
    if bit_count == 0 {
        return 0;
    }
    value.reverse_bits() >> (usize::BITS - bit_count)
}

/// Bit length of a non-negative word: `0` for zero.
#[inline]
pub fn bit_len(x: u64) -> u32 {
    u64::BITS - x.leading_zeros()
}
