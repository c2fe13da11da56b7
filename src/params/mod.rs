//! Parameter literals for the shared FV/CKKS ring and the half-bootstrap.
//!
//! The modulus chain is laid out bottom-up as
//! `residual || diff-scale || sine evaluation || coeffs-to-slots`, so the FV
//! side consumes primes from the top while the half-bootstrap raises back to
//! the full chain and consumes them in the same order.

pub mod chain;
pub mod schedules;

use thiserror::Error;

use crate::cipher::xof::MAX_FIELD_BITS;
use crate::math::primes::{MAX_AUX_PRIME_BITS, MAX_CHAIN_PRIME_BITS};

pub use chain::ModulusChain;
pub use schedules::{ModulusSchedule, schedule_for};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("log_n must be in [2, 16], got {log_n}")]
    InvalidLogN { log_n: u32 },
    #[error("log_slots {log_slots} must be below log_n {log_n}")]
    InvalidLogSlots { log_slots: u32, log_n: u32 },
    #[error("plaintext modulus {t} does not support batching for degree {degree}")]
    PlaintextModulusNotBatching { t: u64, degree: usize },
    #[error("plaintext modulus {t} is wider than {max_bits} bits")]
    PlaintextModulusTooWide { t: u64, max_bits: u32 },
    #[error("prime size {bits} is outside [{min}, {max}] bits")]
    InvalidPrimeSize { bits: u32, min: u32, max: u32 },
    #[error("the residual chain needs at least two primes, got {count}")]
    ResidualTooShort { count: usize },
    #[error("ran out of NTT-friendly primes of {bits} bits")]
    PrimeSearchExhausted { bits: u32 },
    #[error("hamming weight {weight} exceeds ring degree {degree}")]
    HammingWeightTooLarge { weight: usize, degree: usize },
    #[error("noise standard deviation must be finite and non-negative, got {sigma}")]
    InvalidSigma { sigma: f64 },
    #[error("invalid half-bootstrap parameter: {message}")]
    InvalidHalfBoot { message: String },
    #[error("transform depth {depth} is not in [1, {max}]")]
    InvalidTransformDepth { depth: usize, max: usize },
    #[error("sine evaluation needs {required} levels but the chain provides {available}")]
    SineDepthMismatch { required: usize, available: usize },
    #[error("ring error while building the context: {0}")]
    Ring(#[from] crate::rings::RingError),
}

pub type ParameterResult<T> = Result<T, ParameterError>;

/// Target function approximated before the double-angle steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SineType {
    /// `sin(2πu)` directly; no double-angle steps.
    Sin,
    /// `cos(2π(u - 1/4) / 2^r)` followed by `y <- 2y^2 - 1`.
    Cos1,
    /// `(2π)^{-1/2^r} cos(2π(u - 1/4) / 2^r)` followed by scaled double angles.
    Cos2,
}

/// Knobs of the half-bootstrap circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfBootParameters {
    pub sine_type: SineType,
    /// Interpolation range `[-K, K]` of the Chebyshev approximation.
    pub sine_range: f64,
    pub sine_degree: usize,
    pub double_angle: usize,
    /// Degree of the odd arcsine correction, `0` to disable.
    pub arcsine_degree: usize,
    pub message_ratio: f64,
    pub sine_scale_bits: u32,
    pub cts_depth: usize,
    pub bsgs_ratio: f64,
}

impl HalfBootParameters {
    /// Levels consumed by the sine step (Chebyshev, double angles, arcsine).
    pub fn sine_depth(&self) -> usize {
        let chebyshev = ceil_log2(self.sine_degree) + 1;
        let arcsine = if self.arcsine_degree > 1 {
            ceil_log2(self.arcsine_degree) + 1
        } else {
            0
        };
        chebyshev + self.double_angle + arcsine
    }

    pub fn sine_scale(&self) -> f64 {
        2f64.powi(self.sine_scale_bits as i32)
    }
}

/// A complete parameter set, as code-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParametersLiteral {
    pub name: &'static str,
    pub log_n: u32,
    /// `log2` of the CKKS slot count used by the half-bootstrap.
    pub log_slots: u32,
    pub t: u64,
    /// `q_0`, then the residual primes left for computation after the half-boot.
    pub residual_bits: Vec<u32>,
    pub diff_scale_bits: u32,
    pub sine_bits: Vec<u32>,
    pub cts_bits: Vec<u32>,
    pub special_bits: u32,
    pub aux_bits: u32,
    pub sigma: f64,
    pub hamming_weight: usize,
    /// Factor count of the FV slots-to-coeffs transform.
    pub stc_depth: usize,
    pub half_boot: HalfBootParameters,
}

impl ParametersLiteral {
    pub fn degree(&self) -> usize {
        1 << self.log_n
    }

    pub fn slots(&self) -> usize {
        1 << self.log_slots
    }

    /// Bit sizes of the whole chain, bottom-up.
    pub fn chain_bits(&self) -> Vec<u32> {
        let mut bits = self.residual_bits.clone();
        bits.push(self.diff_scale_bits);
        bits.extend(&self.sine_bits);
        bits.extend(&self.cts_bits);
        bits
    }

    pub fn max_level(&self) -> usize {
        self.chain_bits().len() - 1
    }

    pub fn validate(&self) -> ParameterResult<()> {
        if !(2..=16).contains(&self.log_n) {
            return Err(ParameterError::InvalidLogN { log_n: self.log_n });
        }
        if self.log_slots >= self.log_n {
            return Err(ParameterError::InvalidLogSlots {
                log_slots: self.log_slots,
                log_n: self.log_n,
            });
        }
        let degree = self.degree();
        if crate::math::bit_len(self.t) > MAX_FIELD_BITS {
            return Err(ParameterError::PlaintextModulusTooWide {
                t: self.t,
                max_bits: MAX_FIELD_BITS,
            });
        }
        if !crate::math::is_ntt_friendly_prime(self.t, degree as u64) {
            return Err(ParameterError::PlaintextModulusNotBatching { t: self.t, degree });
        }
        if self.residual_bits.len() < 2 {
            return Err(ParameterError::ResidualTooShort {
                count: self.residual_bits.len(),
            });
        }
        let min_bits = self.log_n + 2;
        for bits in self.chain_bits() {
            check_prime_bits(bits, min_bits, MAX_CHAIN_PRIME_BITS)?;
        }
        check_prime_bits(self.special_bits, min_bits, MAX_AUX_PRIME_BITS)?;
        check_prime_bits(self.aux_bits, min_bits, MAX_AUX_PRIME_BITS)?;
        if self.hamming_weight > degree {
            return Err(ParameterError::HammingWeightTooLarge {
                weight: self.hamming_weight,
                degree,
            });
        }
        if !(self.sigma.is_finite() && self.sigma >= 0.0) {
            return Err(ParameterError::InvalidSigma { sigma: self.sigma });
        }
        let max_depth = (self.log_n - 1) as usize;
        if self.stc_depth == 0 || self.stc_depth > max_depth {
            return Err(ParameterError::InvalidTransformDepth {
                depth: self.stc_depth,
                max: max_depth,
            });
        }
        self.validate_half_boot()
    }

    fn validate_half_boot(&self) -> ParameterResult<()> {
        let hb = &self.half_boot;
        let invalid = |message: &str| ParameterError::InvalidHalfBoot {
            message: message.to_string(),
        };
        if hb.sine_degree < 2 {
            return Err(invalid("sine degree must be at least 2"));
        }
        if hb.sine_range < 1.0 {
            return Err(invalid("sine range K must be at least 1"));
        }
        if hb.sine_type == SineType::Sin && hb.double_angle != 0 {
            return Err(invalid("double-angle steps require a cosine target"));
        }
        if hb.arcsine_degree > 1 && hb.arcsine_degree % 2 == 0 {
            return Err(invalid("arcsine degree must be odd"));
        }
        if !(hb.message_ratio >= 1.0) {
            return Err(invalid("message ratio must be at least 1"));
        }
        if !(hb.bsgs_ratio > 0.0) {
            return Err(invalid("bsgs ratio must be positive"));
        }
        let max_depth = self.log_slots.max(1) as usize;
        if hb.cts_depth == 0 || hb.cts_depth > max_depth || hb.cts_depth != self.cts_bits.len() {
            return Err(ParameterError::InvalidTransformDepth {
                depth: hb.cts_depth,
                max: max_depth.min(self.cts_bits.len()),
            });
        }
        let required = hb.sine_depth();
        if required != self.sine_bits.len() {
            return Err(ParameterError::SineDepthMismatch {
                required,
                available: self.sine_bits.len(),
            });
        }
        Ok(())
    }
}

fn check_prime_bits(bits: u32, min: u32, max: u32) -> ParameterResult<()> {
    if bits < min || bits > max {
        return Err(ParameterError::InvalidPrimeSize { bits, min, max });
    }
    Ok(())
}

pub(crate) fn ceil_log2(value: usize) -> usize {
    if value <= 1 {
        0
    } else {
        (usize::BITS - (value - 1).leading_zeros()) as usize
    }
}

/// Plaintext modulus shared by both ciphers: `2^17 * 2045 + 1`.
pub const PLAINTEXT_MODULUS: u64 = 268_042_241;

fn toy_half_boot(cts_depth: usize) -> HalfBootParameters {
    HalfBootParameters {
        sine_type: SineType::Cos1,
        sine_range: 6.0,
        sine_degree: 30,
        double_angle: 2,
        arcsine_degree: 3,
        message_ratio: 256.0,
        sine_scale_bits: 45,
        cts_depth,
        bsgs_ratio: 2.0,
    }
}

/// Degree-32 ring with full slots. Small enough for homomorphic tests, with
/// the same chain layout as the production sets.
pub fn toy_full_slots() -> ParametersLiteral {
    ParametersLiteral {
        name: "toy-full",
        log_n: 5,
        log_slots: 4,
        t: PLAINTEXT_MODULUS,
        residual_bits: vec![55, 45],
        diff_scale_bits: 45,
        sine_bits: vec![45; 11],
        cts_bits: vec![45; 2],
        special_bits: 61,
        aux_bits: 61,
        sigma: 3.2,
        hamming_weight: 8,
        stc_depth: 2,
        half_boot: toy_half_boot(2),
    }
}

/// Degree-32 ring packing four CKKS slots; exercises SubSum and repacking.
pub fn toy_sparse_slots() -> ParametersLiteral {
    ParametersLiteral {
        name: "toy-sparse",
        log_slots: 2,
        cts_bits: vec![45; 1],
        half_boot: toy_half_boot(1),
        ..toy_full_slots()
    }
}

/// Degree-2^16 set with the layout of the 128-bit-security full-slot
/// configuration. Key generation at this size is slow and it is not used in
/// tests beyond validation.
pub fn production_full_slots() -> ParametersLiteral {
    ParametersLiteral {
        name: "prod-full",
        log_n: 16,
        log_slots: 15,
        t: PLAINTEXT_MODULUS,
        residual_bits: vec![55, 45, 45, 45],
        diff_scale_bits: 45,
        sine_bits: vec![45; 11],
        cts_bits: vec![45; 3],
        special_bits: 61,
        aux_bits: 61,
        sigma: 3.2,
        hamming_weight: 192,
        stc_depth: 3,
        half_boot: toy_half_boot(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_literals_validate() {
        for literal in [toy_full_slots(), toy_sparse_slots(), production_full_slots()] {
            literal.validate().unwrap();
        }
    }

    #[test]
    fn toy_chain_layout() {
        let literal = toy_full_slots();
        assert_eq!(literal.max_level(), 15);
        assert_eq!(literal.half_boot.sine_depth(), 11);
        assert_eq!(literal.chain_bits()[0], 55);
    }

    #[test]
    fn rejects_even_arcsine_degree() {
        let mut literal = toy_full_slots();
        literal.half_boot.arcsine_degree = 4;
        assert!(matches!(
            literal.validate(),
            Err(ParameterError::InvalidHalfBoot { .. })
        ));
    }

    #[test]
    fn rejects_sine_chain_of_wrong_length() {
        let mut literal = toy_full_slots();
        literal.sine_bits.pop();
        assert!(matches!(
            literal.validate(),
            Err(ParameterError::SineDepthMismatch {
                required: 11,
                available: 10
            })
        ));
    }

    #[test]
    fn rejects_non_batching_plaintext_modulus() {
        let literal = ParametersLiteral {
            t: 65_537 * 2 + 1,
            ..toy_full_slots()
        };
        assert!(matches!(
            literal.validate(),
            Err(ParameterError::PlaintextModulusNotBatching { .. })
        ));
    }

    #[test]
    fn rejects_plaintext_modulus_wider_than_the_xof() {
        let literal = ParametersLiteral {
            t: u64::MAX - 58,
            ..toy_full_slots()
        };
        assert!(matches!(
            literal.validate(),
            Err(ParameterError::PlaintextModulusTooWide { max_bits: 62, .. })
        ));
    }

    #[test]
    fn ceil_log2_small_values() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(30), 5);
        assert_eq!(ceil_log2(32), 5);
    }
}
