//! CKKS canonical-embedding encoder built on `rustfft`.
//!
//! A real polynomial `m` is decoded as `m(zeta^(5^j))` for `j < N/2`, where
//! `zeta = e^{iπ/N}`. Twisting the coefficients by `zeta^i` turns all `N` odd
//! evaluations into one length-`N` inverse FFT.

use std::sync::Arc;

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{FromPrimitive, ToPrimitive};
use rustfft::{Fft, FftPlanner};

use crate::context::Context;
use crate::plaintext::CkksPlaintext;
use crate::rings::RnsPoly;

use super::{EncodingError, EncodingResult, slot_exponents};

pub struct CkksEncoder {
    ctx: Arc<Context>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    /// `zeta^i` for `i < N`.
    twist: Vec<Complex64>,
    /// FFT index of every slot.
    slot_index: Vec<usize>,
    /// FFT index of every conjugate slot.
    conj_index: Vec<usize>,
}

impl CkksEncoder {
    pub fn new(ctx: Arc<Context>) -> Self {
        let degree = ctx.degree();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(degree);
        let inverse = planner.plan_fft_inverse(degree);
        let twist = (0..degree)
            .map(|i| Complex64::from_polar(1.0, std::f64::consts::PI * i as f64 / degree as f64))
            .collect();
        let exponents = slot_exponents(degree);
        let slot_index = exponents.iter().map(|&e| (e - 1) / 2).collect();
        let conj_index = exponents.iter().map(|&e| (2 * degree - e - 1) / 2).collect();
        Self {
            ctx,
            forward,
            inverse,
            twist,
            slot_index,
            conj_index,
        }
    }

    pub fn max_slots(&self) -> usize {
        self.ctx.half_degree()
    }

    /// Encodes `values` at `scale` over `Q_level`.
    ///
    /// A slot count below `N/2` is packed sparsely: the vector is repeated to
    /// fill all slots, which yields a polynomial in `X^(N/(2·slots))`.
    pub fn encode(&self, values: &[Complex64], scale: f64, level: usize) -> EncodingResult<CkksPlaintext> {
        let coeffs = self.embed_inverse(values, scale)?;
        let max = self.ctx.max_level();
        if level > max {
            return Err(EncodingError::LevelOutOfRange { level, max });
        }
        let mut poly = integer_poly(&coeffs, &self.ctx, level)?;
        poly.to_ntt_domain();
        Ok(CkksPlaintext { poly, scale })
    }

    pub fn encode_real(&self, values: &[f64], scale: f64, level: usize) -> EncodingResult<CkksPlaintext> {
        let complex: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode(&complex, scale, level)
    }

    /// Decodes the first `slots` slots.
    pub fn decode(&self, plaintext: &CkksPlaintext, slots: usize) -> EncodingResult<Vec<Complex64>> {
        self.check_slots(slots)?;
        let coeffs: Vec<f64> = plaintext
            .poly
            .to_bigints_centered()
            .iter()
            .map(|c| c.to_f64().unwrap_or(f64::NAN) / plaintext.scale)
            .collect();
        let evaluations = self.embed(&coeffs);
        Ok(self.slot_index[..slots].iter().map(|&k| evaluations[k]).collect())
    }

    pub fn decode_real(&self, plaintext: &CkksPlaintext, slots: usize) -> EncodingResult<Vec<f64>> {
        Ok(self.decode(plaintext, slots)?.iter().map(|z| z.re).collect())
    }

    /// Evaluations of a real coefficient vector at every `zeta^(2k+1)`.
    pub fn embed(&self, coeffs: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&c, &w)| w * c)
            .collect();
        self.inverse.process(&mut buffer);
        buffer
    }

    /// Real coefficients whose slots are `values * scale`.
    pub fn embed_inverse(&self, values: &[Complex64], scale: f64) -> EncodingResult<Vec<f64>> {
        self.check_slots(values.len())?;
        let degree = self.ctx.degree();
        let period = values.len();
        let mut buffer = vec![Complex64::new(0.0, 0.0); degree];
        for j in 0..self.max_slots() {
            let z = values[j % period] * scale;
            buffer[self.slot_index[j]] = z;
            buffer[self.conj_index[j]] = z.conj();
        }
        self.forward.process(&mut buffer);
        Ok(buffer
            .iter()
            .zip(&self.twist)
            .map(|(&y, &w)| (y * w.conj()).re / degree as f64)
            .collect())
    }

    fn check_slots(&self, count: usize) -> EncodingResult<()> {
        let max = self.max_slots();
        if count == 0 || !count.is_power_of_two() || count > max {
            return Err(EncodingError::InvalidSlotCount { count, max });
        }
        Ok(())
    }
}

/// Rounds real coefficients to an integer polynomial over `Q_level`.
pub(crate) fn integer_poly(coeffs: &[f64], ctx: &Context, level: usize) -> EncodingResult<RnsPoly> {
    const I64_SAFE: f64 = (1u64 << 62) as f64;
    let basis = ctx.q_basis(level).clone();
    if coeffs.iter().all(|c| c.abs() < I64_SAFE) {
        let rounded: Vec<i64> = coeffs.iter().map(|c| c.round() as i64).collect();
        return Ok(RnsPoly::from_signed(&rounded, basis));
    }
    let big = coeffs
        .iter()
        .map(|&c| BigInt::from_f64(c.round()).ok_or(EncodingError::NonFiniteCoefficient { value: c }))
        .collect::<EncodingResult<Vec<_>>>()?;
    Ok(RnsPoly::from_bigints(&big, basis)?)
}
