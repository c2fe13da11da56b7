use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::ToPrimitive;

use crate::context::Context;
use crate::math::{add_mod, center, mul_mod};
use crate::plaintext::{PlaintextMul, PlaintextRingT, PlaintextScaled};
use crate::rings::{RnsPoly, div_round};

use super::{EncodingError, EncodingResult, slot_exponents};

/// FV batch encoder: `N` slots over `Z_t` arranged as two rows of `N/2`.
///
/// Values are laid out row-major: indices `[0, N/2)` fill row 0 and
/// `[N/2, N)` fill row 1.
#[derive(Debug, Clone)]
pub struct BatchEncoder {
    ctx: Arc<Context>,
    /// NTT position of every slot in row-major order.
    slot_to_ntt: Vec<usize>,
}

impl BatchEncoder {
    pub fn new(ctx: Arc<Context>) -> Self {
        let degree = ctx.degree();
        let exponents = slot_exponents(degree);
        let mut slot_to_ntt = Vec::with_capacity(degree);
        slot_to_ntt.extend(exponents.iter().map(|&e| (e - 1) / 2));
        slot_to_ntt.extend(exponents.iter().map(|&e| (2 * degree - e - 1) / 2));
        Self { ctx, slot_to_ntt }
    }

    pub fn slot_count(&self) -> usize {
        self.ctx.degree()
    }

    pub fn row_size(&self) -> usize {
        self.ctx.half_degree()
    }

    /// Encodes up to `N` slot values; missing slots are zero.
    pub fn encode(&self, values: &[u64]) -> EncodingResult<PlaintextRingT> {
        let degree = self.ctx.degree();
        let t = self.ctx.plaintext_modulus();
        if values.len() > degree {
            return Err(EncodingError::InputTooLong {
                got: values.len(),
                max: degree,
            });
        }
        let mut evaluations = vec![0u64; degree];
        for (&value, &pos) in values.iter().zip(&self.slot_to_ntt) {
            if value >= t {
                return Err(EncodingError::ValueOutOfRange { value, modulus: t });
            }
            evaluations[pos] = value;
        }
        self.ctx.plaintext_table().inverse(&mut evaluations);
        Ok(PlaintextRingT { coeffs: evaluations })
    }

    /// Constant polynomial: `value` in every slot.
    pub fn encode_constant(&self, value: u64) -> PlaintextRingT {
        let mut coeffs = vec![0u64; self.ctx.degree()];
        coeffs[0] = value % self.ctx.plaintext_modulus();
        PlaintextRingT { coeffs }
    }

    pub fn decode(&self, plaintext: &PlaintextRingT) -> Vec<u64> {
        let mut evaluations = plaintext.coeffs.clone();
        self.ctx.plaintext_table().forward(&mut evaluations);
        self.slot_to_ntt.iter().map(|&pos| evaluations[pos]).collect()
    }

    // ─── Conversions between plaintext forms ─────────────────────────────────

    /// `round(Q_l * m / t)` over `Q_l`, NTT form.
    ///
    /// Computed as `floor(Q_l / t) * m + round((Q_l mod t) * m / t)`, so that
    /// `t * scaled - Q_l * m` stays below `t / 2`.
    pub fn scale_up(&self, plaintext: &PlaintextRingT, level: usize) -> EncodingResult<PlaintextScaled> {
        self.check_level(level)?;
        let basis = self.ctx.q_basis(level).clone();
        let delta = self.ctx.fv_delta(level);
        let t = self.ctx.plaintext_modulus();
        let remainder = u128::from(self.ctx.fv_remainder(level));
        let carries: Vec<u64> = plaintext
            .coeffs
            .iter()
            .map(|&m| ((remainder * u128::from(m) + u128::from(t / 2)) / u128::from(t)) as u64)
            .collect();
        let channels = basis
            .moduli()
            .iter()
            .zip(delta)
            .map(|(&q, &d)| {
                plaintext
                    .coeffs
                    .iter()
                    .zip(&carries)
                    .map(|(&m, &c)| add_mod(mul_mod(m % q, d, q), c % q, q))
                    .collect()
            })
            .collect();
        let mut poly = RnsPoly::from_channels(channels, basis, false)?;
        poly.to_ntt_domain();
        Ok(PlaintextScaled { poly })
    }

    /// Inverse of `scale_up`: `round(t * x / Q_l) mod t`.
    pub fn scale_down(&self, plaintext: &PlaintextScaled) -> PlaintextRingT {
        PlaintextRingT {
            coeffs: round_to_plaintext(&plaintext.poly, self.ctx.plaintext_modulus()),
        }
    }

    /// `m` with centered coefficients over `Q_l`, NTT form.
    pub fn to_mul_domain(&self, plaintext: &PlaintextRingT, level: usize) -> EncodingResult<PlaintextMul> {
        self.check_level(level)?;
        let t = self.ctx.plaintext_modulus();
        let centered: Vec<i64> = plaintext.coeffs.iter().map(|&m| center(m, t)).collect();
        let mut poly = RnsPoly::from_signed(&centered, self.ctx.q_basis(level).clone());
        poly.to_ntt_domain();
        Ok(PlaintextMul { poly })
    }

    pub fn from_mul_domain(&self, plaintext: &PlaintextMul) -> PlaintextRingT {
        let t = self.ctx.plaintext_modulus();
        let mut poly = plaintext.poly.clone();
        poly.to_coeff_domain();
        let q0 = poly.basis().moduli()[0];
        let coeffs = poly
            .channel(0)
            .iter()
            .map(|&r| center(r, q0).rem_euclid(t as i64) as u64)
            .collect();
        PlaintextRingT { coeffs }
    }

    fn check_level(&self, level: usize) -> EncodingResult<()> {
        let max = self.ctx.max_level();
        if level > max {
            return Err(EncodingError::LevelOutOfRange { level, max });
        }
        Ok(())
    }
}

/// `round(t * x / Q) mod t` for every centered coefficient `x` of `poly`.
pub(crate) fn round_to_plaintext(poly: &RnsPoly, t: u64) -> Vec<u64> {
    let modulus: &BigUint = poly.basis().modulus();
    let t_big = BigInt::from(t);
    poly.to_bigints_centered()
        .iter()
        .map(|x| {
            let rounded = div_round(&(x * &t_big), modulus);
            rounded.mod_floor(&t_big).to_u64().unwrap_or_default()
        })
        .collect()
}
