//! Sparse ternary secret key `s(X)` with a fixed Hamming weight.

use rand::Rng;

use crate::context::Context;
use crate::math::ternary_integers;
use crate::rings::RnsPoly;

use super::{KeyError, KeyResult};

/// Secret key, kept both as signed coefficients and in NTT form over `Q_L ∪ P`.
#[derive(Debug, Clone)]
pub struct SecretKey {
    coeffs: Vec<i64>,
    ntt_qp: RnsPoly,
}

impl SecretKey {
    /// Samples a ternary key with exactly `hamming_weight` non-zero coefficients.
    pub fn generate<R: Rng + ?Sized>(
        ctx: &Context,
        hamming_weight: usize,
        rng: &mut R,
    ) -> KeyResult<Self> {
        let degree = ctx.degree();
        if hamming_weight > degree {
            return Err(KeyError::InvalidHammingWeight {
                weight: hamming_weight,
                degree,
            });
        }
        Ok(Self::from_coeffs(ctx, ternary_integers(degree, hamming_weight, rng)))
    }

    pub fn from_coeffs(ctx: &Context, coeffs: Vec<i64>) -> Self {
        let mut ntt_qp = RnsPoly::from_signed(&coeffs, ctx.qp_basis(ctx.max_level()).clone());
        ntt_qp.to_ntt_domain();
        Self { coeffs, ntt_qp }
    }

    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }

    pub fn hamming_weight(&self) -> usize {
        self.coeffs.iter().filter(|&&c| c != 0).count()
    }

    /// `s` in NTT form over `Q_l`.
    pub fn at_level(&self, ctx: &Context, level: usize) -> RnsPoly {
        let basis = ctx.q_basis(level).clone();
        let channels = self.ntt_qp.channels()[..=level].to_vec();
        // Channels are copied from a reduced polynomial over a superset basis.
        RnsPoly::from_channels(channels, basis, true)
            .unwrap_or_else(|err| unreachable!("secret key restriction: {err}"))
    }

    /// `s` in NTT form over `Q_L ∪ P`.
    pub fn ntt_qp(&self) -> &RnsPoly {
        &self.ntt_qp
    }
}
