use rand::Rng;

use crate::context::Context;
use crate::math::{add_mod, gaussian_integers, mul_mod};
use crate::rings::RnsPoly;

use super::{KeyResult, SecretKey};

/// Hybrid key-switching key from `s'` to `s`.
///
/// One gadget digit per chain prime. Digit `i` is an encryption over
/// `Q_L ∪ P` of `P * s'` placed in channel `i` only:
/// `b_i = -a_i s + e_i + P s' [i]`, stored in NTT form.
#[derive(Debug, Clone)]
pub struct SwitchingKey {
    digits: Vec<[RnsPoly; 2]>,
}

impl SwitchingKey {
    pub fn generate<R: Rng + ?Sized>(
        ctx: &Context,
        secret: &SecretKey,
        from: &RnsPoly,
        sigma: f64,
        rng: &mut R,
    ) -> KeyResult<Self> {
        let max_level = ctx.max_level();
        let basis = ctx.qp_basis(max_level).clone();
        let p = ctx.special_prime();
        let mut digits = Vec::with_capacity(max_level + 1);
        for i in 0..=max_level {
            let a = RnsPoly::sample_uniform(basis.clone(), true, rng);
            let mut b = RnsPoly::from_signed(&gaussian_integers(ctx.degree(), sigma, rng), basis.clone());
            b.to_ntt_domain();
            let mut a_s = a.clone();
            a_s.mul_assign_ntt(secret.ntt_qp())?;
            b.sub_assign(&a_s)?;

            let q = basis.moduli()[i];
            let p_mod_q = p % q;
            let src = from.channel(i).to_vec();
            for (dst, &s) in b.channel_mut(i).iter_mut().zip(&src) {
                *dst = add_mod(*dst, mul_mod(p_mod_q, s, q), q);
            }
            digits.push([b, a]);
        }
        Ok(Self { digits })
    }

    pub fn digit_count(&self) -> usize {
        self.digits.len()
    }

    /// `(b_i, a_i)` over `Q_L ∪ P`.
    pub fn digit(&self, index: usize) -> &[RnsPoly; 2] {
        &self.digits[index]
    }
}
