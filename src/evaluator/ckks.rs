//! CKKS-specific evaluation: scale bookkeeping, constants, monomials and
//! slot rotations.

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::ciphertext::Ciphertext;
use crate::math::add_mod;
use crate::plaintext::CkksPlaintext;
use crate::rings::RnsPoly;

use super::{EvalError, EvalResult, Evaluator};

impl Evaluator {
    /// Divides by the last prime and the scale by that prime.
    pub fn rescale(&self, ct: &mut Ciphertext) -> EvalResult<()> {
        let level = ct.level();
        if level == 0 {
            return Err(EvalError::LevelExhausted {
                requested: 1,
                level,
            });
        }
        let prime = self.ctx.prime(level) as f64;
        self.mod_switch(ct)?;
        ct.set_scale(ct.scale() / prime);
        Ok(())
    }

    /// Tensor product over `Q_l`; scales multiply.
    pub fn mul_ckks(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<Ciphertext> {
        self.check_same_level(a, b)?;
        let basis = self.ctx.q_basis(a.level());
        let ntt = |ct: &Ciphertext| -> Vec<RnsPoly> {
            ct.parts()
                .iter()
                .map(|p| {
                    let mut p = p.clone();
                    p.to_ntt_domain();
                    p
                })
                .collect()
        };
        let (lhs, rhs) = (ntt(a), ntt(b));
        let mut tensor = vec![RnsPoly::zero(basis.clone(), true); lhs.len() + rhs.len() - 1];
        for (i, x) in lhs.iter().enumerate() {
            for (j, y) in rhs.iter().enumerate() {
                tensor[i + j].mul_add_assign_ntt(x, y)?;
            }
        }
        Ok(Ciphertext::new(tensor, a.scale() * b.scale())?)
    }

    /// `mul_ckks` followed by `relinearize`, without rescaling.
    pub fn mul_relin_ckks(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<Ciphertext> {
        let mut out = self.mul_ckks(a, b)?;
        self.relinearize(&mut out)?;
        Ok(out)
    }

    pub fn mul_plain_ckks(&self, ct: &Ciphertext, plaintext: &CkksPlaintext) -> EvalResult<Ciphertext> {
        if ct.level() != plaintext.level() {
            return Err(EvalError::LevelMismatch {
                left: ct.level(),
                right: plaintext.level(),
            });
        }
        let mut out = ct.clone();
        self.transform_to_ntt(&mut out);
        for part in out.parts_mut() {
            part.mul_assign_ntt(&plaintext.poly)?;
        }
        out.set_scale(ct.scale() * plaintext.scale);
        Ok(out)
    }

    /// Adds `value` to every slot, encoded at the ciphertext scale.
    pub fn add_const(&self, ct: &mut Ciphertext, value: f64) -> EvalResult<()> {
        let scaled = BigInt::from_f64((value * ct.scale()).round())
            .ok_or(EvalError::InvalidConstant { value })?;
        self.transform_to_ntt(ct);
        let c0 = &mut ct.parts_mut()[0];
        let residues = c0.basis().decompose(&scaled);
        let moduli = c0.basis().moduli().to_vec();
        // A constant polynomial evaluates to itself at every NTT point.
        for (ch, (&r, &q)) in residues.iter().zip(&moduli).enumerate() {
            for a in c0.channel_mut(ch) {
                *a = add_mod(*a, r, q);
            }
        }
        Ok(())
    }

    /// Exact multiplication by an integer; the scale is unchanged.
    pub fn mul_integer(&self, ct: &mut Ciphertext, value: i64) {
        let value = BigInt::from(value);
        for part in ct.parts_mut() {
            part.mul_bigint_assign(&value);
        }
    }

    /// Multiplies by `round(value * plaintext_scale)`; the scale grows by
    /// `plaintext_scale`.
    pub fn mul_const(&self, ct: &mut Ciphertext, value: f64, plaintext_scale: f64) -> EvalResult<()> {
        let scaled = BigInt::from_f64((value * plaintext_scale).round())
            .ok_or(EvalError::InvalidConstant { value })?;
        for part in ct.parts_mut() {
            part.mul_bigint_assign(&scaled);
        }
        ct.set_scale(ct.scale() * plaintext_scale);
        Ok(())
    }

    /// Multiplies every slot by `i`, exactly, through `X^(N/2)`.
    pub fn mul_by_i(&self, ct: &mut Ciphertext) {
        let half = self.ctx.half_degree();
        for part in ct.parts_mut() {
            part.mul_monomial_assign(half);
        }
    }

    /// Divides every slot by `i` through `X^(3N/2) = -X^(N/2)`.
    pub fn div_by_i(&self, ct: &mut Ciphertext) {
        let power = 3 * self.ctx.half_degree();
        for part in ct.parts_mut() {
            part.mul_monomial_assign(power);
        }
    }

    /// Rotates the slots left by `steps`.
    pub fn rotate(&self, ct: &Ciphertext, steps: isize) -> EvalResult<Ciphertext> {
        self.apply_galois(ct, self.ctx.galois_element(steps))
    }

    /// Complex conjugation of every slot.
    pub fn conjugate(&self, ct: &Ciphertext) -> EvalResult<Ciphertext> {
        self.apply_galois(ct, self.ctx.galois_element_conjugate())
    }
}
