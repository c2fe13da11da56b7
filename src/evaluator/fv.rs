//! FV-specific evaluation: plaintext products, the scale-invariant tensor and
//! slot rotations.

use num_bigint::BigInt;

use crate::ciphertext::Ciphertext;
use crate::plaintext::{PlaintextMul, PlaintextScaled};
use crate::rings::{RnsPoly, div_round};

use super::{EvalError, EvalResult, Evaluator};

/// FV ciphertexts carry no scale; this is the value stored in `Ciphertext::scale`.
pub const FV_SCALE: f64 = 1.0;

impl Evaluator {
    /// Noiseless encryption `(Δm, 0)`.
    pub fn trivial_fv(&self, plaintext: &PlaintextScaled) -> Ciphertext {
        let c0 = plaintext.poly.clone();
        let c1 = RnsPoly::zero(c0.basis().clone(), c0.is_ntt_domain());
        Ciphertext::new(vec![c0, c1], FV_SCALE)
            .unwrap_or_else(|err| unreachable!("trivial ciphertext parts share a basis: {err}"))
    }

    pub fn add_plain(&self, ct: &Ciphertext, plaintext: &PlaintextScaled) -> EvalResult<Ciphertext> {
        let mut out = ct.clone();
        self.add_plain_assign(&mut out, plaintext)?;
        Ok(out)
    }

    pub fn add_plain_assign(&self, ct: &mut Ciphertext, plaintext: &PlaintextScaled) -> EvalResult<()> {
        self.check_plain_level(ct, plaintext.level())?;
        self.transform_to_ntt(ct);
        ct.parts_mut()[0].add_assign(&plaintext.poly)?;
        Ok(())
    }

    pub fn sub_plain_assign(&self, ct: &mut Ciphertext, plaintext: &PlaintextScaled) -> EvalResult<()> {
        self.check_plain_level(ct, plaintext.level())?;
        self.transform_to_ntt(ct);
        ct.parts_mut()[0].sub_assign(&plaintext.poly)?;
        Ok(())
    }

    /// Slot-wise product with an unscaled plaintext.
    pub fn mul_plain(&self, ct: &Ciphertext, plaintext: &PlaintextMul) -> EvalResult<Ciphertext> {
        let mut out = ct.clone();
        self.mul_plain_assign(&mut out, plaintext)?;
        Ok(out)
    }

    pub fn mul_plain_assign(&self, ct: &mut Ciphertext, plaintext: &PlaintextMul) -> EvalResult<()> {
        self.check_plain_level(ct, plaintext.level())?;
        self.transform_to_ntt(ct);
        for part in ct.parts_mut() {
            part.mul_assign_ntt(&plaintext.poly)?;
        }
        Ok(())
    }

    /// FV product: the tensor is computed exactly over `Q_l ∪ B`, then
    /// scaled by `t / Q_l` with rounding. Degrees add.
    pub fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<Ciphertext> {
        self.check_same_level(a, b)?;
        let level = a.level();
        let extended = self.ctx.qb_basis(level);
        let target = self.ctx.q_basis(level);

        let lift = |ct: &Ciphertext| -> EvalResult<Vec<RnsPoly>> {
            ct.parts()
                .iter()
                .map(|part| {
                    let mut part = part.clone();
                    part.to_ntt_domain();
                    Ok(part.extend_exact(extended.clone())?)
                })
                .collect()
        };
        let lhs = lift(a)?;
        let rhs = lift(b)?;

        let mut tensor = vec![RnsPoly::zero(extended.clone(), true); lhs.len() + rhs.len() - 1];
        for (i, x) in lhs.iter().enumerate() {
            for (j, y) in rhs.iter().enumerate() {
                tensor[i + j].mul_add_assign_ntt(x, y)?;
            }
        }

        let t = BigInt::from(self.ctx.plaintext_modulus());
        let modulus = target.modulus();
        let parts = tensor
            .iter()
            .map(|part| {
                let scaled: Vec<BigInt> = part
                    .to_bigints_centered()
                    .iter()
                    .map(|x| div_round(&(x * &t), modulus))
                    .collect();
                let mut poly = RnsPoly::from_bigints(&scaled, target.clone())?;
                poly.to_ntt_domain();
                Ok(poly)
            })
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Ciphertext::new(parts, FV_SCALE)?)
    }

    /// `mul` followed by `relinearize`.
    pub fn mul_relin(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<Ciphertext> {
        let mut out = self.mul(a, b)?;
        self.relinearize(&mut out)?;
        Ok(out)
    }

    pub fn square_relin(&self, ct: &Ciphertext) -> EvalResult<Ciphertext> {
        self.mul_relin(ct, ct)
    }

    /// Rotates both rows left by `steps` slots.
    pub fn rotate_columns(&self, ct: &Ciphertext, steps: isize) -> EvalResult<Ciphertext> {
        self.apply_galois(ct, self.ctx.galois_element(steps))
    }

    /// Swaps the two slot rows.
    pub fn rotate_rows(&self, ct: &Ciphertext) -> EvalResult<Ciphertext> {
        self.apply_galois(ct, self.ctx.galois_element_conjugate())
    }

    fn check_plain_level(&self, ct: &Ciphertext, level: usize) -> EvalResult<()> {
        if ct.level() != level {
            return Err(EvalError::LevelMismatch {
                left: ct.level(),
                right: level,
            });
        }
        Ok(())
    }
}
