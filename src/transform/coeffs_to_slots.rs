//! CKKS coefficients-to-slots over `slots` complex slots.
//!
//! Applies `S_l^{-1}, ..., S_1^{-1}` to the (periodic) slot vector, giving
//! `w = BR · (c_lo + i · c_hi)` up to the caller's normalization. The real and
//! imaginary parts are split with one conjugation:
//! `ct0 = w + conj(w)` and `ct1 = (w - conj(w)) / i`.

use std::collections::BTreeSet;

use num_complex::Complex64;
use tracing::{debug, instrument};

use crate::ciphertext::Ciphertext;
use crate::encoding::CkksEncoder;
use crate::evaluator::Evaluator;
use crate::plaintext::CkksPlaintext;

use super::bsgs::{BsgsPlan, LinearBackend, evaluate};
use super::dft::{RootTable, inverse_factors};
use super::diagonal::{ComplexArith, DiagonalMatrix};
use super::{TransformError, TransformResult};

struct CkksBackend<'a> {
    eval: &'a Evaluator,
    encoder: &'a CkksEncoder,
    /// Multiplied into every diagonal entry.
    constant: f64,
    plaintext_scale: f64,
}

impl LinearBackend for CkksBackend<'_> {
    type Elem = Complex64;
    type Plain = CkksPlaintext;

    fn encode(&self, diagonal: &[Complex64], ct: &Ciphertext) -> TransformResult<CkksPlaintext> {
        let values: Vec<Complex64> = diagonal.iter().map(|&z| z * self.constant).collect();
        Ok(self.encoder.encode(&values, self.plaintext_scale, ct.level())?)
    }

    fn mul_plain(&self, ct: &Ciphertext, plain: &CkksPlaintext) -> TransformResult<Ciphertext> {
        Ok(self.eval.mul_plain_ckks(ct, plain)?)
    }

    fn rotate(&self, ct: &Ciphertext, steps: usize) -> TransformResult<Ciphertext> {
        Ok(self.eval.rotate(ct, steps as isize)?)
    }

    fn add_assign(&self, acc: &mut Ciphertext, term: &Ciphertext) -> TransformResult<()> {
        Ok(self.eval.add_assign(acc, term)?)
    }
}

pub struct CoeffsToSlots {
    eval: Evaluator,
    encoder: CkksEncoder,
    slots: usize,
    factors: Vec<DiagonalMatrix<Complex64>>,
    /// Last factor over `2 * slots`, keeping the first half of every window.
    repack_last: Option<DiagonalMatrix<Complex64>>,
    bsgs_ratio: f64,
}

impl CoeffsToSlots {
    pub fn new(eval: &Evaluator, slots: usize, depth: usize, bsgs_ratio: f64) -> TransformResult<Self> {
        let ctx = eval.context().clone();
        let max_slots = ctx.half_degree();
        if slots == 0 || !slots.is_power_of_two() || slots > max_slots {
            return Err(TransformError::InvalidSlotCount { slots, max: max_slots });
        }
        let max_depth = (slots.trailing_zeros() as usize).max(1);
        if depth == 0 || depth > max_depth {
            return Err(TransformError::InvalidDepth { depth, max: max_depth });
        }

        let roots = RootTable::complex(slots);
        let factors = inverse_factors(&ComplexArith, &roots, slots, depth);
        let repack_last = (2 * slots <= max_slots)
            .then(|| factors.last())
            .flatten()
            .map(|last| {
                let mut wide = last.extend_periodic(2 * slots);
                wide.mask_rows(|j| j < slots, &ComplexArith);
                wide
            });

        Ok(Self {
            eval: eval.fork(),
            encoder: CkksEncoder::new(ctx),
            slots,
            factors,
            repack_last,
            bsgs_ratio,
        })
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn depth(&self) -> usize {
        self.factors.len()
    }

    pub fn can_repack(&self) -> bool {
        self.repack_last.is_some()
    }

    /// Galois elements used, including conjugation and, with `repack`, the
    /// final shift by `-slots`.
    pub fn required_rotations(&self, repack: bool) -> Vec<usize> {
        let ctx = self.eval.context();
        let mut steps = BTreeSet::new();
        for (i, factor) in self.factors.iter().enumerate() {
            let matrix = self.matrix(i, repack).unwrap_or(factor);
            steps.extend(BsgsPlan::new(matrix.indices(), matrix.dim(), self.bsgs_ratio).rotations());
        }
        let mut elements: BTreeSet<usize> = steps.into_iter().map(|s| ctx.galois_element(s as isize)).collect();
        elements.insert(ctx.galois_element_conjugate());
        if repack && self.can_repack() {
            elements.insert(ctx.galois_element(-(self.slots as isize)));
        }
        elements.into_iter().collect()
    }

    /// Runs every factor, rescaling after each.
    ///
    /// `normalization` is folded into the first factor. Intermediate factors
    /// keep the input scale and the last lands at `target_scale`. With
    /// `repack`, both halves are packed into `ct0` and `ct1` is `None`.
    #[instrument(skip_all, fields(slots = self.slots, depth = self.depth(), repack = repack))]
    pub fn coeffs_to_slots(
        &self,
        ct: &Ciphertext,
        normalization: f64,
        target_scale: f64,
        repack: bool,
    ) -> TransformResult<(Ciphertext, Option<Ciphertext>)> {
        if repack && !self.can_repack() {
            return Err(TransformError::RepackUnavailable {
                slots: self.slots,
                max: self.eval.context().half_degree(),
            });
        }
        let ctx = self.eval.context();
        let input_scale = ct.scale();
        let mut w = ct.clone();
        for (i, factor) in self.factors.iter().enumerate() {
            let matrix = self.matrix(i, repack).unwrap_or(factor);
            let landing = if i + 1 == self.depth() { target_scale } else { input_scale };
            let prime = ctx.prime(w.level()) as f64;
            let backend = CkksBackend {
                eval: &self.eval,
                encoder: &self.encoder,
                constant: if i == 0 { normalization } else { 1.0 },
                plaintext_scale: prime * landing / w.scale(),
            };
            w = evaluate(&backend, matrix, self.bsgs_ratio, &w)?;
            self.eval.rescale(&mut w)?;
            debug!(factor = i, level = w.level(), scale = w.scale(), "coeffs-to-slots factor");
        }

        let conj = self.eval.conjugate(&w)?;
        let mut ct0 = self.eval.add(&w, &conj)?;
        let mut ct1 = self.eval.sub(&w, &conj)?;
        self.eval.div_by_i(&mut ct1);
        if repack {
            let shifted = self.eval.rotate(&ct1, -(self.slots as isize))?;
            self.eval.add_assign(&mut ct0, &shifted)?;
            return Ok((ct0, None));
        }
        Ok((ct0, Some(ct1)))
    }

    fn matrix(&self, index: usize, repack: bool) -> Option<&DiagonalMatrix<Complex64>> {
        if repack && index + 1 == self.depth() {
            self.repack_last.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::ckks::integer_poly;
    use crate::evaluator::test_support::fixture;
    use crate::params::{toy_full_slots, toy_sparse_slots};
    use crate::plaintext::CkksPlaintext;
    use crate::transform::dft::bit_reverse;
    use approx::assert_abs_diff_eq;
    use rand::Rng;

    const SCALE: f64 = (1u64 << 40) as f64;

    #[test]
    fn rejects_bad_shapes() {
        let f = fixture(toy_full_slots(), &[], 141);
        assert!(matches!(
            CoeffsToSlots::new(&f.eval, 3, 1, 2.0),
            Err(TransformError::InvalidSlotCount { slots: 3, .. })
        ));
        assert!(matches!(
            CoeffsToSlots::new(&f.eval, 4, 3, 2.0),
            Err(TransformError::InvalidDepth { depth: 3, max: 2 })
        ));
        let full = CoeffsToSlots::new(&f.eval, 16, 2, 2.0).unwrap();
        assert!(!full.can_repack());
    }

    #[test]
    fn full_slots_land_coefficients_in_bit_reversed_order() {
        let literal = toy_full_slots();
        let unkeyed = fixture(literal.clone(), &[], 142);
        let cts = CoeffsToSlots::new(&unkeyed.eval, 16, 2, 2.0).unwrap();
        let galois = cts.required_rotations(false);
        let mut f = fixture(literal, &galois, 142);
        let cts = CoeffsToSlots::new(&f.eval, 16, 2, 2.0).unwrap();

        let coeffs: Vec<f64> = (0..32).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let scaled: Vec<f64> = coeffs.iter().map(|c| c * SCALE).collect();
        let level = f.ctx.max_level();
        let plaintext = CkksPlaintext {
            poly: integer_poly(&scaled, &f.ctx, level).unwrap(),
            scale: SCALE,
        };
        let ct = f.encryptor.encrypt_ckks(&plaintext, &mut f.rng).unwrap();
        let (ct0, ct1) = cts.coeffs_to_slots(&ct, 0.5, SCALE, false).unwrap();
        let ct1 = ct1.unwrap();
        assert_eq!(ct0.level(), level - 2);

        let encoder = CkksEncoder::new(f.ctx.clone());
        let lo = encoder.decode_real(&f.decryptor.decrypt_ckks(&ct0).unwrap(), 16).unwrap();
        let hi = encoder.decode_real(&f.decryptor.decrypt_ckks(&ct1).unwrap(), 16).unwrap();
        let (want_lo, want_hi) = (bit_reverse(&coeffs[..16]), bit_reverse(&coeffs[16..]));
        for i in 0..16 {
            assert_abs_diff_eq!(lo[i], want_lo[i], epsilon = 1e-6);
            assert_abs_diff_eq!(hi[i], want_hi[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn sparse_repack_fills_both_halves() {
        let literal = toy_sparse_slots();
        let unkeyed = fixture(literal.clone(), &[], 143);
        let cts = CoeffsToSlots::new(&unkeyed.eval, 4, 1, 2.0).unwrap();
        let galois = cts.required_rotations(true);
        let mut f = fixture(literal, &galois, 143);
        let cts = CoeffsToSlots::new(&f.eval, 4, 1, 2.0).unwrap();

        // A polynomial in X^4 with 8 coefficients is a 4-slot sparse message.
        let sparse: Vec<f64> = (0..8).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let mut scaled = vec![0.0; 32];
        for (m, c) in sparse.iter().enumerate() {
            scaled[4 * m] = c * SCALE;
        }
        let level = f.ctx.max_level();
        let plaintext = CkksPlaintext {
            poly: integer_poly(&scaled, &f.ctx, level).unwrap(),
            scale: SCALE,
        };
        let ct = f.encryptor.encrypt_ckks(&plaintext, &mut f.rng).unwrap();
        let (packed, rest) = cts.coeffs_to_slots(&ct, 0.5, SCALE, true).unwrap();
        assert!(rest.is_none());

        let encoder = CkksEncoder::new(f.ctx.clone());
        let slots = encoder.decode_real(&f.decryptor.decrypt_ckks(&packed).unwrap(), 8).unwrap();
        let mut expected = bit_reverse(&sparse[..4]);
        expected.extend(bit_reverse(&sparse[4..]));
        for (got, want) in slots.iter().zip(&expected) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-6);
        }
    }
}
