use std::collections::BTreeSet;

use num_traits::ToPrimitive;
use tracing::{debug, info, instrument};

use crate::ciphertext::Ciphertext;
use crate::evaluator::Evaluator;
use crate::params::HalfBootParameters;
use crate::transform::CoeffsToSlots;

use super::sine::SineEvaluator;
use super::{BootstrapError, BootstrapResult};

/// Raises a level-0 CKKS ciphertext (or a low-level FV one through
/// [`HalfBootstrapper::from_fv`]) to the top of the chain and moves its
/// coefficients, reduced modulo `q_0`, into slots.
///
/// For slot count `s` and ring half-degree `n`:
/// * `s = n`: two outputs, `ct0[i] = x[bitrev i]`, `ct1[i] = x[n + bitrev i]`;
/// * `s < n`: the input is first traced down to the subring of `X^(n/s)`;
///   with `repack` both halves land in one ciphertext of `2s` slots.
///
/// Outputs sit at level 1 with a power-of-two scale near the sine scale.
pub struct HalfBootstrapper {
    eval: Evaluator,
    params: HalfBootParameters,
    slots: usize,
    cts: CoeffsToSlots,
    sine: SineEvaluator,
}

impl HalfBootstrapper {
    pub fn new(eval: &Evaluator) -> BootstrapResult<Self> {
        let ctx = eval.context();
        let params = ctx.literal().half_boot.clone();
        let slots = ctx.slots();
        let cts = CoeffsToSlots::new(eval, slots, params.cts_depth, params.bsgs_ratio)?;
        Ok(Self {
            eval: eval.fork(),
            sine: SineEvaluator::new(&params),
            params,
            slots,
            cts,
        })
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn params(&self) -> &HalfBootParameters {
        &self.params
    }

    /// Scale of the level-0 message before raising: `q_0 / MR`.
    pub fn prescale(&self) -> f64 {
        self.eval.context().prime(0) as f64 / self.params.message_ratio
    }

    pub fn required_galois_elements(&self, repack: bool) -> Vec<usize> {
        let ctx = self.eval.context();
        let mut elements: BTreeSet<usize> = self.cts.required_rotations(repack).into_iter().collect();
        elements.extend(self.sub_sum_steps().map(|step| ctx.galois_element(step as isize)));
        elements.into_iter().collect()
    }

    pub fn check_keys(&self, repack: bool) -> BootstrapResult<()> {
        let elements = self.required_galois_elements(repack);
        Ok(self.eval.keys().check_keys(true, &elements)?)
    }

    /// Reinterprets an FV ciphertext as CKKS at level 1, where a slot value
    /// `x` of the result's coefficients is `MR * m / t`.
    pub fn from_fv(&self, ct: &Ciphertext) -> BootstrapResult<Ciphertext> {
        let mut out = ct.clone();
        let excess = out.level().saturating_sub(1);
        if excess > 0 {
            self.eval.mod_switch_many(&mut out, excess)?;
        }
        let modulus = self
            .eval
            .context()
            .q_basis(out.level())
            .modulus()
            .to_f64()
            .unwrap_or(f64::INFINITY);
        out.set_scale(modulus / self.params.message_ratio);
        Ok(out)
    }

    /// Runs the half-bootstrap. The second output is `None` with `repack`.
    #[instrument(skip_all, fields(slots = self.slots, level = ct.level(), repack = repack))]
    pub fn half_boot(&self, ct: &Ciphertext, repack: bool) -> BootstrapResult<(Ciphertext, Option<Ciphertext>)> {
        let half = self.eval.context().half_degree();
        if repack && 2 * self.slots > half {
            return Err(BootstrapError::RepackUnavailable {
                slots: self.slots,
                max: half,
            });
        }
        self.check_keys(repack)?;

        let normalized = self.normalize(ct)?;
        let (raised, unit) = self.mod_up(&normalized)?;
        let traced = self.sub_sum(raised)?;

        let gap = (self.eval.context().half_degree() / self.slots) as f64;
        let normalization = traced.scale() / (unit * 2.0 * gap * self.params.sine_range);
        let sine_scale = self.params.sine_scale();
        let (ct0, ct1) = self.cts.coeffs_to_slots(&traced, normalization, sine_scale, repack)?;
        debug!(level = ct0.level(), "coefficients moved to slots");

        let out0 = self.reduce(&ct0)?;
        let out1 = ct1.map(|ct| self.reduce(&ct)).transpose()?;
        info!(level = out0.level(), scale = out0.scale(), "half-bootstrap done");
        Ok((out0, out1))
    }

    /// Brings the input to level 0 at a scale near `q_0 / MR`.
    fn normalize(&self, ct: &Ciphertext) -> BootstrapResult<Ciphertext> {
        let prescale = self.prescale();
        let mut out = ct.clone();
        let excess = out.level().saturating_sub(1);
        if excess > 0 {
            self.eval.drop_levels(&mut out, excess)?;
        }
        if out.level() == 1 {
            let q1 = self.eval.context().prime(1) as f64;
            let factor = (prescale * q1 / out.scale()).round().max(1.0);
            self.eval.mul_const(&mut out, 1.0, factor)?;
            self.eval.rescale(&mut out)?;
        } else {
            let factor = (prescale / out.scale()).round();
            if factor >= 2.0 {
                self.eval.mul_const(&mut out, 1.0, factor)?;
            }
        }
        Ok(out)
    }

    /// Lifts both parts from `q_0` to the full chain. Returns the ciphertext
    /// and the size of one `q_0` overflow in coefficient units.
    fn mod_up(&self, ct: &Ciphertext) -> BootstrapResult<(Ciphertext, f64)> {
        let ctx = self.eval.context();
        let target = ctx.q_basis(ctx.max_level());
        let mut low = ct.clone();
        self.eval.transform_to_coeff(&mut low);
        let parts = low
            .parts()
            .iter()
            .map(|part| part.lift_centered(target.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut raised = Ciphertext::new(parts, ct.scale())?;
        self.eval.transform_to_ntt(&mut raised);
        let mut unit = ctx.prime(0) as f64;

        let factor = (self.params.sine_scale() / raised.scale()).round();
        if factor >= 2.0 {
            self.eval.mul_const(&mut raised, 1.0, factor)?;
            unit *= factor;
        }
        debug!(level = raised.level(), scale = raised.scale(), "raised to the full chain");
        Ok((raised, unit))
    }

    fn sub_sum_steps(&self) -> impl Iterator<Item = usize> + use<> {
        let (slots, half) = (self.slots, self.eval.context().half_degree());
        (0..)
            .map(move |i| slots << i)
            .take_while(move |&step| step < half)
    }

    /// Sums the rotations by `s * 2^i`, keeping only the coefficients of
    /// `X^(n/s)` scaled by `n / s`.
    fn sub_sum(&self, mut ct: Ciphertext) -> BootstrapResult<Ciphertext> {
        for step in self.sub_sum_steps() {
            let rotated = self.eval.rotate(&ct, step as isize)?;
            self.eval.add_assign(&mut ct, &rotated)?;
        }
        Ok(ct)
    }

    /// Sine step and the final multiply to message units at a power-of-two
    /// scale.
    fn reduce(&self, ct: &Ciphertext) -> BootstrapResult<Ciphertext> {
        let mut y = self.sine.evaluate(&self.eval, ct, self.params.sine_scale())?;
        let scale = y.scale();
        let target = 2f64.powi(scale.log2().round() as i32);
        let prime = self.eval.context().prime(y.level()) as f64;
        self.eval
            .mul_const(&mut y, 1.0, target * prime * self.sine.output_factor() / scale)?;
        self.eval.rescale(&mut y)?;
        y.set_scale(target);
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::CkksEncoder;
    use crate::encoding::ckks::integer_poly;
    use crate::evaluator::test_support::{Fixture, fixture};
    use crate::params::{ParametersLiteral, toy_full_slots, toy_sparse_slots};
    use crate::plaintext::CkksPlaintext;
    use crate::transform::dft::bit_reverse;
    use approx::assert_abs_diff_eq;
    use rand::Rng;

    fn setup(literal: ParametersLiteral, repack: bool, seed: u64) -> (Fixture, HalfBootstrapper) {
        let unkeyed = fixture(literal.clone(), &[], seed);
        let galois = HalfBootstrapper::new(&unkeyed.eval)
            .unwrap()
            .required_galois_elements(repack);
        let f = fixture(literal, &galois, seed);
        let hb = HalfBootstrapper::new(&f.eval).unwrap();
        (f, hb)
    }

    /// Level-0 encryption of `x * q_0 / MR` in the coefficients.
    fn encrypt_coefficients(f: &mut Fixture, hb: &HalfBootstrapper, x: &[f64]) -> Ciphertext {
        let prescale = hb.prescale();
        encrypt_coefficients_at(f, x, 0, prescale)
    }

    fn encrypt_coefficients_at(f: &mut Fixture, x: &[f64], level: usize, scale: f64) -> Ciphertext {
        let mut scaled: Vec<f64> = x.iter().map(|v| v * scale).collect();
        scaled.resize(f.ctx.degree(), 0.0);
        let plaintext = CkksPlaintext {
            poly: integer_poly(&scaled, &f.ctx, level).unwrap(),
            scale,
        };
        f.encryptor.encrypt_ckks(&plaintext, &mut f.rng).unwrap()
    }

    fn assert_full_slot_halves(f: &Fixture, out: (Ciphertext, Option<Ciphertext>), x: &[f64], tolerance: f64) {
        let encoder = CkksEncoder::new(f.ctx.clone());
        let half = f.ctx.half_degree();
        let lo = encoder.decode_real(&f.decryptor.decrypt_ckks(&out.0).unwrap(), half).unwrap();
        let hi = encoder
            .decode_real(&f.decryptor.decrypt_ckks(&out.1.unwrap()).unwrap(), half)
            .unwrap();
        let (want_lo, want_hi) = (bit_reverse(&x[..half]), bit_reverse(&x[half..]));
        for i in 0..half {
            assert_abs_diff_eq!(lo[i], want_lo[i], epsilon = tolerance);
            assert_abs_diff_eq!(hi[i], want_hi[i], epsilon = tolerance);
        }
    }

    #[test]
    fn full_slots_recover_both_coefficient_halves() {
        let (mut f, hb) = setup(toy_full_slots(), false, 161);
        let x: Vec<f64> = (0..32).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let ct = encrypt_coefficients(&mut f, &hb, &x);

        let (ct0, ct1) = hb.half_boot(&ct, false).unwrap();
        let ct1 = ct1.unwrap();
        assert_eq!(ct0.level(), 1);
        assert_eq!(ct0.scale(), 2f64.powi(45));

        let encoder = CkksEncoder::new(f.ctx.clone());
        let lo = encoder.decode_real(&f.decryptor.decrypt_ckks(&ct0).unwrap(), 16).unwrap();
        let hi = encoder.decode_real(&f.decryptor.decrypt_ckks(&ct1).unwrap(), 16).unwrap();
        let (want_lo, want_hi) = (bit_reverse(&x[..16]), bit_reverse(&x[16..]));
        let tolerance = 2f64.powi(-15);
        for i in 0..16 {
            assert_abs_diff_eq!(lo[i], want_lo[i], epsilon = tolerance);
            assert_abs_diff_eq!(hi[i], want_hi[i], epsilon = tolerance);
        }
    }

    #[test]
    fn sparse_slots_repack_into_one_ciphertext() {
        let (mut f, hb) = setup(toy_sparse_slots(), true, 162);
        let x: Vec<f64> = (0..32).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let ct = encrypt_coefficients(&mut f, &hb, &x);

        let (packed, rest) = hb.half_boot(&ct, true).unwrap();
        assert!(rest.is_none());
        assert_eq!(packed.level(), 1);

        // Only the coefficients of X^4 survive the trace.
        let kept: Vec<f64> = (0..8).map(|m| x[4 * m]).collect();
        let mut expected = bit_reverse(&kept[..4]);
        expected.extend(bit_reverse(&kept[4..]));
        let encoder = CkksEncoder::new(f.ctx.clone());
        let got = encoder.decode_real(&f.decryptor.decrypt_ckks(&packed).unwrap(), 8).unwrap();
        for (g, w) in got.iter().zip(&expected) {
            assert_abs_diff_eq!(*g, *w, epsilon = 2f64.powi(-12));
        }
    }

    #[test]
    fn inputs_above_level_one_are_normalized() {
        let (mut f, hb) = setup(toy_full_slots(), false, 166);
        let x: Vec<f64> = (0..32).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let ct = encrypt_coefficients_at(&mut f, &x, 4, 2f64.powi(30));
        let out = hb.half_boot(&ct, false).unwrap();
        assert_eq!(out.0.level(), 1);
        assert_full_slot_halves(&f, out, &x, 2f64.powi(-15));
    }

    #[test]
    fn low_scale_level_zero_input_is_scaled_up() {
        let (mut f, hb) = setup(toy_full_slots(), false, 167);
        let x: Vec<f64> = (0..32).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let ct = encrypt_coefficients_at(&mut f, &x, 0, hb.prescale() / 4.0);
        let out = hb.half_boot(&ct, false).unwrap();
        assert_full_slot_halves(&f, out, &x, 2f64.powi(-15));
    }

    #[test]
    fn sparse_slots_without_repack_give_two_outputs() {
        let (mut f, hb) = setup(toy_sparse_slots(), false, 168);
        let x: Vec<f64> = (0..32).map(|_| f.rng.random_range(-1.0..1.0)).collect();
        let ct = encrypt_coefficients(&mut f, &hb, &x);

        let (ct0, ct1) = hb.half_boot(&ct, false).unwrap();
        let ct1 = ct1.unwrap();
        assert_eq!(ct0.level(), 1);
        let slots = hb.slots();
        let kept: Vec<f64> = (0..2 * slots).map(|m| x[4 * m]).collect();
        let encoder = CkksEncoder::new(f.ctx.clone());
        let lo = encoder.decode_real(&f.decryptor.decrypt_ckks(&ct0).unwrap(), slots).unwrap();
        let hi = encoder.decode_real(&f.decryptor.decrypt_ckks(&ct1).unwrap(), slots).unwrap();
        let (want_lo, want_hi) = (bit_reverse(&kept[..slots]), bit_reverse(&kept[slots..]));
        for i in 0..slots {
            assert_abs_diff_eq!(lo[i], want_lo[i], epsilon = 2f64.powi(-12));
            assert_abs_diff_eq!(hi[i], want_hi[i], epsilon = 2f64.powi(-12));
        }
    }

    #[test]
    fn full_slots_cannot_repack() {
        let (mut f, hb) = setup(toy_full_slots(), false, 163);
        let ct = encrypt_coefficients(&mut f, &hb, &[0.5]);
        assert!(matches!(
            hb.half_boot(&ct, true),
            Err(BootstrapError::RepackUnavailable { slots: 16, max: 16 })
        ));
    }

    #[test]
    fn missing_keys_are_reported_before_work() {
        let mut f = fixture(toy_full_slots(), &[], 164);
        let hb = HalfBootstrapper::new(&f.eval).unwrap();
        let ct = encrypt_coefficients(&mut f, &hb, &[0.5]);
        assert!(matches!(
            hb.half_boot(&ct, false),
            Err(BootstrapError::Key(crate::keys::KeyError::MissingGaloisKey { .. }))
        ));
    }

    #[test]
    fn fv_input_lands_at_level_one() {
        let (mut f, hb) = setup(toy_full_slots(), false, 165);
        let ct = f.encryptor.encrypt_constant(1, 6, &mut f.rng).unwrap();
        let ckks = hb.from_fv(&ct).unwrap();
        assert_eq!(ckks.level(), 1);
        let expected = f.ctx.q_basis(1).modulus().to_f64().unwrap() / hb.params().message_ratio;
        assert_abs_diff_eq!(ckks.scale(), expected, epsilon = expected * 1e-12);
    }
}
