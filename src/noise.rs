//! Invariant noise budget of FV ciphertexts.
//!
//! Needs the secret key: this is a calibration tool for picking modulus
//! schedules, not something a server deploys.

use std::sync::Arc;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::ciphertext::Ciphertext;
use crate::context::Context;
use crate::encryption::Decryptor;
use crate::evaluator::{EvalError, EvalResult};
use crate::keys::SecretKey;

/// Number of leading bits kept before measuring a bit length.
pub const SIGNIFICANT_WINDOW: u64 = 8;

/// Bit length of `x` after rounding it to its top `SIGNIFICANT_WINDOW` bits.
///
/// A run of ones at the top carries into the next power of two, so
/// `significant_bits(255) == 8` but `significant_bits(511 << 10) == 20`.
pub fn significant_bits(x: &BigUint) -> u64 {
    let bits = x.bits();
    if bits <= SIGNIFICANT_WINDOW {
        return bits;
    }
    let shift = bits - SIGNIFICANT_WINDOW;
    let half = BigUint::one() << (shift - 1);
    ((x + half) >> shift).bits() + shift
}

pub struct NoiseEstimator {
    ctx: Arc<Context>,
    decryptor: Decryptor,
}

impl NoiseEstimator {
    pub fn new(ctx: Arc<Context>, secret: SecretKey) -> Self {
        let decryptor = Decryptor::new(ctx.clone(), secret);
        Self { ctx, decryptor }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Bits of headroom left before decryption fails, floored at zero.
    ///
    /// Measures `‖[t·(c_0 + c_1 s + c_2 s²)]_Q‖_∞` against `Q`.
    pub fn invariant_noise_budget(&self, ct: &Ciphertext) -> EvalResult<u64> {
        if !(1..=2).contains(&ct.degree()) {
            return Err(EvalError::DegreeMismatch {
                expected: 1,
                actual: ct.degree(),
            });
        }
        let phase = self.decryptor.phase(ct)?;
        let modulus = BigInt::from_biguint(Sign::Plus, phase.basis().modulus().clone());
        let half = &modulus >> 1;
        let t = BigInt::from(self.ctx.plaintext_modulus());

        let norm = phase
            .to_bigints_centered()
            .into_iter()
            .map(|c| {
                let mut v = (c * &t).mod_floor(&modulus);
                if v > half {
                    v -= &modulus;
                }
                v.magnitude().clone()
            })
            .max()
            .unwrap_or_else(BigUint::zero);

        let budget = significant_bits(phase.basis().modulus()) as i64 - significant_bits(&norm) as i64 - 1;
        Ok(budget.max(0) as u64)
    }

    /// Maximum budget over `cts` and the index that reaches it.
    pub fn max_budget(&self, cts: &[Ciphertext]) -> EvalResult<(usize, u64)> {
        let mut best = (0, 0);
        for (i, ct) in cts.iter().enumerate() {
            let budget = self.invariant_noise_budget(ct)?;
            if i == 0 || budget > best.1 {
                best = (i, budget);
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::BatchEncoder;
    use crate::evaluator::test_support::fixture;
    use crate::keys::KeyGenerator;
    use crate::params::toy_full_slots;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn significant_bits_rounds_the_top_window() {
        assert_eq!(significant_bits(&BigUint::from(0u32)), 0);
        assert_eq!(significant_bits(&BigUint::from(255u32)), 8);
        assert_eq!(significant_bits(&BigUint::from(256u32)), 9);
        assert_eq!(significant_bits(&(BigUint::from(511u32) << 10)), 20);
        assert_eq!(significant_bits(&(BigUint::from(0b1000_0001u32) << 10)), 18);
    }

    #[test]
    fn fresh_budget_is_close_to_the_modulus_gap() {
        let ctx = Context::new(toy_full_slots()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(71);
        let sk = KeyGenerator::new(&ctx).gen_secret_key(&mut rng).unwrap();
        let enc = crate::encryption::Encryptor::new(ctx.clone(), sk.clone());
        let est = NoiseEstimator::new(ctx.clone(), sk);
        let level = ctx.max_level();
        let ct = enc.encrypt_slots(&[1, 2, 3], level, &mut rng).unwrap();
        let budget = est.invariant_noise_budget(&ct).unwrap();
        let gap = ctx.log_modulus(level) - (ctx.plaintext_modulus() as f64).log2();
        // Fresh noise is a few bits wide plus the `t·(Q mod t)` term.
        assert!((budget as f64) < gap);
        assert!((budget as f64) > gap - 40.0);
    }

    #[test]
    fn budget_shrinks_under_multiplication() {
        let mut f = fixture(toy_full_slots(), &[], 72);
        let est = NoiseEstimator::new(f.ctx.clone(), f.secret.clone());
        let level = f.ctx.max_level();
        let mut ct = f.encryptor.encrypt_slots(&[5, 6, 7], level, &mut f.rng).unwrap();
        let mut last = est.invariant_noise_budget(&ct).unwrap();
        for _ in 0..3 {
            ct = f.eval.square_relin(&ct).unwrap();
            let budget = est.invariant_noise_budget(&ct).unwrap();
            assert!(budget <= last);
            last = budget;
        }
    }

    #[test]
    fn budget_never_grows_along_a_mixed_circuit() {
        let galois = Context::new(toy_full_slots()).unwrap().galois_element(1);
        let mut f = fixture(toy_full_slots(), &[galois], 74);
        let est = NoiseEstimator::new(f.ctx.clone(), f.secret.clone());
        let encoder = BatchEncoder::new(f.ctx.clone());
        let level = f.ctx.max_level();
        let t = f.ctx.plaintext_modulus();
        let slots: Vec<u64> = (0..f.ctx.degree() as u64).map(|i| (i * 7919 + 3) % t).collect();
        let plain = encoder.to_mul_domain(&encoder.encode(&slots).unwrap(), level).unwrap();

        let fresh = f.encryptor.encrypt_slots(&[2, 4, 6], level, &mut f.rng).unwrap();
        let squared = f.eval.square_relin(&fresh).unwrap();
        let mut last = est.invariant_noise_budget(&squared).unwrap();
        let mut ct = squared;
        let steps: [&dyn Fn(&Ciphertext) -> Ciphertext; 4] = [
            &|ct: &Ciphertext| f.eval.add(ct, ct).unwrap(),
            &|ct: &Ciphertext| f.eval.mul_plain(ct, &plain).unwrap(),
            &|ct: &Ciphertext| f.eval.rotate_columns(ct, 1).unwrap(),
            &|ct: &Ciphertext| f.eval.add(ct, ct).unwrap(),
        ];
        for step in steps {
            ct = step(&ct);
            let budget = est.invariant_noise_budget(&ct).unwrap();
            assert!(budget <= last, "budget grew from {last} to {budget}");
            last = budget;
        }
    }

    #[test]
    fn switching_loses_at_most_the_dropped_primes() {
        let mut f = fixture(toy_full_slots(), &[], 73);
        let est = NoiseEstimator::new(f.ctx.clone(), f.secret.clone());
        let level = f.ctx.max_level();
        let fresh = f.encryptor.encrypt_slots(&[9], level, &mut f.rng).unwrap();
        let mut ct = f.eval.square_relin(&fresh).unwrap();
        let before = est.invariant_noise_budget(&ct).unwrap();
        f.eval.mod_switch_many(&mut ct, 2).unwrap();
        let after = est.invariant_noise_budget(&ct).unwrap();
        let dropped: u64 = (level - 1..=level).map(|i| f.ctx.prime_bits(i) as u64).sum();
        assert!(before.saturating_sub(after) <= dropped + 1);
    }
}
