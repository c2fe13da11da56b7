//! Secret-key encryption and decryption for both sides of the pipeline.
//!
//! Only the client holds these; the server-side evaluator never sees `s`.

use std::sync::Arc;

use rand::Rng;

use crate::ciphertext::Ciphertext;
use crate::context::Context;
use crate::encoding::BatchEncoder;
use crate::encoding::batch::round_to_plaintext;
use crate::evaluator::fv::FV_SCALE;
use crate::evaluator::{EvalError, EvalResult};
use crate::keys::SecretKey;
use crate::math::gaussian_integers;
use crate::plaintext::{CkksPlaintext, PlaintextRingT, PlaintextScaled};
use crate::rings::RnsPoly;

pub struct Encryptor {
    ctx: Arc<Context>,
    secret: SecretKey,
    sigma: f64,
    encoder: BatchEncoder,
}

impl Encryptor {
    pub fn new(ctx: Arc<Context>, secret: SecretKey) -> Self {
        let sigma = ctx.literal().sigma;
        let encoder = BatchEncoder::new(ctx.clone());
        Self {
            ctx,
            secret,
            sigma,
            encoder,
        }
    }

    /// Overrides the error standard deviation.
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// `(−a·s + e, a)` over `Q_level`, NTT form.
    pub fn encrypt_zero<R: Rng + ?Sized>(&self, level: usize, scale: f64, rng: &mut R) -> Ciphertext {
        let basis = self.ctx.q_basis(level).clone();
        let a = RnsPoly::sample_uniform(basis.clone(), true, rng);
        let mut c0 = RnsPoly::from_signed(&gaussian_integers(self.ctx.degree(), self.sigma, rng), basis);
        c0.to_ntt_domain();
        let mut a_s = a.clone();
        let s = self.secret.at_level(&self.ctx, level);
        // Operands are built over one basis in the NTT domain.
        a_s.mul_assign_ntt(&s)
            .and_then(|()| c0.sub_assign(&a_s))
            .and_then(|()| Ciphertext::new(vec![c0, a], scale))
            .unwrap_or_else(|err| unreachable!("fresh encryption: {err}"))
    }

    /// FV encryption of a scaled plaintext at its level.
    pub fn encrypt_scaled<R: Rng + ?Sized>(&self, plaintext: &PlaintextScaled, rng: &mut R) -> EvalResult<Ciphertext> {
        let mut ct = self.encrypt_zero(plaintext.level(), FV_SCALE, rng);
        ct.parts_mut()[0].add_assign(&plaintext.poly)?;
        Ok(ct)
    }

    pub fn encrypt_fv<R: Rng + ?Sized>(
        &self,
        plaintext: &PlaintextRingT,
        level: usize,
        rng: &mut R,
    ) -> EvalResult<Ciphertext> {
        let scaled = self.encoder.scale_up(plaintext, level)?;
        self.encrypt_scaled(&scaled, rng)
    }

    /// Encodes slot values and encrypts them at `level`.
    pub fn encrypt_slots<R: Rng + ?Sized>(&self, values: &[u64], level: usize, rng: &mut R) -> EvalResult<Ciphertext> {
        let plaintext = self.encoder.encode(values)?;
        self.encrypt_fv(&plaintext, level, rng)
    }

    /// `value` replicated in every slot.
    pub fn encrypt_constant<R: Rng + ?Sized>(&self, value: u64, level: usize, rng: &mut R) -> EvalResult<Ciphertext> {
        let plaintext = self.encoder.encode_constant(value);
        self.encrypt_fv(&plaintext, level, rng)
    }

    pub fn encrypt_ckks<R: Rng + ?Sized>(&self, plaintext: &CkksPlaintext, rng: &mut R) -> EvalResult<Ciphertext> {
        let mut ct = self.encrypt_zero(plaintext.level(), plaintext.scale, rng);
        let mut m = plaintext.poly.clone();
        m.to_ntt_domain();
        ct.parts_mut()[0].add_assign(&m)?;
        Ok(ct)
    }
}

pub struct Decryptor {
    ctx: Arc<Context>,
    secret: SecretKey,
    encoder: BatchEncoder,
}

impl Decryptor {
    pub fn new(ctx: Arc<Context>, secret: SecretKey) -> Self {
        let encoder = BatchEncoder::new(ctx.clone());
        Self { ctx, secret, encoder }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// `sum c_i s^i` over `Q_l`, in the NTT domain.
    pub fn phase(&self, ct: &Ciphertext) -> EvalResult<RnsPoly> {
        let s = self.secret.at_level(&self.ctx, ct.level());
        let mut parts = ct.parts().iter().rev();
        let mut acc = match parts.next() {
            Some(top) => top.clone(),
            None => return Err(EvalError::DegreeMismatch { expected: 1, actual: 0 }),
        };
        acc.to_ntt_domain();
        for part in parts {
            let mut part = part.clone();
            part.to_ntt_domain();
            acc.mul_assign_ntt(&s)?;
            acc.add_assign(&part)?;
        }
        Ok(acc)
    }

    pub fn decrypt_fv(&self, ct: &Ciphertext) -> EvalResult<PlaintextRingT> {
        let phase = self.phase(ct)?;
        Ok(PlaintextRingT {
            coeffs: round_to_plaintext(&phase, self.ctx.plaintext_modulus()),
        })
    }

    pub fn decrypt_slots(&self, ct: &Ciphertext) -> EvalResult<Vec<u64>> {
        Ok(self.encoder.decode(&self.decrypt_fv(ct)?))
    }

    pub fn decrypt_ckks(&self, ct: &Ciphertext) -> EvalResult<CkksPlaintext> {
        Ok(CkksPlaintext {
            poly: self.phase(ct)?,
            scale: ct.scale(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::toy_full_slots;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn actors(seed: u64) -> (Encryptor, Decryptor, ChaCha20Rng) {
        let ctx = Context::new(toy_full_slots()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let sk = SecretKey::generate(&ctx, 8, &mut rng).unwrap();
        (Encryptor::new(ctx.clone(), sk.clone()), Decryptor::new(ctx, sk), rng)
    }

    #[test]
    fn fv_roundtrip_at_every_level() {
        let (enc, dec, mut rng) = actors(61);
        let values: Vec<u64> = (0..32).map(|i| i * 1_000_003).collect();
        for level in 1..=enc.ctx.max_level() {
            let ct = enc.encrypt_slots(&values, level, &mut rng).unwrap();
            assert_eq!(ct.level(), level);
            assert_eq!(dec.decrypt_slots(&ct).unwrap(), values);
        }
    }

    #[test]
    fn zero_sigma_is_accepted() {
        let (enc, dec, mut rng) = actors(62);
        let enc = enc.with_sigma(0.0);
        let ct = enc.encrypt_constant(17, 2, &mut rng).unwrap();
        assert!(dec.decrypt_slots(&ct).unwrap().iter().all(|&v| v == 17));
    }
}
