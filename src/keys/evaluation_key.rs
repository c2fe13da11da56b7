use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use tracing::{debug, instrument};

use crate::context::Context;
use crate::rings::RnsPoly;

use super::{KeyError, KeyResult, SecretKey, SwitchingKey};

/// Relinearization key plus Galois keys indexed by Galois element.
#[derive(Debug, Clone, Default)]
pub struct EvaluationKey {
    relinearization: Option<SwitchingKey>,
    galois: HashMap<usize, SwitchingKey>,
}

impl EvaluationKey {
    pub fn relinearization(&self) -> KeyResult<&SwitchingKey> {
        self.relinearization
            .as_ref()
            .ok_or(KeyError::MissingRelinearizationKey)
    }

    pub fn galois(&self, element: usize) -> KeyResult<&SwitchingKey> {
        self.galois
            .get(&element)
            .ok_or(KeyError::MissingGaloisKey { element })
    }

    pub fn has_galois(&self, element: usize) -> bool {
        self.galois.contains_key(&element)
    }

    pub fn galois_elements(&self) -> impl Iterator<Item = usize> + '_ {
        self.galois.keys().copied()
    }

    /// Fails on the first missing key.
    pub fn check_keys(&self, needs_relinearization: bool, galois: &[usize]) -> KeyResult<()> {
        if needs_relinearization {
            self.relinearization()?;
        }
        for &element in galois {
            if element != 1 {
                self.galois(element)?;
            }
        }
        Ok(())
    }
}

/// Generates the secret key and the evaluation keys of a context.
pub struct KeyGenerator<'a> {
    ctx: &'a Context,
    sigma: f64,
    hamming_weight: usize,
}

impl<'a> KeyGenerator<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            sigma: ctx.literal().sigma,
            hamming_weight: ctx.literal().hamming_weight,
        }
    }

    pub fn sigma(mut self, sigma: f64) -> KeyResult<Self> {
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(KeyError::InvalidErrorStd { sigma });
        }
        self.sigma = sigma;
        Ok(self)
    }

    pub fn hamming_weight(mut self, weight: usize) -> Self {
        self.hamming_weight = weight;
        self
    }

    pub fn gen_secret_key<R: Rng + ?Sized>(&self, rng: &mut R) -> KeyResult<SecretKey> {
        SecretKey::generate(self.ctx, self.hamming_weight, rng)
    }

    /// Switching key from `s^2` to `s`.
    pub fn gen_relinearization_key<R: Rng + ?Sized>(
        &self,
        sk: &SecretKey,
        rng: &mut R,
    ) -> KeyResult<SwitchingKey> {
        let mut s2 = sk.ntt_qp().clone();
        s2.mul_assign_ntt(sk.ntt_qp())?;
        SwitchingKey::generate(self.ctx, sk, &s2, self.sigma, rng)
    }

    /// Switching key from `s(X^galois)` to `s`.
    pub fn gen_galois_key<R: Rng + ?Sized>(
        &self,
        sk: &SecretKey,
        galois: usize,
        rng: &mut R,
    ) -> KeyResult<SwitchingKey> {
        let rotated: RnsPoly = sk.ntt_qp().automorphism(galois)?;
        SwitchingKey::generate(self.ctx, sk, &rotated, self.sigma, rng)
    }

    /// Relinearization key and one Galois key per distinct element (identity skipped).
    #[instrument(skip_all, fields(galois = galois.len()))]
    pub fn gen_evaluation_key<R: Rng + ?Sized>(
        &self,
        sk: &SecretKey,
        galois: &[usize],
        rng: &mut R,
    ) -> KeyResult<EvaluationKey> {
        let relinearization = Some(self.gen_relinearization_key(sk, rng)?);
        let elements: BTreeSet<usize> = galois.iter().copied().filter(|&g| g != 1).collect();
        let mut keys = HashMap::with_capacity(elements.len());
        for element in elements {
            keys.insert(element, self.gen_galois_key(sk, element, rng)?);
        }
        debug!(galois_keys = keys.len(), "evaluation key generated");
        Ok(EvaluationKey {
            relinearization,
            galois: keys,
        })
    }
}
