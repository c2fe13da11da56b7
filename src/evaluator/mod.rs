//! Homomorphic evaluator shared by the FV and CKKS sides of the pipeline.
//!
//! One `Evaluator` holds the read-only context and evaluation keys behind
//! `Arc` plus private key-switching scratch. FV-specific operations live in
//! [`fv`], CKKS-specific ones in [`ckks`], key switching in [`keyswitch`].

pub mod ckks;
pub mod fv;
pub mod keyswitch;

use std::cell::RefCell;
use std::sync::Arc;

use thiserror::Error;

use crate::ciphertext::Ciphertext;
use crate::context::Context;
use crate::keys::{EvaluationKey, KeyError};
use crate::rings::{RingError, RnsPoly};

pub type EvalResult<T> = Result<T, EvalError>;

/// Relative scale difference accepted by additions of CKKS ciphertexts.
pub const SCALE_TOLERANCE: f64 = 1.0 / (1u64 << 20) as f64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("ciphertext degree {actual} where {expected} was expected")]
    DegreeMismatch { expected: usize, actual: usize },

    #[error("scale mismatch: {left:e} vs {right:e}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("cannot drop {requested} primes at level {level}")]
    LevelExhausted { requested: usize, level: usize },

    #[error("relinearization supports degree 2 ciphertexts, got degree {degree}")]
    InsufficientRelinearizationKey { degree: usize },

    #[error("no galois key for element {element}")]
    MissingGaloisKey { element: usize },

    #[error("constant {value} cannot be encoded")]
    InvalidConstant { value: f64 },

    #[error("key error during evaluation: {0}")]
    Key(#[from] KeyError),

    #[error("encoding error during evaluation: {0}")]
    Encoding(#[from] crate::encoding::EncodingError),

    #[error("ring error during evaluation: {0}")]
    Ring(#[from] RingError),
}

/// Reusable buffers for the digit decomposition of key switching.
#[derive(Debug, Default)]
pub(crate) struct KeySwitchScratch {
    /// Coefficient-domain input being decomposed, one vector per limb.
    pub(crate) input: Vec<Vec<u64>>,
    /// One digit lifted to `Q_l ∪ P`, one vector per limb.
    pub(crate) digit: Vec<Vec<u64>>,
}

/// Evaluator over a shared context and evaluation key.
///
/// Not `Sync`: the scratch is private. Use [`Evaluator::fork`] to get one
/// evaluator per thread.
#[derive(Debug)]
pub struct Evaluator {
    ctx: Arc<Context>,
    keys: Arc<EvaluationKey>,
    scratch: RefCell<KeySwitchScratch>,
}

impl Evaluator {
    pub fn new(ctx: Arc<Context>, keys: Arc<EvaluationKey>) -> Self {
        Self {
            ctx,
            keys,
            scratch: RefCell::new(KeySwitchScratch::default()),
        }
    }

    /// Evaluator sharing the tables and keys, with fresh scratch.
    pub fn fork(&self) -> Self {
        Self::new(self.ctx.clone(), self.keys.clone())
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn keys(&self) -> &Arc<EvaluationKey> {
        &self.keys
    }

    // ─── Shared arithmetic ────────────────────────────────────────────────────

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<Ciphertext> {
        let mut out = a.clone();
        self.add_assign(&mut out, b)?;
        Ok(out)
    }

    pub fn add_assign(&self, a: &mut Ciphertext, b: &Ciphertext) -> EvalResult<()> {
        self.check_binary(a, b)?;
        pad_parts(a, b.degree());
        for (x, y) in a.parts_mut().iter_mut().zip(b.parts()) {
            x.add_assign(y)?;
        }
        Ok(())
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<Ciphertext> {
        let mut out = a.clone();
        self.sub_assign(&mut out, b)?;
        Ok(out)
    }

    pub fn sub_assign(&self, a: &mut Ciphertext, b: &Ciphertext) -> EvalResult<()> {
        self.check_binary(a, b)?;
        pad_parts(a, b.degree());
        for (x, y) in a.parts_mut().iter_mut().zip(b.parts()) {
            x.sub_assign(y)?;
        }
        Ok(())
    }

    /// Lazy addition: limbs are left unreduced until [`Evaluator::reduce`].
    pub fn add_no_mod_assign(&self, a: &mut Ciphertext, b: &Ciphertext) -> EvalResult<()> {
        self.check_binary(a, b)?;
        pad_parts(a, b.degree());
        for (x, y) in a.parts_mut().iter_mut().zip(b.parts()) {
            x.add_assign_lazy(y)?;
        }
        Ok(())
    }

    pub fn sub_no_mod_assign(&self, a: &mut Ciphertext, b: &Ciphertext) -> EvalResult<()> {
        self.check_binary(a, b)?;
        pad_parts(a, b.degree());
        for (x, y) in a.parts_mut().iter_mut().zip(b.parts()) {
            x.sub_assign_lazy(y)?;
        }
        Ok(())
    }

    pub fn reduce(&self, ct: &mut Ciphertext) {
        for part in ct.parts_mut() {
            part.reduce();
        }
    }

    pub fn neg(&self, ct: &Ciphertext) -> Ciphertext {
        let mut out = ct.clone();
        for part in out.parts_mut() {
            part.neg_assign();
        }
        out
    }

    /// Multiplies by a non-negative integer; the scale is unchanged.
    pub fn mul_scalar(&self, ct: &Ciphertext, scalar: u64) -> Ciphertext {
        let mut out = ct.clone();
        self.mul_scalar_assign(&mut out, scalar);
        out
    }

    pub fn mul_scalar_assign(&self, ct: &mut Ciphertext, scalar: u64) {
        for part in ct.parts_mut() {
            part.mul_scalar_assign(scalar);
        }
    }

    pub fn transform_to_ntt(&self, ct: &mut Ciphertext) {
        for part in ct.parts_mut() {
            part.to_ntt_domain();
        }
    }

    pub fn transform_to_coeff(&self, ct: &mut Ciphertext) {
        for part in ct.parts_mut() {
            part.to_coeff_domain();
        }
    }

    // ─── Levels ───────────────────────────────────────────────────────────────

    /// Divides by the last prime with rounding and drops it.
    pub fn mod_switch(&self, ct: &mut Ciphertext) -> EvalResult<()> {
        self.mod_switch_many(ct, 1)
    }

    /// Divides by the last `count` primes with rounding, one at a time.
    pub fn mod_switch_many(&self, ct: &mut Ciphertext, count: usize) -> EvalResult<()> {
        if count == 0 {
            return Ok(());
        }
        let level = ct.level();
        if count > level {
            return Err(EvalError::LevelExhausted {
                requested: count,
                level,
            });
        }
        let target = self.ctx.q_basis(level - count);
        for part in ct.parts_mut() {
            part.div_round_by_last_many(count)?;
            part.truncate_to(target)?;
        }
        Ok(())
    }

    /// Discards the last `count` limbs without dividing.
    pub fn drop_levels(&self, ct: &mut Ciphertext, count: usize) -> EvalResult<()> {
        if count == 0 {
            return Ok(());
        }
        let level = ct.level();
        if count > level {
            return Err(EvalError::LevelExhausted {
                requested: count,
                level,
            });
        }
        let target = self.ctx.q_basis(level - count);
        for part in ct.parts_mut() {
            part.truncate_to(target)?;
        }
        Ok(())
    }

    // ─── Relinearization and automorphisms ────────────────────────────────────

    pub fn relinearize(&self, ct: &mut Ciphertext) -> EvalResult<()> {
        match ct.degree() {
            1 => Ok(()),
            2 => {
                let key = self.keys.relinearization()?;
                let mut c2 = ct.part(2).clone();
                c2.to_ntt_domain();
                let [k0, k1] = self.switch_key(&c2, key)?;
                ct.truncate_parts(2);
                let parts = ct.parts_mut();
                parts[0].to_ntt_domain();
                parts[1].to_ntt_domain();
                parts[0].add_assign(&k0)?;
                parts[1].add_assign(&k1)?;
                Ok(())
            }
            degree => Err(EvalError::InsufficientRelinearizationKey { degree }),
        }
    }

    /// Applies `X -> X^galois` and switches back to the original key.
    pub fn apply_galois(&self, ct: &Ciphertext, galois: usize) -> EvalResult<Ciphertext> {
        if galois == 1 {
            return Ok(ct.clone());
        }
        if ct.degree() != 1 {
            return Err(EvalError::DegreeMismatch {
                expected: 1,
                actual: ct.degree(),
            });
        }
        let key = self
            .keys
            .galois(galois)
            .map_err(|_| EvalError::MissingGaloisKey { element: galois })?;
        let mut c0 = ct.part(0).automorphism(galois)?;
        let mut c1 = ct.part(1).automorphism(galois)?;
        c0.to_ntt_domain();
        c1.to_ntt_domain();
        let [k0, k1] = self.switch_key(&c1, key)?;
        c0.add_assign(&k0)?;
        Ok(Ciphertext::new(vec![c0, k1], ct.scale())?)
    }

    // ─── Helpers ──────────────────────────────────────────────────────────────

    pub(crate) fn check_same_level(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<()> {
        if a.level() != b.level() {
            return Err(EvalError::LevelMismatch {
                left: a.level(),
                right: b.level(),
            });
        }
        Ok(())
    }

    fn check_binary(&self, a: &Ciphertext, b: &Ciphertext) -> EvalResult<()> {
        self.check_same_level(a, b)?;
        check_scales(a.scale(), b.scale())
    }
}

pub(crate) fn check_scales(left: f64, right: f64) -> EvalResult<()> {
    if (left / right - 1.0).abs() > SCALE_TOLERANCE {
        return Err(EvalError::ScaleMismatch { left, right });
    }
    Ok(())
}

/// Appends zero parts so that `ct` has at least degree `degree`.
fn pad_parts(ct: &mut Ciphertext, degree: usize) {
    while ct.degree() < degree {
        let zero = RnsPoly::zero(ct.basis().clone(), ct.is_ntt());
        ct.push_part(zero);
    }
}
