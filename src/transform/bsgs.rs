//! Baby-step giant-step evaluation of a [`DiagonalMatrix`] on a ciphertext.
//!
//! Diagonal `d = g + b` is split into a giant step `g` (a multiple of the
//! baby count) and a baby step `b`, and
//! `Σ_d diag_d ⊙ rot(v, d) = Σ_g rot(Σ_b rot(diag_{g+b}, -g) ⊙ rot(v, b), g)`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::ciphertext::Ciphertext;

use super::diagonal::{DiagonalMatrix, rotate_right};
use super::{TransformError, TransformResult};

/// Slot-domain operations needed to evaluate a matrix.
pub(crate) trait LinearBackend {
    type Elem: Copy + std::fmt::Debug + PartialEq;
    type Plain;

    /// Encodes a diagonal for multiplication with `ct`.
    fn encode(&self, diagonal: &[Self::Elem], ct: &Ciphertext) -> TransformResult<Self::Plain>;
    fn mul_plain(&self, ct: &Ciphertext, plain: &Self::Plain) -> TransformResult<Ciphertext>;
    /// Left rotation by `steps` slots.
    fn rotate(&self, ct: &Ciphertext, steps: usize) -> TransformResult<Ciphertext>;
    fn add_assign(&self, acc: &mut Ciphertext, term: &Ciphertext) -> TransformResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsgsPlan {
    pub baby: usize,
    /// Giant step to the baby steps it combines.
    pub giants: BTreeMap<usize, Vec<usize>>,
}

impl BsgsPlan {
    /// Baby count `ceil(sqrt(ratio * |diagonals|))`, rounded up to a power of
    /// two and capped at `dim`.
    pub fn new(indices: impl IntoIterator<Item = usize>, dim: usize, ratio: f64) -> Self {
        let indices: Vec<usize> = indices.into_iter().collect();
        let wanted = (ratio * indices.len() as f64).sqrt().ceil().max(1.0) as usize;
        let baby = wanted.next_power_of_two().min(dim.max(1));
        let mut giants: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for d in indices {
            giants.entry(d - d % baby).or_default().push(d % baby);
        }
        Self { baby, giants }
    }

    pub fn baby_steps(&self) -> BTreeSet<usize> {
        self.giants.values().flatten().copied().collect()
    }

    /// Non-trivial rotations the plan performs.
    pub fn rotations(&self) -> BTreeSet<usize> {
        self.baby_steps()
            .into_iter()
            .chain(self.giants.keys().copied())
            .filter(|&r| r != 0)
            .collect()
    }
}

pub(crate) fn evaluate<B: LinearBackend>(
    backend: &B,
    matrix: &DiagonalMatrix<B::Elem>,
    ratio: f64,
    ct: &Ciphertext,
) -> TransformResult<Ciphertext> {
    let plan = BsgsPlan::new(matrix.indices(), matrix.dim(), ratio);
    trace!(baby = plan.baby, giants = plan.giants.len(), "bsgs plan");

    let mut babies = BTreeMap::new();
    for b in plan.baby_steps() {
        let rotated = if b == 0 { ct.clone() } else { backend.rotate(ct, b)? };
        babies.insert(b, rotated);
    }

    let mut result: Option<Ciphertext> = None;
    for (&giant, steps) in &plan.giants {
        let mut inner: Option<Ciphertext> = None;
        for &b in steps {
            let Some(diagonal) = matrix.diagonal(giant + b) else {
                continue;
            };
            let plain = backend.encode(&rotate_right(diagonal, giant), ct)?;
            let term = backend.mul_plain(&babies[&b], &plain)?;
            match inner.as_mut() {
                Some(acc) => backend.add_assign(acc, &term)?,
                None => inner = Some(term),
            }
        }
        let Some(mut inner) = inner else { continue };
        if giant != 0 {
            inner = backend.rotate(&inner, giant)?;
        }
        match result.as_mut() {
            Some(acc) => backend.add_assign(acc, &inner)?,
            None => result = Some(inner),
        }
    }
    result.ok_or(TransformError::EmptyMatrix)
}
