//! Factorization of the slot evaluation matrix.
//!
//! For `dim` slots and a root `w` of order `4·dim`, the evaluation matrix
//! `A[j][k] = w^(5^j · k)` splits as `A = S_l ··· S_1 · BR` with `l = log2(dim)`,
//! `BR` the bit-reversal permutation and
//!
//! ```text
//! S_s = I_{dim/2^s} ⊗ [[I, D_s], [I, -D_s]],   D_s[j] = w^(2^(l-s) · (5^j mod 2^(s+2)))
//! ```
//!
//! `BR` is never evaluated; callers account for the bit-reversed order.
//! Consecutive stages are merged into `depth` factors, each one level deep.

use std::ops::Range;

use num_complex::Complex64;

use crate::math::pow_mod;

use super::diagonal::{DiagonalMatrix, SlotArith};

/// Powers `w^e` for `e < 4·dim` of a root of order `4·dim`.
#[derive(Debug, Clone)]
pub struct RootTable<E> {
    powers: Vec<E>,
}

impl<E: Copy> RootTable<E> {
    pub fn new(powers: Vec<E>) -> Self {
        debug_assert!(powers.len() % 4 == 0);
        Self { powers }
    }

    pub fn order(&self) -> usize {
        self.powers.len()
    }

    pub fn pow(&self, exponent: usize) -> E {
        self.powers[exponent % self.powers.len()]
    }

    pub fn pow_inv(&self, exponent: usize) -> E {
        let order = self.powers.len();
        self.powers[(order - exponent % order) % order]
    }
}

impl RootTable<Complex64> {
    /// `e^(2πi/(4·dim))`.
    pub fn complex(dim: usize) -> Self {
        let order = 4 * dim;
        Self::new(
            (0..order)
                .map(|e| Complex64::from_polar(1.0, 2.0 * std::f64::consts::PI * e as f64 / order as f64))
                .collect(),
        )
    }
}

/// Exponent of `D_s[j]`.
pub fn twiddle_exponent(log_dim: usize, stage: usize, j: usize) -> usize {
    let window = 1u64 << (stage + 2);
    (pow_mod(5, j as u64, window) as usize) << (log_dim - stage)
}

/// Butterfly stage `S_s`.
pub fn forward_stage<A: SlotArith>(arith: &A, roots: &RootTable<A::Elem>, dim: usize, stage: usize) -> DiagonalMatrix<A::Elem> {
    let log_dim = dim.trailing_zeros() as usize;
    let len = 1 << stage;
    let half = len / 2;
    let mut m = DiagonalMatrix::new(dim);
    for start in (0..dim).step_by(len) {
        for j in 0..half {
            let d = roots.pow(twiddle_exponent(log_dim, stage, j));
            let (top, bottom) = (start + j, start + j + half);
            m.add_entry(arith, top, top, arith.one());
            m.add_entry(arith, top, bottom, d);
            m.add_entry(arith, bottom, top, arith.one());
            m.add_entry(arith, bottom, bottom, arith.neg(d));
        }
    }
    m
}

/// `S_s^{-1} = ½ [[I, I], [D_s^{-1}, -D_s^{-1}]]` per block.
pub fn inverse_stage<A: SlotArith>(arith: &A, roots: &RootTable<A::Elem>, dim: usize, stage: usize) -> DiagonalMatrix<A::Elem> {
    let log_dim = dim.trailing_zeros() as usize;
    let len = 1 << stage;
    let half = len / 2;
    let h = arith.half();
    let mut m = DiagonalMatrix::new(dim);
    for start in (0..dim).step_by(len) {
        for j in 0..half {
            let d_inv = arith.mul(h, roots.pow_inv(twiddle_exponent(log_dim, stage, j)));
            let (top, bottom) = (start + j, start + j + half);
            m.add_entry(arith, top, top, h);
            m.add_entry(arith, top, bottom, h);
            m.add_entry(arith, bottom, top, d_inv);
            m.add_entry(arith, bottom, bottom, arith.neg(d_inv));
        }
    }
    m
}

/// Splits stages `1..=log_dim` into `depth` consecutive groups, larger
/// groups first. Groups are empty when `depth > log_dim`.
pub fn stage_groups(log_dim: usize, depth: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::with_capacity(depth);
    let mut next = 1;
    for i in 0..depth {
        let size = log_dim / depth + usize::from(i < log_dim % depth);
        groups.push(next..next + size);
        next += size;
    }
    groups
}

/// Forward factors in application order: the first applies `S_1` onwards.
pub fn forward_factors<A: SlotArith>(
    arith: &A,
    roots: &RootTable<A::Elem>,
    dim: usize,
    depth: usize,
) -> Vec<DiagonalMatrix<A::Elem>> {
    let log_dim = dim.trailing_zeros() as usize;
    stage_groups(log_dim, depth)
        .into_iter()
        .map(|group| {
            group.fold(DiagonalMatrix::identity(dim, arith), |acc, stage| {
                forward_stage(arith, roots, dim, stage).compose(&acc, arith)
            })
        })
        .collect()
}

/// Inverse factors in application order: the first applies `S_l^{-1}`.
pub fn inverse_factors<A: SlotArith>(
    arith: &A,
    roots: &RootTable<A::Elem>,
    dim: usize,
    depth: usize,
) -> Vec<DiagonalMatrix<A::Elem>> {
    let log_dim = dim.trailing_zeros() as usize;
    let mut groups = stage_groups(log_dim, depth);
    groups.reverse();
    groups
        .into_iter()
        .map(|group| {
            group.rev().fold(DiagonalMatrix::identity(dim, arith), |acc, stage| {
                inverse_stage(arith, roots, dim, stage).compose(&acc, arith)
            })
        })
        .collect()
}

/// `v[bitrev(k)]` at position `k`.
pub fn bit_reverse<E: Copy>(v: &[E]) -> Vec<E> {
    let bits = v.len().trailing_zeros();
    (0..v.len())
        .map(|k| v[crate::math::reverse_bits(k, bits)])
        .collect()
}
