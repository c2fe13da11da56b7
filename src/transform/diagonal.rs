//! Square matrices stored by their non-zero generalized diagonals.
//!
//! Diagonal `d` holds `M[j][(j + d) mod dim]` at position `j`, so that
//! `(M v)[j] = Σ_d diag_d[j] * v[j + d]` and every diagonal pairs with a left
//! rotation of `v` by `d` slots.

use std::collections::BTreeMap;
use std::fmt::Debug;

use num_complex::Complex64;

use crate::math::{add_mod, inv_mod, mul_mod, neg_mod, sub_mod};

/// Scalar arithmetic of the slot domain a matrix acts on.
pub trait SlotArith {
    type Elem: Copy + Debug + PartialEq;

    fn zero(&self) -> Self::Elem;
    fn one(&self) -> Self::Elem;
    /// Multiplicative inverse of two.
    fn half(&self) -> Self::Elem;
    fn add(&self, a: Self::Elem, b: Self::Elem) -> Self::Elem;
    fn sub(&self, a: Self::Elem, b: Self::Elem) -> Self::Elem;
    fn mul(&self, a: Self::Elem, b: Self::Elem) -> Self::Elem;
    fn neg(&self, a: Self::Elem) -> Self::Elem;
    fn is_zero(&self, a: Self::Elem) -> bool;
}

/// `Z_t` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZtArith {
    pub modulus: u64,
}

impl SlotArith for ZtArith {
    type Elem = u64;

    fn zero(&self) -> u64 {
        0
    }

    fn one(&self) -> u64 {
        1
    }

    fn half(&self) -> u64 {
        inv_mod(2, self.modulus)
    }

    fn add(&self, a: u64, b: u64) -> u64 {
        add_mod(a, b, self.modulus)
    }

    fn sub(&self, a: u64, b: u64) -> u64 {
        sub_mod(a, b, self.modulus)
    }

    fn mul(&self, a: u64, b: u64) -> u64 {
        mul_mod(a, b, self.modulus)
    }

    fn neg(&self, a: u64) -> u64 {
        neg_mod(a, self.modulus)
    }

    fn is_zero(&self, a: u64) -> bool {
        a == 0
    }
}

/// Both FV rows at once: component `r` acts on row `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPairArith(pub ZtArith);

impl SlotArith for RowPairArith {
    type Elem = [u64; 2];

    fn zero(&self) -> [u64; 2] {
        [0, 0]
    }

    fn one(&self) -> [u64; 2] {
        [1, 1]
    }

    fn half(&self) -> [u64; 2] {
        let h = self.0.half();
        [h, h]
    }

    fn add(&self, a: [u64; 2], b: [u64; 2]) -> [u64; 2] {
        [self.0.add(a[0], b[0]), self.0.add(a[1], b[1])]
    }

    fn sub(&self, a: [u64; 2], b: [u64; 2]) -> [u64; 2] {
        [self.0.sub(a[0], b[0]), self.0.sub(a[1], b[1])]
    }

    fn mul(&self, a: [u64; 2], b: [u64; 2]) -> [u64; 2] {
        [self.0.mul(a[0], b[0]), self.0.mul(a[1], b[1])]
    }

    fn neg(&self, a: [u64; 2]) -> [u64; 2] {
        [self.0.neg(a[0]), self.0.neg(a[1])]
    }

    fn is_zero(&self, a: [u64; 2]) -> bool {
        a == [0, 0]
    }
}

/// Complex slots. Entries below `1e-12` in magnitude count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplexArith;

impl SlotArith for ComplexArith {
    type Elem = Complex64;

    fn zero(&self) -> Complex64 {
        Complex64::new(0.0, 0.0)
    }

    fn one(&self) -> Complex64 {
        Complex64::new(1.0, 0.0)
    }

    fn half(&self) -> Complex64 {
        Complex64::new(0.5, 0.0)
    }

    fn add(&self, a: Complex64, b: Complex64) -> Complex64 {
        a + b
    }

    fn sub(&self, a: Complex64, b: Complex64) -> Complex64 {
        a - b
    }

    fn mul(&self, a: Complex64, b: Complex64) -> Complex64 {
        a * b
    }

    fn neg(&self, a: Complex64) -> Complex64 {
        -a
    }

    fn is_zero(&self, a: Complex64) -> bool {
        a.norm() < 1e-12
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalMatrix<E> {
    dim: usize,
    diagonals: BTreeMap<usize, Vec<E>>,
}

impl<E: Copy + Debug + PartialEq> DiagonalMatrix<E> {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            diagonals: BTreeMap::new(),
        }
    }

    pub fn identity<A: SlotArith<Elem = E>>(dim: usize, arith: &A) -> Self {
        let mut m = Self::new(dim);
        m.diagonals.insert(0, vec![arith.one(); dim]);
        m
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Rotation indices of the stored diagonals, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.diagonals.keys().copied()
    }

    pub fn diagonal(&self, index: usize) -> Option<&[E]> {
        self.diagonals.get(&index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.diagonals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagonals.is_empty()
    }

    /// `M[row][col] += value`.
    pub fn add_entry<A: SlotArith<Elem = E>>(&mut self, arith: &A, row: usize, col: usize, value: E) {
        let d = (col + self.dim - row) % self.dim;
        let diagonal = self
            .diagonals
            .entry(d)
            .or_insert_with(|| vec![arith.zero(); self.dim]);
        diagonal[row] = arith.add(diagonal[row], value);
    }

    /// `self * rhs`: applies `rhs` first.
    pub fn compose<A: SlotArith<Elem = E>>(&self, rhs: &Self, arith: &A) -> Self {
        debug_assert_eq!(self.dim, rhs.dim);
        let dim = self.dim;
        let mut out = Self::new(dim);
        for (&d1, a) in &self.diagonals {
            for (&d2, b) in &rhs.diagonals {
                let d = (d1 + d2) % dim;
                let target = out
                    .diagonals
                    .entry(d)
                    .or_insert_with(|| vec![arith.zero(); dim]);
                for j in 0..dim {
                    let term = arith.mul(a[j], b[(j + d1) % dim]);
                    target[j] = arith.add(target[j], term);
                }
            }
        }
        out.prune(arith);
        out
    }

    /// Plain matrix-vector product.
    pub fn apply<A: SlotArith<Elem = E>>(&self, v: &[E], arith: &A) -> Vec<E> {
        let dim = self.dim;
        let mut out = vec![arith.zero(); dim];
        for (&d, diagonal) in &self.diagonals {
            for j in 0..dim {
                out[j] = arith.add(out[j], arith.mul(diagonal[j], v[(j + d) % dim]));
            }
        }
        out
    }

    /// Multiplies row `j` by `factors[j]`.
    pub fn premultiply<A: SlotArith<Elem = E>>(&mut self, factors: &[E], arith: &A) {
        for diagonal in self.diagonals.values_mut() {
            for (x, &f) in diagonal.iter_mut().zip(factors) {
                *x = arith.mul(*x, f);
            }
        }
        self.prune(arith);
    }

    /// Same operator on vectors of period `self.dim` stored in `dim` slots.
    pub fn extend_periodic(&self, dim: usize) -> Self {
        debug_assert!(dim % self.dim == 0);
        let diagonals = self
            .diagonals
            .iter()
            .map(|(&d, diagonal)| (d, (0..dim).map(|j| diagonal[j % self.dim]).collect()))
            .collect();
        Self { dim, diagonals }
    }

    /// Zeroes the rows rejected by `keep`.
    pub fn mask_rows<A: SlotArith<Elem = E>>(&mut self, keep: impl Fn(usize) -> bool, arith: &A) {
        for diagonal in self.diagonals.values_mut() {
            for (j, x) in diagonal.iter_mut().enumerate() {
                if !keep(j) {
                    *x = arith.zero();
                }
            }
        }
        self.prune(arith);
    }

    fn prune<A: SlotArith<Elem = E>>(&mut self, arith: &A) {
        self.diagonals
            .retain(|_, diagonal| diagonal.iter().any(|&x| !arith.is_zero(x)));
    }
}

/// `v` rotated right by `steps`: entry `j` reads `v[j - steps]`.
pub fn rotate_right<E: Copy>(v: &[E], steps: usize) -> Vec<E> {
    let dim = v.len();
    (0..dim).map(|j| v[(j + dim - steps % dim) % dim]).collect()
}
