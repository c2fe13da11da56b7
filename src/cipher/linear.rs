//! Linear layer `MixRows ∘ MixColumns` over a `v x v` state.
//!
//! Wire `row * v + col` holds state entry `(row, col)`. Both mixes apply the
//! same circulant matrix `M[i][j] = first_row[(j - i) mod v]`.

use crate::math::{add_mod, mul_mod};

/// First row of the circulant mixing matrix for side length `dim`.
pub fn circulant_row(dim: usize) -> Option<&'static [u64]> {
    match dim {
        4 => Some(&[2, 3, 1, 1]),
        6 => Some(&[4, 2, 4, 3, 1, 1]),
        8 => Some(&[5, 3, 4, 3, 6, 2, 1, 1]),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixAxis {
    Columns,
    Rows,
}

/// `(input wire, coefficient)` terms of every output wire.
pub fn mix_terms(dim: usize, row: &[u64], axis: MixAxis) -> Vec<Vec<(usize, u64)>> {
    let mut terms = Vec::with_capacity(dim * dim);
    for r in 0..dim {
        for c in 0..dim {
            let wire_terms = (0..dim)
                .map(|k| match axis {
                    MixAxis::Columns => (k * dim + c, row[(k + dim - r) % dim]),
                    MixAxis::Rows => (r * dim + k, row[(k + dim - c) % dim]),
                })
                .collect();
            terms.push(wire_terms);
        }
    }
    terms
}

/// Applies one mix to a plaintext state over `Z_modulus`.
pub fn mix_plain(state: &[u64], terms: &[Vec<(usize, u64)>], modulus: u64) -> Vec<u64> {
    terms
        .iter()
        .map(|wire| {
            wire.iter()
                .fold(0, |acc, &(src, coeff)| add_mod(acc, mul_mod(state[src], coeff, modulus), modulus))
        })
        .collect()
}

/// Precomputed column and row mixes for one side length.
#[derive(Debug, Clone)]
pub struct LinearLayer {
    pub columns: Vec<Vec<(usize, u64)>>,
    pub rows: Vec<Vec<(usize, u64)>>,
}

impl LinearLayer {
    pub fn new(dim: usize) -> Option<Self> {
        let row = circulant_row(dim)?;
        Some(Self {
            columns: mix_terms(dim, row, MixAxis::Columns),
            rows: mix_terms(dim, row, MixAxis::Rows),
        })
    }

    pub fn apply_plain(&self, state: &[u64], modulus: u64) -> Vec<u64> {
        let mixed = mix_plain(state, &self.columns, modulus);
        mix_plain(&mixed, &self.rows, modulus)
    }
}
