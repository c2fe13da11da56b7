//! Plaintext forms of the FV and CKKS sides.

use crate::rings::RnsPoly;

/// `N` polynomial coefficients modulo `t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextRingT {
    pub coeffs: Vec<u64>,
}

/// `round(Q_l * m / t)` over `Q_l`, NTT form. Directly addable to ciphertexts.
#[derive(Debug, Clone)]
pub struct PlaintextScaled {
    pub poly: RnsPoly,
}

/// `m` over `Q_l`, NTT form, unscaled. Operand of plaintext multiplication.
#[derive(Debug, Clone)]
pub struct PlaintextMul {
    pub poly: RnsPoly,
}

/// CKKS plaintext: integer polynomial and the scale it carries.
#[derive(Debug, Clone)]
pub struct CkksPlaintext {
    pub poly: RnsPoly,
    pub scale: f64,
}

impl PlaintextScaled {
    pub fn level(&self) -> usize {
        self.poly.channel_count() - 1
    }
}

impl PlaintextMul {
    pub fn level(&self) -> usize {
        self.poly.channel_count() - 1
    }
}

impl CkksPlaintext {
    pub fn level(&self) -> usize {
        self.poly.channel_count() - 1
    }
}
