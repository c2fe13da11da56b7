//! Slot encoders for both sides of the pipeline.
//!
//! Both encoders use the same slot order: slot `j` of row 0 (and CKKS slot `j`)
//! is the evaluation at `psi^(5^j mod 2N)`, and slot `j` of row 1 (the CKKS
//! conjugate) is the evaluation at `psi^(-5^j mod 2N)`.

pub mod batch;
pub mod ckks;

use thiserror::Error;

pub use batch::BatchEncoder;
pub use ckks::CkksEncoder;

pub type EncodingResult<T> = Result<T, EncodingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("input too long: got {got}, max {max}")]
    InputTooLong { got: usize, max: usize },

    #[error("slot count {count} must be a power of two dividing {max}")]
    InvalidSlotCount { count: usize, max: usize },

    #[error("level {level} exceeds the maximum level {max}")]
    LevelOutOfRange { level: usize, max: usize },

    #[error("value {value} is not reduced modulo {modulus}")]
    ValueOutOfRange { value: u64, modulus: u64 },

    #[error("scaled coefficient {value} is not finite")]
    NonFiniteCoefficient { value: f64 },

    #[error("ring error while encoding: {0}")]
    Ring(#[from] crate::rings::RingError),
}

/// Exponent `5^j mod 2N` of every slot `j < N/2`.
pub(crate) fn slot_exponents(degree: usize) -> Vec<usize> {
    let order = 2 * degree;
    let mut exponents = Vec::with_capacity(degree / 2);
    let mut e = 1usize;
    for _ in 0..degree / 2 {
        exponents.push(e);
        e = (e * 5) % order;
    }
    exponents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn slot_exponents_and_conjugates_cover_all_odd_residues() {
        let degree = 32;
        let mut seen = HashSet::new();
        for e in slot_exponents(degree) {
            assert!(seen.insert(e));
            assert!(seen.insert(2 * degree - e));
        }
        assert_eq!(seen.len(), degree);
        assert!(seen.iter().all(|e| e % 2 == 1));
    }
}
