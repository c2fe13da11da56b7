//! Homomorphic linear transforms between slots and coefficients.
//!
//! [`SlotsToCoeffs`] runs on FV ciphertexts over `Z_t` and moves the two
//! slot rows into the polynomial coefficients. [`CoeffsToSlots`] runs on CKKS
//! ciphertexts over `C` and moves the coefficients back into slots, which is
//! the linear half of the half-bootstrap.

pub mod bsgs;
pub mod coeffs_to_slots;
pub mod dft;
pub mod diagonal;
pub mod slots_to_coeffs;

use thiserror::Error;

pub use bsgs::BsgsPlan;
pub use coeffs_to_slots::CoeffsToSlots;
pub use diagonal::{ComplexArith, DiagonalMatrix, RowPairArith, SlotArith, ZtArith};
pub use slots_to_coeffs::SlotsToCoeffs;

pub type TransformResult<T> = Result<T, TransformError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("matrix has no non-zero diagonal")]
    EmptyMatrix,

    #[error("schedule has {actual} transform entries, expected {expected}")]
    ScheduleLength { expected: usize, actual: usize },

    #[error("slot count {slots} must be a power of two no larger than {max}")]
    InvalidSlotCount { slots: usize, max: usize },

    #[error("transform depth {depth} is not in [1, {max}]")]
    InvalidDepth { depth: usize, max: usize },

    #[error("repacking {slots} slots needs 2 * slots <= {max}")]
    RepackUnavailable { slots: usize, max: usize },

    #[error("noise budget exhausted after factor {factor}")]
    NoiseBudgetExhausted { factor: usize },

    #[error("evaluation failed: {0}")]
    Eval(#[from] crate::evaluator::EvalError),

    #[error("encoding failed: {0}")]
    Encoding(#[from] crate::encoding::EncodingError),
}
