//! Half-bootstrapping: lands the coefficients of a low-level ciphertext in
//! the CKKS slots of a fresh, high-level one.

pub mod chebyshev;
pub mod halfboot;
pub mod sine;

use thiserror::Error;

pub use chebyshev::{chebyshev_coefficients, chebyshev_eval};
pub use halfboot::HalfBootstrapper;
pub use sine::SineEvaluator;

pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BootstrapError {
    #[error("repacking {slots} slots needs 2 * slots <= {max}")]
    RepackUnavailable { slots: usize, max: usize },

    #[error("missing evaluation key: {0}")]
    Key(#[from] crate::keys::KeyError),

    #[error("linear transform failed: {0}")]
    Transform(#[from] crate::transform::TransformError),

    #[error("ring error while raising the modulus: {0}")]
    Ring(#[from] crate::rings::RingError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] crate::evaluator::EvalError),
}
