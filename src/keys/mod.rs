pub mod evaluation_key;
pub mod secret_key;
pub mod switching_key;

use thiserror::Error;

pub use evaluation_key::{EvaluationKey, KeyGenerator};
pub use secret_key::SecretKey;
pub use switching_key::SwitchingKey;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyError {
    #[error("hamming weight {weight} exceeds ring degree {degree}")]
    InvalidHammingWeight { weight: usize, degree: usize },
    #[error("error standard deviation must be finite and non-negative, got {sigma}")]
    InvalidErrorStd { sigma: f64 },
    #[error("no relinearization key was generated")]
    MissingRelinearizationKey,
    #[error("no galois key for element {element}")]
    MissingGaloisKey { element: usize },
    #[error("ring error during key generation: {0}")]
    Ring(#[from] crate::rings::RingError),
}

pub type KeyResult<T> = Result<T, KeyError>;
