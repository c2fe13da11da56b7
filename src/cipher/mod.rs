//! Symmetric ciphers of the transciphering pipeline: parameters, the round
//! constant XOF, plaintext references and the homomorphic circuit.

pub mod circuit;
pub mod linear;
pub mod params;
pub mod reference;
pub mod xof;

use thiserror::Error;

pub use circuit::{CipherCircuit, CircuitState};
pub use params::{ALL_CIPHERS, CipherKind, CipherParams, HERA_16, RUBATO_L, RUBATO_M, RUBATO_S};
pub use reference::{HeraCipher, RubatoCipher};

pub type CipherResult<T> = Result<T, CipherError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CipherError {
    #[error("{kind:?} does not support a block size of {blocksize}")]
    UnsupportedBlockSize { kind: CipherKind, blocksize: usize },

    #[error("key has {actual} words, expected {expected}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("plaintext modulus {modulus} must be in [2, 2^{max_bits})")]
    InvalidModulus { modulus: u64, max_bits: u32 },

    #[error("key word {value} is not reduced modulo {modulus}")]
    KeyNotReduced { value: u64, modulus: u64 },

    #[error("got {actual} nonces, expected one per slot ({expected})")]
    NonceCount { expected: usize, actual: usize },

    #[error("schedule starts with {actual} initial drops, circuit is configured for {expected}")]
    ScheduleMismatch { expected: usize, actual: usize },

    #[error("schedule has {actual} cipher entries, expected {expected}")]
    ScheduleLength { expected: usize, actual: usize },

    #[error("circuit state is {state:?}, call reset first")]
    NotInitialized { state: CircuitState },

    #[error("key ciphertexts at level {key} are below the state level {state}")]
    KeyLevelTooLow { key: usize, state: usize },

    #[error("noise budget exhausted after round {round}")]
    NoiseBudgetExhausted { round: usize },

    #[error("{kind:?} has no keystream noise")]
    NoiseNotSupported { kind: CipherKind },

    #[error("noise standard deviation {sigma} is invalid")]
    InvalidNoise { sigma: f64 },

    #[error("evaluation failed: {0}")]
    Eval(#[from] crate::evaluator::EvalError),

    #[error("encoding failed: {0}")]
    Encoding(#[from] crate::encoding::EncodingError),
}
