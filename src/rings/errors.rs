use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("ring degree must be a power of two, got {degree}")]
    InvalidDegree { degree: usize },
    #[error("RNS basis must contain at least one modulus")]
    EmptyBasis,
    #[error("modulus {modulus} is not NTT-friendly for degree {degree}")]
    NonNttFriendlyModulus { modulus: u64, degree: usize },
    #[error("modulus {modulus} appears more than once in the basis")]
    DuplicateModulus { modulus: u64 },
    #[error("invalid mod-drop count {drop_count} for {channel_count} channels")]
    InvalidModDrop {
        drop_count: usize,
        channel_count: usize,
    },
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },
    #[error("channel length mismatch: expected {expected}, got {actual}")]
    DegreeMismatch { expected: usize, actual: usize },
    #[error("operands are defined over different RNS bases")]
    BasisMismatch,
    #[error("operand domain mismatch: expected ntt = {expected_ntt}")]
    DomainMismatch { expected_ntt: bool },
    #[error("coefficient {coefficient} is not reduced modulo {modulus}")]
    NonReducedCoefficient { coefficient: u64, modulus: u64 },
    #[error("galois element {element} is not odd modulo {order}")]
    InvalidGaloisElement { element: usize, order: usize },
    #[error("target basis does not extend the source basis")]
    NotAnExtension,
}

pub type RingResult<T> = Result<T, RingError>;
