pub mod bootstrap;
pub mod cipher;
pub mod ciphertext;
pub mod context;
pub mod encoding;
pub mod encryption;
pub mod evaluator;
pub mod keys;
pub mod math;
pub mod noise;
pub mod params;
pub mod plaintext;
pub mod rings;
pub mod scheduler;
pub mod transform;

pub use bootstrap::{BootstrapError, HalfBootstrapper};
pub use cipher::{CipherCircuit, CipherError, CipherKind, CipherParams, HeraCipher, RubatoCipher};
pub use ciphertext::Ciphertext;
pub use context::Context;
pub use encoding::{BatchEncoder, CkksEncoder};
pub use encryption::{Decryptor, Encryptor};
pub use evaluator::{EvalError, Evaluator};
pub use keys::{EvaluationKey, KeyGenerator, SecretKey};
pub use noise::NoiseEstimator;
pub use params::{ModulusSchedule, ParametersLiteral, schedule_for};
pub use transform::{CoeffsToSlots, SlotsToCoeffs};
