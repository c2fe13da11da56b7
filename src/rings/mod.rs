//! RNS polynomial ring `Z_Q[X]/(X^N + 1)` with per-limb NTT.

pub mod basis;
pub mod errors;
pub mod ntt;
pub mod poly;

pub use basis::{CrtData, RnsBasis, div_round};
pub use errors::{RingError, RingResult};
pub use ntt::{NttTable, ntt_automorphism_map};
pub use poly::RnsPoly;
