use std::sync::Arc;

use crate::rings::{RingError, RingResult, RnsBasis, RnsPoly};

/// Ciphertext `(c_0, …, c_d)` decrypting as `sum c_i s^i`.
///
/// # Invariants
/// - at least one part
/// - all parts share one basis and one domain
/// - `scale` is only meaningful on the CKKS side
#[derive(Debug, Clone)]
pub struct Ciphertext {
    parts: Vec<RnsPoly>,
    scale: f64,
}

impl Ciphertext {
    pub fn new(parts: Vec<RnsPoly>, scale: f64) -> RingResult<Self> {
        let first = parts.first().ok_or(RingError::EmptyBasis)?;
        for part in &parts[1..] {
            if !part.basis().same_moduli(first.basis()) {
                return Err(RingError::BasisMismatch);
            }
            if part.is_ntt_domain() != first.is_ntt_domain() {
                return Err(RingError::DomainMismatch {
                    expected_ntt: first.is_ntt_domain(),
                });
            }
        }
        Ok(Self { parts, scale })
    }

    /// Degree-1 encryption of zero with both parts zero.
    pub fn zero(basis: Arc<RnsBasis>, scale: f64) -> Self {
        let zero = RnsPoly::zero(basis, true);
        Self {
            parts: vec![zero.clone(), zero],
            scale,
        }
    }

    pub fn level(&self) -> usize {
        self.parts[0].channel_count() - 1
    }

    /// Number of parts minus one.
    pub fn degree(&self) -> usize {
        self.parts.len() - 1
    }

    pub fn is_ntt(&self) -> bool {
        self.parts[0].is_ntt_domain()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    pub fn basis(&self) -> &Arc<RnsBasis> {
        self.parts[0].basis()
    }

    pub fn parts(&self) -> &[RnsPoly] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [RnsPoly] {
        &mut self.parts
    }

    pub fn part(&self, index: usize) -> &RnsPoly {
        &self.parts[index]
    }

    pub fn into_parts(self) -> Vec<RnsPoly> {
        self.parts
    }

    pub(crate) fn push_part(&mut self, part: RnsPoly) {
        self.parts.push(part);
    }

    pub(crate) fn truncate_parts(&mut self, count: usize) {
        self.parts.truncate(count);
    }
}
