use crate::math::generate_ntt_primes;

use super::{ParameterError, ParameterResult, ParametersLiteral};

/// Concrete primes of a parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulusChain {
    /// `q_0 … q_L`, bottom-up.
    pub q: Vec<u64>,
    /// Key-switching special prime `P`.
    pub special: u64,
    /// Auxiliary basis `B` for the exact FV tensor product.
    pub aux: Vec<u64>,
}

impl ModulusChain {
    pub fn generate(literal: &ParametersLiteral) -> ParameterResult<Self> {
        let degree = literal.degree() as u64;
        let chain_bits = literal.chain_bits();
        let q = draw(&chain_bits, degree, &[])?;
        let special = draw(&[literal.special_bits], degree, &q)?[0];

        // B must hold N * Q_L^2 next to Q_L, plus a few bits for degree-2 operands.
        let log_q: f64 = q.iter().map(|&p| (p as f64).log2()).sum();
        let needed = log_q + literal.log_n as f64 + 4.0;
        let aux_count = (needed / (literal.aux_bits as f64 - 1.0)).ceil() as usize;
        let mut taken = q.clone();
        taken.push(special);
        let aux = draw(&vec![literal.aux_bits; aux_count], degree, &taken)?;

        Ok(Self { q, special, aux })
    }

    pub fn max_level(&self) -> usize {
        self.q.len() - 1
    }
}

fn draw(bits: &[u32], degree: u64, exclude: &[u64]) -> ParameterResult<Vec<u64>> {
    generate_ntt_primes(bits, degree, exclude).ok_or_else(|| ParameterError::PrimeSearchExhausted {
        bits: bits.iter().copied().max().unwrap_or_default(),
    })
}
