//! Read-only tables shared by every evaluator, encoder and key generator.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use tracing::{debug, instrument};

use crate::math::{bit_len, pow_mod};
use crate::params::{ModulusChain, ParameterError, ParameterResult, ParametersLiteral};
use crate::rings::{NttTable, RnsBasis};

/// Ring context: bases per level, FV scaling constants and the plaintext NTT.
///
/// Built once per parameter set and shared behind `Arc`.
#[derive(Debug)]
pub struct Context {
    literal: ParametersLiteral,
    chain: ModulusChain,
    q_bases: Vec<Arc<RnsBasis>>,
    qp_bases: Vec<Arc<RnsBasis>>,
    qb_bases: Vec<Arc<RnsBasis>>,
    special_basis: Arc<RnsBasis>,
    plaintext_table: NttTable,
    /// `floor(Q_l / t) mod q_i` for `i <= l`, per level.
    fv_delta: Vec<Vec<u64>>,
    /// `Q_l mod t`, per level.
    fv_remainder: Vec<u64>,
}

impl Context {
    #[instrument(skip_all, fields(params = literal.name, log_n = literal.log_n))]
    pub fn new(literal: ParametersLiteral) -> ParameterResult<Arc<Self>> {
        literal.validate()?;
        let degree = literal.degree();
        let chain = ModulusChain::generate(&literal)?;

        let full = RnsBasis::new(degree, chain.q.clone())?;
        let special_basis = Arc::new(RnsBasis::new(degree, vec![chain.special])?);
        let aux_basis = RnsBasis::new(degree, chain.aux.clone())?;

        let mut q_bases = Vec::with_capacity(chain.q.len());
        let mut qp_bases = Vec::with_capacity(chain.q.len());
        let mut qb_bases = Vec::with_capacity(chain.q.len());
        for level in 0..chain.q.len() {
            let q = RnsBasis::from_tables(degree, full.tables()[..=level].to_vec())?;
            qp_bases.push(Arc::new(q.concat(&special_basis)?));
            qb_bases.push(Arc::new(q.concat(&aux_basis)?));
            q_bases.push(Arc::new(q));
        }

        let plaintext_table = NttTable::new(literal.t, degree).map_err(|_| {
            ParameterError::PlaintextModulusNotBatching {
                t: literal.t,
                degree,
            }
        })?;

        let fv_remainder = q_bases
            .iter()
            .map(|basis| (basis.modulus() % literal.t).to_u64().unwrap_or_default())
            .collect();

        let fv_delta = q_bases
            .iter()
            .map(|basis| {
                let delta: BigUint = basis.modulus() / literal.t;
                basis
                    .moduli()
                    .iter()
                    .map(|&q| (&delta % q).to_u64().unwrap_or_default())
                    .collect()
            })
            .collect();

        debug!(
            levels = chain.q.len(),
            aux = chain.aux.len(),
            log_q = full.log_modulus(),
            "context built"
        );

        Ok(Arc::new(Self {
            literal,
            chain,
            q_bases,
            qp_bases,
            qb_bases,
            special_basis,
            plaintext_table,
            fv_delta,
            fv_remainder,
        }))
    }

    pub fn literal(&self) -> &ParametersLiteral {
        &self.literal
    }

    pub fn chain(&self) -> &ModulusChain {
        &self.chain
    }

    pub fn degree(&self) -> usize {
        self.literal.degree()
    }

    /// Number of plaintext slots per FV row and of complex CKKS slots at full packing.
    pub fn half_degree(&self) -> usize {
        self.degree() / 2
    }

    /// CKKS slot count used by the half-bootstrap.
    pub fn slots(&self) -> usize {
        self.literal.slots()
    }

    pub fn plaintext_modulus(&self) -> u64 {
        self.literal.t
    }

    pub fn plaintext_table(&self) -> &NttTable {
        &self.plaintext_table
    }

    pub fn max_level(&self) -> usize {
        self.chain.max_level()
    }

    /// `q_0 … q_l`.
    pub fn q_basis(&self, level: usize) -> &Arc<RnsBasis> {
        &self.q_bases[level]
    }

    /// `q_0 … q_l, P`.
    pub fn qp_basis(&self, level: usize) -> &Arc<RnsBasis> {
        &self.qp_bases[level]
    }

    /// `q_0 … q_l, b_0 … b_k`.
    pub fn qb_basis(&self, level: usize) -> &Arc<RnsBasis> {
        &self.qb_bases[level]
    }

    pub fn special_basis(&self) -> &Arc<RnsBasis> {
        &self.special_basis
    }

    pub fn special_prime(&self) -> u64 {
        self.chain.special
    }

    pub fn prime(&self, index: usize) -> u64 {
        self.chain.q[index]
    }

    pub fn prime_bits(&self, index: usize) -> u32 {
        bit_len(self.chain.q[index])
    }

    /// `log2(Q_l)`.
    pub fn log_modulus(&self, level: usize) -> f64 {
        self.q_bases[level].log_modulus()
    }

    pub fn fv_delta(&self, level: usize) -> &[u64] {
        &self.fv_delta[level]
    }

    pub fn fv_remainder(&self, level: usize) -> u64 {
        self.fv_remainder[level]
    }

    /// Galois element `5^steps mod 2N` of a column rotation by `steps` slots to the left.
    pub fn galois_element(&self, steps: isize) -> usize {
        let half = self.half_degree() as isize;
        let order = 2 * self.degree() as u64;
        let exponent = steps.rem_euclid(half) as u64;
        pow_mod(5, exponent, order) as usize
    }

    /// Galois element of the row swap (FV) and of complex conjugation (CKKS).
    pub fn galois_element_conjugate(&self) -> usize {
        2 * self.degree() - 1
    }
}
