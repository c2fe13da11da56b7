use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::math::{inv_mod, mul_mod};

use super::errors::{RingError, RingResult};
use super::ntt::NttTable;

/// CRT reconstruction constants for a basis.
#[derive(Debug)]
pub struct CrtData {
    /// `Q = prod q_i`.
    pub modulus: BigUint,
    pub half_modulus: BigUint,
    /// `Q / q_i`.
    pub hats: Vec<BigUint>,
    /// `(Q / q_i)^{-1} mod q_i`.
    pub hat_inverses: Vec<u64>,
}

/// RNS basis: distinct NTT-friendly primes with shared NTT tables.
///
/// Invariant: `tables[i].modulus() == moduli[i]` and every table has the
/// basis degree. Sub-bases share the tables through `Arc`.
#[derive(Debug)]
pub struct RnsBasis {
    degree: usize,
    moduli: Vec<u64>,
    tables: Vec<Arc<NttTable>>,
    crt: OnceLock<CrtData>,
}

impl RnsBasis {
    pub fn new(degree: usize, moduli: Vec<u64>) -> RingResult<Self> {
        let tables = moduli
            .iter()
            .map(|&q| NttTable::new(q, degree).map(Arc::new))
            .collect::<RingResult<Vec<_>>>()?;
        Self::from_tables(degree, tables)
    }

    /// Builds a basis from already computed tables.
    pub fn from_tables(degree: usize, tables: Vec<Arc<NttTable>>) -> RingResult<Self> {
        if tables.is_empty() {
            return Err(RingError::EmptyBasis);
        }
        let mut seen = HashSet::new();
        for table in &tables {
            if table.degree() != degree {
                return Err(RingError::DegreeMismatch {
                    expected: degree,
                    actual: table.degree(),
                });
            }
            if !seen.insert(table.modulus()) {
                return Err(RingError::DuplicateModulus {
                    modulus: table.modulus(),
                });
            }
        }
        Ok(Self {
            degree,
            moduli: tables.iter().map(|t| t.modulus()).collect(),
            tables,
            crt: OnceLock::new(),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    pub fn channel_count(&self) -> usize {
        self.moduli.len()
    }

    pub fn ntt_table(&self, channel: usize) -> &NttTable {
        &self.tables[channel]
    }

    pub fn tables(&self) -> &[Arc<NttTable>] {
        &self.tables
    }

    pub fn same_moduli(&self, other: &RnsBasis) -> bool {
        std::ptr::eq(self, other) || (self.degree == other.degree && self.moduli == other.moduli)
    }

    /// Returns a basis with the last `drop_count` channels removed.
    pub fn drop_last(&self, drop_count: usize) -> RingResult<Self> {
        let channel_count = self.channel_count();
        if drop_count >= channel_count {
            return Err(RingError::InvalidModDrop {
                drop_count,
                channel_count,
            });
        }
        Self::from_tables(self.degree, self.tables[..channel_count - drop_count].to_vec())
    }

    /// Concatenates two bases, e.g. `Q_l` with a special or auxiliary basis.
    pub fn concat(&self, other: &RnsBasis) -> RingResult<Self> {
        let mut tables = self.tables.clone();
        tables.extend(other.tables.iter().cloned());
        Self::from_tables(self.degree, tables)
    }

    /// `true` when `self` is a prefix of `other`.
    pub fn is_prefix_of(&self, other: &RnsBasis) -> bool {
        self.degree == other.degree && other.moduli.starts_with(&self.moduli)
    }

    pub fn crt(&self) -> &CrtData {
        self.crt.get_or_init(|| {
            let modulus: BigUint = self.moduli.iter().map(|&q| BigUint::from(q)).product();
            let hats: Vec<BigUint> = self.moduli.iter().map(|&q| &modulus / q).collect();
            let hat_inverses = hats
                .iter()
                .zip(&self.moduli)
                .map(|(hat, &q)| {
                    let reduced = (hat % q).to_u64().unwrap_or_default();
                    inv_mod(reduced, q)
                })
                .collect();
            CrtData {
                half_modulus: &modulus >> 1u32,
                modulus,
                hats,
                hat_inverses,
            }
        })
    }

    /// Product of all moduli.
    pub fn modulus(&self) -> &BigUint {
        &self.crt().modulus
    }

    /// `log2(Q)`, the real-valued bit size of the basis.
    pub fn log_modulus(&self) -> f64 {
        self.moduli.iter().map(|&q| (q as f64).log2()).sum()
    }

    /// Reconstructs `x mod Q` from its residues.
    pub fn compose(&self, residues: &[u64]) -> BigUint {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let crt = self.crt();
        let mut acc = BigUint::zero();
        for ((&r, &q), (hat, &hat_inv)) in residues
            .iter()
            .zip(&self.moduli)
            .zip(crt.hats.iter().zip(&crt.hat_inverses))
        {
            acc += hat * mul_mod(r, hat_inv, q);
        }
        acc % &crt.modulus
    }

    /// Reconstructs `x` as the representative in `(-Q/2, Q/2]`.
    pub fn compose_centered(&self, residues: &[u64]) -> BigInt {
        let crt = self.crt();
        let value = self.compose(residues);
        if value > crt.half_modulus {
            BigInt::from_biguint(Sign::Minus, &crt.modulus - value)
        } else {
            BigInt::from_biguint(Sign::Plus, value)
        }
    }

    /// Residues of a signed integer in every channel.
    pub fn decompose(&self, value: &BigInt) -> Vec<u64> {
        self.moduli
            .iter()
            .map(|&q| {
                let r = value.mod_floor(&BigInt::from(q));
                r.to_u64().unwrap_or_default()
            })
            .collect()
    }
}

/// Rounds `numerator / denominator` to the nearest integer, ties away from zero.
pub fn div_round(numerator: &BigInt, denominator: &BigUint) -> BigInt {
    let d = BigInt::from(denominator.clone());
    let twice: BigInt = numerator * 2 + if numerator.sign() == Sign::Minus { -&d } else { d.clone() };
    let two_d = &d * 2;
    let (q, _) = twice.div_rem(&two_d);
    q
}
