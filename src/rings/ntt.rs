//! Negacyclic number-theoretic transform over `Z_q[X]/(X^N + 1)`.
//!
//! The forward transform twists the input by powers of a primitive `2N`-th
//! root `psi` and runs a cyclic transform with `omega = psi^2`. Output index
//! `k` holds the evaluation at `psi^(2k+1)`, in natural order, which makes
//! Galois automorphisms a plain index permutation.

use crate::math::{bit_len, inv_mod, is_ntt_friendly_prime, mul_mod, pow_mod, reverse_bits};

use super::errors::{RingError, RingResult};

#[derive(Debug, Clone)]
pub struct NttTable {
    modulus: u64,
    degree: usize,
    /// `psi^i` for `i < N`.
    psi_powers: Vec<u64>,
    /// `N^{-1} * psi^{-i}` for `i < N`.
    psi_inv_powers_scaled: Vec<u64>,
    /// `omega^j` for `j < N/2`.
    omega_powers: Vec<u64>,
    omega_inv_powers: Vec<u64>,
}

impl NttTable {
    pub fn new(modulus: u64, degree: usize) -> RingResult<Self> {
        if !degree.is_power_of_two() || degree < 2 {
            return Err(RingError::InvalidDegree { degree });
        }
        if !is_ntt_friendly_prime(modulus, degree as u64) {
            return Err(RingError::NonNttFriendlyModulus { modulus, degree });
        }

        let psi = find_negacyclic_root(modulus, degree);
        let psi_inv = inv_mod(psi, modulus);
        let n_inv = inv_mod(degree as u64, modulus);

        let mut psi_powers = Vec::with_capacity(degree);
        let mut psi_inv_powers_scaled = Vec::with_capacity(degree);
        let (mut fwd, mut inv) = (1u64, n_inv);
        for _ in 0..degree {
            psi_powers.push(fwd);
            psi_inv_powers_scaled.push(inv);
            fwd = mul_mod(fwd, psi, modulus);
            inv = mul_mod(inv, psi_inv, modulus);
        }

        let omega = mul_mod(psi, psi, modulus);
        let omega_inv = mul_mod(psi_inv, psi_inv, modulus);
        let half = degree / 2;
        let mut omega_powers = Vec::with_capacity(half);
        let mut omega_inv_powers = Vec::with_capacity(half);
        let (mut w, mut w_inv) = (1u64, 1u64);
        for _ in 0..half {
            omega_powers.push(w);
            omega_inv_powers.push(w_inv);
            w = mul_mod(w, omega, modulus);
            w_inv = mul_mod(w_inv, omega_inv, modulus);
        }

        Ok(Self {
            modulus,
            degree,
            psi_powers,
            psi_inv_powers_scaled,
            omega_powers,
            omega_inv_powers,
        })
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// `psi^exponent` for any exponent, using `psi^N = -1`.
    pub fn psi_pow(&self, exponent: usize) -> u64 {
        let e = exponent % (2 * self.degree);
        if e < self.degree {
            self.psi_powers[e]
        } else {
            let v = self.psi_powers[e - self.degree];
            if v == 0 { 0 } else { self.modulus - v }
        }
    }

    /// In-place forward transform of a reduced coefficient vector.
    pub fn forward(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        let q = self.modulus;
        for (v, &p) in values.iter_mut().zip(&self.psi_powers) {
            *v = mul_mod(*v, p, q);
        }
        self.cyclic(values, &self.omega_powers);
    }

    /// In-place inverse transform back to coefficients.
    pub fn inverse(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        let q = self.modulus;
        self.cyclic(values, &self.omega_inv_powers);
        for (v, &p) in values.iter_mut().zip(&self.psi_inv_powers_scaled) {
            *v = mul_mod(*v, p, q);
        }
    }

    // Iterative radix-2 Cooley-Tukey, bit-reversed input, natural output.
    fn cyclic(&self, values: &mut [u64], twiddles: &[u64]) {
        let n = self.degree;
        let q = self.modulus;
        let bits = bit_len(n as u64) - 1;
        for i in 0..n {
            let j = reverse_bits(i, bits);
            if i < j {
                values.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for j in 0..half {
                    let w = twiddles[j * stride];
                    let u = values[start + j];
                    let v = mul_mod(values[start + j + half], w, q);
                    values[start + j] = if u + v >= q { u + v - q } else { u + v };
                    values[start + j + half] = if u >= v { u - v } else { u + q - v };
                }
            }
            len <<= 1;
        }
    }
}

/// Index map of the automorphism `X -> X^galois` in the evaluation domain:
/// output slot `k` reads input slot `map[k]`.
pub fn ntt_automorphism_map(degree: usize, galois: usize) -> Vec<usize> {
    let order = 2 * degree;
    (0..degree)
        .map(|k| ((galois * (2 * k + 1)) % order - 1) / 2)
        .collect()
}

/// Finds `psi` with `psi^N = -1`, i.e. a primitive `2N`-th root of unity.
///
/// # Panics
///
/// Cannot panic for an NTT-friendly prime, which always has such a root.
fn find_negacyclic_root(modulus: u64, degree: usize) -> u64 {
    let exponent = (modulus - 1) / (2 * degree as u64);
    for candidate in 2..modulus {
        let root = pow_mod(candidate, exponent, modulus);
        if pow_mod(root, degree as u64, modulus) == modulus - 1 {
            return root;
        }
    }
    panic!("find_negacyclic_root: no root of order {} modulo {modulus}", 2 * degree);
}
