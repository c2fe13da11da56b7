use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rand::Rng;

use crate::math::{
    add_mod, center, inv_mod, mul_mod, neg_mod, reduce_signed, sub_mod, uniform_residues,
};

use super::basis::RnsBasis;
use super::errors::{RingError, RingResult};
use super::ntt::ntt_automorphism_map;

/// A polynomial in `Z_{q_0} x … x Z_{q_l}[X] / (X^N + 1)`.
///
/// Stores one residue vector per RNS channel. `in_ntt_domain` tracks whether
/// the vectors hold coefficients or evaluations.
///
/// # Invariants
/// - `channels.len() == basis.channel_count()`
/// - every channel has `basis.degree()` entries
/// - entries are reduced, except between `add_assign_lazy` and `reduce`
#[derive(Clone, Debug)]
pub struct RnsPoly {
    channels: Vec<Vec<u64>>,
    basis: Arc<RnsBasis>,
    in_ntt_domain: bool,
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl RnsPoly {
    pub fn zero(basis: Arc<RnsBasis>, in_ntt_domain: bool) -> Self {
        let channels = vec![vec![0u64; basis.degree()]; basis.channel_count()];
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }

    /// Creates a coefficient-domain polynomial from signed coefficients.
    ///
    /// # Panics
    ///
    /// Panics if `coeffs.len()` differs from the ring degree.
    pub fn from_signed(coeffs: &[i64], basis: Arc<RnsBasis>) -> Self {
        assert_eq!(
            coeffs.len(),
            basis.degree(),
            "from_signed: expected {} coefficients",
            basis.degree()
        );
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| coeffs.iter().map(|&c| reduce_signed(c, q)).collect())
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Creates a coefficient-domain polynomial from arbitrary-precision coefficients.
    pub fn from_bigints(coeffs: &[BigInt], basis: Arc<RnsBasis>) -> RingResult<Self> {
        if coeffs.len() != basis.degree() {
            return Err(RingError::DegreeMismatch {
                expected: basis.degree(),
                actual: coeffs.len(),
            });
        }
        let mut channels = vec![Vec::with_capacity(basis.degree()); basis.channel_count()];
        for coeff in coeffs {
            for (channel, residue) in channels.iter_mut().zip(basis.decompose(coeff)) {
                channel.push(residue);
            }
        }
        Ok(Self {
            channels,
            basis,
            in_ntt_domain: false,
        })
    }

    /// Creates a polynomial from pre-built channels, validating shape and reduction.
    pub fn from_channels(
        channels: Vec<Vec<u64>>,
        basis: Arc<RnsBasis>,
        in_ntt_domain: bool,
    ) -> RingResult<Self> {
        let expected = basis.channel_count();
        if channels.len() != expected {
            return Err(RingError::ChannelCountMismatch {
                expected,
                actual: channels.len(),
            });
        }
        for (channel, &q) in channels.iter().zip(basis.moduli()) {
            if channel.len() != basis.degree() {
                return Err(RingError::DegreeMismatch {
                    expected: basis.degree(),
                    actual: channel.len(),
                });
            }
            if let Some(&c) = channel.iter().find(|&&c| c >= q) {
                return Err(RingError::NonReducedCoefficient {
                    coefficient: c,
                    modulus: q,
                });
            }
        }
        Ok(Self {
            channels,
            basis,
            in_ntt_domain,
        })
    }

    /// Samples a uniform polynomial. Uniform residues are uniform in either
    /// domain, so the result is simply labelled with `in_ntt_domain`.
    pub fn sample_uniform<R: Rng + ?Sized>(
        basis: Arc<RnsBasis>,
        in_ntt_domain: bool,
        rng: &mut R,
    ) -> Self {
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| uniform_residues(basis.degree(), q, rng))
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }
}

// ─── Accessors & domain conversion ───────────────────────────────────────────

impl RnsPoly {
    pub fn channels(&self) -> &[Vec<u64>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> &[u64] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [u64] {
        &mut self.channels[index]
    }

    pub fn basis(&self) -> &Arc<RnsBasis> {
        &self.basis
    }

    pub fn degree(&self) -> usize {
        self.basis.degree()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_ntt_domain(&self) -> bool {
        self.in_ntt_domain
    }

    /// Converts to the NTT domain in place (no-op if already there).
    pub fn to_ntt_domain(&mut self) {
        if self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(ch).forward(channel);
        }
        self.in_ntt_domain = true;
    }

    /// Converts to the coefficient domain in place (no-op if already there).
    pub fn to_coeff_domain(&mut self) {
        if !self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(ch).inverse(channel);
        }
        self.in_ntt_domain = false;
    }

    /// CRT-reconstructs every coefficient, centered in `(-Q/2, Q/2]`.
    pub fn to_bigints_centered(&self) -> Vec<BigInt> {
        let mut tmp;
        let source = if self.in_ntt_domain {
            tmp = self.clone();
            tmp.to_coeff_domain();
            &tmp
        } else {
            self
        };
        let mut residues = vec![0u64; self.channel_count()];
        (0..self.degree())
            .map(|i| {
                for (r, channel) in residues.iter_mut().zip(&source.channels) {
                    *r = channel[i];
                }
                self.basis.compose_centered(&residues)
            })
            .collect()
    }

    fn check_compatible(&self, rhs: &RnsPoly) -> RingResult<()> {
        if !self.basis.same_moduli(&rhs.basis) {
            return Err(RingError::BasisMismatch);
        }
        if self.in_ntt_domain != rhs.in_ntt_domain {
            return Err(RingError::DomainMismatch {
                expected_ntt: self.in_ntt_domain,
            });
        }
        Ok(())
    }
}

// ─── Arithmetic ───────────────────────────────────────────────────────────────

impl RnsPoly {
    pub fn add_assign(&mut self, rhs: &RnsPoly) -> RingResult<()> {
        self.check_compatible(rhs)?;
        for ((channel, other), &q) in self.channels.iter_mut().zip(&rhs.channels).zip(self.basis.moduli()) {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = add_mod(*a, b, q);
            }
        }
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: &RnsPoly) -> RingResult<()> {
        self.check_compatible(rhs)?;
        for ((channel, other), &q) in self.channels.iter_mut().zip(&rhs.channels).zip(self.basis.moduli()) {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = sub_mod(*a, b, q);
            }
        }
        Ok(())
    }

    /// Adds without reducing. Entries may grow past the modulus until `reduce`.
    pub fn add_assign_lazy(&mut self, rhs: &RnsPoly) -> RingResult<()> {
        self.check_compatible(rhs)?;
        for (channel, other) in self.channels.iter_mut().zip(&rhs.channels) {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a += b;
            }
        }
        Ok(())
    }

    /// Subtracts without reducing by adding `q - b`.
    pub fn sub_assign_lazy(&mut self, rhs: &RnsPoly) -> RingResult<()> {
        self.check_compatible(rhs)?;
        for ((channel, other), &q) in self.channels.iter_mut().zip(&rhs.channels).zip(self.basis.moduli()) {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a += q - b % q;
            }
        }
        Ok(())
    }

    /// Brings lazily accumulated entries back into `[0, q)`.
    pub fn reduce(&mut self) {
        for (channel, &q) in self.channels.iter_mut().zip(self.basis.moduli()) {
            for a in channel.iter_mut() {
                if *a >= q {
                    *a %= q;
                }
            }
        }
    }

    pub fn neg_assign(&mut self) {
        for (channel, &q) in self.channels.iter_mut().zip(self.basis.moduli()) {
            for a in channel.iter_mut() {
                *a = neg_mod(*a, q);
            }
        }
    }

    /// Pointwise product; both operands must be in the NTT domain.
    pub fn mul_assign_ntt(&mut self, rhs: &RnsPoly) -> RingResult<()> {
        self.check_compatible(rhs)?;
        if !self.in_ntt_domain {
            return Err(RingError::DomainMismatch { expected_ntt: true });
        }
        for ((channel, other), &q) in self.channels.iter_mut().zip(&rhs.channels).zip(self.basis.moduli()) {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = mul_mod(*a, b, q);
            }
        }
        Ok(())
    }

    /// `acc += a * b` pointwise in the NTT domain.
    pub fn mul_add_assign_ntt(&mut self, a: &RnsPoly, b: &RnsPoly) -> RingResult<()> {
        self.check_compatible(a)?;
        a.check_compatible(b)?;
        if !self.in_ntt_domain {
            return Err(RingError::DomainMismatch { expected_ntt: true });
        }
        for (ch, &q) in self.basis.moduli().iter().enumerate() {
            for ((acc, &x), &y) in self.channels[ch].iter_mut().zip(&a.channels[ch]).zip(&b.channels[ch]) {
                *acc = add_mod(*acc, mul_mod(x, y, q), q);
            }
        }
        Ok(())
    }

    /// Multiplies by a non-negative integer constant, reduced per channel.
    pub fn mul_scalar_assign(&mut self, scalar: u64) {
        for (channel, &q) in self.channels.iter_mut().zip(self.basis.moduli()) {
            let s = scalar % q;
            for a in channel.iter_mut() {
                *a = mul_mod(*a, s, q);
            }
        }
    }

    /// Multiplies by a signed arbitrary-precision constant.
    pub fn mul_bigint_assign(&mut self, scalar: &BigInt) {
        let residues = self.basis.decompose(scalar);
        self.mul_residues_assign(&residues);
    }

    /// Multiplies channel `i` by `residues[i]`.
    pub fn mul_residues_assign(&mut self, residues: &[u64]) {
        debug_assert_eq!(residues.len(), self.channel_count());
        for ((channel, &q), &s) in self.channels.iter_mut().zip(self.basis.moduli()).zip(residues) {
            for a in channel.iter_mut() {
                *a = mul_mod(*a, s, q);
            }
        }
    }

    /// Multiplies by the monomial `X^power`, in either domain.
    pub fn mul_monomial_assign(&mut self, power: usize) {
        let n = self.degree();
        let power = power % (2 * n);
        if self.in_ntt_domain {
            for (ch, channel) in self.channels.iter_mut().enumerate() {
                let table = self.basis.ntt_table(ch);
                for (k, a) in channel.iter_mut().enumerate() {
                    *a = mul_mod(*a, table.psi_pow(power * (2 * k + 1)), table.modulus());
                }
            }
            return;
        }
        for (channel, &q) in self.channels.iter_mut().zip(self.basis.moduli()) {
            let mut out = vec![0u64; n];
            for (i, &a) in channel.iter().enumerate() {
                let target = (i + power) % (2 * n);
                if target < n {
                    out[target] = a;
                } else {
                    out[target - n] = neg_mod(a, q);
                }
            }
            *channel = out;
        }
    }

    /// Applies `X -> X^galois` in the current domain.
    pub fn automorphism(&self, galois: usize) -> RingResult<RnsPoly> {
        let n = self.degree();
        let order = 2 * n;
        if galois % 2 == 0 || galois >= order {
            return Err(RingError::InvalidGaloisElement {
                element: galois,
                order,
            });
        }
        let mut out = RnsPoly::zero(self.basis.clone(), self.in_ntt_domain);
        if self.in_ntt_domain {
            let map = ntt_automorphism_map(n, galois);
            for (dst, src) in out.channels.iter_mut().zip(&self.channels) {
                for (d, &from) in dst.iter_mut().zip(&map) {
                    *d = src[from];
                }
            }
        } else {
            for ((dst, src), &q) in out.channels.iter_mut().zip(&self.channels).zip(self.basis.moduli()) {
                for (i, &a) in src.iter().enumerate() {
                    let target = (i * galois) % order;
                    if target < n {
                        dst[target] = a;
                    } else {
                        dst[target - n] = neg_mod(a, q);
                    }
                }
            }
        }
        Ok(out)
    }
}

// ─── Basis changes ────────────────────────────────────────────────────────────

impl RnsPoly {
    /// Discards the last `drop_count` channels without dividing.
    pub fn drop_last(&mut self, drop_count: usize) -> RingResult<()> {
        let reduced = Arc::new(self.basis.drop_last(drop_count)?);
        self.channels.truncate(reduced.channel_count());
        self.basis = reduced;
        Ok(())
    }

    /// Restricts to a basis that is a prefix of the current one.
    pub fn truncate_to(&mut self, basis: &Arc<RnsBasis>) -> RingResult<()> {
        if !basis.is_prefix_of(&self.basis) {
            return Err(RingError::NotAnExtension);
        }
        self.channels.truncate(basis.channel_count());
        self.basis = basis.clone();
        Ok(())
    }

    /// Divides by the last prime `q_l` with rounding and drops it:
    /// `a_i <- (a_i - [a]_{q_l}) * q_l^{-1} mod q_i`, with `[a]_{q_l}` centered.
    pub fn div_round_by_last(&mut self) -> RingResult<()> {
        let channel_count = self.channel_count();
        if channel_count < 2 {
            return Err(RingError::InvalidModDrop {
                drop_count: 1,
                channel_count,
            });
        }
        let last = channel_count - 1;
        let q_last = self.basis.moduli()[last];
        let mut tail = self.channels[last].clone();
        if self.in_ntt_domain {
            self.basis.ntt_table(last).inverse(&mut tail);
        }
        let centered: Vec<i64> = tail.iter().map(|&r| center(r, q_last)).collect();

        for ch in 0..last {
            let table = self.basis.ntt_table(ch);
            let q = table.modulus();
            let mut correction: Vec<u64> = centered.iter().map(|&c| reduce_signed(c, q)).collect();
            if self.in_ntt_domain {
                table.forward(&mut correction);
            }
            let q_last_inv = inv_mod(q_last % q, q);
            for (a, &c) in self.channels[ch].iter_mut().zip(&correction) {
                *a = mul_mod(sub_mod(*a, c, q), q_last_inv, q);
            }
        }
        self.drop_last(1)
    }

    /// Repeats `div_round_by_last` `count` times.
    pub fn div_round_by_last_many(&mut self, count: usize) -> RingResult<()> {
        if count >= self.channel_count() {
            return Err(RingError::InvalidModDrop {
                drop_count: count,
                channel_count: self.channel_count(),
            });
        }
        for _ in 0..count {
            self.div_round_by_last()?;
        }
        Ok(())
    }

    /// Lifts a single-channel polynomial to `target` by centering its residue.
    ///
    /// The represented integer in `(-q_0/2, q_0/2]` is unchanged.
    pub fn lift_centered(&self, target: Arc<RnsBasis>) -> RingResult<RnsPoly> {
        if self.channel_count() != 1 {
            return Err(RingError::ChannelCountMismatch {
                expected: 1,
                actual: self.channel_count(),
            });
        }
        if target.moduli().first() != self.basis.moduli().first() {
            return Err(RingError::NotAnExtension);
        }
        let q0 = self.basis.moduli()[0];
        let mut source = self.channels[0].clone();
        if self.in_ntt_domain {
            self.basis.ntt_table(0).inverse(&mut source);
        }
        let centered: Vec<i64> = source.iter().map(|&r| center(r, q0)).collect();
        let mut out = RnsPoly::from_signed(&centered, target);
        if self.in_ntt_domain {
            out.to_ntt_domain();
        }
        Ok(out)
    }

    /// Exact basis extension through CRT: the centered representative modulo
    /// the current basis is re-encoded over `target`, which must extend it.
    pub fn extend_exact(&self, target: Arc<RnsBasis>) -> RingResult<RnsPoly> {
        if !self.basis.is_prefix_of(&target) {
            return Err(RingError::NotAnExtension);
        }
        let coeffs = self.to_bigints_centered();
        let mut out = RnsPoly::from_bigints(&coeffs, target)?;
        if self.in_ntt_domain {
            out.to_ntt_domain();
        }
        Ok(out)
    }

    /// Infinity norm of the centered coefficients, as `f64`.
    pub fn infinity_norm_f64(&self) -> f64 {
        self.to_bigints_centered()
            .iter()
            .map(|c| c.to_f64().map_or(f64::INFINITY, f64::abs))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::generate_ntt_primes;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const N: usize = 16;

    fn basis(bits: &[u32]) -> Arc<RnsBasis> {
        let primes = generate_ntt_primes(bits, N as u64, &[]).unwrap();
        Arc::new(RnsBasis::new(N, primes).unwrap())
    }

    fn signed(poly: &RnsPoly) -> Vec<i64> {
        poly.to_bigints_centered()
            .iter()
            .map(|c| c.to_i64().unwrap())
            .collect()
    }

    #[test]
    fn from_channels_rejects_unreduced_entries() {
        let b = basis(&[30]);
        let q = b.moduli()[0];
        let mut channel = vec![0u64; N];
        channel[3] = q;
        assert!(matches!(
            RnsPoly::from_channels(vec![channel], b, false),
            Err(RingError::NonReducedCoefficient { .. })
        ));
    }

    #[test]
    fn ntt_roundtrip_preserves_coefficients() {
        let b = basis(&[40, 40, 40]);
        let coeffs: Vec<i64> = (0..N as i64).map(|i| i * i - 40).collect();
        let mut poly = RnsPoly::from_signed(&coeffs, b);
        poly.to_ntt_domain();
        poly.to_coeff_domain();
        assert_eq!(signed(&poly), coeffs);
    }

    #[test]
    fn lazy_add_then_reduce_matches_modular_add() {
        let b = basis(&[40, 40]);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let x = RnsPoly::sample_uniform(b.clone(), true, &mut rng);
        let y = RnsPoly::sample_uniform(b, true, &mut rng);
        let mut eager = x.clone();
        let mut lazy = x.clone();
        for _ in 0..8 {
            eager.add_assign(&y).unwrap();
            lazy.add_assign_lazy(&y).unwrap();
        }
        lazy.reduce();
        assert_eq!(eager.channels(), lazy.channels());
    }

    #[test]
    fn mixed_domains_are_rejected() {
        let b = basis(&[40]);
        let mut a = RnsPoly::zero(b.clone(), true);
        let c = RnsPoly::zero(b, false);
        assert!(matches!(
            a.add_assign(&c),
            Err(RingError::DomainMismatch { expected_ntt: true })
        ));
    }

    #[test]
    fn automorphism_agrees_across_domains() {
        let b = basis(&[40, 40]);
        let coeffs: Vec<i64> = (0..N as i64).map(|i| 3 * i - 7).collect();
        let poly = RnsPoly::from_signed(&coeffs, b);
        for galois in [5usize, 25, 2 * N - 1] {
            let coeff_side = poly.automorphism(galois).unwrap();
            let mut ntt = poly.clone();
            ntt.to_ntt_domain();
            let mut ntt_side = ntt.automorphism(galois).unwrap();
            ntt_side.to_coeff_domain();
            assert_eq!(coeff_side.channels(), ntt_side.channels(), "galois {galois}");
        }
    }

    #[test]
    fn automorphism_rejects_even_elements() {
        let b = basis(&[40]);
        let poly = RnsPoly::zero(b, false);
        assert!(matches!(
            poly.automorphism(4),
            Err(RingError::InvalidGaloisElement { element: 4, .. })
        ));
    }

    #[test]
    fn monomial_product_agrees_across_domains() {
        let b = basis(&[40]);
        let coeffs: Vec<i64> = (1..=N as i64).collect();
        let mut coeff_side = RnsPoly::from_signed(&coeffs, b);
        let mut ntt_side = coeff_side.clone();
        ntt_side.to_ntt_domain();
        coeff_side.mul_monomial_assign(N / 2);
        ntt_side.mul_monomial_assign(N / 2);
        ntt_side.to_coeff_domain();
        assert_eq!(coeff_side.channels(), ntt_side.channels());
        let values = signed(&coeff_side);
        assert_eq!(values[N / 2], 1);
        assert_eq!(values[0], -(N as i64 / 2 + 1));
    }

    #[test]
    fn div_round_by_last_rounds_to_nearest() {
        let b = basis(&[40, 30]);
        let q1 = b.moduli()[1] as i64;
        let coeffs: Vec<i64> = (0..N as i64).map(|i| (i - 8) * q1 + (i % 3 - 1) * (q1 / 3)).collect();
        let expected: Vec<i64> = (0..N as i64).map(|i| i - 8).collect();
        for ntt in [false, true] {
            let mut poly = RnsPoly::from_signed(&coeffs, b.clone());
            if ntt {
                poly.to_ntt_domain();
            }
            poly.div_round_by_last().unwrap();
            assert_eq!(poly.channel_count(), 1);
            assert_eq!(signed(&poly), expected);
        }
    }

    #[test]
    fn lift_centered_keeps_small_values() {
        let full = basis(&[40, 40, 40]);
        let mut single = RnsPoly::from_signed(&[-5; N], full.clone());
        single.drop_last(2).unwrap();
        let lifted = single.lift_centered(full).unwrap();
        assert_eq!(signed(&lifted), vec![-5; N]);
    }

    #[test]
    fn extend_exact_preserves_centered_value() {
        let big = basis(&[40, 40, 50, 50]);
        let small = Arc::new(big.drop_last(2).unwrap());
        let coeffs: Vec<i64> = (0..N as i64).map(|i| (i - 8) << 50).collect();
        let poly = RnsPoly::from_signed(&coeffs, small);
        let extended = poly.extend_exact(big).unwrap();
        assert_eq!(signed(&extended), coeffs);
    }
}
