//! NTT-friendly prime search for modulus chains.
//!
//! Primality uses Miller-Rabin with the first twelve prime bases, which is
//! deterministic on the whole `u64` range. Chains are built from primes that
//! sit as close as possible to a power of two, alternating above and below it,
//! so that consecutive CKKS rescalings keep the scale within ~`2^-30` of the
//! nominal power of two.

use std::collections::{HashMap, HashSet};

use super::modular::{mul_mod, pow_mod};

// Deterministic for every n < 3.3 * 10^24.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Largest bit size accepted for a chain prime. Keeping primes below `2^60`
/// leaves four bits of headroom for lazily accumulated limbs.
pub const MAX_CHAIN_PRIME_BITS: u32 = 59;

/// Largest bit size accepted for the special and auxiliary primes, which never
/// take part in lazy accumulation.
pub const MAX_AUX_PRIME_BITS: u32 = 61;

/// Returns `true` if `n` is prime.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n % 2 == 0 => return false,
        _ => {}
    }
    let mut d = n - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }
    'witness: for &a in &WITNESSES {
        if a % n == 0 {
            continue;
        }
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// `true` when `p` is prime and `p = 1 (mod 2n)`, i.e. `Z_p` holds a primitive
/// `2n`-th root of unity for the negacyclic NTT of degree `n`.
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    match n.checked_mul(2) {
        Some(order) if order > 0 => p % order == 1 && is_prime(p),
        _ => false,
    }
}

/// Smallest NTT-friendly prime `p > 2^logq`.
///
/// Returns `None` when the search would leave the `u64` range.
pub fn get_first_prime_up(logq: u32, n: u64) -> Option<u64> {
    let step = n.checked_mul(2)?;
    if logq >= 63 || step == 0 {
        return None;
    }
    let mut candidate = (1u64 << logq) + 1;
    loop {
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_add(step)?;
    }
}

/// Largest NTT-friendly prime `p < 2^logq`.
pub fn get_first_prime_down(logq: u32, n: u64) -> Option<u64> {
    let step = n.checked_mul(2)?;
    if logq >= 64 || step == 0 || (1u64 << logq) <= step {
        return None;
    }
    let mut candidate = (1u64 << logq) - step + 1;
    loop {
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(step).filter(|&c| c > 2)?;
    }
}

/// Iterator over NTT-friendly primes around `2^bits`, nearest first,
/// alternating between the upper and the lower side.
pub struct PrimesNearPowerOfTwo {
    step: u64,
    above: Option<u64>,
    below: Option<u64>,
    take_above: bool,
}

impl PrimesNearPowerOfTwo {
    pub fn new(bits: u32, degree: u64) -> Self {
        let step = degree * 2;
        let center = 1u64 << bits;
        Self {
            step,
            above: center.checked_add(1),
            below: center.checked_sub(step - 1),
            take_above: true,
        }
    }

    fn advance_above(&mut self) -> Option<u64> {
        while let Some(candidate) = self.above {
            self.above = candidate.checked_add(self.step);
            if is_prime(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn advance_below(&mut self) -> Option<u64> {
        while let Some(candidate) = self.below {
            self.below = candidate.checked_sub(self.step).filter(|&c| c > 2);
            if is_prime(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

impl Iterator for PrimesNearPowerOfTwo {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let prime = if self.take_above {
            self.advance_above().or_else(|| self.advance_below())
        } else {
            self.advance_below().or_else(|| self.advance_above())
        };
        self.take_above = !self.take_above;
        prime
    }
}

/// Generates one distinct NTT-friendly prime per requested bit size.
///
/// Primes listed in `exclude` are skipped, which lets the caller draw the
/// special and auxiliary primes without colliding with the main chain.
/// Returns `None` if some bit size runs out of candidates.
pub fn generate_ntt_primes(bit_sizes: &[u32], degree: u64, exclude: &[u64]) -> Option<Vec<u64>> {
    let mut used: HashSet<u64> = exclude.iter().copied().collect();
    let mut searches: HashMap<u32, PrimesNearPowerOfTwo> = HashMap::new();
    let mut primes = Vec::with_capacity(bit_sizes.len());
    for &bits in bit_sizes {
        let search = searches
            .entry(bits)
            .or_insert_with(|| PrimesNearPowerOfTwo::new(bits, degree));
        let prime = search.find(|p| !used.contains(p))?;
        used.insert(prime);
        primes.push(prime);
    }
    Some(primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_division(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2u64;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    #[test]
    fn miller_rabin_matches_trial_division() {
        for n in (0..2_000u64).chain(1_000_000..1_000_500) {
            assert_eq!(is_prime(n), trial_division(n), "mismatch at {n}");
        }
    }

    #[test]
    fn rejects_carmichael_numbers() {
        for n in [561u64, 1_105, 1_729, 2_465, 3_215_031_751] {
            assert!(!is_prime(n), "expected composite: {n}");
        }
    }

    #[test]
    fn plaintext_modulus_is_batching_friendly() {
        // 268042241 - 1 = 2^17 * 2045
        assert!(is_ntt_friendly_prime(268_042_241, 1 << 16));
        assert!(!is_ntt_friendly_prime(268_042_241, 1 << 17));
    }

    #[test]
    fn first_prime_up_and_down_bracket_power_of_two() {
        let up = get_first_prime_up(40, 32).unwrap();
        let down = get_first_prime_down(40, 32).unwrap();
        assert!(down < 1 << 40 && up > 1 << 40);
        assert!(is_ntt_friendly_prime(up, 32));
        assert!(is_ntt_friendly_prime(down, 32));
    }

    #[test]
    fn near_power_of_two_alternates_sides() {
        let primes: Vec<u64> = PrimesNearPowerOfTwo::new(45, 32).take(4).collect();
        assert!(primes[0] > 1 << 45);
        assert!(primes[1] < 1 << 45);
        assert!(primes[2] > primes[0]);
        assert!(primes[3] < primes[1]);
        for p in primes {
            let drift = (p as f64 / (1u64 << 45) as f64 - 1.0).abs();
            assert!(drift < 1e-6, "prime {p} too far from 2^45");
        }
    }

    #[test]
    fn generated_chain_is_distinct_and_respects_exclusions() {
        let first = generate_ntt_primes(&[45, 45, 45], 64, &[]).unwrap();
        let second = generate_ntt_primes(&[45, 45], 64, &first).unwrap();
        let mut all = first.clone();
        all.extend(&second);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(all.iter().all(|&p| is_ntt_friendly_prime(p, 64)));
    }
}
