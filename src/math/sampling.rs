use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal, uniform::Uniform};

/// Samples `degree` uniform residues in `[0, modulus)`.
///
/// # Panics
///
/// Panics if `modulus == 0`.
pub fn uniform_residues<R: Rng + ?Sized>(degree: usize, modulus: u64, rng: &mut R) -> Vec<u64> {
    let distribution = Uniform::new(0, modulus).unwrap_or_else(|_| {
        panic!("uniform_residues: invalid range [0, {modulus}), modulus must be positive")
    });
    (0..degree).map(|_| distribution.sample(rng)).collect()
}

/// Samples `degree` rounded Gaussian integers with standard deviation `std_dev`.
///
/// Samples are clamped to `±6·std_dev`. A zero deviation yields the zero
/// vector.
///
/// # Panics
///
/// Panics if `std_dev` is negative or not finite.
pub fn gaussian_integers<R: Rng + ?Sized>(degree: usize, std_dev: f64, rng: &mut R) -> Vec<i64> {
    assert!(
        std_dev.is_finite() && std_dev >= 0.0,
        "gaussian_integers: std_dev must be finite and non-negative"
    );
    if std_dev == 0.0 {
        return vec![0; degree];
    }
    let bound = (6.0 * std_dev).ceil();
    let normal = Normal::new(0.0, std_dev)
        .unwrap_or_else(|err| panic!("gaussian_integers: invalid std_dev {std_dev}: {err}"));
    (0..degree)
        .map(|_| normal.sample(rng).clamp(-bound, bound).round() as i64)
        .collect()
}

/// Samples a ternary vector with exactly `hamming_weight` entries in `{-1, 1}`.
///
/// # Panics
///
/// Panics if `hamming_weight > degree`.
pub fn ternary_integers<R: Rng + ?Sized>(
    degree: usize,
    hamming_weight: usize,
    rng: &mut R,
) -> Vec<i64> {
    assert!(
        hamming_weight <= degree,
        "ternary_integers: hamming_weight must be <= degree"
    );
    let mut out = vec![0i64; degree];
    let mut indices: Vec<usize> = (0..degree).collect();
    indices.shuffle(rng);
    for &idx in indices.iter().take(hamming_weight) {
        out[idx] = if rng.random_bool(0.5) { 1 } else { -1 };
    }
    out
}
