//! Approximate modular reduction: `u -> u - round(u)` for `u` near an integer,
//! through a scaled sine.

use std::f64::consts::PI;

use tracing::debug;

use crate::ciphertext::Ciphertext;
use crate::evaluator::{EvalResult, Evaluator};
use crate::params::{HalfBootParameters, SineType};

use super::chebyshev::{BasisKind, chebyshev_coefficients, chebyshev_eval, evaluate_series};

/// Precomputed polynomials for one [`HalfBootParameters`].
///
/// The input is `w = u / K` in `[-1, 1]`. The Chebyshev interpolant is
/// followed by `double_angle` steps `y <- 2y^2 - c_i` and an optional odd
/// arcsine correction, after which `output_factor() * y ≈ MR * (u - round(u))`.
#[derive(Debug, Clone)]
pub struct SineEvaluator {
    params: HalfBootParameters,
    chebyshev: Vec<f64>,
    double_angle: Vec<f64>,
    arcsine: Option<Vec<f64>>,
}

impl SineEvaluator {
    pub fn new(params: &HalfBootParameters) -> Self {
        let k = params.sine_range;
        let r = params.double_angle as i32;
        let amplitude = match params.sine_type {
            SineType::Cos2 => (2.0 * PI).powf(-1.0 / 2f64.powi(r)),
            _ => 1.0,
        };
        let chebyshev = match params.sine_type {
            SineType::Sin => chebyshev_coefficients(|w| (2.0 * PI * k * w).sin(), params.sine_degree),
            SineType::Cos1 | SineType::Cos2 => chebyshev_coefficients(
                |w| amplitude * (2.0 * PI * (k * w - 0.25) / 2f64.powi(r)).cos(),
                params.sine_degree,
            ),
        };
        let double_angle = (0..params.double_angle)
            .map(|i| match params.sine_type {
                SineType::Cos2 => amplitude.powi(1 << (i + 1)),
                _ => 1.0,
            })
            .collect();
        let arcsine = (params.arcsine_degree > 1).then(|| {
            let alpha = if params.sine_type == SineType::Cos2 { 2.0 * PI } else { 1.0 };
            arcsine_coefficients(params.arcsine_degree, alpha)
        });
        Self {
            params: params.clone(),
            chebyshev,
            double_angle,
            arcsine,
        }
    }

    /// Multiplier taking the last polynomial's output back to message units.
    pub fn output_factor(&self) -> f64 {
        let mr = self.params.message_ratio;
        if self.params.sine_type == SineType::Cos2 && self.arcsine.is_none() {
            mr
        } else {
            mr / (2.0 * PI)
        }
    }

    /// Levels consumed by [`SineEvaluator::evaluate`].
    pub fn depth(&self) -> usize {
        self.params.sine_depth()
    }

    /// The same chain of polynomials on a plain `u`, already multiplied by
    /// [`SineEvaluator::output_factor`].
    pub fn evaluate_plain(&self, u: f64) -> f64 {
        let mut y = chebyshev_eval(&self.chebyshev, u / self.params.sine_range);
        for c in &self.double_angle {
            y = 2.0 * y * y - c;
        }
        if let Some(arcsine) = &self.arcsine {
            y = arcsine.iter().rev().fold(0.0, |acc, a| acc * y + a);
        }
        y * self.output_factor()
    }

    /// Homomorphic counterpart of [`SineEvaluator::evaluate_plain`] before
    /// the output factor. Every intermediate lands at `scale`.
    pub fn evaluate(&self, eval: &Evaluator, ct: &Ciphertext, scale: f64) -> EvalResult<Ciphertext> {
        let mut y = evaluate_series(eval, ct, BasisKind::Chebyshev, &self.chebyshev, scale)?;
        debug!(level = y.level(), "sine interpolant evaluated");
        for c in &self.double_angle {
            let mut square = eval.mul_relin_ckks(&y, &y)?;
            eval.rescale(&mut square)?;
            eval.mul_integer(&mut square, 2);
            eval.add_const(&mut square, -c)?;
            y = square;
        }
        if let Some(arcsine) = &self.arcsine {
            y = evaluate_series(eval, &y, BasisKind::Monomial, arcsine, scale)?;
            debug!(level = y.level(), "arcsine correction evaluated");
        }
        Ok(y)
    }
}

/// Odd Taylor coefficients of `arcsin(alpha * z)` up to `degree`, in the
/// monomial basis.
pub fn arcsine_coefficients(degree: usize, alpha: f64) -> Vec<f64> {
    let mut coeffs = vec![0.0; degree + 1];
    // (2k)! / (4^k (k!)^2 (2k+1)), built incrementally.
    let mut central = 1.0;
    for k in 0..=(degree.saturating_sub(1) / 2) {
        if k > 0 {
            central *= (2 * k - 1) as f64 / (2 * k) as f64;
        }
        let power = 2 * k + 1;
        coeffs[power] = central / power as f64 * alpha.powi(power as i32);
    }
    coeffs
}
