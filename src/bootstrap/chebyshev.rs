//! Polynomial evaluation on CKKS ciphertexts in the Chebyshev and monomial
//! bases.
//!
//! Basis elements are built with `T_2k = 2 T_k^2 - 1` and
//! `T_2k+1 = 2 T_k T_k+1 - T_1` (or `x^2k = (x^k)^2`, `x^2k+1 = x^k x^k+1`),
//! so term `k` sits `ceil(log2 k)` levels below the input and a degree-`d`
//! polynomial costs `ceil(log2 d) + 1` levels.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::ciphertext::Ciphertext;
use crate::evaluator::{EvalError, EvalResult, Evaluator};
use crate::params::ceil_log2;

/// Interpolant of `f` on `[-1, 1]` at the `degree + 1` Chebyshev nodes.
pub fn chebyshev_coefficients(f: impl Fn(f64) -> f64, degree: usize) -> Vec<f64> {
    let n = degree + 1;
    let samples: Vec<f64> = (0..n)
        .map(|j| f((PI * (j as f64 + 0.5) / n as f64).cos()))
        .collect();
    (0..n)
        .map(|k| {
            let sum: f64 = samples
                .iter()
                .enumerate()
                .map(|(j, y)| y * (PI * k as f64 * (j as f64 + 0.5) / n as f64).cos())
                .sum();
            let c = 2.0 * sum / n as f64;
            if k == 0 { c / 2.0 } else { c }
        })
        .collect()
}

/// Clenshaw evaluation of `Σ c_k T_k(x)`.
pub fn chebyshev_eval(coeffs: &[f64], x: f64) -> f64 {
    let (mut b1, mut b2) = (0.0, 0.0);
    for &c in coeffs.iter().skip(1).rev() {
        (b1, b2) = (2.0 * x * b1 - b2 + c, b1);
    }
    coeffs.first().copied().unwrap_or(0.0) + x * b1 - b2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisKind {
    Monomial,
    Chebyshev,
}

/// Lazily computed basis elements `k >= 1` of one input ciphertext.
pub(crate) struct PolynomialBasis<'a> {
    eval: &'a Evaluator,
    kind: BasisKind,
    terms: BTreeMap<usize, Ciphertext>,
}

impl<'a> PolynomialBasis<'a> {
    pub(crate) fn new(eval: &'a Evaluator, kind: BasisKind, x: Ciphertext) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(1, x);
        Self { eval, kind, terms }
    }

    pub(crate) fn term(&mut self, k: usize) -> EvalResult<Ciphertext> {
        debug_assert!(k >= 1);
        self.build(k)?;
        Ok(self.terms[&k].clone())
    }

    fn build(&mut self, k: usize) -> EvalResult<()> {
        if k <= 1 || self.terms.contains_key(&k) {
            return Ok(());
        }
        let (a, b) = (k / 2, k - k / 2);
        self.build(a)?;
        self.build(b)?;
        let mut x = self.terms[&a].clone();
        let mut y = self.terms[&b].clone();
        let level = x.level().min(y.level());
        drop_to(self.eval, &mut x, level)?;
        drop_to(self.eval, &mut y, level)?;
        let mut product = self.eval.mul_relin_ckks(&x, &y)?;
        self.eval.rescale(&mut product)?;
        if self.kind == BasisKind::Chebyshev {
            self.eval.mul_integer(&mut product, 2);
            if a == b {
                self.eval.add_const(&mut product, -1.0)?;
            } else {
                let mut first = self.terms[&1].clone();
                drop_to(self.eval, &mut first, product.level())?;
                self.eval.sub_assign(&mut product, &first)?;
            }
        }
        self.terms.insert(k, product);
        Ok(())
    }
}

fn drop_to(eval: &Evaluator, ct: &mut Ciphertext, level: usize) -> EvalResult<()> {
    let excess = ct.level() - level;
    eval.drop_levels(ct, excess)
}

/// Evaluates `Σ c_k B_k(x)` and lands the result at `target_scale`,
/// `ceil(log2 d) + 1` levels below `x` for `d = coeffs.len() - 1`.
pub(crate) fn evaluate_series(
    eval: &Evaluator,
    x: &Ciphertext,
    kind: BasisKind,
    coeffs: &[f64],
    target_scale: f64,
) -> EvalResult<Ciphertext> {
    let degree = coeffs.len().saturating_sub(1).max(1);
    let depth = ceil_log2(degree) + 1;
    if depth > x.level() {
        return Err(EvalError::LevelExhausted {
            requested: depth,
            level: x.level(),
        });
    }
    let out_level = x.level() - depth;
    let largest = coeffs.iter().fold(0.0f64, |m, c| m.max(c.abs()));
    let mut basis = PolynomialBasis::new(eval, kind, x.clone());

    let mut acc: Option<Ciphertext> = None;
    for (k, &c) in coeffs.iter().enumerate().skip(1) {
        if k > 1 && c.abs() <= largest * 1e-15 {
            continue;
        }
        let mut term = basis.term(k)?;
        let pscale = eval.context().prime(term.level()) as f64 * target_scale / term.scale();
        eval.mul_const(&mut term, c, pscale)?;
        eval.rescale(&mut term)?;
        drop_to(eval, &mut term, out_level)?;
        match acc.as_mut() {
            Some(sum) => eval.add_assign(sum, &term)?,
            None => acc = Some(term),
        }
    }
    let mut out = match acc {
        Some(out) => out,
        None => {
            // Constant polynomial: a zero multiple of x carries the level.
            let mut zero = x.clone();
            let pscale = eval.context().prime(zero.level()) as f64 * target_scale / zero.scale();
            eval.mul_const(&mut zero, 0.0, pscale)?;
            eval.rescale(&mut zero)?;
            drop_to(eval, &mut zero, out_level)?;
            zero
        }
    };
    if let Some(&c0) = coeffs.first() {
        eval.add_const(&mut out, c0)?;
    }
    Ok(out)
}
