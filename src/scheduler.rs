//! Greedy prime-dropping driven by the noise estimator.
//!
//! After a layer of multiplications the noise of an FV ciphertext is well
//! above the modulus-switching floor, and switching away primes shrinks it
//! without costing budget. The scheduler drops as many trailing primes as the
//! measured noise width allows, confirms on a copy of one ciphertext, and
//! backs off by one prime if the trial lost more budget than tolerated.

use tracing::{debug, warn};

use crate::ciphertext::Ciphertext;
use crate::evaluator::{EvalResult, Evaluator};
use crate::math::bit_len;
use crate::noise::NoiseEstimator;

/// Budget loss tolerated by the trial switch during cipher rounds.
pub const CIPHER_BACKOFF_BITS: u64 = 3;

/// Budget loss tolerated by the trial switch during slots-to-coeffs factors.
pub const TRANSFORM_BACKOFF_BITS: u64 = 1;

/// Largest budget over a set of ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetInfo {
    /// Index of the ciphertext reaching the maximum.
    pub index: usize,
    pub budget: u64,
    /// `log2(Q_l) - bitlen(t) - budget`: width of the noise in bits.
    pub error_bits: i64,
}

pub fn find_budget_info(estimator: &NoiseEstimator, cts: &[Ciphertext]) -> EvalResult<BudgetInfo> {
    let (index, budget) = estimator.max_budget(cts)?;
    let ctx = estimator.context();
    let level = cts.get(index).map_or(0, Ciphertext::level);
    let log_q = ctx.log_modulus(level).round() as i64;
    let error_bits = log_q - i64::from(bit_len(ctx.plaintext_modulus())) - budget as i64;
    Ok(BudgetInfo {
        index,
        budget,
        error_bits,
    })
}

/// Number of trailing primes of `level` whose bit lengths fit in `error_bits`.
pub fn greedy_drop_count(estimator: &NoiseEstimator, level: usize, error_bits: i64) -> usize {
    let ctx = estimator.context();
    let mut remaining = error_bits;
    let mut count = 0;
    while count < level {
        let bits = i64::from(ctx.prime_bits(level - count));
        if remaining - bits <= 0 {
            break;
        }
        remaining -= bits;
        count += 1;
    }
    count
}

/// Chooses how many primes to drop from `cts` without applying it.
///
/// Also returns the budget measurement the choice was based on.
pub fn choose_drop_count(
    eval: &Evaluator,
    estimator: &NoiseEstimator,
    cts: &[Ciphertext],
    backoff_bits: u64,
) -> EvalResult<(usize, BudgetInfo)> {
    let Some(first) = cts.first() else {
        return Ok((0, BudgetInfo::default()));
    };
    let info = find_budget_info(estimator, cts)?;
    let mut count = greedy_drop_count(estimator, first.level(), info.error_bits);
    if count == 0 {
        return Ok((0, info));
    }

    let before = estimator.invariant_noise_budget(first)?;
    let mut trial = first.clone();
    eval.mod_switch_many(&mut trial, count)?;
    let after = estimator.invariant_noise_budget(&trial)?;
    let loss = before.saturating_sub(after);
    if loss > backoff_bits {
        warn!(count, loss, backoff_bits, "trial switch lost too much budget, backing off");
        count -= 1;
    }
    debug!(
        budget = info.budget,
        error_bits = info.error_bits,
        count,
        "scheduled modulus switch"
    );
    Ok((count, info))
}
