//! FV slots-to-coefficients.
//!
//! With rows `v0, v1`, the two row-wise chains compute `X = (S v0, S̄ v1)` and
//! `Y = (S̄ v0, S v1)`, where `S = A · BR` is the factored evaluation matrix
//! and `S̄` uses the inverse root. After pre-multiplying the last factors by
//! `(1, -I)` and `(1, I)` with `I = psi^(N/2)`, `X + RotateRows(Y)` holds the
//! slots of the polynomial whose coefficient `k` is `v0[bitrev k]` for
//! `k < N/2` and `v1[bitrev(k - N/2)]` above.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::ciphertext::Ciphertext;
use crate::encoding::BatchEncoder;
use crate::evaluator::Evaluator;
use crate::math::neg_mod;
use crate::noise::NoiseEstimator;
use crate::params::ModulusSchedule;
use crate::plaintext::PlaintextMul;
use crate::scheduler::{TRANSFORM_BACKOFF_BITS, choose_drop_count};

use super::bsgs::{BsgsPlan, LinearBackend, evaluate};
use super::dft::{RootTable, forward_factors};
use super::diagonal::{DiagonalMatrix, RowPairArith, ZtArith};
use super::{TransformError, TransformResult};

struct FvBackend<'a> {
    eval: &'a Evaluator,
    encoder: &'a BatchEncoder,
}

impl LinearBackend for FvBackend<'_> {
    type Elem = [u64; 2];
    type Plain = PlaintextMul;

    fn encode(&self, diagonal: &[[u64; 2]], ct: &Ciphertext) -> TransformResult<PlaintextMul> {
        let values: Vec<u64> = diagonal
            .iter()
            .map(|pair| pair[0])
            .chain(diagonal.iter().map(|pair| pair[1]))
            .collect();
        let plaintext = self.encoder.encode(&values)?;
        Ok(self.encoder.to_mul_domain(&plaintext, ct.level())?)
    }

    fn mul_plain(&self, ct: &Ciphertext, plain: &PlaintextMul) -> TransformResult<Ciphertext> {
        Ok(self.eval.mul_plain(ct, plain)?)
    }

    fn rotate(&self, ct: &Ciphertext, steps: usize) -> TransformResult<Ciphertext> {
        Ok(self.eval.rotate_columns(ct, steps as isize)?)
    }

    fn add_assign(&self, acc: &mut Ciphertext, term: &Ciphertext) -> TransformResult<()> {
        Ok(self.eval.add_assign(acc, term)?)
    }
}

enum DropPolicy<'a> {
    Never,
    Fixed(&'a [usize]),
    Auto(&'a NoiseEstimator),
}

pub struct SlotsToCoeffs {
    eval: Evaluator,
    encoder: BatchEncoder,
    x_factors: Vec<DiagonalMatrix<[u64; 2]>>,
    y_factors: Vec<DiagonalMatrix<[u64; 2]>>,
    bsgs_ratio: f64,
}

impl SlotsToCoeffs {
    /// Builds the factors for the context's `stc_depth`.
    pub fn new(eval: &Evaluator) -> TransformResult<Self> {
        let ctx = eval.context().clone();
        let literal = ctx.literal();
        let rows = ctx.half_degree();
        let depth = literal.stc_depth;
        let max = rows.trailing_zeros() as usize;
        if depth == 0 || depth > max.max(1) {
            return Err(TransformError::InvalidDepth { depth, max });
        }

        let t = ctx.plaintext_modulus();
        let arith = RowPairArith(ZtArith { modulus: t });
        let table = ctx.plaintext_table();
        let order = 2 * ctx.degree();
        let direct = RootTable::new((0..order).map(|e| [table.psi_pow(e), table.psi_pow(order - e)]).collect());
        let swapped = RootTable::new((0..order).map(|e| [table.psi_pow(order - e), table.psi_pow(e)]).collect());

        let imaginary = table.psi_pow(ctx.degree() / 2);
        let mut x_factors = forward_factors(&arith, &direct, rows, depth);
        let mut y_factors = forward_factors(&arith, &swapped, rows, depth);
        if let Some(last) = x_factors.last_mut() {
            last.premultiply(&vec![[1, neg_mod(imaginary, t)]; rows], &arith);
        }
        if let Some(last) = y_factors.last_mut() {
            last.premultiply(&vec![[1, imaginary]; rows], &arith);
        }

        Ok(Self {
            eval: eval.fork(),
            encoder: BatchEncoder::new(ctx.clone()),
            x_factors,
            y_factors,
            bsgs_ratio: literal.half_boot.bsgs_ratio,
        })
    }

    pub fn depth(&self) -> usize {
        self.x_factors.len()
    }

    /// Galois elements of every rotation, including the row swap.
    pub fn required_rotations(&self) -> Vec<usize> {
        let ctx = self.eval.context();
        let mut steps = BTreeSet::new();
        for factor in self.x_factors.iter().chain(&self.y_factors) {
            steps.extend(BsgsPlan::new(factor.indices(), factor.dim(), self.bsgs_ratio).rotations());
        }
        let mut elements: BTreeSet<usize> = steps.into_iter().map(|s| ctx.galois_element(s as isize)).collect();
        elements.insert(ctx.galois_element_conjugate());
        elements.into_iter().collect()
    }

    /// Applies `schedule.transform[i]` after factor `i`.
    pub fn slots_to_coeffs(&self, ct: &Ciphertext, schedule: &ModulusSchedule) -> TransformResult<Ciphertext> {
        if schedule.transform.len() != self.depth() {
            return Err(TransformError::ScheduleLength {
                expected: self.depth(),
                actual: schedule.transform.len(),
            });
        }
        Ok(self.run(ct, DropPolicy::Fixed(&schedule.transform))?.0)
    }

    pub fn slots_to_coeffs_no_mod_switch(&self, ct: &Ciphertext) -> TransformResult<Ciphertext> {
        Ok(self.run(ct, DropPolicy::Never)?.0)
    }

    /// Chooses each factor's drop count with the estimator.
    pub fn slots_to_coeffs_auto_mod_switch(
        &self,
        ct: &Ciphertext,
        estimator: &NoiseEstimator,
    ) -> TransformResult<(Ciphertext, Vec<usize>)> {
        let (out, schedule) = self.run(ct, DropPolicy::Auto(estimator))?;
        info!(?schedule, "transform schedule chosen");
        Ok((out, schedule))
    }

    #[instrument(skip_all, fields(depth = self.depth(), level = ct.level()))]
    fn run(&self, ct: &Ciphertext, policy: DropPolicy<'_>) -> TransformResult<(Ciphertext, Vec<usize>)> {
        let backend = FvBackend {
            eval: &self.eval,
            encoder: &self.encoder,
        };
        let mut x = ct.clone();
        let mut y = ct.clone();
        let mut schedule = Vec::with_capacity(self.depth());
        for (factor, (x_matrix, y_matrix)) in self.x_factors.iter().zip(&self.y_factors).enumerate() {
            x = evaluate(&backend, x_matrix, self.bsgs_ratio, &x)?;
            y = evaluate(&backend, y_matrix, self.bsgs_ratio, &y)?;
            let drops = match &policy {
                DropPolicy::Never => 0,
                DropPolicy::Fixed(table) => table[factor],
                DropPolicy::Auto(estimator) => {
                    let pair = [x.clone(), y.clone()];
                    let (count, budget) = choose_drop_count(&self.eval, estimator, &pair, TRANSFORM_BACKOFF_BITS)?;
                    if budget.budget == 0 {
                        return Err(TransformError::NoiseBudgetExhausted { factor });
                    }
                    count
                }
            };
            self.eval.mod_switch_many(&mut x, drops)?;
            self.eval.mod_switch_many(&mut y, drops)?;
            schedule.push(drops);
            debug!(factor, drops, level = x.level(), "transform factor evaluated");
        }
        let swapped = self.eval.rotate_rows(&y)?;
        self.eval.add_assign(&mut x, &swapped)?;
        Ok((x, schedule))
    }
}
