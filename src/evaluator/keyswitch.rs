use crate::keys::SwitchingKey;
use crate::math::{add_mod, center, mul_mod, reduce_signed};
use crate::rings::RnsPoly;

use super::{EvalResult, Evaluator, KeySwitchScratch};

impl Evaluator {
    /// Hybrid key switch of `input` (NTT form over `Q_l`).
    ///
    /// Returns `(k0, k1)` over `Q_l` with `k0 + k1 s ≈ input · s'`, where `s'`
    /// is the source key of `key`. Each limb of `input` is one digit: its
    /// centered residue is lifted to `Q_l ∪ P`, multiplied with the matching
    /// key digit, and the sum is divided by `P` with rounding.
    pub(crate) fn switch_key(
        &self,
        input: &RnsPoly,
        key: &SwitchingKey,
    ) -> EvalResult<[RnsPoly; 2]> {
        let level = input.channel_count() - 1;
        let degree = self.ctx.degree();
        let qp = self.ctx.qp_basis(level);
        let special_channel = level + 1;
        let key_special_channel = self.ctx.max_level() + 1;

        let mut acc = [
            vec![vec![0u64; degree]; level + 2],
            vec![vec![0u64; degree]; level + 2],
        ];

        {
            let mut scratch = self.scratch.borrow_mut();
            let KeySwitchScratch {
                input: coeffs,
                digit,
            } = &mut *scratch;
            coeffs.resize(level + 1, Vec::new());
            digit.resize(level + 2, Vec::new());

            for (i, buffer) in coeffs.iter_mut().enumerate() {
                buffer.clear();
                buffer.extend_from_slice(input.channel(i));
                if input.is_ntt_domain() {
                    qp.ntt_table(i).inverse(buffer);
                }
            }

            for i in 0..=level {
                let qi = qp.moduli()[i];
                for (j, buffer) in digit.iter_mut().enumerate() {
                    let q = qp.moduli()[j];
                    buffer.clear();
                    if j == i {
                        buffer.extend_from_slice(&coeffs[i]);
                    } else {
                        buffer.extend(coeffs[i].iter().map(|&r| reduce_signed(center(r, qi), q)));
                    }
                    qp.ntt_table(j).forward(buffer);
                }

                let [b, a] = key.digit(i);
                for j in 0..=special_channel {
                    let q = qp.moduli()[j];
                    let key_channel = if j == special_channel {
                        key_special_channel
                    } else {
                        j
                    };
                    let (kb, ka) = (b.channel(key_channel), a.channel(key_channel));
                    for (k, &d) in digit[j].iter().enumerate() {
                        acc[0][j][k] = add_mod(acc[0][j][k], mul_mod(d, kb[k], q), q);
                        acc[1][j][k] = add_mod(acc[1][j][k], mul_mod(d, ka[k], q), q);
                    }
                }
            }
        }

        let target = self.ctx.q_basis(level);
        let [acc0, acc1] = acc;
        let mut k0 = RnsPoly::from_channels(acc0, qp.clone(), true)?;
        let mut k1 = RnsPoly::from_channels(acc1, qp.clone(), true)?;
        for k in [&mut k0, &mut k1] {
            k.div_round_by_last()?;
            k.truncate_to(target)?;
        }
        Ok([k0, k1])
    }
}
