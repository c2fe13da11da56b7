//! Homomorphic evaluation of HERA and Rubato, one nonce per FV slot.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info, instrument};

use crate::ciphertext::Ciphertext;
use crate::encoding::BatchEncoder;
use crate::encryption::Encryptor;
use crate::evaluator::{EvalError, Evaluator};
use crate::math::reduce_signed;
use crate::noise::NoiseEstimator;
use crate::params::ModulusSchedule;
use crate::scheduler::{CIPHER_BACKOFF_BITS, choose_drop_count};

use super::linear::LinearLayer;
use super::params::{CipherKind, CipherParams};
use super::reference::validate_block;
use super::xof::round_constants;
use super::{CipherError, CipherResult};

/// Lifecycle of a [`CipherCircuit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Uninitialized,
    /// Initial-state ciphertexts are built at the configured level.
    Initialized,
    RoundRunning(usize),
    /// A keystream was produced; the initial state is kept for the next call.
    Finalized,
}

/// How the circuit drops primes after each nonlinear layer.
enum SwitchPolicy<'a> {
    Never,
    Fixed(&'a [usize]),
    Auto(&'a NoiseEstimator),
}

pub struct CipherCircuit {
    params: CipherParams,
    linear: LinearLayer,
    eval: Evaluator,
    encoder: BatchEncoder,
    initial_mod_switch: usize,
    initial_state: Vec<Ciphertext>,
    state: CircuitState,
}

impl CipherCircuit {
    pub fn new(params: CipherParams, eval: Evaluator) -> CipherResult<Self> {
        let linear = validate_block(&params)?;
        let encoder = BatchEncoder::new(eval.context().clone());
        Ok(Self {
            params,
            linear,
            eval,
            encoder,
            initial_mod_switch: 0,
            initial_state: Vec::new(),
            state: CircuitState::Uninitialized,
        })
    }

    pub fn params(&self) -> &CipherParams {
        &self.params
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn initial_mod_switch(&self) -> usize {
        self.initial_mod_switch
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.eval
    }

    /// Encrypts every key word replicated in all slots, switched down by the
    /// configured initial amount.
    #[instrument(skip_all, fields(cipher = self.params.name))]
    pub fn enc_key<R: Rng + ?Sized>(
        &self,
        key: &[u64],
        encryptor: &Encryptor,
        rng: &mut R,
    ) -> CipherResult<Vec<Ciphertext>> {
        self.check_key_count(key.len())?;
        let level = self.eval.context().max_level();
        key.iter()
            .map(|&word| {
                let mut ct = encryptor.encrypt_constant(word, level, rng)?;
                self.eval.mod_switch_many(&mut ct, self.initial_mod_switch)?;
                Ok(ct)
            })
            .collect()
    }

    /// Rebuilds the initial state: trivial encryptions of `1..=blocksize`
    /// at `max_level - initial_mod_switch`.
    #[instrument(skip_all, fields(cipher = self.params.name, initial_mod_switch = initial_mod_switch))]
    pub fn reset(&mut self, initial_mod_switch: usize) -> CipherResult<()> {
        let max_level = self.eval.context().max_level();
        if initial_mod_switch > max_level {
            return Err(EvalError::LevelExhausted {
                requested: initial_mod_switch,
                level: max_level,
            }
            .into());
        }
        let level = max_level - initial_mod_switch;
        self.initial_state = (1..=self.params.blocksize as u64)
            .map(|value| {
                let scaled = self.encoder.scale_up(&self.encoder.encode_constant(value), level)?;
                Ok(self.eval.trivial_fv(&scaled))
            })
            .collect::<CipherResult<_>>()?;
        self.initial_mod_switch = initial_mod_switch;
        self.state = CircuitState::Initialized;
        debug!(level, "circuit initialised");
        Ok(())
    }

    /// Runs every round without switching. Measures the depth of the cipher.
    pub fn crypt_no_mod_switch(
        &mut self,
        nonces: &[Vec<u8>],
        counter: u64,
        keys: &[Ciphertext],
    ) -> CipherResult<Vec<Ciphertext>> {
        Ok(self.run(nonces, counter, keys, SwitchPolicy::Never)?.0)
    }

    /// Replays a calibrated schedule.
    pub fn crypt(
        &mut self,
        nonces: &[Vec<u8>],
        counter: u64,
        keys: &[Ciphertext],
        schedule: &ModulusSchedule,
    ) -> CipherResult<Vec<Ciphertext>> {
        let expected = self.params.rounds + 1;
        if schedule.cipher.len() != expected {
            return Err(CipherError::ScheduleLength {
                expected,
                actual: schedule.cipher.len(),
            });
        }
        if schedule.initial() != self.initial_mod_switch {
            return Err(CipherError::ScheduleMismatch {
                expected: self.initial_mod_switch,
                actual: schedule.initial(),
            });
        }
        Ok(self
            .run(nonces, counter, keys, SwitchPolicy::Fixed(&schedule.cipher))?
            .0)
    }

    /// [`CipherCircuit::crypt`] followed by the Rubato noise finalization:
    /// each output word of each slot gets an independent rounded Gaussian of
    /// standard deviation `sigma`, added modulo `t`. With `sigma = 0` this is
    /// exactly `crypt`.
    pub fn crypt_with_noise<R: Rng + ?Sized>(
        &mut self,
        nonces: &[Vec<u8>],
        counter: u64,
        keys: &[Ciphertext],
        schedule: &ModulusSchedule,
        rng: &mut R,
    ) -> CipherResult<Vec<Ciphertext>> {
        if self.params.kind != CipherKind::Rubato {
            return Err(CipherError::NoiseNotSupported { kind: self.params.kind });
        }
        let sigma = self.params.sigma;
        let normal = Normal::new(0.0, sigma).map_err(|_| CipherError::InvalidNoise { sigma })?;
        let mut keystream = self.crypt(nonces, counter, keys, schedule)?;
        if sigma == 0.0 {
            return Ok(keystream);
        }
        let t = self.eval.context().plaintext_modulus();
        for ct in keystream.iter_mut() {
            let noise: Vec<u64> = (0..nonces.len())
                .map(|_| reduce_signed(normal.sample(rng).round() as i64, t))
                .collect();
            let scaled = self.encoder.scale_up(&self.encoder.encode(&noise)?, ct.level())?;
            self.eval.add_plain_assign(ct, &scaled)?;
        }
        debug!(sigma, "keystream noise added");
        Ok(keystream)
    }

    /// Chooses the switches with the noise estimator and returns them with
    /// the keystream. Entry 0 of the schedule is the initial switch.
    pub fn crypt_auto_mod_switch(
        &mut self,
        nonces: &[Vec<u8>],
        counter: u64,
        keys: &[Ciphertext],
        estimator: &NoiseEstimator,
    ) -> CipherResult<(Vec<Ciphertext>, Vec<usize>)> {
        let (keystream, schedule) = self.run(nonces, counter, keys, SwitchPolicy::Auto(estimator))?;
        info!(cipher = self.params.name, ?schedule, "auto schedule chosen");
        Ok((keystream, schedule))
    }

    /// Subtracts the keystream from symmetric ciphertext words.
    ///
    /// `words[w][slot]` is output word `w` of the block encrypted under the
    /// nonce of `slot`. Returns one FV ciphertext of the message per word.
    pub fn transcipher(&self, keystream: &[Ciphertext], words: &[Vec<u64>]) -> CipherResult<Vec<Ciphertext>> {
        if words.len() != keystream.len() {
            return Err(CipherError::InvalidKeyLength {
                expected: keystream.len(),
                actual: words.len(),
            });
        }
        keystream
            .iter()
            .zip(words)
            .map(|(stream, values)| {
                let plaintext = self.encoder.encode(values)?;
                let scaled = self.encoder.scale_up(&plaintext, stream.level())?;
                Ok(self.eval.add_plain(&self.eval.neg(stream), &scaled)?)
            })
            .collect()
    }

    // ─── Round body ───────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(cipher = self.params.name, counter = counter))]
    fn run(
        &mut self,
        nonces: &[Vec<u8>],
        counter: u64,
        keys: &[Ciphertext],
        policy: SwitchPolicy<'_>,
    ) -> CipherResult<(Vec<Ciphertext>, Vec<usize>)> {
        if matches!(self.state, CircuitState::Uninitialized) {
            return Err(CipherError::NotInitialized { state: self.state });
        }
        self.check_key_count(keys.len())?;
        let slots = self.eval.context().degree();
        if nonces.len() != slots {
            return Err(CipherError::NonceCount {
                expected: slots,
                actual: nonces.len(),
            });
        }

        let t = self.eval.context().plaintext_modulus();
        let constants: Vec<Vec<u64>> = nonces
            .iter()
            .map(|nonce| round_constants(&self.params, nonce, counter, t))
            .collect();

        let mut state = self.initial_state.clone();
        let state_level = state[0].level();
        let mut keys = keys.to_vec();
        for key in &mut keys {
            if key.level() < state_level {
                return Err(CipherError::KeyLevelTooLow {
                    key: key.level(),
                    state: state_level,
                });
            }
            self.eval.mod_switch_many(key, key.level() - state_level)?;
        }

        let rounds = self.params.rounds;
        let mut schedule = Vec::with_capacity(rounds + 1);
        schedule.push(self.initial_mod_switch);
        self.add_round_key(&mut state, &keys, &constants, 0, true)?;

        for round in 1..=rounds {
            self.state = CircuitState::RoundRunning(round);
            state = self.linear_layer(&state)?;
            state = self.nonlinear_layer(&state)?;

            let drops = match &policy {
                SwitchPolicy::Never => 0,
                SwitchPolicy::Fixed(table) => table[round],
                SwitchPolicy::Auto(estimator) => {
                    let (count, budget) = choose_drop_count(&self.eval, estimator, &state, CIPHER_BACKOFF_BITS)?;
                    if budget.budget == 0 {
                        return Err(CipherError::NoiseBudgetExhausted { round });
                    }
                    count
                }
            };
            for ct in state.iter_mut().chain(keys.iter_mut()) {
                self.eval.mod_switch_many(ct, drops)?;
            }
            schedule.push(drops);
            debug!(round, drops, level = state[0].level(), "round evaluated");

            if round < rounds {
                self.add_round_key(&mut state, &keys, &constants, round, true)?;
            } else {
                state = self.linear_layer(&state)?;
                state.truncate(self.params.output_size);
                self.add_round_key(&mut state, &keys, &constants, round, false)?;
            }
        }

        self.state = CircuitState::Finalized;
        Ok((state, schedule))
    }

    /// `state[w] += key[w] * rc[round][w]`, slot-wise. Interior rounds add
    /// lazily; the next linear layer reduces.
    fn add_round_key(
        &self,
        state: &mut [Ciphertext],
        keys: &[Ciphertext],
        constants: &[Vec<u64>],
        round: usize,
        lazy: bool,
    ) -> CipherResult<()> {
        let n = self.params.blocksize;
        let level = keys[0].level();
        for (wire, ct) in state.iter_mut().enumerate() {
            let slots: Vec<u64> = constants.iter().map(|rc| rc[round * n + wire]).collect();
            let factor = self.encoder.to_mul_domain(&self.encoder.encode(&slots)?, level)?;
            let term = self.eval.mul_plain(&keys[wire], &factor)?;
            if lazy {
                self.eval.add_no_mod_assign(ct, &term)?;
            } else {
                self.eval.add_assign(ct, &term)?;
            }
        }
        Ok(())
    }

    fn linear_layer(&self, state: &[Ciphertext]) -> CipherResult<Vec<Ciphertext>> {
        let mixed = self.mix(state, &self.linear.columns)?;
        self.mix(&mixed, &self.linear.rows)
    }

    fn mix(&self, state: &[Ciphertext], terms: &[Vec<(usize, u64)>]) -> CipherResult<Vec<Ciphertext>> {
        terms
            .iter()
            .map(|wire| {
                let (&(first, coeff), rest) = match wire.split_first() {
                    Some(split) => split,
                    None => unreachable!("mixing rows are never empty"),
                };
                let mut acc = self.eval.mul_scalar(&state[first], coeff);
                for &(src, coeff) in rest {
                    let term = self.eval.mul_scalar(&state[src], coeff);
                    self.eval.add_no_mod_assign(&mut acc, &term)?;
                }
                self.eval.reduce(&mut acc);
                Ok(acc)
            })
            .collect()
    }

    fn nonlinear_layer(&self, state: &[Ciphertext]) -> CipherResult<Vec<Ciphertext>> {
        match self.params.kind {
            CipherKind::Hera => state
                .iter()
                .map(|x| {
                    let square = self.eval.square_relin(x)?;
                    Ok(self.eval.mul_relin(&square, x)?)
                })
                .collect(),
            CipherKind::Rubato => {
                let mut out = Vec::with_capacity(state.len());
                out.push(state[0].clone());
                for pair in state.windows(2) {
                    let square = self.eval.square_relin(&pair[0])?;
                    out.push(self.eval.add(&pair[1], &square)?);
                }
                Ok(out)
            }
        }
    }

    fn check_key_count(&self, actual: usize) -> CipherResult<()> {
        if actual != self.params.blocksize {
            return Err(CipherError::InvalidKeyLength {
                expected: self.params.blocksize,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::params::{HERA_16, RUBATO_S};
    use crate::cipher::reference::{HeraCipher, RubatoCipher};
    use crate::evaluator::test_support::{Fixture, fixture};
    use crate::params::toy_full_slots;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn nonces(count: usize) -> Vec<Vec<u8>> {
        (0..count).map(|i| (i as u64).to_le_bytes().to_vec()).collect()
    }

    fn circuit(f: &Fixture, params: CipherParams) -> CipherCircuit {
        let mut circuit = CipherCircuit::new(params, f.eval.fork()).unwrap();
        circuit.reset(0).unwrap();
        circuit
    }

    #[test]
    fn uninitialised_circuit_refuses_to_run() {
        let mut f = fixture(toy_full_slots(), &[], 101);
        let mut circuit = CipherCircuit::new(HERA_16, f.eval.fork()).unwrap();
        let key: Vec<u64> = (1..=16).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        assert!(matches!(
            circuit.crypt_no_mod_switch(&nonces(32), 0, &keys),
            Err(CipherError::NotInitialized { state: CircuitState::Uninitialized })
        ));
    }

    #[test]
    fn schedule_must_start_with_the_initial_switch() {
        let mut f = fixture(toy_full_slots(), &[], 102);
        let mut circuit = circuit(&f, HERA_16);
        let key: Vec<u64> = (1..=16).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        let bad = ModulusSchedule::new(vec![1, 1, 1, 1, 1, 1], vec![1, 1]);
        assert!(matches!(
            circuit.crypt(&nonces(32), 0, &keys, &bad),
            Err(CipherError::ScheduleMismatch { expected: 0, actual: 1 })
        ));
        let short = ModulusSchedule::new(vec![0, 1], vec![]);
        assert!(matches!(
            circuit.crypt(&nonces(32), 0, &keys, &short),
            Err(CipherError::ScheduleLength { expected: 6, actual: 2 })
        ));
    }

    #[test]
    fn nonce_count_must_match_slots() {
        let mut f = fixture(toy_full_slots(), &[], 103);
        let mut circuit = circuit(&f, RUBATO_S);
        let key: Vec<u64> = (1..=16).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        assert!(matches!(
            circuit.crypt_no_mod_switch(&nonces(3), 0, &keys),
            Err(CipherError::NonceCount { expected: 32, actual: 3 })
        ));
    }

    #[test]
    fn hera_unswitched_keystream_matches_reference() {
        let mut f = fixture(toy_full_slots(), &[], 104);
        let mut circuit = circuit(&f, HERA_16);
        let key: Vec<u64> = (0..16).map(|i| 1000 + 7 * i).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        let nonces = nonces(32);
        let stream = circuit.crypt_no_mod_switch(&nonces, 4, &keys).unwrap();
        assert_eq!(circuit.state(), CircuitState::Finalized);
        let reference = HeraCipher::new(HERA_16, key, f.ctx.plaintext_modulus()).unwrap();
        let decrypted: Vec<Vec<u64>> = stream.iter().map(|ct| f.decryptor.decrypt_slots(ct).unwrap()).collect();
        for (slot, nonce) in nonces.iter().enumerate() {
            let expected = reference.keystream(nonce, 4);
            for (wire, words) in decrypted.iter().enumerate() {
                assert_eq!(words[slot], expected[wire], "slot {slot} wire {wire}");
            }
        }
    }

    #[test]
    fn keystream_noise_stays_within_a_few_deviations() {
        let mut f = fixture(toy_full_slots(), &[], 106);
        let mut circuit = circuit(&f, RUBATO_S);
        let t = f.ctx.plaintext_modulus();
        let key: Vec<u64> = (0..16).map(|i| 17 * i + 2).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        let nonces = nonces(32);
        let schedule = crate::params::schedule_for(&RUBATO_S, f.ctx.literal()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let stream = circuit.crypt_with_noise(&nonces, 1, &keys, &schedule, &mut rng).unwrap();

        let mut clean = RUBATO_S;
        clean.sigma = 0.0;
        let reference = RubatoCipher::new(clean, key, t).unwrap();
        let bound = (10.0 * RUBATO_S.sigma) as i64;
        let mut nonzero = 0;
        for (wire, ct) in stream.iter().enumerate() {
            let words = f.decryptor.decrypt_slots(ct).unwrap();
            for (slot, nonce) in nonces.iter().enumerate() {
                let expected = reference.keystream(nonce, 1)[wire];
                let diff = crate::math::center(crate::math::sub_mod(words[slot], expected, t), t);
                assert!(diff.abs() <= bound, "slot {slot} wire {wire}: {diff}");
                nonzero += (diff != 0) as usize;
            }
        }
        assert!(nonzero > 0);
    }

    #[test]
    fn hera_has_no_keystream_noise() {
        let mut f = fixture(toy_full_slots(), &[], 107);
        let mut circuit = circuit(&f, HERA_16);
        let key: Vec<u64> = (1..=16).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        let schedule = crate::params::schedule_for(&HERA_16, f.ctx.literal()).unwrap();
        assert!(matches!(
            circuit.crypt_with_noise(&nonces(32), 0, &keys, &schedule, &mut f.rng),
            Err(CipherError::NoiseNotSupported { kind: CipherKind::Hera })
        ));
    }

    #[test]
    fn rubato_transciphering_recovers_the_message() {
        let mut f = fixture(toy_full_slots(), &[], 105);
        let mut circuit = circuit(&f, RUBATO_S);
        let t = f.ctx.plaintext_modulus();
        let key: Vec<u64> = (0..16).map(|i| 31 * i + 5).collect();
        let keys = circuit.enc_key(&key, &f.encryptor, &mut f.rng).unwrap();
        let nonces = nonces(32);
        let mut reference = RUBATO_S;
        reference.sigma = 0.0;
        let rubato = RubatoCipher::new(reference, key, t).unwrap();

        let messages: Vec<Vec<u64>> = (0..32).map(|slot| (0..12).map(|w| (slot * 100 + w) as u64).collect()).collect();
        let mut words = vec![vec![0u64; 32]; 12];
        for (slot, nonce) in nonces.iter().enumerate() {
            let ct = rubato.encrypt(nonce, 2, &messages[slot], &mut f.rng).unwrap();
            for (w, &c) in ct.iter().enumerate() {
                words[w][slot] = c;
            }
        }

        let schedule = crate::params::schedule_for(&RUBATO_S, f.ctx.literal()).unwrap();
        let stream = circuit.crypt(&nonces, 2, &keys, &schedule).unwrap();
        let data = circuit.transcipher(&stream, &words).unwrap();
        for (w, ct) in data.iter().enumerate() {
            let slots = f.decryptor.decrypt_slots(ct).unwrap();
            for slot in 0..32 {
                assert_eq!(slots[slot], messages[slot][w]);
            }
        }
    }
}
