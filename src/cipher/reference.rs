//! Plaintext HERA and Rubato over `Z_t`, used by clients to encrypt and as
//! the oracle for the homomorphic circuit.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::math::{add_mod, bit_len, mul_mod, reduce_signed};

use super::linear::LinearLayer;
use super::params::{CipherKind, CipherParams};
use super::xof::{MAX_FIELD_BITS, round_constants};
use super::{CipherError, CipherResult};

/// Validated cipher instance with a clear key.
#[derive(Debug, Clone)]
struct PlainCipher {
    params: CipherParams,
    key: Vec<u64>,
    modulus: u64,
    linear: LinearLayer,
}

impl PlainCipher {
    fn new(params: CipherParams, key: Vec<u64>, modulus: u64) -> CipherResult<Self> {
        let linear = validate_block(&params)?;
        if modulus < 2 || bit_len(modulus) > MAX_FIELD_BITS {
            return Err(CipherError::InvalidModulus {
                modulus,
                max_bits: MAX_FIELD_BITS,
            });
        }
        if key.len() != params.blocksize {
            return Err(CipherError::InvalidKeyLength {
                expected: params.blocksize,
                actual: key.len(),
            });
        }
        if let Some(&value) = key.iter().find(|&&k| k >= modulus) {
            return Err(CipherError::KeyNotReduced { value, modulus });
        }
        Ok(Self {
            params,
            key,
            modulus,
            linear,
        })
    }

    fn add_round_key(&self, state: &mut [u64], constants: &[u64]) {
        let t = self.modulus;
        for ((x, &k), &rc) in state.iter_mut().zip(&self.key).zip(constants) {
            *x = add_mod(*x, mul_mod(k, rc, t), t);
        }
    }

    fn nonlinear(&self, state: &mut [u64]) {
        let t = self.modulus;
        match self.params.kind {
            CipherKind::Hera => {
                for x in state.iter_mut() {
                    *x = mul_mod(mul_mod(*x, *x, t), *x, t);
                }
            }
            CipherKind::Rubato => {
                let previous = state.to_vec();
                for (i, x) in state.iter_mut().enumerate().skip(1) {
                    *x = add_mod(*x, mul_mod(previous[i - 1], previous[i - 1], t), t);
                }
            }
        }
    }

    /// Noise-free keystream of one block, `output_size` words.
    fn keystream(&self, nonce: &[u8], counter: u64) -> Vec<u64> {
        let n = self.params.blocksize;
        let rounds = self.params.rounds;
        let t = self.modulus;
        let constants = round_constants(&self.params, nonce, counter, t);
        let mut state: Vec<u64> = (1..=n as u64).collect();

        self.add_round_key(&mut state, &constants[..n]);
        for round in 1..=rounds {
            state = self.linear.apply_plain(&state, t);
            self.nonlinear(&mut state);
            let rc = &constants[round * n..(round + 1) * n];
            if round < rounds {
                self.add_round_key(&mut state, rc);
            } else {
                state = self.linear.apply_plain(&state, t);
                state.truncate(self.params.output_size);
                self.add_round_key(&mut state, rc);
            }
        }
        state
    }
}

/// Returns the linear layer of a supported `(kind, blocksize)` pair.
pub(crate) fn validate_block(params: &CipherParams) -> CipherResult<LinearLayer> {
    let supported = match params.kind {
        CipherKind::Hera => params.blocksize == 16,
        CipherKind::Rubato => matches!(params.blocksize, 16 | 36 | 64),
    };
    let layer = LinearLayer::new(params.state_dim()).filter(|_| supported);
    layer.ok_or(CipherError::UnsupportedBlockSize {
        kind: params.kind,
        blocksize: params.blocksize,
    })
}

/// HERA: 16 wires, cube S-box.
#[derive(Debug, Clone)]
pub struct HeraCipher(PlainCipher);

impl HeraCipher {
    pub fn new(params: CipherParams, key: Vec<u64>, modulus: u64) -> CipherResult<Self> {
        if params.kind != CipherKind::Hera {
            return Err(CipherError::UnsupportedBlockSize {
                kind: params.kind,
                blocksize: params.blocksize,
            });
        }
        PlainCipher::new(params, key, modulus).map(Self)
    }

    pub fn keystream(&self, nonce: &[u8], counter: u64) -> Vec<u64> {
        self.0.keystream(nonce, counter)
    }

    /// Adds the keystream to `message` word by word.
    pub fn encrypt(&self, nonce: &[u8], counter: u64, message: &[u64]) -> Vec<u64> {
        let t = self.0.modulus;
        message
            .iter()
            .zip(self.keystream(nonce, counter))
            .map(|(&m, k)| add_mod(m % t, k, t))
            .collect()
    }
}

/// Rubato: Feistel S-box, truncated output, Gaussian noise on the client.
#[derive(Debug, Clone)]
pub struct RubatoCipher(PlainCipher);

impl RubatoCipher {
    pub fn new(params: CipherParams, key: Vec<u64>, modulus: u64) -> CipherResult<Self> {
        if params.kind != CipherKind::Rubato {
            return Err(CipherError::UnsupportedBlockSize {
                kind: params.kind,
                blocksize: params.blocksize,
            });
        }
        PlainCipher::new(params, key, modulus).map(Self)
    }

    /// Keystream without the additive noise; this is what the circuit computes.
    pub fn keystream(&self, nonce: &[u8], counter: u64) -> Vec<u64> {
        self.0.keystream(nonce, counter)
    }

    /// Keystream plus rounded `N(0, σ²)` noise per word. `σ = 0` adds nothing.
    pub fn keystream_with_noise<R: Rng + ?Sized>(
        &self,
        nonce: &[u8],
        counter: u64,
        rng: &mut R,
    ) -> CipherResult<Vec<u64>> {
        let sigma = self.0.params.sigma;
        let mut stream = self.keystream(nonce, counter);
        if sigma == 0.0 {
            return Ok(stream);
        }
        let normal = Normal::new(0.0, sigma).map_err(|_| CipherError::InvalidNoise { sigma })?;
        let t = self.0.modulus;
        for word in stream.iter_mut() {
            let noise = normal.sample(rng).round() as i64;
            *word = add_mod(*word, reduce_signed(noise, t), t);
        }
        Ok(stream)
    }

    pub fn encrypt<R: Rng + ?Sized>(
        &self,
        nonce: &[u8],
        counter: u64,
        message: &[u64],
        rng: &mut R,
    ) -> CipherResult<Vec<u64>> {
        let t = self.0.modulus;
        let stream = self.keystream_with_noise(nonce, counter, rng)?;
        Ok(message
            .iter()
            .zip(stream)
            .map(|(&m, k)| add_mod(m % t, k, t))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::params::{HERA_16, RUBATO_L, RUBATO_M, RUBATO_S};
    use crate::math::sub_mod;
    use crate::params::PLAINTEXT_MODULUS;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const T: u64 = PLAINTEXT_MODULUS;

    fn key(n: usize) -> Vec<u64> {
        (1..=n as u64).collect()
    }

    #[test]
    fn output_sizes_follow_parameters() {
        let hera = HeraCipher::new(HERA_16, key(16), T).unwrap();
        assert_eq!(hera.keystream(&[0; 8], 0).len(), 16);
        for params in [RUBATO_S, RUBATO_M, RUBATO_L] {
            let rubato = RubatoCipher::new(params, key(params.blocksize), T).unwrap();
            assert_eq!(rubato.keystream(&[0; 8], 0).len(), params.output_size);
        }
    }

    #[test]
    fn kind_and_block_size_are_validated() {
        let mut bad = HERA_16;
        bad.blocksize = 36;
        assert!(matches!(
            HeraCipher::new(bad, key(36), T),
            Err(CipherError::UnsupportedBlockSize { blocksize: 36, .. })
        ));
        assert!(RubatoCipher::new(HERA_16, key(16), T).is_err());
        assert!(matches!(
            HeraCipher::new(HERA_16, key(15), T),
            Err(CipherError::InvalidKeyLength { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn modulus_must_fit_the_round_constant_sampler() {
        for modulus in [0, 1, 1u64 << 63] {
            assert!(matches!(
                HeraCipher::new(HERA_16, vec![0; 16], modulus),
                Err(CipherError::InvalidModulus { max_bits: 62, .. })
            ));
        }
        let wide = (1u64 << 61) - 1;
        let hera = HeraCipher::new(HERA_16, key(16), wide).unwrap();
        assert!(hera.keystream(&[5; 16], 0).iter().all(|&w| w < wide));
    }

    #[test]
    fn noise_stays_small() {
        let rubato = RubatoCipher::new(RUBATO_S, key(16), T).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(81);
        let clean = rubato.keystream(&[3; 8], 1);
        let noisy = rubato.keystream_with_noise(&[3; 8], 1, &mut rng).unwrap();
        for (c, n) in clean.iter().zip(&noisy) {
            let diff = sub_mod(*n, *c, T);
            let centered = if diff > T / 2 { T - diff } else { diff };
            assert!(centered <= (RUBATO_S.sigma * 7.0) as u64);
        }
    }

    #[test]
    fn hera_encryption_inverts_with_the_keystream() {
        let hera = HeraCipher::new(HERA_16, key(16), T).unwrap();
        let message: Vec<u64> = (100..116).collect();
        let ct = hera.encrypt(&[1; 8], 9, &message);
        let stream = hera.keystream(&[1; 8], 9);
        let back: Vec<u64> = ct.iter().zip(&stream).map(|(&c, &k)| sub_mod(c, k, T)).collect();
        assert_eq!(back, message);
    }
}
