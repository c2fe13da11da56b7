/// Structural family of a symmetric cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    /// Cube S-box over a 16-wire state.
    Hera,
    /// Quadratic Feistel S-box, truncated output and Gaussian noise.
    Rubato,
}

/// Parameters of one cipher instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CipherParams {
    pub name: &'static str,
    pub kind: CipherKind,
    pub blocksize: usize,
    pub rounds: usize,
    /// Number of keystream words emitted per block.
    pub output_size: usize,
    /// Standard deviation of the client-side keystream noise (Rubato only).
    pub sigma: f64,
}

impl CipherParams {
    /// Side length `v` of the `v x v` state.
    pub fn state_dim(&self) -> usize {
        match self.blocksize {
            16 => 4,
            36 => 6,
            64 => 8,
            _ => 0,
        }
    }

    /// Round constants drawn per block: one per wire and ARK.
    pub fn round_constant_count(&self) -> usize {
        self.blocksize * (self.rounds + 1)
    }
}

pub const HERA_16: CipherParams = CipherParams {
    name: "hera-16",
    kind: CipherKind::Hera,
    blocksize: 16,
    rounds: 5,
    output_size: 16,
    sigma: 0.0,
};

pub const RUBATO_S: CipherParams = CipherParams {
    name: "rubato-s",
    kind: CipherKind::Rubato,
    blocksize: 16,
    rounds: 5,
    output_size: 12,
    sigma: 10.5,
};

pub const RUBATO_M: CipherParams = CipherParams {
    name: "rubato-m",
    kind: CipherKind::Rubato,
    blocksize: 36,
    rounds: 3,
    output_size: 32,
    sigma: 8.7,
};

pub const RUBATO_L: CipherParams = CipherParams {
    name: "rubato-l",
    kind: CipherKind::Rubato,
    blocksize: 64,
    rounds: 2,
    output_size: 60,
    sigma: 4.8,
};

pub const ALL_CIPHERS: [CipherParams; 4] = [HERA_16, RUBATO_S, RUBATO_M, RUBATO_L];
