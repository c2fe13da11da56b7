//! Modulus-drop schedules and the calibrated tables replayed by key-less servers.

use crate::cipher::params::CipherParams;

use super::ParametersLiteral;

/// How many trailing primes to drop at each point of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModulusSchedule {
    /// Entry 0 is the initial switch applied at key encryption; entry `r`
    /// follows round `r`'s nonlinear layer.
    pub cipher: Vec<usize>,
    /// One entry per slots-to-coeffs factor.
    pub transform: Vec<usize>,
}

impl ModulusSchedule {
    pub fn new(cipher: Vec<usize>, transform: Vec<usize>) -> Self {
        Self { cipher, transform }
    }

    /// A schedule that never switches, for depth probing.
    pub fn none(rounds: usize, transform_depth: usize) -> Self {
        Self {
            cipher: vec![0; rounds + 1],
            transform: vec![0; transform_depth],
        }
    }

    pub fn initial(&self) -> usize {
        self.cipher.first().copied().unwrap_or(0)
    }

    /// Total number of primes the schedule drops.
    pub fn total(&self) -> usize {
        self.cipher.iter().chain(&self.transform).sum()
    }
}

/// Calibrated schedule for a cipher on a ring parameter set, if one is tabulated.
///
/// Entries drop one prime per round and per transform factor. Replaying them
/// keeps a positive noise budget through the cipher and slots-to-coeffs on
/// the shipped rings.
pub fn schedule_for(cipher: &CipherParams, ring: &ParametersLiteral) -> Option<ModulusSchedule> {
    let (cipher_drops, transform_drops): (&[usize], &[usize]) = match (cipher.name, ring.name) {
        ("hera-16", "toy-full" | "toy-sparse") => (&[0, 1, 1, 1, 1, 1], &[1, 1]),
        ("rubato-s", "toy-full" | "toy-sparse") => (&[0, 1, 1, 1, 1, 1], &[1, 1]),
        ("rubato-m", "toy-full" | "toy-sparse") => (&[0, 1, 1, 1], &[1, 1]),
        ("rubato-l", "toy-full" | "toy-sparse") => (&[0, 1, 1], &[1, 1]),
        ("hera-16", "prod-full") => (&[0, 1, 1, 1, 1, 1], &[1, 1, 1]),
        ("rubato-s", "prod-full") => (&[0, 1, 1, 1, 1, 1], &[1, 1, 1]),
        ("rubato-m", "prod-full") => (&[0, 1, 1, 1], &[1, 1, 1]),
        ("rubato-l", "prod-full") => (&[0, 1, 1], &[1, 1, 1]),
        _ => return None,
    };
    Some(ModulusSchedule::new(cipher_drops.to_vec(), transform_drops.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::params::ALL_CIPHERS;
    use crate::params::{production_full_slots, toy_full_slots};

    #[test]
    fn tables_match_cipher_and_transform_shapes() {
        for ring in [toy_full_slots(), production_full_slots()] {
            for cipher in ALL_CIPHERS {
                let schedule = schedule_for(&cipher, &ring).unwrap();
                assert_eq!(schedule.cipher.len(), cipher.rounds + 1, "{}", cipher.name);
                assert_eq!(schedule.transform.len(), ring.stc_depth);
                assert!(schedule.total() < ring.max_level());
            }
        }
    }

    #[test]
    fn unknown_pairs_have_no_table() {
        let mut ring = toy_full_slots();
        ring.name = "custom";
        assert!(schedule_for(&ALL_CIPHERS[0], &ring).is_none());
    }

    #[test]
    fn none_schedule_never_switches() {
        let schedule = ModulusSchedule::none(5, 2);
        assert_eq!(schedule.total(), 0);
        assert_eq!(schedule.cipher.len(), 6);
    }
}
