//! Symmetric ciphertext in, CKKS slots out.

mod common;

use std::collections::BTreeSet;

use approx::assert_abs_diff_eq;
use common::{harness, nonces};
use hhe_transcipher::cipher::{CipherCircuit, HERA_16, HeraCipher};
use hhe_transcipher::math::center;
use hhe_transcipher::params::toy_full_slots;
use hhe_transcipher::{CkksEncoder, HalfBootstrapper, SlotsToCoeffs, schedule_for};
use rand::Rng;

#[test]
fn hera_ciphertext_lands_in_ckks_slots() {
    let mut h = harness(toy_full_slots(), 41, |eval| {
        let mut elements: BTreeSet<usize> = SlotsToCoeffs::new(eval).unwrap().required_rotations().into_iter().collect();
        elements.extend(HalfBootstrapper::new(eval).unwrap().required_galois_elements(false));
        elements.into_iter().collect()
    });
    let t = h.ctx.plaintext_modulus();
    let slots = h.ctx.degree();
    let half = h.ctx.half_degree();
    let schedule = schedule_for(&HERA_16, h.ctx.literal()).unwrap();

    // Client side: messages small enough to sit below t / MR.
    let key: Vec<u64> = (0..16).map(|_| h.rng.random_range(0..t)).collect();
    let hera = HeraCipher::new(HERA_16, key.clone(), t).unwrap();
    let nonces = nonces(slots, 41);
    let messages: Vec<Vec<i64>> = (0..slots)
        .map(|_| (0..16).map(|_| h.rng.random_range(-(1 << 19)..(1 << 19))).collect())
        .collect();
    let mut words = vec![vec![0u64; slots]; 16];
    for (slot, nonce) in nonces.iter().enumerate() {
        let reduced: Vec<u64> = messages[slot].iter().map(|&m| m.rem_euclid(t as i64) as u64).collect();
        for (w, c) in hera.encrypt(nonce, 9, &reduced).into_iter().enumerate() {
            words[w][slot] = c;
        }
    }

    // Server side.
    let mut circuit = CipherCircuit::new(HERA_16, h.eval.fork()).unwrap();
    circuit.reset(schedule.initial()).unwrap();
    let keys = circuit.enc_key(&key, &h.encryptor, &mut h.rng).unwrap();
    let stream = circuit.crypt(&nonces, 9, &keys, &schedule).unwrap();
    let data = circuit.transcipher(&stream, &words).unwrap();
    let decrypted = h.decryptor.decrypt_slots(&data[0]).unwrap();
    for slot in 0..slots {
        assert_eq!(center(decrypted[slot], t), messages[slot][0]);
    }

    let stc = SlotsToCoeffs::new(&h.eval).unwrap();
    let coeffs = stc.slots_to_coeffs(&data[0], &schedule).unwrap();
    let hb = HalfBootstrapper::new(&h.eval).unwrap();
    let ckks = hb.from_fv(&coeffs).unwrap();
    let (ct0, ct1) = hb.half_boot(&ckks, false).unwrap();
    assert_eq!(ct0.level(), 1);

    let encoder = CkksEncoder::new(h.ctx.clone());
    let ratio = hb.params().message_ratio / t as f64;
    let lo = encoder.decode_real(&h.decryptor.decrypt_ckks(&ct0).unwrap(), half).unwrap();
    let hi = encoder
        .decode_real(&h.decryptor.decrypt_ckks(&ct1.unwrap()).unwrap(), half)
        .unwrap();
    let tolerance = 2f64.powi(-15);
    for i in 0..half {
        assert_abs_diff_eq!(lo[i], messages[i][0] as f64 * ratio, epsilon = tolerance);
        assert_abs_diff_eq!(hi[i], messages[half + i][0] as f64 * ratio, epsilon = tolerance);
    }
}
