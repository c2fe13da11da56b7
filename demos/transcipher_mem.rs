#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::collections::BTreeSet;
use std::sync::Arc;

use hhe_transcipher::cipher::{HERA_16, HeraCipher};
use hhe_transcipher::params::toy_full_slots;
use hhe_transcipher::{
    CipherCircuit, CkksEncoder, Context, Decryptor, Encryptor, Evaluator, HalfBootstrapper,
    KeyGenerator, SlotsToCoeffs, schedule_for,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _dhat = dhat::Profiler::new_heap();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Beginning memory profiling for HERA transciphering");

    let ctx = Context::new(toy_full_slots()).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(123);
    let t = ctx.plaintext_modulus();
    let slots = ctx.degree();

    println!("Generating keys...");
    let keygen = KeyGenerator::new(&ctx);
    let secret = keygen.gen_secret_key(&mut rng).unwrap();
    let base_eval = Evaluator::new(
        ctx.clone(),
        Arc::new(keygen.gen_evaluation_key(&secret, &[], &mut rng).unwrap()),
    );
    let mut elements: BTreeSet<usize> = SlotsToCoeffs::new(&base_eval)
        .unwrap()
        .required_rotations()
        .into_iter()
        .collect();
    elements.extend(HalfBootstrapper::new(&base_eval).unwrap().required_galois_elements(false));
    let elements: Vec<usize> = elements.into_iter().collect();
    let keys = keygen.gen_evaluation_key(&secret, &elements, &mut rng).unwrap();
    let eval = Evaluator::new(ctx.clone(), Arc::new(keys));
    let encryptor = Encryptor::new(ctx.clone(), secret.clone());
    let decryptor = Decryptor::new(ctx.clone(), secret);
    println!("Galois keys: {}", elements.len());

    println!("Encrypting on the client...");
    let key: Vec<u64> = (0..HERA_16.blocksize).map(|_| rng.random_range(0..t)).collect();
    let hera = HeraCipher::new(HERA_16, key.clone(), t).unwrap();
    let nonces: Vec<Vec<u8>> = (0..slots as u64).map(|i| i.to_le_bytes().to_vec()).collect();
    let messages: Vec<u64> = (0..slots as u64).map(|i| i * 1000).collect();
    let mut words = vec![vec![0u64; slots]; HERA_16.output_size];
    for (slot, nonce) in nonces.iter().enumerate() {
        let block = vec![messages[slot]; HERA_16.output_size];
        for (w, c) in hera.encrypt(nonce, 0, &block).into_iter().enumerate() {
            words[w][slot] = c;
        }
    }

    println!("Evaluating the keystream...");
    let schedule = schedule_for(&HERA_16, ctx.literal()).unwrap();
    let mut circuit = CipherCircuit::new(HERA_16, eval.fork()).unwrap();
    circuit.reset(schedule.initial()).unwrap();
    let enc_keys = circuit.enc_key(&key, &encryptor, &mut rng).unwrap();
    let stream = circuit.crypt(&nonces, 0, &enc_keys, &schedule).unwrap();
    let data = circuit.transcipher(&stream, &words).unwrap();

    println!("Moving to CKKS...");
    let stc = SlotsToCoeffs::new(&eval).unwrap();
    let coeffs = stc.slots_to_coeffs(&data[0], &schedule).unwrap();
    let hb = HalfBootstrapper::new(&eval).unwrap();
    let ckks = hb.from_fv(&coeffs).unwrap();
    let (lo, hi) = hb.half_boot(&ckks, false).unwrap();

    let encoder = CkksEncoder::new(ctx.clone());
    let half = ctx.half_degree();
    let ratio = hb.params().message_ratio / t as f64;
    let lo = encoder.decode_real(&decryptor.decrypt_ckks(&lo).unwrap(), half).unwrap();
    println!("Slot 1: {:.6} (expected {:.6})", lo[1], messages[1] as f64 * ratio);
    if let Some(hi) = hi {
        let hi = encoder.decode_real(&decryptor.decrypt_ckks(&hi).unwrap(), half).unwrap();
        println!("Slot {}: {:.6} (expected {:.6})", half + 1, hi[1], messages[half + 1] as f64 * ratio);
    }

    println!("Memory profiling complete!");
}
