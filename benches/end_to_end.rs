use std::collections::BTreeSet;
use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use hhe_transcipher::cipher::{HERA_16, RUBATO_S};
use hhe_transcipher::params::toy_full_slots;
use hhe_transcipher::{
    CipherCircuit, Context, Encryptor, Evaluator, HalfBootstrapper, KeyGenerator,
    SlotsToCoeffs, schedule_for,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

struct Setup {
    ctx: Arc<Context>,
    eval: Evaluator,
    encryptor: Encryptor,
    rng: ChaCha20Rng,
}

fn setup() -> Setup {
    let ctx = Context::new(toy_full_slots()).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(123);
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
    Setup {
        eval: Evaluator::new(ctx.clone(), Arc::new(keys)),
        encryptor: Encryptor::new(ctx.clone(), secret),
        ctx,
        rng,
    }
}

fn bench_keystream(c: &mut Criterion) {
    let mut group = c.benchmark_group("homomorphic_keystream");
    group.sample_size(10);
    let mut s = setup();
    let t = s.ctx.plaintext_modulus();
    let nonces: Vec<Vec<u8>> = (0..s.ctx.degree() as u64).map(|i| i.to_le_bytes().to_vec()).collect();

    for params in [HERA_16, RUBATO_S] {
        let schedule = schedule_for(&params, s.ctx.literal()).unwrap();
        let key: Vec<u64> = (0..params.blocksize).map(|_| s.rng.random_range(0..t)).collect();
        let name = params.name;
        let mut circuit = CipherCircuit::new(params, s.eval.fork()).unwrap();
        circuit.reset(schedule.initial()).unwrap();
        let keys = circuit.enc_key(&key, &s.encryptor, &mut s.rng).unwrap();

        group.bench_function(name, |b| {
            b.iter(|| circuit.crypt(black_box(&nonces), 0, &keys, &schedule).unwrap());
        });
    }
    group.finish();
}

fn bench_half_boot(c: &mut Criterion) {
    let mut group = c.benchmark_group("half_boot");
    group.sample_size(10);
    let mut s = setup();
    let slots: Vec<u64> = (0..s.ctx.degree() as u64).collect();
    let level = s.ctx.max_level();
    let fv = s.encryptor.encrypt_slots(&slots, level, &mut s.rng).unwrap();
    let stc = SlotsToCoeffs::new(&s.eval).unwrap();
    let coeffs = stc.slots_to_coeffs_no_mod_switch(&fv).unwrap();
    let hb = HalfBootstrapper::new(&s.eval).unwrap();
    let ckks = hb.from_fv(&coeffs).unwrap();

    group.bench_function("slots_to_coeffs", |b| {
        b.iter(|| stc.slots_to_coeffs_no_mod_switch(black_box(&fv)).unwrap());
    });
    group.bench_function("full_slots", |b| {
        b.iter(|| hb.half_boot(black_box(&ckks), false).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_keystream, bench_half_boot);
criterion_main!(benches);
