use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hhe_transcipher::params::{toy_full_slots, toy_sparse_slots};
use hhe_transcipher::rings::RnsPoly;
use hhe_transcipher::{CkksEncoder, Context, Encryptor, Evaluator, KeyGenerator};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn random_poly(ctx: &Context, level: usize, seed: u64) -> RnsPoly {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    RnsPoly::sample_uniform(ctx.q_basis(level).clone(), false, &mut rng)
}

fn bench_ntt(c: &mut Criterion) {
    let mut group = c.benchmark_group("rns_ntt");
    let ctx = Context::new(toy_full_slots()).unwrap();

    for level in [0usize, 7, 15] {
        group.bench_with_input(BenchmarkId::new("forward_inverse", level), &level, |b, &level| {
            let poly = random_poly(&ctx, level, 7);
            b.iter(|| {
                let mut p = black_box(poly.clone());
                p.to_ntt_domain();
                p.to_coeff_domain();
                p
            });
        });
    }
    group.finish();
}

fn bench_ntt_mul(c: &mut Criterion) {
    let ctx = Context::new(toy_full_slots()).unwrap();
    let mut a = random_poly(&ctx, 15, 1);
    let mut b = random_poly(&ctx, 15, 2);
    a.to_ntt_domain();
    b.to_ntt_domain();

    c.bench_function("rns_ntt_mul_top_level", |bench| {
        bench.iter(|| {
            let mut p = black_box(a.clone());
            p.mul_assign_ntt(black_box(&b)).unwrap();
            p
        });
    });
}

fn bench_key_switch(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_switch");

    for (name, literal) in [("full_slots", toy_full_slots()), ("sparse", toy_sparse_slots())] {
        let ctx = Context::new(literal).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(123);
        let keygen = KeyGenerator::new(&ctx);
        let secret = keygen.gen_secret_key(&mut rng).unwrap();
        let rotation = ctx.galois_element(1);
        let keys = keygen.gen_evaluation_key(&secret, &[rotation], &mut rng).unwrap();
        let eval = Evaluator::new(ctx.clone(), Arc::new(keys));
        let encryptor = Encryptor::new(ctx.clone(), secret);
        let encoder = CkksEncoder::new(ctx.clone());

        let values: Vec<f64> = (0..ctx.half_degree()).map(|i| i as f64 * 0.01).collect();
        let scale = (1u64 << 45) as f64;
        let pt = encoder.encode_real(&values, scale, ctx.max_level()).unwrap();
        let ct = encryptor.encrypt_ckks(&pt, &mut rng).unwrap();

        group.bench_function(BenchmarkId::new("rotate", name), |b| {
            b.iter(|| eval.rotate(black_box(&ct), 1).unwrap());
        });
        group.bench_function(BenchmarkId::new("mul_relin", name), |b| {
            b.iter(|| eval.mul_relin_ckks(black_box(&ct), black_box(&ct)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ntt, bench_ntt_mul, bench_key_switch);
criterion_main!(benches);
