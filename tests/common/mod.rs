#![allow(dead_code)]

use std::sync::Arc;

use hhe_transcipher::{
    Context, Decryptor, Encryptor, Evaluator, KeyGenerator, ParametersLiteral, SecretKey,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

pub struct Harness {
    pub ctx: Arc<Context>,
    pub eval: Evaluator,
    pub encryptor: Encryptor,
    pub decryptor: Decryptor,
    pub secret: SecretKey,
    pub rng: ChaCha20Rng,
}

/// Keys for `literal` with the Galois elements returned by `galois`, which
/// sees an evaluator holding only the relinearization key.
pub fn harness(
    literal: ParametersLiteral,
    seed: u64,
    galois: impl FnOnce(&Evaluator) -> Vec<usize>,
) -> Harness {
    let ctx = Context::new(literal).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let keygen = KeyGenerator::new(&ctx);
    let secret = keygen.gen_secret_key(&mut rng).unwrap();
    let base_eval = Evaluator::new(
        ctx.clone(),
        Arc::new(keygen.gen_evaluation_key(&secret, &[], &mut rng).unwrap()),
    );
    let elements = galois(&base_eval);
    let keys = keygen.gen_evaluation_key(&secret, &elements, &mut rng).unwrap();
    Harness {
        eval: Evaluator::new(ctx.clone(), Arc::new(keys)),
        encryptor: Encryptor::new(ctx.clone(), secret.clone()),
        decryptor: Decryptor::new(ctx.clone(), secret.clone()),
        secret,
        ctx,
        rng,
    }
}

/// One distinct 16-byte nonce per FV slot.
pub fn nonces(count: usize, tag: u64) -> Vec<Vec<u8>> {
    (0..count as u64)
        .map(|i| [tag.to_le_bytes(), i.to_le_bytes()].concat())
        .collect()
}
