pub mod modular;
pub mod primes;
pub mod sampling;

pub use modular::{
    add_mod, bit_len, center, inv_mod, mul_mod, neg_mod, pow_mod, reduce_signed, reverse_bits,
    sub_mod,
};
pub use primes::{generate_ntt_primes, is_ntt_friendly_prime, is_prime};
pub use sampling::{gaussian_integers, ternary_integers, uniform_residues};
