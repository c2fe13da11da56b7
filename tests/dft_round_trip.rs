use approx::assert_abs_diff_eq;
use hhe_transcipher::params::PLAINTEXT_MODULUS;
use hhe_transcipher::rings::NttTable;
use hhe_transcipher::transform::dft::{RootTable, forward_factors, inverse_factors};
use hhe_transcipher::transform::{ComplexArith, DiagonalMatrix, SlotArith, ZtArith};
use num_complex::Complex64;
use proptest::prelude::*;

const DIM: usize = 16;

fn apply_all<A: SlotArith>(arith: &A, factors: &[DiagonalMatrix<A::Elem>], v: &[A::Elem]) -> Vec<A::Elem> {
    factors.iter().fold(v.to_vec(), |acc, f| f.apply(&acc, arith))
}

fn zt_roots() -> RootTable<u64> {
    let table = NttTable::new(PLAINTEXT_MODULUS, 2 * DIM).unwrap();
    RootTable::new((0..4 * DIM).map(|e| table.psi_pow(e)).collect())
}

proptest! {
    #[test]
    fn zt_factorisation_is_exactly_invertible(
        v in prop::collection::vec(0..PLAINTEXT_MODULUS, DIM),
        forward_depth in 1usize..=4,
        inverse_depth in 1usize..=4,
    ) {
        let arith = ZtArith { modulus: PLAINTEXT_MODULUS };
        let roots = zt_roots();
        let there = apply_all(&arith, &forward_factors(&arith, &roots, DIM, forward_depth), &v);
        let back = apply_all(&arith, &inverse_factors(&arith, &roots, DIM, inverse_depth), &there);
        prop_assert_eq!(back, v);
    }

    #[test]
    fn complex_factorisation_round_trips(
        parts in prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), DIM),
        depth in 1usize..=4,
    ) {
        let v: Vec<Complex64> = parts.iter().map(|&(re, im)| Complex64::new(re, im)).collect();
        let roots = RootTable::complex(DIM);
        let there = apply_all(&ComplexArith, &forward_factors(&ComplexArith, &roots, DIM, depth), &v);
        let back = apply_all(&ComplexArith, &inverse_factors(&ComplexArith, &roots, DIM, depth), &there);
        for (a, b) in back.iter().zip(&v) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 2f64.powi(-20));
            assert_abs_diff_eq!(a.im, b.im, epsilon = 2f64.powi(-20));
        }
    }
}
