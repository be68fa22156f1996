//! Share generation and recovery benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use math_lib::field::Field;
use rand::{rngs::StdRng, SeedableRng};
use shamir_sharing::{share::PolyDegree, ShamirSecretSharer};
use std::sync::Arc;

fn bench_generate(c: &mut Criterion) {
    let field = Arc::new(Field::new(2147483647).unwrap());
    let sharer = ShamirSecretSharer::new(field.clone(), 3, 7, 1).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let secret = field.element(123456789);
    c.bench_function("generate_shares_t7", |bencher| {
        bencher.iter(|| sharer.generate_shares(secret, PolyDegree::T, &mut rng))
    });
}

fn bench_recover(c: &mut Criterion) {
    let field = Arc::new(Field::new(2147483647).unwrap());
    let sharer = ShamirSecretSharer::new(field.clone(), 3, 7, 1).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let secret = field.element(123456789);
    let shares: Vec<_> = sharer.generate_shares(secret, PolyDegree::T, &mut rng).into_iter().map(Some).collect();
    c.bench_function("recover_shares_t7", |bencher| bencher.iter(|| sharer.recover(&shares, PolyDegree::T).unwrap()));
}

criterion_group!(benches, bench_generate, bench_recover);
criterion_main!(benches);
