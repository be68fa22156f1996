//! Field arithmetic benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use math_lib::field::Field;

fn bench_mul(c: &mut Criterion) {
    let field = Field::new(2147483647).unwrap();
    let a = field.element(123456789);
    let b = field.element(987654321);
    c.bench_function("field_mul", |bencher| bencher.iter(|| field.mul(a, b)));
}

fn bench_inv(c: &mut Criterion) {
    let field = Field::new(2147483647).unwrap();
    let a = field.element(123456789);
    c.bench_function("field_inv", |bencher| bencher.iter(|| field.inv(a).unwrap()));
}

criterion_group!(benches, bench_mul, bench_inv);
criterion_main!(benches);
