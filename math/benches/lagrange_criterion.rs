//! Lagrange interpolation benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use math_lib::{
    field::Field,
    lagrange::Lagrange,
    polynomial::{Point, PointSequence},
};

fn bench_interpolate(c: &mut Criterion) {
    let field = Field::new(2147483647).unwrap();
    let abscissas: Vec<_> = (1..=21u64).map(|x| field.element(x)).collect();
    let lagrange = Lagrange::new(&field, abscissas.clone()).unwrap();
    let mut sequence = PointSequence::new();
    for x in abscissas {
        sequence.push(Point::new(x, field.element(x.value() * 7)));
    }
    c.bench_function("lagrange_interpolate_21", |bencher| {
        bencher.iter(|| lagrange.interpolate(&field, &sequence).unwrap())
    });
}

criterion_group!(benches, bench_interpolate);
criterion_main!(benches);
