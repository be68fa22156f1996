use criterion::{black_box, criterion_group, criterion_main, Criterion};
use math_lib::field::Field;
use primitives::operation::multiplication::Multiplication;
use primitives::operation::{OperationContext, PrimitiveOperation};
use primitives::predicate_cache::PredicateCache;
use primitives::scheduler::Scheduler;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::ShamirSecretSharer;
use std::sync::Arc;

const PRIME: u64 = 2_147_483_647;

fn build_ctx(peer_count: usize, degree: u64) -> OperationContext {
    let field = Arc::new(Field::new(PRIME).unwrap());
    let sharer = Arc::new(ShamirSecretSharer::new(field, degree, peer_count, 1).unwrap());
    OperationContext { sharer, predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares: false }
}

/// Measures admission throughput: submitting more operations than fit in a single
/// `parallel_operations_count` slot, relying on the scheduler's FIFO overflow queue.
fn bench_submit_and_step(c: &mut Criterion) {
    let ctx = build_ctx(5, 2);
    c.bench_function("scheduler: submit 64 multiplications, parallel cap 8", |b| {
        b.iter(|| {
            let mut scheduler = Scheduler::new(ctx.clone(), 8);
            let field = ctx.sharer.field();
            for id in 0..64u64 {
                let op = Multiplication::new(id, field.element(3), field.element(5), ChaCha20Rng::seed_from_u64(id));
                scheduler.submit(id, Box::new(op));
            }
            while !scheduler.batch_complete() {
                // Drive a round locally: there's only one scheduler instance here, so loop its
                // own reshares back into every peer slot they're addressed to rather than just
                // peer 1's, or `Multiplication::recover` would never see enough shares to finish.
                for peer_index in 1..=5 {
                    let mut outbound = Vec::new();
                    scheduler.copy_outbound_shares(peer_index, &mut outbound);
                    scheduler.copy_inbound_shares(peer_index, &outbound).unwrap();
                }
                scheduler.step().unwrap();
            }
            black_box(scheduler.drain_batch());
        });
    });
}

/// Measures a single round-trip of the core degree-reduction step multiplication relies on,
/// isolating it from scheduler overhead.
fn bench_multiplication_round_trip(c: &mut Criterion) {
    let ctx = build_ctx(5, 2);
    let field = ctx.sharer.field();
    c.bench_function("multiplication: local product + reshare + combine", |b| {
        b.iter(|| {
            let mut op =
                Multiplication::new(1, field.element(11), field.element(13), ChaCha20Rng::seed_from_u64(1));
            op.do_step(&ctx).unwrap();
            for peer_index in 1..=5 {
                let mut outbound = Vec::new();
                op.copy_outbound_shares(peer_index, &mut outbound);
                op.copy_inbound_shares(peer_index, black_box(&outbound)).unwrap();
            }
            op.do_step(&ctx).unwrap();
            assert!(op.is_complete());
            black_box(op.final_result().unwrap());
        });
    });
}

criterion_group!(scheduler, bench_submit_and_step, bench_multiplication_round_trip);
criterion_main!(scheduler);
