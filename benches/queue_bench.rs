// Lock-free task queue performance benchmarks.
// Tests single-threaded throughput and multi-producer contention for the
// Michael-Scott queue backing each tenant's thread group.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tenant_core::concurrent::LockFreeQueue;

fn bench_single_thread_enqueue_dequeue(c: &mut Criterion) {
    c.bench_function("enqueue_dequeue_single_thread", |b| {
        let queue: LockFreeQueue<u64> = LockFreeQueue::new();
        b.iter(|| {
            queue.enqueue(black_box(1));
            black_box(queue.dequeue());
        });
    });
}

fn bench_producer_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_producers");

    for producers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(producers), &producers, |b, &producers| {
            b.iter(|| {
                let queue: Arc<LockFreeQueue<u64>> = Arc::new(LockFreeQueue::new());
                std::thread::scope(|scope| {
                    for _ in 0..producers {
                        let queue = queue.clone();
                        scope.spawn(move || {
                            for i in 0..1_000u64 {
                                queue.enqueue(i);
                            }
                        });
                    }
                });
                while queue.dequeue().is_some() {}
            });
        });
    }

    group.finish();
}

fn bench_enqueue_batch(c: &mut Criterion) {
    c.bench_function("enqueue_batch_1000", |b| {
        b.iter(|| {
            let queue: LockFreeQueue<u64> = LockFreeQueue::new();
            queue.enqueue_batch(black_box((0..1000).collect()));
            black_box(queue.dequeue_batch(1000));
        });
    });
}

criterion_group!(benches, bench_single_thread_enqueue_dequeue, bench_producer_counts, bench_enqueue_batch);
criterion_main!(benches);
