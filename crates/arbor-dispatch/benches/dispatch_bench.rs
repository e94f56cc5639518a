use arbor_core::{Ref, RefCounted, Referenced};
use arbor_dispatch::{FnOperation, Operation, OperationContext, OperationQueue};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

struct Node {
    referenced: Referenced,
}

// SAFETY: the record is a field of `Node`.
unsafe impl RefCounted for Node {
    fn referenced(&self) -> &Referenced {
        &self.referenced
    }
}

fn bench_queue(c: &mut Criterion) {
    let queue = OperationQueue::new();
    let op: Arc<dyn Operation> = Arc::new(FnOperation::once("noop", |_| {}));

    let mut group = c.benchmark_group("Operation Queue");

    group.bench_function("Push + Pop (one-shot)", |b| {
        b.iter(|| {
            queue.push(Arc::clone(&op));
            black_box(queue.pop(false));
        });
    });

    group.bench_function("Run All (64 one-shots)", |b| {
        b.iter(|| {
            for _ in 0..64 {
                queue.push(Arc::clone(&op));
            }
            queue.run_all(&OperationContext::detached());
        });
    });

    group.finish();
}

fn bench_handles(c: &mut Criterion) {
    let node = Ref::new(Node {
        referenced: Referenced::new(),
    });

    let mut group = c.benchmark_group("Counted Handles");

    group.bench_function("Clone + Drop", |b| {
        b.iter(|| black_box(node.clone()));
    });

    group.bench_function("Weak Upgrade", |b| {
        let weak = Ref::downgrade(&node);
        b.iter(|| black_box(weak.upgrade()));
    });

    group.finish();
}

criterion_group!(benches, bench_queue, bench_handles);
criterion_main!(benches);
