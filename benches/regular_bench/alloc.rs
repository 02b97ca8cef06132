use criterion::{BatchSize, Criterion};

use arenagc::memory_manager;
use arenagc::util::test_util::fixtures::TestHeap;

pub fn bench(c: &mut Criterion) {
    c.bench_function("alloc_bump", |b| {
        b.iter_batched(
            || TestHeap::with_options(|options| options.max_heap_pages = 256),
            |t| {
                for _ in 0..10_000 {
                    memory_manager::allocate(&t.heap, 32).unwrap();
                }
                t
            },
            BatchSize::LargeInput,
        )
    });

    // Every other object is garbage, so each allocation after the collection claims a gap.
    c.bench_function("alloc_from_gaps", |b| {
        b.iter_batched(
            || {
                let t = TestHeap::with_options(|options| options.max_heap_pages = 256);
                for i in 0..10_000 {
                    let object = t.alloc(t.leaf);
                    if i % 2 == 0 {
                        t.root(object);
                    }
                }
                memory_manager::invoke_synchronous_collection(&t.heap);
                t
            },
            |t| {
                while memory_manager::has_reclaimable_space(&t.heap) {
                    t.alloc(t.leaf);
                }
                t
            },
            BatchSize::LargeInput,
        )
    });
}
