use criterion::{BatchSize, Criterion};

use arenagc::memory_manager;
use arenagc::util::test_util::fixtures::TestHeap;

/// Linked lists of nodes hanging off roots, with one unreachable leaf after every node.
fn populated_heap() -> TestHeap {
    let t = TestHeap::with_options(|options| {
        options.max_heap_pages = 256;
        options.sweep_step_budget = 512;
    });
    for _ in 0..64 {
        let head = t.alloc(t.node);
        t.root(head);
        let mut tail = head;
        for _ in 0..100 {
            t.alloc(t.leaf);
            let next = t.alloc(t.node);
            t.link(tail, 0, Some(next));
            tail = next;
        }
    }
    t
}

pub fn bench(c: &mut Criterion) {
    c.bench_function("collect_synchronous", |b| {
        b.iter_batched(
            populated_heap,
            |t| {
                memory_manager::invoke_synchronous_collection(&t.heap);
                t
            },
            BatchSize::LargeInput,
        )
    });

    c.bench_function("collect_incremental", |b| {
        b.iter_batched(
            populated_heap,
            |t| {
                memory_manager::begin_incremental_collection(&t.heap);
                while !memory_manager::step_incremental_collection(&t.heap) {}
                t
            },
            BatchSize::LargeInput,
        )
    });

    c.bench_function("collect_parallel", |b| {
        b.iter_batched(
            populated_heap,
            |t| {
                memory_manager::begin_parallel_mark(&t.heap);
                std::thread::scope(|scope| {
                    scope.spawn(|| memory_manager::run_parallel_sweep(&t.heap));
                });
                memory_manager::publish_parallel_result(&t.heap);
                t
            },
            BatchSize::LargeInput,
        )
    });
}
