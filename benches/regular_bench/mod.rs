use criterion::Criterion;

mod alloc;
mod collect;

pub fn bench(c: &mut Criterion) {
    alloc::bench(c);
    collect::bench(c);
}
