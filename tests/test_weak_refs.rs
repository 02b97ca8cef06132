mod common;

use arenagc::memory_manager;
use common::*;

/// A node only reachable through a weak reference, followed by a rooted keeper so the
/// frontier cannot retract over it.
fn weakly_reachable(mode: Mode) {
    let heap = heap();
    let target = node(&heap);
    let keeper = node(&heap);
    set_global(&heap, 0, Some(keeper));
    let weak = memory_manager::new_weak_ref(&heap, Some(target));
    let second = memory_manager::new_weak_ref(&heap, Some(target));
    assert!(heap.weak_refs().is_registered(target.to_raw_address()));

    collect(&heap, mode);
    assert_eq!(weak.get(), None);
    assert_eq!(second.get(), None);
    assert!(!heap.weak_refs().is_registered(target.to_raw_address()));

    let reclaimed = heap
        .largest_gaps()
        .iter()
        .any(|gap| gap.start == target.to_raw_address());
    if mode == Mode::Parallel {
        // The primary context may still be reading it through the handle.
        assert!(!reclaimed);
        assert_eq!(class_at(&heap, target.to_raw_address()), NODE);
        collect(&heap, mode);
        assert!(heap
            .largest_gaps()
            .iter()
            .any(|gap| gap.start == target.to_raw_address()));
    } else {
        assert!(reclaimed);
        assert!(walk(&heap)[0].is_placeholder());
    }
}

fn strongly_reachable(mode: Mode) {
    let heap = heap();
    let target = node(&heap);
    add_handle(&heap, target);
    let weak = memory_manager::new_weak_ref(&heap, Some(target));
    for _ in 0..3 {
        collect(&heap, mode);
        assert_eq!(weak.get(), Some(target));
    }
    assert!(heap.weak_refs().is_registered(target.to_raw_address()));
}

fn null_weak_ref(mode: Mode) {
    let heap = heap();
    let null = memory_manager::new_weak_ref(&heap, None);
    collect(&heap, mode);
    assert_eq!(null.get(), None);
    assert!(heap.weak_refs().is_empty());
}

macro_rules! weak_ref_tests {
    ($($mode:ident),*) => {
        paste::paste! {
            $(
                #[test]
                fn [<weakly_reachable_ $mode:snake>]() {
                    weakly_reachable(Mode::$mode);
                }

                #[test]
                fn [<strongly_reachable_ $mode:snake>]() {
                    strongly_reachable(Mode::$mode);
                }

                #[test]
                fn [<null_weak_ref_ $mode:snake>]() {
                    null_weak_ref(Mode::$mode);
                }
            )*
        }
    };
}

weak_ref_tests!(Synchronous, Incremental, Parallel);
