use crate::util::heap::Arena;
use crate::util::{Address, ObjectReference};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A handle that observes an object without keeping it alive.
///
/// Handles watching the same object form a chain hanging off the [`WeakRefTable`]. When the
/// sweep finds the object unreachable it clears every handle of the chain and unlinks it.
pub struct WeakRef {
    address: AtomicUsize,
    next: spin::Mutex<Option<Arc<WeakRef>>>,
}

impl WeakRef {
    fn new(object: Option<ObjectReference>) -> Self {
        WeakRef {
            address: AtomicUsize::new(ObjectReference::slot_value(object)),
            next: spin::Mutex::new(None),
        }
    }

    /// The monitored object, or `None` once it was collected.
    pub fn get(&self) -> Option<ObjectReference> {
        ObjectReference::from_raw_address(Address::from_usize(self.address.load(Ordering::Acquire)))
    }

    fn clear(&self) -> Option<Arc<WeakRef>> {
        self.address.store(0, Ordering::Release);
        self.next.lock().take()
    }
}

impl std::fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WeakRef({:?})", self.get())
    }
}

/// Map from a monitored address to the most recently created handle watching it.
#[derive(Default)]
pub struct WeakRefTable {
    chains: Mutex<HashMap<Address, Arc<WeakRef>>>,
}

impl WeakRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle for `object`. Only dynamically allocated objects are registered;
    /// handles to static data or null never change.
    pub fn new_weak_ref(&self, arena: &Arena, object: Option<ObjectReference>) -> Arc<WeakRef> {
        let weak_ref = Arc::new(WeakRef::new(object));
        if let Some(object) = object {
            let addr = object.to_raw_address();
            if arena.is_dynamic_instance(addr) {
                let mut chains = self.chains.lock().unwrap();
                let previous = chains.insert(addr, weak_ref.clone());
                *weak_ref.next.lock() = previous;
            }
        }
        weak_ref
    }

    /// All monitored addresses in ascending order, followed by [`Address::MAX`] as the
    /// end marker.
    pub fn snapshot_keys(&self) -> Vec<Address> {
        let mut keys: Vec<Address> = self.chains.lock().unwrap().keys().copied().collect();
        keys.sort_unstable();
        keys.push(Address::MAX);
        keys
    }

    /// Clear and unlink every handle watching `addr`. Returns whether there was any.
    pub fn unregister(&self, addr: Address) -> bool {
        let head = self.chains.lock().unwrap().remove(&addr);
        let was_referenced = head.is_some();
        let mut cursor = head;
        let mut cleared = 0;
        while let Some(weak_ref) = cursor {
            cursor = weak_ref.clear();
            cleared += 1;
        }
        if was_referenced {
            trace!("Cleared {} weak references to {}", cleared, addr);
        }
        was_referenced
    }

    pub fn is_registered(&self, addr: Address) -> bool {
        self.chains.lock().unwrap().contains_key(&addr)
    }

    /// Number of monitored addresses.
    pub fn len(&self) -> usize {
        self.chains.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cursor over a sorted key snapshot, advanced in address order by the sweep.
#[derive(Default)]
pub struct WeakRefCursor {
    keys: Vec<Address>,
    index: usize,
}

impl WeakRefCursor {
    pub fn new(keys: Vec<Address>) -> Self {
        debug_assert!(keys.last() == Some(&Address::MAX));
        debug_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        WeakRefCursor { keys, index: 0 }
    }

    /// Advance to the first key at or after `addr` and consume it if it equals `addr`.
    /// Candidates must be passed in ascending order.
    pub fn take(&mut self, addr: Address) -> bool {
        if self.keys.is_empty() {
            return false;
        }
        while self.keys[self.index] < addr {
            self.index += 1;
        }
        if self.keys[self.index] == addr {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.index = 0;
    }
}
