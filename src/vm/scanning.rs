use crate::util::ObjectReference;

/// Callback trait of root scanning functions that report objects.
pub trait RootVisitor {
    /// Call this function for each object the host keeps alive.
    fn visit_root(&mut self, object: ObjectReference);
}

/// This lets us use closures as RootVisitor.
impl<F: FnMut(ObjectReference)> RootVisitor for F {
    fn visit_root(&mut self, object: ObjectReference) {
        self(object)
    }
}

/// Root enumeration beyond the static reference fields.
pub trait Scanning: Send + Sync + 'static {
    /// Report every object referenced from outside the arena, such as handles held by the
    /// embedding host. Called once per mark phase, after the static roots were traced.
    fn scan_external_roots(&self, visitor: &mut dyn RootVisitor);
}
