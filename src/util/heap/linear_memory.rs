use crate::util::conversions::{checked_pages_to_bytes, pages_to_bytes};
use libc::{c_void, PROT_NONE, PROT_READ, PROT_WRITE};
use std::io::Result;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A zero-initialized byte region of `reserved_pages` pages, of which the first
/// `committed_pages` are usable. The region is reserved once, so its base never moves
/// and growing only moves the committed bound.
///
/// The reservation is an anonymous `PROT_NONE` mapping without swap reserve. Committing
/// makes a prefix of it readable and writable; untouched pages cost no memory.
pub struct LinearMemory {
    base: NonNull<u8>,
    reserved_bytes: usize,
    reserved_pages: usize,
    committed_pages: AtomicUsize,
}

// The region is plain bytes. Synchronization of the contents is the job of the arena users.
unsafe impl Send for LinearMemory {}
unsafe impl Sync for LinearMemory {}

impl LinearMemory {
    pub fn new(initial_pages: usize, reserved_pages: usize) -> Self {
        assert!(reserved_pages > 0, "Cannot reserve an empty linear memory");
        assert!(
            initial_pages <= reserved_pages,
            "Cannot commit {} pages out of a reservation of {} pages",
            initial_pages,
            reserved_pages
        );
        let bytes = checked_pages_to_bytes(reserved_pages)
            .unwrap_or_else(|| panic!("Reservation of {} pages overflows", reserved_pages));
        let base = match reserve(bytes) {
            Ok(base) => base,
            Err(e) => panic!("Failed to reserve {} bytes of linear memory: {}", bytes, e),
        };
        let memory = LinearMemory {
            base,
            reserved_bytes: bytes,
            reserved_pages,
            committed_pages: AtomicUsize::new(0),
        };
        if let Err(e) = memory.commit(0, initial_pages) {
            panic!("Failed to commit {} initial pages: {}", initial_pages, e);
        }
        memory.committed_pages.store(initial_pages, Ordering::Release);
        debug!(
            "Reserved {} pages ({} bytes) of linear memory, committed {}",
            reserved_pages, bytes, initial_pages
        );
        memory
    }

    pub fn reserved_pages(&self) -> usize {
        self.reserved_pages
    }

    pub fn reserved_bytes(&self) -> usize {
        self.reserved_bytes
    }

    pub fn committed_pages(&self) -> usize {
        self.committed_pages.load(Ordering::Acquire)
    }

    pub fn committed_bytes(&self) -> usize {
        pages_to_bytes(self.committed_pages())
    }

    /// Commit `pages` more pages. Returns false and leaves the memory unchanged if the
    /// reservation cannot hold them or the OS refuses.
    pub fn grow(&self, pages: usize) -> bool {
        let committed = self.committed_pages();
        match committed.checked_add(pages) {
            Some(new_committed) if new_committed <= self.reserved_pages => {
                if let Err(e) = self.commit(committed, pages) {
                    warn!("Failed to commit {} pages of linear memory: {}", pages, e);
                    return false;
                }
                self.committed_pages.store(new_committed, Ordering::Release);
                trace!("Linear memory grew by {} pages to {}", pages, new_committed);
                true
            }
            _ => false,
        }
    }

    fn commit(&self, first_page: usize, pages: usize) -> Result<()> {
        if pages == 0 {
            return Ok(());
        }
        let start = unsafe { self.base.as_ptr().add(pages_to_bytes(first_page)) };
        let len = pages_to_bytes(pages);
        wrap_libc_call(
            &|| unsafe { libc::mprotect(start as *mut c_void, len, PROT_READ | PROT_WRITE) },
            0,
        )
    }

    /// Raw pointer to `offset` for an access of `len` bytes. Out-of-reservation accesses
    /// are fatal in every build. Accesses past the committed bound are only caught in
    /// debug builds.
    pub(crate) fn ptr(&self, offset: usize, len: usize) -> *mut u8 {
        let end = offset.checked_add(len);
        assert!(
            matches!(end, Some(end) if end <= self.reserved_bytes()),
            "Access of {} bytes at {:#x} is outside the linear memory",
            len,
            offset
        );
        debug_assert!(
            offset + len <= self.committed_bytes(),
            "Access of {} bytes at {:#x} is beyond the committed memory ({} bytes)",
            len,
            offset,
            self.committed_bytes()
        );
        unsafe { self.base.as_ptr().add(offset) }
    }
}

impl Drop for LinearMemory {
    fn drop(&mut self) {
        let base = self.base.as_ptr() as *mut c_void;
        let len = self.reserved_bytes;
        if let Err(e) = wrap_libc_call(&|| unsafe { libc::munmap(base, len) }, 0) {
            warn!("Failed to unmap linear memory: {}", e);
        }
    }
}

/// Map `bytes` of inaccessible address space without swap reserve.
fn reserve(bytes: usize) -> Result<NonNull<u8>> {
    let flags = libc::MAP_ANON | libc::MAP_PRIVATE | libc::MAP_NORESERVE;
    let ptr = unsafe { libc::mmap(std::ptr::null_mut(), bytes, PROT_NONE, flags, -1, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    NonNull::new(ptr as *mut u8).ok_or_else(std::io::Error::last_os_error)
}

fn wrap_libc_call<T: PartialEq>(f: &dyn Fn() -> T, expect: T) -> Result<()> {
    let ret = f();
    if ret == expect {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
