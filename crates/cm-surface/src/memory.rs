use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Host backing store for a surface.
///
/// The runtime that creates a buffer or 2D/3D surface owns the allocation; the registry only holds
/// a clone of this handle for as long as the surface stays registered. Clones alias the same bytes,
/// so "lookup by pointer" is an identity comparison of the shared allocation.
#[derive(Clone, Default)]
pub struct SurfaceMemory {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl SurfaceMemory {
    /// Allocates `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::from_bytes(vec![0u8; len])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true when both handles refer to the same allocation.
    pub fn same_allocation(&self, other: &SurfaceMemory) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Stable address of the shared allocation, usable as a map key by callers that track
    /// surfaces by their backing pointer.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.bytes) as *const () as usize
    }

    /// Shared access to the bytes.
    ///
    /// A panic on another thread while holding the lock does not invalidate plain bytes, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn read(&self) -> SurfaceBytes<'_> {
        SurfaceBytes(self.bytes.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Exclusive access to the bytes. The length is fixed at allocation; the guard only hands out
    /// a slice.
    pub fn write(&self) -> SurfaceBytesMut<'_> {
        SurfaceBytesMut(self.bytes.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copies the whole backing store out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().to_vec()
    }

    /// Copies `src` into the backing store at `offset`. Returns false (and writes nothing) if the
    /// range does not fit.
    pub fn copy_in(&self, offset: usize, src: &[u8]) -> bool {
        let mut bytes = self.write();
        let Some(end) = offset.checked_add(src.len()) else {
            return false;
        };
        match bytes.get_mut(offset..end) {
            Some(dst) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }
}

/// Read guard over a surface's bytes.
pub struct SurfaceBytes<'a>(RwLockReadGuard<'a, Vec<u8>>);

impl Deref for SurfaceBytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Write guard over a surface's bytes.
pub struct SurfaceBytesMut<'a>(RwLockWriteGuard<'a, Vec<u8>>);

impl Deref for SurfaceBytesMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for SurfaceBytesMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for SurfaceMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceMemory")
            .field("addr", &format_args!("0x{:x}", self.addr()))
            .field("len", &self.len())
            .finish()
    }
}
