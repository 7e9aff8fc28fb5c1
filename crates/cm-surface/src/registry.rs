use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::{BufferKind, SurfaceError, SurfaceFormat, SurfaceId, SurfaceMemory, SurfaceResult};

/// Arguments of a register call.
///
/// Buffers only need `width`; 2D/3D surfaces add height, format, depth and pitch.
#[derive(Clone, Debug)]
pub struct Registration {
    pub id: SurfaceId,
    pub kind: BufferKind,
    pub memory: SurfaceMemory,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub pitch: u32,
    pub format: SurfaceFormat,
    pub volatile: Option<SurfaceMemory>,
}

impl Registration {
    /// A linear buffer `width` bytes long.
    pub fn buffer(id: SurfaceId, kind: BufferKind, memory: SurfaceMemory, width: u32) -> Self {
        Self {
            id,
            kind,
            memory,
            width,
            height: 1,
            depth: 1,
            pitch: 0,
            format: SurfaceFormat::Raw,
            volatile: None,
        }
    }

    /// A 2D surface, `width` in bytes.
    pub fn surface_2d(
        id: SurfaceId,
        kind: BufferKind,
        memory: SurfaceMemory,
        width: u32,
        height: u32,
        format: SurfaceFormat,
    ) -> Self {
        Self {
            height,
            format,
            ..Self::buffer(id, kind, memory, width)
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_pitch(mut self, pitch: u32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_format(mut self, format: SurfaceFormat) -> Self {
        self.format = format;
        self
    }

    /// Separate mutable view for an input/output surface. Without one, the volatile view aliases
    /// the primary memory.
    pub fn with_volatile(mut self, memory: SurfaceMemory) -> Self {
        self.volatile = Some(memory);
        self
    }
}

/// One registered surface.
#[derive(Clone, Debug)]
pub struct SurfaceDescriptor {
    id: SurfaceId,
    kind: BufferKind,
    format: SurfaceFormat,
    width: u32,
    height: u32,
    depth: u32,
    pitch: u32,
    primary: SurfaceMemory,
    volatile: Option<SurfaceMemory>,
}

impl SurfaceDescriptor {
    fn build(reg: Registration) -> SurfaceResult<Self> {
        let Registration {
            id,
            kind,
            memory,
            width,
            height,
            depth,
            pitch,
            format,
            volatile,
        } = reg;

        let volatile = match (kind, volatile) {
            (BufferKind::InputOutput, Some(volatile)) => Some(volatile),
            (BufferKind::InputOutput, None) => Some(memory.clone()),
            (_, Some(_)) => return Err(SurfaceError::UnexpectedVolatileView { id, kind }),
            (_, None) => None,
        };

        let desc = Self {
            id,
            kind,
            format,
            width,
            height,
            depth,
            pitch,
            primary: memory,
            volatile,
        };
        desc.validate()?;
        Ok(desc)
    }

    fn validate(&self) -> SurfaceResult<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(SurfaceError::ZeroSizedSurface {
                id: self.id,
                width: self.width,
                height: self.height,
                depth: self.depth,
            });
        }

        let required = self.required_bytes();
        for memory in std::iter::once(&self.primary).chain(self.volatile.as_ref()) {
            let actual = memory.len() as u64;
            if actual < required {
                return Err(SurfaceError::BackingTooSmall {
                    id: self.id,
                    required,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Bytes the backing store must hold: every row of every slice, plus the chroma plane for
    /// planar 4:2:0 surfaces.
    pub fn required_bytes(&self) -> u64 {
        let rows = u64::from(self.height) + u64::from(self.chroma_rows());
        self.row_pitch() * rows * u64::from(self.depth)
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    /// Width in bytes.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Pitch as registered; 0 means "same as width".
    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    /// Distance in bytes between the starts of two consecutive rows.
    pub fn row_pitch(&self) -> u64 {
        u64::from(self.pitch.max(self.width))
    }

    /// Rows of the interleaved chroma plane that follows the luma plane, 0 for non-planar formats.
    pub fn chroma_rows(&self) -> u32 {
        if self.format.is_planar_420() {
            self.height / 2
        } else {
            0
        }
    }

    /// `width * height`, the linear extent used by scattered and atomic bounds checks.
    pub fn extent(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Read-only view.
    pub fn primary(&self) -> &SurfaceMemory {
        &self.primary
    }

    /// Mutable view, present only for input/output surfaces.
    pub fn volatile(&self) -> Option<&SurfaceMemory> {
        self.volatile.as_ref()
    }

    fn uses_memory(&self, memory: &SurfaceMemory) -> bool {
        self.primary.same_allocation(memory)
            || self
                .volatile
                .as_ref()
                .is_some_and(|volatile| volatile.same_allocation(memory))
    }
}

/// In-place change to a registered surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfacePatch {
    /// Move the descriptor to another id, as the runtime does when it compacts its index space.
    Id(SurfaceId),
    Kind(BufferKind),
    Format(SurfaceFormat),
    Width(u32),
    Height(u32),
    Depth(u32),
    Pitch(u32),
}

/// Table from surface id to descriptor.
///
/// The table lock is held only while looking up or replacing an entry; callers get an
/// `Arc<SurfaceDescriptor>` and lock that surface's memory themselves.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: RwLock<HashMap<SurfaceId, Arc<SurfaceDescriptor>>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the descriptor, replacing any previous registration for the same id.
    pub fn register(&self, reg: Registration) -> SurfaceResult<Arc<SurfaceDescriptor>> {
        let desc = Arc::new(SurfaceDescriptor::build(reg)?);
        let mut surfaces = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = surfaces.insert(desc.id, Arc::clone(&desc)).is_some();
        debug!(
            id = desc.id.index(),
            kind = %desc.kind,
            format = %desc.format,
            width = desc.width,
            height = desc.height,
            depth = desc.depth,
            replaced,
            "registered surface"
        );
        Ok(desc)
    }

    /// Removes the descriptor for `id`, returning it.
    pub fn unregister(&self, id: SurfaceId) -> SurfaceResult<Arc<SurfaceDescriptor>> {
        let mut surfaces = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
        let desc = surfaces
            .remove(&id)
            .ok_or(SurfaceError::NotRegistered { id })?;
        debug!(id = id.index(), "unregistered surface");
        Ok(desc)
    }

    pub fn lookup(&self, id: SurfaceId) -> SurfaceResult<Arc<SurfaceDescriptor>> {
        let surfaces = self.surfaces.read().unwrap_or_else(PoisonError::into_inner);
        surfaces
            .get(&id)
            .cloned()
            .ok_or(SurfaceError::NotRegistered { id })
    }

    /// Finds the surface whose primary or volatile view is `memory`.
    pub fn lookup_by_memory(&self, memory: &SurfaceMemory) -> Option<Arc<SurfaceDescriptor>> {
        let surfaces = self.surfaces.read().unwrap_or_else(PoisonError::into_inner);
        surfaces
            .values()
            .find(|desc| desc.uses_memory(memory))
            .cloned()
    }

    pub fn lookup_by_memory_and_kind(
        &self,
        memory: &SurfaceMemory,
        kind: BufferKind,
    ) -> Option<Arc<SurfaceDescriptor>> {
        let surfaces = self.surfaces.read().unwrap_or_else(PoisonError::into_inner);
        surfaces
            .values()
            .find(|desc| desc.kind == kind && desc.uses_memory(memory))
            .cloned()
    }

    /// Applies `patch` to a registered surface without unregistering it.
    ///
    /// Geometry patches are re-validated against the backing store; on failure the old
    /// descriptor stays in place.
    pub fn modify(&self, id: SurfaceId, patch: SurfacePatch) -> SurfaceResult<Arc<SurfaceDescriptor>> {
        let mut surfaces = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
        let current = surfaces.get(&id).ok_or(SurfaceError::NotRegistered { id })?;

        let mut next = SurfaceDescriptor::clone(current);
        match patch {
            SurfacePatch::Id(new_id) => {
                if new_id != id && surfaces.contains_key(&new_id) {
                    return Err(SurfaceError::IdInUse { id: new_id });
                }
                next.id = new_id;
            }
            SurfacePatch::Kind(kind) => {
                next.volatile = match kind {
                    BufferKind::InputOutput => next.volatile.or_else(|| Some(next.primary.clone())),
                    _ => None,
                };
                next.kind = kind;
            }
            SurfacePatch::Format(format) => next.format = format,
            SurfacePatch::Width(width) => next.width = width,
            SurfacePatch::Height(height) => next.height = height,
            SurfacePatch::Depth(depth) => next.depth = depth,
            SurfacePatch::Pitch(pitch) => next.pitch = pitch,
        }
        next.validate()?;

        let next = Arc::new(next);
        surfaces.remove(&id);
        surfaces.insert(next.id, Arc::clone(&next));
        debug!(id = id.index(), ?patch, "modified surface");
        Ok(next)
    }

    pub fn len(&self) -> usize {
        self.surfaces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<SurfaceId> {
        let surfaces = self.surfaces.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = surfaces.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
