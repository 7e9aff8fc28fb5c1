use std::sync::Arc;

use cm_surface::{
    BufferKind, Registration, SurfaceDescriptor, SurfaceError, SurfaceId, SurfaceMemory, SurfacePatch,
    SurfaceRegistry,
};
use tracing::{trace, warn};

use crate::attrib::BufferAttrib;
use crate::config::DataportConfig;
use crate::error::{DataportError, Result};
use crate::stats::{DataportStats, LaneTally};

/// Everything a dataport call needs: the surface table, the emulation options and counters.
///
/// One context stands in for one emulated device. It is `Sync`; emulated hardware threads share
/// it by reference and every dataport operation is a method on it.
#[derive(Debug, Default)]
pub struct EmuContext {
    registry: SurfaceRegistry,
    config: DataportConfig,
    stats: DataportStats,
}

impl EmuContext {
    pub fn new(config: DataportConfig) -> Self {
        Self {
            registry: SurfaceRegistry::new(),
            config,
            stats: DataportStats::new(),
        }
    }

    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DataportConfig {
        &self.config
    }

    pub fn stats(&self) -> &DataportStats {
        &self.stats
    }

    pub fn register(&self, reg: Registration) -> Result<Arc<SurfaceDescriptor>> {
        Ok(self.registry.register(reg)?)
    }

    pub fn unregister(&self, id: SurfaceId) -> Result<Arc<SurfaceDescriptor>> {
        Ok(self.registry.unregister(id)?)
    }

    pub fn modify(&self, id: SurfaceId, patch: SurfacePatch) -> Result<Arc<SurfaceDescriptor>> {
        Ok(self.registry.modify(id, patch)?)
    }

    pub fn lookup(&self, id: SurfaceId) -> Result<Arc<SurfaceDescriptor>> {
        Ok(self.registry.lookup(id)?)
    }

    /// Runs one dataport call, accounting for it and logging a rejection.
    pub(crate) fn dispatch<T>(
        &self,
        op: &'static str,
        id: Option<SurfaceId>,
        call: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        trace!(op, id = id.map(SurfaceId::index), "dataport call");
        let result = call();
        if let Err(err) = &result {
            self.stats.inc_rejected();
            warn!(op, id = id.map(SurfaceId::index), %err, "dataport call rejected");
        }
        result
    }

    pub(crate) fn finish(&self, lanes: LaneTally) {
        self.stats.add_lanes(lanes);
    }

    /// Looks up `id`, attributing a miss to `op`.
    pub(crate) fn resolve(&self, id: SurfaceId, op: &'static str) -> Result<Arc<SurfaceDescriptor>> {
        self.registry.lookup(id).map_err(|err| match err {
            SurfaceError::NotRegistered { id } => DataportError::SurfaceNotRegistered { id, op },
            other => other.into(),
        })
    }
}

/// View a block or scattered read goes through.
///
/// Reads need an input or input/output surface. "Modified" and constant reads need an
/// input/output surface and go through its volatile view.
pub(crate) fn block_read_view<'a>(
    desc: &'a SurfaceDescriptor,
    attrib: BufferAttrib,
    op: &'static str,
) -> Result<&'a SurfaceMemory> {
    if attrib.reads_volatile_view() {
        return volatile_view(desc, op);
    }
    match desc.kind() {
        BufferKind::Input | BufferKind::InputOutput => Ok(desc.primary()),
        kind => Err(invalid_kind(desc, op, kind, "an input or input/output buffer")),
    }
}

/// View a block or scattered write goes through.
pub(crate) fn block_write_view<'a>(desc: &'a SurfaceDescriptor, op: &'static str) -> Result<&'a SurfaceMemory> {
    match desc.kind() {
        BufferKind::Output => Ok(desc.primary()),
        BufferKind::InputOutput => volatile_view(desc, op),
        kind => Err(invalid_kind(desc, op, kind, "an output or input/output buffer")),
    }
}

/// View a typed or untyped read goes through. Input/output surfaces are read through the volatile
/// view so typed writes and atomics from the same kernel are visible.
pub(crate) fn resource_read_view<'a>(desc: &'a SurfaceDescriptor, op: &'static str) -> Result<&'a SurfaceMemory> {
    match desc.kind() {
        BufferKind::Input | BufferKind::Buffer => Ok(desc.primary()),
        BufferKind::InputOutput => volatile_view(desc, op),
        kind => Err(invalid_kind(desc, op, kind, "an input, input/output or generic buffer")),
    }
}

pub(crate) fn resource_write_view<'a>(desc: &'a SurfaceDescriptor, op: &'static str) -> Result<&'a SurfaceMemory> {
    match desc.kind() {
        BufferKind::Output | BufferKind::Buffer => Ok(desc.primary()),
        BufferKind::InputOutput => volatile_view(desc, op),
        kind => Err(invalid_kind(desc, op, kind, "an output, input/output or generic buffer")),
    }
}

/// Mutable view of an input/output surface. Atomics and modified reads require it.
pub(crate) fn volatile_view<'a>(desc: &'a SurfaceDescriptor, op: &'static str) -> Result<&'a SurfaceMemory> {
    match (desc.kind(), desc.volatile()) {
        (BufferKind::InputOutput, Some(volatile)) => Ok(volatile),
        (kind, _) => Err(invalid_kind(desc, op, kind, "an input/output buffer")),
    }
}

fn invalid_kind(
    desc: &SurfaceDescriptor,
    op: &'static str,
    kind: BufferKind,
    expected: &'static str,
) -> DataportError {
    DataportError::InvalidSurfaceKind {
        id: desc.id(),
        op,
        kind,
        expected,
    }
}

/// Checks that a surface is a single row, as OWord and HWord block messages address linearly.
pub(crate) fn require_linear(desc: &SurfaceDescriptor, op: &'static str) -> Result<()> {
    if desc.height() != 1 {
        return Err(DataportError::InvalidSurfaceShape {
            id: desc.id(),
            op,
            height: desc.height(),
            expected: 1,
        });
    }
    Ok(())
}

/// Checks that `offset` is a multiple of `required`.
pub(crate) fn require_aligned(id: SurfaceId, op: &'static str, offset: i64, required: u32) -> Result<()> {
    if offset.rem_euclid(i64::from(required)) != 0 {
        return Err(DataportError::MisalignedOffset {
            id,
            op,
            offset,
            required,
        });
    }
    Ok(())
}

/// Checks that a vector operand has the call's lane count.
pub(crate) fn require_lanes(op: &'static str, what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(DataportError::VectorLengthMismatch {
            op,
            what,
            expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn require_simd_width(op: &'static str, lanes: usize, allowed: &'static [usize]) -> Result<()> {
    if !allowed.contains(&lanes) {
        return Err(DataportError::UnsupportedSimdWidth { op, lanes, allowed });
    }
    Ok(())
}
