//! Surface registry for the CM dataport emulator.
//!
//! A surface is a host memory region standing in for a GPU buffer, 2D or 3D surface. The runtime
//! registers each one under a small integer id; every dataport operation resolves that id here
//! before touching memory.

mod error;
pub mod format;
mod memory;
mod registry;

use std::fmt;

pub use error::{SurfaceError, SurfaceResult};
pub use format::{bytes_per_pixel_raw, SurfaceFormat};
pub use memory::{SurfaceBytes, SurfaceBytesMut, SurfaceMemory};
pub use registry::{Registration, SurfaceDescriptor, SurfacePatch, SurfaceRegistry};

/// Opaque surface handle as seen by kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

impl SurfaceId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Decodes a legacy packed handle, where only the low byte carries the id.
    pub const fn from_legacy_handle(handle: u32) -> Self {
        Self(handle & 0xFF)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl From<u32> for SurfaceId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface {}", self.0)
    }
}

/// How the kernel is allowed to use a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Read-only; reads go through the primary view.
    Input,
    /// Write-only; writes go through the primary view.
    Output,
    /// Read-write; writes, atomics and "modified" reads go through the volatile view.
    InputOutput,
    /// Untyped/typed buffer resource.
    Buffer,
    /// Sampler-only resource. No dataport access.
    Sampling,
}

impl BufferKind {
    pub fn name(self) -> &'static str {
        match self {
            BufferKind::Input => "input buffer",
            BufferKind::Output => "output buffer",
            BufferKind::InputOutput => "input/output buffer",
            BufferKind::Buffer => "buffer",
            BufferKind::Sampling => "sampling buffer",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BufferKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(BufferKind::Input),
            "output" => Ok(BufferKind::Output),
            "input_output" | "inout" => Ok(BufferKind::InputOutput),
            "buffer" => Ok(BufferKind::Buffer),
            "sampling" => Ok(BufferKind::Sampling),
            other => Err(format!("unknown buffer kind {other:?}")),
        }
    }
}
