//! CPU emulation of the GPU dataport: block, scattered, atomic and typed memory messages issued
//! by compute kernels against surfaces registered by the runtime.
//!
//! All operations are methods on [`EmuContext`], which owns the surface registry. Preconditions
//! the hardware would trip over are returned as [`DataportError`] before any memory is touched;
//! out-of-bounds lanes are not errors and follow a per-operation policy (clamp, zero-fill,
//! saturate or skip).

mod atomic;
mod attrib;
mod block;
mod config;
mod context;
mod edge;
mod element;
mod error;
pub mod fatal;
mod oword;
mod scattered;
mod stats;
mod typed;

pub use atomic::{AtomicOp, AtomicOperands, ATOMIC_SIMD_WIDTHS, DWORD_ATOMIC_LANES};
pub use attrib::{BufferAttrib, ChannelMask, Field, LaneMask, SurfacePlane};
pub use config::{
    AtomicOpSet, ConfigError, DataportConfig, OobWritePolicy, ENV_ABORT_ON_ERROR, ENV_ATOMIC_OPS, ENV_OOB_WRITE,
};
pub use context::EmuContext;
pub use element::{Element, ElementClass};
pub use error::{DataportError, Result};
pub use oword::HWORD_BLOCK_SIZES;
pub use scattered::SCATTERED_SIMD_WIDTHS;
pub use stats::{DataportStats, DataportStatsSnapshot, LaneTally};
pub use typed::{TypedCoords, TYPED_SIMD_WIDTHS};

pub use cm_surface::{
    BufferKind, Registration, SurfaceDescriptor, SurfaceError, SurfaceFormat, SurfaceId, SurfaceMemory, SurfacePatch,
    SurfaceRegistry,
};
