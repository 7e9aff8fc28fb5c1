use cm_surface::{BufferKind, SurfaceError, SurfaceFormat, SurfaceId};
use thiserror::Error;

use crate::atomic::AtomicOp;

pub type Result<T> = std::result::Result<T, DataportError>;

/// A dataport call whose preconditions do not hold.
///
/// On hardware these are programming errors that hang or corrupt the GPU; the emulator rejects
/// the call before any memory is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataportError {
    #[error("{op}: {id} is not registered")]
    SurfaceNotRegistered { id: SurfaceId, op: &'static str },

    #[error("{op}: {id} is a {kind}, expected {expected}")]
    InvalidSurfaceKind {
        id: SurfaceId,
        op: &'static str,
        kind: BufferKind,
        expected: &'static str,
    },

    #[error("{op}: {id} offset {offset} is not {required}-byte aligned")]
    MisalignedOffset {
        id: SurfaceId,
        op: &'static str,
        offset: i64,
        required: u32,
    },

    #[error("{op}: {id} transfer of {bytes} bytes is not a multiple of {required} bytes")]
    MisalignedSize {
        id: SurfaceId,
        op: &'static str,
        bytes: u64,
        required: u32,
    },

    #[error("{op}: {id} transfer of {bytes} bytes is not one of {allowed:?}")]
    InvalidBlockSize {
        id: SurfaceId,
        op: &'static str,
        bytes: u64,
        allowed: &'static [u64],
    },

    #[error("{op}: {id} has height {height}, expected {expected}")]
    InvalidSurfaceShape {
        id: SurfaceId,
        op: &'static str,
        height: u32,
        expected: u32,
    },

    #[error("{op}: {what} has {found} lanes, expected {expected}")]
    VectorLengthMismatch {
        op: &'static str,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{op}: SIMD width {lanes} is not one of {allowed:?}")]
    UnsupportedSimdWidth {
        op: &'static str,
        lanes: usize,
        allowed: &'static [usize],
    },

    #[error("{op}: channel mask selects no channel")]
    EmptyChannelMask { op: &'static str },

    #[error("atomic {op} is not defined for {element} elements")]
    UnsupportedOpcodeForType { op: AtomicOp, element: &'static str },

    #[error("atomic {op} is beyond the configured opcode set (last supported: {ceiling})")]
    OpcodeNotSupported { op: AtomicOp, ceiling: AtomicOp },

    #[error("unknown atomic opcode 0x{raw:x}")]
    UnknownOpcode { raw: u32 },

    #[error("atomic {op} needs a {operand} operand")]
    MissingOperand { op: AtomicOp, operand: &'static str },

    #[error("{op}: {id} has format {format}, which this access does not support")]
    UnsupportedFormat {
        id: SurfaceId,
        op: &'static str,
        format: SurfaceFormat,
    },

    #[error("{op}: {id} ({format}) needs {expected}-byte elements, got {element_size}")]
    ElementSizeMismatch {
        id: SurfaceId,
        op: &'static str,
        format: SurfaceFormat,
        element_size: usize,
        expected: usize,
    },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
