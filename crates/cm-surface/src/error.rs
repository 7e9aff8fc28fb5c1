use thiserror::Error;

use crate::{BufferKind, SurfaceId};

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("{id} is not registered")]
    NotRegistered { id: SurfaceId },

    #[error("{id} has a zero dimension (width={width} height={height} depth={depth})")]
    ZeroSizedSurface {
        id: SurfaceId,
        width: u32,
        height: u32,
        depth: u32,
    },

    #[error("{id} backing store too small (need {required} bytes, have {actual} bytes)")]
    BackingTooSmall {
        id: SurfaceId,
        required: u64,
        actual: u64,
    },

    #[error("{id} is a {kind} and cannot carry a separate volatile view")]
    UnexpectedVolatileView { id: SurfaceId, kind: BufferKind },

    #[error("cannot relocate to {id}: id already registered")]
    IdInUse { id: SurfaceId },
}
