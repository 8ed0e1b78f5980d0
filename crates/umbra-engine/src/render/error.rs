use thiserror::Error;

use crate::binding::BindingError;
use crate::device::HeapError;
use crate::mesh::{MeshError, SkinningError};
use crate::target::{BarrierError, TargetError, TargetId};

/// Failure while recording a frame. The frame is discarded; the next one
/// starts from fresh heaps and a reset barrier tracker.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Barrier(#[from] BarrierError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Skinning(#[from] SkinningError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("render target {0:?} has no {1} image")]
    MissingAttachment(TargetId, &'static str),
}
