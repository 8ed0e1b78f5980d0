//! Render targets and the resource-state discipline passes follow around them.

mod barrier;
mod render_target;

pub use barrier::{
    BarrierError, BarrierLog, BarrierTracker, PassIo, ResourceState, TargetId, Transition,
};
pub use render_target::{
    begin_pass, AttachmentSlots, ColorOutput, RenderTarget, RenderTargetDesc, TargetError,
};
