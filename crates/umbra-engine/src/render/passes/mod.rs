//! Frame passes.
//!
//! Each pass owns its binding layout and pipeline. `record` draws into the
//! pass's outputs; `clear` is what runs instead when the plan skips the pass.

mod common;

pub mod gbuffer;
pub mod lighting;
pub mod post;
pub mod shadow;

pub use common::{DrawStats, MeshDrawInputs};
pub use gbuffer::GBufferPass;
pub use lighting::LightingPass;
pub use post::PostPasses;
pub use shadow::{light_camera, ShadowPass};
