//! Scene-facing interface of the renderer.
//!
//! The gameplay layer feeds the core through these types only: instances are
//! submitted per frame, cameras are registered by name, and the environment
//! block is pushed once per frame.

mod camera;
mod environment;
mod frustum;
mod material;
mod submission;

pub use camera::{CameraRegistry, CameraSnapshot, Projection, LIGHT_CAMERA, MAIN_CAMERA};
pub use environment::{Caustics, DirectionalLight, Environment, Fog};
pub use frustum::Frustum;
pub use material::{create_texture, Material, MaterialId, MaterialStore, ResolvedMaterial};
pub use submission::{MeshBatch, RenderFlags, SceneSubmission, SubmissionSummary};
