//! Deferred frame renderer.
//!
//! One frame runs a fixed pass sequence: geometry buffer, shadow map,
//! lighting, bloom (extract, two blurs, composite) and tone mapping to the
//! swap surface. Passes whose inputs are missing are skipped and their
//! outputs cleared, so every later pass still reads defined data.
//!
//! Convention:
//! - right-handed world space, depth range `0..1`
//! - linear view depth is positive distance along the camera's forward axis

pub mod config;
mod ctx;
mod error;
pub mod passes;
mod plan;
mod renderer;
mod targets;
mod uniforms;

pub use config::{
    BloomConfig, ConfigError, DebugView, PassCameras, RendererConfig, ShadowConfig,
    ToneMapConfig, ToneMapOperator, MAX_BLUR_RADIUS,
};
pub use ctx::RenderCtx;
pub use error::FrameError;
pub use passes::{light_camera, DrawStats};
pub use plan::{FramePlan, LightCameraSource, PassKind, PassStatus, PlannedPass, SkipReason};
pub use renderer::{FrameOutcome, FrameReport, Renderer};
pub use targets::{bloom_size, FrameTargets};
pub use uniforms::{blur_weights, DrawUniform, FrameUniform, LightingUniform, PostUniform};
