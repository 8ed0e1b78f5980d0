//! Core engine-facing contracts.
//!
//! The interface between the runtime (platform loop) and the application:
//! a start hook to load meshes and materials, and a per-frame context that
//! submits the scene and renders it.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, StartCtx, WindowCtx};
