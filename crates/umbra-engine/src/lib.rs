//! Umbra engine crate.
//!
//! A deferred-shading renderer on wgpu: device and descriptor heaps, role-keyed
//! binding layouts, tracked render targets, instanced and skinned meshes, and
//! a frame of geometry, shadow, lighting and bloom/tone-map passes. The window
//! runtime drives it from a `core::App`.

pub mod binding;
pub mod core;
pub mod device;
pub mod logging;
pub mod mesh;
pub mod paint;
pub mod render;
pub mod scene;
pub mod target;
pub mod time;
pub mod window;
