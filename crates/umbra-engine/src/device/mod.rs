//! Device & heap layer.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue and the swap surface
//! - the three per-frame descriptor heaps and the constant ring
//! - frame bracketing (`prepare` / `present`) and the completion fence

mod error;
mod frame;
mod gpu;
mod heap;
mod init;
mod readback;
mod ring;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::{GpuFrame, PresentInfo};
pub use gpu::{Gpu, GpuParts, HeapUsage, Heaps};
pub use heap::{DescriptorHeap, HeapCapacities, HeapError, HeapKind, HeapRange, HeapSlot};
pub use init::{GpuInit, DEPTH_FORMAT};
pub use readback::CapturedFrame;
pub use ring::{ConstantAllocation, ConstantRing};
