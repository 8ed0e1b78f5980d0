//! Binding layer: role-keyed binding layouts, binding tables resolved from the
//! shader-visible heap, and immutable pipeline states.

mod layout;
mod pipeline;
mod samplers;
mod table;
mod view;

pub use layout::{
    BindingError, BindingLayout, BindingLayoutDesc, LayoutSpec, RangeDesc, RangeKind,
    SamplerPlacement, SlotRole, TextureSample,
};
pub use pipeline::{
    BlendMode, CullMode, DepthState, PipelineDesc, PipelineError, PipelineState, RasterState,
    VertexInput,
};
pub use samplers::{StaticSamplers, STATIC_SAMPLER_COUNT};
pub use table::{BindingTable, ResolvedBindings};
pub use view::{BufferSpan, ShaderView};
