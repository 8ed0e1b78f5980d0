use std::sync::Arc;

use thiserror::Error;

use crate::mesh::{InstanceRecord, MeshVertex};

use super::layout::{BindingError, BindingLayout};

/// wgpu's minimum guaranteed color attachment count.
const MAX_COLOR_TARGETS: usize = 8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("pipeline '{0}' has neither color targets nor a depth target")]
    NoTargets(&'static str),

    #[error("pipeline '{0}' enables depth testing without a depth format")]
    DepthWithoutFormat(&'static str),

    #[error("pipeline '{0}' writes color but has no fragment entry point")]
    MissingFragment(&'static str),

    #[error("pipeline '{label}' declares {count} color targets (max 8)")]
    TooManyTargets { label: &'static str, count: usize },

    #[error("shader for pipeline '{label}' failed to compile:\n{}", .messages.join("\n"))]
    ShaderCompile {
        label: &'static str,
        messages: Vec<String>,
    },

    #[error("pipeline '{label}' was rejected by the device: {message}")]
    Creation { label: &'static str, message: String },

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Vertex streams a pipeline consumes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VertexInput {
    /// Vertices are generated from `vertex_index` (full-screen passes).
    None,
    /// Slot 0: [`MeshVertex`] per vertex; slot 1: [`InstanceRecord`] per instance.
    Mesh,
}

impl VertexInput {
    fn layouts(self) -> Vec<wgpu::VertexBufferLayout<'static>> {
        match self {
            VertexInput::None => Vec::new(),
            VertexInput::Mesh => vec![MeshVertex::layout(), InstanceRecord::layout()],
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

impl CullMode {
    fn to_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Back => Some(wgpu::Face::Back),
            CullMode::Front => Some(wgpu::Face::Front),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RasterState {
    pub cull: CullMode,
    /// Constant depth bias in depth-buffer units (shadow acne control).
    pub depth_bias: i32,
    pub slope_scale_bias: f32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// `dst + src`; bloom composite.
    Additive,
    /// Straight alpha over.
    Alpha,
}

impl BlendMode {
    pub(crate) fn to_wgpu(self) -> Option<wgpu::BlendState> {
        let component = |src, dst| wgpu::BlendComponent {
            src_factor: src,
            dst_factor: dst,
            operation: wgpu::BlendOperation::Add,
        };
        match self {
            BlendMode::Opaque => None,
            BlendMode::Additive => Some(wgpu::BlendState {
                color: component(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
                alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
            }),
            BlendMode::Alpha => Some(wgpu::BlendState {
                color: component(wgpu::BlendFactor::SrcAlpha, wgpu::BlendFactor::OneMinusSrcAlpha),
                alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha),
            }),
        }
    }
}

/// Depth test configuration. A pipeline without one still may carry a depth
/// attachment; it then neither tests nor writes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DepthState {
    pub write: bool,
    pub compare: wgpu::CompareFunction,
}

impl DepthState {
    pub const LESS_WRITE: DepthState = DepthState {
        write: true,
        compare: wgpu::CompareFunction::Less,
    };
}

/// Everything needed to compile one pipeline variant.
#[derive(Debug, Clone)]
pub struct PipelineDesc<'a> {
    pub label: &'static str,
    /// WGSL source.
    pub shader: &'a str,
    pub vs_entry: &'static str,
    pub fs_entry: Option<&'static str>,
    pub vertex: VertexInput,
    pub raster: RasterState,
    pub blend: BlendMode,
    pub depth: Option<DepthState>,
    pub topology: wgpu::PrimitiveTopology,
    pub color_formats: &'a [wgpu::TextureFormat],
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl<'a> PipelineDesc<'a> {
    /// Full-screen pass writing one color target.
    pub fn fullscreen(
        label: &'static str,
        shader: &'a str,
        fs_entry: &'static str,
        color_formats: &'a [wgpu::TextureFormat],
    ) -> Self {
        Self {
            label,
            shader,
            vs_entry: "vs_fullscreen",
            fs_entry: Some(fs_entry),
            vertex: VertexInput::None,
            raster: RasterState {
                cull: CullMode::None,
                ..Default::default()
            },
            blend: BlendMode::Opaque,
            depth: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            color_formats,
            depth_format: None,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.color_formats.is_empty() && self.depth_format.is_none() {
            return Err(PipelineError::NoTargets(self.label));
        }
        if self.depth.is_some() && self.depth_format.is_none() {
            return Err(PipelineError::DepthWithoutFormat(self.label));
        }
        if !self.color_formats.is_empty() && self.fs_entry.is_none() {
            return Err(PipelineError::MissingFragment(self.label));
        }
        if self.color_formats.len() > MAX_COLOR_TARGETS {
            return Err(PipelineError::TooManyTargets {
                label: self.label,
                count: self.color_formats.len(),
            });
        }
        Ok(())
    }

    fn depth_stencil(&self) -> Option<wgpu::DepthStencilState> {
        let format = self.depth_format?;
        let depth = self.depth.unwrap_or(DepthState {
            write: false,
            compare: wgpu::CompareFunction::Always,
        });
        Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth.write,
            depth_compare: depth.compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: self.raster.depth_bias,
                slope_scale: self.raster.slope_scale_bias,
                clamp: 0.0,
            },
        })
    }
}

/// Immutable compiled pipeline plus the binding layout it was built against.
#[derive(Debug)]
pub struct PipelineState {
    label: &'static str,
    layout: Arc<BindingLayout>,
    pipeline: wgpu::RenderPipeline,
}

impl PipelineState {
    /// Compiles `desc`. Any shader error is returned with the compiler's
    /// messages; callers treat it as fatal.
    pub fn create(
        device: &wgpu::Device,
        layout: Arc<BindingLayout>,
        desc: &PipelineDesc<'_>,
    ) -> Result<Self, PipelineError> {
        desc.validate()?;

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.shader.into()),
        });
        let module_error = pollster::block_on(scope.pop());

        let info = pollster::block_on(module.get_compilation_info());
        let mut errors = Vec::new();
        for m in &info.messages {
            let line = m
                .location
                .map(|l| format!("{}:{}: {}", l.line_number, l.line_position, m.message))
                .unwrap_or_else(|| m.message.clone());
            match m.message_type {
                wgpu::CompilationMessageType::Error => errors.push(line),
                wgpu::CompilationMessageType::Warning => {
                    log::warn!("shader '{}': {line}", desc.label)
                }
                wgpu::CompilationMessageType::Info => {
                    log::debug!("shader '{}': {line}", desc.label)
                }
            }
        }
        shader_outcome(desc.label, errors, module_error.map(|e| e.to_string())).inspect_err(|_| {
            log::error!("pipeline '{}': shader compilation failed", desc.label);
        })?;

        let blend = desc.blend.to_wgpu();
        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let buffers = desc.vertex.layouts();

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(layout.pipeline_layout()),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(desc.vs_entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: desc.fs_entry.map(|entry| wgpu::FragmentState {
                module: &module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: desc.raster.cull.to_wgpu(),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: desc.depth_stencil(),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        if let Some(e) = pollster::block_on(scope.pop()) {
            log::error!("pipeline '{}': creation failed", desc.label);
            return Err(PipelineError::Creation {
                label: desc.label,
                message: e.to_string(),
            });
        }

        log::debug!(
            "pipeline '{}' ready ({} color target(s), depth {:?})",
            desc.label,
            targets.len(),
            desc.depth_format
        );

        Ok(Self {
            label: desc.label,
            layout,
            pipeline,
        })
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn layout(&self) -> &BindingLayout {
        &self.layout
    }

    #[inline]
    pub fn raw(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}

/// Compiler messages win over the device's validation error, which repeats
/// them less precisely.
fn shader_outcome(
    label: &'static str,
    messages: Vec<String>,
    device_error: Option<String>,
) -> Result<(), PipelineError> {
    let messages = match (messages.is_empty(), device_error) {
        (false, _) => messages,
        (true, Some(e)) => vec![e],
        (true, None) => return Ok(()),
    };
    Err(PipelineError::ShaderCompile { label, messages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    const HDR: [F; 1] = [F::Rgba16Float];

    fn depth_only() -> PipelineDesc<'static> {
        PipelineDesc {
            label: "shadow",
            shader: "",
            vs_entry: "vs_shadow",
            fs_entry: None,
            vertex: VertexInput::Mesh,
            raster: RasterState::default(),
            blend: BlendMode::Opaque,
            depth: Some(DepthState::LESS_WRITE),
            topology: wgpu::PrimitiveTopology::TriangleList,
            color_formats: &[],
            depth_format: Some(F::Depth32Float),
        }
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn depth_only_pipeline_needs_no_fragment() {
        assert_eq!(depth_only().validate(), Ok(()));
    }

    #[test]
    fn pipeline_without_targets_is_rejected() {
        let desc = PipelineDesc {
            depth: None,
            depth_format: None,
            ..depth_only()
        };
        assert_eq!(desc.validate(), Err(PipelineError::NoTargets("shadow")));
    }

    #[test]
    fn depth_test_requires_format() {
        let desc = PipelineDesc {
            depth: Some(DepthState::LESS_WRITE),
            ..PipelineDesc::fullscreen("p", "", "fs", &HDR)
        };
        assert_eq!(desc.validate(), Err(PipelineError::DepthWithoutFormat("p")));
    }

    #[test]
    fn color_output_requires_fragment_stage() {
        let desc = PipelineDesc {
            fs_entry: None,
            ..PipelineDesc::fullscreen("p", "", "fs", &HDR)
        };
        assert_eq!(desc.validate(), Err(PipelineError::MissingFragment("p")));
    }

    #[test]
    fn too_many_color_targets() {
        let formats = [F::Rgba8Unorm; 9];
        let desc = PipelineDesc::fullscreen("p", "", "fs", &formats);
        assert_eq!(
            desc.validate(),
            Err(PipelineError::TooManyTargets { label: "p", count: 9 })
        );
    }

    // ── shader errors ─────────────────────────────────────────────────────

    #[test]
    fn device_validation_error_becomes_compile_error() {
        let r = shader_outcome("gbuffer", Vec::new(), Some("invalid WGSL".into()));
        assert_eq!(
            r,
            Err(PipelineError::ShaderCompile {
                label: "gbuffer",
                messages: vec!["invalid WGSL".into()],
            })
        );
    }

    #[test]
    fn compiler_messages_take_precedence() {
        let r = shader_outcome("gbuffer", vec!["3:7: unknown type".into()], Some("invalid".into()));
        assert_eq!(
            r,
            Err(PipelineError::ShaderCompile {
                label: "gbuffer",
                messages: vec!["3:7: unknown type".into()],
            })
        );
        assert_eq!(shader_outcome("gbuffer", Vec::new(), None), Ok(()));
    }

    // ── fixed function ────────────────────────────────────────────────────

    #[test]
    fn depth_attachment_without_test_is_pass_through() {
        let desc = PipelineDesc {
            depth: None,
            ..depth_only()
        };
        let ds = desc.depth_stencil().unwrap();
        assert!(!ds.depth_write_enabled);
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn additive_blend_adds_one_one() {
        let b = BlendMode::Additive.to_wgpu().unwrap();
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(b.color.dst_factor, wgpu::BlendFactor::One);
        assert!(BlendMode::Opaque.to_wgpu().is_none());
    }

    #[test]
    fn mesh_input_has_vertex_and_instance_streams() {
        let l = VertexInput::Mesh.layouts();
        assert_eq!(l.len(), 2);
        assert_eq!(l[1].step_mode, wgpu::VertexStepMode::Instance);
        assert!(VertexInput::None.layouts().is_empty());
    }
}
