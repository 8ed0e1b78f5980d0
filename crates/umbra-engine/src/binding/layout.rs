use thiserror::Error;

use crate::device::HeapError;

use super::samplers::StaticSamplers;

/// What a declared range holds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RangeKind {
    Constants,
    Textures,
    Storage,
}

/// How a texture in a range is sampled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureSample {
    Float,
    /// Read with `textureLoad` only (e.g. `R32Float`).
    UnfilterableFloat,
    /// Depth texture sampled through the comparison sampler.
    Depth,
}

impl TextureSample {
    fn to_wgpu(self) -> wgpu::TextureSampleType {
        match self {
            TextureSample::Float => wgpu::TextureSampleType::Float { filterable: true },
            TextureSample::UnfilterableFloat => {
                wgpu::TextureSampleType::Float { filterable: false }
            }
            TextureSample::Depth => wgpu::TextureSampleType::Depth,
        }
    }
}

/// Logical resource a range is bound to. Binding goes through roles, never
/// through raw slot numbers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SlotRole {
    FrameConstants,
    DrawConstants,
    Material,
    Bones,
    GBuffer,
    ShadowMap,
    PostConstants,
    PostSource,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("range {0:?} declares no descriptors")]
    EmptyRange(SlotRole),

    #[error("role {0:?} is declared more than once")]
    DuplicateRole(SlotRole),

    #[error("constant range {0:?} follows a texture/storage range; constants must come first")]
    ConstantsAfterResources(SlotRole),

    #[error("layout needs {needed} bind groups, device allows {limit}")]
    TooManyGroups { needed: u32, limit: u32 },

    #[error("role {0:?} is not part of this layout")]
    UnknownRole(SlotRole),

    #[error("role {0:?} was never bound")]
    MissingRole(SlotRole),

    #[error("role {role:?} expects {expected:?} views, got {found:?}")]
    KindMismatch {
        role: SlotRole,
        expected: RangeKind,
        found: RangeKind,
    },

    #[error("role {role:?} expects {expected} descriptor(s), got {found}")]
    CountMismatch {
        role: SlotRole,
        expected: u32,
        found: u32,
    },

    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// One declared range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDesc {
    pub role: SlotRole,
    pub kind: RangeKind,
    pub count: u32,
    /// Per-descriptor sample types; only populated for texture ranges.
    pub samples: Vec<TextureSample>,
}

/// Ordered declaration of the ranges a pipeline reads.
#[derive(Debug, Clone, Default)]
pub struct BindingLayoutDesc {
    pub label: &'static str,
    pub ranges: Vec<RangeDesc>,
}

impl BindingLayoutDesc {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ranges: Vec::new(),
        }
    }

    pub fn constants(mut self, role: SlotRole, count: u32) -> Self {
        self.ranges.push(RangeDesc {
            role,
            kind: RangeKind::Constants,
            count,
            samples: Vec::new(),
        });
        self
    }

    pub fn textures(mut self, role: SlotRole, samples: &[TextureSample]) -> Self {
        self.ranges.push(RangeDesc {
            role,
            kind: RangeKind::Textures,
            count: samples.len() as u32,
            samples: samples.to_vec(),
        });
        self
    }

    pub fn storage(mut self, role: SlotRole, count: u32) -> Self {
        self.ranges.push(RangeDesc {
            role,
            kind: RangeKind::Storage,
            count,
            samples: Vec::new(),
        });
        self
    }

    /// Assigns each range the bind-group index equal to its declaration
    /// position. The static samplers are appended to the first texture range,
    /// right after its textures.
    pub fn validate(&self, max_groups: u32) -> Result<LayoutSpec, BindingError> {
        let mut seen_resource = false;
        for (i, r) in self.ranges.iter().enumerate() {
            if r.count == 0 {
                return Err(BindingError::EmptyRange(r.role));
            }
            if self.ranges[..i].iter().any(|p| p.role == r.role) {
                return Err(BindingError::DuplicateRole(r.role));
            }
            match r.kind {
                RangeKind::Constants if seen_resource => {
                    return Err(BindingError::ConstantsAfterResources(r.role));
                }
                RangeKind::Constants => {}
                RangeKind::Textures | RangeKind::Storage => seen_resource = true,
            }
        }

        let needed = self.ranges.len() as u32;
        if needed > max_groups {
            return Err(BindingError::TooManyGroups {
                needed,
                limit: max_groups,
            });
        }

        let samplers = self
            .ranges
            .iter()
            .position(|r| r.kind == RangeKind::Textures)
            .map(|i| SamplerPlacement {
                group: i as u32,
                first_binding: self.ranges[i].count,
            });

        Ok(LayoutSpec {
            ranges: self.ranges.clone(),
            samplers,
        })
    }
}

/// Where the static samplers live inside a layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SamplerPlacement {
    pub group: u32,
    pub first_binding: u32,
}

/// Validated, GPU-free view of a binding layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSpec {
    ranges: Vec<RangeDesc>,
    samplers: Option<SamplerPlacement>,
}

impl LayoutSpec {
    #[inline]
    pub fn ranges(&self) -> &[RangeDesc] {
        &self.ranges
    }

    #[inline]
    pub fn samplers(&self) -> Option<SamplerPlacement> {
        self.samplers
    }

    /// Bind-group index of `role`.
    pub fn group_of(&self, role: SlotRole) -> Result<u32, BindingError> {
        self.ranges
            .iter()
            .position(|r| r.role == role)
            .map(|i| i as u32)
            .ok_or(BindingError::UnknownRole(role))
    }

    /// Checks that `kinds` fits the range declared for `role`.
    pub fn check(&self, role: SlotRole, kinds: &[RangeKind]) -> Result<(), BindingError> {
        let range = &self.ranges[self.group_of(role)? as usize];
        if kinds.len() as u32 != range.count {
            return Err(BindingError::CountMismatch {
                role,
                expected: range.count,
                found: kinds.len() as u32,
            });
        }
        if let Some(found) = kinds.iter().copied().find(|k| *k != range.kind) {
            return Err(BindingError::KindMismatch {
                role,
                expected: range.kind,
                found,
            });
        }
        Ok(())
    }
}

/// Root binding layout: one bind group per declared range.
#[derive(Debug)]
pub struct BindingLayout {
    label: &'static str,
    spec: LayoutSpec,
    groups: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    samplers: Option<StaticSamplers>,
}

impl BindingLayout {
    pub fn new(
        device: &wgpu::Device,
        desc: &BindingLayoutDesc,
        samplers: &StaticSamplers,
    ) -> Result<Self, BindingError> {
        let spec = desc.validate(device.limits().max_bind_groups)?;

        let groups: Vec<wgpu::BindGroupLayout> = spec
            .ranges
            .iter()
            .enumerate()
            .map(|(group, r)| {
                let mut entries: Vec<wgpu::BindGroupLayoutEntry> =
                    (0..r.count).map(|i| layout_entry(r, i)).collect();
                if let Some(p) = spec.samplers.filter(|p| p.group == group as u32) {
                    entries.extend(StaticSamplers::layout_entries(p.first_binding));
                }
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.label),
                    entries: &entries,
                })
            })
            .collect();

        let refs: Vec<&wgpu::BindGroupLayout> = groups.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &refs,
            immediate_size: 0,
        });

        log::debug!(
            "binding layout '{}': {} range(s), samplers {:?}",
            desc.label,
            spec.ranges.len(),
            spec.samplers
        );

        Ok(Self {
            label: desc.label,
            samplers: spec.samplers.map(|_| samplers.clone()),
            spec,
            groups,
            pipeline_layout,
        })
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn spec(&self) -> &LayoutSpec {
        &self.spec
    }

    #[inline]
    pub fn pipeline_layout(&self) -> &wgpu::PipelineLayout {
        &self.pipeline_layout
    }

    pub(crate) fn group_layout(&self, group: u32) -> &wgpu::BindGroupLayout {
        &self.groups[group as usize]
    }

    pub(crate) fn static_samplers(&self) -> Option<&StaticSamplers> {
        self.samplers.as_ref()
    }
}

fn layout_entry(range: &RangeDesc, i: u32) -> wgpu::BindGroupLayoutEntry {
    let (visibility, ty) = match range.kind {
        RangeKind::Constants => (
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        ),
        RangeKind::Textures => (
            wgpu::ShaderStages::FRAGMENT,
            wgpu::BindingType::Texture {
                sample_type: range.samples[i as usize].to_wgpu(),
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        ),
        RangeKind::Storage => (
            wgpu::ShaderStages::VERTEX,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        ),
    };
    wgpu::BindGroupLayoutEntry {
        binding: i,
        visibility,
        ty,
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RangeKind::*;

    fn gbuffer_desc() -> BindingLayoutDesc {
        BindingLayoutDesc::new("test")
            .constants(SlotRole::FrameConstants, 1)
            .constants(SlotRole::DrawConstants, 1)
            .textures(SlotRole::Material, &[TextureSample::Float])
            .storage(SlotRole::Bones, 1)
    }

    // ── declaration ───────────────────────────────────────────────────────

    #[test]
    fn groups_follow_declaration_order() {
        let spec = gbuffer_desc().validate(4).unwrap();
        assert_eq!(spec.group_of(SlotRole::FrameConstants), Ok(0));
        assert_eq!(spec.group_of(SlotRole::DrawConstants), Ok(1));
        assert_eq!(spec.group_of(SlotRole::Material), Ok(2));
        assert_eq!(spec.group_of(SlotRole::Bones), Ok(3));
    }

    #[test]
    fn samplers_follow_first_texture_range() {
        let spec = BindingLayoutDesc::new("t")
            .constants(SlotRole::FrameConstants, 1)
            .textures(
                SlotRole::GBuffer,
                &[TextureSample::Float, TextureSample::Float, TextureSample::UnfilterableFloat],
            )
            .textures(SlotRole::ShadowMap, &[TextureSample::Depth])
            .validate(4)
            .unwrap();
        assert_eq!(
            spec.samplers(),
            Some(SamplerPlacement { group: 1, first_binding: 3 })
        );
    }

    #[test]
    fn no_samplers_without_textures() {
        let spec = BindingLayoutDesc::new("t")
            .constants(SlotRole::PostConstants, 1)
            .storage(SlotRole::Bones, 1)
            .validate(4)
            .unwrap();
        assert_eq!(spec.samplers(), None);
    }

    #[test]
    fn constants_must_come_first() {
        let err = BindingLayoutDesc::new("t")
            .textures(SlotRole::PostSource, &[TextureSample::Float])
            .constants(SlotRole::PostConstants, 1)
            .validate(4)
            .unwrap_err();
        assert_eq!(err, BindingError::ConstantsAfterResources(SlotRole::PostConstants));
    }

    #[test]
    fn duplicate_and_empty_ranges_are_rejected() {
        let dup = BindingLayoutDesc::new("t")
            .constants(SlotRole::FrameConstants, 1)
            .constants(SlotRole::FrameConstants, 1)
            .validate(4);
        assert_eq!(dup, Err(BindingError::DuplicateRole(SlotRole::FrameConstants)));

        let empty = BindingLayoutDesc::new("t").textures(SlotRole::GBuffer, &[]).validate(4);
        assert_eq!(empty, Err(BindingError::EmptyRange(SlotRole::GBuffer)));
    }

    #[test]
    fn group_count_is_checked_against_limit() {
        let err = gbuffer_desc()
            .textures(SlotRole::ShadowMap, &[TextureSample::Depth])
            .validate(4)
            .unwrap_err();
        assert_eq!(err, BindingError::TooManyGroups { needed: 5, limit: 4 });
    }

    // ── binding checks ────────────────────────────────────────────────────

    #[test]
    fn matching_kinds_pass() {
        let spec = gbuffer_desc().validate(4).unwrap();
        assert!(spec.check(SlotRole::Material, &[Textures]).is_ok());
        assert!(spec.check(SlotRole::Bones, &[Storage]).is_ok());
    }

    #[test]
    fn wrong_kind_in_slot_is_caught() {
        let spec = gbuffer_desc().validate(4).unwrap();
        assert_eq!(
            spec.check(SlotRole::Material, &[Storage]),
            Err(BindingError::KindMismatch {
                role: SlotRole::Material,
                expected: Textures,
                found: Storage
            })
        );
    }

    #[test]
    fn wrong_count_and_unknown_role_are_caught() {
        let spec = gbuffer_desc().validate(4).unwrap();
        assert!(matches!(
            spec.check(SlotRole::FrameConstants, &[Constants, Constants]),
            Err(BindingError::CountMismatch { expected: 1, found: 2, .. })
        ));
        assert_eq!(
            spec.check(SlotRole::ShadowMap, &[Textures]),
            Err(BindingError::UnknownRole(SlotRole::ShadowMap))
        );
    }
}
