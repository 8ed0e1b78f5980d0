//! Static sampler presets appended to every layout that declares textures.
//!
//! Shader-side binding order, starting at the placement's `first_binding`:
//!
//!  +0  linear_wrap    filtering
//!  +1  linear_clamp   filtering
//!  +2  point_wrap     non-filtering
//!  +3  point_clamp    non-filtering
//!  +4  shadow         comparison (LessEqual)

pub const STATIC_SAMPLER_COUNT: u32 = 5;

#[derive(Debug, Clone)]
pub struct StaticSamplers {
    linear_wrap: wgpu::Sampler,
    linear_clamp: wgpu::Sampler,
    point_wrap: wgpu::Sampler,
    point_clamp: wgpu::Sampler,
    shadow: wgpu::Sampler,
}

impl StaticSamplers {
    pub fn new(device: &wgpu::Device) -> Self {
        let make = |label: &'static str, filter: wgpu::FilterMode, address: wgpu::AddressMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: address,
                address_mode_v: address,
                address_mode_w: address,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            })
        };

        let shadow = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("umbra shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            linear_wrap: make(
                "umbra linear wrap",
                wgpu::FilterMode::Linear,
                wgpu::AddressMode::Repeat,
            ),
            linear_clamp: make(
                "umbra linear clamp",
                wgpu::FilterMode::Linear,
                wgpu::AddressMode::ClampToEdge,
            ),
            point_wrap: make(
                "umbra point wrap",
                wgpu::FilterMode::Nearest,
                wgpu::AddressMode::Repeat,
            ),
            point_clamp: make(
                "umbra point clamp",
                wgpu::FilterMode::Nearest,
                wgpu::AddressMode::ClampToEdge,
            ),
            shadow,
        }
    }

    fn binding_types() -> [wgpu::SamplerBindingType; STATIC_SAMPLER_COUNT as usize] {
        [
            wgpu::SamplerBindingType::Filtering,
            wgpu::SamplerBindingType::Filtering,
            wgpu::SamplerBindingType::NonFiltering,
            wgpu::SamplerBindingType::NonFiltering,
            wgpu::SamplerBindingType::Comparison,
        ]
    }

    pub(crate) fn layout_entries(first_binding: u32) -> impl Iterator<Item = wgpu::BindGroupLayoutEntry> {
        Self::binding_types()
            .into_iter()
            .zip(first_binding..)
            .map(|(ty, binding)| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(ty),
                count: None,
            })
    }

    pub(crate) fn bind_entries(&self, first_binding: u32) -> [wgpu::BindGroupEntry<'_>; STATIC_SAMPLER_COUNT as usize] {
        let samplers = [
            &self.linear_wrap,
            &self.linear_clamp,
            &self.point_wrap,
            &self.point_clamp,
            &self.shadow,
        ];
        let mut binding = first_binding;
        samplers.map(|s| {
            let entry = wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(s),
            };
            binding += 1;
            entry
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_entries_are_contiguous_after_textures() {
        let bindings: Vec<u32> = StaticSamplers::layout_entries(3).map(|e| e.binding).collect();
        assert_eq!(bindings, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn last_entry_is_the_comparison_sampler() {
        let last = StaticSamplers::layout_entries(0).last().unwrap();
        assert_eq!(
            last.ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        );
    }
}
