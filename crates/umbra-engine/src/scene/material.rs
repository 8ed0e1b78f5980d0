use crate::logging::WarnOnce;
use crate::paint::Color;

/// Index of a material in a [`MaterialStore`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// White, untextured; always present.
    pub const DEFAULT: MaterialId = MaterialId(0);
}

/// Surface parameters for the geometry pass.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Color,
    /// Albedo texture; `None` samples the white fallback.
    pub albedo: Option<wgpu::TextureView>,
}

/// What the geometry pass binds for one subset.
#[derive(Debug, Clone)]
pub struct ResolvedMaterial {
    pub albedo: wgpu::TextureView,
    pub base_color: Color,
}

/// Owner of every material plus the 1×1 white fallback texture.
pub struct MaterialStore {
    materials: Vec<Material>,
    white: wgpu::TextureView,
    warned: WarnOnce<MaterialId>,
}

impl MaterialStore {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = create_texture(device, queue, "umbra white", 1, 1, &[255; 4]);
        Self {
            materials: vec![Material {
                name: "default".into(),
                base_color: Color::WHITE,
                albedo: None,
            }],
            white,
            warned: WarnOnce::new(),
        }
    }

    pub fn insert(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() as u32 - 1)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    #[inline]
    pub fn white(&self) -> &wgpu::TextureView {
        &self.white
    }

    /// Resolves `id`, substituting the default material for unknown ids and the
    /// white texture for missing albedo. Each substitution is logged once.
    pub fn resolve(&mut self, id: MaterialId) -> ResolvedMaterial {
        let Some(material) = self.materials.get(id.0 as usize) else {
            self.warned
                .warn(id, || format!("material {id:?} does not exist; using default"));
            return ResolvedMaterial {
                albedo: self.white.clone(),
                base_color: Color::WHITE,
            };
        };
        let albedo = match (&material.albedo, id == MaterialId::DEFAULT) {
            (Some(view), _) => view.clone(),
            (None, true) => self.white.clone(),
            (None, false) => {
                let name = &material.name;
                self.warned
                    .warn(id, || format!("material '{name}' has no albedo texture; using white"));
                self.white.clone()
            }
        };
        ResolvedMaterial {
            albedo,
            base_color: material.base_color,
        }
    }
}

/// Uploads tightly packed RGBA8 (sRGB) pixels as a sampled texture.
pub fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
