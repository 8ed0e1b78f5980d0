use super::layout::RangeKind;

/// Sub-range of a GPU buffer.
#[derive(Debug, Clone)]
pub struct BufferSpan {
    pub buffer: wgpu::Buffer,
    pub offset: u64,
    pub size: u64,
}

impl BufferSpan {
    pub fn whole(buffer: &wgpu::Buffer) -> Self {
        Self {
            buffer: buffer.clone(),
            offset: 0,
            size: buffer.size(),
        }
    }

    pub(crate) fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: self.offset,
            size: wgpu::BufferSize::new(self.size),
        })
    }
}

/// One entry of the shader-visible descriptor heap.
#[derive(Debug, Clone)]
pub enum ShaderView {
    Constant(BufferSpan),
    Texture(wgpu::TextureView),
    Storage(BufferSpan),
}

impl ShaderView {
    #[inline]
    pub fn kind(&self) -> RangeKind {
        match self {
            ShaderView::Constant(_) => RangeKind::Constants,
            ShaderView::Texture(_) => RangeKind::Textures,
            ShaderView::Storage(_) => RangeKind::Storage,
        }
    }

    pub(crate) fn binding(&self) -> wgpu::BindingResource<'_> {
        match self {
            ShaderView::Constant(span) | ShaderView::Storage(span) => span.binding(),
            ShaderView::Texture(view) => wgpu::BindingResource::TextureView(view),
        }
    }
}
