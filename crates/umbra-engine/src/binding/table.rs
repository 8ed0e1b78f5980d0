use crate::device::{DescriptorHeap, HeapRange};

use super::layout::{BindingError, BindingLayout, LayoutSpec, RangeKind, SlotRole};
use super::view::ShaderView;

/// Role-keyed binding builder for one draw or pass.
///
/// Ranges are bound by [`SlotRole`]; `resolve` checks every declared role is
/// present with the declared kinds and counts before any bind group exists.
pub struct BindingTable<'l> {
    layout: &'l BindingLayout,
    bound: Vec<Option<HeapRange>>,
}

impl<'l> BindingTable<'l> {
    pub fn new(layout: &'l BindingLayout) -> Self {
        Self {
            layout,
            bound: vec![None; layout.spec().ranges().len()],
        }
    }

    pub fn set(&mut self, role: SlotRole, range: HeapRange) -> Result<&mut Self, BindingError> {
        let group = self.layout.spec().group_of(role)?;
        self.bound[group as usize] = Some(range);
        Ok(self)
    }

    pub fn resolve(
        &self,
        device: &wgpu::Device,
        heap: &DescriptorHeap<ShaderView>,
    ) -> Result<ResolvedBindings, BindingError> {
        let spec = self.layout.spec();
        let ranges = gather(spec, &self.bound, heap, ShaderView::kind)?;
        let samplers = spec
            .samplers()
            .and_then(|p| self.layout.static_samplers().map(|s| (p, s)));

        let groups = ranges
            .into_iter()
            .enumerate()
            .map(|(group, views)| {
                let mut entries: Vec<wgpu::BindGroupEntry<'_>> = views
                    .iter()
                    .enumerate()
                    .map(|(i, v)| wgpu::BindGroupEntry {
                        binding: i as u32,
                        resource: v.binding(),
                    })
                    .collect();
                if let Some((p, s)) = samplers.filter(|(p, _)| p.group == group as u32) {
                    entries.extend(s.bind_entries(p.first_binding));
                }
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(self.layout.label()),
                    layout: self.layout.group_layout(group as u32),
                    entries: &entries,
                })
            })
            .collect();

        Ok(ResolvedBindings { groups })
    }
}

/// Looks up every declared range in `heap` and checks it against the layout.
fn gather<'h, T>(
    spec: &LayoutSpec,
    bound: &[Option<HeapRange>],
    heap: &'h DescriptorHeap<T>,
    kind_of: impl Fn(&T) -> RangeKind,
) -> Result<Vec<&'h [T]>, BindingError> {
    spec.ranges()
        .iter()
        .zip(bound)
        .map(|(desc, range)| {
            let range = range.ok_or(BindingError::MissingRole(desc.role))?;
            let entries = heap.get_range(range)?;
            let kinds: Vec<RangeKind> = entries.iter().map(&kind_of).collect();
            spec.check(desc.role, &kinds)?;
            Ok(entries)
        })
        .collect()
}

/// Bind groups ready to be set on a render pass, in group order.
#[derive(Debug, Clone)]
pub struct ResolvedBindings {
    groups: Vec<wgpu::BindGroup>,
}

impl ResolvedBindings {
    pub fn apply(&self, rpass: &mut wgpu::RenderPass<'_>) {
        for (i, g) in self.groups.iter().enumerate() {
            rpass.set_bind_group(i as u32, g, &[]);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::layout::{BindingLayoutDesc, TextureSample};
    use crate::device::{HeapError, HeapKind};

    fn spec() -> LayoutSpec {
        BindingLayoutDesc::new("t")
            .constants(SlotRole::PostConstants, 1)
            .textures(SlotRole::PostSource, &[TextureSample::Float])
            .validate(4)
            .unwrap()
    }

    fn heap() -> DescriptorHeap<RangeKind> {
        DescriptorHeap::new(HeapKind::ShaderVisible, 8)
    }

    #[test]
    fn complete_table_gathers_in_group_order() {
        let mut h = heap();
        let c = h.allocate_range([RangeKind::Constants]).unwrap();
        let t = h.allocate_range([RangeKind::Textures]).unwrap();
        let got = gather(&spec(), &[Some(c), Some(t)], &h, |k| *k).unwrap();
        assert_eq!(got, vec![&[RangeKind::Constants][..], &[RangeKind::Textures][..]]);
    }

    #[test]
    fn unset_role_is_reported() {
        let mut h = heap();
        let c = h.allocate_range([RangeKind::Constants]).unwrap();
        assert_eq!(
            gather(&spec(), &[Some(c), None], &h, |k| *k),
            Err(BindingError::MissingRole(SlotRole::PostSource))
        );
    }

    #[test]
    fn swapped_ranges_fail_before_drawing() {
        let mut h = heap();
        let c = h.allocate_range([RangeKind::Constants]).unwrap();
        let t = h.allocate_range([RangeKind::Textures]).unwrap();
        let err = gather(&spec(), &[Some(t), Some(c)], &h, |k| *k).unwrap_err();
        assert!(matches!(err, BindingError::KindMismatch { role: SlotRole::PostConstants, .. }));
    }

    #[test]
    fn range_from_previous_frame_is_stale() {
        let mut h = heap();
        let c = h.allocate_range([RangeKind::Constants]).unwrap();
        let t = h.allocate_range([RangeKind::Textures]).unwrap();
        h.reset();
        let err = gather(&spec(), &[Some(c), Some(t)], &h, |k| *k).unwrap_err();
        assert!(matches!(err, BindingError::Heap(HeapError::StaleSlot { .. })));
    }
}
