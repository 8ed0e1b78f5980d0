use thiserror::Error;

/// Which descriptor table a slot belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HeapKind {
    /// Color attachment views.
    RenderTarget,
    /// Depth attachment views.
    DepthStencil,
    /// Constant/texture/storage views readable by shaders.
    ShaderVisible,
    /// Byte ranges inside the per-frame constant ring.
    Constants,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum HeapError {
    #[error("{kind:?} heap exhausted: requested {requested} slot(s), {used}/{capacity} in use")]
    Exhausted {
        kind: HeapKind,
        requested: u32,
        used: u32,
        capacity: u32,
    },

    #[error("{kind:?} slot {index} was issued in epoch {slot_epoch} but the heap is at epoch {heap_epoch}")]
    StaleSlot {
        kind: HeapKind,
        index: u32,
        slot_epoch: u64,
        heap_epoch: u64,
    },

    #[error("{kind:?} slot {index} is outside the {used} allocated slot(s)")]
    OutOfRange { kind: HeapKind, index: u32, used: u32 },
}

/// Index into a descriptor heap, valid only until the next `reset`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HeapSlot {
    pub index: u32,
    epoch: u64,
}

/// Contiguous run of slots issued by one `allocate_range` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeapRange {
    pub start: u32,
    pub count: u32,
    epoch: u64,
}

impl HeapRange {
    pub fn slot(&self, i: u32) -> Option<HeapSlot> {
        (i < self.count).then_some(HeapSlot {
            index: self.start + i,
            epoch: self.epoch,
        })
    }

    pub fn slots(&self) -> impl Iterator<Item = HeapSlot> + '_ {
        (0..self.count).filter_map(|i| self.slot(i))
    }
}

/// Fixed-capacity, append-only table of views.
///
/// Allocation bumps a cursor; nothing is freed individually. `reset` empties the
/// table and advances the epoch so that slots handed out before the reset are
/// rejected instead of silently aliasing whatever lands at the same index later.
#[derive(Debug)]
pub struct DescriptorHeap<T> {
    kind: HeapKind,
    capacity: u32,
    entries: Vec<T>,
    epoch: u64,
    high_water: u32,
}

impl<T> DescriptorHeap<T> {
    pub fn new(kind: HeapKind, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            entries: Vec::with_capacity(capacity as usize),
            epoch: 0,
            high_water: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> HeapKind {
        self.kind
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Largest number of slots held at once since creation.
    #[inline]
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    pub fn allocate(&mut self, entry: T) -> Result<HeapSlot, HeapError> {
        self.ensure_room(1)?;
        let index = self.len();
        self.entries.push(entry);
        self.high_water = self.high_water.max(self.len());
        Ok(HeapSlot {
            index,
            epoch: self.epoch,
        })
    }

    /// Allocates a contiguous run. Either every entry is placed or none is.
    pub fn allocate_range<I>(&mut self, entries: I) -> Result<HeapRange, HeapError>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let entries = entries.into_iter();
        let count = entries.len() as u32;
        self.ensure_room(count)?;

        let start = self.len();
        self.entries.extend(entries);
        self.high_water = self.high_water.max(self.len());
        Ok(HeapRange {
            start,
            count,
            epoch: self.epoch,
        })
    }

    pub fn get(&self, slot: HeapSlot) -> Result<&T, HeapError> {
        self.check_epoch(slot.index, slot.epoch)?;
        self.entries.get(slot.index as usize).ok_or(HeapError::OutOfRange {
            kind: self.kind,
            index: slot.index,
            used: self.len(),
        })
    }

    pub fn get_range(&self, range: HeapRange) -> Result<&[T], HeapError> {
        self.check_epoch(range.start, range.epoch)?;
        let start = range.start as usize;
        let end = start + range.count as usize;
        self.entries.get(start..end).ok_or(HeapError::OutOfRange {
            kind: self.kind,
            index: range.start + range.count.saturating_sub(1),
            used: self.len(),
        })
    }

    /// Empties the heap. All previously issued slots become stale.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn ensure_room(&self, requested: u32) -> Result<(), HeapError> {
        if self.len() + requested > self.capacity {
            log::error!(
                "{:?} heap exhausted ({}/{} used, {} requested); raise the configured capacity",
                self.kind,
                self.len(),
                self.capacity,
                requested
            );
            return Err(HeapError::Exhausted {
                kind: self.kind,
                requested,
                used: self.len(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn check_epoch(&self, index: u32, slot_epoch: u64) -> Result<(), HeapError> {
        if slot_epoch != self.epoch {
            return Err(HeapError::StaleSlot {
                kind: self.kind,
                index,
                slot_epoch,
                heap_epoch: self.epoch,
            });
        }
        Ok(())
    }
}

/// Per-frame capacities of the three descriptor heaps and the constant ring.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeapCapacities {
    pub render_target: u32,
    pub depth_stencil: u32,
    pub shader_visible: u32,
    /// Constant ring size in bytes.
    pub constant_bytes: u64,
}

impl Default for HeapCapacities {
    fn default() -> Self {
        Self {
            render_target: 64,
            depth_stencil: 16,
            shader_visible: 16 * 1024,
            constant_bytes: 4 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap(cap: u32) -> DescriptorHeap<&'static str> {
        DescriptorHeap::new(HeapKind::ShaderVisible, cap)
    }

    // ── allocation ────────────────────────────────────────────────────────

    #[test]
    fn slots_are_unique_up_to_capacity() {
        let mut h = DescriptorHeap::new(HeapKind::RenderTarget, 32);
        let slots: Vec<_> = (0..32u32).map(|i| h.allocate(i).unwrap()).collect();

        let mut indices: Vec<u32> = slots.iter().map(|s| s.index).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), 32);

        for (i, s) in slots.iter().enumerate() {
            assert_eq!(*h.get(*s).unwrap(), i as u32);
        }
    }

    #[test]
    fn exceeding_capacity_is_an_error() {
        let mut h = heap(2);
        h.allocate("a").unwrap();
        h.allocate("b").unwrap();
        let err = h.allocate("c").unwrap_err();
        assert!(matches!(
            err,
            HeapError::Exhausted { requested: 1, used: 2, capacity: 2, .. }
        ));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn range_is_all_or_nothing() {
        let mut h = heap(4);
        h.allocate("a").unwrap();
        assert!(h.allocate_range(["b", "c", "d", "e"]).is_err());
        assert_eq!(h.len(), 1);

        let r = h.allocate_range(["b", "c", "d"]).unwrap();
        assert_eq!((r.start, r.count), (1, 3));
        assert_eq!(h.get_range(r).unwrap(), &["b", "c", "d"]);
    }

    #[test]
    fn range_slots_iterate_in_order() {
        let mut h = heap(8);
        h.allocate("x").unwrap();
        let r = h.allocate_range(["a", "b"]).unwrap();
        let got: Vec<_> = r.slots().map(|s| *h.get(s).unwrap()).collect();
        assert_eq!(got, vec!["a", "b"]);
        assert!(r.slot(2).is_none());
    }

    // ── reset ─────────────────────────────────────────────────────────────

    #[test]
    fn reset_restarts_at_zero() {
        let mut h = heap(4);
        h.allocate("a").unwrap();
        h.allocate("b").unwrap();
        h.reset();
        assert!(h.is_empty());
        assert_eq!(h.allocate("c").unwrap().index, 0);
    }

    #[test]
    fn slot_from_previous_epoch_is_rejected() {
        let mut h = heap(4);
        let old = h.allocate("old").unwrap();
        h.reset();
        h.allocate("new").unwrap();

        assert!(matches!(h.get(old), Err(HeapError::StaleSlot { index: 0, .. })));
    }

    #[test]
    fn high_water_survives_reset() {
        let mut h = heap(8);
        h.allocate_range(["a", "b", "c"]).unwrap();
        h.reset();
        h.allocate("d").unwrap();
        assert_eq!(h.high_water(), 3);
    }
}
