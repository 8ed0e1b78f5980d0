use bytemuck::Pod;

use super::heap::{HeapError, HeapKind};

/// Byte range of one constant block inside the ring buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConstantAllocation {
    pub offset: u64,
    pub size: u64,
}

/// Aligned bump cursor over a fixed byte budget.
#[derive(Debug, Clone)]
pub(crate) struct RingCursor {
    capacity: u64,
    alignment: u64,
    head: u64,
}

impl RingCursor {
    pub(crate) fn new(capacity: u64, alignment: u64) -> Self {
        debug_assert!(alignment.is_power_of_two());
        Self {
            capacity,
            alignment,
            head: 0,
        }
    }

    pub(crate) fn allocate(&mut self, size: u64) -> Result<ConstantAllocation, HeapError> {
        let offset = align_up(self.head, self.alignment);
        let end = offset + size;
        if end > self.capacity {
            log::error!(
                "constant ring exhausted: {size} bytes requested at offset {offset}, capacity {}",
                self.capacity
            );
            return Err(HeapError::Exhausted {
                kind: HeapKind::Constants,
                requested: size as u32,
                used: self.head as u32,
                capacity: self.capacity as u32,
            });
        }
        self.head = end;
        Ok(ConstantAllocation { offset, size })
    }

    pub(crate) fn used(&self) -> u64 {
        self.head
    }

    pub(crate) fn reset(&mut self) {
        self.head = 0;
    }
}

#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Per-frame uniform buffer shared by every pass.
///
/// Blocks are written through the queue at allocation time and stay valid until
/// the next `reset`, which happens together with the descriptor heaps.
pub struct ConstantRing {
    buffer: wgpu::Buffer,
    cursor: RingCursor,
}

impl ConstantRing {
    pub fn new(device: &wgpu::Device, capacity: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("umbra constant ring"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            cursor: RingCursor::new(capacity, alignment.max(4)),
        }
    }

    pub fn push<T: Pod>(
        &mut self,
        queue: &wgpu::Queue,
        value: &T,
    ) -> Result<ConstantAllocation, HeapError> {
        let bytes = bytemuck::bytes_of(value);
        let alloc = self.cursor.allocate(bytes.len() as u64)?;
        queue.write_buffer(&self.buffer, alloc.offset, bytes);
        Ok(alloc)
    }

    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.cursor.used()
    }

    pub fn reset(&mut self) {
        self.cursor.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_start_on_alignment() {
        let mut c = RingCursor::new(1024, 256);
        let a = c.allocate(80).unwrap();
        let b = c.allocate(16).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 256);
        assert_eq!(c.used(), 272);
    }

    #[test]
    fn overflow_reports_constants_heap() {
        let mut c = RingCursor::new(512, 256);
        c.allocate(256).unwrap();
        c.allocate(200).unwrap();
        let err = c.allocate(1).unwrap_err();
        assert!(matches!(err, HeapError::Exhausted { kind: HeapKind::Constants, .. }));
    }

    #[test]
    fn reset_rewinds() {
        let mut c = RingCursor::new(256, 256);
        c.allocate(256).unwrap();
        c.reset();
        assert_eq!(c.allocate(64).unwrap().offset, 0);
    }

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
