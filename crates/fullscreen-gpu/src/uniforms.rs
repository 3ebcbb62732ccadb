use crate::context::BlitParams;

const PARAMS_SIZE: u64 = std::mem::size_of::<BlitParams>() as u64;
const INITIAL_SLOTS: u64 = 16;

/// Slot bookkeeping for [`UniformRing`]: hands out aligned offsets until the
/// buffer is full. Reset once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotCursor {
    stride: u64,
    capacity: u64,
    next: u64,
}

impl SlotCursor {
    pub(crate) fn new(alignment: u64, capacity: u64) -> Self {
        Self {
            stride: wgpu::util::align_to(PARAMS_SIZE, alignment.max(1)),
            capacity,
            next: 0,
        }
    }

    /// Byte offset of the next free slot, or `None` when the buffer is full.
    pub(crate) fn claim(&mut self) -> Option<u64> {
        if self.next == self.capacity {
            return None;
        }
        let offset = self.next * self.stride;
        self.next += 1;
        Some(offset)
    }

    pub(crate) fn reset(&mut self) {
        self.next = 0;
    }

    pub(crate) fn stride(&self) -> u64 {
        self.stride
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }
}

/// One persistent uniform buffer holding the `BlitParams` of every draw in
/// a frame, bound with a dynamic offset per draw.
///
/// Draws in one encoder each need their own constants, and `write_buffer`
/// lands before the encoder runs, so every draw gets its own slot.
pub(crate) struct UniformRing {
    buffer: wgpu::Buffer,
    cursor: SlotCursor,
}

impl UniformRing {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let cursor = SlotCursor::new(alignment, INITIAL_SLOTS);
        Self {
            buffer: create_buffer(device, &cursor),
            cursor,
        }
    }

    /// Binding size of one slot.
    pub(crate) fn binding_size() -> Option<wgpu::BufferSize> {
        wgpu::BufferSize::new(PARAMS_SIZE)
    }

    pub(crate) fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub(crate) fn begin_frame(&mut self) {
        self.cursor.reset();
    }

    /// Upload `params` into a fresh slot and return its dynamic offset.
    ///
    /// A full ring is replaced by one twice the size. Bind groups made
    /// earlier in the frame keep the old buffer alive until they are done.
    pub(crate) fn push(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: &BlitParams,
    ) -> u32 {
        let offset = match self.cursor.claim() {
            Some(offset) => offset,
            None => {
                let mut cursor = SlotCursor {
                    capacity: self.cursor.capacity() * 2,
                    ..self.cursor
                };
                cursor.reset();
                log::debug!("uniform ring grown to {} slots", cursor.capacity());
                self.buffer = create_buffer(device, &cursor);
                self.cursor = cursor;
                self.cursor.claim().unwrap_or(0)
            }
        };
        queue.write_buffer(&self.buffer, offset, bytemuck::bytes_of(params));
        offset as u32
    }
}

fn create_buffer(device: &wgpu::Device, cursor: &SlotCursor) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("fullscreen_params"),
        size: cursor.stride() * cursor.capacity(),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
