use log::debug;

/// Fixed pool of physical frames, owned exclusively by the memory manager.
/// Holds bytes only; which page occupies which frame is the page table's
/// business.
#[derive(Debug)]
pub struct PhysicalMemory {
    bytes: Vec<u8>,
    page_size: usize,
}

impl PhysicalMemory {
    pub fn new(frames: usize, page_size: usize) -> Self {
        PhysicalMemory {
            bytes: vec![0; frames * page_size],
            page_size,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn byte(&self, frame: usize, offset: usize) -> u8 {
        self.bytes[frame * self.page_size + offset]
    }

    pub fn set_byte(&mut self, frame: usize, offset: usize, value: u8) {
        self.bytes[frame * self.page_size + offset] = value;
    }

    pub fn page(&self, frame: usize) -> &[u8] {
        &self.bytes[frame * self.page_size..(frame + 1) * self.page_size]
    }

    pub fn page_mut(&mut self, frame: usize) -> &mut [u8] {
        &mut self.bytes[frame * self.page_size..(frame + 1) * self.page_size]
    }

    pub fn fill_page(&mut self, frame: usize, value: u8) {
        self.page_mut(frame).fill(value);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Byte-packed occupancy bitmap over the frame pool. First-fit only: the
/// lowest clear bit wins, so allocation order is deterministic for a given
/// state.
#[derive(Debug)]
pub struct FrameAllocator {
    bitmap: Vec<u8>,
    frames: usize,
}

impl FrameAllocator {
    pub fn new(frames: usize) -> Self {
        let bitmap_len = frames / 8 + if frames % 8 == 0 { 0 } else { 1 };
        FrameAllocator {
            bitmap: vec![0; bitmap_len],
            frames,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Linear scan for the first unset bit. Marks it occupied and returns
    /// its frame index, or `None` when every frame is taken.
    pub fn allocate(&mut self) -> Option<usize> {
        for i in 0..self.bitmap.len() {
            for j in 0..8 {
                let frame = i * 8 + j;
                if frame >= self.frames {
                    break;
                }
                if self.bitmap[i] & (1 << j) == 0 {
                    self.bitmap[i] |= 1 << j;
                    return Some(frame);
                }
            }
        }
        debug!("No free frames");
        None
    }

    pub fn release(&mut self, frame: usize) {
        self.bitmap[frame / 8] &= !(1 << (frame % 8));
    }

    pub fn is_occupied(&self, frame: usize) -> bool {
        self.bitmap[frame / 8] & (1 << (frame % 8)) != 0
    }

    pub fn occupied(&self) -> usize {
        (0..self.frames).filter(|&f| self.is_occupied(f)).count()
    }
}
