use std::path::Path;

use backing_store::{ExecutableImage, SwapStore};
use log::{debug, info};
use memory::{FrameAllocator, PhysicalMemory};

use crate::address::{Layout, Segment, VirtualAddress};
use crate::error::{AccessError, SetupError};
use crate::page_table::PageTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Load,
    Store,
}

/// One process's address space: page table, frame pool, executable image
/// and swap file. Single-owner and non-reentrant; every access takes
/// `&mut self`, so exclusive use is enforced by the borrow checker.
pub struct MemoryManager {
    layout: Layout,
    image: ExecutableImage,
    swap: SwapStore,
    table: PageTable,
    memory: PhysicalMemory,
    frames: FrameAllocator,
    clock: u64,
}

impl MemoryManager {
    /// Opens the executable image read-only and creates the swap file,
    /// pre-sized with zeros. Fails without leaking handles: whatever was
    /// already opened is closed by drop on the error path.
    pub fn new(
        image_path: impl AsRef<Path>,
        swap_path: impl AsRef<Path>,
        layout: Layout,
    ) -> Result<Self, SetupError> {
        layout.validate()?;
        let image =
            ExecutableImage::open(image_path, layout.page_size).map_err(SetupError::Image)?;
        let swap = SwapStore::create(swap_path, layout.swap_len(), layout.page_size)
            .map_err(SetupError::Swap)?;
        info!(
            "memory manager up: {} frames of {} bytes, {} swap slots",
            layout.frames(),
            layout.page_size,
            swap.slots()
        );
        Ok(MemoryManager {
            table: PageTable::new(&layout),
            memory: PhysicalMemory::new(layout.frames(), layout.page_size),
            frames: FrameAllocator::new(layout.frames()),
            clock: 0,
            layout,
            image,
            swap,
        })
    }

    pub fn load(&mut self, address: i32) -> Result<u8, AccessError> {
        let va = self.resolve(address)?;
        let entry = *self.table.entry(va.segment, va.page);
        if let (true, Some(frame)) = (entry.valid, entry.frame) {
            let now = self.tick();
            self.table.entry_mut(va.segment, va.page).last_access = now;
            return Ok(self.memory.byte(frame, va.offset));
        }
        let frame = self.fault_in(va, Access::Load)?;
        Ok(self.memory.byte(frame, va.offset))
    }

    pub fn store(&mut self, address: i32, value: u8) -> Result<(), AccessError> {
        let va = self.resolve(address)?;
        if va.segment == Segment::Text {
            return Err(AccessError::ReadOnlyViolation);
        }
        let entry = *self.table.entry(va.segment, va.page);
        if let (true, Some(frame)) = (entry.valid, entry.frame) {
            let now = self.tick();
            let entry = self.table.entry_mut(va.segment, va.page);
            entry.last_access = now;
            entry.dirty = true;
            self.memory.set_byte(frame, va.offset, value);
            return Ok(());
        }
        let frame = self.fault_in(va, Access::Store)?;
        self.table.entry_mut(va.segment, va.page).dirty = true;
        self.memory.set_byte(frame, va.offset, value);
        Ok(())
    }

    fn resolve(&self, address: i32) -> Result<VirtualAddress, AccessError> {
        let va = VirtualAddress::translate(address, self.layout.page_size)?;
        // the translator leaves segment-length checks to us
        if va.page >= self.table.pages(va.segment) {
            return Err(AccessError::InvalidAddress);
        }
        Ok(va)
    }

    /// Brings the faulting page into a frame and marks it resident. On any
    /// I/O failure the faulting descriptor is left untouched and the frame
    /// goes back to the allocator; a victim eviction that already completed
    /// stays completed.
    fn fault_in(&mut self, va: VirtualAddress, access: Access) -> Result<usize, AccessError> {
        let entry = *self.table.entry(va.segment, va.page);
        if access == Access::Load && va.segment == Segment::HeapStack && !entry.dirty {
            return Err(AccessError::UninitializedPage);
        }
        debug!("page fault: {} page {}", va.segment, va.page);

        let frame = self.obtain_frame()?;
        let populate = if entry.dirty {
            // the page is parked in swap
            let slot = entry
                .swap_slot
                .expect("dirty non-resident page without a swap slot");
            self.swap
                .read_in(slot)
                .map(|content| self.memory.page_mut(frame).copy_from_slice(&content))
        } else if access == Access::Store
            && (va.segment == Segment::Bss || va.segment == Segment::HeapStack)
        {
            // first touch by a store: no backing content, hand out zeros
            self.memory.fill_page(frame, 0);
            Ok(())
        } else {
            let base = self
                .layout
                .image_base(va.segment)
                .expect("image-backed segment");
            self.image
                .read_page(base + va.page * self.layout.page_size)
                .map(|content| self.memory.page_mut(frame).copy_from_slice(&content))
        };
        if let Err(e) = populate {
            self.frames.release(frame);
            return Err(e.into());
        }

        let now = self.tick();
        let resident = self.table.entry_mut(va.segment, va.page);
        resident.valid = true;
        resident.frame = Some(frame);
        resident.last_access = now;
        if entry.dirty {
            resident.swap_slot = None;
        }
        Ok(frame)
    }

    /// First-fit allocation, falling back to LRU eviction when the pool is
    /// full. The evicted frame is the only free one afterwards, so the
    /// follow-up allocation returns it.
    fn obtain_frame(&mut self) -> Result<usize, AccessError> {
        if let Some(frame) = self.frames.allocate() {
            return Ok(frame);
        }
        self.evict_lru()?;
        Ok(self.frames.allocate().expect("eviction freed no frame"))
    }

    /// Evicts the valid page with the oldest access time. Dirty non-text
    /// pages are written to swap first and remember their slot; everything
    /// else is recoverable from the image (or was never committed) and is
    /// simply dropped.
    fn evict_lru(&mut self) -> Result<(), AccessError> {
        let (segment, page) = self
            .table
            .oldest_resident()
            .expect("frame pool full but no page is resident");
        let entry = *self.table.entry(segment, page);
        let frame = entry.frame.expect("resident page without a frame");
        debug!("evicting {} page {} from frame {}", segment, page, frame);

        if entry.dirty && segment != Segment::Text {
            let slot = self.swap.write_out(self.memory.page(frame))?;
            self.table.entry_mut(segment, page).swap_slot = Some(slot);
        }
        let victim = self.table.entry_mut(segment, page);
        victim.valid = false;
        victim.frame = None;
        self.frames.release(frame);
        Ok(())
    }

    fn tick(&mut self) -> u64 {
        let now = self.clock;
        self.clock += 1;
        now
    }

    // --- read-only introspection -----------------------------------------

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn page_table(&self) -> &PageTable {
        &self.table
    }

    pub fn memory_bytes(&self) -> &[u8] {
        self.memory.as_bytes()
    }

    pub fn resident_pages(&self) -> usize {
        self.table.resident_count()
    }

    /// Snapshot of one swap slot. Reads only; unlike a fault-path read it
    /// does not consume the slot.
    pub fn swap_slot(&mut self, slot: usize) -> Result<Vec<u8>, AccessError> {
        Ok(self.swap.peek_slot(slot)?)
    }

    pub fn swap_slots(&self) -> usize {
        self.swap.slots()
    }
}
