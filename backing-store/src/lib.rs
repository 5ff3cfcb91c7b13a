use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use log::info;

/// Read-only backing store for the text, data and bss segments. The file
/// handle is opened once and held for the owner's lifetime; dropping the
/// image closes it.
#[derive(Debug)]
pub struct ExecutableImage {
    file: File,
    page_size: usize,
}

impl ExecutableImage {
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> io::Result<Self> {
        let file = File::options().read(true).open(path)?;
        Ok(ExecutableImage { file, page_size })
    }

    /// Reads exactly one page starting at the given byte offset into the
    /// image.
    pub fn read_page(&mut self, offset: usize) -> io::Result<Vec<u8>> {
        info!("Start reading image page at offset {}", offset);
        self.file.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = vec![0; self.page_size];
        self.file.read_exact(&mut buf)?;
        info!("Done reading image page at offset {}", offset);
        Ok(buf)
    }
}

/// File-backed swap area for evicted dirty pages. Slots are claimed by a
/// circular cursor that wraps at capacity; there is no free list, so the
/// caller must keep the number of simultaneously swapped pages below the
/// slot count or accept slot aliasing.
#[derive(Debug)]
pub struct SwapStore {
    file: File,
    page_size: usize,
    slots: usize,
    cursor: usize,
}

impl SwapStore {
    /// Creates (truncating any existing content) a swap file of `len` bytes,
    /// pre-sized by writing zeros so the initial content is deterministic.
    pub fn create<P: AsRef<Path>>(path: P, len: usize, page_size: usize) -> io::Result<Self> {
        let mut file = File::options()
            .truncate(true)
            .write(true)
            .read(true)
            .create(true)
            .open(path)?;
        file.write_all(&vec![0; len])?;
        Ok(SwapStore {
            file,
            page_size,
            slots: len / page_size,
            cursor: 0,
        })
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Writes one page at the cursor slot and returns that slot index. The
    /// cursor wraps to 0 once it has walked past the last slot.
    pub fn write_out(&mut self, page: &[u8]) -> io::Result<usize> {
        if self.cursor >= self.slots {
            self.cursor = 0;
        }
        let slot = self.cursor;
        info!("Start writing swap slot[{}]", slot);
        self.file
            .seek(SeekFrom::Start((slot * self.page_size) as u64))?;
        self.file.write_all(page)?;
        info!("Done writing swap slot[{}]", slot);
        self.cursor += 1;
        Ok(slot)
    }

    /// Reads one slot back and immediately zero-fills it in the file. A slot
    /// is consumed exactly once; reading it again yields zeros.
    pub fn read_in(&mut self, slot: usize) -> io::Result<Vec<u8>> {
        info!("Start reading swap slot[{}]", slot);
        self.file
            .seek(SeekFrom::Start((slot * self.page_size) as u64))?;
        let mut buf = vec![0; self.page_size];
        self.file.read_exact(&mut buf)?;
        self.file
            .seek(SeekFrom::Start((slot * self.page_size) as u64))?;
        self.file.write_all(&vec![0; self.page_size])?;
        info!("Done reading swap slot[{}]", slot);
        Ok(buf)
    }

    /// Reads a slot without consuming it. Diagnostics only; never mutates
    /// the file.
    pub fn peek_slot(&mut self, slot: usize) -> io::Result<Vec<u8>> {
        self.file
            .seek(SeekFrom::Start((slot * self.page_size) as u64))?;
        let mut buf = vec![0; self.page_size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
