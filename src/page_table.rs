use std::fmt;

use crate::address::{Layout, Segment};

/// Bookkeeping for one page of one segment.
///
/// Invariants the manager maintains: `valid` implies `frame` is set; frames
/// of valid descriptors are pairwise distinct; text pages are never dirty
/// and never hold a swap slot; a dirty non-resident page always holds a
/// swap slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    pub valid: bool,
    pub frame: Option<usize>,
    pub dirty: bool,
    pub swap_slot: Option<usize>,
    pub last_access: u64,
}

impl PageDescriptor {
    pub const fn unmapped() -> Self {
        PageDescriptor {
            valid: false,
            frame: None,
            dirty: false,
            swap_slot: None,
            last_access: 0,
        }
    }
}

/// Per-segment descriptor arrays, sized once at construction and never
/// resized. Entries only transition between states.
pub struct PageTable {
    entries: [Vec<PageDescriptor>; 4],
}

impl PageTable {
    pub fn new(layout: &Layout) -> Self {
        let entries =
            Segment::ALL.map(|segment| vec![PageDescriptor::unmapped(); layout.pages(segment)]);
        PageTable { entries }
    }

    pub fn pages(&self, segment: Segment) -> usize {
        self.entries[segment.index()].len()
    }

    pub fn entry(&self, segment: Segment, page: usize) -> &PageDescriptor {
        &self.entries[segment.index()][page]
    }

    pub fn entry_mut(&mut self, segment: Segment, page: usize) -> &mut PageDescriptor {
        &mut self.entries[segment.index()][page]
    }

    pub fn segment_entries(&self, segment: Segment) -> &[PageDescriptor] {
        &self.entries[segment.index()]
    }

    pub fn resident_count(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|entry| entry.valid)
            .count()
    }

    /// LRU victim selection: walk segments in enumeration order and pages
    /// ascending, keep the valid entry with the smallest `last_access`.
    /// Strict `<` means the earliest-scanned entry wins ties.
    pub fn oldest_resident(&self) -> Option<(Segment, usize)> {
        let mut oldest = None;
        let mut oldest_access = u64::MAX;
        for segment in Segment::ALL {
            for (page, entry) in self.segment_entries(segment).iter().enumerate() {
                if entry.valid && entry.last_access < oldest_access {
                    oldest_access = entry.last_access;
                    oldest = Some((segment, page));
                }
            }
        }
        oldest
    }
}

impl fmt::Display for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in Segment::ALL {
            writeln!(f, "{}:", segment)?;
            writeln!(f, "Valid\tDirty\tFrame\tSwap index")?;
            for entry in self.segment_entries(segment) {
                writeln!(
                    f,
                    "[{}]\t[{}]\t[{}]\t[{}]",
                    entry.valid as u8,
                    entry.dirty as u8,
                    entry.frame.map_or(-1, |frame| frame as i64),
                    entry.swap_slot.map_or(-1, |slot| slot as i64),
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PageTable {
        PageTable::new(&Layout {
            text: 8,
            data: 8,
            bss: 8,
            heap_stack: 8,
            page_size: 4,
            memory: 16,
        })
    }

    fn make_resident(table: &mut PageTable, segment: Segment, page: usize, frame: usize, at: u64) {
        let entry = table.entry_mut(segment, page);
        entry.valid = true;
        entry.frame = Some(frame);
        entry.last_access = at;
    }

    #[test]
    fn starts_fully_unmapped() {
        let table = table();
        assert_eq!(table.pages(Segment::Text), 2);
        assert_eq!(table.resident_count(), 0);
        assert_eq!(table.oldest_resident(), None);
        for segment in Segment::ALL {
            for entry in table.segment_entries(segment) {
                assert_eq!(*entry, PageDescriptor::unmapped());
            }
        }
    }

    #[test]
    fn oldest_resident_picks_minimum() {
        let mut table = table();
        make_resident(&mut table, Segment::Text, 0, 0, 7);
        make_resident(&mut table, Segment::Data, 1, 1, 3);
        make_resident(&mut table, Segment::HeapStack, 0, 2, 5);
        assert_eq!(table.oldest_resident(), Some((Segment::Data, 1)));
    }

    #[test]
    fn ties_break_in_scan_order() {
        let mut table = table();
        make_resident(&mut table, Segment::Bss, 0, 0, 4);
        make_resident(&mut table, Segment::Data, 1, 1, 4);
        make_resident(&mut table, Segment::Data, 0, 2, 4);
        // all tied; the first one met in segment-then-page order wins
        assert_eq!(table.oldest_resident(), Some((Segment::Data, 0)));
    }

    #[test]
    fn invalid_entries_are_not_candidates() {
        let mut table = table();
        make_resident(&mut table, Segment::Data, 0, 0, 1);
        make_resident(&mut table, Segment::Bss, 0, 1, 9);
        // a stale entry: timestamp says old, but it is no longer valid
        let entry = table.entry_mut(Segment::Data, 0);
        entry.valid = false;
        assert_eq!(table.oldest_resident(), Some((Segment::Bss, 0)));
    }

    #[test]
    fn display_lists_every_segment() {
        let mut table = table();
        make_resident(&mut table, Segment::Data, 0, 3, 0);
        let rendered = format!("{}", table);
        assert!(rendered.contains("text:"));
        assert!(rendered.contains("heap/stack:"));
        assert!(rendered.contains("[1]\t[0]\t[3]\t[-1]"));
    }
}
