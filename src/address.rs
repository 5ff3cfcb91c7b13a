use std::fmt;

use crate::error::{AccessError, SetupError};

pub const ADDRESS_BITS: u32 = 12;
pub const SEGMENT_BITS: u32 = 2;

pub const SEGMENT_SHIFT: u32 = ADDRESS_BITS - SEGMENT_BITS;
pub const ADDRESS_MASK: u32 = (1 << ADDRESS_BITS) - 1;
pub const SPAN_MASK: u32 = (1 << SEGMENT_SHIFT) - 1;

/// The four fixed regions of the address space, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Text,
    Data,
    Bss,
    HeapStack,
}

impl Segment {
    pub const ALL: [Segment; 4] = [Segment::Text, Segment::Data, Segment::Bss, Segment::HeapStack];

    pub fn index(self) -> usize {
        self as usize
    }

    fn from_bits(bits: u32) -> Segment {
        // bits come masked to SEGMENT_BITS wide
        match bits {
            0 => Segment::Text,
            1 => Segment::Data,
            2 => Segment::Bss,
            _ => Segment::HeapStack,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Text => "text",
            Segment::Data => "data",
            Segment::Bss => "bss",
            Segment::HeapStack => "heap/stack",
        };
        write!(f, "{}", name)
    }
}

/// A linear address decomposed into (segment, page, offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub segment: Segment,
    pub page: usize,
    pub offset: usize,
}

impl VirtualAddress {
    /// Splits an address: the two most significant bits select the segment,
    /// the rest is a byte offset into that segment, divided into a page
    /// index and an in-page offset. Division and modulo instead of bit
    /// slicing, so page sizes need not be powers of two.
    ///
    /// No check against the actual segment length happens here; that is the
    /// manager's job.
    pub fn translate(address: i32, page_size: usize) -> Result<VirtualAddress, AccessError> {
        if address < 0 {
            return Err(AccessError::InvalidAddress);
        }
        let raw = address as u32 & ADDRESS_MASK;
        let segment = Segment::from_bits(raw >> SEGMENT_SHIFT);
        let span = (raw & SPAN_MASK) as usize;
        Ok(VirtualAddress {
            segment,
            page: span / page_size,
            offset: span % page_size,
        })
    }
}

/// Byte sizes of the four segments plus the page size and the physical
/// memory size. Everything the manager needs to size its tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub text: usize,
    pub data: usize,
    pub bss: usize,
    pub heap_stack: usize,
    pub page_size: usize,
    pub memory: usize,
}

impl Layout {
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.page_size == 0 {
            return Err(SetupError::InvalidLayout("page size must be positive"));
        }
        for segment in Segment::ALL {
            let len = self.segment_len(segment);
            if len == 0 || len % self.page_size != 0 {
                return Err(SetupError::InvalidLayout(
                    "segment sizes must be positive multiples of the page size",
                ));
            }
        }
        if self.memory == 0 || self.memory % self.page_size != 0 {
            return Err(SetupError::InvalidLayout(
                "memory size must be a positive multiple of the page size",
            ));
        }
        Ok(())
    }

    pub fn segment_len(&self, segment: Segment) -> usize {
        match segment {
            Segment::Text => self.text,
            Segment::Data => self.data,
            Segment::Bss => self.bss,
            Segment::HeapStack => self.heap_stack,
        }
    }

    pub fn pages(&self, segment: Segment) -> usize {
        self.segment_len(segment) / self.page_size
    }

    /// Byte offset of a segment's initial content within the executable
    /// image. The heap/stack segment has no image backing.
    pub fn image_base(&self, segment: Segment) -> Option<usize> {
        match segment {
            Segment::Text => Some(0),
            Segment::Data => Some(self.text),
            Segment::Bss => Some(self.text + self.data),
            Segment::HeapStack => None,
        }
    }

    /// The swap file covers every page that can ever be dirty.
    pub fn swap_len(&self) -> usize {
        self.data + self.bss + self.heap_stack
    }

    pub fn frames(&self) -> usize {
        self.memory / self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(segment: Segment, page: usize, offset: usize, page_size: usize) -> i32 {
        ((segment.index() << SEGMENT_SHIFT as usize) | (page * page_size + offset)) as i32
    }

    #[test]
    fn decompose_segment_bits() {
        let va = VirtualAddress::translate(0, 4).unwrap();
        assert_eq!(va.segment, Segment::Text);

        let va = VirtualAddress::translate(1 << SEGMENT_SHIFT, 4).unwrap();
        assert_eq!(va.segment, Segment::Data);

        let va = VirtualAddress::translate(2 << SEGMENT_SHIFT, 4).unwrap();
        assert_eq!(va.segment, Segment::Bss);

        let va = VirtualAddress::translate(3 << SEGMENT_SHIFT, 4).unwrap();
        assert_eq!(va.segment, Segment::HeapStack);
    }

    #[test]
    fn decompose_page_and_offset() {
        let va = VirtualAddress::translate(compose(Segment::Data, 3, 2, 4), 4).unwrap();
        assert_eq!(va.segment, Segment::Data);
        assert_eq!(va.page, 3);
        assert_eq!(va.offset, 2);
    }

    #[test]
    fn negative_address_rejected() {
        assert!(matches!(
            VirtualAddress::translate(-1, 4),
            Err(AccessError::InvalidAddress)
        ));
    }

    #[test]
    fn round_trip_every_encodable_address() {
        for page_size in [2usize, 4, 8, 16] {
            for raw in 0..(1i32 << ADDRESS_BITS) {
                let va = VirtualAddress::translate(raw, page_size).unwrap();
                let rebuilt = compose(va.segment, va.page, va.offset, page_size);
                assert_eq!(rebuilt, raw, "page_size={}", page_size);
            }
        }
    }

    #[test]
    fn round_trip_non_power_of_two_page_size() {
        for raw in 0..(1i32 << ADDRESS_BITS) {
            let va = VirtualAddress::translate(raw, 3).unwrap();
            let rebuilt = compose(va.segment, va.page, va.offset, 3);
            assert_eq!(rebuilt, raw);
        }
    }

    #[test]
    fn layout_bases_and_swap() {
        let layout = Layout {
            text: 8,
            data: 12,
            bss: 4,
            heap_stack: 16,
            page_size: 4,
            memory: 16,
        };
        layout.validate().unwrap();
        assert_eq!(layout.image_base(Segment::Text), Some(0));
        assert_eq!(layout.image_base(Segment::Data), Some(8));
        assert_eq!(layout.image_base(Segment::Bss), Some(20));
        assert_eq!(layout.image_base(Segment::HeapStack), None);
        assert_eq!(layout.swap_len(), 32);
        assert_eq!(layout.frames(), 4);
        assert_eq!(layout.pages(Segment::Data), 3);
    }

    #[test]
    fn layout_rejects_unaligned_sizes() {
        let mut layout = Layout {
            text: 8,
            data: 8,
            bss: 8,
            heap_stack: 8,
            page_size: 4,
            memory: 16,
        };
        layout.data = 6;
        assert!(layout.validate().is_err());
        layout.data = 8;
        layout.memory = 10;
        assert!(layout.validate().is_err());
        layout.memory = 16;
        layout.text = 0;
        assert!(layout.validate().is_err());
    }
}
