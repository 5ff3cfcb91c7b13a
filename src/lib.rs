pub mod address;
pub mod error;
pub mod manager;
pub mod page_table;

pub use address::{Layout, Segment, VirtualAddress};
pub use error::{AccessError, SetupError};
pub use manager::MemoryManager;
pub use page_table::{PageDescriptor, PageTable};
