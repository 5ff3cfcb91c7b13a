use std::io;

use thiserror::Error;

/// Construction-time failures. None of these leave a partially built
/// manager behind; file handles already opened are closed on the way out.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid layout: {0}")]
    InvalidLayout(&'static str),
    #[error("cannot open executable image read-only")]
    Image(#[source] io::Error),
    #[error("cannot create swap file")]
    Swap(#[source] io::Error),
}

/// Per-call failures of `load`/`store`. The manager stays usable after any
/// of these.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("negative or out-of-range address")]
    InvalidAddress,
    #[error("store into the read-only text segment")]
    ReadOnlyViolation,
    #[error("load from a heap/stack page that was never written")]
    UninitializedPage,
    #[error("backing store I/O failed")]
    Io(#[from] io::Error),
}
