use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions detected at the capture or sink boundary.
///
/// Per-record policy rejections are never errors; they surface as
/// [`crate::policy::Verdict::Dropped`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bad pcap magic number {found:#010X}, expected 0xA1B2C3D4")]
    BadMagic { found: u32 },

    #[error("capture file ends in the middle of a record")]
    TruncatedCapture,

    #[error("unsupported transport protocol {protocol:#04X}, expected TCP (0x06) or UDP (0x11)")]
    UnsupportedProtocol { protocol: u8 },

    #[error("captured frame too short: {len} bytes, need at least {need}")]
    TruncatedFrame { len: usize, need: usize },

    #[error("lane worker thread panicked")]
    WorkerPanic,
}

pub type Result<T> = std::result::Result<T, Error>;
