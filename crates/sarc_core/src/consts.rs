// crates/sarc_core/src/consts.rs

/// Trailer: u32 byte length of the index-records section, last 4 bytes of the file.
pub const TRAILER_BYTES: u64 = 4;

/// Ceiling for payloads appended from a buffer, file or stream (4 GiB - 1).
pub const MAX_STREAM_PAYLOAD: u64 = u32::MAX as u64;

/// Ceiling for payloads materialized into memory by `get_file` (2 GiB - 1).
pub const MAX_BUFFERED_PAYLOAD: u64 = i32::MAX as u64;

/// Names are u16 length-prefixed.
pub const MAX_NAME_BYTES: usize = u16::MAX as usize;

/// Chunk size used when copying a stream into the archive.
pub const COPY_CHUNK: usize = 64 * 1024;

/// On-disk layout of one index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexLayout {
    /// `{ name; u32 size }`, positions rebuilt as a running sum of sizes.
    Sized,
    /// `{ name; u32 size; u64 pos }`
    #[default]
    Positioned,
}

impl IndexLayout {
    /// Fixed bytes per record, not counting the name itself.
    pub const fn fixed_bytes(self) -> usize {
        match self {
            IndexLayout::Sized => 2 + 4,
            IndexLayout::Positioned => 2 + 4 + 8,
        }
    }
}
