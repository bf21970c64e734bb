use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    SizeLimitExceeded { size: u64, max: u64 },

    #[error("entry name is {len} bytes, at most 65535 fit in an index record")]
    NameTooLong { len: usize },

    #[error("malformed archive: {0}")]
    Malformed(String),
}

impl ArchiveError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ArchiveError::Malformed(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
