use serde::{Deserialize, Serialize};
use std::fmt;

/// One stored payload: `size` bytes starting at byte `pos` of the archive.
///
/// Names are lookup keys only and need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub size: u64,
    pub pos: u64,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>, size: u64, pos: u64) -> Self {
        Self { name: name.into(), size, pos }
    }

    /// Offset one past the payload's last byte; `None` on overflow.
    #[inline]
    pub fn end(&self) -> Option<u64> {
        self.pos.checked_add(self.size)
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} bytes @ {}]", self.name, self.size, self.pos)
    }
}
