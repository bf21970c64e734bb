pub mod consts;
pub mod errors;
pub mod utils;
pub mod entry;
pub mod index;
pub mod archive;

pub use archive::{Archive, ArchiveOptions, EntryReader, OpenMode, SessionState};
pub use consts::IndexLayout;
pub use entry::IndexEntry;
pub use errors::{ArchiveError, Result};
