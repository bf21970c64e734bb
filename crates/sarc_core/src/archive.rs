//! Archive file format & IO
//!
//! Layout (BE):
//!   [payload_1]...[payload_N]      contiguous from offset 0, append order
//!   [index_record_1]...[index_record_N]
//!   u32 index_section_len          last 4 bytes of the file
//!
//! Records are described in [`crate::index`]. A file of at most 4 bytes is an
//! empty archive.
//!
//! One `Archive` is one session over one file: open, append and/or read,
//! then `finalize` (which consumes the store) or drop.

use crate::consts::{IndexLayout, COPY_CHUNK, MAX_BUFFERED_PAYLOAD, MAX_STREAM_PAYLOAD, TRAILER_BYTES};
use crate::entry::IndexEntry;
use crate::errors::{ArchiveError, Result};
use crate::index::{decode_index, encode_index};
use crate::utils::{check_name, read_u32, write_u32};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How an existing archive is opened. Both modes decode the whole index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Load entries for reading. Appends are possible but see [`Archive::add_file`].
    #[default]
    Read,
    /// Extend the archive: `finalize` re-serializes old and new entries together.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveOptions {
    pub mode: OpenMode,
    pub layout: IndexLayout,
}

impl ArchiveOptions {
    pub fn append() -> Self {
        Self { mode: OpenMode::Append, ..Self::default() }
    }

    pub fn with_layout(mut self, layout: IndexLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Write-side state of a session. `Finalized` is the consumed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No entries known yet.
    New,
    /// Entries loaded from disk, nothing appended.
    Loaded,
    /// At least one payload appended, or an append session over existing entries.
    Appending,
}

/// Single-file archive store.
pub struct Archive {
    path: PathBuf,
    file: File,
    layout: IndexLayout,
    entries: Vec<IndexEntry>,
    // first slot appended under each name
    by_name: HashMap<String, usize>,
    // next payload byte goes here; always the end of the payload area
    cursor: u64,
    state: SessionState,
}

impl Archive {
    /// Open (or create) with default options: read mode, positioned index records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ArchiveOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, opts: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        let len = file.metadata()?.len();

        let (entries, cursor) = if len > TRAILER_BYTES {
            load_index(&mut file, len, opts.layout)?
        } else {
            (Vec::new(), 0)
        };

        let state = match (entries.is_empty(), opts.mode) {
            (true, _) => SessionState::New,
            (false, OpenMode::Read) => SessionState::Loaded,
            (false, OpenMode::Append) => SessionState::Appending,
        };
        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            payload_end = cursor,
            mode = ?opts.mode,
            "opened archive"
        );

        let mut by_name = HashMap::with_capacity(entries.len());
        for (i, e) in entries.iter().enumerate() {
            by_name.entry(e.name.clone()).or_insert(i);
        }

        Ok(Self { path, file, layout: opts.layout, entries, by_name, cursor, state })
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn layout(&self) -> IndexLayout { self.layout }
    pub fn state(&self) -> SessionState { self.state }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Offset where the next payload will be written.
    pub fn payload_end(&self) -> u64 { self.cursor }

    /// All known entries in append order, loaded and appended alike.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// First entry appended under `name`.
    pub fn find(&self, name: &str) -> Option<&IndexEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Append `data` as a new payload named `name`.
    ///
    /// The payload overwrites whatever follows the payload area. On a store
    /// opened over an existing archive that is the old index section, so the
    /// archive is unreadable until this session is finalized.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<&IndexEntry> {
        let size = data.len() as u64;
        if size > MAX_STREAM_PAYLOAD {
            return Err(ArchiveError::SizeLimitExceeded { size, max: MAX_STREAM_PAYLOAD });
        }
        check_name(name)?;
        self.seek_cursor()?;
        self.file.write_all(data)?;
        Ok(self.record(name, size))
    }

    /// Append a payload read from `src` until end of stream.
    ///
    /// `src` is owned and dropped on every exit path. If it yields more than
    /// 4 GiB - 1 bytes the call fails, no entry is recorded, and the bytes
    /// already copied are overwritten by the next payload or cut off by
    /// `finalize`.
    pub fn add_reader<R: Read>(&mut self, name: &str, src: R) -> Result<&IndexEntry> {
        self.append_stream(name, src, MAX_STREAM_PAYLOAD)
    }

    fn append_stream<R: Read>(&mut self, name: &str, mut src: R, max: u64) -> Result<&IndexEntry> {
        check_name(name)?;
        self.seek_cursor()?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut written = 0u64;
        loop {
            let n = match src.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let next = written + n as u64;
            if next > max {
                return Err(ArchiveError::SizeLimitExceeded { size: next, max });
            }
            self.file.write_all(&buf[..n])?;
            written = next;
        }
        Ok(self.record(name, written))
    }

    /// Append a file from disk, keyed by its base name.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> Result<&IndexEntry> {
        let path = path.as_ref();
        let size = fs::metadata(path)?.len();
        if size > MAX_STREAM_PAYLOAD {
            return Err(ArchiveError::SizeLimitExceeded { size, max: MAX_STREAM_PAYLOAD });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, format!("{} has no file name", path.display())))?;
        let src = File::open(path)?;
        self.add_reader(&name, src)
    }

    /// Whole payload in memory. Entries over 2 GiB - 1 must use [`Archive::read_file`].
    pub fn get_file(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        if entry.size > MAX_BUFFERED_PAYLOAD {
            return Err(ArchiveError::SizeLimitExceeded { size: entry.size, max: MAX_BUFFERED_PAYLOAD });
        }
        let mut buf = vec![0u8; entry.size as usize];
        let mut f = &self.file;
        f.seek(SeekFrom::Start(entry.pos))?;
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Lazy, forward-only stream over exactly `entry.size` bytes.
    pub fn read_file(&self, entry: &IndexEntry) -> Result<EntryReader<'_>> {
        if entry.size > MAX_STREAM_PAYLOAD {
            return Err(ArchiveError::SizeLimitExceeded { size: entry.size, max: MAX_STREAM_PAYLOAD });
        }
        Ok(EntryReader { file: &self.file, pos: entry.pos, remaining: entry.size })
    }

    /// Write the index section and trailer, then sync.
    ///
    /// Writes nothing for a store with no entries, or for a read session in
    /// which nothing was appended. Anything left on disk past the new trailer
    /// is truncated.
    pub fn finalize(mut self) -> Result<PathBuf> {
        if self.state != SessionState::Appending {
            tracing::debug!(path = %self.path.display(), state = ?self.state, "finalize: nothing to write");
            return Ok(self.path);
        }

        let section = encode_index(&self.entries, self.layout)?;
        let section_len = u32::try_from(section.len()).map_err(|_| ArchiveError::SizeLimitExceeded {
            size: section.len() as u64,
            max: u32::MAX as u64,
        })?;

        self.seek_cursor()?;
        self.file.write_all(&section)?;
        write_u32(&mut self.file, section_len)?;
        let end = self.cursor + section.len() as u64 + TRAILER_BYTES;
        self.file.set_len(end)?;
        self.file.sync_all()?;

        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            index_bytes = section_len,
            file_len = end,
            "finalized archive"
        );
        Ok(self.path)
    }

    fn seek_cursor(&mut self) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(self.cursor))
    }

    fn record(&mut self, name: &str, size: u64) -> &IndexEntry {
        let idx = self.entries.len();
        let entry = IndexEntry::new(name, size, self.cursor);
        tracing::debug!(name, size, pos = entry.pos, "appended payload");
        self.cursor += size;
        self.by_name.entry(entry.name.clone()).or_insert(idx);
        self.entries.push(entry);
        self.state = SessionState::Appending;
        &self.entries[idx]
    }
}

/// Read the trailer and index section; returns entries and the payload end.
fn load_index(file: &mut File, len: u64, layout: IndexLayout) -> Result<(Vec<IndexEntry>, u64)> {
    file.seek(SeekFrom::Start(len - TRAILER_BYTES))?;
    let section_len = read_u32(file)? as u64;
    if section_len > len - TRAILER_BYTES {
        return Err(ArchiveError::malformed(format!(
            "index section of {section_len} bytes does not fit a {len} byte file"
        )));
    }
    let index_start = len - TRAILER_BYTES - section_len;
    let mut section = vec![0u8; section_len as usize];
    file.seek(SeekFrom::Start(index_start))?;
    file.read_exact(&mut section)?;
    let entries = decode_index(&section, layout, index_start)?;
    Ok((entries, index_start))
}

/// Stream over one payload, returned by [`Archive::read_file`].
///
/// Tracks its own offset, so other reads on the same store do not disturb it.
pub struct EntryReader<'a> {
    file: &'a File,
    pos: u64,
    remaining: u64,
}

impl EntryReader<'_> {
    /// Bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let mut f = self.file;
        f.seek(SeekFrom::Start(self.pos))?;
        let n = f.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "archive ends inside entry payload"));
        }
        self.pos += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}
