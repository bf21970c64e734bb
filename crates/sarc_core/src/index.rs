//! Index-records section codec.
//!
//! Section (BE):
//!   repeat N * record
//!
//! Record, `IndexLayout::Sized`:
//!   u16 name_len, name[name_len] (UTF-8), u32 size
//!
//! Record, `IndexLayout::Positioned`:
//!   u16 name_len, name[name_len] (UTF-8), u32 size, u64 pos
//!
//! The section is followed by the u32 trailer, which is not part of it.
//! Sized records carry no position: entry k sits at the sum of the sizes of
//! entries 0..k, so records must be written in payload order with no gaps.

use crate::consts::{IndexLayout, MAX_STREAM_PAYLOAD};
use crate::entry::IndexEntry;
use crate::errors::{ArchiveError, Result};
use crate::utils::{read_name, read_u32, read_u64, write_name, write_u32, write_u64};
use std::io::{Cursor, ErrorKind};

/// Serialize `entries` in order.
pub fn encode_index(entries: &[IndexEntry], layout: IndexLayout) -> Result<Vec<u8>> {
    let cap = entries.iter().map(|e| layout.fixed_bytes() + e.name.len()).sum();
    let mut buf = Vec::with_capacity(cap);
    for e in entries {
        if e.size > MAX_STREAM_PAYLOAD {
            return Err(ArchiveError::SizeLimitExceeded { size: e.size, max: MAX_STREAM_PAYLOAD });
        }
        write_name(&mut buf, &e.name)?;
        write_u32(&mut buf, e.size as u32)?;
        if layout == IndexLayout::Positioned {
            write_u64(&mut buf, e.pos)?;
        }
    }
    Ok(buf)
}

/// Decode a whole index-records section.
///
/// `payload_end` is the file offset where the section starts. Positioned
/// records must lie entirely before it; sized records must add up to it.
pub fn decode_index(section: &[u8], layout: IndexLayout, payload_end: u64) -> Result<Vec<IndexEntry>> {
    let mut cur = Cursor::new(section);
    let mut entries = Vec::new();
    let mut running = 0u64;
    while (cur.position() as usize) < section.len() {
        let at = cur.position();
        let e = decode_record(&mut cur, layout, running).map_err(|err| match err {
            ArchiveError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
                ArchiveError::malformed(format!("index record at section offset {at} is truncated"))
            }
            other => other,
        })?;
        if layout == IndexLayout::Positioned && !e.end().is_some_and(|end| end <= payload_end) {
            return Err(ArchiveError::malformed(format!(
                "entry {:?} spans {}+{} past payload end {payload_end}",
                e.name, e.pos, e.size
            )));
        }
        tracing::trace!(name = %e.name, size = e.size, pos = e.pos, "decoded index record");
        running = running.saturating_add(e.size);
        entries.push(e);
    }
    // sized payloads are packed from 0, so they must end exactly at the index
    if layout == IndexLayout::Sized && running != payload_end {
        return Err(ArchiveError::malformed(format!(
            "sized records cover {running} payload bytes but the index starts at {payload_end}"
        )));
    }
    Ok(entries)
}

fn decode_record(cur: &mut Cursor<&[u8]>, layout: IndexLayout, running: u64) -> Result<IndexEntry> {
    let name = read_name(cur)?;
    let size = read_u32(cur)? as u64;
    let pos = match layout {
        IndexLayout::Sized => running,
        IndexLayout::Positioned => read_u64(cur)?,
    };
    Ok(IndexEntry { name, size, pos })
}
