use byteorder::{BigEndian as BE, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::consts::MAX_NAME_BYTES;
use crate::errors::{ArchiveError, Result};

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> { w.write_u64::<BE>(v) }
pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> { w.write_u32::<BE>(v) }
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> { r.read_u64::<BE>() }
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> { r.read_u32::<BE>() }

/// Reject names that do not fit a u16 length prefix.
pub fn check_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_BYTES {
        return Err(ArchiveError::NameTooLong { len: name.len() });
    }
    Ok(())
}

/// u16 length + UTF-8 bytes.
pub fn write_name<W: Write>(w: &mut W, name: &str) -> Result<()> {
    check_name(name)?;
    w.write_u16::<BE>(name.len() as u16)?;
    w.write_all(name.as_bytes())?;
    Ok(())
}

pub fn read_name<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u16::<BE>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| ArchiveError::malformed(format!("entry name is not UTF-8: {e}")))
}
