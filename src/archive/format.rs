//! Archive constants and record framing

use bytes::{BufMut, BytesMut};
use std::io::{self, Read};

use super::{ArchiveError, Result};

pub const MAGIC: &[u8; 4] = b"KVDA";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 8;

pub const TAG_SCOPE: u8 = b'S';
pub const TAG_RECORD: u8 = b'R';
pub const TAG_END: u8 = b'E';

/// Name of the scope used when none is set explicitly
pub const DEFAULT_SCOPE: &str = "";

pub fn encode_header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_be_bytes());
    // bytes 6..8: flags, reserved
    header
}

pub fn check_header(header: &[u8; HEADER_LEN]) -> Result<()> {
    if &header[..4] != MAGIC {
        return Err(ArchiveError::Malformed("bad magic".to_string()));
    }
    let version = u16::from_be_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(ArchiveError::Malformed(format!(
            "unsupported format version {}",
            version
        )));
    }
    Ok(())
}

fn length(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| ArchiveError::Malformed(format!("field of {} bytes is too large", len)))
}

pub fn encode_scope_start(buf: &mut BytesMut, name: &str) -> Result<()> {
    buf.put_u8(TAG_SCOPE);
    buf.put_u32(length(name.len())?);
    buf.put_slice(name.as_bytes());
    Ok(())
}

pub fn encode_record(buf: &mut BytesMut, key: &[u8], value: &[u8]) -> Result<()> {
    buf.reserve(9 + key.len() + value.len());
    buf.put_u8(TAG_RECORD);
    buf.put_u32(length(key.len())?);
    buf.put_slice(key);
    buf.put_u32(length(value.len())?);
    buf.put_slice(value);
    Ok(())
}

/// Feed a record's encoded bytes to a scope checksum without re-encoding it
pub fn hash_record(crc: &mut crc32fast::Hasher, key: &[u8], value: &[u8]) {
    crc.update(&[TAG_RECORD]);
    crc.update(&(key.len() as u32).to_be_bytes());
    crc.update(key);
    crc.update(&(value.len() as u32).to_be_bytes());
    crc.update(value);
}

pub fn encode_scope_end(buf: &mut BytesMut, records: u64, crc: u32) {
    buf.put_u8(TAG_END);
    buf.put_u64(records);
    buf.put_u32(crc);
}

/// Read one tag byte, `None` on a clean end of stream
pub fn read_tag<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut tag = [0u8; 1];
    loop {
        match reader.read(&mut tag) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(tag[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(truncation(e)),
        }
    }
}

pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut raw = [0u8; 4];
    reader.read_exact(&mut raw).map_err(truncation)?;
    Ok(u32::from_be_bytes(raw))
}

pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut raw = [0u8; 8];
    reader.read_exact(&mut raw).map_err(truncation)?;
    Ok(u64::from_be_bytes(raw))
}

/// Read a u32 length prefix followed by that many bytes
pub fn read_field<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    let mut data = Vec::new();
    // never trust the prefix for the allocation size
    let read = reader
        .take(len as u64)
        .read_to_end(&mut data)
        .map_err(truncation)?;
    if read != len {
        return Err(ArchiveError::Truncated(format!(
            "expected {} bytes, found {}",
            len, read
        )));
    }
    Ok(data)
}

/// Map read failures of the compressed stream onto archive errors
fn truncation(err: io::Error) -> ArchiveError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => ArchiveError::Truncated(err.to_string()),
        io::ErrorKind::InvalidData | io::ErrorKind::Other => {
            ArchiveError::Malformed(err.to_string())
        }
        _ => ArchiveError::Io(err),
    }
}
