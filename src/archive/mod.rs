//! Compressed key/value archive
//!
//! An archive holds an ordered sequence of binary (key, value) pairs, split
//! into named scopes. Layout:
//!
//! ```text
//! file    := header scope*
//! header  := "KVDA" version:u16be flags:u16be          (uncompressed)
//! scope   := one independent zstd frame containing
//!            'S' name_len:u32be name
//!            ('R' key_len:u32be key value_len:u32be value)*
//!            'E' record_count:u64be crc32:u32be
//! ```
//!
//! Scopes are significant when writing (each is its own zstd frame) and
//! transparent when reading: [`ArchiveReader`] yields a flat pair sequence.
//! Because every finished scope is a complete frame, a writer that stops
//! early still leaves a readable, if incomplete, archive behind.

pub mod format;
pub mod reader;
pub mod writer;

pub use reader::ArchiveReader;
pub use writer::{ArchiveSummary, ArchiveWriter, WriterOptions};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("File [{0}] already exists")]
    AlreadyExists(PathBuf),

    #[error("Cannot delete file [{path}]: {source}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File not found [{0}]")]
    NotFound(PathBuf),

    #[error("Malformed archive: {0}")]
    Malformed(String),

    #[error("Truncated archive: {0}")]
    Truncated(String),

    #[error("Checksum mismatch in scope '{scope}': expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        scope: String,
        expected: u32,
        actual: u32,
    },

    #[error("Archive is already finished")]
    Finished,

    #[error("Scope '{0}' is incomplete after a failed write")]
    Incomplete(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
