use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::format::{self, HEADER_LEN, TAG_END, TAG_RECORD, TAG_SCOPE};
use super::{ArchiveError, Result};

struct ScopeState {
    name: String,
    records: u64,
    crc: crc32fast::Hasher,
}

/// Sequential archive reader
///
/// Scopes are followed transparently; callers see one flat sequence of pairs:
///
/// ```rust,ignore
/// let mut reader = ArchiveReader::open("dump.kvda")?;
/// while reader.advance()? {
///     println!("{:?} -> {:?}", reader.key(), reader.value());
/// }
/// ```
pub struct ArchiveReader {
    path: PathBuf,
    stream: Option<zstd::Decoder<'static, BufReader<File>>>,
    scope: Option<ScopeState>,
    key: Bytes,
    value: Bytes,
    entries: u64,
}

impl ArchiveReader {
    /// Open an archive and validate its header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ArchiveError::NotFound(path.clone()),
            _ => ArchiveError::Io(e),
        })?;

        let mut input = BufReader::new(file);
        let mut header = [0u8; HEADER_LEN];
        input.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ArchiveError::Malformed("file is shorter than the archive header".to_string())
            }
            _ => ArchiveError::Io(e),
        })?;
        format::check_header(&header)?;

        // a header-only archive holds no scopes and no frames
        let stream = if input.fill_buf()?.is_empty() {
            None
        } else {
            Some(zstd::Decoder::with_buffer(input)?)
        };
        info!(path = %path.display(), "Archive opened");

        Ok(Self {
            path,
            stream,
            scope: None,
            key: Bytes::new(),
            value: Bytes::new(),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move to the next pair
    ///
    /// Returns `false` once the archive is exhausted, and keeps doing so on
    /// later calls.
    pub fn advance(&mut self) -> Result<bool> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(false);
            };

            let Some(tag) = format::read_tag(stream)? else {
                if let Some(scope) = &self.scope {
                    return Err(ArchiveError::Truncated(format!(
                        "scope '{}' has no end marker",
                        scope.name
                    )));
                }
                debug!(entries = self.entries, "Archive exhausted");
                self.stream = None;
                return Ok(false);
            };

            match (tag, self.scope.as_mut()) {
                (TAG_SCOPE, None) => {
                    let name = format::read_field(stream)?;
                    let name = String::from_utf8(name).map_err(|_| {
                        ArchiveError::Malformed("scope name is not UTF-8".to_string())
                    })?;
                    debug!(scope = %name, "Entering scope");
                    self.scope = Some(ScopeState {
                        name,
                        records: 0,
                        crc: crc32fast::Hasher::new(),
                    });
                }
                (TAG_RECORD, Some(scope)) => {
                    let key = format::read_field(stream)?;
                    let value = format::read_field(stream)?;

                    format::hash_record(&mut scope.crc, &key, &value);
                    scope.records += 1;

                    self.key = Bytes::from(key);
                    self.value = Bytes::from(value);
                    self.entries += 1;
                    return Ok(true);
                }
                (TAG_END, Some(_)) => {
                    let records = format::read_u64(stream)?;
                    let expected = format::read_u32(stream)?;
                    let scope = self.scope.take().ok_or_else(|| {
                        ArchiveError::Malformed("end marker outside scope".to_string())
                    })?;
                    if records != scope.records {
                        return Err(ArchiveError::Malformed(format!(
                            "scope '{}' declares {} records, found {}",
                            scope.name, records, scope.records
                        )));
                    }
                    let actual = scope.crc.finalize();
                    if expected != actual {
                        return Err(ArchiveError::ChecksumMismatch {
                            scope: scope.name,
                            expected,
                            actual,
                        });
                    }
                }
                (tag, scope) => {
                    return Err(ArchiveError::Malformed(format!(
                        "unexpected tag 0x{:02x} {}",
                        tag,
                        if scope.is_some() {
                            "inside scope"
                        } else {
                            "between scopes"
                        }
                    )));
                }
            }
        }
    }

    /// Key of the pair most recently reached by [`advance`](Self::advance)
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// Value of the pair most recently reached by [`advance`](Self::advance)
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Pairs read so far
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Release the underlying file
    pub fn close(mut self) {
        self.stream = None;
        debug!(path = %self.path.display(), "Archive closed");
    }
}
