use bytes::BytesMut;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::format::{self, DEFAULT_SCOPE};
use super::{ArchiveError, Result};

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// zstd compression level
    pub compression_level: i32,
    /// Replace an existing file instead of failing
    pub override_existing: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: 3,
            override_existing: false,
        }
    }
}

/// What a finished archive contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub scopes: usize,
    pub entries: u64,
    pub bytes: u64,
}

struct OpenScope {
    name: String,
    encoder: zstd::Encoder<'static, BufWriter<File>>,
    records: u64,
    crc: crc32fast::Hasher,
    /// A record was only partly written; the scope gets no end marker
    poisoned: bool,
}

enum State {
    /// Between scopes; the next append opens the default scope
    Idle(BufWriter<File>),
    Scope(OpenScope),
    Finished,
}

/// Sequential archive writer
///
/// The file is created when the writer is constructed and finalized exactly
/// once, by [`ArchiveWriter::finish`] or, failing that, on drop.
pub struct ArchiveWriter {
    path: PathBuf,
    level: i32,
    state: State,
    scratch: BytesMut,
    scopes: usize,
    entries: u64,
}

impl ArchiveWriter {
    /// Create an archive at `path`
    ///
    /// An existing file is an error unless `options.override_existing` is set,
    /// in which case it is deleted first.
    pub fn create<P: AsRef<Path>>(path: P, options: &WriterOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            if !options.override_existing {
                return Err(ArchiveError::AlreadyExists(path));
            }
            fs::remove_file(&path).map_err(|source| ArchiveError::DeleteFailed {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "Removed existing archive");
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => ArchiveError::AlreadyExists(path.clone()),
                _ => ArchiveError::Io(e),
            })?;
        let mut out = BufWriter::new(file);
        out.write_all(&format::encode_header())?;

        info!(path = %path.display(), "Archive created");
        Ok(Self {
            path,
            level: options.compression_level,
            state: State::Idle(out),
            scratch: BytesMut::with_capacity(8 * 1024),
            scopes: 0,
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pairs appended so far
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Name of the scope currently receiving pairs, if one is open
    pub fn scope(&self) -> Option<&str> {
        match &self.state {
            State::Scope(scope) => Some(&scope.name),
            _ => None,
        }
    }

    /// Finish the open scope and start a new one named `name`
    pub fn set_scope(&mut self, name: &str) -> Result<()> {
        let out = self.close_scope()?;
        self.open_scope(out, name)
    }

    /// Append one pair to the current scope
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if matches!(self.state, State::Idle(_)) {
            let out = self.close_scope()?;
            self.open_scope(out, DEFAULT_SCOPE)?;
        }

        let State::Scope(scope) = &mut self.state else {
            return Err(ArchiveError::Finished);
        };
        if scope.poisoned {
            return Err(ArchiveError::Incomplete(scope.name.clone()));
        }

        self.scratch.clear();
        format::encode_record(&mut self.scratch, key, value)?;
        if let Err(e) = scope.encoder.write_all(&self.scratch) {
            scope.poisoned = true;
            return Err(e.into());
        }
        scope.crc.update(&self.scratch);
        scope.records += 1;
        self.entries += 1;
        Ok(())
    }

    /// Finalize the open scope and flush the file
    pub fn finish(mut self) -> Result<ArchiveSummary> {
        self.finish_inner()
    }

    fn finish_inner(&mut self) -> Result<ArchiveSummary> {
        let mut out = self.close_scope()?;
        self.state = State::Finished;
        out.flush()?;
        let file = out.into_inner().map_err(|e| ArchiveError::Io(e.into_error()))?;
        file.sync_all()?;

        let bytes = fs::metadata(&self.path)?.len();
        info!(
            path = %self.path.display(),
            scopes = self.scopes,
            entries = self.entries,
            bytes,
            "Archive finished"
        );
        Ok(ArchiveSummary {
            path: self.path.clone(),
            scopes: self.scopes,
            entries: self.entries,
            bytes,
        })
    }

    /// Take the file back, finishing the open scope's frame if there is one
    fn close_scope(&mut self) -> Result<BufWriter<File>> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Idle(out) => Ok(out),
            State::Scope(scope) => {
                let OpenScope {
                    name,
                    mut encoder,
                    records,
                    crc,
                    poisoned,
                } = scope;
                if poisoned {
                    // readers see every whole record, then a truncated scope
                    let out = encoder.finish()?;
                    warn!(scope = %name, records, "Scope left without end marker");
                    return Ok(out);
                }
                self.scratch.clear();
                format::encode_scope_end(&mut self.scratch, records, crc.finalize());
                encoder.write_all(&self.scratch)?;
                let out = encoder.finish()?;
                debug!(scope = %name, records, "Scope finished");
                Ok(out)
            }
            State::Finished => Err(ArchiveError::Finished),
        }
    }

    fn open_scope(&mut self, out: BufWriter<File>, name: &str) -> Result<()> {
        let mut encoder = zstd::Encoder::new(out, self.level)?;
        self.scratch.clear();
        format::encode_scope_start(&mut self.scratch, name)?;
        encoder.write_all(&self.scratch)?;

        self.scopes += 1;
        self.state = State::Scope(OpenScope {
            name: name.to_string(),
            encoder,
            records: 0,
            crc: crc32fast::Hasher::new(),
            poisoned: false,
        });
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if matches!(self.state, State::Finished) {
            return;
        }
        if let Err(e) = self.finish_inner() {
            warn!(path = %self.path.display(), error = %e, "Failed to finalize archive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dump.kvda");
        fs::write(&path, b"previous").unwrap();

        let result = ArchiveWriter::create(&path, &WriterOptions::default());
        assert!(matches!(result, Err(ArchiveError::AlreadyExists(_))));
        assert_eq!(fs::read(&path).unwrap(), b"previous");
    }

    #[test]
    fn test_override_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dump.kvda");
        fs::write(&path, b"previous").unwrap();

        let options = WriterOptions {
            override_existing: true,
            ..WriterOptions::default()
        };
        let writer = ArchiveWriter::create(&path, &options).unwrap();
        let summary = writer.finish().unwrap();
        assert_eq!(summary.entries, 0);
        assert_eq!(summary.scopes, 0);
        assert_eq!(fs::read(&path).unwrap(), format::encode_header());
    }

    #[test]
    fn test_default_scope_opens_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dump.kvda");

        let mut writer = ArchiveWriter::create(&path, &WriterOptions::default()).unwrap();
        assert_eq!(writer.scope(), None);
        writer.append(b"k1", b"v1").unwrap();
        assert_eq!(writer.scope(), Some(DEFAULT_SCOPE));
        writer.set_scope("extra").unwrap();
        assert_eq!(writer.scope(), Some("extra"));
        writer.append(b"k2", b"v2").unwrap();

        let summary = writer.finish().unwrap();
        assert_eq!(summary.scopes, 2);
        assert_eq!(summary.entries, 2);
        assert!(summary.bytes > format::HEADER_LEN as u64);
    }

    /// Leave the open scope as a write failing mid-record would
    fn fail_mid_record(writer: &mut ArchiveWriter) {
        let State::Scope(scope) = &mut writer.state else {
            panic!("no open scope");
        };
        scope
            .encoder
            .write_all(&[format::TAG_RECORD, 0, 0, 0, 9, b'k'])
            .unwrap();
        scope.poisoned = true;
    }

    #[test]
    fn test_failed_write_keeps_whole_records_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dump.kvda");

        let mut writer = ArchiveWriter::create(&path, &WriterOptions::default()).unwrap();
        writer.append(b"k1", b"v1").unwrap();
        writer.append(b"k2", b"v2").unwrap();
        fail_mid_record(&mut writer);
        assert!(matches!(
            writer.append(b"k3", b"v3"),
            Err(ArchiveError::Incomplete(_))
        ));
        let summary = writer.finish().unwrap();
        assert_eq!(summary.entries, 2);

        let mut reader = crate::archive::ArchiveReader::open(&path).unwrap();
        assert!(reader.advance().unwrap());
        assert_eq!(reader.key().as_ref(), b"k1");
        assert!(reader.advance().unwrap());
        assert_eq!(reader.key().as_ref(), b"k2");
        assert!(matches!(reader.advance(), Err(ArchiveError::Truncated(_))));
    }

    #[test]
    fn test_drop_finalizes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dump.kvda");
        {
            let mut writer = ArchiveWriter::create(&path, &WriterOptions::default()).unwrap();
            writer.append(b"k", b"v").unwrap();
        }
        let mut reader = crate::archive::ArchiveReader::open(&path).unwrap();
        assert!(reader.advance().unwrap());
        assert_eq!(reader.key().as_ref(), b"k");
        assert!(!reader.advance().unwrap());
    }
}
