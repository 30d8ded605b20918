//! Local file source
//!
//! Ranged reads over a local file via positioned reads, so concurrent
//! readers never contend on a shared cursor.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Result, TortillaError};

use super::{check_bounds, ByteRangeSource};

/// Byte-range source backed by a local file
#[derive(Debug)]
pub struct LocalSource {
    path: PathBuf,
    locator: String,
    file: File,
    size: u64,
}

impl LocalSource {
    /// Open a local file for ranged reads
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TortillaError::SourceNotFound(path.display().to_string()),
            _ => TortillaError::Io(e),
        })?;
        let size = file.metadata()?.len();

        tracing::debug!("Opened local source {} ({} bytes)", path.display(), size);

        Ok(Self {
            path: path.to_path_buf(),
            locator: path.display().to_string(),
            file,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteRangeSource for LocalSource {
    fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        check_bounds(offset, length, self.size)?;
        if length == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; length as usize];
        read_exact_at(&self.file, &mut buf, offset)?;
        Ok(Bytes::from(buf))
    }

    fn total_size(&self) -> u64 {
        self.size
    }

    fn locator(&self) -> &str {
        &self.locator
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

/// `seek_read` moves the cursor, but every read names its own offset
#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                let rest = buf;
                buf = &mut rest[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
