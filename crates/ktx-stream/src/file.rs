//! File-backed stream

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use ktx_core::{KtxError, KtxResult};

use crate::{resolve_seek, SeekFrom, Stream};

/// Largest offset the platform file API can represent
#[cfg(target_pointer_width = "32")]
pub const MAX_FILE_OFFSET: u64 = i32::MAX as u64;
/// Largest offset the platform file API can represent
#[cfg(not(target_pointer_width = "32"))]
pub const MAX_FILE_OFFSET: u64 = i64::MAX as u64;

/// Stream over a platform file handle
#[derive(Debug)]
pub struct FileStream {
    path: Option<PathBuf>,
    file: File,
}

impl FileStream {
    /// Open an existing file for reading
    pub fn open(path: impl AsRef<Path>) -> KtxResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| KtxError::FileOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Opened {} for reading", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            file,
        })
    }

    /// Create or truncate a file for reading and writing
    pub fn create(path: impl AsRef<Path>) -> KtxResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| KtxError::FileOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Created {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            file,
        })
    }

    /// Wrap an already open file
    pub fn from_file(file: File) -> Self {
        Self { path: None, file }
    }

    /// Get the file path, if the stream was opened by name
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush buffered writes to the file
    pub fn flush(&mut self) -> KtxResult<()> {
        self.file.flush().map_err(KtxError::FileWriteError)
    }

    fn check_offset(offset: u64) -> KtxResult<u64> {
        if offset > MAX_FILE_OFFSET {
            return Err(KtxError::FileSeekError(format!(
                "offset {offset} exceeds the platform maximum {MAX_FILE_OFFSET}"
            )));
        }
        Ok(offset)
    }
}

impl Stream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> KtxResult<()> {
        let available = self.remaining()?;
        if buf.len() as u64 > available {
            return Err(KtxError::UnexpectedEndOfData {
                wanted: buf.len(),
                available: available as usize,
            });
        }
        self.file.read_exact(buf).map_err(KtxError::FileReadError)
    }

    fn write(&mut self, buf: &[u8]) -> KtxResult<()> {
        let end = self.tell()?.saturating_add(buf.len() as u64);
        Self::check_offset(end)?;
        self.file.write_all(buf).map_err(KtxError::FileWriteError)
    }

    fn seek(&mut self, pos: SeekFrom) -> KtxResult<u64> {
        let current = self.tell()?;
        let size = self.size()?;
        let target = Self::check_offset(resolve_seek(pos, current, size)?)?;
        self.file
            .seek(SeekFrom::Start(target))
            .map_err(|e| KtxError::FileSeekError(e.to_string()))
    }

    fn tell(&mut self) -> KtxResult<u64> {
        self.file
            .stream_position()
            .map_err(|e| KtxError::FileSeekError(e.to_string()))
    }

    fn size(&mut self) -> KtxResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(KtxError::FileReadError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.bin");

        let mut stream = FileStream::create(&path).unwrap();
        stream.write(b"0123456789").unwrap();
        stream.flush().unwrap();
        assert_eq!(stream.size().unwrap(), 10);
        assert_eq!(stream.path(), Some(path.as_path()));
        drop(stream);

        let mut stream = FileStream::open(&path).unwrap();
        stream.seek(SeekFrom::Start(4)).unwrap();
        let mut buf = [0u8; 3];
        stream.read(&mut buf).unwrap();
        assert_eq!(&buf, b"456");
        assert_eq!(stream.tell().unwrap(), 7);
    }

    #[test]
    fn test_read_past_end() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[1, 2]).unwrap();
        let mut stream = FileStream::from_file(file);
        stream.seek(SeekFrom::Start(0)).unwrap();

        let mut buf = [0u8; 3];
        assert!(matches!(
            stream.read(&mut buf),
            Err(KtxError::UnexpectedEndOfData { wanted: 3, available: 2 })
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileStream::open(dir.path().join("missing.ktx"));
        assert!(matches!(result, Err(KtxError::FileOpenFailed { .. })));
    }

    #[test]
    fn test_negative_seek() {
        let mut stream = FileStream::from_file(tempfile::tempfile().unwrap());
        assert!(matches!(
            stream.seek(SeekFrom::Current(-1)),
            Err(KtxError::FileSeekError(_))
        ));
    }
}
