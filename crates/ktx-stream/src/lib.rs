//! # KTX Stream
//!
//! Minimal seekable I/O used by the texture loaders and writers.
//!
//! This crate provides:
//! - **Stream**: Exact reads and writes, seek, tell and size
//! - **Memory streams**: Owned growable buffers
//! - **File streams**: Platform file handles with validated offsets

pub mod file;
pub mod memory;

pub use file::FileStream;
pub use memory::MemStream;

pub use std::io::SeekFrom;

use ktx_core::error::try_alloc;
use ktx_core::{KtxError, KtxResult};

/// Seekable byte stream.
///
/// Reads are exact: a read that cannot be satisfied fails with
/// [`KtxError::UnexpectedEndOfData`] and leaves the position unchanged.
pub trait Stream {
    /// Fill `buf` completely from the current position
    fn read(&mut self, buf: &mut [u8]) -> KtxResult<()>;

    /// Write all of `buf` at the current position
    fn write(&mut self, buf: &[u8]) -> KtxResult<()>;

    /// Move the position, failing if it would become negative
    fn seek(&mut self, pos: SeekFrom) -> KtxResult<u64>;

    /// Current position
    fn tell(&mut self) -> KtxResult<u64>;

    /// Total size in bytes
    fn size(&mut self) -> KtxResult<u64>;

    /// Advance the position by `count` bytes without reading them
    fn skip(&mut self, count: u64) -> KtxResult<()> {
        let pos = self.tell()?;
        let size = self.size()?;
        if pos.saturating_add(count) > size {
            return Err(KtxError::UnexpectedEndOfData {
                wanted: count as usize,
                available: size.saturating_sub(pos) as usize,
            });
        }
        self.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    /// Read `len` bytes into a freshly allocated buffer.
    ///
    /// Nothing is allocated when fewer than `len` bytes remain.
    fn read_vec(&mut self, len: usize) -> KtxResult<Vec<u8>> {
        let available = self.remaining()?;
        if len as u64 > available {
            return Err(KtxError::UnexpectedEndOfData {
                wanted: len,
                available: available as usize,
            });
        }
        let mut buf = try_alloc(len)?;
        self.read(&mut buf)?;
        Ok(buf)
    }

    /// Bytes between the current position and the end
    fn remaining(&mut self) -> KtxResult<u64> {
        let pos = self.tell()?;
        Ok(self.size()?.saturating_sub(pos))
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> KtxResult<()> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> KtxResult<()> {
        (**self).write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> KtxResult<u64> {
        (**self).seek(pos)
    }

    fn tell(&mut self) -> KtxResult<u64> {
        (**self).tell()
    }

    fn size(&mut self) -> KtxResult<u64> {
        (**self).size()
    }
}

/// Resolve a seek target against the current position and size
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> KtxResult<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(delta) => (current, delta),
        SeekFrom::End(delta) => (size, delta),
    };
    base.checked_add_signed(delta)
        .ok_or_else(|| KtxError::FileSeekError(format!("seek to {base} {delta:+} is negative")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_seek() {
        assert_eq!(resolve_seek(SeekFrom::Start(7), 3, 10).unwrap(), 7);
        assert_eq!(resolve_seek(SeekFrom::Current(-2), 3, 10).unwrap(), 1);
        assert_eq!(resolve_seek(SeekFrom::End(-4), 3, 10).unwrap(), 6);
        assert!(matches!(
            resolve_seek(SeekFrom::Current(-4), 3, 10),
            Err(KtxError::FileSeekError(_))
        ));
    }

    #[test]
    fn test_boxed_stream_skip() {
        let mut stream: Box<dyn Stream> = Box::new(MemStream::from_vec(vec![1, 2, 3, 4, 5]));
        stream.skip(2).unwrap();
        let mut buf = [0u8; 2];
        stream.read(&mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        assert_eq!(stream.remaining().unwrap(), 1);
        assert!(stream.skip(2).is_err());
    }

    #[test]
    fn test_read_vec_checks_length_first() {
        let mut stream = MemStream::from_vec(vec![0; 8]);
        stream.skip(6).unwrap();
        assert!(matches!(
            stream.read_vec(usize::MAX),
            Err(KtxError::UnexpectedEndOfData { available: 2, .. })
        ));
        assert_eq!(stream.tell().unwrap(), 6);
        assert_eq!(stream.read_vec(2).unwrap(), vec![0, 0]);
    }
}
