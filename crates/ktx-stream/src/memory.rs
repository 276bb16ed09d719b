//! Memory-backed stream

use ktx_core::error::try_alloc;
use ktx_core::{KtxError, KtxResult};

use crate::{resolve_seek, SeekFrom, Stream};

const MIN_CAPACITY: usize = 256;

/// Stream over an owned, growable byte buffer.
///
/// The size is the high-water mark of everything written or supplied at
/// construction. Growth doubles the capacity.
#[derive(Debug, Clone, Default)]
pub struct MemStream {
    data: Vec<u8>,
    pos: usize,
}

impl MemStream {
    /// Create an empty stream for writing
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `data` for reading
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Copy `bytes` into a new stream
    pub fn from_slice(bytes: &[u8]) -> KtxResult<Self> {
        let mut data = try_alloc(bytes.len())?;
        data.copy_from_slice(bytes);
        Ok(Self::from_vec(data))
    }

    /// Get the bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream, returning its buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn reserve_for(&mut self, end: usize) -> KtxResult<()> {
        let capacity = self.data.capacity();
        if end <= capacity {
            return Ok(());
        }
        let target = capacity.saturating_mul(2).max(end).max(MIN_CAPACITY);
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| KtxError::OutOfMemory(target))
    }
}

impl Stream for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> KtxResult<()> {
        let available = self.data.len().saturating_sub(self.pos);
        if buf.len() > available {
            return Err(KtxError::UnexpectedEndOfData {
                wanted: buf.len(),
                available,
            });
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> KtxResult<()> {
        let end = self
            .pos
            .checked_add(buf.len())
            .ok_or(KtxError::OutOfMemory(usize::MAX))?;
        self.reserve_for(end)?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> KtxResult<u64> {
        let target = resolve_seek(pos, self.pos as u64, self.data.len() as u64)?;
        if target > self.data.len() as u64 {
            return Err(KtxError::FileSeekError(format!(
                "offset {} is past the end of a {} byte memory stream",
                target,
                self.data.len()
            )));
        }
        self.pos = target as usize;
        Ok(target)
    }

    fn tell(&mut self) -> KtxResult<u64> {
        Ok(self.pos as u64)
    }

    fn size(&mut self) -> KtxResult<u64> {
        Ok(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut stream = MemStream::new();
        stream.write(b"hello ").unwrap();
        stream.write(b"world").unwrap();
        assert_eq!(stream.size().unwrap(), 11);

        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 11];
        stream.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn test_short_read_fails_without_moving() {
        let mut stream = MemStream::from_vec(vec![1, 2, 3]);
        stream.seek(SeekFrom::Start(1)).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            stream.read(&mut buf),
            Err(KtxError::UnexpectedEndOfData { wanted: 4, available: 2 })
        ));
        assert_eq!(stream.tell().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_keeps_high_water_mark() {
        let mut stream = MemStream::new();
        stream.write(&[0; 16]).unwrap();
        stream.seek(SeekFrom::Start(4)).unwrap();
        stream.write(&[9, 9]).unwrap();
        assert_eq!(stream.size().unwrap(), 16);
        assert_eq!(stream.tell().unwrap(), 6);
        assert_eq!(&stream.as_slice()[3..7], &[0, 9, 9, 0]);
    }

    #[test]
    fn test_capacity_doubles() {
        let mut stream = MemStream::new();
        stream.write(&[1]).unwrap();
        let first = stream.data.capacity();
        assert!(first >= MIN_CAPACITY);

        stream.write(&vec![0; first]).unwrap();
        assert!(stream.data.capacity() >= first * 2);
    }

    #[test]
    fn test_seek_bounds() {
        let mut stream = MemStream::from_vec(vec![0; 8]);
        assert_eq!(stream.seek(SeekFrom::End(-2)).unwrap(), 6);
        assert!(matches!(stream.seek(SeekFrom::Current(-7)), Err(KtxError::FileSeekError(_))));
        assert!(matches!(stream.seek(SeekFrom::Start(9)), Err(KtxError::FileSeekError(_))));
        assert_eq!(stream.tell().unwrap(), 6);
    }

    #[test]
    fn test_from_slice_copies() {
        let source = [5u8, 6, 7];
        let stream = MemStream::from_slice(&source).unwrap();
        assert_eq!(stream.into_inner(), vec![5, 6, 7]);
    }
}
