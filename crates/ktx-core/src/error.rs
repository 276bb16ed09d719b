//! Error taxonomy shared by every KTX crate.

use std::path::PathBuf;

use thiserror::Error;

/// KTX errors
#[derive(Error, Debug)]
pub enum KtxError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Failed to open {path}: {source}")]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Seek error: {0}")]
    FileSeekError(String),

    #[error("Read error: {0}")]
    FileReadError(#[source] std::io::Error),

    #[error("Unexpected end of data: wanted {wanted} bytes, {available} available")]
    UnexpectedEndOfData { wanted: usize, available: usize },

    #[error("Write error: {0}")]
    FileWriteError(#[source] std::io::Error),

    #[error("Out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Not a KTX file")]
    UnknownFileFormat,

    #[error("Invalid file data: {0}")]
    FileDataError(String),

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),
}

impl KtxError {
    /// Shorthand for an [`KtxError::InvalidValue`] with a formatted message
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Shorthand for an [`KtxError::FileDataError`] with a formatted message
    pub fn data(msg: impl Into<String>) -> Self {
        Self::FileDataError(msg.into())
    }
}

/// Result type for KTX operations
pub type KtxResult<T> = Result<T, KtxError>;

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting.
pub fn try_alloc(len: usize) -> KtxResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| KtxError::OutOfMemory(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KtxError::SizeMismatch { expected: 64, actual: 60 };
        assert_eq!(err.to_string(), "Size mismatch: expected 64 bytes, got 60");

        let err = KtxError::invalid_value("level 3 >= 3 levels");
        assert_eq!(err.to_string(), "Invalid value: level 3 >= 3 levels");

        assert_eq!(KtxError::UnknownFileFormat.to_string(), "Not a KTX file");
    }

    #[test]
    fn test_try_alloc() {
        let buf = try_alloc(84).unwrap();
        assert_eq!(buf.len(), 84);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_try_alloc_huge_fails() {
        assert!(matches!(try_alloc(usize::MAX), Err(KtxError::OutOfMemory(_))));
    }
}
