//! Error type shared by every stage of the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::png::PngError;

/// Errors from map generation and terrain packing.
///
/// Every public operation surfaces exactly one of these per call. Approximation
/// effects (misclassified materials, block quantization error) are never
/// reported here.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Out of memory: failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl MapError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            MapError::InvalidDimensions(_) => "PHOTONIC_001",
            MapError::UnsupportedFormat(_) => "PHOTONIC_002",
            MapError::DimensionMismatch(_) => "PHOTONIC_003",
            MapError::Io { .. } => "PHOTONIC_004",
            MapError::OutOfMemory { .. } => "PHOTONIC_005",
            MapError::WorkerPool(_) => "PHOTONIC_006",
        }
    }

    /// Error kind name as reported in structured results.
    pub fn kind(&self) -> &'static str {
        match self {
            MapError::InvalidDimensions(_) => "InvalidDimensions",
            MapError::UnsupportedFormat(_) => "UnsupportedFormat",
            MapError::DimensionMismatch(_) => "DimensionMismatch",
            MapError::Io { .. } => "IOFailure",
            MapError::OutOfMemory { .. } => "OutOfMemory",
            MapError::WorkerPool(_) => "WorkerPool",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MapError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<PngError> for MapError {
    fn from(err: PngError) -> Self {
        match err {
            PngError::Io(source) => MapError::Io {
                path: PathBuf::new(),
                source,
            },
            PngError::Encoding(e) => MapError::UnsupportedFormat(e.to_string()),
            PngError::InvalidDimensions(msg) => MapError::InvalidDimensions(msg),
        }
    }
}

/// Allocate a vector of `len` copies of `fill`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, fill: T) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| MapError::OutOfMemory {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    data.resize(len, fill);
    Ok(data)
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            MapError::InvalidDimensions("1x1".into()),
            MapError::UnsupportedFormat("xyz".into()),
            MapError::DimensionMismatch("4x4 vs 8x8".into()),
            MapError::io("a.png", std::io::Error::other("boom")),
            MapError::OutOfMemory { bytes: 1 },
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn io_error_reports_path_and_kind() {
        let err = MapError::io("out/rock_height.png", std::io::Error::other("disk full"));
        assert_eq!(err.kind(), "IOFailure");
        let msg = err.to_string();
        assert!(msg.contains("rock_height.png"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn try_filled_allocates() {
        let v = try_filled(16, 0.5f64).unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&x| x == 0.5));
    }

    #[test]
    fn try_filled_reports_oversized_request() {
        let err = try_filled(usize::MAX / 2, 0u64).unwrap_err();
        assert!(matches!(err, MapError::OutOfMemory { .. }));
    }
}
