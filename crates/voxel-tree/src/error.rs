//! Error types shared by every voxel tree operation.

use thiserror::Error;

/// Errors raised by voxel tree operations.
///
/// Absence of a node is not an error: locate and find queries return
/// `Option::None` or an empty collection instead.
#[derive(Debug, Error)]
pub enum VoxelError {
    /// The tree context was configured with unsupported parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A coordinate, location code or depth lies outside the tree bounds.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The operation would violate the children-xor-data invariant, or the
    /// hierarchy is otherwise not in the shape the operation needs.
    #[error("structural error: {0}")]
    Structural(String),

    /// The binary stream could not be decoded.
    #[error("serialization error at byte offset {offset}: {reason}")]
    Serialization { offset: u64, reason: String },

    /// A face could not be voxelized.
    #[error("voxelization error: {0}")]
    Voxelization(String),

    /// A mesh document could not be parsed.
    #[error("mesh format error on line {line}: {reason}")]
    MeshFormat { line: usize, reason: String },

    /// The underlying writer failed while encoding.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VoxelError {
    pub(crate) fn serialization(offset: u64, reason: impl Into<String>) -> Self {
        VoxelError::Serialization {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VoxelError>;
