use std::io;

use thiserror::Error;

use crate::{BufferType, Format};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("no {0} buffer has been set")]
    MissingBuffer(BufferType),

    #[error("{ty} buffer has unsupported format {format:?}")]
    UnsupportedFormat { ty: BufferType, format: Format },

    #[error("{ty} buffer read out of bounds (item {item}, buffer size {size})")]
    OutOfBounds {
        ty: BufferType,
        item: usize,
        size: usize,
    },
}

impl IngestError {
    /// Returns whether this error means "buffers are not there yet", as
    /// opposed to buffers being malformed.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            IngestError::MissingBuffer(_)
                | IngestError::UnsupportedFormat { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("not a BVH cache entry")]
    BadMagic,

    #[error("cache entry has format version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("cache entry is truncated")]
    Truncated,

    #[error("cache entry holds {found} primitives, expected {expected}")]
    PrimitiveCount { found: usize, expected: usize },

    #[error("cache entry holds an invalid tree: {0}")]
    Invalid(#[from] BvhError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BvhError {
    #[error("node {node} points at missing child {child}")]
    DanglingChild { node: usize, child: usize },

    #[error("bounds of node {node} don't contain its child {child}")]
    BoundsNotContained { node: usize, child: usize },

    #[error("leaf {node} references primitives out of range")]
    PrimitiveRange { node: usize },

    #[error("primitive slot {slot} is covered {count} times")]
    PrimitiveCoverage { slot: usize, count: usize },

    #[error("primitive id {id} is out of range")]
    PrimitiveId { id: u32 },

    #[error("tree is deeper than {max}")]
    TooDeep { max: usize },
}

#[derive(Error, Debug)]
pub enum CommitError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("built tree is invalid: {0}")]
    Build(#[from] BvhError),
}

impl CommitError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, CommitError::Ingest(err) if err.is_not_ready())
    }
}
