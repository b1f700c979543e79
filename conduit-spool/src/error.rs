use thiserror::Error;

/// Why a checkpoint file's content could not be parsed (§8 "Checkpoint
/// parser" table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("checkpoint must be exactly two whitespace-separated tokens")]
    InvalidFormat,
    #[error("checkpoint read-segment id is not a valid integer")]
    InvalidId,
    #[error("checkpoint byte offset is not a valid integer")]
    InvalidOffset,
}

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("spool I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spool checkpoint is corrupt: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("spool segment {0} is corrupt: {1}")]
    Corruption(u64, String),
}
