use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("offset {0} does not fit in a record id")]
    OffsetOverflow(usize),

    #[error("invalid id string: {0}")]
    InvalidId(String),
}
