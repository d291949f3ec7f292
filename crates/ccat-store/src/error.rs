use ccat_types::{Id, TypeError, TypeTag};

/// Errors from writer and reader operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The id does not address enough bytes for the requested read.
    #[error("invalid id {id}: {needed} bytes requested, buffer holds {len}")]
    InvalidId { id: Id, needed: usize, len: usize },

    /// A patch named an id this writer never handed out as a reservation.
    #[error("{0} is not a reservation issued by this writer")]
    UnknownReservation(Id),

    /// A reservation can only be filled once.
    #[error("reservation {0} has already been patched")]
    ReservationAlreadyPatched(Id),

    /// Patch content does not match the reserved size.
    #[error("size mismatch for reservation {id}: reserved {reserved} bytes, got {actual}")]
    SizeMismatch {
        id: Id,
        reserved: usize,
        actual: usize,
    },

    /// Zero-sized types have no byte representation to address.
    #[error("zero-sized type {0} cannot be stored")]
    ZeroSizedType(&'static str),

    /// No adapter is registered for the runtime type of an object.
    #[error("no adapter registered for type {0}")]
    UnregisteredType(String),

    /// An object record names a tag with no registered adapter.
    #[error("no adapter registered for {0}")]
    UnknownTypeTag(TypeTag),

    /// A polymorphic read hit an object written without its type tag.
    #[error("object {0} was written without a type tag")]
    MissingTypeTag(Id),

    /// The decoded object is not of the requested type.
    #[error("type mismatch at {id}: expected {expected}, found {found}")]
    TypeMismatch {
        id: Id,
        expected: &'static str,
        found: &'static str,
    },

    /// Two adapters claim the same tag or the same type.
    #[error("conflicting adapters for {tag}: {existing} and {incoming}")]
    ConflictingAdapter {
        tag: TypeTag,
        existing: &'static str,
        incoming: &'static str,
    },

    /// Prefix-chained strings can only be rebuilt with their separator.
    #[error("string {0} is prefix-chained and needs a separator to decode")]
    MissingSeparator(Id),

    /// The bytes at an id do not form a valid record.
    #[error("corrupt record at {id}: {reason}")]
    CorruptRecord { id: Id, reason: String },

    /// The buffer grew past the addressable id range.
    #[error("buffer overflow: {0}")]
    BufferOverflow(#[from] TypeError),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub(crate) fn corrupt(id: Id, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id,
            reason: reason.into(),
        }
    }
}
