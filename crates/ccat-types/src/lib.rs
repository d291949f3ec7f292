//! Foundation types for the content catalog store (CCAT).
//!
//! Every other CCAT crate depends on `ccat-types`.
//!
//! # Key Types
//!
//! - [`Id`] -- Opaque byte offset of a record inside a serialized buffer
//! - [`TypeTag`] -- Stable discriminator selecting a serialization adapter

pub mod error;
pub mod id;
pub mod tag;

pub use error::TypeError;
pub use id::Id;
pub use tag::TypeTag;
