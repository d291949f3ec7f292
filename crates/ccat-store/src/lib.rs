//! Compact binary object store.
//!
//! A [`Writer`] serializes values, arrays, strings and object graphs into a
//! single contiguous buffer and hands back an [`Id`] (a byte offset) for every
//! record. A [`Reader`] wraps the finished bytes and rebuilds anything from
//! its id alone.
//!
//! # Layout
//!
//! - **Values**: raw bytes of a [`bytemuck::Pod`] type, no header
//! - **Arrays**: varint byte length followed by the elements
//! - **Strings**: a tagged record, either a literal or a link to a previously
//!   written prefix plus the trailing token (see [`PrefixTable`])
//! - **Objects**: varint type tag and payload id, payload written by a
//!   [`SerializationAdapter`]
//!
//! # Design Rules
//!
//! 1. Byte-identical writes return the same id ([`DedupIndex`] verifies every
//!    hash hit against the stored bytes).
//! 2. Reserved slots are excluded from dedup until patched, and can be patched once.
//! 3. The reader trusts ids only as far as the buffer bounds; a bad id is an
//!    error, never a silent wrong value.
//! 4. Reads are pure. A shared [`Reader`] caches materialized strings and
//!    objects in a bounded [`ReadCache`].

pub mod adapter;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod prefix;
pub mod reader;
mod string;
mod varint;
pub mod writer;

pub use adapter::{expect_object, AdapterRegistry, SerializationAdapter};
pub use buffer::ByteBuffer;
pub use cache::ReadCache;
pub use ccat_types::{Id, TypeTag};
pub use config::{ReaderConfig, StoreConfig, WriterConfig};
pub use dedup::DedupIndex;
pub use error::{StorageError, StorageResult};
pub use prefix::{PrefixEntry, PrefixTable};
pub use reader::Reader;
pub use writer::{Reservation, Writer, WriterStats};
