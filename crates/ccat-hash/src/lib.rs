//! Content hashing for the content catalog store.
//!
//! Provides the keys of the writer's deduplication index and the integrity
//! checksum of catalog files.
//!
//! # Components
//!
//! - [`ContentHasher`] -- domain-separated BLAKE3 hashing per record kind
//! - [`ContentKey`] -- 32-byte hash of a serialized record

pub mod hasher;

pub use hasher::{ContentHasher, ContentKey};
