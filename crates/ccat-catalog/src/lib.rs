//! Content catalogs stored with `ccat-store`.
//!
//! A catalog maps lookup keys to resource locations (load path, provider,
//! type, dependencies and provider data). Locations are written as objects
//! through the adapters in [`adapters`], so shared path and namespace
//! prefixes are stored once and identical sub-records deduplicate.
//!
//! # Architecture
//!
//! - **CatalogBuilder**: collects `key -> location` pairs and writes the blob
//! - **CatalogFile**: the checksummed, optionally zstd-compressed container
//! - **Catalog**: opens a container and answers key lookups

pub mod adapters;
pub mod builder;
pub mod catalog;
pub mod error;
pub mod file;
pub mod header;
pub mod model;

pub use adapters::{catalog_registry, BundleOptionsAdapter, ResourceLocationAdapter, TextDataAdapter};
pub use builder::CatalogBuilder;
pub use catalog::Catalog;
pub use error::{CatalogError, CatalogResult};
pub use file::CatalogFile;
pub use header::{CatalogHeader, KeyEntry};
pub use model::{BundleOptions, LocationData, Manifest, ManifestEntry, ResourceLocation};
