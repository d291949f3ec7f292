use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use ccat_store::{Writer, WriterConfig};
use tracing::info;

use crate::adapters::catalog_registry;
use crate::error::{CatalogError, CatalogResult};
use crate::file::CatalogFile;
use crate::header::{CatalogHeader, KeyEntry};
use crate::model::{Manifest, ResourceLocation};

const KEY_SEPARATOR: char = '/';

/// Collects locations and keys, then writes them as one catalog.
#[derive(Clone, Debug)]
pub struct CatalogBuilder {
    locator_id: String,
    config: WriterConfig,
    compress: bool,
    locations: Vec<ResourceLocation>,
    keys: Vec<(String, Vec<u32>)>,
    key_index: HashMap<String, usize>,
}

impl CatalogBuilder {
    pub fn new(locator_id: impl Into<String>) -> Self {
        Self {
            locator_id: locator_id.into(),
            config: WriterConfig::default(),
            compress: false,
            locations: Vec::new(),
            keys: Vec::new(),
            key_index: HashMap::new(),
        }
    }

    pub fn from_manifest(manifest: &Manifest) -> CatalogResult<Self> {
        let mut builder = Self::new(manifest.locator_id.clone());
        for entry in &manifest.entries {
            for key in &entry.keys {
                builder.add(key.clone(), entry.location.clone())?;
            }
        }
        Ok(builder)
    }

    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Map `key` to `location`.
    ///
    /// Equal locations are stored once; a key may resolve to several
    /// locations. Returns the location's index.
    pub fn add(&mut self, key: impl Into<String>, location: ResourceLocation) -> CatalogResult<u32> {
        let index = match self.locations.iter().position(|l| *l == location) {
            Some(index) => index,
            None => {
                self.locations.push(location);
                self.locations.len() - 1
            }
        };
        let index = u32::try_from(index).map_err(|_| CatalogError::TooLarge)?;

        let key = key.into();
        let slot = match self.key_index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.key_index.insert(key.clone(), self.keys.len());
                self.keys.push((key, Vec::new()));
                self.keys.len() - 1
            }
        };
        let targets = &mut self.keys[slot].1;
        if !targets.contains(&index) {
            targets.push(index);
        }
        Ok(index)
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Serialize everything added so far.
    pub fn build(&self) -> CatalogResult<CatalogFile> {
        let registry = Arc::new(catalog_registry()?);
        let mut writer = Writer::with_adapters(self.config.clone(), registry);

        let header = writer.reserve::<CatalogHeader>()?;
        let locator_id = writer.write_string(Some(&self.locator_id), None)?;
        let locations =
            writer.write_objects(self.locations.iter().map(|l| l as &dyn Any), false)?;

        let mut entries = Vec::with_capacity(self.keys.len());
        for (key, targets) in &self.keys {
            entries.push(KeyEntry {
                key: writer.write_string(Some(key), Some(KEY_SEPARATOR))?.as_u32(),
                locations: writer.write_array(targets)?.as_u32(),
            });
        }
        let keys = writer.write_array(&entries)?;

        let id = writer.write_reserved(
            header,
            &CatalogHeader {
                locator_id: locator_id.as_u32(),
                locations: locations.as_u32(),
                keys: keys.as_u32(),
            },
        )?;

        let stats = writer.stats().clone();
        let blob = writer.into_bytes();
        info!(
            locator = %self.locator_id,
            locations = self.locations.len(),
            keys = self.keys.len(),
            bytes = blob.len(),
            dedup_hits = stats.dedup_hits,
            "built catalog"
        );
        Ok(CatalogFile::new(id, blob).with_compression(self.compress))
    }
}
