use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ccat_store::{Id, Reader, ReaderConfig};
use tracing::info;

use crate::adapters::catalog_registry;
use crate::error::{CatalogError, CatalogResult};
use crate::file::CatalogFile;
use crate::header::{CatalogHeader, KeyEntry};
use crate::model::ResourceLocation;

const KEY_SEPARATOR: char = '/';

/// A loaded catalog.
///
/// Keys are decoded when the catalog is opened; locations are decoded on
/// demand and shared through the reader's cache.
pub struct Catalog {
    reader: Reader,
    header: CatalogHeader,
    locator_id: Arc<str>,
    location_ids: Vec<Id>,
    keys: Vec<(Arc<str>, Vec<u32>)>,
    key_index: HashMap<Arc<str>, usize>,
}

impl Catalog {
    pub fn from_file(file: CatalogFile, config: &ReaderConfig) -> CatalogResult<Self> {
        let registry = Arc::new(catalog_registry()?);
        let reader = Reader::from_config(file.blob().clone(), config, registry);
        let header: CatalogHeader = reader.read_value(file.header())?;

        let locator_id = reader
            .read_string(Id::new(header.locator_id), None)?
            .unwrap_or_else(|| Arc::from(""));
        let location_ids: Vec<Id> = reader
            .read_value_array::<u32>(Id::new(header.locations))?
            .into_iter()
            .map(Id::new)
            .collect();

        let entries: Vec<KeyEntry> = reader.read_value_array(Id::new(header.keys))?;
        let mut keys = Vec::with_capacity(entries.len());
        let mut key_index = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = reader
                .read_string(Id::new(entry.key), Some(KEY_SEPARATOR))?
                .ok_or_else(|| CatalogError::Corrupt("null key".into()))?;
            let targets: Vec<u32> = reader.read_value_array(Id::new(entry.locations))?;
            if let Some(&bad) = targets.iter().find(|&&t| t as usize >= location_ids.len()) {
                return Err(CatalogError::Corrupt(format!(
                    "key {key} points at location {bad} of {}",
                    location_ids.len()
                )));
            }
            key_index.insert(Arc::clone(&key), keys.len());
            keys.push((key, targets));
        }

        info!(
            locator = %locator_id,
            locations = location_ids.len(),
            keys = keys.len(),
            bytes = reader.len(),
            "loaded catalog"
        );
        Ok(Self {
            reader,
            header,
            locator_id,
            location_ids,
            keys,
            key_index,
        })
    }

    pub fn from_bytes(data: &[u8], config: &ReaderConfig) -> CatalogResult<Self> {
        Self::from_file(CatalogFile::from_bytes(data)?, config)
    }

    pub fn open(path: &Path, config: &ReaderConfig) -> CatalogResult<Self> {
        Self::from_file(CatalogFile::read_from(path)?, config)
    }

    pub fn locator_id(&self) -> &str {
        &self.locator_id
    }

    pub fn header(&self) -> &CatalogHeader {
        &self.header
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    pub fn location_count(&self) -> usize {
        self.location_ids.len()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Keys in the order they were added.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(|(k, _)| &**k)
    }

    /// Location at `index`, or `None` past the end.
    pub fn location(&self, index: usize) -> CatalogResult<Option<Arc<ResourceLocation>>> {
        match self.location_ids.get(index) {
            None => Ok(None),
            Some(&id) => self.load(id).map(Some),
        }
    }

    /// All locations in index order.
    pub fn locations(&self) -> CatalogResult<Vec<Arc<ResourceLocation>>> {
        Ok(self
            .reader
            .read_object_array::<ResourceLocation>(Id::new(self.header.locations))?)
    }

    /// Locations for `key`, or `None` if the key is unknown.
    pub fn locate(&self, key: &str) -> CatalogResult<Option<Vec<Arc<ResourceLocation>>>> {
        let Some(&slot) = self.key_index.get(key) else {
            return Ok(None);
        };
        self.keys[slot]
            .1
            .iter()
            .map(|&index| self.load(self.location_ids[index as usize]))
            .collect::<CatalogResult<Vec<_>>>()
            .map(Some)
    }

    /// Total number of direct dependencies over all locations.
    pub fn dependency_count(&self) -> CatalogResult<usize> {
        let mut total = 0usize;
        self.reader.process_object_array(
            Id::new(self.header.locations),
            &mut total,
            |location: Arc<ResourceLocation>, total, _, _| *total += location.dependencies.len(),
        )?;
        Ok(total)
    }

    fn load(&self, id: Id) -> CatalogResult<Arc<ResourceLocation>> {
        self.reader
            .read_object::<ResourceLocation>(id)?
            .ok_or_else(|| CatalogError::Corrupt(format!("null location at {id}")))
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("locator_id", &self.locator_id)
            .field("locations", &self.location_ids.len())
            .field("keys", &self.keys.len())
            .finish()
    }
}
