//! Object adapters for the catalog model.
//!
//! | Type               | Tag | Payload                                  |
//! |--------------------|-----|------------------------------------------|
//! | `ResourceLocation` | 1   | [`LocationRecord`] after its fields      |
//! | `BundleOptions`    | 2   | [`BundleRecord`]                         |
//! | `String` (text)    | 3   | string record                            |
//!
//! Internal ids and primary keys share path prefixes on `/`; provider ids and
//! resource types share namespace prefixes on `.`.

use std::any::{Any, TypeId};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use ccat_store::{
    expect_object, AdapterRegistry, Id, Reader, SerializationAdapter, StorageError, StorageResult,
    TypeTag, Writer,
};

use crate::model::{BundleOptions, LocationData, ResourceLocation};

pub const LOCATION_TAG: TypeTag = TypeTag::new(1);
pub const BUNDLE_TAG: TypeTag = TypeTag::new(2);
pub const TEXT_TAG: TypeTag = TypeTag::new(3);

const PATH_SEPARATOR: char = '/';
const NAMESPACE_SEPARATOR: char = '.';

/// Fixed part of a stored location; every field is an id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LocationRecord {
    pub internal_id: u32,
    pub provider_id: u32,
    pub primary_key: u32,
    pub resource_type: u32,
    /// Object array of dependencies, or null.
    pub dependencies: u32,
    /// Tagged object, or null.
    pub data: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BundleRecord {
    pub bundle_name: u32,
    pub hash: u32,
    pub crc: u32,
    pub chunked_transfer: u32,
    pub bundle_size: u64,
}

/// Registry holding every catalog adapter.
pub fn catalog_registry() -> StorageResult<AdapterRegistry> {
    let root: Arc<dyn SerializationAdapter> = Arc::new(ResourceLocationAdapter);
    AdapterRegistry::build([root])
}

fn read_text(reader: &Reader, id: Id, separator: Option<char>) -> StorageResult<String> {
    Ok(reader
        .read_string(id, separator)?
        .map(|s| s.to_string())
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// ResourceLocation
// ---------------------------------------------------------------------------

pub struct ResourceLocationAdapter;

impl SerializationAdapter for ResourceLocationAdapter {
    fn tag(&self) -> TypeTag {
        LOCATION_TAG
    }

    fn object_type(&self) -> TypeId {
        TypeId::of::<ResourceLocation>()
    }

    fn type_name(&self) -> &'static str {
        "ResourceLocation"
    }

    fn dependencies(&self) -> Vec<Arc<dyn SerializationAdapter>> {
        vec![Arc::new(BundleOptionsAdapter), Arc::new(TextDataAdapter)]
    }

    fn serialize(&self, writer: &mut Writer, object: &dyn Any) -> StorageResult<Id> {
        let location = expect_object::<ResourceLocation>(object, self)?;
        let internal_id = writer.write_string(Some(&location.internal_id), Some(PATH_SEPARATOR))?;
        let provider_id =
            writer.write_string(Some(&location.provider_id), Some(NAMESPACE_SEPARATOR))?;
        let primary_key = writer.write_string(Some(&location.primary_key), Some(PATH_SEPARATOR))?;
        let resource_type =
            writer.write_string(Some(&location.resource_type), Some(NAMESPACE_SEPARATOR))?;

        let dependencies = if location.dependencies.is_empty() {
            Id::NULL
        } else {
            writer.write_objects(location.dependencies.iter().map(|d| d as &dyn Any), false)?
        };
        let data = match &location.data {
            None => Id::NULL,
            Some(LocationData::Bundle(options)) => writer.write_object(options, true)?,
            Some(LocationData::Text(text)) => writer.write_object(text, true)?,
        };

        // Written after its fields so equal locations encode identically.
        writer.write(&LocationRecord {
            internal_id: internal_id.as_u32(),
            provider_id: provider_id.as_u32(),
            primary_key: primary_key.as_u32(),
            resource_type: resource_type.as_u32(),
            dependencies: dependencies.as_u32(),
            data: data.as_u32(),
        })
    }

    fn deserialize(&self, reader: &Reader, id: Id) -> StorageResult<Arc<dyn Any + Send + Sync>> {
        let record: LocationRecord = reader.read_value(id)?;
        let dependencies = reader
            .read_object_array::<ResourceLocation>(Id::new(record.dependencies))?
            .iter()
            .map(|d| ResourceLocation::clone(d))
            .collect();

        let data = match reader.read_object_dyn(Id::new(record.data))? {
            None => None,
            Some(object) => Some(into_location_data(id, object)?),
        };

        Ok(Arc::new(ResourceLocation {
            internal_id: read_text(reader, Id::new(record.internal_id), Some(PATH_SEPARATOR))?,
            provider_id: read_text(reader, Id::new(record.provider_id), Some(NAMESPACE_SEPARATOR))?,
            primary_key: read_text(reader, Id::new(record.primary_key), Some(PATH_SEPARATOR))?,
            resource_type: read_text(
                reader,
                Id::new(record.resource_type),
                Some(NAMESPACE_SEPARATOR),
            )?,
            dependencies,
            data,
        }))
    }
}

fn into_location_data(id: Id, object: Arc<dyn Any + Send + Sync>) -> StorageResult<LocationData> {
    if let Some(options) = object.downcast_ref::<BundleOptions>() {
        return Ok(LocationData::Bundle(options.clone()));
    }
    if let Some(text) = object.downcast_ref::<String>() {
        return Ok(LocationData::Text(text.clone()));
    }
    Err(StorageError::TypeMismatch {
        id,
        expected: "BundleOptions or String",
        found: "unsupported location data",
    })
}

// ---------------------------------------------------------------------------
// BundleOptions
// ---------------------------------------------------------------------------

pub struct BundleOptionsAdapter;

impl SerializationAdapter for BundleOptionsAdapter {
    fn tag(&self) -> TypeTag {
        BUNDLE_TAG
    }

    fn object_type(&self) -> TypeId {
        TypeId::of::<BundleOptions>()
    }

    fn type_name(&self) -> &'static str {
        "BundleOptions"
    }

    fn serialize(&self, writer: &mut Writer, object: &dyn Any) -> StorageResult<Id> {
        let options = expect_object::<BundleOptions>(object, self)?;
        let bundle_name = writer.write_string(Some(&options.bundle_name), None)?;
        let hash = writer.write_string(Some(&options.hash), None)?;
        writer.write(&BundleRecord {
            bundle_name: bundle_name.as_u32(),
            hash: hash.as_u32(),
            crc: options.crc,
            chunked_transfer: u32::from(options.chunked_transfer),
            bundle_size: options.bundle_size,
        })
    }

    fn deserialize(&self, reader: &Reader, id: Id) -> StorageResult<Arc<dyn Any + Send + Sync>> {
        let record: BundleRecord = reader.read_value(id)?;
        Ok(Arc::new(BundleOptions {
            bundle_name: read_text(reader, Id::new(record.bundle_name), None)?,
            hash: read_text(reader, Id::new(record.hash), None)?,
            crc: record.crc,
            bundle_size: record.bundle_size,
            chunked_transfer: record.chunked_transfer != 0,
        }))
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct TextDataAdapter;

impl SerializationAdapter for TextDataAdapter {
    fn tag(&self) -> TypeTag {
        TEXT_TAG
    }

    fn object_type(&self) -> TypeId {
        TypeId::of::<String>()
    }

    fn type_name(&self) -> &'static str {
        "String"
    }

    fn serialize(&self, writer: &mut Writer, object: &dyn Any) -> StorageResult<Id> {
        let text = expect_object::<String>(object, self)?;
        writer.write_string(Some(text), None)
    }

    fn deserialize(&self, reader: &Reader, id: Id) -> StorageResult<Arc<dyn Any + Send + Sync>> {
        Ok(Arc::new(read_text(reader, id, None)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccat_store::WriterConfig;

    fn roundtrip(location: &ResourceLocation) -> ResourceLocation {
        let registry = Arc::new(catalog_registry().unwrap());
        let mut writer = Writer::with_adapters(WriterConfig::default(), Arc::clone(&registry));
        let id = writer.write_object(location, true).unwrap();
        let reader = Reader::new(writer.into_bytes(), 0, registry);
        let object = reader.read_object_dyn(id).unwrap().unwrap();
        object.downcast_ref::<ResourceLocation>().unwrap().clone()
    }

    fn bundle() -> ResourceLocation {
        ResourceLocation::new(
            "https://cdn.example.com/bundles/heroes_abc.bundle",
            "Engine.ResourceManagement.AssetBundleProvider",
            "heroes_abc.bundle",
            "Engine.ResourceManagement.IAssetBundleResource",
        )
        .with_data(LocationData::Bundle(BundleOptions {
            bundle_name: "heroes".into(),
            hash: "9f2c1e".into(),
            crc: 0xDEAD_BEEF,
            bundle_size: 1 << 33,
            chunked_transfer: true,
        }))
    }

    #[test]
    fn registry_contains_dependencies() {
        let registry = catalog_registry().unwrap();
        assert_eq!(registry.tags(), vec![LOCATION_TAG, BUNDLE_TAG, TEXT_TAG]);
    }

    #[test]
    fn plain_location_roundtrip() {
        let location = ResourceLocation::new(
            "Assets/Prefabs/Hero.prefab",
            "Engine.ResourceManagement.BundledAssetProvider",
            "Assets/Prefabs/Hero.prefab",
            "Engine.GameObject",
        );
        assert_eq!(roundtrip(&location), location);
    }

    #[test]
    fn location_with_bundle_dependency_roundtrip() {
        let location = ResourceLocation::new(
            "Assets/Prefabs/Hero.prefab",
            "Engine.ResourceManagement.BundledAssetProvider",
            "hero",
            "Engine.GameObject",
        )
        .with_dependency(bundle())
        .with_dependency(
            ResourceLocation::new("Assets/Text/intro.txt", "Engine.TextProvider", "intro", "System.String")
                .with_data(LocationData::Text("chapter one".into())),
        );
        assert_eq!(roundtrip(&location), location);
    }

    #[test]
    fn equal_locations_share_an_id() {
        let registry = Arc::new(catalog_registry().unwrap());
        let mut writer = Writer::with_adapters(WriterConfig::default(), registry);
        let a = writer.write_object(&bundle(), false).unwrap();
        let len = writer.len();
        let b = writer.write_object(&bundle(), false).unwrap();
        assert_eq!(a, b);
        assert_eq!(writer.len(), len);
    }

    #[test]
    fn shared_dependency_is_written_once() {
        let registry = Arc::new(catalog_registry().unwrap());
        let mut writer = Writer::with_adapters(WriterConfig::default(), registry);
        let shared = writer.write_object(&bundle(), false).unwrap();
        for name in ["Hero", "Villain"] {
            let path = format!("Assets/{name}.prefab");
            let asset = ResourceLocation::new(path.as_str(), "Engine.Provider", path.as_str(), "Engine.GameObject")
                .with_dependency(bundle());
            writer.write_object(&asset, false).unwrap();
        }
        // Both dependency arrays already hold exactly the shared bundle.
        let len = writer.len();
        writer.write_array(&[shared.as_u32()]).unwrap();
        assert_eq!(writer.len(), len);
    }

    #[test]
    fn empty_fields_survive() {
        let location = ResourceLocation::default();
        assert_eq!(roundtrip(&location), location);
    }

    #[test]
    fn shared_namespaces_are_compressed() {
        let registry = Arc::new(catalog_registry().unwrap());
        let mut writer = Writer::with_adapters(WriterConfig::default(), registry);
        writer.write_object(&bundle(), false).unwrap();
        let before = writer.len();
        let mut other = bundle();
        other.internal_id = "https://cdn.example.com/bundles/villains_def.bundle".into();
        other.primary_key = "villains_def.bundle".into();
        writer.write_object(&other, false).unwrap();
        let raw = other.internal_id.len()
            + other.provider_id.len()
            + other.primary_key.len()
            + other.resource_type.len();
        assert!(writer.len() - before < raw);
    }
}
