use serde::{Deserialize, Serialize};

/// Where a resource lives and how to load it.
///
/// Dependencies are loaded before the resource itself; each is a full
/// location of its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocation {
    /// Load path, e.g. `Assets/Prefabs/Hero.prefab`.
    pub internal_id: String,
    /// Fully qualified provider type that loads the resource.
    pub provider_id: String,
    /// Key the resource was registered under.
    pub primary_key: String,
    /// Fully qualified type of the loaded object.
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ResourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LocationData>,
}

impl ResourceLocation {
    pub fn new(
        internal_id: impl Into<String>,
        provider_id: impl Into<String>,
        primary_key: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            internal_id: internal_id.into(),
            provider_id: provider_id.into(),
            primary_key: primary_key.into(),
            resource_type: resource_type.into(),
            dependencies: Vec::new(),
            data: None,
        }
    }

    pub fn with_dependency(mut self, dependency: ResourceLocation) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_data(mut self, data: LocationData) -> Self {
        self.data = Some(data);
        self
    }

    /// Number of locations in this tree, `self` included.
    pub fn tree_size(&self) -> usize {
        1 + self.dependencies.iter().map(Self::tree_size).sum::<usize>()
    }
}

/// Provider-specific payload attached to a location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationData {
    Bundle(BundleOptions),
    Text(String),
}

/// Download and caching parameters of an asset bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOptions {
    pub bundle_name: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub crc: u32,
    #[serde(default)]
    pub bundle_size: u64,
    #[serde(default)]
    pub chunked_transfer: bool,
}

/// JSON input describing a catalog to build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub locator_id: String,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

/// One location and every key that resolves to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub keys: Vec<String>,
    pub location: ResourceLocation,
}

impl Manifest {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_from_json() {
        let json = r#"{
            "locator_id": "MainCatalog",
            "entries": [{
                "keys": ["hero", "Assets/Hero.prefab"],
                "location": {
                    "internal_id": "Assets/Hero.prefab",
                    "provider_id": "Engine.BundledAssetProvider",
                    "primary_key": "Assets/Hero.prefab",
                    "resource_type": "Engine.GameObject",
                    "dependencies": [{
                        "internal_id": "bundles/heroes.bundle",
                        "provider_id": "Engine.AssetBundleProvider",
                        "primary_key": "heroes",
                        "resource_type": "Engine.AssetBundle",
                        "data": { "bundle": { "bundle_name": "heroes", "crc": 7 } }
                    }]
                }
            }]
        }"#;
        let manifest = Manifest::from_json(json).unwrap();
        assert_eq!(manifest.locator_id, "MainCatalog");
        let location = &manifest.entries[0].location;
        assert_eq!(location.tree_size(), 2);
        assert!(location.data.is_none());
        match &location.dependencies[0].data {
            Some(LocationData::Bundle(options)) => {
                assert_eq!(options.bundle_name, "heroes");
                assert_eq!(options.crc, 7);
                assert!(!options.chunked_transfer);
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn text_data_json_shape() {
        let data = LocationData::Text("payload".into());
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"text":"payload"}"#);
    }

    #[test]
    fn builder_methods() {
        let location = ResourceLocation::new("a", "p", "k", "t")
            .with_dependency(ResourceLocation::new("b", "p", "k2", "t"))
            .with_data(LocationData::Text("x".into()));
        assert_eq!(location.dependencies.len(), 1);
        assert_eq!(location.data, Some(LocationData::Text("x".into())));
    }
}
