use bytemuck::{Pod, Zeroable};

/// Root record of a catalog blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CatalogHeader {
    /// String id of the catalog's locator name.
    pub locator_id: u32,
    /// Object array of every `ResourceLocation`.
    pub locations: u32,
    /// Array of [`KeyEntry`].
    pub keys: u32,
}

/// A lookup key and the locations it resolves to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct KeyEntry {
    /// String id of the key.
    pub key: u32,
    /// `u32` array of indices into the location array.
    pub locations: u32,
}
