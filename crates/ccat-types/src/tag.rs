use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable discriminator for a serialization adapter.
///
/// Tags are chosen by the layer that defines the adapters and are embedded in
/// object records when the writer is asked to preserve type information, so a
/// reader can pick the adapter without knowing the type up front. A tag must
/// never be reassigned to a different type once data has been written with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(u32);

impl TypeTag {
    /// Create a tag from its numeric value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The numeric value of this tag.
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

impl From<u32> for TypeTag {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
