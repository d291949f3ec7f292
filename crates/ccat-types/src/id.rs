use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque reference to a record inside a serialized buffer.
///
/// An `Id` is the byte offset at which a record starts. It is only meaningful
/// together with the buffer produced by the writer that returned it; the
/// buffer itself keeps no registry of roots, so callers persist the ids they
/// need next to the bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(u32);

impl Id {
    /// The null id. Encodes an absent string or object; values have no null.
    pub const NULL: Self = Self(u32::MAX);

    /// Largest offset a non-null id can address.
    pub const MAX_OFFSET: usize = (u32::MAX - 1) as usize;

    /// Wrap a raw id.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Build an id from a buffer offset.
    pub fn from_offset(offset: usize) -> Result<Self, TypeError> {
        if offset > Self::MAX_OFFSET {
            return Err(TypeError::OffsetOverflow(offset));
        }
        Ok(Self(offset as u32))
    }

    /// Returns `true` for [`Id::NULL`].
    pub const fn is_null(&self) -> bool {
        self.0 == u32::MAX
    }

    /// The raw 32-bit representation, as stored inside records.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Byte offset into the buffer.
    pub const fn offset(&self) -> usize {
        self.0 as usize
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Id(null)")
        } else {
            write!(f, "Id({})", self.0)
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "@{}", self.0)
        }
    }
}

impl FromStr for Id {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "null" {
            return Ok(Self::NULL);
        }
        let digits = s.strip_prefix('@').unwrap_or(s);
        let raw: u32 = digits
            .parse()
            .map_err(|_| TypeError::InvalidId(s.to_string()))?;
        Ok(Self(raw))
    }
}

impl From<Id> for u32 {
    fn from(id: Id) -> Self {
        id.0
    }
}
