//! Document identifiers.
//!
//! Every stored document carries a single system-assigned `_id`. Externally the
//! identifier travels as a 24 character hex string (as in URL path segments);
//! internally it is a 12 byte [`ObjectId`]. The two forms convert losslessly and
//! strings that are not valid hex of the right length have no internal form.

use std::{fmt, str::FromStr};

use bson::{Bson, oid::ObjectId};

use crate::error::DocumentStoreError;

/// Name of the identifier field on every stored document.
pub const ID_FIELD: &str = "_id";

/// A decoded document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier(ObjectId);

impl Identifier {
    /// Generates a fresh identifier for a document about to be inserted.
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    /// Returns the internal representation.
    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }

    /// Returns the external (hex) representation.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl FromStr for Identifier {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
            .map(Identifier)
            .map_err(|_| DocumentStoreError::InvalidIdentifier(s.to_string()))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl From<ObjectId> for Identifier {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl From<Identifier> for ObjectId {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl From<Identifier> for Bson {
    fn from(id: Identifier) -> Self {
        Bson::ObjectId(id.0)
    }
}
