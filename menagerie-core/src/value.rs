//! References and value helpers shared by the compiler and database clients.
//!
//! Stored values are plain [`Bson`]. A [`Reference`] travels inside values in its
//! encoded form, `{"@ref": {"collection": .., "id": ..}}`, so that a reference
//! written into a document's `data` can be read back and dereferenced.

use bson::{Bson, Document, de::deserialize_from_bson, doc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

use crate::error::ZooResult;

/// Key under which an encoded reference stores its target.
pub const REF_KEY: &str = "@ref";

/// Reserved collection holding collection definitions.
pub const COLLECTIONS: &str = "collections";

/// Reserved collection holding index definitions.
pub const INDEXES: &str = "indexes";

/// An emitted entity instance (or any projected object).
pub type Instance = Document;

/// A collection-scoped identifier for a document, collection or index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// Name of the collection the target lives in.
    pub collection: String,
    /// Identifier of the target within its collection.
    pub id: String,
}

impl Reference {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Reference to a collection definition.
    pub fn collection(name: impl Into<String>) -> Self {
        Self::new(COLLECTIONS, name)
    }

    /// Reference to an index definition.
    pub fn index(name: impl Into<String>) -> Self {
        Self::new(INDEXES, name)
    }

    /// Encodes this reference as a value that can be stored in a document.
    pub fn to_bson(&self) -> Bson {
        let mut encoded = Document::new();
        encoded.insert(
            REF_KEY,
            doc! {
                "collection": self.collection.as_str(),
                "id": self.id.as_str(),
            },
        );

        Bson::Document(encoded)
    }

    /// Decodes a reference from its stored form. Returns `None` for any other value.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        let inner = value.as_document()?.get(REF_KEY)?.as_document()?;

        Some(Self::new(
            inner.get("collection")?.as_str()?,
            inner.get("id")?.as_str()?,
        ))
    }

    /// Whether `value` is an encoded reference.
    pub fn is_reference(value: &Bson) -> bool {
        Self::from_bson(value).is_some()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({}, {})", self.collection, self.id)
    }
}

impl From<Reference> for Bson {
    fn from(reference: Reference) -> Self {
        reference.to_bson()
    }
}

/// Deserializes an emitted instance into a caller-defined type.
///
/// # Errors
///
/// Returns [`ZooError::Serialization`](crate::error::ZooError::Serialization) if the
/// instance does not have the shape `T` expects.
pub fn from_instance<T: DeserializeOwned>(instance: Instance) -> ZooResult<T> {
    Ok(deserialize_from_bson(Bson::Document(instance))?)
}
