//! Index and collection definitions, and sort-order resolution.
//!
//! Every index the compiler emits looks up documents by a list of [`IndexTerm`]s and
//! yields, for each match, a tuple of [`IndexValue`]s. By convention the last value of
//! that tuple is the reference of the entity the entry points at.

use serde::{Deserialize, Serialize};

/// Sort order used when a field or relationship does not configure one: newest first.
pub const DEFAULT_SORT: &[&str] = &["-ts"];

/// A storage path an index looks documents up by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTerm {
    pub field: Vec<String>,
}

impl IndexTerm {
    pub fn new<S: Into<String>>(field: impl IntoIterator<Item = S>) -> Self {
        Self {
            field: field.into_iter().map(Into::into).collect(),
        }
    }
}

/// A storage path an index returns, optionally in descending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexValue {
    pub field: Vec<String>,
    #[serde(default)]
    pub reverse: bool,
}

impl IndexValue {
    /// An ascending value.
    pub fn new<S: Into<String>>(field: impl IntoIterator<Item = S>) -> Self {
        Self {
            field: field.into_iter().map(Into::into).collect(),
            reverse: false,
        }
    }

    /// A descending value.
    pub fn reversed<S: Into<String>>(field: impl IntoIterator<Item = S>) -> Self {
        Self {
            reverse: true,
            ..Self::new(field)
        }
    }

    /// The document's own reference, used as the trailing value of entity indexes.
    pub fn reference() -> Self {
        Self::new(["ref"])
    }
}

/// Everything needed to create a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    /// Name of the collection the index reads from.
    pub source: String,
    pub terms: Vec<IndexTerm>,
    pub values: Vec<IndexValue>,
    /// `None` leaves uniqueness unspecified (non-unique).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

impl IndexDefinition {
    pub fn is_unique(&self) -> bool {
        self.unique.unwrap_or(false)
    }
}

/// Everything needed to create a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDefinition {
    pub name: String,
}

impl CollectionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Maps a field name onto its storage path.
///
/// `ts` and `ref` (or `id`, an alias for the reference) live at the top of a stored
/// document; everything else lives under `data`.
pub fn storage_path(field: &str) -> Vec<String> {
    match field {
        "ts" | "ref" => vec![field.to_string()],
        "id" => vec!["ref".to_string()],
        _ => vec!["data".to_string(), field.to_string()],
    }
}

/// Resolves a sort description into ordered index values.
///
/// Each entry names a field, prefixed with `-` for descending order. `None` resolves
/// to [`DEFAULT_SORT`].
///
/// # Example
///
/// ```ignore
/// let values = sort_to_values(Some(&["-ts", "name"][..]));
///
/// assert_eq!(values, vec![
///     IndexValue::reversed(["ts"]),
///     IndexValue::new(["data", "name"]),
/// ]);
/// ```
pub fn sort_to_values<S: AsRef<str>>(sort: Option<&[S]>) -> Vec<IndexValue> {
    match sort {
        Some(sort) => sort.iter().map(|s| sort_value(s.as_ref())).collect(),
        None => DEFAULT_SORT.iter().map(|s| sort_value(s)).collect(),
    }
}

fn sort_value(entry: &str) -> IndexValue {
    match entry.strip_prefix('-') {
        Some(field) => IndexValue::reversed(storage_path(field)),
        None => IndexValue::new(storage_path(entry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_descending_and_nested_fields() {
        let sort = vec!["-ts".to_string(), "-name".to_string()];

        assert_eq!(
            sort_to_values(Some(sort.as_slice())),
            vec![
                IndexValue::reversed(["ts"]),
                IndexValue::reversed(["data", "name"]),
            ]
        );
    }

    #[test]
    fn defaults_to_newest_first() {
        assert_eq!(
            sort_to_values::<String>(None),
            vec![IndexValue::reversed(["ts"])]
        );
    }

    #[test]
    fn reference_aliases_map_to_top_level() {
        let sort = ["ref", "id", "age"];

        assert_eq!(
            sort_to_values(Some(&sort[..])),
            vec![
                IndexValue::new(["ref"]),
                IndexValue::new(["ref"]),
                IndexValue::new(["data", "age"]),
            ]
        );
    }
}
