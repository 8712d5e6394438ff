//! In-memory database state and the client evaluating expressions against it.
//!
//! Documents are stored as `{ "ref", "ts", "data" }` per collection, ordered by their
//! numeric id (insertion order). Indexes are definitions only; their entries are
//! computed from the source collection on every read.

use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::Utc;
use mea::rwlock::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

use menagerie_core::{
    client::{Client, ClientBuilder},
    config::ClientConfig,
    error::{ZooError, ZooResult},
    index::{CollectionDefinition, IndexDefinition},
    query::Expr,
    value::{COLLECTIONS, INDEXES, Reference},
};

use crate::evaluator::{Evaluator, Segment, compare_values, key_segments, resolve, same_value};

#[derive(Debug, Clone, Default)]
struct StoredCollection {
    ts: i64,
    documents: BTreeMap<u64, Document>,
}

#[derive(Debug, Clone)]
struct StoredIndex {
    ts: i64,
    definition: IndexDefinition,
}

/// Everything the database holds. Cloned per query so a failed query can be discarded.
#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    collections: BTreeMap<String, StoredCollection>,
    indexes: BTreeMap<String, StoredIndex>,
    next_id: u64,
    last_ts: i64,
}

impl State {
    /// A strictly increasing microsecond timestamp.
    fn tick(&mut self) -> i64 {
        self.last_ts = Utc::now().timestamp_micros().max(self.last_ts + 1);
        self.last_ts
    }

    pub fn create_collection(&mut self, definition: &CollectionDefinition) -> ZooResult<Document> {
        if self.collections.contains_key(&definition.name) {
            return Err(ZooError::InstanceAlreadyExists);
        }

        let ts = self.tick();
        self.collections.insert(
            definition.name.clone(),
            StoredCollection {
                ts,
                documents: BTreeMap::new(),
            },
        );

        Ok(collection_document(&definition.name, ts))
    }

    pub fn create_index(&mut self, definition: &IndexDefinition) -> ZooResult<Document> {
        if self.indexes.contains_key(&definition.name) {
            return Err(ZooError::InstanceAlreadyExists);
        }
        if !self.collections.contains_key(&definition.source) {
            return Err(ZooError::InstanceNotFound);
        }

        let ts = self.tick();
        let index = StoredIndex {
            ts,
            definition: definition.clone(),
        };
        let document = index_document(&index);
        self.indexes.insert(definition.name.clone(), index);

        Ok(document)
    }

    pub fn get(&self, reference: &Reference) -> ZooResult<Document> {
        match reference.collection.as_str() {
            COLLECTIONS => self
                .collections
                .get(&reference.id)
                .map(|collection| collection_document(&reference.id, collection.ts))
                .ok_or(ZooError::InstanceNotFound),
            INDEXES => self
                .indexes
                .get(&reference.id)
                .map(index_document)
                .ok_or(ZooError::InstanceNotFound),
            collection => {
                let id = document_id(reference)?;
                self.collections
                    .get(collection)
                    .and_then(|stored| stored.documents.get(&id))
                    .cloned()
                    .ok_or(ZooError::InstanceNotFound)
            }
        }
    }

    /// References of every document in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> ZooResult<Vec<Bson>> {
        let stored = self
            .collections
            .get(collection)
            .ok_or(ZooError::InstanceNotFound)?;

        Ok(stored
            .documents
            .values()
            .filter_map(|document| document.get("ref").cloned())
            .collect())
    }

    pub fn create_document(&mut self, collection: &str, data: Document) -> ZooResult<Document> {
        if !self.collections.contains_key(collection) {
            return Err(ZooError::InstanceNotFound);
        }

        self.next_id += 1;
        let id = self.next_id;
        let ts = self.tick();

        let mut document = Document::new();
        document.insert("ref", Reference::new(collection, id.to_string()).to_bson());
        document.insert("ts", Bson::Int64(ts));
        document.insert("data", strip_nulls(data));

        self.check_unique(collection, id, &document)?;
        if let Some(stored) = self.collections.get_mut(collection) {
            stored.documents.insert(id, document.clone());
        }

        Ok(document)
    }

    /// Deep-merges `data` into the document's data. Null values remove keys.
    pub fn update_document(&mut self, reference: &Reference, data: Document) -> ZooResult<Document> {
        let mut document = self.get(reference)?;
        let id = document_id(reference)?;

        let mut merged = document
            .get("data")
            .and_then(Bson::as_document)
            .cloned()
            .unwrap_or_default();
        merge(&mut merged, data);

        document.insert("ts", Bson::Int64(self.tick()));
        document.insert("data", merged);

        self.check_unique(&reference.collection, id, &document)?;
        if let Some(stored) = self.collections.get_mut(&reference.collection) {
            stored.documents.insert(id, document.clone());
        }

        Ok(document)
    }

    /// Deletes a document, a collection or an index. Nothing cascades.
    pub fn delete(&mut self, reference: &Reference) -> ZooResult<Document> {
        let deleted = self.get(reference)?;

        match reference.collection.as_str() {
            COLLECTIONS => {
                self.collections.remove(&reference.id);
            }
            INDEXES => {
                self.indexes.remove(&reference.id);
            }
            collection => {
                let id = document_id(reference)?;
                if let Some(stored) = self.collections.get_mut(collection) {
                    stored.documents.remove(&id);
                }
            }
        }

        Ok(deleted)
    }

    /// The entries of `index` whose terms equal `terms`, sorted by the index values.
    ///
    /// Entries are the value tuples, or the document reference when the index has no
    /// values. Documents missing any term are not indexed.
    pub fn match_index(&self, index: &str, terms: &[Bson]) -> ZooResult<Vec<Bson>> {
        let definition = &self
            .indexes
            .get(index)
            .ok_or(ZooError::InstanceNotFound)?
            .definition;
        let documents = self
            .collections
            .get(&definition.source)
            .map(|stored| stored.documents.values().collect::<Vec<_>>())
            .unwrap_or_default();

        let mut entries = documents
            .into_iter()
            .map(|document| Bson::Document(document.clone()))
            .filter(|document| match index_terms(definition, document) {
                Some(found) => {
                    found.len() == terms.len()
                        && found.iter().zip(terms).all(|(a, b)| same_value(a, b))
                }
                None => false,
            })
            .map(|document| index_values(definition, &document))
            .collect::<Vec<_>>();

        entries.sort_by(|(left, _), (right, _)| {
            left.iter()
                .zip(right)
                .zip(&definition.values)
                .map(|((a, b), value)| {
                    let ordering = compare_values(a, b);
                    if value.reverse {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }

    fn check_unique(&self, collection: &str, id: u64, candidate: &Document) -> ZooResult<()> {
        let candidate = Bson::Document(candidate.clone());

        for index in self.indexes.values() {
            let definition = &index.definition;
            if !definition.is_unique() || definition.source != collection {
                continue;
            }
            let Some(terms) = index_terms(definition, &candidate) else {
                continue;
            };

            let collides = self
                .collections
                .get(collection)
                .into_iter()
                .flat_map(|stored| stored.documents.iter())
                .filter(|(other, _)| **other != id)
                .filter_map(|(_, other)| index_terms(definition, &Bson::Document(other.clone())))
                .any(|other| other.iter().zip(&terms).all(|(a, b)| same_value(a, b)));

            if collides {
                return Err(ZooError::InstanceNotUnique);
            }
        }

        Ok(())
    }
}

fn document_id(reference: &Reference) -> ZooResult<u64> {
    reference
        .id
        .parse()
        .map_err(|_| ZooError::InstanceNotFound)
}

fn collection_document(name: &str, ts: i64) -> Document {
    let mut document = Document::new();
    document.insert("ref", Reference::collection(name).to_bson());
    document.insert("name", name);
    document.insert("ts", Bson::Int64(ts));
    document
}

fn index_document(index: &StoredIndex) -> Document {
    let definition = &index.definition;
    let mut document = Document::new();
    document.insert("ref", Reference::index(definition.name.as_str()).to_bson());
    document.insert("name", definition.name.as_str());
    document.insert("source", Reference::collection(definition.source.as_str()).to_bson());
    document.insert("unique", definition.is_unique());
    document.insert("ts", Bson::Int64(index.ts));
    document
}

/// Term values of `document`, or `None` if any term is absent.
fn index_terms(definition: &IndexDefinition, document: &Bson) -> Option<Vec<Bson>> {
    definition
        .terms
        .iter()
        .map(|term| resolve(document, &key_segments(&term.field)).cloned())
        .collect()
}

/// The sort key and the entry of `document`.
fn index_values(definition: &IndexDefinition, document: &Bson) -> (Vec<Bson>, Bson) {
    if definition.values.is_empty() {
        let reference = resolve(document, &[Segment::Key("ref".into())])
            .cloned()
            .unwrap_or(Bson::Null);
        return (Vec::new(), reference);
    }

    let values = definition
        .values
        .iter()
        .map(|value| {
            resolve(document, &key_segments(&value.field))
                .cloned()
                .unwrap_or(Bson::Null)
        })
        .collect::<Vec<_>>();

    (values.clone(), Bson::Array(values))
}

fn strip_nulls(data: Document) -> Document {
    data.into_iter()
        .filter_map(|(key, value)| match value {
            Bson::Null => None,
            Bson::Document(nested) => Some((key, Bson::Document(strip_nulls(nested)))),
            other => Some((key, other)),
        })
        .collect()
}

fn merge(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        match value {
            Bson::Null => {
                target.remove(&key);
            }
            Bson::Document(nested) => match target.get_mut(&key) {
                Some(Bson::Document(existing)) => merge(existing, nested),
                _ => {
                    target.insert(key, Bson::Document(strip_nulls(nested)));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Thread-safe in-memory database evaluating query expressions.
///
/// `InMemoryClient` is cloneable and uses an `Arc`-wrapped internal state, so clones
/// share the same underlying data.
///
/// # Atomicity
///
/// Each query runs under the write lock against a copy of the state. The copy
/// replaces the state only if evaluation succeeds, so a failing batch leaves no
/// partial effects.
///
/// # Example
///
/// ```ignore
/// use menagerie_memory::InMemoryClient;
/// use menagerie_core::{client::{Client, ClientBuilder}, config::ClientConfig, query::Q};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = InMemoryClient::builder()
///         .config(ClientConfig::new("secret"))
///         .build()
///         .await?;
///
///     client.query(Q::create_collection(CollectionDefinition::new("User"))).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryClient {
    state: Arc<RwLock<State>>,
}

impl InMemoryClient {
    fn empty() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Creates a builder validating a [`ClientConfig`] before handing out a client.
    pub fn builder() -> InMemoryClientBuilder {
        InMemoryClientBuilder::default()
    }
}

#[async_trait]
impl Client for InMemoryClient {
    async fn query(&self, expr: Expr) -> ZooResult<Bson> {
        trace!(expr = %expr, "evaluating query");

        let mut state = self.state.write().await;
        let mut snapshot = state.clone();
        let result = Evaluator::new(&mut snapshot).evaluate(&expr)?;
        *state = snapshot;

        Ok(result)
    }
}

/// Builder for constructing [`InMemoryClient`] instances.
///
/// Requires a configuration with a non-empty secret, like a networked client would, so
/// code moving between clients fails the same way when it is misconfigured.
#[derive(Debug, Default)]
pub struct InMemoryClientBuilder {
    config: Option<ClientConfig>,
}

impl InMemoryClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[async_trait]
impl ClientBuilder for InMemoryClientBuilder {
    type Client = InMemoryClient;

    /// # Errors
    ///
    /// Returns [`ZooError::Configuration`] if no configuration was given or its secret
    /// is empty.
    async fn build(self) -> ZooResult<Self::Client> {
        let config = self.config.ok_or_else(|| {
            ZooError::Configuration("the in-memory client requires a configuration".into())
        })?;
        config.validate()?;

        Ok(InMemoryClient::empty())
    }
}
