//! Expression tree for the target database's query language.
//!
//! The compiler never talks to the database directly; it composes [`Expr`] values and
//! hands them to a [`Client`](crate::client::Client). Expressions are plain data, so
//! two compilations of the same model compare equal with `==`.
//!
//! # Building Expressions
//!
//! The [`Q`] namespace mirrors the query language's functions:
//!
//! ```ignore
//! use menagerie::query::Q;
//!
//! // Load a document and read one of its fields, tolerating absence.
//! let expr = Q::let_in(
//!     [("document", Q::get(Q::reference(Q::collection("User"), "1001")))],
//!     Q::select_or(Q::path(["data", "email"]), Q::var("document"), Q::null()),
//! );
//! ```
//!
//! # Wire Format
//!
//! [`Expr::to_wire`] renders the JSON form the database accepts over HTTP, and the
//! [`Display`](std::fmt::Display) implementation prints that rendering.

use bson::Bson;
use serde_json::{Map, Number, Value, json};
use std::fmt;

use crate::{
    index::{CollectionDefinition, IndexDefinition, IndexTerm, IndexValue},
    value::{REF_KEY, Reference},
};

/// A query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant value.
    Literal(Bson),
    /// An array whose elements are evaluated.
    Array(Vec<Expr>),
    /// An object whose values are evaluated. Key order is preserved.
    Object(Vec<(String, Expr)>),
    /// A variable bound by [`Expr::Let`] or [`Expr::Lambda`].
    Var(String),
    /// Binds variables in order (later bindings see earlier ones) and evaluates `body`.
    Let {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    /// An anonymous function. With several parameters the argument is destructured
    /// from an array.
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    /// Reads the value at `path` inside `from`, falling back to `default` when the
    /// path is absent. Without a default, an absent path is an error.
    Select {
        path: Box<Expr>,
        from: Box<Expr>,
        default: Option<Box<Expr>>,
    },
    /// Whether `path` is present inside `from`.
    ContainsPath {
        path: Box<Expr>,
        from: Box<Expr>,
    },
    /// Evaluates only the branch selected by `condition`.
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Loads a document by reference.
    Get(Box<Expr>),
    /// Builds a document reference from a collection and an id.
    Ref {
        collection: Box<Expr>,
        id: Box<Expr>,
    },
    /// Reference to a collection by name.
    Collection(String),
    /// Reference to an index by name.
    Index(String),
    /// The set of every document in a collection, in insertion order.
    Documents(Box<Expr>),
    /// The set of index entries whose terms equal `terms`.
    Match {
        index: Box<Expr>,
        terms: Box<Expr>,
    },
    /// Materializes a set into a page object `{ "data": [...] }`.
    Paginate {
        set: Box<Expr>,
        size: Option<usize>,
    },
    /// Applies a lambda to every element of an array or page.
    Map {
        collection: Box<Expr>,
        lambda: Box<Expr>,
    },
    /// Number of elements of an array.
    Count(Box<Expr>),
    /// Subtracts every following number from the first.
    Subtract(Vec<Expr>),
    /// Creates a document in a collection from `{ "data": ... }`.
    Create {
        collection: Box<Expr>,
        params: Box<Expr>,
    },
    /// Merges `{ "data": ... }` into an existing document.
    Update {
        reference: Box<Expr>,
        params: Box<Expr>,
    },
    /// Deletes a document, collection or index.
    Delete(Box<Expr>),
    CreateCollection(CollectionDefinition),
    CreateIndex(IndexDefinition),
    /// Evaluates each expression in order as one atomic batch, returning the last result.
    Do(Vec<Expr>),
}

impl Expr {
    /// Renders this expression in the database's JSON wire format.
    pub fn to_wire(&self) -> Value {
        match self {
            Expr::Literal(value) => literal_to_wire(value),
            Expr::Array(items) => Value::Array(items.iter().map(Expr::to_wire).collect()),
            Expr::Object(entries) => json!({
                "object": entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_wire()))
                    .collect::<Map<_, _>>()
            }),
            Expr::Var(name) => json!({ "var": name }),
            Expr::Let { bindings, body } => json!({
                "let": bindings
                    .iter()
                    .map(|(key, value)| json!({ key: value.to_wire() }))
                    .collect::<Vec<_>>(),
                "in": body.to_wire(),
            }),
            Expr::Lambda { params, body } => json!({
                "lambda": match params.as_slice() {
                    [single] => json!(single),
                    many => json!(many),
                },
                "expr": body.to_wire(),
            }),
            Expr::Select { path, from, default } => {
                let mut wire = json!({ "select": path.to_wire(), "from": from.to_wire() });
                if let Some(default) = default {
                    wire["default"] = default.to_wire();
                }
                wire
            }
            Expr::ContainsPath { path, from } => {
                json!({ "contains_path": path.to_wire(), "in": from.to_wire() })
            }
            Expr::If { condition, then, otherwise } => json!({
                "if": condition.to_wire(),
                "then": then.to_wire(),
                "else": otherwise.to_wire(),
            }),
            Expr::Get(reference) => json!({ "get": reference.to_wire() }),
            Expr::Ref { collection, id } => {
                json!({ "ref": collection.to_wire(), "id": id.to_wire() })
            }
            Expr::Collection(name) => json!({ "collection": name }),
            Expr::Index(name) => json!({ "index": name }),
            Expr::Documents(collection) => json!({ "documents": collection.to_wire() }),
            Expr::Match { index, terms } => {
                json!({ "match": index.to_wire(), "terms": terms.to_wire() })
            }
            Expr::Paginate { set, size } => {
                let mut wire = json!({ "paginate": set.to_wire() });
                if let Some(size) = size {
                    wire["size"] = json!(size);
                }
                wire
            }
            Expr::Map { collection, lambda } => {
                json!({ "map": lambda.to_wire(), "collection": collection.to_wire() })
            }
            Expr::Count(collection) => json!({ "count": collection.to_wire() }),
            Expr::Subtract(operands) => json!({
                "subtract": operands.iter().map(Expr::to_wire).collect::<Vec<_>>()
            }),
            Expr::Create { collection, params } => {
                json!({ "create": collection.to_wire(), "params": params.to_wire() })
            }
            Expr::Update { reference, params } => {
                json!({ "update": reference.to_wire(), "params": params.to_wire() })
            }
            Expr::Delete(reference) => json!({ "delete": reference.to_wire() }),
            Expr::CreateCollection(definition) => json!({
                "create_collection": { "object": { "name": definition.name } }
            }),
            Expr::CreateIndex(definition) => {
                let mut params = Map::new();
                params.insert("name".into(), json!(definition.name));
                params.insert("source".into(), json!({ "collection": definition.source }));
                params.insert(
                    "terms".into(),
                    Value::Array(definition.terms.iter().map(term_to_wire).collect()),
                );
                params.insert(
                    "values".into(),
                    Value::Array(definition.values.iter().map(value_to_wire).collect()),
                );
                if let Some(unique) = definition.unique {
                    params.insert("unique".into(), json!(unique));
                }
                json!({ "create_index": { "object": params } })
            }
            Expr::Do(exprs) => json!({
                "do": exprs.iter().map(Expr::to_wire).collect::<Vec<_>>()
            }),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl From<Bson> for Expr {
    fn from(value: Bson) -> Self {
        Expr::Literal(value)
    }
}

impl From<Reference> for Expr {
    fn from(reference: Reference) -> Self {
        Expr::Literal(reference.to_bson())
    }
}

fn term_to_wire(term: &IndexTerm) -> Value {
    json!({ "object": { "field": term.field } })
}

fn value_to_wire(value: &IndexValue) -> Value {
    json!({ "object": { "field": value.field, "reverse": value.reverse } })
}

fn literal_to_wire(value: &Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => json!(b),
        Bson::Int32(n) => json!(n),
        Bson::Int64(n) => json!(n),
        Bson::Double(n) => Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => json!(s),
        Bson::Array(items) => Value::Array(items.iter().map(literal_to_wire).collect()),
        Bson::Document(document) => match Reference::from_bson(value) {
            Some(reference) => json!({
                REF_KEY: { "collection": reference.collection, "id": reference.id }
            }),
            None => json!({
                "object": document
                    .iter()
                    .map(|(key, value)| (key.to_string(), literal_to_wire(value)))
                    .collect::<Map<_, _>>()
            }),
        },
        other => json!(other.to_string()),
    }
}

/// Static constructors for [`Expr`], one per query-language function.
pub struct Q;

impl Q {
    pub fn literal(value: impl Into<Bson>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn null() -> Expr {
        Expr::Literal(Bson::Null)
    }

    /// A constant path such as `["data", "email"]`.
    pub fn path<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Expr {
        Expr::Literal(Bson::Array(
            segments
                .into_iter()
                .map(|segment| Bson::String(segment.into()))
                .collect(),
        ))
    }

    pub fn array(items: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Array(items.into_iter().collect())
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Expr)>) -> Expr {
        Expr::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn let_in<K: Into<String>>(
        bindings: impl IntoIterator<Item = (K, Expr)>,
        body: Expr,
    ) -> Expr {
        Expr::Let {
            bindings: bindings
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
            body: Box::new(body),
        }
    }

    pub fn lambda<S: Into<String>>(params: impl IntoIterator<Item = S>, body: Expr) -> Expr {
        Expr::Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
    }

    /// Strict select: an absent path fails evaluation.
    pub fn select(path: Expr, from: Expr) -> Expr {
        Expr::Select {
            path: Box::new(path),
            from: Box::new(from),
            default: None,
        }
    }

    /// Select falling back to `default` when the path is absent.
    pub fn select_or(path: Expr, from: Expr, default: Expr) -> Expr {
        Expr::Select {
            path: Box::new(path),
            from: Box::new(from),
            default: Some(Box::new(default)),
        }
    }

    pub fn contains_path(path: Expr, from: Expr) -> Expr {
        Expr::ContainsPath {
            path: Box::new(path),
            from: Box::new(from),
        }
    }

    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn get(reference: Expr) -> Expr {
        Expr::Get(Box::new(reference))
    }

    pub fn reference(collection: Expr, id: impl Into<Bson>) -> Expr {
        Expr::Ref {
            collection: Box::new(collection),
            id: Box::new(Expr::Literal(id.into())),
        }
    }

    pub fn collection(name: impl Into<String>) -> Expr {
        Expr::Collection(name.into())
    }

    pub fn index(name: impl Into<String>) -> Expr {
        Expr::Index(name.into())
    }

    pub fn documents(collection: Expr) -> Expr {
        Expr::Documents(Box::new(collection))
    }

    pub fn match_index(index: Expr, terms: Expr) -> Expr {
        Expr::Match {
            index: Box::new(index),
            terms: Box::new(terms),
        }
    }

    pub fn paginate(set: Expr) -> Expr {
        Expr::Paginate {
            set: Box::new(set),
            size: None,
        }
    }

    pub fn paginate_sized(set: Expr, size: usize) -> Expr {
        Expr::Paginate {
            set: Box::new(set),
            size: Some(size),
        }
    }

    pub fn map(collection: Expr, lambda: Expr) -> Expr {
        Expr::Map {
            collection: Box::new(collection),
            lambda: Box::new(lambda),
        }
    }

    pub fn count(collection: Expr) -> Expr {
        Expr::Count(Box::new(collection))
    }

    pub fn subtract(operands: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Subtract(operands.into_iter().collect())
    }

    pub fn create(collection: Expr, params: Expr) -> Expr {
        Expr::Create {
            collection: Box::new(collection),
            params: Box::new(params),
        }
    }

    pub fn update(reference: Expr, params: Expr) -> Expr {
        Expr::Update {
            reference: Box::new(reference),
            params: Box::new(params),
        }
    }

    pub fn delete(reference: Expr) -> Expr {
        Expr::Delete(Box::new(reference))
    }

    pub fn create_collection(definition: CollectionDefinition) -> Expr {
        Expr::CreateCollection(definition)
    }

    pub fn create_index(definition: IndexDefinition) -> Expr {
        Expr::CreateIndex(definition)
    }

    /// An atomic batch.
    pub fn batch(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Do(exprs.into_iter().collect())
    }
}
