//! Compiles a model into the read queries that rebuild emitted instances from stored
//! documents.
//!
//! Dereferencing loads the raw document once and computes every output key from it.
//! Each key is guarded by a presence test: when the key's storage path is missing
//! from the document the key is still produced, holding null, and the field's query is
//! never evaluated. Documents written before a field existed therefore read back
//! cleanly, and a relationship field only follows references that are actually
//! stored.

use bson::Bson;

use crate::{
    field::FieldDescriptor,
    model::{DOCUMENT_VAR, Model, REF_VAR},
    query::{Expr, Q},
};

/// Presence path for keys without storage of their own. Every document has a `ts`.
const SENTINEL_PATH: &[&str] = &["ts"];

/// Lambda parameter bound to each index entry while paginating.
const VALUES_VAR: &str = "values";

/// Two parallel mappings over the output keys: how to compute each value, and where
/// to test for its presence.
struct Projection {
    values: Vec<(String, Expr)>,
    presence: Vec<Vec<String>>,
}

impl Projection {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            presence: Vec::new(),
        }
    }

    fn push(&mut self, key: impl Into<String>, value: Expr, presence: Vec<String>) {
        self.values.push((key.into(), value));
        self.presence.push(presence);
    }

    fn into_expr(self) -> Expr {
        Q::object(
            self.values
                .into_iter()
                .zip(self.presence)
                .map(|((key, value), presence)| {
                    let guarded = Q::if_then_else(
                        Q::contains_path(Q::path(presence), Q::var(DOCUMENT_VAR)),
                        value,
                        Q::null(),
                    );
                    (key, guarded)
                }),
        )
    }
}

fn to_path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

impl Model {
    /// The reference of the instance with `id` in this model's collection.
    pub fn ref_from_id(&self, id: &str) -> Expr {
        Q::reference(Q::collection(self.name()), Bson::String(id.to_string()))
    }

    /// Loads the document at `reference` and projects it into an emitted instance.
    pub fn dereference_query(&self, reference: Expr) -> Expr {
        let mut projection = Projection::new();

        projection.push(
            "id",
            Q::select(Q::path([REF_VAR, "id"]), Q::var(DOCUMENT_VAR)),
            to_path(&[REF_VAR]),
        );
        projection.push(
            "ts",
            Q::select(Q::path(["ts"]), Q::var(DOCUMENT_VAR)),
            to_path(&["ts"]),
        );

        for (name, field) in self.fields() {
            projection.push(
                name,
                field.query(self.name(), name),
                field
                    .path(name)
                    .unwrap_or_else(|| to_path(SENTINEL_PATH)),
            );
        }

        Q::let_in(
            [
                (REF_VAR, reference),
                (DOCUMENT_VAR, Q::get(Q::var(REF_VAR))),
            ],
            projection.into_expr(),
        )
    }

    /// Lists emitted instances, either every document of the collection or the entries
    /// of `index` matching `terms`.
    ///
    /// Index entries hold `[sort values..., reference]`; the last element is the
    /// instance that gets dereferenced.
    pub fn paginate_query(&self, index: Option<&str>, terms: Vec<Expr>) -> Expr {
        let (set, reference) = match index {
            Some(index) => (
                Q::match_index(Q::index(index), Q::array(terms)),
                Q::select(
                    Q::subtract([Q::count(Q::var(VALUES_VAR)), Q::literal(1)]),
                    Q::var(VALUES_VAR),
                ),
            ),
            None => (
                Q::documents(Q::collection(self.name())),
                Q::var(VALUES_VAR),
            ),
        };

        Q::select(
            Q::path(["data"]),
            Q::map(
                Q::paginate(set),
                Q::lambda(
                    [VALUES_VAR],
                    Q::let_in([(REF_VAR, reference)], self.dereference_query(Q::var(REF_VAR))),
                ),
            ),
        )
    }
}
