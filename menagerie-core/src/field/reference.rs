use std::sync::Arc;

use crate::{
    field::{FieldDescriptor, FieldOptions, RelationOptions, Reversible, data_path},
    index::{IndexDefinition, IndexTerm, IndexValue, sort_to_values},
    model::{DOCUMENT_VAR, Model},
    query::{Expr, Q},
    schema::Schema,
};

/// A reference to one instance of another model, stored under `data.<field>`.
///
/// Written as the related instance's id; read back as the fully dereferenced related
/// instance. With [`reverse`](Self::reverse) set, an index is built so the related
/// model can list the instances pointing at it.
#[derive(Debug, Clone)]
pub struct RefField {
    related: Arc<Model>,
    optional: bool,
    relation: RelationOptions,
    options: FieldOptions,
}

impl RefField {
    /// A required reference to `related`.
    pub fn new(related: &Arc<Model>) -> Self {
        Self {
            related: Arc::clone(related),
            optional: false,
            relation: RelationOptions::default(),
            options: FieldOptions::default(),
        }
    }

    /// A reference to `related` that may be absent.
    pub fn optional(related: &Arc<Model>) -> Self {
        Self {
            optional: true,
            ..Self::new(related)
        }
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Names the inverse relation on the related model.
    pub fn reverse(mut self, reverse: impl Into<String>) -> Self {
        self.relation.reverse = Some(reverse.into());
        self
    }

    pub fn reverse_index_name(mut self, name: impl Into<String>) -> Self {
        self.relation.reverse_index_name = Some(name.into());
        self
    }

    /// Orders the reverse index entries.
    pub fn sort<S: Into<String>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.relation.sort = Some(sort.into_iter().map(Into::into).collect());
        self
    }

    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.options.indexed = Some(super::scalar::default_sort());
        self
    }

    pub fn indexed_by<S: Into<String>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.options.indexed = Some(sort.into_iter().map(Into::into).collect());
        self
    }

    pub fn singular(mut self, singular: impl Into<String>) -> Self {
        self.options.singular = Some(singular.into());
        self
    }

    fn reverse_index(&self, model_name: &str, field_name: &str) -> Option<IndexDefinition> {
        let name = Reversible::reverse_index_name(self, field_name).ok()?;

        let mut values = sort_to_values(self.relation.sort.as_deref());
        values.push(IndexValue::reference());

        Some(IndexDefinition {
            name,
            source: model_name.to_string(),
            terms: vec![IndexTerm::new(data_path(field_name))],
            values,
            unique: None,
        })
    }
}

impl Reversible for RefField {
    fn related(&self) -> &Arc<Model> {
        &self.related
    }

    fn relation(&self) -> &RelationOptions {
        &self.relation
    }
}

impl FieldDescriptor for RefField {
    fn admit(&self) -> Schema {
        let schema = Schema::Reference(self.related.name().to_string());
        if self.optional {
            schema.optional()
        } else {
            schema
        }
    }

    fn emit(&self) -> Schema {
        let schema = self.related.emit();
        if self.optional {
            schema.optional()
        } else {
            schema
        }
    }

    fn options(&self) -> &FieldOptions {
        &self.options
    }

    fn query(&self, _model_name: &str, field_name: &str) -> Expr {
        let stored = Q::select(Q::path(data_path(field_name)), Q::var(DOCUMENT_VAR));
        let dereferenced = self.related.dereference_query(stored);

        if self.optional {
            Q::if_then_else(
                Q::contains_path(Q::path(data_path(field_name)), Q::var(DOCUMENT_VAR)),
                dereferenced,
                Q::null(),
            )
        } else {
            dereferenced
        }
    }

    fn index(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        let mut indexes = self
            .options
            .own_index(model_name, field_name)
            .map(Q::create_index)
            .into_iter()
            .collect::<Vec<_>>();

        if let Some(reverse) = self.reverse_index(model_name, field_name) {
            indexes.push(Q::create_index(reverse));
        }

        indexes
    }

    fn deconstruct(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        let mut statements = Vec::new();

        if self.options.has_index() {
            statements.push(Q::delete(Q::index(super::own_index_name(
                model_name, field_name,
            ))));
        }
        if let Ok(name) = Reversible::reverse_index_name(self, field_name) {
            statements.push(Q::delete(Q::index(name)));
        }

        statements
    }
}
