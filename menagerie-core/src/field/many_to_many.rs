use std::sync::Arc;

use crate::{
    field::{FieldDescriptor, FieldOptions, RelationOptions, Reversible},
    index::{CollectionDefinition, IndexDefinition, IndexTerm, IndexValue, sort_to_values},
    model::{Model, REF_VAR},
    query::{Expr, Q},
    schema::Schema,
};

/// A many-to-many relationship stored as rows of a join collection.
///
/// Each join row holds `{<model>_ref, <field>_ref}`. The forward index lists the
/// related instances of one owner; with [`reverse`](Self::reverse) set, a second
/// index lists owners of one related instance. Links are written with
/// [`Zoo::link`](crate::zoo::Zoo::link), never through `create` or `update`.
#[derive(Debug, Clone)]
pub struct ManyToManyField {
    related: Arc<Model>,
    relation: RelationOptions,
    forward_index_name: Option<String>,
    tertiary_table_name: Option<String>,
    options: FieldOptions,
}

impl ManyToManyField {
    pub fn new(related: &Arc<Model>) -> Self {
        Self {
            related: Arc::clone(related),
            relation: RelationOptions::default(),
            forward_index_name: None,
            tertiary_table_name: None,
            options: FieldOptions::default(),
        }
    }

    pub fn reverse(mut self, reverse: impl Into<String>) -> Self {
        self.relation.reverse = Some(reverse.into());
        self
    }

    pub fn reverse_index_name(mut self, name: impl Into<String>) -> Self {
        self.relation.reverse_index_name = Some(name.into());
        self
    }

    pub fn forward_index_name(mut self, name: impl Into<String>) -> Self {
        self.forward_index_name = Some(name.into());
        self
    }

    /// Overrides the join collection name.
    pub fn tertiary_table_name(mut self, name: impl Into<String>) -> Self {
        self.tertiary_table_name = Some(name.into());
        self
    }

    /// Orders the entries of both indexes.
    pub fn sort<S: Into<String>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.relation.sort = Some(sort.into_iter().map(Into::into).collect());
        self
    }

    pub fn singular(mut self, singular: impl Into<String>) -> Self {
        self.options.singular = Some(singular.into());
        self
    }

    /// Name of the join collection.
    pub fn join_collection_name(&self, model_name: &str, field_name: &str) -> String {
        self.tertiary_table_name
            .clone()
            .unwrap_or_else(|| format!("{model_name}_{field_name}"))
    }

    /// Name of the index listing related instances by owner.
    pub fn forward_index(&self, model_name: &str, field_name: &str) -> String {
        self.forward_index_name
            .clone()
            .unwrap_or_else(|| format!("{field_name}_by_{model_name}"))
    }

    /// Creates one join row linking `owner` to `related`.
    pub fn link_query(
        &self,
        model_name: &str,
        field_name: &str,
        owner: Expr,
        related: Expr,
    ) -> Expr {
        Q::create(
            Q::collection(self.join_collection_name(model_name, field_name)),
            Q::object([(
                "data",
                Q::object([
                    (owner_key(model_name), owner),
                    (related_key(field_name), related),
                ]),
            )]),
        )
    }

    fn join_index(
        &self,
        name: String,
        source: String,
        term: &str,
        value: &str,
    ) -> IndexDefinition {
        let mut values = sort_to_values(self.relation.sort.as_deref());
        values.push(IndexValue::new(["data", value]));

        IndexDefinition {
            name,
            source,
            terms: vec![IndexTerm::new(["data", term])],
            values,
            unique: None,
        }
    }
}

fn owner_key(model_name: &str) -> String {
    format!("{model_name}_ref")
}

fn related_key(field_name: &str) -> String {
    format!("{field_name}_ref")
}

impl Reversible for ManyToManyField {
    fn related(&self) -> &Arc<Model> {
        &self.related
    }

    fn relation(&self) -> &RelationOptions {
        &self.relation
    }
}

impl FieldDescriptor for ManyToManyField {
    fn admit(&self) -> Schema {
        Schema::Never
    }

    fn emit(&self) -> Schema {
        self.related.emit().array()
    }

    fn options(&self) -> &FieldOptions {
        &self.options
    }

    fn query(&self, model_name: &str, field_name: &str) -> Expr {
        self.related.paginate_query(
            Some(&self.forward_index(model_name, field_name)),
            vec![Q::var(REF_VAR)],
        )
    }

    fn path(&self, _field_name: &str) -> Option<Vec<String>> {
        None
    }

    fn construct(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        vec![Q::create_collection(CollectionDefinition::new(
            self.join_collection_name(model_name, field_name),
        ))]
    }

    fn index(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        let source = self.join_collection_name(model_name, field_name);
        let owner = owner_key(model_name);
        let related = related_key(field_name);

        let mut indexes = vec![Q::create_index(self.join_index(
            self.forward_index(model_name, field_name),
            source.clone(),
            &owner,
            &related,
        ))];

        if let Ok(name) = Reversible::reverse_index_name(self, field_name) {
            indexes.push(Q::create_index(
                self.join_index(name, source, &related, &owner),
            ));
        }

        indexes
    }

    fn deconstruct(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        let mut statements = vec![Q::delete(Q::index(
            self.forward_index(model_name, field_name),
        ))];

        if let Ok(name) = Reversible::reverse_index_name(self, field_name) {
            statements.push(Q::delete(Q::index(name)));
        }
        statements.push(Q::delete(Q::collection(
            self.join_collection_name(model_name, field_name),
        )));

        statements
    }
}
