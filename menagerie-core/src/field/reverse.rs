use std::sync::Arc;

use crate::{
    field::{FieldDescriptor, FieldOptions},
    model::{Model, REF_VAR},
    query::{Expr, Q},
    schema::Schema,
};

/// The inverse side of a [`RefField`](super::RefField) or
/// [`ManyToManyField`](super::ManyToManyField), produced by
/// [`Model::reverse`](crate::model::Model::reverse).
///
/// Has no storage of its own: it lists the instances of the other model found through
/// the relationship's reverse index.
#[derive(Debug, Clone)]
pub struct ReverseField {
    related: Arc<Model>,
    index_name: String,
    options: FieldOptions,
}

impl ReverseField {
    pub fn new(related: &Arc<Model>, index_name: impl Into<String>) -> Self {
        Self {
            related: Arc::clone(related),
            index_name: index_name.into(),
            options: FieldOptions::default(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

impl FieldDescriptor for ReverseField {
    fn admit(&self) -> Schema {
        Schema::Never
    }

    fn emit(&self) -> Schema {
        self.related.emit().array()
    }

    fn options(&self) -> &FieldOptions {
        &self.options
    }

    fn query(&self, _model_name: &str, _field_name: &str) -> Expr {
        self.related
            .paginate_query(Some(&self.index_name), vec![Q::var(REF_VAR)])
    }

    fn path(&self, _field_name: &str) -> Option<Vec<String>> {
        None
    }

    fn index(&self, _model_name: &str, _field_name: &str) -> Vec<Expr> {
        Vec::new()
    }

    fn deconstruct(&self, _model_name: &str, _field_name: &str) -> Vec<Expr> {
        Vec::new()
    }
}
