use crate::{
    field::{FieldDescriptor, FieldOptions},
    schema::Schema,
};

/// A plain value stored under `data.<field>`.
///
/// # Example
///
/// ```ignore
/// use menagerie::prelude::*;
///
/// let email = ScalarField::new(Schema::String).unique();
/// let password = ScalarField::hidden(Schema::String);
/// let name = ScalarField::new(Schema::String).indexed_by(["-age"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    admit: Schema,
    emit: Schema,
    options: FieldOptions,
}

impl ScalarField {
    /// A field admitted and emitted with the same schema.
    pub fn new(schema: Schema) -> Self {
        Self::with_emit(schema.clone(), schema)
    }

    /// A field whose emitted shape differs from the admitted one.
    pub fn with_emit(admit: Schema, emit: Schema) -> Self {
        Self {
            admit,
            emit,
            options: FieldOptions::default(),
        }
    }

    /// A write-only field: stored, but never emitted.
    pub fn hidden(admit: Schema) -> Self {
        Self::with_emit(admit, Schema::Hidden)
    }

    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    /// Indexes the field with entries ordered newest first.
    pub fn indexed(mut self) -> Self {
        self.options.indexed = Some(default_sort());
        self
    }

    /// Indexes the field with entries ordered by `sort` (`-` prefix for descending).
    pub fn indexed_by<S: Into<String>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.options.indexed = Some(sort.into_iter().map(Into::into).collect());
        self
    }

    pub fn singular(mut self, singular: impl Into<String>) -> Self {
        self.options.singular = Some(singular.into());
        self
    }
}

pub(crate) fn default_sort() -> Vec<String> {
    crate::index::DEFAULT_SORT
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl FieldDescriptor for ScalarField {
    fn admit(&self) -> Schema {
        self.admit.clone()
    }

    fn emit(&self) -> Schema {
        self.emit.clone()
    }

    fn options(&self) -> &FieldOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::{IndexDefinition, IndexTerm, IndexValue},
        query::{Expr, Q},
    };
    use bson::Bson;

    #[test]
    fn reads_its_data_path_tolerantly() {
        let field = ScalarField::new(Schema::String);

        assert_eq!(
            field.query("_doesnt_matter", "test_field"),
            Q::select_or(
                Q::path(["data", "test_field"]),
                Q::var("document"),
                Q::null()
            )
        );
        assert_eq!(
            field.path("test_field"),
            Some(vec!["data".to_string(), "test_field".to_string()])
        );
    }

    #[test]
    fn builds_no_index_without_options() {
        let field = ScalarField::new(Schema::String);

        assert!(field.index("Job", "admin").is_empty());
        assert!(field.deconstruct("Job", "admin").is_empty());
    }

    #[test]
    fn builds_a_unique_index() {
        let field = ScalarField::new(Schema::String).unique();

        assert!(field.construct("TestModel", "test_field").is_empty());
        assert_eq!(
            field.index("TestModel", "test_field"),
            vec![Q::create_index(IndexDefinition {
                name: "TestModel_by_test_field".into(),
                source: "TestModel".into(),
                terms: vec![IndexTerm::new(["data", "test_field"])],
                values: vec![IndexValue::reversed(["ts"]), IndexValue::reference()],
                unique: Some(true),
            })]
        );
        assert_eq!(
            field.deconstruct("TestModel", "test_field"),
            vec![Q::delete(Q::index("TestModel_by_test_field"))]
        );
    }

    #[test]
    fn builds_a_sorted_index() {
        let field = ScalarField::new(Schema::String).indexed_by(["-ts", "-name"]);

        assert_eq!(
            field.index("TestModel", "test_field"),
            vec![Q::create_index(IndexDefinition {
                name: "TestModel_by_test_field".into(),
                source: "TestModel".into(),
                terms: vec![IndexTerm::new(["data", "test_field"])],
                values: vec![
                    IndexValue::reversed(["ts"]),
                    IndexValue::reversed(["data", "name"]),
                    IndexValue::reference(),
                ],
                unique: Some(false),
            })]
        );
    }

    #[test]
    fn indexed_defaults_to_newest_first() {
        let field = ScalarField::new(Schema::String).indexed();
        let Expr::CreateIndex(definition) = &field.index("TestModel", "test_field")[0] else {
            panic!("expected an index");
        };

        assert_eq!(
            definition.values,
            vec![IndexValue::reversed(["ts"]), IndexValue::reference()]
        );
    }

    #[test]
    fn index_values_start_with_the_sort_and_end_with_the_reference() {
        let field = ScalarField::new(Schema::String).indexed_by(["-age"]);
        let indexes = field.index("pets", "name");
        let Expr::CreateIndex(definition) = &indexes[0] else {
            panic!("expected an index");
        };

        assert_eq!(indexes.len(), 1);
        assert_eq!(definition.values.first(), Some(&IndexValue::reversed(["data", "age"])));
        assert_eq!(definition.values.last(), Some(&IndexValue::new(["ref"])));
    }

    #[test]
    fn plain_fields_admit_and_emit_alike() {
        let field = ScalarField::new(Schema::Number);

        for value in [Bson::Int32(3), Bson::String("3".into()), Bson::Null] {
            assert_eq!(field.admit().accepts(&value), field.emit().accepts(&value));
        }
    }

    #[test]
    fn hidden_fields_emit_nothing() {
        let field = ScalarField::hidden(Schema::String);
        let value = Bson::String("hunter2".into());

        assert_eq!(field.admit().parse(&value), Ok(value.clone()));
        assert_eq!(field.emit().parse(&value), Ok(Bson::Null));
    }
}
