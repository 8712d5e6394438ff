//! Field descriptors: how one attribute of a model is admitted, emitted, stored and
//! indexed.
//!
//! Every field kind implements [`FieldDescriptor`]. The provided methods describe a
//! plain stored value under `data.<field>`; relationship kinds override the parts
//! they change. [`Field`] is the closed set of kinds a [`Model`](crate::model::Model)
//! holds.
//!
//! | Kind | Stored | Writable | Emits |
//! |---|---|---|---|
//! | [`ScalarField`] | `data.<field>` | yes | its emit schema |
//! | [`RefField`] | `data.<field>` as a reference | by id | the related instance |
//! | [`ManyToManyField`] | join collection | no | related instances |
//! | [`ReverseField`] | nowhere | no | instances pointing at this one |

mod many_to_many;
mod reference;
mod reverse;
mod scalar;

use std::sync::Arc;

pub use many_to_many::ManyToManyField;
pub use reference::RefField;
pub use reverse::ReverseField;
pub use scalar::ScalarField;

use crate::{
    error::{ZooError, ZooResult},
    index::{IndexDefinition, IndexTerm, IndexValue, sort_to_values},
    model::{DOCUMENT_VAR, Model},
    query::{Expr, Q},
    schema::Schema,
};

/// Options every stored field understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    /// Singular form of the field name, kept as metadata for callers.
    pub singular: Option<String>,
    /// Build a unique index over the field.
    pub unique: bool,
    /// Build a lookup index over the field, its entries ordered by this sort.
    pub indexed: Option<Vec<String>>,
}

impl FieldOptions {
    /// Whether the field gets an index of its own.
    pub fn has_index(&self) -> bool {
        self.unique || self.indexed.is_some()
    }

    fn own_index(&self, model_name: &str, field_name: &str) -> Option<IndexDefinition> {
        if !self.has_index() {
            return None;
        }

        let mut values = sort_to_values(self.indexed.as_deref());
        values.push(IndexValue::reference());

        Some(IndexDefinition {
            name: own_index_name(model_name, field_name),
            source: model_name.to_string(),
            terms: vec![IndexTerm::new(data_path(field_name))],
            values,
            unique: Some(self.unique),
        })
    }
}

/// Relationship options shared by reference and many-to-many fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationOptions {
    /// Name of the inverse relation. Enables the reverse index.
    pub reverse: Option<String>,
    /// Overrides the derived reverse index name.
    pub reverse_index_name: Option<String>,
    /// Order of index entries; defaults to newest first.
    pub sort: Option<Vec<String>>,
}

/// Name of the index a unique or indexed field builds over itself.
pub fn own_index_name(model_name: &str, field_name: &str) -> String {
    format!("{model_name}_by_{field_name}")
}

pub(crate) fn data_path(field_name: &str) -> Vec<String> {
    vec!["data".to_string(), field_name.to_string()]
}

/// The capabilities every field kind provides to its model.
pub trait FieldDescriptor {
    /// Schema accepted when writing this field.
    fn admit(&self) -> Schema;

    /// Schema of the value produced when reading this field.
    fn emit(&self) -> Schema;

    fn options(&self) -> &FieldOptions;

    /// Expression computing the emitted value from the loaded `document` variable.
    fn query(&self, _model_name: &str, field_name: &str) -> Expr {
        Q::select_or(Q::path(data_path(field_name)), Q::var(DOCUMENT_VAR), Q::null())
    }

    /// Where the field lives in a stored document, used to test presence. `None`
    /// means the field has no storage location of its own.
    fn path(&self, field_name: &str) -> Option<Vec<String>> {
        Some(data_path(field_name))
    }

    /// Index creation statements.
    fn index(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        self.options()
            .own_index(model_name, field_name)
            .map(Q::create_index)
            .into_iter()
            .collect()
    }

    /// Auxiliary collections this field needs.
    fn construct(&self, _model_name: &str, _field_name: &str) -> Vec<Expr> {
        Vec::new()
    }

    /// Statements undoing [`construct`](Self::construct) and [`index`](Self::index).
    fn deconstruct(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        if self.options().has_index() {
            vec![Q::delete(Q::index(own_index_name(model_name, field_name)))]
        } else {
            Vec::new()
        }
    }
}

/// A field that participates in a named inverse relation.
pub trait Reversible {
    /// The model on the other side of the relationship.
    fn related(&self) -> &Arc<Model>;

    fn relation(&self) -> &RelationOptions;

    /// Name of the index answering "which rows point at X".
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field has no reverse configured.
    fn reverse_index_name(&self, field_name: &str) -> ZooResult<String> {
        let relation = self.relation();
        match &relation.reverse {
            Some(reverse) => Ok(relation
                .reverse_index_name
                .clone()
                .unwrap_or_else(|| format!("{reverse}_by_{field_name}"))),
            None => Err(ZooError::Misuse(format!(
                "Field {field_name} does not have a reverse"
            ))),
        }
    }
}

/// Every kind of field a model can hold.
#[derive(Debug, Clone)]
pub enum Field {
    Scalar(ScalarField),
    Ref(RefField),
    ManyToMany(ManyToManyField),
    Reverse(ReverseField),
}

impl Field {
    fn descriptor(&self) -> &dyn FieldDescriptor {
        match self {
            Field::Scalar(field) => field,
            Field::Ref(field) => field,
            Field::ManyToMany(field) => field,
            Field::Reverse(field) => field,
        }
    }

    /// The relationship view of this field, if it has one.
    pub fn as_reversible(&self) -> Option<&dyn Reversible> {
        match self {
            Field::Ref(field) => Some(field),
            Field::ManyToMany(field) => Some(field),
            Field::Scalar(_) | Field::Reverse(_) => None,
        }
    }

    /// Shorthand for [`Reversible::reverse_index_name`].
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] for fields that are not relationships or have no
    /// reverse configured.
    pub fn reverse_index_name(&self, field_name: &str) -> ZooResult<String> {
        match self.as_reversible() {
            Some(field) => field.reverse_index_name(field_name),
            None => Err(ZooError::Misuse(format!(
                "Field {field_name} is not a relationship"
            ))),
        }
    }
}

impl FieldDescriptor for Field {
    fn admit(&self) -> Schema {
        self.descriptor().admit()
    }

    fn emit(&self) -> Schema {
        self.descriptor().emit()
    }

    fn options(&self) -> &FieldOptions {
        self.descriptor().options()
    }

    fn query(&self, model_name: &str, field_name: &str) -> Expr {
        self.descriptor().query(model_name, field_name)
    }

    fn path(&self, field_name: &str) -> Option<Vec<String>> {
        self.descriptor().path(field_name)
    }

    fn index(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        self.descriptor().index(model_name, field_name)
    }

    fn construct(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        self.descriptor().construct(model_name, field_name)
    }

    fn deconstruct(&self, model_name: &str, field_name: &str) -> Vec<Expr> {
        self.descriptor().deconstruct(model_name, field_name)
    }
}

impl From<ScalarField> for Field {
    fn from(field: ScalarField) -> Self {
        Field::Scalar(field)
    }
}

impl From<RefField> for Field {
    fn from(field: RefField) -> Self {
        Field::Ref(field)
    }
}

impl From<ManyToManyField> for Field {
    fn from(field: ManyToManyField) -> Self {
        Field::ManyToMany(field)
    }
}

impl From<ReverseField> for Field {
    fn from(field: ReverseField) -> Self {
        Field::Reverse(field)
    }
}

impl From<Schema> for Field {
    fn from(schema: Schema) -> Self {
        Field::Scalar(ScalarField::new(schema))
    }
}
