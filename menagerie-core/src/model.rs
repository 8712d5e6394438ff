//! Models: named entities made of fields, compiled into migration statements and read
//! and write queries.
//!
//! # Example
//!
//! ```ignore
//! use menagerie::prelude::*;
//!
//! let user = Model::builder("User")
//!     .field("email", ScalarField::new(Schema::String).unique())
//!     .field("password", ScalarField::hidden(Schema::String))
//!     .build()?;
//!
//! let job = Model::builder("Job")
//!     .field("title", Schema::String)
//!     .field("owner", RefField::new(&user).reverse("jobs"))
//!     .build()?;
//!
//! // `User` extended with the jobs pointing at each user.
//! let user_with_jobs = user.reverse(&job, [("jobs", "owner")])?;
//! ```

use std::sync::Arc;

use crate::{
    error::{ZooError, ZooResult},
    field::{Field, FieldDescriptor, ReverseField},
    index::CollectionDefinition,
    query::{Expr, Q},
    schema::Schema,
};

/// Variable bound to the reference of the document being projected.
pub const REF_VAR: &str = "ref";

/// Variable bound to the raw document being projected.
pub const DOCUMENT_VAR: &str = "document";

/// A named entity backed by one collection.
///
/// Models are immutable once built and shared behind an [`Arc`] so relationship fields
/// can point at them.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    fields: Vec<(String, Field)>,
    derived: bool,
}

/// Builds a [`Model`] field by field. Insertion order is kept.
#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    fields: Vec<(String, Field)>,
}

impl ModelBuilder {
    /// Adds a field, replacing any earlier field with the same name.
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        insert_field(&mut self.fields, name.into(), field.into());
        self
    }

    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if a field is named `id` or `ts`, which every
    /// emitted instance carries for itself.
    pub fn build(self) -> ZooResult<Arc<Model>> {
        for (name, _) in &self.fields {
            check_field_name(&self.name, name)?;
        }

        Ok(Arc::new(Model {
            name: self.name,
            fields: self.fields,
            derived: false,
        }))
    }
}

/// Keys every emitted instance carries besides its fields.
pub const RESERVED_FIELDS: &[&str] = &["id", "ts"];

fn check_field_name(model_name: &str, field_name: &str) -> ZooResult<()> {
    if RESERVED_FIELDS.contains(&field_name) {
        return Err(ZooError::Misuse(format!(
            "Model {model_name} cannot declare the reserved field {field_name}"
        )));
    }

    Ok(())
}

fn insert_field(fields: &mut Vec<(String, Field)>, name: String, field: Field) {
    match fields.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, slot)) => *slot = field,
        None => fields.push((name, field)),
    }
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Name of the model and of its collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields
            .iter()
            .map(|(name, field)| (name.as_str(), field))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, field)| field)
    }

    /// Whether this model was produced by [`reverse`](Self::reverse) and owns no storage.
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    /// Schema of data accepted by `create`.
    pub fn admit(&self) -> Schema {
        Schema::object(
            self.fields
                .iter()
                .map(|(name, field)| (name.clone(), field.admit())),
        )
    }

    /// Schema of dereferenced instances. Always carries `id` and `ts`.
    pub fn emit(&self) -> Schema {
        let mut fields = self
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.emit()))
            .collect::<Vec<_>>();
        fields.push(("id".to_string(), Schema::String));
        fields.push(("ts".to_string(), Schema::Number));

        Schema::Object(fields)
    }

    /// One atomic batch creating the collection, then every auxiliary collection.
    pub fn construct(&self) -> Expr {
        if self.derived {
            return Q::batch(Vec::new());
        }

        let mut statements = vec![Q::create_collection(CollectionDefinition::new(
            self.name.as_str(),
        ))];
        for (name, field) in &self.fields {
            statements.extend(field.construct(&self.name, name));
        }

        Q::batch(statements)
    }

    /// One atomic batch creating every index. Run after [`construct`](Self::construct).
    pub fn index(&self) -> Expr {
        if self.derived {
            return Q::batch(Vec::new());
        }

        Q::batch(
            self.fields
                .iter()
                .flat_map(|(name, field)| field.index(&self.name, name)),
        )
    }

    /// One atomic batch dropping what the fields built, then the collection itself.
    pub fn deconstruct(&self) -> Expr {
        if self.derived {
            return Q::batch(Vec::new());
        }

        let mut statements = self
            .fields
            .iter()
            .flat_map(|(name, field)| field.deconstruct(&self.name, name))
            .collect::<Vec<_>>();
        statements.push(Q::delete(Q::collection(self.name.as_str())));

        Q::batch(statements)
    }

    /// Extends this model with the inverse side of relationships defined on `other`.
    ///
    /// `mapping` pairs a local field name with the name of the relationship field on
    /// `other` to invert. The result reads like this model plus one list per mapping
    /// entry, and creates no storage of its own.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if a named field does not exist on `other`, is not
    /// a relationship, or has no reverse configured.
    pub fn reverse<L, F>(
        &self,
        other: &Arc<Model>,
        mapping: impl IntoIterator<Item = (L, F)>,
    ) -> ZooResult<Arc<Model>>
    where
        L: Into<String>,
        F: AsRef<str>,
    {
        let mut fields = self.fields.clone();

        for (local, remote) in mapping {
            let remote = remote.as_ref();
            let field = other.field(remote).ok_or_else(|| {
                ZooError::Misuse(format!("Model {} has no field {remote}", other.name))
            })?;
            let index_name = field.reverse_index_name(remote)?;
            let local: String = local.into();
            check_field_name(&self.name, &local)?;

            insert_field(
                &mut fields,
                local,
                ReverseField::new(other, index_name).into(),
            );
        }

        Ok(Arc::new(Model {
            name: self.name.clone(),
            fields,
            derived: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{ManyToManyField, RefField, ScalarField},
        index::{IndexDefinition, IndexTerm, IndexValue},
    };
    use bson::{Bson, bson};

    fn user() -> Arc<Model> {
        Model::builder("User")
            .field("email", ScalarField::new(Schema::String).unique())
            .field("password", ScalarField::hidden(Schema::String))
            .build()
            .unwrap()
    }

    fn job(user: &Arc<Model>) -> Arc<Model> {
        Model::builder("Job")
            .field("title", Schema::String)
            .field("owner", RefField::new(user).reverse("jobs"))
            .build()
            .unwrap()
    }

    #[test]
    fn emit_always_carries_id_and_ts() {
        let model = Model::builder("Empty").build().unwrap();

        assert_eq!(
            model.emit(),
            Schema::object([("id", Schema::String), ("ts", Schema::Number)])
        );
        assert_eq!(model.admit(), Schema::Object(Vec::new()));
    }

    #[test]
    fn admit_and_emit_follow_the_fields() {
        let user = user();
        let emitted = user
            .emit()
            .parse(&bson!({ "id": "1", "ts": 10, "email": "a@x.com", "password": "pw" }))
            .unwrap();

        assert_eq!(
            emitted,
            bson!({ "email": "a@x.com", "id": "1", "ts": 10 })
        );
        assert!(user.admit().accepts(&bson!({ "email": "a@x.com", "password": "pw" })));
        assert!(!user.admit().accepts(&bson!({ "email": "a@x.com" })));
    }

    #[test]
    fn later_fields_replace_earlier_ones() {
        let model = Model::builder("M")
            .field("a", Schema::String)
            .field("a", Schema::Number)
            .build()
            .unwrap();

        assert_eq!(model.fields().count(), 1);
        assert_eq!(model.field("a").map(|field| field.emit()), Some(Schema::Number));
    }

    #[test]
    fn construct_creates_the_collection_first() {
        let volunteer = user();
        let jobs = Model::builder("jobs")
            .field("volunteers", ManyToManyField::new(&volunteer))
            .build()
            .unwrap();

        assert_eq!(
            jobs.construct(),
            Q::batch([
                Q::create_collection(CollectionDefinition::new("jobs")),
                Q::create_collection(CollectionDefinition::new("jobs_volunteers")),
            ])
        );
    }

    #[test]
    fn index_batches_every_field_index() {
        let user = user();

        assert_eq!(
            job(&user).index(),
            Q::batch([Q::create_index(IndexDefinition {
                name: "jobs_by_owner".into(),
                source: "Job".into(),
                terms: vec![IndexTerm::new(["data", "owner"])],
                values: vec![IndexValue::reversed(["ts"]), IndexValue::reference()],
                unique: None,
            })])
        );
    }

    #[test]
    fn deconstruct_drops_dependents_before_the_collection() {
        let user = user();

        assert_eq!(
            user.deconstruct(),
            Q::batch([
                Q::delete(Q::index("User_by_email")),
                Q::delete(Q::collection("User")),
            ])
        );
    }

    #[test]
    fn reverse_adds_a_list_of_the_other_model() {
        let user = user();
        let job = job(&user);
        let derived = user.reverse(&job, [("jobs", "owner")]).unwrap();

        assert!(derived.is_derived());
        assert_eq!(derived.name(), "User");
        assert_eq!(derived.fields().count(), 3);
        assert!(matches!(
            derived.field("jobs"),
            Some(Field::Reverse(field)) if field.index_name() == "jobs_by_owner"
        ));
        assert_eq!(derived.construct(), Q::batch(Vec::new()));
        assert_eq!(derived.index(), Q::batch(Vec::new()));
        assert_eq!(derived.deconstruct(), Q::batch(Vec::new()));
        assert!(derived.admit().accepts(&bson!({ "email": "a", "password": "b" })));
        assert!(!derived.admit().accepts(&bson!({ "email": "a", "password": "b", "jobs": [] })));
    }

    #[test]
    fn reverse_rejects_fields_that_cannot_be_inverted() {
        let user = user();
        let plain = Model::builder("Job")
            .field("title", Schema::String)
            .field("owner", RefField::new(&user))
            .build()
            .unwrap();

        for remote in ["missing", "title", "owner"] {
            assert!(matches!(
                user.reverse(&plain, [("jobs", remote)]),
                Err(ZooError::Misuse(_))
            ));
        }
    }

    #[test]
    fn synthetic_keys_cannot_be_declared() {
        for reserved in ["id", "ts"] {
            assert!(matches!(
                Model::builder("Thing").field(reserved, Schema::String).build(),
                Err(ZooError::Misuse(_))
            ));
        }

        let user = user();
        let job = job(&user);
        assert!(matches!(
            user.reverse(&job, [("id", "owner")]),
            Err(ZooError::Misuse(_))
        ));
    }

    #[test]
    fn ref_fields_admit_ids() {
        let user = user();
        let admitted = job(&user)
            .admit()
            .parse(&bson!({ "title": "Eng", "owner": "1" }))
            .unwrap();
        let Bson::Document(admitted) = admitted else {
            panic!("expected a document");
        };

        assert_eq!(
            admitted.get("owner"),
            Some(&crate::value::Reference::new("User", "1").to_bson())
        );
    }
}
