//! The manager binding one model to one client.
//!
//! Every `*_query` method is pure: it validates its input and builds an expression
//! without touching the database. The bare-named methods dispatch that expression,
//! then parse the result through the model's emit schema.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use menagerie::prelude::*;
//!
//! let users = database.zoo(&user_model);
//!
//! let alice = users.create(doc! { "email": "a@x.com" }).await?;
//! let id = alice.get_str("id")?;
//!
//! let again = users.get(id).await?;
//! let by_email = users.get_by("email", "a@x.com").await?;
//! ```

use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::{
    client::Client,
    error::{ZooError, ZooResult},
    field::{Field, FieldDescriptor, Reversible, own_index_name},
    model::Model,
    query::{Expr, Q},
    value::{Instance, Reference, from_instance},
};

/// Creates, reads, updates and deletes instances of one model.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the client reference
/// * `C` - The client type
#[derive(Debug)]
pub struct Zoo<'a, C: Client + ?Sized> {
    model: Arc<Model>,
    client: &'a C,
}

impl<'a, C: Client + ?Sized> Zoo<'a, C> {
    pub fn new(model: &Arc<Model>, client: &'a C) -> Self {
        Self {
            model: Arc::clone(model),
            client,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn ref_from_id(&self, id: &str) -> Expr {
        self.model.ref_from_id(id)
    }

    pub fn dereference_query(&self, reference: Expr) -> Expr {
        self.model.dereference_query(reference)
    }

    pub fn get_query(&self, id: &str) -> Expr {
        self.dereference_query(self.ref_from_id(id))
    }

    pub fn paginate_query(&self, index: Option<&str>, terms: Vec<Expr>) -> Expr {
        self.model.paginate_query(index, terms)
    }

    /// Looks up the field's own unique index.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field does not exist or is not unique.
    pub fn get_by_query(&self, field_name: &str, term: impl Into<Bson>) -> ZooResult<Expr> {
        let field = self.field(field_name)?;
        if !field.options().unique {
            return Err(ZooError::Misuse(format!(
                "Field {field_name} is not unique"
            )));
        }

        Ok(self.own_index_query(field_name, term.into()))
    }

    /// Lists the instances whose field equals `term` through the field's own index.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field does not exist, is unique (use
    /// [`get_by`](Self::get_by)) or is not indexed.
    pub fn paginate_by_query(&self, field_name: &str, term: impl Into<Bson>) -> ZooResult<Expr> {
        let field = self.field(field_name)?;
        if field.options().unique {
            return Err(ZooError::Misuse(format!(
                "Field {field_name} is unique, use get_by"
            )));
        }
        if !field.options().has_index() {
            return Err(ZooError::Misuse(format!(
                "Field {field_name} is not indexed"
            )));
        }

        Ok(self.own_index_query(field_name, term.into()))
    }

    /// Validates `data` against the model's admit schema and builds the create.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Validation`] if `data` does not match.
    pub fn create_query(&self, data: &Document) -> ZooResult<Expr> {
        let admitted = self.model.admit().parse_document(data)?;

        Ok(Q::create(
            Q::collection(self.model.name()),
            Q::object([("data", Q::literal(admitted))]),
        ))
    }

    /// Validates `data` against the relaxed admit schema and builds a partial update.
    /// Keys set to null are removed from the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Validation`] if `data` does not match.
    pub fn update_query(&self, id: &str, data: &Document) -> ZooResult<Expr> {
        let admitted = self.model.admit().partial().parse_document(data)?;

        Ok(Q::update(
            self.ref_from_id(id),
            Q::object([("data", Q::literal(admitted))]),
        ))
    }

    pub fn delete_query(&self, id: &str) -> Expr {
        Q::delete(self.ref_from_id(id))
    }

    /// Builds the join row linking instance `id` to `related_id` through a
    /// many-to-many field.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field does not exist or is not many-to-many.
    pub fn link_query(&self, id: &str, field_name: &str, related_id: &str) -> ZooResult<Expr> {
        match self.field(field_name)? {
            Field::ManyToMany(field) => {
                let related = Reversible::related(field);
                Ok(field.link_query(
                    self.model.name(),
                    field_name,
                    self.ref_from_id(id),
                    related.ref_from_id(related_id),
                ))
            }
            _ => Err(ZooError::Misuse(format!(
                "Field {field_name} is not a many-to-many relationship"
            ))),
        }
    }

    /// Reads the instance with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::InstanceNotFound`] if there is no such instance.
    pub async fn get(&self, id: &str) -> ZooResult<Instance> {
        let raw = self.dispatch("get", self.get_query(id)).await?;
        self.parse_instance(&raw)
    }

    /// Reads the instance at `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::InstanceNotFound`] if there is no such instance.
    pub async fn dereference(&self, reference: &Reference) -> ZooResult<Instance> {
        let query = self.dereference_query(reference.clone().into());
        let raw = self.dispatch("dereference", query).await?;
        self.parse_instance(&raw)
    }

    /// Lists every instance, or the entries of `index` matching `terms`.
    ///
    /// # Arguments
    ///
    /// * `index` - Name of an index whose entries end with an instance reference
    /// * `terms` - Values matched against the index terms
    pub async fn paginate(&self, index: Option<&str>, terms: Vec<Bson>) -> ZooResult<Vec<Instance>> {
        let terms = terms.into_iter().map(Q::literal).collect();
        let raw = self
            .dispatch("paginate", self.paginate_query(index, terms))
            .await?;
        self.parse_instances(&raw)
    }

    /// Finds the instance whose unique field equals `term`.
    ///
    /// Returns the first match should several documents share the value.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field is not unique.
    pub async fn get_by(
        &self,
        field_name: &str,
        term: impl Into<Bson>,
    ) -> ZooResult<Option<Instance>> {
        let query = self.get_by_query(field_name, term)?;
        let raw = self.dispatch("get_by", query).await?;

        Ok(self.parse_instances(&raw)?.into_iter().next())
    }

    /// Lists the instances whose indexed field equals `term`, in index order.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field is unique or not indexed.
    pub async fn paginate_by(
        &self,
        field_name: &str,
        term: impl Into<Bson>,
    ) -> ZooResult<Vec<Instance>> {
        let query = self.paginate_by_query(field_name, term)?;
        let raw = self.dispatch("paginate_by", query).await?;
        self.parse_instances(&raw)
    }

    /// Creates an instance and reads it back with its relationships resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Validation`] before dispatching anything if `data` does not
    /// match the admit schema, or [`ZooError::InstanceNotUnique`] on a unique collision.
    pub async fn create(&self, data: Document) -> ZooResult<Instance> {
        let query = self.create_query(&data)?;
        let created = self.dispatch("create", query).await?;
        let reference = stored_reference(&created)?;

        self.dereference(&reference).await
    }

    /// Applies a partial update and reads the instance back.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Validation`] if `data` does not match, or
    /// [`ZooError::InstanceNotFound`] if there is no such instance.
    pub async fn update(&self, id: &str, data: Document) -> ZooResult<Instance> {
        let query = self.update_query(id, &data)?;
        self.dispatch("update", query).await?;

        self.get(id).await
    }

    /// # Errors
    ///
    /// Returns [`ZooError::InstanceNotFound`] if there is no such instance.
    pub async fn delete(&self, id: &str) -> ZooResult<()> {
        self.dispatch("delete", self.delete_query(id)).await?;
        Ok(())
    }

    /// Links instance `id` to `related_id` through a many-to-many field.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Misuse`] if the field is not many-to-many.
    pub async fn link(&self, id: &str, field_name: &str, related_id: &str) -> ZooResult<()> {
        let query = self.link_query(id, field_name, related_id)?;
        self.dispatch("link", query).await?;
        Ok(())
    }

    /// Reads the instance with `id` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::Serialization`] if the instance does not fit `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, id: &str) -> ZooResult<T> {
        from_instance(self.get(id).await?)
    }

    /// Like [`paginate`](Self::paginate), deserializing each instance into `T`.
    pub async fn paginate_as<T: DeserializeOwned>(
        &self,
        index: Option<&str>,
        terms: Vec<Bson>,
    ) -> ZooResult<Vec<T>> {
        self.paginate(index, terms)
            .await?
            .into_iter()
            .map(from_instance)
            .collect()
    }

    fn field(&self, field_name: &str) -> ZooResult<&Field> {
        self.model.field(field_name).ok_or_else(|| {
            ZooError::Misuse(format!(
                "Model {} has no field {field_name}",
                self.model.name()
            ))
        })
    }

    fn own_index_query(&self, field_name: &str, term: Bson) -> Expr {
        let index = own_index_name(self.model.name(), field_name);
        self.paginate_query(Some(&index), vec![Q::literal(term)])
    }

    async fn dispatch(&self, operation: &str, query: Expr) -> ZooResult<Bson> {
        debug!(model = self.model.name(), operation, "dispatching query");
        self.client.query(query).await
    }

    fn parse_instance(&self, raw: &Bson) -> ZooResult<Instance> {
        match self.model.emit().parse(raw)? {
            Bson::Document(instance) => Ok(instance),
            other => Err(ZooError::Serialization(format!(
                "expected an instance, received {other}"
            ))),
        }
    }

    fn parse_instances(&self, raw: &Bson) -> ZooResult<Vec<Instance>> {
        match self.model.emit().array().parse(raw)? {
            Bson::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Bson::Document(instance) => Ok(instance),
                    other => Err(ZooError::Serialization(format!(
                        "expected an instance, received {other}"
                    ))),
                })
                .collect(),
            other => Err(ZooError::Serialization(format!(
                "expected a list of instances, received {other}"
            ))),
        }
    }
}

fn stored_reference(created: &Bson) -> ZooResult<Reference> {
    created
        .as_document()
        .and_then(|document| document.get("ref"))
        .and_then(Reference::from_bson)
        .ok_or_else(|| {
            ZooError::Serialization(format!("create returned no reference: {created}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{ManyToManyField, RefField, ScalarField},
        schema::Schema,
    };
    use async_trait::async_trait;
    use bson::{bson, doc};
    use std::sync::Mutex;

    /// Records every query and answers from a queue of canned responses.
    #[derive(Debug, Default)]
    struct Recorder {
        queries: Mutex<Vec<Expr>>,
        responses: Mutex<Vec<ZooResult<Bson>>>,
    }

    impl Recorder {
        fn answering(responses: Vec<ZooResult<Bson>>) -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into_iter().rev().collect()),
            }
        }

        fn queries(&self) -> Vec<Expr> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Client for Recorder {
        async fn query(&self, expr: Expr) -> ZooResult<Bson> {
            self.queries.lock().unwrap().push(expr);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(Bson::Null))
        }
    }

    fn user() -> Arc<Model> {
        Model::builder("User")
            .field("email", ScalarField::new(Schema::String).unique())
            .field("name", ScalarField::new(Schema::String.optional()).indexed())
            .build()
            .unwrap()
    }

    #[test]
    fn create_query_validates_before_building() {
        let recorder = Recorder::default();
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        assert!(matches!(
            zoo.create_query(&doc! { "name": "Al" }),
            Err(ZooError::Validation(_))
        ));
        assert_eq!(
            zoo.create_query(&doc! { "email": "a@x.com", "extra": 1 }).unwrap(),
            Q::create(
                Q::collection("User"),
                Q::object([("data", Q::literal(doc! { "email": "a@x.com" }))]),
            )
        );
    }

    #[test]
    fn update_query_accepts_partial_data() {
        let recorder = Recorder::default();
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        assert_eq!(
            zoo.update_query("1", &doc! { "name": null }).unwrap(),
            Q::update(
                Q::reference(Q::collection("User"), "1"),
                Q::object([("data", Q::literal(doc! { "name": null }))]),
            )
        );
        assert!(zoo.update_query("1", &doc! { "email": 3 }).is_err());
    }

    #[test]
    fn lookups_check_the_field_options() {
        let recorder = Recorder::default();
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        assert_eq!(
            zoo.get_by_query("email", "a@x.com").unwrap(),
            model.paginate_query(Some("User_by_email"), vec![Q::literal("a@x.com")])
        );
        assert!(matches!(zoo.get_by_query("name", "Al"), Err(ZooError::Misuse(_))));
        assert!(matches!(zoo.paginate_by_query("email", "a"), Err(ZooError::Misuse(_))));
        assert!(matches!(zoo.get_by_query("missing", "a"), Err(ZooError::Misuse(_))));
        assert!(zoo.paginate_by_query("name", "Al").is_ok());
    }

    #[test]
    fn paginate_by_requires_an_index() {
        let recorder = Recorder::default();
        let model = Model::builder("Pet").field("name", Schema::String).build().unwrap();
        let zoo = Zoo::new(&model, &recorder);

        assert!(matches!(zoo.paginate_by_query("name", "Rex"), Err(ZooError::Misuse(_))));
    }

    #[test]
    fn link_query_writes_both_references() {
        let recorder = Recorder::default();
        let volunteer = Model::builder("volunteers").build().unwrap();
        let jobs = Model::builder("jobs")
            .field("title", Schema::String)
            .field("volunteers", ManyToManyField::new(&volunteer).reverse("jobs"))
            .build()
            .unwrap();
        let zoo = Zoo::new(&jobs, &recorder);

        assert_eq!(
            zoo.link_query("1", "volunteers", "2").unwrap(),
            Q::create(
                Q::collection("jobs_volunteers"),
                Q::object([(
                    "data",
                    Q::object([
                        ("jobs_ref", Q::reference(Q::collection("jobs"), "1")),
                        ("volunteers_ref", Q::reference(Q::collection("volunteers"), "2")),
                    ]),
                )]),
            )
        );
        assert!(matches!(zoo.link_query("1", "title", "2"), Err(ZooError::Misuse(_))));
    }

    #[tokio::test]
    async fn create_rereads_through_the_returned_reference() {
        let reference = Reference::new("User", "7");
        let recorder = Recorder::answering(vec![
            Ok(bson!({ "ref": reference.to_bson(), "ts": 1, "data": { "email": "a@x.com" } })),
            Ok(bson!({ "id": "7", "ts": 1, "email": "a@x.com", "name": null })),
        ]);
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        let created = zoo.create(doc! { "email": "a@x.com" }).await.unwrap();

        assert_eq!(created, doc! { "email": "a@x.com", "name": null, "id": "7", "ts": 1 });
        assert_eq!(
            recorder.queries()[1],
            model.dereference_query(reference.into())
        );
    }

    #[tokio::test]
    async fn invalid_data_is_never_dispatched() {
        let recorder = Recorder::default();
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        assert!(zoo.create(doc! {}).await.is_err());
        assert!(recorder.queries().is_empty());
    }

    #[tokio::test]
    async fn client_errors_surface_verbatim() {
        let recorder = Recorder::answering(vec![Err(ZooError::InstanceNotFound)]);
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        assert_eq!(zoo.get("1").await, Err(ZooError::InstanceNotFound));
        assert_eq!(recorder.queries(), vec![zoo.get_query("1")]);
    }

    #[tokio::test]
    async fn get_by_returns_the_first_match_or_none() {
        let recorder = Recorder::answering(vec![
            Ok(bson!([
                { "id": "1", "ts": 1, "email": "a@x.com" },
                { "id": "2", "ts": 2, "email": "a@x.com" }
            ])),
            Ok(bson!([])),
        ]);
        let model = user();
        let zoo = Zoo::new(&model, &recorder);

        let first = zoo.get_by("email", "a@x.com").await.unwrap();
        assert_eq!(first.and_then(|user| user.get("id").cloned()), Some(Bson::from("1")));
        assert_eq!(zoo.get_by("email", "b@x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn emitted_instances_deserialize_into_types() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct User {
            id: String,
            email: String,
        }

        let owner = Model::builder("Owner").build().unwrap();
        let model = Model::builder("User")
            .field("email", Schema::String)
            .field("owner", RefField::optional(&owner))
            .build()
            .unwrap();
        let recorder = Recorder::answering(vec![Ok(bson!([
            { "id": "1", "ts": 1, "email": "a@x.com", "owner": null }
        ]))]);
        let zoo = Zoo::new(&model, &recorder);

        let users = zoo.paginate_as::<User>(None, Vec::new()).await.unwrap();

        assert_eq!(
            users,
            vec![User {
                id: "1".into(),
                email: "a@x.com".into()
            }]
        );
    }
}
