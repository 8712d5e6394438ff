#![allow(dead_code)]

use std::sync::Arc;

use menagerie::prelude::*;

pub struct Models {
    pub user: Arc<Model>,
    pub job: Arc<Model>,
    pub pet: Arc<Model>,
}

impl Models {
    pub fn all(&self) -> Deployment {
        Deployment::new([self.user.clone(), self.job.clone(), self.pet.clone()])
    }
}

pub fn models() -> Models {
    let user = Model::builder("User")
        .field("email", ScalarField::new(Schema::String).unique())
        .field("password", ScalarField::hidden(Schema::String))
        .field("nickname", Schema::String.optional())
        .build()
        .unwrap();

    let job = Model::builder("Job")
        .field("title", Schema::String)
        .field("owner", RefField::new(&user).reverse("jobs"))
        .field("reviewer", RefField::optional(&user))
        .field(
            "volunteers",
            ManyToManyField::new(&user).reverse("volunteering"),
        )
        .build()
        .unwrap();

    let pet = Model::builder("Pet")
        .field("name", ScalarField::new(Schema::String).unique())
        .field(
            "kind",
            ScalarField::new(Schema::enumeration(["Dog", "Cat"])).indexed_by(["age"]),
        )
        .field("age", Schema::Number)
        .build()
        .unwrap();

    Models { user, job, pet }
}

pub async fn client() -> InMemoryClient {
    InMemoryClient::builder()
        .config(ClientConfig::new("secret"))
        .build()
        .await
        .unwrap()
}

pub async fn deployed(deployment: &Deployment) -> Database<InMemoryClient> {
    let client = client().await;
    client.deploy(deployment).await.unwrap();
    Database::new(client)
}

pub fn id(instance: &Instance) -> String {
    instance.get_str("id").unwrap().to_string()
}
