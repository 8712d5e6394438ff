mod common;

use menagerie::{bson::{Bson, doc}, prelude::*};
use serde::Deserialize;

use common::{deployed, id, models};

#[tokio::test]
async fn creates_and_reads_back_instances() {
    let models = models();
    let database = deployed(&models.all()).await;
    let users = database.zoo(&models.user);

    let alice = users
        .create(doc! { "email": "alice@example.com", "password": "hunter2" })
        .await
        .unwrap();

    assert_eq!(alice.get_str("email").unwrap(), "alice@example.com");
    assert!(alice.get("password").is_none());
    assert_eq!(alice.get("nickname"), Some(&Bson::Null));
    assert!(matches!(alice.get("ts"), Some(Bson::Int64(_))));

    let again = users.get(&id(&alice)).await.unwrap();
    assert_eq!(again, alice);
}

#[tokio::test]
async fn rejects_invalid_data_before_writing() {
    let models = models();
    let database = deployed(&models.all()).await;
    let users = database.zoo(&models.user);

    let missing_password = users.create(doc! { "email": "a@x.com" }).await;
    assert!(matches!(missing_password, Err(ZooError::Validation(_))));

    assert!(users.paginate(None, Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn updates_are_partial_and_null_removes() {
    let models = models();
    let database = deployed(&models.all()).await;
    let users = database.zoo(&models.user);

    let alice = users
        .create(doc! { "email": "a@x.com", "password": "pw", "nickname": "Al" })
        .await
        .unwrap();
    let alice_id = id(&alice);

    let renamed = users
        .update(&alice_id, doc! { "email": "b@x.com" })
        .await
        .unwrap();
    assert_eq!(renamed.get_str("email").unwrap(), "b@x.com");
    assert_eq!(renamed.get_str("nickname").unwrap(), "Al");
    assert!(renamed.get_i64("ts").unwrap() > alice.get_i64("ts").unwrap());

    let cleared = users
        .update(&alice_id, doc! { "nickname": null })
        .await
        .unwrap();
    assert_eq!(cleared.get("nickname"), Some(&Bson::Null));

    assert!(matches!(
        users.update(&alice_id, doc! { "email": 3 }).await,
        Err(ZooError::Validation(_))
    ));
}

#[tokio::test]
async fn updates_cannot_clear_required_fields() {
    let models = models();
    let database = deployed(&models.all()).await;
    let users = database.zoo(&models.user);

    let alice = users
        .create(doc! { "email": "a@x.com", "password": "pw" })
        .await
        .unwrap();
    let alice_id = id(&alice);

    assert!(matches!(
        users.update_query(&alice_id, &doc! { "email": null }),
        Err(ZooError::Validation(_))
    ));
    assert!(matches!(
        users.update(&alice_id, doc! { "email": null }).await,
        Err(ZooError::Validation(_))
    ));

    let unchanged = users.get(&alice_id).await.unwrap();
    assert_eq!(unchanged, alice);
}

#[tokio::test]
async fn instances_always_carry_their_own_id_and_ts() {
    for reserved in ["id", "ts"] {
        let result = Model::builder("Thing")
            .field(reserved, Schema::String)
            .build();

        assert!(matches!(result, Err(ZooError::Misuse(_))));
    }
}

#[tokio::test]
async fn deleted_instances_are_gone() {
    let models = models();
    let database = deployed(&models.all()).await;
    let users = database.zoo(&models.user);

    let alice = users
        .create(doc! { "email": "a@x.com", "password": "pw" })
        .await
        .unwrap();
    users.delete(&id(&alice)).await.unwrap();

    assert_eq!(users.get(&id(&alice)).await, Err(ZooError::InstanceNotFound));
    assert_eq!(users.delete(&id(&alice)).await, Err(ZooError::InstanceNotFound));
}

#[tokio::test]
async fn unique_fields_look_up_one_instance() {
    let models = models();
    let database = deployed(&models.all()).await;
    let pets = database.zoo(&models.pet);

    let rex = pets
        .create(doc! { "name": "Rex", "kind": "Dog", "age": 3 })
        .await
        .unwrap();

    assert_eq!(pets.get_by("name", "Rex").await.unwrap(), Some(rex));
    assert_eq!(pets.get_by("name", "Tom").await.unwrap(), None);
    assert_eq!(
        pets.create(doc! { "name": "Rex", "kind": "Cat", "age": 1 }).await,
        Err(ZooError::InstanceNotUnique)
    );
    assert!(matches!(
        pets.get_by("kind", "Dog").await,
        Err(ZooError::Misuse(_))
    ));
}

#[tokio::test]
async fn indexed_fields_list_in_index_order() {
    let models = models();
    let database = deployed(&models.all()).await;
    let pets = database.zoo(&models.pet);

    for (name, kind, age) in [("Rex", "Dog", 5), ("Tom", "Cat", 7), ("Fido", "Dog", 2), ("Max", "Dog", 9)] {
        pets.create(doc! { "name": name, "kind": kind, "age": age })
            .await
            .unwrap();
    }

    let dogs = pets
        .paginate_by("kind", "Dog")
        .await
        .unwrap()
        .iter()
        .map(|pet| pet.get_str("name").unwrap().to_string())
        .collect::<Vec<_>>();

    assert_eq!(dogs, vec!["Fido", "Rex", "Max"]);
    assert!(pets.paginate_by("kind", "Fish").await.unwrap().is_empty());
    assert!(matches!(
        pets.paginate_by("name", "Rex").await,
        Err(ZooError::Misuse(_))
    ));
    assert!(matches!(
        pets.paginate_by("age", 5).await,
        Err(ZooError::Misuse(_))
    ));
}

#[tokio::test]
async fn lists_every_instance_in_insertion_order() {
    let models = models();
    let database = deployed(&models.all()).await;
    let pets = database.zoo(&models.pet);

    for name in ["A", "B", "C"] {
        pets.create(doc! { "name": name, "kind": "Cat", "age": 1 })
            .await
            .unwrap();
    }

    let names = pets
        .paginate(None, Vec::new())
        .await
        .unwrap()
        .iter()
        .map(|pet| pet.get_str("name").unwrap().to_string())
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["A", "B", "C"]);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Pet {
    id: String,
    name: String,
    kind: String,
    age: i32,
}

#[tokio::test]
async fn deserializes_instances() {
    let models = models();
    let database = deployed(&models.all()).await;
    let pets = database.zoo(&models.pet);

    let rex = pets
        .create(doc! { "name": "Rex", "kind": "Dog", "age": 3 })
        .await
        .unwrap();

    let typed: Pet = pets.get_as(&id(&rex)).await.unwrap();
    assert_eq!(
        typed,
        Pet {
            id: id(&rex),
            name: "Rex".into(),
            kind: "Dog".into(),
            age: 3,
        }
    );

    let listed: Vec<Pet> = pets.paginate_as(None, Vec::new()).await.unwrap();
    assert_eq!(listed, vec![typed]);
}

#[tokio::test]
async fn documents_written_before_a_field_existed_still_read() {
    let models = models();
    let database = deployed(&models.all()).await;

    let v1 = Model::builder("Pet")
        .field("name", ScalarField::new(Schema::String).unique())
        .build()
        .unwrap();
    let rex = database
        .zoo(&v1)
        .create(doc! { "name": "Rex" })
        .await
        .unwrap();

    let v2 = Model::builder("Pet")
        .field("name", ScalarField::new(Schema::String).unique())
        .field("owner", RefField::optional(&models.user))
        .field("nickname", Schema::String.optional())
        .build()
        .unwrap();
    let read = database.zoo(&v2).get(&id(&rex)).await.unwrap();

    assert_eq!(read.get_str("name").unwrap(), "Rex");
    assert_eq!(read.get("owner"), Some(&Bson::Null));
    assert_eq!(read.get("nickname"), Some(&Bson::Null));
}
