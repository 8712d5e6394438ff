mod common;

use menagerie::{bson::{Bson, doc}, prelude::*};

use common::{deployed, id, models};

fn titles(instance: &Instance, key: &str) -> Vec<String> {
    instance
        .get_array(key)
        .unwrap()
        .iter()
        .map(|job| {
            job.as_document()
                .unwrap()
                .get_str("title")
                .unwrap()
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn references_resolve_to_related_instances() {
    let models = models();
    let database = deployed(&models.all()).await;

    let alice = database
        .zoo(&models.user)
        .create(doc! { "email": "a@x.com", "password": "pw" })
        .await
        .unwrap();
    let job = database
        .zoo(&models.job)
        .create(doc! { "title": "Paint", "owner": id(&alice) })
        .await
        .unwrap();

    let owner = job.get_document("owner").unwrap();
    assert_eq!(owner.get_str("id").unwrap(), id(&alice));
    assert_eq!(owner.get_str("email").unwrap(), "a@x.com");
    assert!(owner.get("password").is_none());
    assert_eq!(job.get("reviewer"), Some(&Bson::Null));
    assert_eq!(job.get_array("volunteers").unwrap().len(), 0);

    let owner_field = models.job.field("owner").unwrap();
    assert_eq!(owner_field.reverse_index_name("owner").unwrap(), "jobs_by_owner");

    let by_owner = database
        .zoo(&models.job)
        .paginate(
            Some("jobs_by_owner"),
            vec![Reference::new("User", id(&alice)).to_bson()],
        )
        .await
        .unwrap();
    assert_eq!(by_owner, vec![job]);
}

#[tokio::test]
async fn relationship_lists_cannot_be_written() {
    let models = models();
    let database = deployed(&models.all()).await;

    let result = database
        .zoo(&models.job)
        .create(doc! { "title": "Paint", "owner": "1", "volunteers": ["2"] })
        .await;

    assert!(matches!(result, Err(ZooError::Validation(_))));
}

#[tokio::test]
async fn reverse_models_list_referencing_instances() {
    let models = models();
    let database = deployed(&models.all()).await;
    let jobs = database.zoo(&models.job);

    let alice = database
        .zoo(&models.user)
        .create(doc! { "email": "a@x.com", "password": "pw" })
        .await
        .unwrap();
    let bob = database
        .zoo(&models.user)
        .create(doc! { "email": "b@x.com", "password": "pw" })
        .await
        .unwrap();

    for (title, owner) in [("Paint", &alice), ("Cook", &bob), ("Clean", &alice)] {
        jobs.create(doc! { "title": title, "owner": id(owner) })
            .await
            .unwrap();
    }

    let owners = models.user.reverse(&models.job, [("jobs", "owner")]).unwrap();
    assert!(owners.is_derived());

    let listed = database.zoo(&owners).get(&id(&alice)).await.unwrap();
    assert_eq!(listed.get_str("email").unwrap(), "a@x.com");
    assert_eq!(titles(&listed, "jobs"), vec!["Clean", "Paint"]);

    let everyone = database.zoo(&owners).paginate(None, Vec::new()).await.unwrap();
    assert_eq!(everyone.len(), 2);
    assert_eq!(titles(&everyone[1], "jobs"), vec!["Cook"]);
}

#[tokio::test]
async fn reversing_requires_a_configured_reverse() {
    let models = models();

    assert!(matches!(
        models.user.reverse(&models.job, [("reviewing", "reviewer")]),
        Err(ZooError::Misuse(_))
    ));
    assert!(matches!(
        models.user.reverse(&models.job, [("titles", "title")]),
        Err(ZooError::Misuse(_))
    ));
    assert!(matches!(
        models.user.reverse(&models.job, [("things", "missing")]),
        Err(ZooError::Misuse(_))
    ));
}

#[tokio::test]
async fn many_to_many_links_read_from_both_sides() {
    let models = models();
    let database = deployed(&models.all()).await;
    let users = database.zoo(&models.user);
    let jobs = database.zoo(&models.job);

    let alice = users
        .create(doc! { "email": "a@x.com", "password": "pw" })
        .await
        .unwrap();
    let bob = users
        .create(doc! { "email": "b@x.com", "password": "pw" })
        .await
        .unwrap();
    let paint = jobs
        .create(doc! { "title": "Paint", "owner": id(&alice) })
        .await
        .unwrap();
    let cook = jobs
        .create(doc! { "title": "Cook", "owner": id(&alice) })
        .await
        .unwrap();

    jobs.link(&id(&paint), "volunteers", &id(&alice)).await.unwrap();
    jobs.link(&id(&paint), "volunteers", &id(&bob)).await.unwrap();
    jobs.link(&id(&cook), "volunteers", &id(&bob)).await.unwrap();

    let paint = jobs.get(&id(&paint)).await.unwrap();
    let emails = paint
        .get_array("volunteers")
        .unwrap()
        .iter()
        .map(|user| user.as_document().unwrap().get_str("email").unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(emails, vec!["b@x.com", "a@x.com"]);

    let volunteers = models
        .user
        .reverse(&models.job, [("volunteering", "volunteers")])
        .unwrap();
    let bob = database.zoo(&volunteers).get(&id(&bob)).await.unwrap();
    assert_eq!(titles(&bob, "volunteering"), vec!["Cook", "Paint"]);

    assert!(matches!(
        jobs.link(&id(&cook), "owner", &id(&alice)).await,
        Err(ZooError::Misuse(_))
    ));
}
