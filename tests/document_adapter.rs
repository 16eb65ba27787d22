use domain_vault::db::models::{Domain, Record, User};
use domain_vault::db::{Db, Document, SchemaManager};
use domain_vault::StorageError;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

fn doc(v: Value) -> Document {
    match v {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

async fn open_db() -> (TempDir, SchemaManager, Db) {
    let dir = tempdir().expect("temp dir");
    let manager = SchemaManager::new(dir.path().join("data").join("adapter.sqlite"));
    let pool = manager.open().await.expect("open database");
    (dir, manager, Db::new(pool))
}

fn admin() -> Document {
    doc(json!({
        "id": "1",
        "name": "Admin User",
        "email": "admin@example.com",
        "role": "admin",
        "status": "active",
        "createdAt": "2023-01-01T00:00:00Z"
    }))
}

fn domain(id: &str) -> Document {
    doc(json!({
        "id": id,
        "name": "example.com",
        "url": "https://example.com",
        "status": "active",
        "createdAt": "2022-01-15T08:30:00Z",
        "updatedAt": "2022-01-15T08:30:00Z"
    }))
}

fn user(id: &str, email: &str, role: &str) -> Document {
    doc(json!({
        "id": id,
        "name": format!("User {id}"),
        "email": email,
        "role": role,
        "status": "active",
        "createdAt": "2023-01-01T00:00:00Z"
    }))
}

#[tokio::test]
async fn users_scenario_insert_find_and_duplicate_email() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");

    assert!(users.find().to_array().await.is_empty());

    let inserted = users.insert_one(&admin()).await.expect("insert admin");
    assert_eq!(inserted.inserted_id, json!("1"));

    let all = users.find().to_array().await;
    assert_eq!(all, vec![admin()]);

    let mut duplicate = admin();
    duplicate.insert("id".into(), json!("2"));
    duplicate.insert("name".into(), json!("Second Admin"));
    let err = users.insert_one(&duplicate).await.unwrap_err();
    assert!(matches!(err, StorageError::Insert { .. }), "{err}");
    assert_eq!(users.find().to_array().await.len(), 1);
}

#[tokio::test]
async fn insert_then_find_one_round_trips() {
    let (_dir, _manager, db) = open_db().await;
    let domains = db.collection("domains");
    let original = domain("d-1");

    domains.insert_one(&original).await.expect("insert domain");
    let found = domains
        .find_one(&doc(json!({"id": "d-1"})))
        .await
        .expect("domain present");
    assert_eq!(found, original);

    let typed = Domain::from_document(found).expect("typed domain");
    assert_eq!(typed.name, "example.com");
    assert_eq!(typed.url.as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn find_one_uses_every_filter_field() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    users.insert_one(&user("u1", "a@example.com", "user")).await.unwrap();
    users.insert_one(&user("u2", "b@example.com", "admin")).await.unwrap();

    let hit = users
        .find_one(&doc(json!({"role": "admin", "status": "active"})))
        .await
        .expect("admin present");
    assert_eq!(hit["id"], json!("u2"));

    let miss = users
        .find_one(&doc(json!({"role": "admin", "email": "a@example.com"})))
        .await;
    assert!(miss.is_none());
}

#[tokio::test]
async fn find_one_with_empty_filter_matches_nothing() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    users.insert_one(&admin()).await.unwrap();

    assert!(users.find_one(&Document::new()).await.is_none());
}

#[tokio::test]
async fn injection_attempts_are_bound_as_data() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    users.insert_one(&admin()).await.unwrap();

    let found = users
        .find_one(&doc(json!({"email": "nobody' OR '1'='1"})))
        .await;
    assert!(found.is_none());

    let err = users
        .delete_one(&doc(json!({"1=1; DROP TABLE users; --": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidIdentifier(_)));
    assert_eq!(users.find().to_array().await.len(), 1);
}

#[tokio::test]
async fn update_one_targets_exactly_one_row() {
    let (_dir, _manager, db) = open_db().await;
    let domains = db.collection("domains");
    domains.insert_one(&domain("a")).await.unwrap();
    domains.insert_one(&domain("b")).await.unwrap();

    let result = domains
        .update_one(&doc(json!({"id": "a"})), &doc(json!({"$set": {"name": "X"}})))
        .await
        .expect("update");
    assert_eq!(result.matched_count, 1);
    assert_eq!(result.modified_count, 1);

    let a = domains.find_one(&doc(json!({"id": "a"}))).await.unwrap();
    let b = domains.find_one(&doc(json!({"id": "b"}))).await.unwrap();
    assert_eq!(a["name"], json!("X"));
    assert_eq!(b, domain("b"));
}

#[tokio::test]
async fn update_one_accepts_a_plain_field_map() {
    let (_dir, _manager, db) = open_db().await;
    let domains = db.collection("domains");
    domains.insert_one(&domain("a")).await.unwrap();

    let result = domains
        .update_one(
            &doc(json!({"id": "a"})),
            &doc(json!({"status": "expired", "url": null})),
        )
        .await
        .expect("update");
    assert_eq!(result.modified_count, 1);

    let a = domains.find_one(&doc(json!({"id": "a"}))).await.unwrap();
    assert_eq!(a["status"], json!("expired"));
    assert_eq!(a["url"], Value::Null);

    let by_null = domains.find_one(&doc(json!({"url": null}))).await.unwrap();
    assert_eq!(by_null["id"], json!("a"));
}

#[tokio::test]
async fn update_one_without_match_reports_zero() {
    let (_dir, _manager, db) = open_db().await;
    let domains = db.collection("domains");
    domains.insert_one(&domain("a")).await.unwrap();

    let result = domains
        .update_one(&doc(json!({"id": "zzz"})), &doc(json!({"$set": {"name": "X"}})))
        .await
        .expect("update");
    assert_eq!(result.matched_count, 0);
    assert_eq!(result.modified_count, 0);
}

#[tokio::test]
async fn update_one_surfaces_constraint_violations() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    users.insert_one(&user("u1", "a@example.com", "user")).await.unwrap();
    users.insert_one(&user("u2", "b@example.com", "user")).await.unwrap();

    let err = users
        .update_one(
            &doc(json!({"id": "u2"})),
            &doc(json!({"$set": {"email": "a@example.com"}})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Update { .. }), "{err}");
}

#[tokio::test]
async fn delete_one_removes_a_single_match() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    users.insert_one(&user("u1", "a@example.com", "user")).await.unwrap();
    users.insert_one(&user("u2", "b@example.com", "user")).await.unwrap();

    let result = users
        .delete_one(&doc(json!({"role": "user"})))
        .await
        .expect("delete");
    assert_eq!(result.deleted_count, 1);
    assert_eq!(users.find().to_array().await.len(), 1);

    let gone = users
        .delete_one(&doc(json!({"role": "admin"})))
        .await
        .expect("delete");
    assert_eq!(gone.deleted_count, 0);
}

#[tokio::test]
async fn empty_filters_are_rejected_without_mutation() {
    let (_dir, _manager, db) = open_db().await;
    let domains = db.collection("domains");
    domains.insert_one(&domain("a")).await.unwrap();
    domains.insert_one(&domain("b")).await.unwrap();

    let err = domains
        .update_one(&Document::new(), &doc(json!({"$set": {"x": 1}})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidFilter(_)));

    let err = domains.delete_one(&Document::new()).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidFilter(_)));

    assert_eq!(
        domains.find().to_array().await,
        vec![domain("a"), domain("b")]
    );
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let (_dir, _manager, db) = open_db().await;
    let domains = db.collection("domains");
    domains.insert_one(&domain("a")).await.unwrap();

    let err = domains
        .update_one(&doc(json!({"id": "a"})), &doc(json!({"$set": {}})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidUpdate(_)));
}

#[tokio::test]
async fn insert_without_id_returns_engine_assigned_id() {
    let (_dir, _manager, db) = open_db().await;
    let notes = db.collection("notes");

    let inserted = notes
        .insert_one(&doc(json!({"content": "Main company domain"})))
        .await
        .expect("insert note");
    let id = inserted.inserted_id.as_str().expect("text id").to_string();
    assert_eq!(id.len(), 36);
    assert_eq!(&id[14..15], "4");

    let note = notes
        .find_one(&doc(json!({"id": id.clone()})))
        .await
        .expect("note present");
    assert_eq!(note["content"], json!("Main company domain"));
    assert!(note["createdAt"].as_str().is_some_and(|s| s.ends_with('Z')));

    let other = notes
        .insert_one(&doc(json!({"content": "second"})))
        .await
        .unwrap();
    assert_ne!(other.inserted_id, json!(id));
}

#[tokio::test]
async fn duplicate_id_never_overwrites() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    users.insert_one(&user("same", "a@example.com", "user")).await.unwrap();

    let err = users
        .insert_one(&user("same", "b@example.com", "admin"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Insert { .. }));

    let kept = users.find_one(&doc(json!({"id": "same"}))).await.unwrap();
    assert_eq!(kept["email"], json!("a@example.com"));
}

#[tokio::test]
async fn seo_analysis_requires_an_existing_domain() {
    let (_dir, _manager, db) = open_db().await;
    let seo = db.collection("seo_analysis");

    let orphan = doc(json!({"id": "s1", "domainId": "missing", "title": "Audit", "score": 82}));
    let err = seo.insert_one(&orphan).await.unwrap_err();
    assert!(matches!(err, StorageError::Insert { .. }), "{err}");

    db.collection("domains").insert_one(&domain("d1")).await.unwrap();
    let linked = doc(json!({"id": "s1", "domainId": "d1", "title": "Audit", "score": 82}));
    seo.insert_one(&linked).await.expect("insert analysis");

    let row = seo.find_one(&doc(json!({"domainId": "d1"}))).await.unwrap();
    assert_eq!(row["score"], json!(82));
}

#[tokio::test]
async fn unknown_columns_fail_the_write() {
    let (_dir, _manager, db) = open_db().await;
    let err = db
        .collection("files")
        .insert_one(&doc(json!({"id": "f1", "name": "a.txt", "owner": "me"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Insert { .. }));
}

#[tokio::test]
async fn reads_on_missing_tables_degrade_to_empty() {
    let (_dir, _manager, db) = open_db().await;
    let links = db.collection("links");

    assert!(links.find().to_array().await.is_empty());
    assert!(links.find_one(&doc(json!({"id": "l1"}))).await.is_none());

    let err = links.insert_one(&doc(json!({"id": "l1"}))).await.unwrap_err();
    assert!(matches!(err, StorageError::Insert { .. }));
}

#[tokio::test]
async fn find_cursor_rereads_on_every_collect() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection("users");
    let cursor = users.find();

    users.insert_one(&user("u1", "a@example.com", "user")).await.unwrap();
    assert_eq!(cursor.to_array().await.len(), 1);

    users.insert_one(&user("u2", "b@example.com", "user")).await.unwrap();
    assert_eq!(cursor.to_array().await.len(), 2);
}

#[tokio::test]
async fn typed_records_round_trip_through_documents() {
    let (_dir, _manager, db) = open_db().await;
    let users = db.collection(User::TABLE);
    let alice = User::new("Alice", "alice@example.com", "user");

    let inserted = users
        .insert_one(&alice.to_document().unwrap())
        .await
        .unwrap();
    assert_eq!(inserted.inserted_id, json!(alice.id.clone()));

    let row = users
        .find_one(&doc(json!({"email": "alice@example.com"})))
        .await
        .unwrap();
    assert_eq!(User::from_document(row).unwrap(), alice);
}

#[tokio::test]
async fn nested_values_read_back_as_json_text() {
    let (_dir, _manager, db) = open_db().await;
    let notes = db.collection("notes");

    notes
        .insert_one(&doc(json!({"id": "n1", "content": ["a"]})))
        .await
        .unwrap();
    notes
        .insert_one(&doc(json!({"id": "n2", "content": {"k": 1, "tags": [true]}})))
        .await
        .unwrap();

    let list = notes.find_one(&doc(json!({"id": "n1"}))).await.unwrap();
    assert_eq!(list["content"], json!("[\"a\"]"));
    let object = notes.find_one(&doc(json!({"id": "n2"}))).await.unwrap();
    assert_eq!(object["content"], json!(r#"{"k":1,"tags":[true]}"#));

    // the stored text is also what an exact-match filter compares against
    let by_text = notes
        .find_one(&doc(json!({"content": "[\"a\"]"})))
        .await
        .expect("match on json text");
    assert_eq!(by_text["id"], json!("n1"));
}

#[tokio::test]
async fn booleans_and_floats_follow_column_affinity() {
    let (_dir, _manager, db) = open_db().await;
    let files = db.collection("files");

    for (id, size) in [("f1", json!(true)), ("f2", json!(false)), ("f3", json!(2.5))] {
        files
            .insert_one(&doc(json!({"id": id, "name": id, "size": size})))
            .await
            .unwrap();
    }
    let size_of = |row: Document| row["size"].clone();
    assert_eq!(size_of(files.find_one(&doc(json!({"id": "f1"}))).await.unwrap()), json!(1));
    assert_eq!(size_of(files.find_one(&doc(json!({"id": "f2"}))).await.unwrap()), json!(0));
    assert_eq!(size_of(files.find_one(&doc(json!({"id": "f3"}))).await.unwrap()), json!(2.5));

    // booleans bind as integers, so they also filter as integers
    let flagged = files.find_one(&doc(json!({"size": true}))).await.unwrap();
    assert_eq!(flagged["id"], json!("f1"));

    db.collection("domains").insert_one(&domain("d-1")).await.unwrap();
    let analyses = db.collection("seo_analysis");
    analyses
        .insert_one(&doc(json!({"id": "s1", "domainId": "d-1", "score": 90.0})))
        .await
        .unwrap();
    let row = analyses.find_one(&doc(json!({"id": "s1"}))).await.unwrap();
    assert_eq!(row["score"], json!(90));
    assert_ne!(row["score"], json!(90.0));
}
