// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use catalog_app::{
    Document, DocumentId, ItemField, ItemFields, ItemRecord, PRODUCTS_COLLECTION,
    project_snapshot,
};
use catalog_db::{FeedHandle, Store, validate_db_path};
use catalog_testkit::{ProductFaker, chair, temp_db_path};
use std::sync::{Arc, Mutex, mpsc};

fn bootstrapped() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

fn names(documents: &[Document]) -> Result<Vec<String>> {
    documents
        .iter()
        .map(|document| Ok(ItemRecord::from_document(document)?.fields.name))
        .collect()
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/catalog.db").is_ok());
}

#[test]
fn bootstrap_is_idempotent_on_file_database() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;
    }

    let reopened = Store::open(&path)?;
    reopened.bootstrap()?;
    assert_eq!(reopened.count(PRODUCTS_COLLECTION)?, 1);
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.raw_connection().execute_batch(
        "
        CREATE TABLE documents (
          seq INTEGER PRIMARY KEY,
          collection TEXT NOT NULL,
          doc_id TEXT NOT NULL,
          data TEXT NOT NULL
        );
        ",
    )?;

    let error = store
        .bootstrap()
        .expect_err("bootstrap should reject incompatible schema");
    let message = error.to_string();
    assert!(message.contains("missing required columns"), "{message}");
    assert!(message.contains("created_at"), "{message}");
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_database() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);")?;

    let error = store
        .bootstrap()
        .expect_err("bootstrap should reject a database without documents");
    assert!(error.to_string().contains("missing required table `documents`"));
    Ok(())
}

#[test]
fn create_get_update_delete_cycle() -> Result<()> {
    let store = bootstrapped()?;
    let id = store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;

    let loaded = store
        .get(PRODUCTS_COLLECTION, &id)?
        .expect("created document should load");
    assert_eq!(ItemRecord::from_document(&loaded)?.fields, chair());

    let renamed = ItemFields {
        name: "Armchair".to_owned(),
        ..chair()
    };
    store.update(PRODUCTS_COLLECTION, &id, &renamed.to_document_fields()?)?;
    let loaded = store
        .get(PRODUCTS_COLLECTION, &id)?
        .expect("updated document should load");
    assert_eq!(ItemRecord::from_document(&loaded)?.fields.name, "Armchair");

    store.delete(PRODUCTS_COLLECTION, &id)?;
    assert!(store.get(PRODUCTS_COLLECTION, &id)?.is_none());
    assert_eq!(store.count(PRODUCTS_COLLECTION)?, 0);
    Ok(())
}

#[test]
fn missing_documents_fail_actionably() -> Result<()> {
    let store = bootstrapped()?;
    let missing = DocumentId::new("0000000000deadbeef00");

    let error = store
        .update(PRODUCTS_COLLECTION, &missing, &chair().to_document_fields()?)
        .expect_err("update of missing document should fail");
    assert!(error.to_string().contains("choose an existing product"));

    let error = store
        .delete(PRODUCTS_COLLECTION, &missing)
        .expect_err("delete of missing document should fail");
    assert!(error.to_string().contains("not found"));
    Ok(())
}

#[test]
fn list_preserves_creation_order_and_collection_scope() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = ProductFaker::new(11);
    let products = faker.products(6);
    for product in &products {
        store.create(PRODUCTS_COLLECTION, &product.to_document_fields()?)?;
    }
    store.create("archive", &chair().to_document_fields()?)?;

    let listed = store.list(PRODUCTS_COLLECTION)?;
    let expected = products
        .iter()
        .map(|product| product.name.clone())
        .collect::<Vec<_>>();
    assert_eq!(names(&listed)?, expected);
    assert_eq!(store.count("archive")?, 1);
    Ok(())
}

#[test]
fn subscribe_delivers_initial_and_changed_snapshots() -> Result<()> {
    let store = bootstrapped()?;
    store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;

    let (tx, rx) = mpsc::channel::<Vec<Document>>();
    let feed = store.subscribe(
        PRODUCTS_COLLECTION,
        Box::new(move |documents| {
            let _ = tx.send(documents.to_vec());
        }),
    )?;
    assert!(feed.is_active());

    let initial = rx.try_recv()?;
    assert_eq!(names(&initial)?, vec!["Chair".to_owned()]);

    let lamp = ItemFields {
        name: "Lamp".to_owned(),
        ..chair()
    };
    let lamp_id = store.create(PRODUCTS_COLLECTION, &lamp.to_document_fields()?)?;
    assert_eq!(
        names(&rx.try_recv()?)?,
        vec!["Chair".to_owned(), "Lamp".to_owned()]
    );

    store.delete(PRODUCTS_COLLECTION, &lamp_id)?;
    assert_eq!(names(&rx.try_recv()?)?, vec!["Chair".to_owned()]);
    assert!(rx.try_recv().is_err(), "one snapshot per change");
    Ok(())
}

#[test]
fn unsubscribe_stops_delivery() -> Result<()> {
    let store = bootstrapped()?;
    let (tx, rx) = mpsc::channel::<usize>();
    let feed = store.subscribe(
        PRODUCTS_COLLECTION,
        Box::new(move |documents| {
            let _ = tx.send(documents.len());
        }),
    )?;
    assert_eq!(rx.try_recv()?, 0);
    assert_eq!(store.feed_count(), 1);

    feed.unsubscribe();
    assert_eq!(store.feed_count(), 0);

    store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;
    assert!(rx.try_recv().is_err());
    Ok(())
}

fn insert_raw(store: &Store, doc_id: &str, data: &str) -> Result<()> {
    store.raw_connection().execute(
        "INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
         VALUES (?, ?, ?, 'now', 'now')",
        rusqlite::params![PRODUCTS_COLLECTION, doc_id, data],
    )?;
    Ok(())
}

#[test]
fn numeric_like_documents_reach_the_feed_as_records() -> Result<()> {
    let store = bootstrapped()?;
    insert_raw(&store, "a", r#"{"name":"Chair","price":10,"amount":3}"#)?;
    insert_raw(&store, "b", r#"{"name":"Stool","price":10.5,"amount":1}"#)?;
    insert_raw(&store, "c", r#"{"name":"Bench","price":"10","amount":"3"}"#)?;

    let (tx, rx) = mpsc::channel::<Vec<Document>>();
    let _feed = store.subscribe(
        PRODUCTS_COLLECTION,
        Box::new(move |documents| {
            let _ = tx.send(documents.to_vec());
        }),
    )?;
    let (records, rejected) = project_snapshot(&rx.try_recv()?);
    assert!(rejected.is_empty(), "{rejected:?}");
    let prices = records
        .iter()
        .map(|record| record.fields.display(ItemField::Price))
        .collect::<Vec<_>>();
    assert_eq!(prices, vec!["$10.00", "$10.50", "$10.00"]);
    assert_eq!(records[2].fields.amount, 3);
    assert_eq!(records[0].fields.input_value(ItemField::Price), "10");
    Ok(())
}

#[test]
fn non_object_rows_are_skipped_and_feed_keeps_delivering() -> Result<()> {
    let store = bootstrapped()?;
    insert_raw(&store, "bad", "[1,2]")?;
    assert!(store.list(PRODUCTS_COLLECTION)?.is_empty());

    let (tx, rx) = mpsc::channel::<Vec<Document>>();
    let _feed = store.subscribe(
        PRODUCTS_COLLECTION,
        Box::new(move |documents| {
            let _ = tx.send(documents.to_vec());
        }),
    )?;
    assert!(rx.try_recv()?.is_empty());

    store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;
    assert_eq!(names(&rx.try_recv()?)?, vec!["Chair".to_owned()]);
    Ok(())
}

#[test]
fn callback_may_drop_its_own_handle() -> Result<()> {
    let store = bootstrapped()?;
    let slot: Arc<Mutex<Option<FeedHandle>>> = Arc::new(Mutex::new(None));
    let (tx, rx) = mpsc::channel::<usize>();
    let callback_slot = Arc::clone(&slot);
    let handle = store.subscribe(
        PRODUCTS_COLLECTION,
        Box::new(move |documents| {
            let _ = tx.send(documents.len());
            let taken = callback_slot.lock().expect("slot lock").take();
            drop(taken);
        }),
    )?;
    assert_eq!(rx.try_recv()?, 0);
    *slot.lock().expect("slot lock") = Some(handle);

    store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;
    assert_eq!(rx.try_recv()?, 1);
    assert_eq!(store.feed_count(), 0);

    store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn dropping_store_deactivates_handle() -> Result<()> {
    let store = bootstrapped()?;
    let feed = store.subscribe(PRODUCTS_COLLECTION, Box::new(|_| {}))?;
    drop(store);
    assert!(!feed.is_active());
    assert_eq!(feed.collection(), PRODUCTS_COLLECTION);
    Ok(())
}

#[test]
fn seed_demo_data_populates_collection() -> Result<()> {
    let store = bootstrapped()?;
    let inserted = store.seed_demo_data(PRODUCTS_COLLECTION)?;
    assert!(inserted > 0);

    let documents = store.list(PRODUCTS_COLLECTION)?;
    assert_eq!(documents.len(), inserted);
    for document in &documents {
        let record = ItemRecord::from_document(document)?;
        assert!(!record.fields.name.is_empty());
        assert!(!record.fields.category.is_empty());
    }
    Ok(())
}

#[test]
fn invalid_collection_name_is_rejected() -> Result<()> {
    let store = bootstrapped()?;
    let error = store
        .list("products; DROP TABLE documents")
        .expect_err("unsafe collection name should fail");
    assert!(error.to_string().contains("letters, digits"));
    Ok(())
}
