// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use catalog_app::{ItemFields, ItemId, project_snapshot};
use catalog_db::{FeedHandle, Store};
use catalog_tui::InternalEvent;
use std::sync::mpsc::Sender;

pub struct DbRuntime<'a> {
    store: &'a Store,
    collection: String,
    feed: Option<FeedHandle>,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            feed: None,
        }
    }

    #[cfg(test)]
    fn feed_open(&self) -> bool {
        self.feed.as_ref().is_some_and(FeedHandle::is_active)
    }
}

impl catalog_tui::AppRuntime for DbRuntime<'_> {
    fn open_item_feed(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        self.close_item_feed()?;
        let collection = self.collection.clone();
        let handle = self
            .store
            .subscribe(
                &self.collection,
                Box::new(move |documents| {
                    let (records, rejected) = project_snapshot(documents);
                    for (id, error) in rejected {
                        tracing::warn!(collection = %collection, id = %id, %error, "skipped document");
                    }
                    // The receiver is gone once the UI loop has exited.
                    let _ = tx.send(InternalEvent::ItemsChanged(records));
                }),
            )
            .with_context(|| format!("subscribe to {}", self.collection))?;
        self.feed = Some(handle);
        Ok(())
    }

    fn close_item_feed(&mut self) -> Result<()> {
        if let Some(handle) = self.feed.take() {
            handle.unsubscribe();
        }
        Ok(())
    }

    fn create_item(&mut self, fields: &ItemFields) -> Result<ItemId> {
        let id = self
            .store
            .create(&self.collection, &fields.to_document_fields()?)?;
        Ok(id.into())
    }

    fn update_item(&mut self, id: &ItemId, fields: &ItemFields) -> Result<()> {
        self.store.update(
            &self.collection,
            &id.clone().into(),
            &fields.to_document_fields()?,
        )
    }

    fn delete_item(&mut self, id: &ItemId) -> Result<()> {
        self.store.delete(&self.collection, &id.clone().into())
    }
}

#[cfg(test)]
mod tests {
    use super::DbRuntime;
    use anyhow::Result;
    use catalog_app::{ItemFields, ItemRecord, MutationKind, MutationRequest, PRODUCTS_COLLECTION};
    use catalog_db::Store;
    use catalog_testkit::{ProductFaker, chair};
    use catalog_tui::{AppRuntime, InternalEvent};
    use std::sync::mpsc;

    fn bootstrapped() -> Result<Store> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        Ok(store)
    }

    fn next_items(rx: &mpsc::Receiver<InternalEvent>) -> Result<Vec<ItemRecord>> {
        match rx.try_recv()? {
            InternalEvent::ItemsChanged(items) => Ok(items),
            other => anyhow::bail!("expected ItemsChanged, got {other:?}"),
        }
    }

    #[test]
    fn feed_projects_documents_into_records() -> Result<()> {
        let store = bootstrapped()?;
        let mut faker = ProductFaker::new(3);
        let first = faker.product();
        store.create(PRODUCTS_COLLECTION, &first.to_document_fields()?)?;

        let mut runtime = DbRuntime::new(&store, PRODUCTS_COLLECTION);
        let (tx, rx) = mpsc::channel();
        runtime.open_item_feed(tx)?;
        assert!(runtime.feed_open());

        let items = next_items(&rx)?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields, first);
        assert!(items[0].id.is_some());
        Ok(())
    }

    #[test]
    fn mutations_round_trip_through_store_and_feed() -> Result<()> {
        let store = bootstrapped()?;
        let mut runtime = DbRuntime::new(&store, PRODUCTS_COLLECTION);
        let (tx, rx) = mpsc::channel();
        runtime.open_item_feed(tx.clone())?;
        assert!(next_items(&rx)?.is_empty());

        let id = runtime.create_item(&chair())?;
        assert_eq!(next_items(&rx)?[0].id.as_ref(), Some(&id));

        let renamed = ItemFields {
            name: "Stool".to_owned(),
            ..chair()
        };
        runtime.update_item(&id, &renamed)?;
        assert_eq!(next_items(&rx)?[0].fields.name, "Stool");

        runtime.spawn_mutation(&MutationRequest::Delete(id), tx)?;
        assert!(next_items(&rx)?.is_empty());
        assert_eq!(
            rx.try_recv()?,
            InternalEvent::MutationSettled {
                kind: MutationKind::Delete,
                outcome: Ok(()),
            }
        );
        Ok(())
    }

    #[test]
    fn failed_mutation_settles_with_error() -> Result<()> {
        let store = bootstrapped()?;
        let mut runtime = DbRuntime::new(&store, PRODUCTS_COLLECTION);
        let (tx, rx) = mpsc::channel();
        runtime.spawn_mutation(&MutationRequest::Delete("missing".into()), tx)?;
        match rx.try_recv()? {
            InternalEvent::MutationSettled {
                kind: MutationKind::Delete,
                outcome: Err(message),
            } => assert!(message.contains("not found"), "{message}"),
            other => anyhow::bail!("unexpected event {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn undecodable_documents_are_skipped() -> Result<()> {
        let store = bootstrapped()?;
        store.raw_connection().execute(
            "INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
             VALUES ('products', 'bad', '{\"amount\":\"lots\"}', 'now', 'now')",
            [],
        )?;
        store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;

        let mut runtime = DbRuntime::new(&store, PRODUCTS_COLLECTION);
        let (tx, rx) = mpsc::channel();
        runtime.open_item_feed(tx)?;
        let items = next_items(&rx)?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields, chair());
        Ok(())
    }

    #[test]
    fn close_unregisters_feed() -> Result<()> {
        let store = bootstrapped()?;
        let mut runtime = DbRuntime::new(&store, PRODUCTS_COLLECTION);
        let (tx, rx) = mpsc::channel();
        runtime.open_item_feed(tx.clone())?;
        runtime.open_item_feed(tx)?;
        assert_eq!(store.feed_count(), 1, "reopening replaces the feed");
        let _ = next_items(&rx)?;
        let _ = next_items(&rx)?;

        runtime.close_item_feed()?;
        assert_eq!(store.feed_count(), 0);
        assert!(!runtime.feed_open());

        store.create(PRODUCTS_COLLECTION, &chair().to_document_fields()?)?;
        assert!(rx.try_recv().is_err());
        Ok(())
    }
}
