use crate::error::StoreError;
use crate::store::{DocChange, DocChangeKind, DocumentStore};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

#[derive(Default)]
struct Collection {
    docs: BTreeMap<String, Value>,
    subscribers: Vec<mpsc::UnboundedSender<DocChange>>,
}

impl Collection {
    fn notify(&mut self, change: DocChange) {
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

/// In-process [`DocumentStore`]: one entry per collection path. Backs tests
/// and same-process demos; a hosted store plugs in behind the same trait.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, path: &str, doc_id: &str, fields: Value) -> Result<(), StoreError> {
        let mut collection = self.collections.entry(path.to_owned()).or_default();

        let kind = if collection.docs.contains_key(doc_id) {
            DocChangeKind::Modified
        } else {
            DocChangeKind::Added
        };
        collection.docs.insert(doc_id.to_owned(), fields.clone());

        collection.notify(DocChange {
            kind,
            doc_id: doc_id.to_owned(),
            fields,
        });
        Ok(())
    }

    async fn delete(&self, path: &str, doc_id: &str) -> Result<(), StoreError> {
        let Some(mut collection) = self.collections.get_mut(path) else {
            return Ok(());
        };

        if collection.docs.remove(doc_id).is_some() {
            collection.notify(DocChange {
                kind: DocChangeKind::Removed,
                doc_id: doc_id.to_owned(),
                fields: Value::Null,
            });
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        path: &str,
    ) -> Result<mpsc::UnboundedReceiver<DocChange>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut collection = self.collections.entry(path.to_owned()).or_default();

        // Replay under the same guard that registers the subscriber, so no
        // concurrent put can slip between snapshot and registration.
        for (doc_id, fields) in &collection.docs {
            let _ = tx.send(DocChange {
                kind: DocChangeKind::Added,
                doc_id: doc_id.clone(),
                fields: fields.clone(),
            });
        }
        collection.subscribers.push(tx);

        Ok(rx)
    }
}
