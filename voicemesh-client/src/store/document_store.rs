use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// What happened to a document within a subscribed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct DocChange {
    pub kind: DocChangeKind,
    pub doc_id: String,
    /// `Value::Null` for removals.
    pub fields: Value,
}

/// Eventually-consistent document store, the only transport the voice core
/// talks to. No transactions, no cross-document ordering.
///
/// Subscriptions replay the collection's current contents as `Added` changes
/// before streaming live updates, so a late subscriber still observes
/// documents written earlier.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Create-or-replace a document.
    async fn put(&self, path: &str, doc_id: &str, fields: Value) -> Result<(), StoreError>;

    /// Delete a document. Deleting an absent document is not an error.
    async fn delete(&self, path: &str, doc_id: &str) -> Result<(), StoreError>;

    /// Change feed for one collection, in store notification order.
    async fn subscribe(&self, path: &str)
    -> Result<mpsc::UnboundedReceiver<DocChange>, StoreError>;
}
