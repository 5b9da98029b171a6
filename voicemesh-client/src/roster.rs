use crate::error::StoreError;
use crate::store::{DocChange, DocChangeKind, DocumentStore, roster_path};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use voicemesh_core::{ParticipantId, ParticipantRecord, RoomId};

/// Full roster contents after one underlying change.
pub type RosterSnapshot = Vec<ParticipantRecord>;

/// Shared record of who is present in a room. Each participant writes and
/// deletes only its own record; everyone else's state arrives by
/// subscription.
pub struct Roster {
    store: Arc<dyn DocumentStore>,
}

impl Roster {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Upsert the caller's own presence record. Idempotent.
    pub async fn join(&self, room: &RoomId, record: &ParticipantRecord) -> Result<(), StoreError> {
        let fields = serde_json::to_value(record)?;
        self.store
            .put(&roster_path(room), record.uid.as_str(), fields)
            .await
    }

    /// Delete the caller's own record. An already absent record is fine.
    pub async fn leave(&self, room: &RoomId, uid: &ParticipantId) -> Result<(), StoreError> {
        self.store.delete(&roster_path(room), uid.as_str()).await
    }

    /// Stream of roster snapshots, one per document change the store
    /// delivers. Order across rooms is undefined; within one room it is the
    /// store's notification order.
    pub async fn subscribe(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::UnboundedReceiver<RosterSnapshot>, StoreError> {
        let changes = self.store.subscribe(&roster_path(room)).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(translate_changes(changes, tx));
        Ok(rx)
    }
}

async fn translate_changes(
    mut changes: mpsc::UnboundedReceiver<DocChange>,
    tx: mpsc::UnboundedSender<RosterSnapshot>,
) {
    let mut current: BTreeMap<ParticipantId, ParticipantRecord> = BTreeMap::new();

    while let Some(change) = changes.recv().await {
        let uid = ParticipantId::from(change.doc_id);
        match change.kind {
            DocChangeKind::Added | DocChangeKind::Modified => {
                match serde_json::from_value::<ParticipantRecord>(change.fields) {
                    Ok(mut record) => {
                        record.uid = uid.clone();
                        current.insert(uid, record);
                    }
                    Err(e) => {
                        warn!("Ignoring malformed roster record {}: {}", uid, e);
                        continue;
                    }
                }
            }
            DocChangeKind::Removed => {
                if current.remove(&uid).is_none() {
                    continue;
                }
            }
        }

        if tx.send(current.values().cloned().collect()).is_err() {
            debug!("Roster snapshot receiver dropped, stopping translation");
            break;
        }
    }
}
