use crate::error::{NegotiationError, StoreError};
use crate::store::{DocChange, DocChangeKind, DocumentStore, mailbox_path};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use voicemesh_core::{ParticipantId, RoomId, SignalEnvelope, SignalPayload, unix_millis};

/// A message delivered from the local inbox. `doc_id` identifies the backing
/// document so it can be consumed once handled.
#[derive(Debug, Clone)]
pub struct InboxMessage {
    pub doc_id: String,
    pub envelope: SignalEnvelope,
}

/// Directed, transient signaling between two participants of one room.
/// Fire-and-forget: no acknowledgment, no retries, no delivery order. A lost
/// message stalls that one peer negotiation and nothing else.
pub struct Mailbox {
    store: Arc<dyn DocumentStore>,
    local_uid: ParticipantId,
}

impl Mailbox {
    pub fn new(store: Arc<dyn DocumentStore>, local_uid: ParticipantId) -> Self {
        Self { store, local_uid }
    }

    /// Append a payload to `to`'s inbox.
    pub async fn send(
        &self,
        room: &RoomId,
        to: &ParticipantId,
        payload: SignalPayload,
    ) -> Result<(), StoreError> {
        let envelope = SignalEnvelope {
            sender: self.local_uid.clone(),
            created_at: unix_millis(),
            payload,
        };
        let fields = serde_json::to_value(&envelope)?;
        let doc_id = Uuid::new_v4().to_string();
        self.store.put(&mailbox_path(room, to), &doc_id, fields).await
    }

    /// Stream of messages addressed to the local participant. Documents that
    /// fail to decode are deleted on the spot and never surface.
    pub async fn subscribe_inbox(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::UnboundedReceiver<InboxMessage>, StoreError> {
        let path = mailbox_path(room, &self.local_uid);
        let changes = self.store.subscribe(&path).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(translate_inbox(self.store.clone(), path, changes, tx));
        Ok(rx)
    }

    /// Delete a handled message. Runs even when handling failed, so the
    /// inbox cannot grow without bound or replay on the next join.
    pub async fn consume(&self, room: &RoomId, doc_id: &str) -> Result<(), StoreError> {
        self.store
            .delete(&mailbox_path(room, &self.local_uid), doc_id)
            .await
    }
}

async fn translate_inbox(
    store: Arc<dyn DocumentStore>,
    path: String,
    mut changes: mpsc::UnboundedReceiver<DocChange>,
    tx: mpsc::UnboundedSender<InboxMessage>,
) {
    while let Some(change) = changes.recv().await {
        // Removals are our own consumes echoing back; modifications do not
        // happen to write-once signal documents.
        if change.kind != DocChangeKind::Added {
            continue;
        }

        match serde_json::from_value::<SignalEnvelope>(change.fields) {
            Ok(envelope) => {
                let msg = InboxMessage {
                    doc_id: change.doc_id,
                    envelope,
                };
                if tx.send(msg).is_err() {
                    debug!("Inbox receiver dropped, stopping translation");
                    break;
                }
            }
            Err(e) => {
                let err = NegotiationError::Malformed(e);
                warn!("Dropping malformed signal {}: {}", change.doc_id, err);
                if let Err(e) = store.delete(&path, &change.doc_id).await {
                    warn!("Failed to delete malformed signal {}: {}", change.doc_id, e);
                }
            }
        }
    }
}
