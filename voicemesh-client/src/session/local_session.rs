use crate::error::NegotiationError;
use crate::mailbox::{InboxMessage, Mailbox};
use crate::media::MediaController;
use crate::roster::{Roster, RosterSnapshot};
use crate::session::{NegotiationRole, PeerSession, PeerState, SessionCommand, SessionEvent};
use crate::sink::AudioOutputSink;
use crate::transport::{ConnectionWrapper, TransportConfig, TransportEvent};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use voicemesh_core::{ParticipantId, ParticipantRecord, RoomId, SignalPayload};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// Single-threaded coordinator for one joined room. Every roster delta,
/// inbox message, transport notification, and command funnels through one
/// event loop, so peer state is never touched concurrently.
pub struct LocalSession {
    room: RoomId,
    local: ParticipantRecord,
    roster: Roster,
    mailbox: Mailbox,
    media: MediaController,
    sink: AudioOutputSink,
    transport_config: TransportConfig,
    sessions: HashMap<ParticipantId, PeerSession>,
    /// Candidates for peers with no session yet: the mailbox and roster
    /// streams are not ordered relative to each other, and none may be lost.
    orphan_candidates: HashMap<ParticipantId, Vec<RTCIceCandidateInit>>,
    known: BTreeMap<ParticipantId, ParticipantRecord>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    events: broadcast::Sender<SessionEvent>,
}

impl LocalSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room: RoomId,
        local: ParticipantRecord,
        roster: Roster,
        mailbox: Mailbox,
        media: MediaController,
        sink: AudioOutputSink,
        transport_config: TransportConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(256);

        Self {
            room,
            local,
            roster,
            mailbox,
            media,
            sink,
            transport_config,
            sessions: HashMap::new(),
            orphan_candidates: HashMap::new(),
            known: BTreeMap::new(),
            transport_tx,
            transport_rx,
            events,
        }
    }

    pub async fn run(
        mut self,
        mut roster_rx: mpsc::UnboundedReceiver<RosterSnapshot>,
        mut inbox_rx: mpsc::UnboundedReceiver<InboxMessage>,
        mut command_rx: mpsc::Receiver<SessionCommand>,
    ) {
        info!("Voice session started for {} in {}", self.local.uid, self.room);

        let mut leave_reply: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                snapshot = roster_rx.recv() => match snapshot {
                    Some(snapshot) => self.apply_roster(snapshot).await,
                    None => {
                        warn!("Roster subscription ended, leaving {}", self.room);
                        break;
                    }
                },

                msg = inbox_rx.recv() => match msg {
                    Some(msg) => self.handle_inbox(msg).await,
                    None => {
                        warn!("Inbox subscription ended, leaving {}", self.room);
                        break;
                    }
                },

                event = self.transport_rx.recv() => match event {
                    Some(event) => self.handle_transport(event).await,
                    None => break,
                },

                cmd = command_rx.recv() => match cmd {
                    Some(SessionCommand::Leave { reply }) => {
                        leave_reply = Some(reply);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;

        if let Some(reply) = leave_reply {
            let _ = reply.send(());
        }

        info!("Voice session finished for {}", self.local.uid);
    }

    async fn apply_roster(&mut self, snapshot: RosterSnapshot) {
        let mut next = BTreeMap::new();
        for record in snapshot {
            next.insert(record.uid.clone(), record);
        }

        let left: Vec<ParticipantId> = self
            .known
            .keys()
            .filter(|uid| !next.contains_key(*uid))
            .cloned()
            .collect();
        for uid in left {
            if uid == self.local.uid {
                continue;
            }
            debug!("Participant {} left {}", uid, self.room);
            self.destroy_session(&uid).await;
            self.orphan_candidates.remove(&uid);
            let _ = self.events.send(SessionEvent::ParticipantLeft(uid));
        }

        for (uid, record) in &next {
            if *uid == self.local.uid || self.known.contains_key(uid) {
                continue;
            }
            debug!("Participant {} joined {}", uid, self.room);
            let _ = self
                .events
                .send(SessionEvent::ParticipantJoined(record.clone()));
            self.ensure_session(uid.clone()).await;
        }

        self.known = next;
    }

    /// Create the peer session for a uid that appeared in the roster.
    /// Duplicate creation attempts are no-ops; tombstoned sessions stay put
    /// until the uid actually leaves.
    async fn ensure_session(&mut self, uid: ParticipantId) {
        if self.sessions.contains_key(&uid) {
            return;
        }

        let role = NegotiationRole::between(&self.local.uid, &uid);
        if !self.create_session(uid.clone(), role).await {
            return;
        }

        if role == NegotiationRole::Offering {
            self.send_offer(&uid).await;
        }
    }

    async fn create_session(&mut self, uid: ParticipantId, role: NegotiationRole) -> bool {
        let transport = match ConnectionWrapper::new(
            uid.clone(),
            &self.transport_config,
            self.media.local_track(),
            self.transport_tx.clone(),
        )
        .await
        {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Failed to create transport for {}: {}", uid, e);
                return false;
            }
        };

        let mut session = PeerSession::new(uid.clone(), role, transport);
        if let Some(candidates) = self.orphan_candidates.remove(&uid) {
            for candidate in candidates {
                session.queue_candidate(candidate);
            }
        }

        debug!("Created peer session for {} as {:?}", uid, role);
        self.sessions.insert(uid, session);
        true
    }

    async fn send_offer(&mut self, uid: &ParticipantId) {
        let Some(session) = self.sessions.get_mut(uid) else {
            return;
        };

        match session.transport.create_offer().await {
            Ok(sdp) => {
                session.state = PeerState::Negotiating;
                if let Err(e) = self
                    .mailbox
                    .send(&self.room, uid, SignalPayload::Offer { sdp })
                    .await
                {
                    warn!("Failed to send offer to {}: {}", uid, e);
                }
            }
            Err(e) => warn!("Failed to create offer for {}: {}", uid, e),
        }
    }

    async fn handle_inbox(&mut self, msg: InboxMessage) {
        let doc_id = msg.doc_id;
        let sender = msg.envelope.sender;

        self.handle_signal(sender, msg.envelope.payload).await;

        // Consume unconditionally, handled or not: unconsumed documents pile
        // up and replay on the next join.
        if let Err(e) = self.mailbox.consume(&self.room, &doc_id).await {
            warn!("Failed to consume signal {}: {}", doc_id, e);
        }
    }

    async fn handle_signal(&mut self, sender: ParticipantId, payload: SignalPayload) {
        if sender == self.local.uid {
            warn!("Discarding self-addressed signal");
            return;
        }

        let result = match payload {
            SignalPayload::Offer { sdp } => self.handle_offer(&sender, sdp).await,
            SignalPayload::Answer { sdp } => self.handle_answer(&sender, sdp).await,
            SignalPayload::IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                let init = RTCIceCandidateInit {
                    candidate,
                    sdp_mid,
                    sdp_mline_index,
                    ..Default::default()
                };
                self.handle_candidate(sender.clone(), init).await;
                Ok(())
            }
        };

        // A failed negotiation closes that one peer session; the rest of the
        // room is untouched.
        if let Err(e) = result {
            warn!("Negotiation with {} failed: {}", sender, e);
            self.close_session(&sender).await;
        }
    }

    async fn handle_offer(
        &mut self,
        sender: &ParticipantId,
        sdp: String,
    ) -> Result<(), NegotiationError> {
        match self.sessions.get(sender) {
            Some(session) if session.is_closed() => {
                debug!("Discarding offer from closed session {}", sender);
                return Ok(());
            }
            Some(_) => {}
            None => {
                // The offer can outrun the roster delta announcing its
                // sender; answer it anyway.
                if !self
                    .create_session(sender.clone(), NegotiationRole::Answering)
                    .await
                {
                    return Ok(());
                }
            }
        }

        let Some(session) = self.sessions.get_mut(sender) else {
            return Ok(());
        };

        session.transport.set_remote_offer(sdp).await?;
        session.remote_description_set = true;
        session.state = PeerState::Negotiating;

        for candidate in session.take_pending_candidates() {
            if let Err(e) = session.transport.add_ice_candidate(candidate).await {
                warn!("Failed to apply buffered candidate from {}: {}", sender, e);
            }
        }

        let answer = session.transport.create_answer().await?;
        if let Err(e) = self
            .mailbox
            .send(&self.room, sender, SignalPayload::Answer { sdp: answer })
            .await
        {
            warn!("Failed to send answer to {}: {}", sender, e);
        }
        Ok(())
    }

    async fn handle_answer(
        &mut self,
        sender: &ParticipantId,
        sdp: String,
    ) -> Result<(), NegotiationError> {
        let Some(session) = self.sessions.get_mut(sender) else {
            debug!("Discarding answer from unknown peer {}", sender);
            return Ok(());
        };

        let expecting = session.role == NegotiationRole::Offering
            && session.state == PeerState::Negotiating
            && !session.remote_description_set;
        if !expecting {
            debug!("Discarding stale answer from {}", sender);
            return Ok(());
        }

        session.transport.set_remote_answer(sdp).await?;
        session.remote_description_set = true;

        for candidate in session.take_pending_candidates() {
            if let Err(e) = session.transport.add_ice_candidate(candidate).await {
                warn!("Failed to apply buffered candidate from {}: {}", sender, e);
            }
        }
        Ok(())
    }

    async fn handle_candidate(&mut self, sender: ParticipantId, candidate: RTCIceCandidateInit) {
        match self.sessions.get_mut(&sender) {
            Some(session) if session.is_closed() => {
                debug!("Discarding candidate for closed session {}", sender);
            }
            Some(session) if session.remote_description_set => {
                if let Err(e) = session.transport.add_ice_candidate(candidate).await {
                    warn!("Failed to apply candidate from {}: {}", sender, e);
                }
            }
            Some(session) => session.queue_candidate(candidate),
            None => {
                self.orphan_candidates
                    .entry(sender)
                    .or_default()
                    .push(candidate);
            }
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(uid, candidate) => {
                let Some(session) = self.sessions.get(&uid) else {
                    return;
                };
                if session.is_closed() {
                    return;
                }
                let payload = SignalPayload::IceCandidate {
                    candidate: candidate.candidate,
                    sdp_mid: candidate.sdp_mid,
                    sdp_mline_index: candidate.sdp_mline_index,
                };
                // Best effort: a lost candidate degrades to whatever pairs
                // the remaining ones establish.
                if let Err(e) = self.mailbox.send(&self.room, &uid, payload).await {
                    warn!("Failed to send candidate to {}: {}", uid, e);
                }
            }

            TransportEvent::TrackReady(uid, track) => {
                let Some(session) = self.sessions.get(&uid) else {
                    return;
                };
                if session.is_closed() {
                    return;
                }
                debug!("Binding remote audio from {}", uid);
                self.sink.bind(uid, track);
            }

            TransportEvent::Connected(uid) => {
                let Some(session) = self.sessions.get_mut(&uid) else {
                    return;
                };
                if session.state == PeerState::Closed || session.state == PeerState::Connected {
                    return;
                }
                session.state = PeerState::Connected;
                info!("Connected to {}", uid);
                let _ = self.events.send(SessionEvent::ConnectionEstablished(uid));
            }

            TransportEvent::Disconnected(uid) => {
                self.close_session(&uid).await;
            }
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::SetMicEnabled { enabled, reply } => {
                let state = self.media.set_mic_enabled(enabled);
                self.broadcast_mute_state(!state).await;
                let _ = self.events.send(SessionEvent::MicToggled(state));
                let _ = reply.send(state);
            }
            SessionCommand::SetSpeakerEnabled { enabled, reply } => {
                let state = self.sink.set_speaker_enabled(enabled);
                let _ = self.events.send(SessionEvent::SpeakerToggled(state));
                let _ = reply.send(state);
            }
            SessionCommand::Leave { reply } => {
                // The run loop intercepts Leave; answer anyway if one slips
                // through.
                let _ = reply.send(());
            }
        }
    }

    /// Best-effort presence update so other rosters reflect mute state.
    async fn broadcast_mute_state(&mut self, muted: bool) {
        self.local.muted = muted;
        if let Err(e) = self.roster.join(&self.room, &self.local).await {
            warn!("Failed to broadcast mute state: {}", e);
        }
    }

    /// Terminal close after a transport failure or bad negotiation. The
    /// entry stays as a tombstone so negotiation is not reattempted until
    /// the uid leaves the roster and returns.
    async fn close_session(&mut self, uid: &ParticipantId) {
        let Some(session) = self.sessions.get_mut(uid) else {
            return;
        };
        if session.is_closed() {
            return;
        }

        let was_connected = session.state == PeerState::Connected;
        session.state = PeerState::Closed;
        session.take_pending_candidates();
        if let Err(e) = session.transport.close().await {
            debug!("Error closing transport for {}: {}", uid, e);
        }
        self.sink.unbind(uid);

        info!("Peer session {} closed", uid);
        if was_connected {
            let _ = self.events.send(SessionEvent::ConnectionLost(uid.clone()));
        }
    }

    /// Full teardown for a uid that left the roster. Idempotent over
    /// already-closed sessions.
    async fn destroy_session(&mut self, uid: &ParticipantId) {
        let Some(session) = self.sessions.remove(uid) else {
            return;
        };

        let was_connected = session.state == PeerState::Connected;
        if !session.is_closed() {
            if let Err(e) = session.transport.close().await {
                debug!("Error closing transport for {}: {}", uid, e);
            }
        }
        self.sink.unbind(uid);

        if was_connected {
            let _ = self.events.send(SessionEvent::ConnectionLost(uid.clone()));
        }
    }

    /// Hard cancellation: close every peer, drop presence, free the device.
    /// In-flight negotiations are abandoned.
    async fn shutdown(&mut self) {
        let uids: Vec<ParticipantId> = self.sessions.keys().cloned().collect();
        for uid in uids {
            self.destroy_session(&uid).await;
        }
        self.orphan_candidates.clear();
        self.sink.unbind_all();

        if let Err(e) = self.roster.leave(&self.room, &self.local.uid).await {
            warn!("Failed to delete presence record: {}", e);
        }

        self.media.release();
        info!("Left voice room {}", self.room);
    }
}
