//! The session client: handshake, inbound dispatch, and state reports.
//!
//! One client owns one channel at a time. The flow is:
//!   1. `connect`: send Hello, readiness, a roster request, and our file
//!   2. Loop: receive a frame → dispatch its blocks in order → send one
//!      State report
//!   3. `disconnect` (or the server closing) ends the session

use cowatch_protocol::{
    ClientFeatures, ClientMessage, Codec, FileInfo, HelloAck, HelloRequest, InboundFrame,
    JsonCodec, RoomName, ServerError, ServerFeatures, ServerMessage, ServerSet, ServerState,
    PROTOCOL_VERSION, REAL_VERSION,
};
use cowatch_roster::RosterTracker;
use cowatch_sync::{
    epoch_seconds, LatencySample, LatencyTracker, OutboundLatency, PingService,
    ReconciliationEngine, RemoteState,
};
use cowatch_transport::{MessageChannel, TransportError};

use crate::{CowatchError, EventSink, SessionEvent, SessionIdentity};

/// What the server told us about itself in the handshake ack.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDetails {
    pub version: String,
    pub realversion: String,
    pub motd: String,
    pub features: ServerFeatures,
}

impl ServerDetails {
    /// The text published with [`SessionEvent::Connected`].
    pub fn banner(&self) -> String {
        let mut banner = format!("Connected to server, version {}.", self.version);
        if !self.motd.is_empty() {
            banner.push_str(" MOTD:\n");
            banner.push_str(&self.motd);
        }
        banner
    }
}

impl From<&HelloAck> for ServerDetails {
    fn from(ack: &HelloAck) -> Self {
        Self {
            version: ack.version.clone(),
            realversion: ack.realversion.clone(),
            motd: ack.motd.clone(),
            features: ack.features.clone(),
        }
    }
}

/// A synchronized-playback session with one server.
///
/// Generic over the channel (`C`), where events go (`S`), and how latency
/// is estimated (`L`). All methods take `&mut self`; the client is driven
/// by one task and holds no locks.
pub struct SessionClient<C, S, L = PingService>
where
    C: MessageChannel<Error = TransportError>,
    S: EventSink,
    L: LatencyTracker,
{
    channel: Option<C>,
    codec: JsonCodec,
    sink: S,
    latency: L,
    engine: ReconciliationEngine,
    roster: RosterTracker,
    identity: SessionIdentity,
    features: ClientFeatures,
    file: Option<FileInfo>,
    server: Option<ServerDetails>,
    /// The server's last `latencyCalculation` stamp, echoed in reports.
    latency_calculation: Option<f64>,
}

impl<C, S, L> SessionClient<C, S, L>
where
    C: MessageChannel<Error = TransportError>,
    S: EventSink,
    L: LatencyTracker,
{
    /// Creates a disconnected client.
    pub fn new(sink: S, latency: L) -> Self {
        Self {
            channel: None,
            codec: JsonCodec,
            sink,
            latency,
            engine: ReconciliationEngine::new(""),
            roster: RosterTracker::new(),
            identity: SessionIdentity::default(),
            features: ClientFeatures::supported(),
            file: None,
            server: None,
            latency_calculation: None,
        }
    }

    /// Sets the capabilities advertised in the next handshake.
    pub fn with_features(mut self, features: ClientFeatures) -> Self {
        self.features = features;
        self
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Attaches an open channel and starts the handshake.
    ///
    /// Sends Hello, our readiness, a roster request, and the current file
    /// if one is set. Flow control and the roster start over; playback
    /// position and pause state carry across reconnects.
    ///
    /// # Errors
    /// Returns [`CowatchError::AlreadyConnected`] if a channel is attached,
    /// or a transport/protocol error if a handshake message cannot be sent.
    pub async fn connect(
        &mut self,
        channel: C,
        identity: SessionIdentity,
        password: Option<String>,
    ) -> Result<(), CowatchError> {
        if self.channel.is_some() {
            return Err(CowatchError::AlreadyConnected);
        }

        let conn_id = channel.id();
        tracing::info!(
            %conn_id,
            username = %identity.username,
            room = %identity.room,
            "starting session"
        );

        self.channel = Some(channel);
        self.engine.reset_flow_control();
        self.engine.set_local_user(identity.username.as_str());
        self.roster.clear();
        self.server = None;
        self.latency_calculation = None;
        self.identity = identity;

        let hello = ClientMessage::Hello(HelloRequest {
            username: self.identity.username.clone(),
            password,
            room: RoomName::new(self.identity.room.as_str()),
            version: PROTOCOL_VERSION.to_string(),
            realversion: REAL_VERSION.to_string(),
            features: self.features.clone(),
        });
        self.send(&hello).await?;
        self.send_ready(self.engine.is_ready()).await?;
        self.send(&ClientMessage::list_request()).await?;
        if let Some(file) = self.file.clone() {
            self.send(&ClientMessage::set_file(file)).await?;
        }
        Ok(())
    }

    /// Closes and drops the channel. Safe to call at any time, any number
    /// of times.
    pub async fn disconnect(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        let conn_id = channel.id();
        if let Err(e) = channel.close().await {
            tracing::debug!(%conn_id, error = %e, "close failed");
        }
        tracing::info!(%conn_id, username = %self.identity.username, "disconnected");
    }

    /// Receives and handles frames until the channel closes.
    ///
    /// # Errors
    /// Returns [`CowatchError::NotConnected`] if called without a channel,
    /// a transport error if receiving fails, or [`CowatchError::Rejected`]
    /// if the server refuses the handshake. The client is disconnected
    /// when this returns.
    pub async fn run(&mut self) -> Result<(), CowatchError> {
        if self.channel.is_none() {
            return Err(CowatchError::NotConnected);
        }
        let result = self.pump().await;
        self.disconnect().await;
        result
    }

    async fn pump(&mut self) -> Result<(), CowatchError> {
        loop {
            let Some(data) = self.recv_frame().await? else {
                return Ok(());
            };
            self.handle_frame(&data).await?;
        }
    }

    /// Waits for the next raw frame without handling it.
    ///
    /// Returns `Ok(None)` when the server closed the channel or the client
    /// is disconnected. Cancel-safe, so it can sit in a `select!` next to
    /// host input; pass the result to [`handle_frame`](Self::handle_frame).
    pub async fn recv_frame(&self) -> Result<Option<Vec<u8>>, CowatchError> {
        let Some(channel) = &self.channel else {
            return Ok(None);
        };
        match channel.recv().await {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => {
                tracing::info!(username = %self.identity.username, "server closed the connection");
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(error = %e, "recv error");
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Decodes one raw frame and dispatches it.
    ///
    /// A frame that is not a JSON object is logged and dropped without a
    /// State report. Malformed blocks inside an otherwise valid frame are
    /// skipped individually.
    pub async fn handle_frame(&mut self, data: &[u8]) -> Result<(), CowatchError> {
        let frame = match InboundFrame::from_slice(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return Ok(());
            }
        };

        for rejected in &frame.rejected {
            tracing::warn!(kind = rejected.kind, error = %rejected.error, "skipping malformed block");
        }
        for kind in &frame.unknown {
            tracing::debug!(%kind, "ignoring unknown message kind");
        }
        if frame.is_empty() {
            tracing::debug!("frame carried nothing to apply");
        }

        self.dispatch(frame.into()).await
    }

    /// Handles the blocks of one inbound frame, then sends one State
    /// report.
    ///
    /// Blocks are handled in the order Error, Hello, Set, List, State,
    /// Chat regardless of how they are passed in. Does nothing once
    /// disconnected.
    ///
    /// # Errors
    /// Returns [`CowatchError::Rejected`] if an Error arrives before the
    /// handshake is acknowledged. The session is disconnected and no
    /// report is sent.
    pub async fn dispatch(&mut self, mut messages: Vec<ServerMessage>) -> Result<(), CowatchError> {
        if self.channel.is_none() {
            tracing::debug!(count = messages.len(), "dropping messages after disconnect");
            return Ok(());
        }

        messages.sort_by_key(dispatch_rank);
        for message in messages {
            match message {
                ServerMessage::Error(error) => self.on_error(error).await?,
                ServerMessage::Hello(ack) => self.on_hello(&ack),
                ServerMessage::Set(set) => self.on_set(&set),
                ServerMessage::List(snapshot) => {
                    let events = self.roster.replace_all(&snapshot);
                    self.publish_all(events);
                }
                ServerMessage::State(state) => self.on_state(&state),
                ServerMessage::Chat(chat) => {
                    tracing::debug!(user = %chat.username, "chat");
                    self.sink.publish(SessionEvent::Chat {
                        user: chat.username,
                        message: chat.message,
                    });
                }
                ServerMessage::Tls(tls) => {
                    tracing::debug!(answer = ?tls.start_tls, "TLS negotiation is not supported; ignoring");
                }
            }
        }

        self.send_state_report().await
    }

    async fn on_error(&mut self, error: ServerError) -> Result<(), CowatchError> {
        self.sink.publish(SessionEvent::Error(error.message.clone()));
        if self.server.is_none() {
            tracing::warn!(message = %error.message, "server rejected handshake");
            self.disconnect().await;
            return Err(CowatchError::Rejected(error.message));
        }
        tracing::warn!(message = %error.message, "server error");
        Ok(())
    }

    fn on_hello(&mut self, ack: &HelloAck) {
        if !ack.username.is_empty() && ack.username != self.identity.username {
            tracing::info!(
                requested = %self.identity.username,
                assigned = %ack.username,
                "server assigned a different username"
            );
            self.identity.username = ack.username.clone();
            self.engine.set_local_user(ack.username.as_str());
        }

        let details = ServerDetails::from(ack);
        tracing::info!(
            version = %details.version,
            realversion = %details.realversion,
            username = %self.identity.username,
            "handshake complete"
        );
        self.sink.publish(SessionEvent::Connected(details.banner()));
        self.server = Some(details);
    }

    fn on_set(&mut self, set: &ServerSet) {
        if let Some(change) = &set.playlist_change {
            tracing::debug!(files = change.files.len(), user = ?change.user, "playlist changed");
        }
        if let Some(index) = &set.playlist_index {
            tracing::debug!(index = ?index.index, user = ?index.user, "playlist index changed");
        }
        let events = self.roster.apply_set(set);
        self.publish_all(events);
    }

    fn on_state(&mut self, state: &ServerState) {
        let events = self.engine.on_remote_state(RemoteState::from(state));

        if let Some(ping) = &state.ping {
            if let Some(stamp) = ping.latency_calculation {
                self.latency_calculation = Some(stamp);
            }
            if let Some(sent_at) = ping.client_latency_calculation {
                let sample = LatencySample {
                    sent_at,
                    server_rtt: ping.server_rtt.unwrap_or(0.0),
                };
                self.latency.receive_sample(sample, epoch_seconds());
                self.engine
                    .advance_server_position(self.latency.forward_delay());
            }
        }

        self.publish_all(events);
    }

    fn publish_all<E: Into<SessionEvent>>(&mut self, events: Vec<E>) {
        for event in events {
            self.sink.publish(event.into());
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Encodes and sends one message. Silently dropped when disconnected.
    async fn send(&mut self, message: &ClientMessage) -> Result<(), CowatchError> {
        let Some(channel) = &self.channel else {
            tracing::trace!("not connected; dropping outbound message");
            return Ok(());
        };
        let bytes = self.codec.encode(message)?;
        channel.send(&bytes).await?;
        Ok(())
    }

    async fn send_ready(&mut self, ready: bool) -> Result<(), CowatchError> {
        let message = ClientMessage::set_ready(ready, true, self.identity.username.as_str());
        self.send(&message).await
    }

    async fn send_state_report(&mut self) -> Result<(), CowatchError> {
        if self.channel.is_none() {
            return Ok(());
        }
        let latency = OutboundLatency {
            latency_calculation: self.latency_calculation,
            client_rtt: self.latency.rtt(),
        };
        let report = self.engine.build_outbound_report(latency, epoch_seconds());
        self.send(&ClientMessage::State(report)).await
    }

    // -----------------------------------------------------------------------
    // Host operations
    // -----------------------------------------------------------------------

    /// The local user seeked. Announced to the server immediately.
    pub async fn seek_to(&mut self, position: f64) -> Result<(), CowatchError> {
        self.engine.apply_local_seek(position)?;
        self.send_state_report().await
    }

    /// The local user paused or unpaused. The first unpause also marks us
    /// ready.
    pub async fn set_paused(&mut self, paused: bool) -> Result<(), CowatchError> {
        if self.engine.apply_local_pause(paused) {
            self.send_ready(true).await?;
        }
        self.send_state_report().await
    }

    /// Routine position update from the player. Nothing is sent.
    pub fn set_position(&mut self, position: f64) -> Result<(), CowatchError> {
        self.engine.set_position(position)?;
        Ok(())
    }

    /// Announces the file we have open and asks for a fresh roster. The
    /// file is remembered and re-announced on every connect.
    pub async fn set_file(&mut self, file: FileInfo) -> Result<(), CowatchError> {
        tracing::debug!(name = %file.name, duration = file.duration, "file changed");
        self.file = Some(file.clone());
        self.send(&ClientMessage::set_file(file)).await?;
        self.send(&ClientMessage::list_request()).await
    }

    /// Sets and announces our readiness.
    pub async fn set_ready(&mut self, ready: bool) -> Result<(), CowatchError> {
        self.engine.set_ready(ready);
        self.send_ready(ready).await
    }

    pub async fn send_chat(&mut self, message: &str) -> Result<(), CowatchError> {
        self.send(&ClientMessage::Chat(message.to_string())).await
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn roster(&self) -> &RosterTracker {
        &self.roster
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn latency(&self) -> &L {
        &self.latency
    }

    /// `None` until the handshake is acknowledged.
    pub fn server_details(&self) -> Option<&ServerDetails> {
        self.server.as_ref()
    }

    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

fn dispatch_rank(message: &ServerMessage) -> u8 {
    match message {
        ServerMessage::Error(_) => 0,
        ServerMessage::Hello(_) => 1,
        ServerMessage::Set(_) => 2,
        ServerMessage::List(_) => 3,
        ServerMessage::State(_) => 4,
        ServerMessage::Chat(_) => 5,
        ServerMessage::Tls(_) => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(motd: &str) -> ServerDetails {
        ServerDetails {
            version: "1.2.255".into(),
            realversion: "1.7.0".into(),
            motd: motd.into(),
            features: ServerFeatures::default(),
        }
    }

    #[test]
    fn test_banner_without_motd() {
        assert_eq!(details("").banner(), "Connected to server, version 1.2.255.");
    }

    #[test]
    fn test_banner_with_motd() {
        assert_eq!(
            details("be nice").banner(),
            "Connected to server, version 1.2.255. MOTD:\nbe nice"
        );
    }

    #[test]
    fn test_dispatch_rank_matches_wire_order() {
        let mut messages = vec![
            ServerMessage::Chat(cowatch_protocol::ChatMessage {
                username: "bob".into(),
                message: "hi".into(),
            }),
            ServerMessage::State(ServerState::default()),
            ServerMessage::Error(ServerError {
                message: "x".into(),
            }),
        ];
        messages.sort_by_key(dispatch_rank);
        let kinds: Vec<&str> = messages.iter().map(ServerMessage::kind).collect();
        assert_eq!(kinds, ["Error", "State", "Chat"]);
    }
}
