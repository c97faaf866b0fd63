//! Client configuration and the WebSocket session builder.

use cowatch_protocol::ClientFeatures;
use cowatch_roster::RosterError;
use cowatch_sync::PingService;
use cowatch_transport::WebSocketChannel;

use crate::{CowatchError, EventSink, SessionClient};

/// Where a session connects when nothing else is configured.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8999";

/// The room a session joins when nothing else is configured.
pub const DEFAULT_ROOM: &str = "default";

/// Who we are on the server, fixed for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionIdentity {
    pub username: String,
    pub room: String,
}

impl SessionIdentity {
    pub fn new(username: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            room: room.into(),
        }
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket URL of the server.
    pub url: String,
    pub username: String,
    pub room: String,
    /// Room or server password, if the server wants one.
    pub password: Option<String>,
    /// Capabilities advertised in the handshake.
    pub features: ClientFeatures,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: String::new(),
            room: DEFAULT_ROOM.to_string(),
            password: None,
            features: ClientFeatures::supported(),
        }
    }
}

impl ClientConfig {
    /// Trims names and rejects an empty username.
    ///
    /// An empty room falls back to [`DEFAULT_ROOM`]; an empty password is
    /// treated as no password.
    ///
    /// # Errors
    /// Returns [`RosterError::InvalidUsername`] (wrapped) if the username
    /// is empty after trimming.
    pub fn validated(mut self) -> Result<Self, CowatchError> {
        self.username = self.username.trim().to_string();
        self.room = self.room.trim().to_string();
        if self.room.is_empty() {
            self.room = DEFAULT_ROOM.to_string();
        }
        if self.username.is_empty() {
            return Err(RosterError::InvalidUsername { room: self.room }.into());
        }
        self.password = self.password.filter(|p| !p.is_empty());
        Ok(self)
    }

    /// The identity this config connects as.
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::new(self.username.as_str(), self.room.as_str())
    }
}

/// Builder for opening a WebSocket-backed [`SessionClient`].
///
/// # Example
///
/// ```rust,no_run
/// use cowatch::prelude::*;
///
/// # async fn run() -> Result<(), CowatchError> {
/// let (events, _rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
/// let mut client = SessionClientBuilder::new()
///     .url("ws://127.0.0.1:8999")
///     .username("alice")
///     .room("movie")
///     .connect(events)
///     .await?;
/// client.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionClientBuilder {
    config: ClientConfig,
}

impl SessionClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn url(mut self, url: &str) -> Self {
        self.config.url = url.to_string();
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.config.username = username.to_string();
        self
    }

    pub fn room(mut self, room: &str) -> Self {
        self.config.room = room.to_string();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.config.password = Some(password.to_string());
        self
    }

    pub fn features(mut self, features: ClientFeatures) -> Self {
        self.config.features = features;
        self
    }

    /// Opens the WebSocket and starts the session.
    ///
    /// The returned client has already sent its handshake; call
    /// [`SessionClient::run`] to process server traffic.
    pub async fn connect<S: EventSink>(
        self,
        sink: S,
    ) -> Result<SessionClient<WebSocketChannel, S, PingService>, CowatchError> {
        let config = self.config.validated()?;
        let channel = WebSocketChannel::connect(&config.url).await?;
        tracing::info!(url = %config.url, "websocket open");

        let mut client = SessionClient::new(sink, PingService::new())
            .with_features(config.features.clone());
        client
            .connect(channel, config.identity(), config.password)
            .await?;
        Ok(client)
    }
}
