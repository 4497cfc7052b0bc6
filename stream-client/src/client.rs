use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use progress_stream_protocol::{InboundMessage, OutboundRequest, ProtocolError};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::connection::{self, Command};
use crate::endpoint::StreamTarget;
use crate::error::{ClientError, Result};
use crate::handlers::{Diagnostics, Handlers, TracingDiagnostics};
use crate::state::{ClientConfig, ClientState};

/// Event-driven client for the progress data stream.
///
/// Implements the connection state machine:
/// `Idle` → `Connecting` → `Open` → `Closing` → `Closed`, with `Faulted` on
/// transport failure. `connect` does not block; results arrive through the
/// [`Handlers`] passed at construction.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> progress_stream_client::Result<()> {
/// use progress_stream_client::{Handlers, StreamClient};
///
/// let handlers = Handlers::new()
///     .on_open(|| println!("open"))
///     .on_message(|msg| println!("{msg:?}"))
///     .on_close(|| println!("closed"));
///
/// let client = StreamClient::new("ws://localhost:8000/ws/data/", handlers)?;
/// client.connect()?;
/// // ... once `on_open` has fired:
/// client.send(&progress_stream_client::OutboundRequest::new(45, 15)?)?;
/// # Ok(())
/// # }
/// ```
pub struct StreamClient {
    target: StreamTarget,
    config: ClientConfig,
    shared: Arc<Shared>,
}

impl StreamClient {
    /// Create a client for `target` with default configuration.
    ///
    /// Fails with [`ClientError::InvalidTarget`] if `target` is not a
    /// `ws://`/`wss://` URI. No connection is attempted.
    pub fn new(target: &str, handlers: Handlers) -> Result<Self> {
        Self::builder(target).handlers(handlers).build()
    }

    /// Create a client with a custom [`ClientConfig`].
    pub fn with_config(target: &str, handlers: Handlers, config: ClientConfig) -> Result<Self> {
        Self::builder(target)
            .handlers(handlers)
            .config(config)
            .build()
    }

    /// Start building a client.
    pub fn builder(target: &str) -> StreamClientBuilder {
        StreamClientBuilder {
            target: target.to_owned(),
            handlers: Handlers::new(),
            config: ClientConfig::default(),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    // -- Accessors --

    /// Returns the connection target.
    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    /// Returns the configuration used for connections.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the current client state.
    pub fn state(&self) -> ClientState {
        self.shared.lock().state
    }

    // -- Lifecycle --

    /// Open the channel in the background.
    ///
    /// Returns as soon as the connection worker is spawned; `on_open` or
    /// `on_error` reports the outcome. Legal from `Idle`, `Closed` and
    /// `Faulted`. Must be called within a tokio runtime.
    pub fn connect(&self) -> Result<()> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let mut inner = self.shared.lock();
        if !inner.state.is_detached() {
            return Err(ClientError::InvalidState {
                expected: "Idle|Closed|Faulted",
                actual: inner.state.as_str(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.generation += 1;
        inner.state = ClientState::Connecting;
        inner.commands = Some(tx);
        inner.request_sent = false;
        let generation = inner.generation;
        drop(inner);

        info!(url = %self.target, generation, "connecting");
        runtime.spawn(connection::run(
            self.target.clone(),
            self.config.clone(),
            Arc::clone(&self.shared),
            generation,
            rx,
        ));
        Ok(())
    }

    /// Send the connection's request.
    ///
    /// Requires state `Open`. At most one request per connection; a second
    /// call fails with [`ClientError::RequestAlreadySent`]. Errors leave the
    /// channel untouched and produce no frame.
    pub fn send(&self, request: &OutboundRequest) -> Result<()> {
        let mut inner = self.shared.lock();
        if inner.state != ClientState::Open {
            return Err(ClientError::InvalidState {
                expected: "Open",
                actual: inner.state.as_str(),
            });
        }
        if inner.request_sent {
            return Err(ClientError::RequestAlreadySent);
        }

        let text = request.encode()?;
        let commands = inner.commands.as_ref().ok_or(ClientError::Disconnected)?;
        commands
            .send(Command::Send(text))
            .map_err(|_| ClientError::Disconnected)?;
        inner.request_sent = true;

        debug!(
            progress = request.progress,
            window_sec = request.window_sec,
            "request queued"
        );
        Ok(())
    }

    /// Close the channel.
    ///
    /// Idempotent: a no-op unless `Connecting` or `Open`. `on_close` fires
    /// once the transport confirms. Closing while `Connecting` suppresses
    /// `on_open`.
    pub fn close(&self) {
        let mut inner = self.shared.lock();
        if !matches!(inner.state, ClientState::Connecting | ClientState::Open) {
            return;
        }

        debug!(url = %self.target, from = inner.state.as_str(), "close requested");
        inner.state = ClientState::Closing;
        if let Some(commands) = inner.commands.as_ref() {
            // A dropped receiver means the worker is already terminating
            let _ = commands.send(Command::Close);
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`StreamClient`].
pub struct StreamClientBuilder {
    target: String,
    handlers: Handlers,
    config: ClientConfig,
    diagnostics: Arc<dyn Diagnostics>,
}

impl StreamClientBuilder {
    /// Set the lifecycle handlers.
    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Set the connection configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sink for undecodable frames. Default: [`TracingDiagnostics`].
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Validate the target and configured request, then build the client.
    pub fn build(self) -> Result<StreamClient> {
        let target = StreamTarget::parse(&self.target)?;
        if let Some(request) = &self.config.initial_request {
            request.validate()?;
        }

        Ok(StreamClient {
            target,
            config: self.config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ClientState::Idle,
                    generation: 0,
                    commands: None,
                    request_sent: false,
                }),
                handlers: Mutex::new(self.handlers),
                diagnostics: self.diagnostics,
            }),
        })
    }
}

/// State shared between a [`StreamClient`] and its connection worker.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    handlers: Mutex<Handlers>,
    diagnostics: Arc<dyn Diagnostics>,
}

struct Inner {
    state: ClientState,
    /// Bumped by each `connect`; a worker only acts for its own generation.
    generation: u64,
    commands: Option<mpsc::UnboundedSender<Command>>,
    request_sent: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handlers(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Connecting` → `Open`. Returns false if a close raced the handshake.
    pub(crate) fn mark_open(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ClientState::Connecting {
            return false;
        }
        inner.state = ClientState::Open;
        true
    }

    pub(crate) fn fire_open(&self) {
        self.handlers().open();
    }

    /// Reserve the connection's single request slot.
    pub(crate) fn claim_request(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation
            || inner.state != ClientState::Open
            || inner.request_sent
        {
            return false;
        }
        inner.request_sent = true;
        true
    }

    /// Hand a decoded message to `on_message` while the connection is `Open`.
    pub(crate) fn deliver(&self, generation: u64, message: InboundMessage) {
        {
            let inner = self.lock();
            if inner.generation != generation || inner.state != ClientState::Open {
                trace!(kind = message.kind(), "dropping message outside Open");
                return;
            }
        }
        self.handlers().message(message);
    }

    pub(crate) fn decode_error(&self, error: &ProtocolError, frame: &str) {
        self.diagnostics.decode_error(error, frame);
    }

    /// Release the connection and fire the terminal handler.
    ///
    /// A close the owner asked for always ends in `Closed` + `on_close`, even
    /// if the transport failed along the way. Otherwise an error ends in
    /// `Faulted` + `on_error` and a clean end in `Closed` + `on_close`.
    pub(crate) fn terminate(&self, generation: u64, error: Option<ClientError>) {
        let faulted = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state.is_detached() {
                return;
            }
            inner.commands = None;
            let faulted = error.is_some() && inner.state != ClientState::Closing;
            inner.state = if faulted {
                ClientState::Faulted
            } else {
                ClientState::Closed
            };
            faulted
        };

        match error {
            Some(error) if faulted => {
                info!(%error, "connection faulted");
                self.handlers().error(&error);
            }
            _ => {
                info!("connection closed");
                self.handlers().close();
            }
        }
    }
}
