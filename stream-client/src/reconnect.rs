use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use progress_stream_protocol::OutboundRequest;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::StreamClient;
use crate::endpoint::StreamTarget;
use crate::error::{ClientError, Result};
use crate::handlers::Handlers;
use crate::state::{ClientConfig, ClientState};

/// Configuration for automatic reconnect with exponential backoff.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnect attempt. Default: 1 second.
    pub initial_backoff: Duration,
    /// Maximum delay between reconnect attempts. Default: 60 seconds.
    pub max_backoff: Duration,
    /// Multiplier applied to backoff after each attempt. Default: 2.0.
    pub multiplier: f64,
    /// Maximum number of consecutive failed attempts. 0 = unlimited. Default: 0.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Backoff following `current`, capped at `max_backoff`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// What the supervisor learns from the client's handlers.
#[derive(Debug)]
enum Signal {
    Opened,
    Closed,
    Faulted,
}

/// A [`StreamClient`] kept connected by a supervisor task.
///
/// Every connection sends the same request right after open. When the
/// connection ends without [`shutdown`](Self::shutdown) being called, the
/// supervisor waits for the current backoff and connects again. Backoff
/// resets after each successful open.
///
/// The user's handlers see every lifecycle event of every connection. When
/// `max_attempts` consecutive reconnects fail, `on_error` receives
/// [`ClientError::ReconnectFailed`] and the supervisor stops.
pub struct ReconnectingStream {
    client: Arc<StreamClient>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconnectingStream {
    /// Connect to `target` and start supervising the connection.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        target: &str,
        request: OutboundRequest,
        handlers: Handlers,
        config: ClientConfig,
        reconnect: ReconnectConfig,
    ) -> Result<Self> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let user = Arc::new(Mutex::new(handlers));
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let config = ClientConfig {
            initial_request: Some(request),
            ..config
        };
        let client = Arc::new(StreamClient::with_config(
            target,
            forwarding_handlers(Arc::clone(&user), signals_tx),
            config,
        )?);
        client.connect()?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(supervise(
            Arc::clone(&client),
            signals_rx,
            user,
            reconnect,
            shutdown_rx,
        ));

        Ok(Self {
            client,
            shutdown,
            task,
        })
    }

    /// Returns the state of the current connection.
    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    /// Returns the connection target.
    pub fn target(&self) -> &StreamTarget {
        self.client.target()
    }

    /// Whether the supervisor has stopped (shutdown or attempts exhausted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the connection and stop the supervisor.
    ///
    /// Returns once the connection has been released; the user's `on_close`
    /// has fired by then if a connection was live.
    pub async fn shutdown(self) {
        let Self { shutdown, task, .. } = self;
        // Err means the supervisor already stopped
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            warn!(error = %e, "reconnect supervisor panicked");
        }
    }
}

fn lock(handlers: &Mutex<Handlers>) -> MutexGuard<'_, Handlers> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

fn forwarding_handlers(
    user: Arc<Mutex<Handlers>>,
    signals: mpsc::UnboundedSender<Signal>,
) -> Handlers {
    let (u1, u2, u3, u4) = (user.clone(), user.clone(), user.clone(), user);
    let (s1, s2, s3) = (signals.clone(), signals.clone(), signals);
    Handlers::new()
        .on_open(move || {
            lock(&u1).open();
            let _ = s1.send(Signal::Opened);
        })
        .on_message(move |message| lock(&u2).message(message))
        .on_close(move || {
            lock(&u3).close();
            let _ = s2.send(Signal::Closed);
        })
        .on_error(move |error| {
            lock(&u4).error(error);
            let _ = s3.send(Signal::Faulted);
        })
}

async fn supervise(
    client: Arc<StreamClient>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    user: Arc<Mutex<Handlers>>,
    reconnect: ReconnectConfig,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut backoff = reconnect.initial_backoff;
    let mut attempts: u32 = 0;

    loop {
        let signal = tokio::select! {
            _ = &mut shutdown => {
                stop(&client, &mut signals).await;
                return;
            }
            signal = signals.recv() => signal,
        };

        match signal {
            Some(Signal::Opened) => {
                if attempts > 0 {
                    info!(attempts, "reconnected");
                }
                attempts = 0;
                backoff = reconnect.initial_backoff;
            }
            Some(Signal::Closed | Signal::Faulted) => {
                if reconnect.max_attempts > 0 && attempts >= reconnect.max_attempts {
                    warn!(attempts, "reconnect failed, giving up");
                    lock(&user).error(&ClientError::ReconnectFailed { attempts });
                    return;
                }

                attempts += 1;
                info!(
                    attempt = attempts,
                    backoff_ms = backoff.as_millis(),
                    "reconnecting"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = &mut shutdown => {
                        debug!("shutdown during backoff");
                        return;
                    }
                }
                backoff = reconnect.next_backoff(backoff);

                if let Err(error) = client.connect() {
                    warn!(%error, "reconnect could not start");
                    lock(&user).error(&error);
                    return;
                }
            }
            None => return,
        }
    }
}

/// Close the live connection, if any, and wait for its terminal event.
async fn stop(client: &StreamClient, signals: &mut mpsc::UnboundedReceiver<Signal>) {
    client.close();
    if client.state().is_detached() {
        return;
    }
    while let Some(signal) = signals.recv().await {
        if !matches!(signal, Signal::Opened) {
            break;
        }
    }
}
