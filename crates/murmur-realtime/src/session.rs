//! Realtime session — one live duplex connection and its send/receive
//! machinery.
//!
//! Concurrency layout: exactly one background receive loop per session,
//! zero or more caller send operations serialized by an async write lock,
//! and one consumer draining the event queue. The three interact only
//! through the write lock and the queue.
//!
//! Disposal is gated by a single tri-state atomic (live → disposing →
//! disposed) transitioned once via compare-exchange; only the winning caller
//! tears down, and it joins the receive loop before releasing the transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use murmur_core::{ClientEvent, ServerEvent, SessionConfig, classify};

use crate::error::RealtimeError;
use crate::frame::{Assembled, FrameAssembler};

/// Default service endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://api.openai.com/v1/realtime";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type EventResult = Result<ServerEvent, RealtimeError>;

const STATE_LIVE: u8 = 0;
const STATE_DISPOSING: u8 = 1;
const STATE_DISPOSED: u8 = 2;

/// Connection parameters for [`RealtimeSession::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Bearer credential.
    pub api_key: String,
    /// Model/target identifier, appended as the `model` query parameter.
    pub model: String,
    /// Endpoint without the query string. Tests point this at a local server.
    pub endpoint: String,
    /// Additional headers sent on the handshake.
    pub headers: Vec<(String, String)>,
    /// Initial local configuration snapshot. This seeds reconciliation only;
    /// call [`RealtimeSession::update`] to transmit a configuration.
    pub config: Option<SessionConfig>,
}

impl ConnectOptions {
    /// Options for the default endpoint.
    #[must_use]
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            headers: Vec::new(),
            config: None,
        }
    }

    /// Override the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_owned();
        self
    }

    /// Add a handshake header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Seed the local configuration snapshot.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// State shared between the session handle, the receive loop, the outgoing
/// forwarder and any spawned teardown.
struct Shared {
    /// Write half, serialized by the async lock. Taken on teardown.
    sink: tokio::sync::Mutex<Option<WsSink>>,
    /// Current configuration snapshot, replaced wholesale.
    config: parking_lot::RwLock<SessionConfig>,
    /// live → disposing → disposed; transitioned exactly once.
    state: AtomicU8,
    /// Session-scoped cancellation. Independent of any connect-call signal;
    /// also cancelled by the receive loop on exit so forwarders unwind.
    cancel: CancellationToken,
    /// Receive loop handle, joined by the winning teardown.
    reader: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Serialize and send one event under the write lock. Returns whether the
    /// event was written. Never errors: sends on a disposing/disposed session
    /// and transport-level send failures are benign teardown races — the
    /// receive side is the authoritative failure signal.
    async fn send_event(&self, event: &ClientEvent) -> bool {
        if self.state.load(Ordering::SeqCst) != STATE_LIVE {
            debug!(event_type = event.event_type(), "dropping send on disposed session");
            return false;
        }
        let text = match event.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(event_type = event.event_type(), "unencodable client event: {e}");
                return false;
            }
        };
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            debug!(event_type = event.event_type(), "dropping send, transport released");
            return false;
        };
        match sink.send(Message::Text(text.into())).await {
            Ok(()) => true,
            Err(e) => {
                debug!(event_type = event.event_type(), "send failed during teardown: {e}");
                false
            }
        }
    }

    /// Send a `session.update` and, if it was written, replace the local
    /// snapshot while still holding the write lock so snapshot order matches
    /// transmit order under concurrent updates.
    async fn send_update(&self, config: SessionConfig) {
        if self.state.load(Ordering::SeqCst) != STATE_LIVE {
            debug!("dropping configuration update on disposed session");
            return;
        }
        let event = ClientEvent::SessionUpdate {
            event_id: None,
            session: config.clone(),
        };
        let text = match event.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("unencodable session configuration: {e}");
                return;
            }
        };
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            debug!("dropping configuration update, transport released");
            return;
        };
        match sink.send(Message::Text(text.into())).await {
            Ok(()) => *self.config.write() = config,
            Err(e) => debug!("configuration update failed during teardown: {e}"),
        }
    }

    /// Single-shot teardown. Only the caller that wins the live → disposing
    /// transition does any work; everyone else returns immediately.
    async fn teardown(&self) {
        if self
            .state
            .compare_exchange(STATE_LIVE, STATE_DISPOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.cancel.cancel();
        // Join the receive loop before releasing the transport, otherwise the
        // loop could read from a closed socket.
        if let Some(handle) = self.reader.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("receive loop join failed: {e}");
            }
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        self.state.store(STATE_DISPOSED, Ordering::SeqCst);
        debug!("session disposed");
    }
}

/// One live realtime connection.
///
/// Created by [`RealtimeSession::connect`]; destroyed by [`close`] /
/// [`close_background`] or by the receive loop observing a transport close,
/// which ends the event stream (the handle should still be closed to release
/// the transport).
///
/// [`close`]: RealtimeSession::close
/// [`close_background`]: RealtimeSession::close_background
pub struct RealtimeSession {
    shared: Arc<Shared>,
    /// Event queue consumer, taken once by [`RealtimeSession::exchange`].
    events: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<EventResult>>>,
}

impl RealtimeSession {
    /// Establish the duplex connection and start the receive loop.
    ///
    /// The receive loop is bound to a session-owned cancellation scope, not
    /// to whatever short-lived timeout signal the caller wrapped this call
    /// in. On error, no session state exists and nothing was spawned.
    #[instrument(skip_all, fields(model = %opts.model))]
    pub async fn connect(opts: ConnectOptions) -> Result<Self, RealtimeError> {
        let mut url = url::Url::parse(&opts.endpoint)
            .map_err(|e| RealtimeError::Connect(format!("bad endpoint: {e}")))?;
        let _ = url.query_pairs_mut().append_pair("model", &opts.model);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::Connect(format!("bad endpoint: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", opts.api_key))
            .map_err(|_| RealtimeError::InvalidHeader("authorization".to_owned()))?;
        let _ = request.headers_mut().insert(AUTHORIZATION, bearer);
        for (name, value) in &opts.headers {
            let name: HeaderName = name
                .parse()
                .map_err(|_| RealtimeError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| RealtimeError::InvalidHeader(name.to_string()))?;
            let _ = request.headers_mut().insert(name, value);
        }

        let (ws, response) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        debug!(status = %response.status(), "transport connected");

        let (sink, read) = ws.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            sink: tokio::sync::Mutex::new(Some(sink)),
            config: parking_lot::RwLock::new(opts.config.unwrap_or_default()),
            state: AtomicU8::new(STATE_LIVE),
            cancel: CancellationToken::new(),
            reader: tokio::sync::Mutex::new(None),
        });
        let handle = tokio::spawn(receive_loop(read, Arc::clone(&shared), tx));
        *shared.reader.lock().await = Some(handle);

        Ok(Self {
            shared,
            events: parking_lot::Mutex::new(Some(rx)),
        })
    }

    /// Transmit a configuration update and adopt it as the local snapshot.
    ///
    /// Best-effort during teardown races: on a disposed session this does
    /// nothing, including not touching the snapshot.
    pub async fn update(&self, config: SessionConfig) {
        self.shared.send_update(config).await;
    }

    /// Send one outgoing event. Best-effort: silently dropped on a disposed
    /// session or a transport that stopped accepting writes.
    pub async fn inject(&self, event: ClientEvent) {
        let _ = self.shared.send_event(&event).await;
    }

    /// Run the duplex exchange: forward `outgoing` to the transport while
    /// yielding classified server events.
    ///
    /// The output ends when the event queue closes — cleanly on a transport
    /// close or cancellation, with the recorded error on a fatal read
    /// failure. The forwarder is awaited after the queue ends, purely for
    /// deterministic cleanup; it never gates output.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::Closed`] if the event stream was already consumed by
    /// a previous `exchange` call.
    pub fn exchange<S>(
        &self,
        outgoing: S,
    ) -> Result<impl Stream<Item = EventResult> + Send + 'static, RealtimeError>
    where
        S: Stream<Item = ClientEvent> + Send + 'static,
    {
        let mut rx = self.events.lock().take().ok_or(RealtimeError::Closed)?;
        let shared = Arc::clone(&self.shared);
        let forward = tokio::spawn(async move {
            tokio::pin!(outgoing);
            loop {
                tokio::select! {
                    () = shared.cancel.cancelled() => break,
                    next = outgoing.next() => match next {
                        Some(event) => {
                            let _ = shared.send_event(&event).await;
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
            if let Err(e) = forward.await {
                warn!("outgoing forwarder join failed: {e}");
            }
        })
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.shared.config.read().clone()
    }

    /// Whether teardown has completed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.state.load(Ordering::SeqCst) == STATE_DISPOSED
    }

    /// Dispose the session: cancel the receive loop, join it, release the
    /// transport. Idempotent and safe to call concurrently; losers of the
    /// disposal race return immediately without waiting.
    pub async fn close(&self) {
        self.shared.teardown().await;
    }

    /// Non-blocking disposal: spawns the same single-shot teardown
    /// [`close`](RealtimeSession::close) runs.
    pub fn close_background(&self) {
        let shared = Arc::clone(&self.shared);
        let _teardown = tokio::spawn(async move { shared.teardown().await });
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        // Last-resort unwind for sessions dropped without close(): cancelling
        // the scope stops the receive loop at its next suspension point.
        if self.shared.state.load(Ordering::SeqCst) == STATE_LIVE {
            self.shared.cancel.cancel();
        }
    }
}

/// Background receive loop: transport frames → reassembly → classification →
/// event queue. Exits on close frame, cancellation, or read error; a read
/// error is recorded into the queue so the consumer observes failure instead
/// of a silent end.
#[instrument(skip_all)]
async fn receive_loop(
    mut read: SplitStream<WsStream>,
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<EventResult>,
) {
    let mut assembler = FrameAssembler::new();
    loop {
        let next = tokio::select! {
            () = shared.cancel.cancelled() => {
                debug!("receive loop cancelled");
                break;
            }
            next = read.next() => next,
        };
        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                debug!("transport closed");
                break;
            }
            Some(Err(e)) => {
                warn!("transport read failed: {e}");
                let _ = tx.send(Err(RealtimeError::Transport(e.to_string())));
                break;
            }
            None => {
                debug!("transport stream ended");
                break;
            }
        };
        match assembler.push(message) {
            Some(Assembled::Text(text)) => {
                let event = classify(text.as_str());
                if let ServerEvent::SessionCreated { session, .. }
                | ServerEvent::SessionUpdated { session, .. } = &event
                {
                    // One guard across read-merge-store; a concurrent
                    // update() must not land between them.
                    let mut config = shared.config.write();
                    let merged = config.reconcile(session);
                    *config = merged;
                }
                if tx.send(Ok(event)).is_err() {
                    debug!("event queue consumer dropped");
                    break;
                }
            }
            Some(Assembled::Close(frame)) => {
                debug!(?frame, "close frame received");
                break;
            }
            None => {}
        }
    }
    // The session scope dies with the receive side; this unwinds any
    // exchange forwarder still draining an unbounded outgoing stream.
    shared.cancel.cancel();
}
