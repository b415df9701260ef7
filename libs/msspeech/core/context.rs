//! WebSocket event loop
//!
//! `Context` owns the connections and a small tokio runtime that performs the
//! actual socket I/O. All protocol work and every callback runs on the
//! thread calling `service_step`; the I/O tasks only move bytes and report
//! events through a crossbeam channel.

use crate::core::connection::{Connection, ConnectionOptions};
use crate::core::connection_state::ConnectionState;
use crate::core::handle::ConnectionHandle;
use crate::core::logging::{log_debug, log_error, log_info, log_warn, LogConfig, Logger};
use crate::protocol::constants::{DEFAULT_HANDSHAKE_HEADER_BUDGET, DEFAULT_STREAM_BUFFER_SIZE};
use crate::protocol::speech_config::{DeviceInfo, PlatformInfo};
use crate::traits::callbacks::SpeechCallbacks;
use crate::traits::error::{Result, SpeechError};
use crate::traits::transport::{Transport, WsMessage};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{self, http, Message};
use tokio_tungstenite::connect_async;

/// Events reported by I/O tasks and other threads
#[derive(Debug)]
enum Event {
    Established { key: u64 },
    ConnectionError { key: u64, status: u16, message: String },
    Received { key: u64, data: Vec<u8>, is_final: bool },
    Closed { key: u64 },
    /// A handle queued a request
    Wake,
    Cancel,
}

/// Context-wide settings
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub log: LogConfig,
    pub stream_buffer_size: usize,
    pub handshake_header_budget: usize,
    pub device: DeviceInfo,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            handshake_header_budget: DEFAULT_HANDSHAKE_HEADER_BUDGET,
            device: DeviceInfo::default(),
        }
    }
}

/// What one `service_step` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// Transport events delivered to connections
    pub dispatched: usize,
    /// The wait was interrupted by `cancel_step`
    pub cancelled: bool,
}

/// Transport half handed to a `Connection`; writes go to the I/O task
pub struct ChannelTransport {
    writable_requested: bool,
    outgoing: mpsc::UnboundedSender<WsMessage>,
}

impl ChannelTransport {
    fn new(outgoing: mpsc::UnboundedSender<WsMessage>) -> Self {
        Self {
            writable_requested: false,
            outgoing,
        }
    }

    fn take_writable(&mut self) -> bool {
        std::mem::replace(&mut self.writable_requested, false)
    }
}

impl Transport for ChannelTransport {
    fn request_writable(&mut self) {
        self.writable_requested = true;
    }

    fn write(&mut self, message: WsMessage) -> Result<()> {
        self.outgoing
            .send(message)
            .map_err(|_| SpeechError::ConnectionClosed("socket task has exited".to_string()))
    }
}

/// Interrupts a blocking `service_step` from any thread
#[derive(Clone)]
pub struct StepCanceller {
    events: Sender<Event>,
}

impl StepCanceller {
    pub fn cancel(&self) {
        let _ = self.events.send(Event::Cancel);
    }
}

struct ConnectionEntry {
    connection: Connection<ChannelTransport>,
    task: tokio::task::JoinHandle<()>,
}

/// Owns connections and drives them
///
/// # Example
/// ```ignore
/// let mut context = Context::new(ContextOptions::default())?;
/// let handle = context.connect(&config.endpoint_uri(), Box::new(MyCallbacks::new()))?;
///
/// while handle.connection_state() != ConnectionState::Disconnected {
///     context.service_step(Duration::from_millis(100));
/// }
/// ```
pub struct Context {
    runtime: Option<tokio::runtime::Runtime>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    connections: HashMap<u64, ConnectionEntry>,
    /// Socket tasks of disconnected connections still flushing
    closing: Vec<tokio::task::JoinHandle<()>>,
    next_key: u64,
    options: ContextOptions,
    platform: PlatformInfo,
    logger: Logger,
}

impl Context {
    pub fn new(options: ContextOptions) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("msspeech-io")
            .enable_all()
            .build()?;
        let (events_tx, events_rx) = unbounded();

        Ok(Self {
            runtime: Some(runtime),
            events_tx,
            events_rx,
            connections: HashMap::new(),
            closing: Vec::new(),
            next_key: 1,
            logger: Logger::new(&options.log),
            platform: PlatformInfo::detect(),
            options,
        })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Open a connection to `uri` (`ws://` or `wss://`)
    ///
    /// Returns once the connect has been issued; the outcome arrives through
    /// the callbacks during later service steps. Handshake header failures
    /// are reported both to `connection_error` and as the returned error.
    pub fn connect(&mut self, uri: &str, callbacks: Box<dyn SpeechCallbacks>) -> Result<ConnectionHandle> {
        let mut request = uri
            .into_client_request()
            .map_err(|e| SpeechError::Configuration(format!("invalid uri {}: {}", uri, e)))?;
        match request.uri().scheme_str() {
            Some("ws") | Some("wss") => {}
            other => {
                return Err(SpeechError::Configuration(format!(
                    "unsupported uri scheme {:?}, expected ws or wss",
                    other.unwrap_or("")
                )));
            }
        }

        let key = self.next_key;
        self.next_key += 1;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let waker = {
            let events = self.events_tx.clone();
            Arc::new(move || {
                let _ = events.send(Event::Wake);
            })
        };
        let mut connection = Connection::with_waker(
            key,
            ChannelTransport::new(outgoing_tx),
            callbacks,
            self.connection_options(),
            waker,
        );

        connection.begin_connect()?;
        let applied = connection
            .handshake_headers(self.options.handshake_header_budget)
            .and_then(|headers| apply_headers(&mut request, headers));
        if let Err(e) = applied {
            connection.on_connection_error(0, &e.to_string());
            return Err(e);
        }

        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| SpeechError::InvalidState("context is shut down".to_string()))?;

        log_info!(self.logger, "Connecting to {}", uri);
        let task = runtime.spawn(run_connection(
            key,
            request,
            outgoing_rx,
            self.events_tx.clone(),
            self.logger.clone(),
        ));

        let handle = connection.handle().clone();
        self.connections.insert(key, ConnectionEntry { connection, task });
        Ok(handle)
    }

    /// Tear down a connection without callbacks
    pub fn disconnect(&mut self, handle: &ConnectionHandle) -> Result<()> {
        let mut entry = self.connections.remove(&handle.key()).ok_or_else(|| {
            SpeechError::InvalidState(format!("connection {} is not open", handle.key()))
        })?;

        log_debug!(self.logger, "Disconnecting connection {}", handle.key());
        let was_connecting = handle.connection_state() == ConnectionState::Connecting;
        entry.connection.shutdown();
        // An established socket closes gracefully once the transport is
        // dropped; a connect still in flight is cut short
        if was_connecting {
            entry.task.abort();
        } else {
            self.closing.retain(|task| !task.is_finished());
            self.closing.push(entry.task);
        }
        Ok(())
    }

    /// Stop the context, giving disconnected sockets up to `timeout` to
    /// flush queued frames and send their close frame
    ///
    /// Dropping a `Context` without this cuts every socket task short.
    pub fn shutdown(mut self, timeout: Duration) {
        let closing = std::mem::take(&mut self.closing);
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };
        if closing.is_empty() {
            return;
        }
        let flushed = runtime.block_on(async {
            tokio::time::timeout(timeout, futures::future::join_all(closing)).await
        });
        if flushed.is_err() {
            log_warn!(self.logger, "Sockets still closing after {:?}", timeout);
        }
    }

    /// Interrupt the current or next `service_step` wait
    pub fn cancel_step(&self) {
        let _ = self.events_tx.send(Event::Cancel);
    }

    pub fn canceller(&self) -> StepCanceller {
        StepCanceller {
            events: self.events_tx.clone(),
        }
    }

    /// Run one iteration of the event loop
    ///
    /// Applies queued handle requests, waits up to `timeout` for transport
    /// events (not at all when a connection has a write pending), dispatches
    /// them, then gives every connection that asked for one a write
    /// opportunity.
    pub fn service_step(&mut self, timeout: Duration) -> StepOutcome {
        for entry in self.connections.values_mut() {
            entry.connection.apply_pending();
        }

        let wait = if self.write_pending() { Duration::ZERO } else { timeout };
        let mut events = Vec::new();
        match self.events_rx.recv_timeout(wait) {
            Ok(event) => events.push(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
        events.extend(self.events_rx.try_iter());

        let mut outcome = StepOutcome::default();
        for event in events {
            self.handle_event(event, &mut outcome);
        }

        for entry in self.connections.values_mut() {
            entry.connection.apply_pending();
            if entry.connection.transport_mut().take_writable() {
                if let Err(e) = entry.connection.on_writable() {
                    log_error!(self.logger, "Write failed on connection {}: {}", entry.connection.handle().key(), e);
                }
            }
        }

        outcome
    }

    fn write_pending(&self) -> bool {
        self.connections
            .values()
            .any(|entry| entry.connection.transport().writable_requested)
    }

    fn handle_event(&mut self, event: Event, outcome: &mut StepOutcome) {
        match event {
            Event::Wake => {}
            Event::Cancel => outcome.cancelled = true,
            Event::Established { key } => {
                if let Some(entry) = self.connections.get_mut(&key) {
                    entry.connection.on_established();
                    outcome.dispatched += 1;
                }
            }
            Event::Received { key, data, is_final } => {
                if let Some(entry) = self.connections.get_mut(&key) {
                    // already logged by the connection
                    let _ = entry.connection.on_receive(&data, is_final);
                    outcome.dispatched += 1;
                }
            }
            Event::ConnectionError { key, status, message } => {
                if let Some(mut entry) = self.connections.remove(&key) {
                    entry.connection.on_connection_error(status, &message);
                    outcome.dispatched += 1;
                }
            }
            Event::Closed { key } => {
                if let Some(mut entry) = self.connections.remove(&key) {
                    entry.connection.on_closed();
                    outcome.dispatched += 1;
                }
            }
        }
    }

    fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            stream_buffer_size: self.options.stream_buffer_size,
            handshake_header_budget: self.options.handshake_header_budget,
            platform: self.platform.clone(),
            device: self.options.device.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for (_, mut entry) in self.connections.drain() {
            entry.connection.shutdown();
            entry.task.abort();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn apply_headers(request: &mut Request, headers: Vec<(String, String)>) -> Result<()> {
    for (key, value) in headers {
        let header_name = key
            .parse::<http::header::HeaderName>()
            .map_err(|_| SpeechError::Configuration(format!("invalid handshake header name {:?}", key)))?;
        let header_value = value
            .parse::<http::header::HeaderValue>()
            .map_err(|_| SpeechError::Configuration(format!("invalid handshake header value for {}", key)))?;
        request.headers_mut().insert(header_name, header_value);
    }
    Ok(())
}

fn to_tungstenite(message: WsMessage) -> Message {
    match message {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Socket I/O for one connection
async fn run_connection(
    key: u64,
    request: Request,
    mut outgoing: mpsc::UnboundedReceiver<WsMessage>,
    events: Sender<Event>,
    logger: Logger,
) {
    let ws_stream = match connect_async(request).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let status = match &e {
                tungstenite::Error::Http(response) => response.status().as_u16(),
                _ => 0,
            };
            let _ = events.send(Event::ConnectionError {
                key,
                status,
                message: e.to_string(),
            });
            return;
        }
    };

    let _ = events.send(Event::Established { key });
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(Event::Received { key, data: text.into_bytes(), is_final: true });
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let _ = events.send(Event::Received { key, data, is_final: true });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(frame) => log_info!(logger, "Peer closed connection: {} {}", u16::from(frame.code), frame.reason),
                            None => log_info!(logger, "Peer closed connection"),
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log_warn!(logger, "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        log_debug!(logger, "WebSocket stream closed");
                        break;
                    }
                }
            }

            out = outgoing.recv() => {
                match out {
                    Some(message) => {
                        if let Err(e) = write.send(to_tungstenite(message)).await {
                            log_warn!(logger, "Failed to send: {}", SpeechError::Transport(e.to_string()));
                            break;
                        }
                    }
                    None => {
                        let _ = write.close().await;
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(Event::Closed { key });
}
