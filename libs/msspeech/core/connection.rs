//! Per-connection protocol state machine
//!
//! `Connection` is driven entirely by events pushed into it by whoever owns
//! the transport: handshake results, inbound deliveries and write
//! opportunities. It never blocks and never performs I/O directly.
//!
//! ```text
//! handshake ok ─► SpeechConfigPending ─(writable: speech.config)─► Idle
//! Idle ─(start_stream)─► Streaming ─(source would block)─► StreamingBlocked
//! StreamingBlocked ─(resume_stream)─► Streaming ─(source ends)─► Idle
//! turn.end ─► TelemetryPending ─(writable: telemetry)─► Idle
//! ```

use crate::core::connection_state::{ConnectionState, Metrics, SessionStatus};
use crate::core::handle::{ConnectionHandle, Waker};
use crate::core::logging::{log_debug, log_error, log_info, log_warn, Logger};
use crate::protocol::codec::{InboundAssembler, OutgoingMessage, ParseStep, ParsedMessage};
use crate::protocol::constants::*;
use crate::protocol::dispatcher::InboundMessage;
use crate::protocol::speech_config::{speech_config_body, DeviceInfo, PlatformInfo};
use crate::protocol::streaming::{StreamStep, StreamingSession};
use crate::protocol::telemetry::Telemetry;
use crate::protocol::ids;
use crate::traits::callbacks::{OverlayTarget, SpeechCallbacks};
use crate::traits::error::{Result, SpeechError};
use crate::traits::transport::Transport;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Runtime knobs for one connection
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Capacity of the audio staging buffer handed to the source
    pub stream_buffer_size: usize,
    /// Space available for the headers added to the upgrade request
    pub handshake_header_budget: usize,
    pub platform: PlatformInfo,
    pub device: DeviceInfo,
    pub logger: Logger,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            handshake_header_budget: DEFAULT_HANDSHAKE_HEADER_BUDGET,
            platform: PlatformInfo::detect(),
            device: DeviceInfo::default(),
            logger: Logger::default(),
        }
    }
}

/// One speech session over one transport
pub struct Connection<T: Transport> {
    transport: T,
    callbacks: Box<dyn SpeechCallbacks>,
    handle: ConnectionHandle,
    options: ConnectionOptions,
    logger: Logger,
    assembler: InboundAssembler,
    telemetry: Telemetry,
    session: Option<StreamingSession>,
}

impl<T: Transport> Connection<T> {
    /// Standalone connection whose handle wakes nobody
    pub fn new(transport: T, callbacks: Box<dyn SpeechCallbacks>, options: ConnectionOptions) -> Self {
        let handle = ConnectionHandle::new(0, Arc::new(|| {}));
        Self::with_handle(transport, callbacks, options, handle)
    }

    /// Connection reachable through a handle that wakes `waker`
    pub fn with_waker(
        key: u64,
        transport: T,
        callbacks: Box<dyn SpeechCallbacks>,
        options: ConnectionOptions,
        waker: Waker,
    ) -> Self {
        Self::with_handle(transport, callbacks, options, ConnectionHandle::new(key, waker))
    }

    fn with_handle(
        transport: T,
        callbacks: Box<dyn SpeechCallbacks>,
        options: ConnectionOptions,
        handle: ConnectionHandle,
    ) -> Self {
        let logger = options.logger.with_sink_override(callbacks.log_sink());
        Self {
            transport,
            callbacks,
            handle,
            assembler: InboundAssembler::new(logger.clone()),
            logger,
            options,
            telemetry: Telemetry::new(),
            session: None,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.handle.connection_state()
    }

    pub fn status(&self) -> SessionStatus {
        self.handle.status()
    }

    pub fn connection_id(&self) -> Option<String> {
        self.handle.connection_id()
    }

    pub fn metrics(&self) -> Metrics {
        self.handle.metrics()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// True while a stream is active or a start is queued
    pub fn has_stream(&self) -> bool {
        self.session.is_some() || self.handle.shared().pending_stream.lock().is_some()
    }

    /// The connect call has been issued
    pub fn begin_connect(&mut self) -> Result<()> {
        self.handle
            .shared()
            .state
            .compare_exchange(ConnectionState::Disconnected, ConnectionState::Connecting)
            .map(|_| ())
            .map_err(|actual| SpeechError::InvalidState(format!("cannot connect while {:?}", actual)))
    }

    /// Headers to add to the upgrade request
    ///
    /// Generates the connection id and asks the callbacks for the
    /// authentication header. Each `Name: Value\r\n` line must fit in what
    /// is left of `budget`.
    pub fn handshake_headers(&mut self, budget: usize) -> Result<Vec<(String, String)>> {
        let mut remaining = budget;
        let mut headers = Vec::with_capacity(2);

        let connection_id = ids::generate_id();
        let needed = header_line_len(CONNECTION_ID_HEADER, &connection_id);
        if needed > remaining {
            return Err(SpeechError::BufferTooSmall {
                what: "connection id",
                needed,
                available: remaining,
            });
        }
        remaining -= needed;
        *self.handle.shared().connection_id.lock() = Some(connection_id.clone());
        headers.push((CONNECTION_ID_HEADER.to_string(), connection_id));

        if let Some(line) = self.callbacks.authentication_header(&self.handle, remaining) {
            let line = line.trim_end_matches(['\r', '\n']);
            let needed = line.len() + 2;
            if needed > remaining {
                return Err(SpeechError::BufferTooSmall {
                    what: "authentication header",
                    needed,
                    available: remaining,
                });
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                SpeechError::Configuration("authentication header must be `Name: Value`".to_string())
            })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(headers)
    }

    /// Transport handshake completed
    pub fn on_established(&mut self) {
        let shared = self.handle.shared();
        shared.state.set(ConnectionState::Connected);
        shared.status.set(SessionStatus::SpeechConfigPending);
        log_info!(
            self.logger,
            "Connection {} established",
            self.connection_id().unwrap_or_default()
        );

        self.callbacks.connection_established(&self.handle);
        self.transport.request_writable();
    }

    /// Connecting failed. `http_status` is 0 when no HTTP response was seen
    pub fn on_connection_error(&mut self, http_status: u16, message: &str) {
        log_error!(self.logger, "Connection error ({}): {}", http_status, message);
        self.teardown();
        self.callbacks.connection_error(&self.handle, http_status, message);
    }

    /// Transport closed
    pub fn on_closed(&mut self) {
        log_info!(self.logger, "Connection closed");
        self.teardown();
        self.callbacks.connection_closed(&self.handle);
    }

    /// Explicit teardown without callbacks
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let shared = self.handle.shared();
        shared.state.set(ConnectionState::Disconnected);
        shared.status.set(SessionStatus::None);
        shared.pending_stream.lock().take();
        shared.resume_requested.store(false, Ordering::Release);
        self.assembler.reset();
        self.session = None;
    }

    /// One inbound delivery from the transport
    ///
    /// Framing and decode errors are logged and returned; the connection
    /// stays usable either way.
    pub fn on_receive(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        match self.assembler.push(data, is_final) {
            Ok(ParseStep::Partial) => Ok(()),
            Ok(ParseStep::Complete(message)) => {
                let result = self.handle_message(&message);
                self.apply_pending();
                result
            }
            Err(e) => {
                log_error!(self.logger, "Dropping malformed frame: {}", e);
                Err(e.into())
            }
        }
    }

    fn handle_message(&mut self, message: &ParsedMessage) -> Result<()> {
        self.handle.shared().metrics.increment_received();
        self.telemetry.record_received(&message.path);
        log_debug!(self.logger, "Received {} ({})", message.path, message.request_id);

        let decoded = match InboundMessage::decode(message, &self.logger) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.handle.shared().metrics.increment_decode_errors();
                log_error!(self.logger, "{}", e);
                return Err(e.into());
            }
        };

        decoded.dispatch(self.callbacks.as_mut(), &self.handle);

        if let InboundMessage::TurnEnd(_) = decoded {
            if self.session.take().is_some() {
                log_debug!(self.logger, "Turn ended with audio still streaming");
                self.telemetry.record_stream_end(None);
            }
            self.handle.shared().status.set(SessionStatus::TelemetryPending);
            self.transport.request_writable();
        }

        Ok(())
    }

    /// Apply start/resume requests queued through the handle
    pub fn apply_pending(&mut self) {
        let shared = self.handle.shared();
        if !shared.state.is_connected() {
            return;
        }

        if shared.resume_requested.swap(false, Ordering::AcqRel)
            && shared
                .status
                .compare_exchange(SessionStatus::StreamingBlocked, SessionStatus::Streaming)
                .is_ok()
        {
            log_debug!(self.logger, "Resuming audio stream");
            self.transport.request_writable();
        }

        if shared.status.get() != SessionStatus::Idle {
            return;
        }
        let pending = shared.pending_stream.lock().take();
        if let Some(pending) = pending {
            log_debug!(self.logger, "Starting audio stream {}", pending.request_id);
            self.session = Some(StreamingSession::new(
                pending.source,
                pending.request_id,
                self.options.stream_buffer_size,
            ));
            self.telemetry.record_stream_start();
            shared.status.set(SessionStatus::Streaming);
            self.transport.request_writable();
        }
    }

    /// The transport can take one more message
    pub fn on_writable(&mut self) -> Result<()> {
        if !self.handle.shared().state.is_connected() {
            return Ok(());
        }
        self.apply_pending();

        match self.status() {
            SessionStatus::SpeechConfigPending => self.send_speech_config(),
            SessionStatus::Streaming => self.stream_audio(),
            SessionStatus::TelemetryPending => self.send_telemetry(),
            _ => Ok(()),
        }
    }

    fn write(&mut self, message: OutgoingMessage) -> Result<()> {
        self.transport.write(message.encode())?;
        self.handle.shared().metrics.increment_sent();
        Ok(())
    }

    fn send_speech_config(&mut self) -> Result<()> {
        let mut body = speech_config_body(&self.options.platform, &self.options.device);
        self.callbacks
            .message_overlay(&self.handle, OverlayTarget::SpeechConfig, &mut body);

        self.write(OutgoingMessage::json_with_new_id(PATH_SPEECH_CONFIG, &body))?;
        self.handle.shared().status.set(SessionStatus::Idle);
        log_debug!(self.logger, "speech.config sent, client ready");

        self.callbacks.client_ready(&self.handle);
        self.apply_pending();
        Ok(())
    }

    fn stream_audio(&mut self) -> Result<()> {
        let step = match self.session.as_mut() {
            Some(session) => session.next_step(&self.logger),
            None => {
                log_warn!(self.logger, "Streaming without an audio session");
                self.handle.shared().status.set(SessionStatus::Idle);
                return Ok(());
            }
        };

        match step {
            StreamStep::Blocked => {
                self.handle.shared().status.set(SessionStatus::StreamingBlocked);
                Ok(())
            }
            StreamStep::Packet(message) => {
                self.write(message)?;
                self.handle.shared().metrics.increment_audio_packets();
                self.transport.request_writable();
                Ok(())
            }
            StreamStep::Finished { message, error } => {
                if let Some(e) = &error {
                    log_warn!(self.logger, "Audio source failed: {}", e);
                }
                self.session = None;
                self.telemetry.record_stream_end(error);
                self.handle.shared().status.set(SessionStatus::Idle);
                self.write(message)?;
                self.apply_pending();
                Ok(())
            }
        }
    }

    fn send_telemetry(&mut self) -> Result<()> {
        let body = self.telemetry.take_report();
        self.write(OutgoingMessage::json_with_new_id(PATH_TELEMETRY, &body))?;
        self.handle.shared().status.set(SessionStatus::Idle);
        log_debug!(self.logger, "Telemetry sent");

        self.apply_pending();
        Ok(())
    }
}

fn header_line_len(name: &str, value: &str) -> usize {
    name.len() + 2 + value.len() + 2
}
