//! Common test utilities for msspeech integration tests
//!
//! - `MockTransport`: records writes and writable requests for driving a
//!   `Connection` by hand
//! - `Recorder`: callbacks that log everything they see
//! - `MockSpeechServer`: a scripted speech service on a local WebSocket

#![allow(dead_code)]

use msspeech::protocol::codec::{InboundAssembler, ParseStep, ParsedMessage};
use msspeech::*;
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Transport that keeps everything written to it
#[derive(Default)]
pub struct MockTransport {
    pub writable_requests: usize,
    pub writable_pending: bool,
    pub written: Vec<WsMessage>,
}

impl MockTransport {
    /// Writable request raised since the last call
    pub fn take_writable(&mut self) -> bool {
        std::mem::replace(&mut self.writable_pending, false)
    }

    pub fn take_written(&mut self) -> Vec<WsMessage> {
        std::mem::take(&mut self.written)
    }
}

impl Transport for MockTransport {
    fn request_writable(&mut self) {
        self.writable_requests += 1;
        self.writable_pending = true;
    }

    fn write(&mut self, message: WsMessage) -> Result<()> {
        self.written.push(message);
        Ok(())
    }
}

/// An outgoing frame taken apart again
#[derive(Debug, Clone)]
pub struct Frame {
    pub binary: bool,
    pub parsed: ParsedMessage,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn path(&self) -> &str {
        &self.parsed.path
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("frame body is not JSON")
    }
}

/// Split a client frame into headers and body
pub fn decode_frame(message: &WsMessage) -> Frame {
    let (binary, bytes) = match message {
        WsMessage::Text(text) => (false, text.as_bytes().to_vec()),
        WsMessage::Binary(data) => {
            let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
            assert!(data.len() >= 2 + header_len, "header length prefix out of range");
            (true, data[2..].to_vec())
        }
    };

    let split = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("frame has no header terminator");
    let body = bytes[split + 4..].to_vec();

    let mut assembler = InboundAssembler::new(Logger::default());
    let headers_only = &bytes[..split + 4];
    let parsed = match assembler.push(headers_only, true).expect("frame headers parse") {
        ParseStep::Complete(parsed) => parsed,
        ParseStep::Partial => unreachable!("final delivery completes"),
    };

    Frame { binary, parsed, body }
}

/// Server message in wire form
pub fn service_frame(path: &str, body: &str) -> Vec<u8> {
    format!(
        "X-RequestId: 0f8fad5bd9cb469fa16570867728950e\r\nContent-Type: application/json; charset=utf-8\r\nPath: {}\r\n\r\n{}",
        path, body
    )
    .into_bytes()
}

/// Everything a `Recorder` saw
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Established,
    ConnectionError(u16, String),
    Closed,
    ClientReady,
    StartDetected(f64),
    EndDetected(Option<f64>),
    Hypothesis(String),
    Result {
        status: RecognitionStatus,
        detailed: bool,
        displays: Vec<String>,
        confidences: Vec<f64>,
    },
    TurnStart(String),
    TurnEnd,
}

/// Callbacks that record every notification
pub struct Recorder {
    pub events: Arc<Mutex<Vec<Recorded>>>,
    pub auth_header: Option<String>,
    /// Audio streamed as soon as the client is ready
    pub audio_on_ready: Option<Vec<u8>>,
    pub stream_errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> (Self, Arc<Mutex<Vec<Recorded>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: events.clone(),
                auth_header: None,
                audio_on_ready: None,
                stream_errors: Arc::new(Mutex::new(Vec::new())),
            },
            events,
        )
    }

    pub fn with_auth(mut self, header: &str) -> Self {
        self.auth_header = Some(header.to_string());
        self
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio_on_ready = Some(audio);
        self
    }

    fn push(&self, event: Recorded) {
        self.events.lock().push(event);
    }
}

impl SpeechCallbacks for Recorder {
    fn connection_established(&mut self, _c: &ConnectionHandle) {
        self.push(Recorded::Established);
    }

    fn connection_error(&mut self, _c: &ConnectionHandle, http_status: u16, message: &str) {
        self.push(Recorded::ConnectionError(http_status, message.to_string()));
    }

    fn connection_closed(&mut self, _c: &ConnectionHandle) {
        self.push(Recorded::Closed);
    }

    fn client_ready(&mut self, connection: &ConnectionHandle) {
        self.push(Recorded::ClientReady);
        if let Some(audio) = self.audio_on_ready.take() {
            let source = ReaderSource::new(std::io::Cursor::new(audio));
            if let Err(e) = connection.start_stream(source, None) {
                self.stream_errors.lock().push(e.to_string());
            }
        }
    }

    fn authentication_header(&mut self, _c: &ConnectionHandle, _max_len: usize) -> Option<String> {
        self.auth_header.clone()
    }

    fn speech_start_detected(&mut self, _c: &ConnectionHandle, message: &SpeechStartDetected<'_>) {
        self.push(Recorded::StartDetected(message.offset));
    }

    fn speech_end_detected(&mut self, _c: &ConnectionHandle, message: &SpeechEndDetected<'_>) {
        self.push(Recorded::EndDetected(message.offset));
    }

    fn speech_hypothesis(&mut self, _c: &ConnectionHandle, message: &SpeechHypothesis<'_>) {
        self.push(Recorded::Hypothesis(message.text.to_string()));
    }

    fn speech_result(&mut self, _c: &ConnectionHandle, message: &SpeechResult<'_>) {
        self.push(Recorded::Result {
            status: message.status,
            detailed: message.is_detailed,
            displays: message.phrases.iter().map(|p| p.display.clone()).collect(),
            confidences: message.phrases.iter().map(|p| p.confidence).collect(),
        });
    }

    fn turn_start(&mut self, _c: &ConnectionHandle, message: &TurnStart<'_>) {
        self.push(Recorded::TurnStart(message.service_tag.to_string()));
    }

    fn turn_end(&mut self, _c: &ConnectionHandle, _message: &TurnEnd<'_>) {
        self.push(Recorded::TurnEnd);
    }
}

/// What the mock service saw from the client
#[derive(Debug, Default)]
pub struct ServerLog {
    pub connection_id: Option<String>,
    pub auth: Option<String>,
    pub paths: Vec<String>,
    pub audio_bytes: usize,
    pub telemetry: Vec<Value>,
}

/// Scripted speech service
///
/// Accepts any connection carrying `Ocp-Apim-Subscription-Key` (401
/// otherwise). Once the closing audio frame arrives it answers with a full
/// turn, then closes after the client's telemetry.
pub struct MockSpeechServer {
    pub addr: SocketAddr,
    pub log: Arc<Mutex<ServerLog>>,
    shutdown: Arc<Notify>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl MockSpeechServer {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let log = Arc::new(Mutex::new(ServerLog::default()));

        let shutdown_clone = shutdown.clone();
        let log_clone = log.clone();
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let log = log_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, log).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            log,
            shutdown,
            runtime: Some(runtime),
        }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, log: Arc<Mutex<ServerLog>>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::{http, Message};

        let handshake_log = log.clone();
        let check = move |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            let header = |name: &str| {
                request
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let mut log = handshake_log.lock();
            log.connection_id = header("X-ConnectionId");
            log.auth = header("Ocp-Apim-Subscription-Key");
            if log.auth.is_none() {
                let mut reject = ErrorResponse::new(Some("missing subscription key".to_string()));
                *reject.status_mut() = http::StatusCode::UNAUTHORIZED;
                return Err(reject);
            }
            Ok(response)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, check).await {
            Ok(ws) => ws,
            Err(_) => return,
        };
        let (mut write, mut read) = ws_stream.split();

        while let Some(Ok(msg)) = read.next().await {
            let wire = match &msg {
                Message::Text(text) => WsMessage::Text(text.clone()),
                Message::Binary(data) => WsMessage::Binary(data.clone()),
                Message::Close(_) => break,
                _ => continue,
            };
            let frame = decode_frame(&wire);
            crate::verbose_println!("server received {}", frame.path());
            log.lock().paths.push(frame.path().to_string());

            match frame.path() {
                "audio" if frame.body.is_empty() => {
                    for (path, body) in Self::turn_script() {
                        let text = String::from_utf8(service_frame(path, body)).unwrap();
                        if write.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                }
                "audio" => log.lock().audio_bytes += frame.body.len(),
                "telemetry" => {
                    log.lock().telemetry.push(frame.json());
                    let _ = write.send(Message::Close(None)).await;
                }
                _ => {}
            }
        }
    }

    fn turn_script() -> Vec<(&'static str, &'static str)> {
        vec![
            ("turn.start", r#"{"context":{"serviceTag":"svc-7"}}"#),
            ("speech.startDetected", r#"{"Offset":5000000}"#),
            ("speech.hypothesis", r#"{"Text":"hello","Offset":5000000,"Duration":10000000}"#),
            ("speech.endDetected", r#"{"Offset":25000000}"#),
            (
                "speech.phrase",
                r#"{"RecognitionStatus":"Success","DisplayText":"Hello.","Offset":5000000,"Duration":20000000}"#,
            ),
            ("turn.end", ""),
        ]
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/speech/recognition", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockSpeechServer {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
