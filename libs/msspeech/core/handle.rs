use crate::core::connection_state::{
    AtomicConnectionState, AtomicMetrics, AtomicSessionStatus, ConnectionState, Metrics,
    SessionStatus,
};
use crate::protocol::ids;
use crate::traits::audio::AudioSource;
use crate::traits::error::{Result, SpeechError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wakes the service loop so queued requests are applied promptly
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// A start request waiting for the next service step
pub(crate) struct PendingStream {
    pub(crate) source: Box<dyn AudioSource>,
    pub(crate) request_id: String,
}

pub(crate) struct ConnectionShared {
    key: u64,
    pub(crate) connection_id: Mutex<Option<String>>,
    pub(crate) state: AtomicConnectionState,
    pub(crate) status: AtomicSessionStatus,
    pub(crate) metrics: AtomicMetrics,
    pub(crate) pending_stream: Mutex<Option<PendingStream>>,
    pub(crate) resume_requested: AtomicBool,
    waker: Waker,
}

/// Thread-safe handle to one connection
///
/// Cheap to clone. Operations only validate the current state and queue a
/// request; the state machine applies it inside the next service step.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    pub(crate) fn new(key: u64, waker: Waker) -> Self {
        Self {
            shared: Arc::new(ConnectionShared {
                key,
                connection_id: Mutex::new(None),
                state: AtomicConnectionState::new(ConnectionState::Disconnected),
                status: AtomicSessionStatus::new(SessionStatus::None),
                metrics: AtomicMetrics::new(),
                pending_stream: Mutex::new(None),
                resume_requested: AtomicBool::new(false),
                waker,
            }),
        }
    }

    pub(crate) fn shared(&self) -> &ConnectionShared {
        &self.shared
    }

    /// Key of this connection inside its context
    pub fn key(&self) -> u64 {
        self.shared.key
    }

    /// Connection id sent in the upgrade request, once generated
    pub fn connection_id(&self) -> Option<String> {
        self.shared.connection_id.lock().clone()
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn status(&self) -> SessionStatus {
        self.shared.status.get()
    }

    pub fn metrics(&self) -> Metrics {
        let m = &self.shared.metrics;
        Metrics {
            messages_sent: m.messages_sent(),
            messages_received: m.messages_received(),
            audio_packets_sent: m.audio_packets_sent(),
            decode_errors: m.decode_errors(),
            connection_state: self.connection_state(),
            session_status: self.status(),
        }
    }

    /// Begin streaming audio from `source`
    ///
    /// Legal only while connected and idle. `request_id` may be any textual
    /// UUID; a fresh one is generated when absent. Returns the normalised
    /// request id stamped on the audio frames.
    pub fn start_stream<S>(&self, source: S, request_id: Option<&str>) -> Result<String>
    where
        S: AudioSource + 'static,
    {
        let request_id = match request_id {
            Some(id) => ids::normalize_request_id(id)?,
            None => ids::generate_id(),
        };

        {
            let mut pending = self.shared.pending_stream.lock();
            let state = self.connection_state();
            let status = self.status();
            if state != ConnectionState::Connected || status != SessionStatus::Idle {
                return Err(SpeechError::InvalidState(format!(
                    "cannot start stream while {:?}/{:?}",
                    state, status
                )));
            }
            if pending.is_some() {
                return Err(SpeechError::InvalidState(
                    "a stream start is already pending".to_string(),
                ));
            }

            *pending = Some(PendingStream {
                source: Box::new(source),
                request_id: request_id.clone(),
            });
        }

        self.wake();
        Ok(request_id)
    }

    /// Continue a stream whose source previously returned `WouldBlock`
    pub fn resume_stream(&self) -> Result<()> {
        let status = self.status();
        if !self.shared.state.is_connected() || status != SessionStatus::StreamingBlocked {
            return Err(SpeechError::InvalidState(format!(
                "cannot resume stream while {:?}",
                status
            )));
        }

        self.shared.resume_requested.store(true, Ordering::Release);
        self.wake();
        Ok(())
    }

    pub(crate) fn wake(&self) {
        (self.shared.waker)();
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("key", &self.shared.key)
            .field("state", &self.connection_state())
            .field("status", &self.status())
            .finish()
    }
}
