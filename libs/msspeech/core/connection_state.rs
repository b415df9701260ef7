use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Transport-level connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Operational state of the speech session, meaningful while connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionStatus {
    /// No session yet (before handshake, or after close)
    None = 0,
    /// speech.config must be sent on the next write opportunity
    SpeechConfigPending = 1,
    Idle = 2,
    /// Audio is pulled on every write opportunity
    Streaming = 3,
    /// The audio source would block; waiting for resume
    StreamingBlocked = 4,
    /// The turn ended; telemetry goes out on the next write opportunity
    TelemetryPending = 5,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionStatus::SpeechConfigPending,
            2 => SessionStatus::Idle,
            3 => SessionStatus::Streaming,
            4 => SessionStatus::StreamingBlocked,
            5 => SessionStatus::TelemetryPending,
            _ => SessionStatus::None,
        }
    }
}

/// Lock-free connection state, readable from any thread
#[derive(Debug)]
pub struct AtomicConnectionState {
    state: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Returns the previous state on success, the actual state on failure
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        self.state
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }
}

/// Lock-free session status, readable from any thread
///
/// Written only from the service step. Other threads read it to validate
/// requests before queueing them.
#[derive(Debug)]
pub struct AtomicSessionStatus {
    status: AtomicU8,
}

impl AtomicSessionStatus {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            status: AtomicU8::new(status as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, status: SessionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn compare_exchange(
        &self,
        current: SessionStatus,
        new: SessionStatus,
    ) -> Result<SessionStatus, SessionStatus> {
        self.status
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(SessionStatus::from_u8)
            .map_err(SessionStatus::from_u8)
    }
}

/// Per-connection counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    audio_packets_sent: AtomicU64,
    decode_errors: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_audio_packets(&self) {
        self.audio_packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn audio_packets_sent(&self) -> u64 {
        self.audio_packets_sent.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}

/// Connection metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub audio_packets_sent: u64,
    pub decode_errors: u64,
    pub connection_state: ConnectionState,
    pub session_status: SessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_transitions() {
        let state = AtomicConnectionState::new(ConnectionState::Disconnected);
        assert!(!state.is_connected());

        assert_eq!(
            state.compare_exchange(ConnectionState::Disconnected, ConnectionState::Connecting),
            Ok(ConnectionState::Disconnected)
        );
        assert_eq!(
            state.compare_exchange(ConnectionState::Disconnected, ConnectionState::Connected),
            Err(ConnectionState::Connecting)
        );

        state.set(ConnectionState::Connected);
        assert!(state.is_connected());
    }

    #[test]
    fn test_session_status_round_trips_every_value() {
        let status = AtomicSessionStatus::new(SessionStatus::None);
        for value in [
            SessionStatus::SpeechConfigPending,
            SessionStatus::Idle,
            SessionStatus::Streaming,
            SessionStatus::StreamingBlocked,
            SessionStatus::TelemetryPending,
            SessionStatus::None,
        ] {
            status.set(value);
            assert_eq!(status.get(), value);
        }
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = AtomicMetrics::new();
        metrics.increment_sent();
        metrics.increment_sent();
        metrics.increment_received();
        metrics.increment_audio_packets();

        assert_eq!(metrics.messages_sent(), 2);
        assert_eq!(metrics.messages_received(), 1);
        assert_eq!(metrics.audio_packets_sent(), 1);
        assert_eq!(metrics.decode_errors(), 0);
    }
}
