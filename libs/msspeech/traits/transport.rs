use crate::traits::error::Result;

/// A single outgoing WebSocket message
/// Text frames carry control and telemetry messages, binary frames carry audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Get the message as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WsMessage::Text(_) => None,
            WsMessage::Binary(b) => Some(b),
        }
    }

    /// Check if message is binary
    pub fn is_binary(&self) -> bool {
        matches!(self, WsMessage::Binary(_))
    }

    /// Raw bytes regardless of frame kind
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WsMessage::Text(s) => s.as_bytes(),
            WsMessage::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The duplex message channel a connection runs over
///
/// The protocol layer never performs I/O itself. It asks the transport for a
/// write opportunity and, when the transport later reports one through
/// `Connection::on_writable`, writes at most one message.
///
/// Inbound data is pushed into the connection by whoever drives the transport
/// (`Connection::on_receive`) together with the "final fragment" flag.
pub trait Transport: Send {
    /// Ask to be notified once the transport can accept a write
    fn request_writable(&mut self);

    /// Write one complete message
    fn write(&mut self, message: WsMessage) -> Result<()>;
}
