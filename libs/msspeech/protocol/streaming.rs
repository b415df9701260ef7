use crate::core::logging::{log_warn, Logger};
use crate::protocol::codec::OutgoingMessage;
use crate::traits::audio::{AudioPull, AudioSource};

/// What the connection should do after one pull
#[derive(Debug)]
pub enum StreamStep {
    /// Send this audio frame and ask for another write opportunity
    Packet(OutgoingMessage),
    /// No audio right now; wait for `resume_stream`
    Blocked,
    /// Send the closing audio frame and go back to idle
    Finished {
        message: OutgoingMessage,
        error: Option<String>,
    },
}

/// One pull-driven audio upload
pub struct StreamingSession {
    source: Box<dyn AudioSource>,
    request_id: String,
    buffer: Vec<u8>,
    packets: u64,
}

impl StreamingSession {
    pub fn new(source: Box<dyn AudioSource>, request_id: String, capacity: usize) -> Self {
        Self {
            source,
            request_id,
            buffer: vec![0; capacity.max(1)],
            packets: 0,
        }
    }

    /// Request id stamped on every audio frame of this session
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Audio frames produced so far, excluding the closing frame
    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Pull once from the source into the staging buffer
    pub fn next_step(&mut self, logger: &Logger) -> StreamStep {
        match self.source.pull(&mut self.buffer) {
            AudioPull::WouldBlock => StreamStep::Blocked,
            AudioPull::Data(0) | AudioPull::End => self.finish(None),
            AudioPull::Error(error) => self.finish(Some(error)),
            AudioPull::Data(n) => {
                let capacity = self.buffer.len();
                let n = if n > capacity {
                    log_warn!(
                        logger,
                        "Audio source reported {} bytes for a {} byte buffer, clamping",
                        n,
                        capacity
                    );
                    capacity
                } else {
                    n
                };
                self.packets += 1;
                StreamStep::Packet(OutgoingMessage::audio(self.request_id.as_str(), &self.buffer[..n]))
            }
        }
    }

    fn finish(&self, error: Option<String>) -> StreamStep {
        StreamStep::Finished {
            message: OutgoingMessage::audio(self.request_id.as_str(), &[]),
            error,
        }
    }
}

impl std::fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("request_id", &self.request_id)
            .field("capacity", &self.buffer.len())
            .field("packets", &self.packets)
            .finish()
    }
}
