use std::io::{ErrorKind, Read};

/// Outcome of one audio pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPull {
    /// This many bytes were copied into the staging buffer
    Data(usize),
    /// No audio right now. Streaming pauses until `resume_stream` is called
    WouldBlock,
    /// End of audio
    End,
    /// The source failed; streaming ends and the error is reported in telemetry
    Error(String),
}

/// Pull-based audio source
///
/// Called from inside the service step every time the connection is allowed
/// to send another audio packet. Must return promptly: `WouldBlock` is the
/// only way to defer.
///
/// # Example
/// ```ignore
/// let mut remaining = pcm.as_slice();
/// handle.start_stream(move |buffer: &mut [u8]| {
///     if remaining.is_empty() {
///         return AudioPull::End;
///     }
///     let n = remaining.len().min(buffer.len());
///     buffer[..n].copy_from_slice(&remaining[..n]);
///     remaining = &remaining[n..];
///     AudioPull::Data(n)
/// }, None)?;
/// ```
pub trait AudioSource: Send {
    fn pull(&mut self, buffer: &mut [u8]) -> AudioPull;
}

impl<F> AudioSource for F
where
    F: FnMut(&mut [u8]) -> AudioPull + Send,
{
    fn pull(&mut self, buffer: &mut [u8]) -> AudioPull {
        self(buffer)
    }
}

/// Audio source backed by any `Read`
///
/// `Ok(0)` ends the stream, `ErrorKind::WouldBlock` pauses it, other errors
/// end it with the error text.
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Send> AudioSource for ReaderSource<R> {
    fn pull(&mut self, buffer: &mut [u8]) -> AudioPull {
        loop {
            match self.reader.read(buffer) {
                Ok(0) => return AudioPull::End,
                Ok(n) => return AudioPull::Data(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return AudioPull::WouldBlock,
                Err(e) => return AudioPull::Error(e.to_string()),
            }
        }
    }
}
