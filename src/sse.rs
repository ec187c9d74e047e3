//! Server-Sent Events line framing.
//!
//! Incoming chunk boundaries carry no meaning: a frame may be split across
//! chunks, and one chunk may carry many frames. [`FrameBuffer`] reassembles
//! complete lines out of the byte stream, holding back the trailing partial
//! line until the next chunk arrives.

/// SSE field prefixes. Per the framing convention, at most one space
/// immediately after the colon is stripped; further whitespace is payload.
const DATA_PREFIX: &str = "data:";
const EVENT_PREFIX: &str = "event:";

/// One decoded SSE frame: an optional event name and its data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Name from the preceding `event:` line, if any. `None` means the
    /// default `message` event.
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame decoder over a chunked byte stream.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    pending_event: Option<String>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received chunk and collect every frame completed by it.
    ///
    /// Lines are split on `\n` (a trailing `\r` is tolerated); the final
    /// partial line is carried over. Splitting on byte boundaries keeps a
    /// multi-byte UTF-8 sequence straddling two chunks intact.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]);

            if let Some(frame) = self.parse_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Bytes currently held back as an incomplete line.
    pub fn residual_len(&self) -> usize {
        self.buffer.len()
    }

    fn parse_line(&mut self, line: &str) -> Option<SseFrame> {
        // Blank line ends the event; any associated name dies with it.
        if line.is_empty() {
            self.pending_event = None;
            return None;
        }

        if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            return Some(SseFrame {
                event: self.pending_event.take(),
                data: payload.to_string(),
            });
        }

        if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
            let name = name.strip_prefix(' ').unwrap_or(name);
            self.pending_event = Some(name.to_string());
            return None;
        }

        // Comments (leading ':') and unknown fields are ignored.
        None
    }
}
