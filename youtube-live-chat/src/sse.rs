//! Incremental decoding of `text/event-stream` bodies.
//!
//! Chunks from the network do not line up with frame boundaries, so [`SseDecoder`] buffers
//! partial lines and only emits an [`SseEvent`] once its terminating blank line has arrived.

use std::time::Duration;

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// All `data:` lines of the frame joined with `\n`.
    pub data: Option<String>,
    pub event: Option<String>,
    pub id: Option<String>,
    /// Reconnection time requested by the server.
    pub retry: Option<Duration>,
}

impl SseEvent {
    fn is_empty(&self) -> bool {
        self.data.is_none() && self.event.is_none() && self.id.is_none() && self.retry.is_none()
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: SseEvent,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=newline_pos).collect::<Vec<u8>>();
            let line = String::from_utf8_lossy(&line[..newline_pos]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest);
            let line = rest.strip_suffix('\r').unwrap_or(&rest);
            if let Some(event) = self.process_line(line) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.pending.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.pending.id = Some(value.to_string()),
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.pending.retry = Some(Duration::from_millis(millis));
                }
            }
            "retry" => tracing::trace!(value, "ignoring malformed SSE retry"),
            other => tracing::trace!(field = other, "ignoring unknown SSE field"),
        }
        None
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if !self.data_lines.is_empty() {
            self.pending.data = Some(self.data_lines.join("\n"));
            self.data_lines.clear();
        }
        let event = std::mem::take(&mut self.pending);
        (!event.is_empty()).then_some(event)
    }
}
