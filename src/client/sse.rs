//! Incremental Server-Sent Events parser.
//!
//! Handles the subset of the event-stream format the service emits plus the
//! usual tolerances: CRLF line endings, comment lines, multi-line `data`,
//! and frames split across arbitrary chunk boundaries.

/// One dispatched event. `event` defaults to `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes-as-text and returns every event it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.push_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Processes one complete line (with or without its terminator).
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry are not used by this client
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_named_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: new-reading\ndata: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "new-reading".into(),
                data: "{\"a\":1}".into()
            }]
        );
    }

    #[test]
    fn test_frames_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: new-rea").is_empty());
        assert!(parser.feed("ding\r\ndata: x").is_empty());
        let events = parser.feed("y\r\n\r\nevent: other\ndata: z\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "new-reading");
        assert_eq!(events[0].data, "xy");
        assert_eq!(events[1].event, "other");
    }

    #[test]
    fn test_comments_and_empty_frames_are_ignored() {
        let mut parser = SseParser::new();
        let events = parser.feed(": connected\n\n: keepalive\n\nevent: lonely\n\ndata: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "a\nb");
    }
}
