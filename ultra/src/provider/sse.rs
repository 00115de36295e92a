//! Incremental parser for chat-completion server-sent events.

use serde_json::Value;

/// One decoded event from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A text fragment of the reply.
    Delta(String),
    /// The `[DONE]` terminator.
    Done,
    /// An error object sent in-band.
    Error(String),
}

/// Buffers raw bytes until complete `\n\n`-terminated frames are available.
///
/// Bytes are kept undecoded until a frame is complete so multi-byte
/// characters split across network chunks survive.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// Feed a network chunk and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
        let mut events = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..split + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..split]);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }

            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => events.extend(map_event(&value)),
                Err(e) => tracing::debug!("Skipping undecodable SSE frame: {e}"),
            }
        }

        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: &Value) -> Option<SseEvent> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown stream error");
        return Some(SseEvent::Error(message.to_string()));
    }

    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|text| !text.is_empty())
        .map(|text| SseEvent::Delta(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_parse_frames_incrementally() {
        let mut parser = SseParser::default();
        let frame = delta_frame("Hello");
        let (head, tail) = frame.split_at(10);

        assert!(parser.feed(head.as_bytes()).is_empty());
        assert_eq!(
            parser.feed(tail.as_bytes()),
            vec![SseEvent::Delta("Hello".to_string())]
        );
        assert_eq!(parser.feed(b"data: [DONE]\n\n"), vec![SseEvent::Done]);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut parser = SseParser::default();
        let frame = delta_frame("héllo");
        let bytes = frame.as_bytes();
        let cut = frame.find('é').unwrap() + 1;

        let mut events = parser.feed(&bytes[..cut]);
        events.extend(parser.feed(&bytes[cut..]));
        assert_eq!(events, vec![SseEvent::Delta("héllo".to_string())]);
    }

    #[test]
    fn test_role_only_and_empty_deltas_are_skipped() {
        let mut parser = SseParser::default();
        let input = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n\
                     : keep-alive\n\n";
        assert!(parser.feed(input.as_bytes()).is_empty());
    }

    #[test]
    fn test_crlf_frames_and_errors() {
        let mut parser = SseParser::default();
        let input = "data: {\"error\":{\"message\":\"rate limited\"}}\r\n\r\n";
        assert_eq!(
            parser.feed(input.as_bytes()),
            vec![SseEvent::Error("rate limited".to_string())]
        );
    }
}
