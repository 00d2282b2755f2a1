//! Newline-delimited JSON stream to [`StreamEvent`] adapter.
//!
//! Ollama streams one JSON object per line. Network chunks do not respect
//! line boundaries, so bytes are buffered until a full line is available.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use cyphernova_types::llm::{LlmError, StreamEvent, Usage};

use super::types::GenerateChunk;

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and drain every complete, non-blank line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// Whatever is left once the byte stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!text.is_empty()).then_some(text)
    }
}

/// Events carried by one decoded line.
pub(crate) fn line_events(line: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let chunk: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| LlmError::Deserialization(format!("invalid stream line: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(LlmError::Provider { message: error });
    }

    let mut events = Vec::new();
    if !chunk.response.is_empty() {
        events.push(StreamEvent::TextDelta {
            text: chunk.response,
        });
    }
    if chunk.done {
        if let (Some(input), Some(output)) = (chunk.prompt_eval_count, chunk.eval_count) {
            events.push(StreamEvent::Usage(Usage {
                input_tokens: input,
                output_tokens: output,
            }));
        }
        events.push(StreamEvent::Done);
    }
    Ok(events)
}

/// Map a streaming `reqwest::Response` body to [`StreamEvent`]s.
pub fn map_ndjson_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut bytes = response.bytes_stream();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| LlmError::Stream(e.to_string()))?;
            for line in lines.push(&chunk) {
                for event in line_events(&line)? {
                    yield event;
                }
            }
        }

        if let Some(line) = lines.finish() {
            for event in line_events(&line)? {
                yield event;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_handles_split_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(br#"{"response":"He"#).is_empty());
        let lines = buffer.push(b"llo\"}\n{\"response\":\" world\"}\n{\"resp");
        assert_eq!(lines, vec![r#"{"response":"Hello"}"#, r#"{"response":" world"}"#]);
        assert_eq!(buffer.finish().as_deref(), Some(r#"{"resp"#));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_buffer_skips_blank_lines() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"\n\r\n{}\n"), vec!["{}"]);
    }

    #[test]
    fn test_line_events_text_and_done() {
        let events = line_events(r#"{"model":"llama3.2","response":"Hi","done":false}"#).unwrap();
        assert!(matches!(&events[..], [StreamEvent::TextDelta { text }] if text == "Hi"));

        let events = line_events(
            r#"{"model":"llama3.2","response":"","done":true,"prompt_eval_count":5,"eval_count":7}"#,
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], StreamEvent::Done));
    }

    #[test]
    fn test_line_events_error_object() {
        let err = line_events(r#"{"error":"model 'llama9' not found"}"#).unwrap_err();
        assert!(err.to_string().contains("llama9"));
    }

    #[test]
    fn test_line_events_invalid_json() {
        assert!(matches!(
            line_events("not json"),
            Err(LlmError::Deserialization(_))
        ));
    }
}
