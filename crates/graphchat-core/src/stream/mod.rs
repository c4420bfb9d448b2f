//! Chat stream decoding: bytes → text → frames → events.
//!
//! - `frame`: `\n\n`-delimited frame reassembly
//! - `decode`: `data: {json}` payloads to typed events
//! - `event`: the event union

mod decode;
mod event;
mod frame;

use encoding_rs::{CoderResult, Decoder, UTF_8};

pub use decode::{DATA_PREFIX, DecodeError, DecodeErrorKind, decode, parse_frame};
pub use event::StreamEvent;
pub use frame::{FRAME_DELIMITER, FrameReassembler};

/// Bytes-to-events pipeline for a single response.
///
/// Keeps the carry-over state of the text decoder and the frame reassembler
/// for one request. Create a fresh pipeline per request.
///
/// Text decoding is streaming UTF-8: a character split across chunks is held
/// back until it completes, and invalid bytes become U+FFFD.
pub struct EventPipeline {
    text: Decoder,
    frames: FrameReassembler,
}

impl Default for EventPipeline {
    fn default() -> Self {
        Self {
            text: UTF_8.new_decoder_without_bom_handling(),
            frames: FrameReassembler::new(),
        }
    }
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_text(&mut self, mut chunk: &[u8], last: bool) -> String {
        let mut text = String::new();
        loop {
            let needed = self
                .text
                .max_utf8_buffer_length(chunk.len())
                .unwrap_or(chunk.len() * 3 + 4);
            text.reserve(needed);
            let (result, read, _) = self.text.decode_to_string(chunk, &mut text, last);
            chunk = &chunk[read..];
            if result == CoderResult::InputEmpty {
                return text;
            }
        }
    }

    /// Pushes one network chunk through the pipeline.
    ///
    /// Returns the decoded events in frame order. Skipped frames (non-data,
    /// malformed, unknown types) do not appear.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.decode_text(chunk, false);
        if text.is_empty() {
            return Vec::new();
        }
        self.frames
            .feed(&text)
            .iter()
            .map(String::as_str)
            .filter_map(decode)
            .collect()
    }

    /// Ends the stream and reports what was left unterminated.
    ///
    /// Returns the number of bytes dropped from a truncated final frame.
    pub fn finish(&mut self) -> usize {
        let mut dropped = 0;
        let tail = self.decode_text(&[], true);
        if !tail.is_empty() {
            self.frames.feed(&tail);
        }
        if let Some(residual) = self.frames.finish() {
            dropped = residual.len();
            tracing::debug!(bytes = dropped, "dropping truncated final frame");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_split_inside_json_yields_one_event() {
        let mut pipeline = EventPipeline::new();
        assert!(pipeline.push(br#"data: {"type":"tok"#).is_empty());
        let events = pipeline.push(b"en\",\"data\":\"Hi\"}\n\n");
        assert_eq!(events, vec![StreamEvent::Token("Hi".to_string())]);
        assert_eq!(pipeline.finish(), 0);
    }

    #[test]
    fn test_pipeline_utf8_split_inside_token() {
        let frame = "data: {\"type\":\"token\",\"data\":\"Dvořák 🎻\"}\n\n".as_bytes();
        let violin = frame
            .windows(4)
            .position(|w| w == "🎻".as_bytes())
            .expect("emoji not found");

        let mut pipeline = EventPipeline::new();
        assert!(pipeline.push(&frame[..violin + 1]).is_empty());
        let events = pipeline.push(&frame[violin + 1..]);
        assert_eq!(events, vec![StreamEvent::Token("Dvořák 🎻".to_string())]);
    }

    #[test]
    fn test_pipeline_byte_at_a_time_matches_whole() {
        let frame = "data: {\"type\":\"token\",\"data\":\"Sinfonía nº 9 – «Neue Welt» 👋\"}\n\n";
        let mut pipeline = EventPipeline::new();
        let mut events = Vec::new();
        for byte in frame.as_bytes() {
            events.extend(pipeline.push(std::slice::from_ref(byte)));
        }
        assert_eq!(
            events,
            vec![StreamEvent::Token("Sinfonía nº 9 – «Neue Welt» 👋".to_string())]
        );
        assert_eq!(pipeline.finish(), 0);
    }

    #[test]
    fn test_pipeline_invalid_byte_becomes_replacement() {
        let mut pipeline = EventPipeline::new();
        let mut chunk = b"data: {\"type\":\"token\",\"data\":\"a".to_vec();
        chunk.push(0xFF);
        chunk.extend_from_slice(b"b\"}\n\n");
        assert_eq!(
            pipeline.push(&chunk),
            vec![StreamEvent::Token("a\u{FFFD}b".to_string())]
        );
    }

    #[test]
    fn test_pipeline_dangling_partial_sequence_is_flushed_into_residual() {
        let mut pipeline = EventPipeline::new();
        assert!(pipeline.push(&[b'x', 0xE2, 0x82]).is_empty());
        // "x" plus one U+FFFD (3 bytes) for the incomplete sequence.
        assert_eq!(pipeline.finish(), 4);
    }

    #[test]
    fn test_pipeline_skips_bad_frames_and_keeps_going() {
        let mut pipeline = EventPipeline::new();
        let events = pipeline.push(
            concat!(
                "keep-alive\n\n",
                "data: {not json\n\n",
                "data: {\"type\":\"usage\",\"data\":{}}\n\n",
                "data: {\"type\":\"message\",\"data\":\"ok\"}\n\n",
            )
            .as_bytes(),
        );
        assert_eq!(events, vec![StreamEvent::Token("ok".to_string())]);
    }

    #[test]
    fn test_pipeline_finish_reports_truncated_frame() {
        let mut pipeline = EventPipeline::new();
        pipeline.push(b"data: {\"type\":\"token\",\"data\":\"par");
        assert_eq!(pipeline.finish(), 33);
    }
}
