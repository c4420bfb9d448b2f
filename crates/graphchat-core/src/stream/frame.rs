//! Frame reassembly for the chat event stream.
//!
//! Events on the wire are separated by a blank line. Chunks arrive with
//! arbitrary boundaries, so frames are cut from a cumulative buffer rather
//! than from individual chunks.

/// Separator between frames on the wire.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Accumulates decoded text and yields complete frames.
///
/// Invariant: `buffer` never contains `FRAME_DELIMITER`.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: String,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame it completed, in arrival order.
    ///
    /// The trailing segment after the last delimiter (possibly empty) is kept
    /// as carry-over for the next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].find(FRAME_DELIMITER) {
            frames.push(self.buffer[start..start + pos].to_string());
            start += pos + FRAME_DELIMITER.len();
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        frames
    }

    /// Text received after the last complete frame.
    pub fn residual(&self) -> &str {
        &self.buffer
    }

    /// Ends the stream, returning the unterminated residual if there was one.
    ///
    /// The residual is never a complete frame; callers drop it.
    pub fn finish(&mut self) -> Option<String> {
        let residual = std::mem::take(&mut self.buffer);
        (!residual.is_empty()).then_some(residual)
    }
}
