//! Raw request/response capture for debugging backend streams.
//!
//! Enabled with `GRAPHCHAT_DEBUG_TRACE=1` (system temp dir) or
//! `GRAPHCHAT_DEBUG_TRACE=<dir>`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::client::ByteStream;

pub const DEBUG_TRACE_ENV: &str = "GRAPHCHAT_DEBUG_TRACE";

static TRACE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct DebugTrace {
    id: String,
    dir: PathBuf,
}

impl DebugTrace {
    pub fn from_env(model: &str) -> Option<Self> {
        let raw = std::env::var(DEBUG_TRACE_ENV).ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let dir = if trimmed == "1" || trimmed.eq_ignore_ascii_case("true") {
            std::env::temp_dir().join("graphchat-trace")
        } else {
            PathBuf::from(trimmed)
        };

        Self::in_dir(&dir, model)
    }

    pub fn in_dir(dir: &Path, model: &str) -> Option<Self> {
        if fs::create_dir_all(dir).is_err() {
            return None;
        }

        let mut safe = model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>();
        safe.truncate(32);

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let counter = TRACE_COUNTER.fetch_add(1, Ordering::Relaxed);

        Some(Self {
            id: format!("{safe}_{ts}_{counter}"),
            dir: dir.to_path_buf(),
        })
    }

    pub fn write_request(&self, body: &[u8]) {
        if let Ok(mut file) = File::create(self.request_path()) {
            let _ = file.write_all(body);
            let _ = file.flush();
        }
    }

    fn response_writer(&self) -> Option<BufWriter<File>> {
        File::create(self.response_path()).ok().map(BufWriter::new)
    }

    pub fn request_path(&self) -> PathBuf {
        self.dir.join(format!("{}_request.json", self.id))
    }

    pub fn response_path(&self) -> PathBuf {
        self.dir.join(format!("{}_response.sse", self.id))
    }
}

/// Copies every chunk to a file on its way through.
struct TeeStream<S> {
    inner: S,
    sink: Option<BufWriter<File>>,
}

impl<S, E> Stream for TeeStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                let mut disable = false;
                if let Some(sink) = &mut self.sink
                    && sink.write_all(&bytes).is_err()
                {
                    disable = true;
                }
                if disable {
                    self.sink = None;
                }
                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(None) => {
                if let Some(sink) = &mut self.sink {
                    let _ = sink.flush();
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<S> Drop for TeeStream<S> {
    fn drop(&mut self) {
        if let Some(sink) = &mut self.sink {
            let _ = sink.flush();
        }
    }
}

/// Tees `stream` into the trace's response file when tracing is on.
pub fn wrap_stream(trace: Option<&DebugTrace>, stream: ByteStream) -> ByteStream {
    match trace.and_then(DebugTrace::response_writer) {
        Some(sink) => TeeStream {
            inner: stream,
            sink: Some(sink),
        }
        .boxed(),
        None => stream,
    }
}
