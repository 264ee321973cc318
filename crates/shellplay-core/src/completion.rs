//! Streaming model completions: server-sent event decoding and text
//! transformation stages.
//!
//! The HTTP request itself lives in the binary; everything here works on any
//! byte stream so it can be exercised without a network.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::config::CompletionConfig;
use crate::decode::Utf8Decoder;
use crate::error::{DemoError, DemoResult};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// JSON body for a streaming messages request.
pub fn request_body(config: &CompletionConfig, prompt: &str) -> Value {
    json!({
        "model": config.model,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": config.max_tokens,
        "stream": true,
    })
}

/// Extract the text of a `content_block_delta` event payload.
///
/// Returns `None` for other event types, empty text, or malformed JSON.
pub fn text_delta(data: &str) -> Option<String> {
    let event: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping malformed event");
            return None;
        }
    };
    if event.get("type").and_then(Value::as_str) != Some("content_block_delta") {
        return None;
    }
    event
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    decoder: Utf8Decoder,
    buffer: String,
    ready: VecDeque<String>,
    done: bool,
}

impl<S> SseState<S> {
    fn feed(&mut self, bytes: &[u8]) {
        let text = self.decoder.push(bytes);
        self.buffer.push_str(&text);

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            if data == DONE_MARKER {
                trace!("stream finished");
                self.done = true;
                self.buffer.clear();
                return;
            }
            if let Some(text) = text_delta(data) {
                self.ready.push_back(text);
            }
        }
    }
}

/// Turn an SSE byte stream into the text deltas it carries.
///
/// The trailing partial line is held until its newline arrives and dropped
/// if the stream ends first. `data: [DONE]` ends the stream. A transport
/// error is yielded once as [`DemoError::Stream`] and ends the stream.
pub fn sse_text_deltas<S, B, E>(bytes: S) -> impl Stream<Item = DemoResult<String>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = SseState {
        inner: Box::pin(bytes),
        decoder: Utf8Decoder::new(),
        buffer: String::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.ready.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => state.feed(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(DemoError::Stream(e.to_string())), state));
                }
                None => state.done = true,
            }
        }
    })
}

/// Split `buffer` at the last space at or before char index `width` (if
/// that index is past the start), otherwise hard-break at `width`.
fn take_line(buffer: &mut String, width: usize) -> Option<String> {
    if width == 0 || buffer.chars().count() < width {
        return None;
    }

    let mut space = None;
    let mut cut = buffer.len();
    for (ci, (bi, c)) in buffer.char_indices().enumerate() {
        if ci == width {
            cut = bi;
        }
        if ci > width {
            break;
        }
        if c == ' ' {
            space = Some((ci, bi));
        }
    }

    let mut line = match space {
        Some((ci, bi)) if ci > 0 => {
            let line = buffer[..bi].to_string();
            buffer.drain(..=bi);
            line
        }
        _ => buffer.drain(..cut).collect(),
    };
    line.push('\n');
    Some(line)
}

/// Re-chunk text into lines of at most `width` characters, preferring to
/// break at spaces. A `width` of 0 passes text through unchanged.
pub fn wrap_lines<S>(chunks: S, width: usize) -> impl Stream<Item = DemoResult<String>>
where
    S: Stream<Item = DemoResult<String>>,
{
    chunks
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(String::new(), move |buffer, item| {
            let mut out = Vec::new();
            match item {
                Some(Ok(chunk)) if width == 0 => out.push(Ok(chunk)),
                Some(Ok(chunk)) => {
                    buffer.push_str(&chunk);
                    while let Some(line) = take_line(buffer, width) {
                        out.push(Ok(line));
                    }
                }
                Some(Err(e)) => out.push(Err(e)),
                None => {
                    if !buffer.is_empty() {
                        out.push(Ok(std::mem::take(buffer)));
                    }
                }
            }
            future::ready(Some(stream::iter(out)))
        })
        .flatten()
}

/// Pass chunks through, adding a `[<n> chars streamed]` marker whenever the
/// running character count crosses a multiple of `interval`. An `interval`
/// of 0 disables the markers.
pub fn annotate_progress<S>(chunks: S, interval: usize) -> impl Stream<Item = DemoResult<String>>
where
    S: Stream<Item = DemoResult<String>>,
{
    chunks
        .scan(0usize, move |total, item| {
            let mut out = Vec::new();
            match item {
                Ok(chunk) => {
                    let before = *total;
                    *total += chunk.chars().count();
                    out.push(Ok(chunk));
                    if interval > 0 && *total / interval > before / interval {
                        out.push(Ok(format!("\n[{} chars streamed]\n", *total)));
                    }
                }
                Err(e) => out.push(Err(e)),
            }
            future::ready(Some(stream::iter(out)))
        })
        .flatten()
}
