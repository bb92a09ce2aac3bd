//! Line splitting for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks. A chunk may end in the middle of a line
//! or in the middle of a multi-byte UTF-8 character, so both are buffered
//! until the rest arrives.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// Incremental UTF-8 decoder and newline splitter.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Undecoded tail of the last chunk (an incomplete UTF-8 sequence).
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    buf: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completes, without the
    /// trailing newline.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.take_lines()
    }

    /// Signal end of input. Returns the unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.buf.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    self.buf.push_str(text);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    self.buf
                        .push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            start = valid_end;
                            break;
                        }
                        Some(len) => {
                            self.buf.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
    }

    fn take_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.buf.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.buf.split_off(last_newline + 1);
        let mut complete = std::mem::replace(&mut self.buf, rest);
        complete.pop();
        complete.split('\n').map(str::to_string).collect()
    }
}

/// Stream wrapper that turns a byte stream into lines.
///
/// The unterminated remainder is yielded as a final line once the inner
/// stream ends.
pub struct SseLines<S> {
    inner: S,
    decoder: LineDecoder,
    pending_lines: VecDeque<String>,
    finished: bool,
}

impl<S> SseLines<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: LineDecoder::new(),
            pending_lines: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for SseLines<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(line) = this.pending_lines.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending_lines.extend(this.decoder.feed(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    if let Some(rest) = this.decoder.finish() {
                        this.pending_lines.push_back(rest);
                    }
                }
                Poll::Pending => {
                    return Poll::Pending;
                }
            }
        }
    }
}

/// Split a byte stream into lines.
pub fn sse_lines<S, E>(stream: S) -> SseLines<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    SseLines::new(stream)
}
