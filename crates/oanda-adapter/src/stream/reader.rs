/*
[INPUT]:  Open streaming HTTP response body (or any line source) and a cancellation token
[OUTPUT]: Lazily produced, newline-delimited lines
[POS]:    Stream layer - line framing over a long-lived response body
[UPDATE]: When changing framing limits or cancellation behavior
*/

use std::io::ErrorKind;

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader as BodyReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::http::{OandaError, Result};

/// Upper bound on a single stream line
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Single-consumer reader over newline-delimited stream content.
///
/// Lines are produced on demand. The sequence ends at end of body, on the
/// first read error, or once the token is cancelled.
pub struct StreamReader {
    lines: BoxStream<'static, Result<String>>,
    cancel: CancellationToken,
    finished: bool,
    lines_read: u64,
}

impl StreamReader {
    /// Frame an open streaming response body into lines
    pub fn from_response(response: reqwest::Response, cancel: CancellationToken) -> Self {
        let body = BodyReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let lines = FramedRead::new(body, LinesCodec::new_with_max_length(MAX_LINE_BYTES))
            .map_err(|err| match err {
                LinesCodecError::Io(err) if err.kind() == ErrorKind::InvalidData => {
                    OandaError::Malformed(format!("stream line is not valid UTF-8: {err}"))
                }
                LinesCodecError::Io(err) => OandaError::Io(err),
                LinesCodecError::MaxLineLengthExceeded => OandaError::Malformed(format!(
                    "stream line exceeds {MAX_LINE_BYTES} bytes"
                )),
            });
        Self::from_lines(lines, cancel)
    }

    /// Wrap an existing line source
    pub fn from_lines<S>(lines: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            lines: lines.boxed(),
            cancel,
            finished: false,
            lines_read: 0,
        }
    }

    /// Next non-blank line, or `None` once the sequence has ended.
    ///
    /// A read error is yielded once and terminates the sequence. Cancellation
    /// releases the underlying body.
    pub async fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            if self.finished {
                return None;
            }

            let cancel = self.cancel.clone();
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = self.lines.next() => Some(next),
            };
            let Some(next) = next else {
                debug!(lines_read = self.lines_read, "stream reader cancelled");
                self.finish();
                return None;
            };

            match next {
                Some(Ok(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.lines_read += 1;
                    return Some(Ok(line.to_string()));
                }
                Some(Err(err)) => {
                    self.finish();
                    return Some(Err(err));
                }
                None => {
                    debug!(lines_read = self.lines_read, "stream body ended");
                    self.finish();
                    return None;
                }
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Count of non-blank lines yielded so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn finish(&mut self) {
        self.finished = true;
        self.lines = futures_util::stream::empty().boxed();
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("finished", &self.finished)
            .field("lines_read", &self.lines_read)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
