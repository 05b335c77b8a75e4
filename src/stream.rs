//! Decoder for streamed chat completions (`text/event-stream`).
//!
//! [`SseDecoder`] is a two-state machine fed with raw fragments. It buffers
//! until a newline, handles each complete line, and stops for good at
//! `data: [DONE]`:
//!
//! - blank lines and lines without the `data: ` prefix are ignored;
//! - `data: <json>` becomes a [`StreamChunk`], or is dropped if it does not parse;
//! - end of input without `[DONE]` also ends the stream, dropping any
//!   unterminated last line.
//!
//! The same machine drives a blocking iterator over a line source
//! ([`decode_lines`]) and an async [`ChunkStream`] over a response body
//! ([`chunk_stream`]).

use crate::error::{Result, SdkError};
use crate::types::chat::StreamChunk;

use futures::stream::{Stream, StreamExt};
use std::iter::FusedIterator;
use std::pin::Pin;
use std::time::Duration;

pub const DONE_MARKER: &str = "[DONE]";
const DATA_PREFIX: &str = "data: ";

/// Chunks of one streamed completion, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoderState {
    #[default]
    AwaitingLine,
    Terminated,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    state: DecoderState,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == DecoderState::Terminated
    }

    /// Handle one complete line (without its newline).
    pub fn decode_line(&mut self, line: &str) -> Option<StreamChunk> {
        if self.is_terminated() {
            return None;
        }

        let line = line.trim();
        let data = line.strip_prefix(DATA_PREFIX)?;

        if data == DONE_MARKER {
            self.state = DecoderState::Terminated;
            return None;
        }

        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable chunk");
                None
            }
        }
    }

    /// Append a fragment of the body and return the chunks of every line it
    /// completed. A trailing partial line stays buffered.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        if self.is_terminated() {
            return chunks;
        }

        self.buffer.extend_from_slice(fragment);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let text = String::from_utf8_lossy(&line[..newline_pos]);

            if let Some(chunk) = self.decode_line(&text) {
                chunks.push(chunk);
            }
            if self.is_terminated() {
                self.buffer.clear();
                break;
            }
        }

        chunks
    }

    /// The input ended. Whatever is left in the buffer is discarded.
    pub fn finish(&mut self) {
        self.buffer.clear();
        self.state = DecoderState::Terminated;
    }
}

/// Lazily decode chunks from a source of complete lines.
///
/// Lines are pulled one at a time; nothing after `data: [DONE]` is read.
pub fn decode_lines<I>(lines: I) -> ChunkLines<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ChunkLines {
        lines: lines.into_iter(),
        decoder: SseDecoder::new(),
    }
}

#[derive(Debug)]
pub struct ChunkLines<I> {
    lines: I,
    decoder: SseDecoder,
}

impl<I> Iterator for ChunkLines<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = StreamChunk;

    fn next(&mut self) -> Option<StreamChunk> {
        while !self.decoder.is_terminated() {
            match self.lines.next() {
                Some(line) => {
                    if let Some(chunk) = self.decoder.decode_line(line.as_ref()) {
                        return Some(chunk);
                    }
                }
                None => self.decoder.finish(),
            }
        }
        None
    }
}

impl<I> FusedIterator for ChunkLines<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
}

/// Decode a response body into a [`ChunkStream`].
///
/// Each read waits at most `read_timeout`. A failed or timed-out read is
/// yielded once as an error and ends the stream.
pub fn chunk_stream<S, B, E>(byte_stream: S, read_timeout: Duration) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<SdkError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut emitted = 0usize;
        let mut aborted = false;

        tokio::pin!(byte_stream);

        while !decoder.is_terminated() {
            let next = match tokio::time::timeout(read_timeout, byte_stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!(chunks = emitted, "Stream read timed out");
                    yield Err(SdkError::timeout(format!(
                        "No data received for {}s",
                        read_timeout.as_secs()
                    )));
                    aborted = true;
                    break;
                }
            };

            match next {
                Some(Ok(bytes)) => {
                    for chunk in decoder.push(bytes.as_ref()) {
                        emitted += 1;
                        yield Ok(chunk);
                    }
                }
                Some(Err(e)) => {
                    let err: SdkError = e.into();
                    tracing::warn!(error = %err, chunks = emitted, "Stream aborted");
                    yield Err(err);
                    aborted = true;
                    break;
                }
                None => decoder.finish(),
            }
        }

        if !aborted {
            tracing::info!(chunks = emitted, "Stream completed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::stream;

    fn frame(id: &str, content: &str) -> String {
        format!(
            r#"data: {{"id":"{id}","object":"chat.completion.chunk","created":0,"model":"m","choices":[{{"index":0,"delta":{{"content":"{content}"}}}}]}}"#
        )
    }

    #[test]
    fn test_nothing_after_done_is_emitted() {
        let lines = vec![frame("1", "a"), "data: [DONE]".to_string(), frame("2", "b")];
        let chunks: Vec<_> = decode_lines(lines).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "1");
    }

    #[test]
    fn test_done_stops_pulling_lines() {
        let mut pulled = 0;
        let lines = vec![frame("1", "a"), "data: [DONE]".to_string(), frame("2", "b")]
            .into_iter()
            .inspect(|_| pulled += 1);
        let count = decode_lines(lines).count();
        assert_eq!(count, 1);
        assert_eq!(pulled, 2);
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let lines = vec![frame("1", "a"), "data: {not json".to_string(), frame("2", "b")];
        let ids: Vec<_> = decode_lines(lines).map(|c| c.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_null_object_frame_is_kept() {
        let lines = vec![
            r#"data: {"id":"1","object":null,"created":null,"model":"m","choices":[{"index":0,"delta":{"content":"a"}}]}"#,
            "data: [DONE]",
        ];
        let chunks: Vec<_> = decode_lines(lines).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "1");
        assert_eq!(chunks[0].object, "chat.completion.chunk");
        assert_eq!(chunks[0].delta_content(), Some("a"));
    }

    #[test]
    fn test_blank_and_foreign_lines_ignored() {
        let lines = vec![
            String::new(),
            ": keep-alive".to_string(),
            "event: message".to_string(),
            "data:{\"id\":\"no-space\"}".to_string(),
            frame("1", "a"),
        ];
        let ids: Vec<_> = decode_lines(lines).map(|c| c.id).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_end_without_done_is_clean() {
        let mut iter = decode_lines(vec![frame("1", "a")]);
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_push_reassembles_split_lines() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}\r\n\r\n{}\n", frame("1", "Hel"), frame("2", "lo"));
        let (head, tail) = body.as_bytes().split_at(20);

        assert!(decoder.push(head).is_empty());
        let chunks = decoder.push(tail);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].delta_content(), Some("Hel"));
        assert_eq!(chunks[1].delta_content(), Some("lo"));
        assert_eq!(decoder.state(), DecoderState::AwaitingLine);
    }

    #[test]
    fn test_push_handles_multibyte_split() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}\n", frame("1", "héllo"));
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1; // inside the two-byte sequence

        assert!(decoder.push(&bytes[..split]).is_empty());
        let chunks = decoder.push(&bytes[split..]);
        assert_eq!(chunks[0].delta_content(), Some("héllo"));
    }

    #[test]
    fn test_push_after_done_is_ignored() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}\ndata: [DONE]\n{}\n", frame("1", "a"), frame("2", "b"));
        let chunks = decoder.push(body.as_bytes());
        assert_eq!(chunks.len(), 1);
        assert!(decoder.is_terminated());
        assert!(decoder.push(frame("3", "c").as_bytes()).is_empty());
    }

    #[test]
    fn test_finish_drops_partial_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(frame("1", "a").as_bytes()).is_empty());
        decoder.finish();
        assert!(decoder.is_terminated());
    }

    #[test]
    fn test_chunk_stream_yields_until_done() {
        let body = format!(
            "{}\n{}\ndata: [DONE]\n{}\n",
            frame("1", "a"),
            frame("2", "b"),
            frame("3", "c")
        );
        let pieces: Vec<std::result::Result<Vec<u8>, SdkError>> = body
            .as_bytes()
            .chunks(7)
            .map(|piece| Ok(piece.to_vec()))
            .collect();

        let chunks: Vec<_> = tokio_test::block_on(
            chunk_stream(stream::iter(pieces), Duration::from_secs(5)).collect::<Vec<_>>(),
        );
        let ids: Vec<_> = chunks.into_iter().map(|c| c.unwrap().id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_chunk_stream_surfaces_read_error() {
        let pieces: Vec<std::result::Result<Vec<u8>, SdkError>> = vec![
            Ok(format!("{}\n", frame("1", "a")).into_bytes()),
            Err(SdkError::connection("connection reset")),
            Ok(format!("{}\n", frame("2", "b")).into_bytes()),
        ];

        let items: Vec<_> = tokio_test::block_on(
            chunk_stream(stream::iter(pieces), Duration::from_secs(5)).collect::<Vec<_>>(),
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().id, "1");
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn collect_with_logs(
        pieces: Vec<std::result::Result<Vec<u8>, SdkError>>,
    ) -> (Vec<Result<StreamChunk>>, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        let items = tracing::subscriber::with_default(subscriber, || {
            tokio_test::block_on(
                chunk_stream(stream::iter(pieces), Duration::from_secs(5)).collect::<Vec<_>>(),
            )
        });
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        (items, text)
    }

    #[test]
    fn test_aborted_stream_not_logged_as_completed() {
        let (items, logs) = collect_with_logs(vec![
            Ok(format!("{}\n", frame("1", "a")).into_bytes()),
            Err(SdkError::connection("connection reset")),
        ]);
        assert_eq!(items.len(), 2);
        assert!(logs.contains("Stream aborted"));
        assert!(!logs.contains("Stream completed"));
    }

    #[test]
    fn test_finished_stream_logged_as_completed() {
        let (items, logs) = collect_with_logs(vec![Ok(format!(
            "{}\ndata: [DONE]\n",
            frame("1", "a")
        )
        .into_bytes())]);
        assert_eq!(items.len(), 1);
        assert!(logs.contains("Stream completed"));
        assert!(!logs.contains("Stream aborted"));
    }
}

