//! Streaming response assembly.
//!
//! Turns the chat backend's byte stream into incremental text deltas for the
//! UI plus one accumulated buffer that becomes the persisted message.  Chunk
//! boundaries are arbitrary, so decoding buffers any trailing incomplete
//! UTF-8 sequence until the next chunk completes it.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::Result;

/// Incremental UTF-8 decoder.
///
/// [`feed`] returns every completely-decoded character from the chunk;
/// an incomplete trailing sequence is held back for the next call.  Invalid
/// bytes decode to U+FFFD rather than failing the stream.
///
/// [`feed`]: Utf8StreamDecoder::feed
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Decode the next chunk, returning the newly completed text.
    pub fn feed(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            // Incomplete multi-byte sequence at the chunk
                            // boundary; wait for the rest.
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream.  A dangling partial sequence decodes lossily.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

/// Drive a byte stream to completion.
///
/// `on_delta` fires once per decoded chunk, in arrival order.  The return
/// value is the complete accumulated text, gathered independently of whatever
/// the delta callback did with it -- the persisted copy is written from this
/// buffer, never re-read from UI state.
///
/// A stream error stops assembly immediately and propagates; the caller is
/// responsible for substituting its failure message (there is no retry or
/// resume at this layer).
pub async fn assemble<S, F>(mut body: S, mut on_delta: F) -> Result<String>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
    F: FnMut(&str),
{
    let mut decoder = Utf8StreamDecoder::default();
    let mut accumulated = String::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let delta = decoder.feed(&chunk);
        if !delta.is_empty() {
            accumulated.push_str(&delta);
            on_delta(&delta);
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        accumulated.push_str(&tail);
        on_delta(&tail);
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use futures::stream;

    #[test]
    fn decoder_joins_split_multibyte_sequence() {
        let mut decoder = Utf8StreamDecoder::default();
        // "é" is 0xC3 0xA9; split it across chunks.
        assert_eq!(decoder.feed(b"caf\xC3"), "caf");
        assert_eq!(decoder.feed(b"\xA9!"), "é!");
    }

    #[test]
    fn decoder_joins_four_byte_emoji_split_three_ways() {
        let mut decoder = Utf8StreamDecoder::default();
        let emoji = "🎭".as_bytes(); // F0 9F 8E AD
        assert_eq!(decoder.feed(&emoji[..1]), "");
        assert_eq!(decoder.feed(&emoji[1..3]), "");
        assert_eq!(decoder.feed(&emoji[3..]), "🎭");
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8StreamDecoder::default();
        assert_eq!(decoder.feed(b"ok\xFFok"), "ok\u{FFFD}ok");
    }

    #[test]
    fn finish_flushes_dangling_sequence_lossily() {
        let mut decoder = Utf8StreamDecoder::default();
        assert_eq!(decoder.feed(b"end\xC3"), "end");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[tokio::test]
    async fn assemble_accumulates_in_arrival_order() {
        let chunks: Vec<crate::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"Hello, ")),
            Ok(Bytes::from_static(b"wor")),
            Ok(Bytes::from_static(b"ld")),
        ];
        let mut deltas = Vec::new();
        let text = assemble(stream::iter(chunks), |d| deltas.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "Hello, world");
        assert_eq!(deltas, vec!["Hello, ", "wor", "ld"]);
    }

    #[tokio::test]
    async fn assemble_stops_on_stream_error() {
        let chunks: Vec<crate::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(ClientError::Stream("connection reset".into())),
            Ok(Bytes::from_static(b"never seen")),
        ];
        let mut deltas = Vec::new();
        let err = assemble(stream::iter(chunks), |d| deltas.push(d.to_string()))
            .await
            .expect_err("stream error should propagate");

        assert!(matches!(err, ClientError::Stream(_)));
        assert_eq!(deltas, vec!["partial"]);
    }
}
