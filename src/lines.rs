//! Line framing for streamed response bodies.
//!
//! The chat endpoint delivers one event per line. This module turns the chunked body of an
//! HTTP response into complete lines, independent of where the chunk boundaries fall.

use std::io;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;

use crate::observability::{STREAM_BYTES, STREAM_LINES};
use crate::{Error, Result};

/// Splits a byte buffer into lines ended by `\n`, `\r\n` or a lone `\r`.
///
/// Partial lines stay in the buffer until their terminator arrives, so a chunk boundary may
/// fall inside a multi-byte character or between `\r` and `\n`. Lines are decoded as UTF-8
/// only once complete; invalid sequences are replaced rather than failing the stream.
#[derive(Debug, Default, Clone)]
pub struct LineDecoder {
    // Bytes before this offset are known to contain no terminator.
    next_index: usize,
    // The last line ended with `\r` at the end of the buffer; a leading `\n` belongs to it.
    skip_newline: bool,
}

impl LineDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode_line(line: &[u8]) -> String {
    STREAM_LINES.click();
    String::from_utf8_lossy(line).into_owned()
}

impl Decoder for LineDecoder {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        if self.skip_newline {
            match buf.first() {
                None => return Ok(None),
                Some(b'\n') => {
                    let _ = buf.split_to(1);
                }
                Some(_) => {}
            }
            self.skip_newline = false;
        }
        let read_to = buf.len();
        let terminator = buf[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r');
        match terminator {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let line = buf.split_to(end + 1);
                if line[end] == b'\r' {
                    match buf.first() {
                        Some(b'\n') => {
                            let _ = buf.split_to(1);
                        }
                        Some(_) => {}
                        None => self.skip_newline = true,
                    }
                }
                Ok(Some(decode_line(&line[..end])))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        self.skip_newline = false;
        let rest = buf.split_to(buf.len());
        if rest.is_empty() {
            Ok(None)
        } else {
            Ok(Some(decode_line(&rest)))
        }
    }
}

/// Reads complete lines from a stream of byte chunks.
///
/// The returned stream owns `byte_stream`; dropping it, whether after the last line, after
/// an error, or early, releases the underlying body. A failure of `byte_stream` is reported
/// once as [`Error::Streaming`] and ends the stream. Lines delivered before the failure stay
/// delivered.
pub fn read_lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let chunks = byte_stream
        .inspect_ok(|chunk| STREAM_BYTES.count(chunk.len() as u64))
        .map_err(io::Error::other);
    FramedRead::new(StreamReader::new(chunks), LineDecoder::new())
        .map(|line| line.map_err(into_transport_error))
}

fn into_transport_error(err: Error) -> Error {
    match err {
        Error::Io { message, source } => Error::Streaming {
            message: format!("Error in HTTP stream: {message}"),
            source: Some(source),
        },
        other => other,
    }
}
