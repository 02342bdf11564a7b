//! Incremental UTF-8 decoding for streamed completions.

use futures::{Stream, StreamExt};

/// Turns arbitrary byte chunks into text chunks without splitting a
/// multi-byte character across two outputs.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` (plus any held-back bytes) as forms complete
    /// characters. Invalid sequences become U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete trailing sequence: keep it for the next chunk
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}

/// Adapt a stream of byte chunks into a stream of non-empty text chunks.
pub fn decode_text_stream<S, B, E>(bytes: S) -> impl Stream<Item = anyhow::Result<String>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    futures::stream::unfold(
        (bytes, Utf8ChunkDecoder::new(), false),
        |(mut bytes, mut decoder, done)| async move {
            if done {
                return None;
            }
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.push(chunk.as_ref());
                        if !text.is_empty() {
                            return Some((Ok(text), (bytes, decoder, false)));
                        }
                    }
                    Some(Err(e)) => return Some((Err(e.into()), (bytes, decoder, true))),
                    None => {
                        return decoder
                            .finish()
                            .map(|rest| (Ok(rest), (bytes, decoder, true)));
                    }
                }
            }
        },
    )
}
