use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced; `event`, `id`, `retry` and comment
/// lines are consumed and ignored.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Events that are already buffered go out before we read more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            // A trailing event without its blank line is dropped.
            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.buf.extend_from_slice(&bytes);
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // The buffer is kept as raw bytes so that a multi-byte character
        // split across two chunks is decoded only once the line is whole.
        //
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        // end-of-line   = ( cr lf / lf )
        loop {
            let mut pos = 0;
            let mut data: Option<String> = None;
            let event_end = loop {
                let Some(len) = self.buf[pos..].iter().position(|&b| b == b'\n')
                else {
                    return Ok(None);
                };
                let mut line = &self.buf[pos..pos + len];
                pos += len + 1;
                if let Some(stripped) = line.strip_suffix(b"\r") {
                    line = stripped;
                }
                if line.is_empty() {
                    break pos;
                }

                let Ok(line) = str::from_utf8(line) else {
                    return Err(Error::InvalidPayload);
                };
                if line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                if field != "data" {
                    continue;
                }
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            };

            // Consume the bytes from the buffer.
            self.buf.drain(..event_end);

            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
    }
}
