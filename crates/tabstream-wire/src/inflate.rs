use std::io::Write;

use flate2::write::GzDecoder;
use tracing::warn;

use crate::error::WireError;

/// Default fragment size handed downstream by the inflater (256 KiB).
///
/// Also bounds how much compressed input is pushed into the engine per
/// step, so a single sub-chunk never balloons into one huge output
/// buffer.
pub const DEFAULT_INFLATE_CHUNK_SIZE: usize = 256 * 1024;

/// Streaming gzip inflater for one session.
///
/// Wraps a push-mode [`GzDecoder`] whose inner sink is a plain `Vec<u8>`.
/// The engine keeps its dictionary and bit position between calls, so
/// compressed input may be split at any byte offset.
///
/// ```text
///   feed(sub_chunk) ──► Fragments ──► Vec<u8> ≤ chunk_size
///                                 ──► Vec<u8> ≤ chunk_size
///                                 ──► …            (lazily, on next())
///   finish()        ──► remaining fragments, trailer checked
/// ```
///
/// Only a single gzip member is decoded. Bytes after the member trailer
/// are counted and discarded.
pub struct GzipInflater {
    decoder: GzDecoder<Vec<u8>>,
    chunk_size: usize,
    member_done: bool,
    trailing: usize,
}

impl GzipInflater {
    /// Create an inflater emitting fragments of at most `chunk_size` bytes.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            decoder: GzDecoder::new(Vec::new()),
            chunk_size: chunk_size.max(1),
            member_done: false,
            trailing: 0,
        }
    }

    /// Push compressed bytes and iterate the decoded fragments.
    ///
    /// Input is consumed lazily: each call to `next()` writes just enough
    /// input to produce the next fragment. Dropping the iterator early
    /// discards the unconsumed input.
    pub fn feed<'a>(&'a mut self, input: &'a [u8]) -> Fragments<'a> {
        Fragments {
            inflater: self,
            input,
            drained: false,
        }
    }

    /// Number of bytes seen after the end of the gzip member.
    pub fn trailing_bytes(&self) -> usize {
        self.trailing
    }

    /// Finalize the stream and return whatever output is still buffered.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEnd`] if the member never reached
    /// its trailer or the trailer's CRC or size is wrong.
    pub fn finish(&mut self) -> Result<Vec<Vec<u8>>, WireError> {
        self.decoder.try_finish().map_err(WireError::UnexpectedEnd)?;
        if self.trailing > 0 {
            warn!(bytes = self.trailing, "discarded bytes after gzip member");
        }

        let mut out = std::mem::take(self.decoder.get_mut());
        let mut fragments = Vec::new();
        while out.len() > self.chunk_size {
            let rest = out.split_off(self.chunk_size);
            fragments.push(std::mem::replace(&mut out, rest));
        }
        if !out.is_empty() {
            fragments.push(out);
        }
        Ok(fragments)
    }

    /// Split off one full fragment if the sink holds enough output.
    fn take_full(&mut self) -> Option<Vec<u8>> {
        let out = self.decoder.get_mut();
        if out.len() < self.chunk_size {
            return None;
        }
        let rest = out.split_off(self.chunk_size);
        Some(std::mem::replace(out, rest))
    }

    /// Take everything currently in the sink.
    fn take_all(&mut self) -> Option<Vec<u8>> {
        let out = std::mem::take(self.decoder.get_mut());
        (!out.is_empty()).then_some(out)
    }
}

/// Lazy sequence of decoded fragments for one [`GzipInflater::feed`] call.
pub struct Fragments<'a> {
    inflater: &'a mut GzipInflater,
    input: &'a [u8],
    drained: bool,
}

impl Iterator for Fragments<'_> {
    type Item = Result<Vec<u8>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fragment) = self.inflater.take_full() {
                return Some(Ok(fragment));
            }

            if self.inflater.member_done && !self.input.is_empty() {
                self.inflater.trailing += self.input.len();
                self.input = &[];
            }

            if self.input.is_empty() {
                if !self.drained {
                    // A zero-length write flushes the engine's internal
                    // output window into the sink without adding input.
                    self.drained = true;
                    if let Err(e) = self.inflater.decoder.write(&[]) {
                        return Some(Err(WireError::Inflate(e)));
                    }
                    continue;
                }
                return self.inflater.take_all().map(Ok);
            }

            let step = self.input.len().min(self.inflater.chunk_size);
            match self.inflater.decoder.write(&self.input[..step]) {
                Ok(0) => self.inflater.member_done = true,
                Ok(n) => self.input = &self.input[n..],
                Err(e) => {
                    self.input = &[];
                    self.drained = true;
                    return Some(Err(WireError::Inflate(e)));
                }
            }
        }
    }
}
