use std::sync::Arc;

use tabstream_types::{ParseOptions, RowSet};
use tabstream_wire::{ContentEncoding, GzipInflater, MagicSniffer, Utf8Decoder};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::DecoderConfig;
use crate::dispatch::{Dispatch, RecordParser};
use crate::error::DecodeError;
use crate::reconstruct::LineReconstructor;
use crate::streaming::DecoderEvent;

/// Counters for one decoding session, reported with the `Finished` event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Network chunks pulled from the body stream.
    pub chunks: u64,
    /// Raw (possibly compressed) bytes received.
    pub bytes: u64,
    /// Bounded slices processed.
    pub sub_chunks: u64,
    /// Decoded text fragments handed to the line reconstructor.
    pub fragments: u64,
    /// Line-complete blocks handed to the parser.
    pub blocks: u64,
    /// Rows emitted to the consumer.
    pub rows: u64,
    /// Whether the body was gzip-compressed.
    pub gzipped: bool,
}

/// State owned by exactly one decoding run.
///
/// Every stage's mutable state lives here and is touched only from the
/// task driving the session, so nothing is shared or locked.
///
/// ```text
///   sub-chunk ─► MagicSniffer ─► GzipInflater? ─► TextStage ─► events
///                (latched once)   (gzip only)      utf8 → lines → parse
/// ```
pub(crate) struct Session {
    sniffer: MagicSniffer,
    inflater: Option<GzipInflater>,
    text: TextStage,
    stats: SessionStats,
    inflate_chunk_size: usize,
    cancel: CancellationToken,
    events: mpsc::Sender<DecoderEvent>,
}

/// Text half of the pipeline. Split from [`Session`] so fragments can be
/// drained from the inflater while this half is borrowed mutably.
struct TextStage {
    utf8: Utf8Decoder,
    lines: LineReconstructor,
    dispatch: Dispatch,
}

impl Session {
    pub(crate) fn new(
        options: ParseOptions,
        parser: Arc<dyn RecordParser>,
        config: &DecoderConfig,
        cancel: CancellationToken,
        events: mpsc::Sender<DecoderEvent>,
    ) -> Self {
        let dispatch = Dispatch::new(parser, options);
        Self {
            sniffer: MagicSniffer::new(),
            inflater: None,
            text: TextStage {
                utf8: Utf8Decoder::new(),
                lines: LineReconstructor::new(dispatch.header_mode()),
                dispatch,
            },
            stats: SessionStats::default(),
            inflate_chunk_size: config.inflate_chunk_size,
            cancel,
            events,
        }
    }

    pub(crate) fn stats(&self) -> SessionStats {
        self.stats
    }

    pub(crate) fn record_chunk(&mut self, len: usize) {
        self.stats.chunks += 1;
        self.stats.bytes += len as u64;
    }

    /// Run one sub-chunk through every stage, emitting rows as each
    /// fragment is parsed.
    pub(crate) async fn process_sub_chunk(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.check_cancelled()?;
        self.stats.sub_chunks += 1;

        let Some((encoding, bytes)) = self.sniffer.push(bytes) else {
            trace!(len = bytes.len(), "holding bytes until the encoding is known");
            return Ok(());
        };
        self.process_decided(encoding, &bytes).await
    }

    /// Flush every stage at end of stream and return the final counters.
    pub(crate) async fn finish(&mut self) -> Result<SessionStats, DecodeError> {
        self.check_cancelled()?;

        let (encoding, held) = self.sniffer.finish();
        if !held.is_empty() {
            self.process_decided(encoding, &held).await?;
        }

        if let Some(inflater) = self.inflater.as_mut() {
            for fragment in inflater.finish()? {
                self.stats.fragments += 1;
                let text = self.text.utf8.decode(&fragment);
                self.text.push(&text, &mut self.stats, &self.events).await?;
            }
        }

        let tail = self.text.utf8.finish();
        if !tail.is_empty() {
            self.text.push(&tail, &mut self.stats, &self.events).await?;
        }
        if let Some(block) = self.text.lines.finish() {
            self.text.parse_block(&block, &mut self.stats, &self.events).await?;
        }

        Ok(self.stats)
    }

    async fn process_decided(
        &mut self,
        encoding: ContentEncoding,
        bytes: &[u8],
    ) -> Result<(), DecodeError> {
        match encoding {
            ContentEncoding::Gzip => {
                self.stats.gzipped = true;
                let chunk_size = self.inflate_chunk_size;
                let inflater = self
                    .inflater
                    .get_or_insert_with(|| GzipInflater::new(chunk_size));
                for fragment in inflater.feed(bytes) {
                    if self.cancel.is_cancelled() {
                        return Err(DecodeError::Cancelled);
                    }
                    let fragment = fragment?;
                    self.stats.fragments += 1;
                    let text = self.text.utf8.decode(&fragment);
                    self.text.push(&text, &mut self.stats, &self.events).await?;
                }
            }
            ContentEncoding::Plain => {
                self.stats.fragments += 1;
                let text = self.text.utf8.decode(bytes);
                self.text.push(&text, &mut self.stats, &self.events).await?;
            }
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), DecodeError> {
        if self.cancel.is_cancelled() {
            Err(DecodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl TextStage {
    async fn push(
        &mut self,
        fragment: &str,
        stats: &mut SessionStats,
        events: &mpsc::Sender<DecoderEvent>,
    ) -> Result<(), DecodeError> {
        match self.lines.reconstruct(fragment) {
            Some(block) => self.parse_block(&block, stats, events).await,
            None => Ok(()),
        }
    }

    async fn parse_block(
        &mut self,
        block: &str,
        stats: &mut SessionStats,
        events: &mpsc::Sender<DecoderEvent>,
    ) -> Result<(), DecodeError> {
        stats.blocks += 1;
        let rows: RowSet = self.dispatch.parse(block)?;
        trace!(block_len = block.len(), rows = rows.len(), "parsed block");
        if rows.is_empty() {
            return Ok(());
        }
        stats.rows += rows.len() as u64;
        // A closed receiver means nobody is listening any more.
        events
            .send(DecoderEvent::Data(rows))
            .await
            .map_err(|_| DecodeError::Cancelled)
    }
}
