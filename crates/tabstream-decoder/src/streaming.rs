use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tabstream_types::{ParseOptions, Row, RowSet};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DecoderConfig;
use crate::dispatch::{CsvParser, RecordParser};
use crate::error::{DecodeError, StreamFailure};
use crate::fetch;
use crate::session::{Session, SessionStats};

/// Events delivered to the host, in order.
///
/// A session yields zero or more `Data` events followed by exactly one
/// terminal event:
///
/// ```text
///   Data(RowSet)
///   Data(RowSet)
///   ...
///   Finished(SessionStats)  |  Error(StreamFailure)
/// ```
///
/// Cancellation ends with `Error` whose error is
/// [`DecodeError::Cancelled`]; `Finished` is never sent after a cancel.
#[derive(Debug)]
pub enum DecoderEvent {
    /// Rows parsed from one block.
    Data(RowSet),

    /// The body was fully consumed and every row has been delivered.
    Finished(SessionStats),

    /// The session stopped early. Rows already delivered remain valid.
    Error(StreamFailure),
}

impl DecoderEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Data(_))
    }
}

/// Streaming decoder for delimited text served over HTTP.
///
/// Pulls the response body one network chunk at a time, slices oversized
/// chunks into bounded sub-chunks, and runs each through gzip detection,
/// optional inflation, line reconstruction and parsing before asking the
/// body for more. Rows reach the host through a bounded channel, so a
/// slow consumer stalls the network read instead of growing a queue.
///
/// # Example
///
/// ```rust,no_run
/// use tabstream_decoder::{DecoderEvent, StreamingDecoder};
/// use tabstream_types::ParseOptions;
///
/// async fn load(url: &str) {
///     let options = ParseOptions::new().with_header(true).with_dynamic_typing(true);
///     let mut events = StreamingDecoder::new(options).spawn(url);
///     while let Some(event) = events.next().await {
///         match event {
///             DecoderEvent::Data(rows) => println!("{} rows", rows.len()),
///             DecoderEvent::Finished(stats) => println!("done: {stats:?}"),
///             DecoderEvent::Error(failure) => eprintln!("{failure}"),
///         }
///     }
/// }
/// ```
pub struct StreamingDecoder {
    options: ParseOptions,
    config: DecoderConfig,
    parser: Arc<dyn RecordParser>,
    client: Option<reqwest::Client>,
    cancel: CancellationToken,
}

impl StreamingDecoder {
    /// A decoder using [`CsvParser`] and the default [`DecoderConfig`].
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            config: DecoderConfig::default(),
            parser: Arc::new(CsvParser),
            client: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the parser capability.
    #[must_use]
    pub fn with_parser(mut self, parser: impl RecordParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Reuse an existing HTTP client (connection pool, TLS settings).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Tie the session to a host token. Cancelling `token` cancels the
    /// session; cancelling the session leaves `token` untouched.
    #[must_use]
    pub fn with_cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancel = token.child_token();
        self
    }

    /// Token that stops this session when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch `url` and decode its body on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, url: impl Into<String>) -> DecodeStream {
        let url = url.into();
        let (tx, rx) = mpsc::channel(self.config.event_capacity.max(1));
        let stream = DecodeStream::new(rx, self.cancel.clone(), url.clone());

        tokio::spawn(async move {
            let client = self.client.clone().unwrap_or_default();
            let opened = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Err(DecodeError::Cancelled),
                opened = fetch::open(&client, &url) => opened,
            };
            match opened {
                Ok(response) => self.run(&url, response.bytes_stream(), tx).await,
                Err(error) => {
                    warn!(url = %url, %error, "could not open body stream");
                    let _ = tx.send(DecoderEvent::Error(StreamFailure { url, error })).await;
                }
            }
        });

        stream
    }

    /// Decode an already-open byte stream on a background task.
    ///
    /// `source` labels the stream in error messages.
    pub fn spawn_stream<S, E>(self, source: impl Into<String>, body: S) -> DecodeStream
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let source = source.into();
        let (tx, rx) = mpsc::channel(self.config.event_capacity.max(1));
        let stream = DecodeStream::new(rx, self.cancel.clone(), source.clone());
        tokio::spawn(async move { self.run(&source, body, tx).await });
        stream
    }

    /// Decode `body` on the current task, sending every event to `events`.
    ///
    /// Always ends by sending one terminal event (unless the receiver is
    /// already gone).
    pub async fn run<S, E>(self, source: &str, body: S, events: mpsc::Sender<DecoderEvent>)
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        info!(source, header = self.options.header, "decoding session started");
        let cancel = self.cancel.clone();
        let outcome = self.drive(body, events.clone()).await;

        // The receiver may already be dropped; nobody is left to notify.
        let Ok(permit) = events.reserve().await else {
            return;
        };
        // Decided only once the slot is held, so a cancel that lands while
        // waiting for it is still reported.
        let outcome = match outcome {
            Ok(_) if cancel.is_cancelled() => Err(DecodeError::Cancelled),
            other => other,
        };

        let event = match outcome {
            Ok(stats) => {
                info!(source, ?stats, "decoding session finished");
                DecoderEvent::Finished(stats)
            }
            Err(error) => {
                if error.is_cancelled() {
                    warn!(source, "decoding session cancelled");
                } else {
                    error!(source, %error, "decoding session failed");
                }
                DecoderEvent::Error(StreamFailure {
                    url: source.to_owned(),
                    error,
                })
            }
        };
        permit.send(event);
    }

    /// Pull chunks one at a time; each is fully processed before the next
    /// is requested.
    async fn drive<S, E>(
        self,
        body: S,
        events: mpsc::Sender<DecoderEvent>,
    ) -> Result<SessionStats, DecodeError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let max_sub_chunk = self.config.max_sub_chunk_size.max(1);
        let mut session = Session::new(
            self.options,
            self.parser,
            &self.config,
            self.cancel.clone(),
            events,
        );
        let mut body = pin!(body);

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(DecodeError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| {
                if session.stats().chunks == 0 {
                    DecodeError::UnreadableBody(e.into())
                } else {
                    DecodeError::Stream(e.into())
                }
            })?;
            session.record_chunk(chunk.len());
            debug!(
                chunk = session.stats().chunks,
                len = chunk.len(),
                sub_chunks = chunk.len().div_ceil(max_sub_chunk),
                "chunk received"
            );

            for sub_chunk in chunk.chunks(max_sub_chunk) {
                session.process_sub_chunk(sub_chunk).await?;
            }
        }

        session.finish().await
    }
}

/// Receiving end of a spawned session.
///
/// Yields [`DecoderEvent`]s through [`next`](Self::next) or as a
/// [`Stream`]. Dropping it cancels the session.
pub struct DecodeStream {
    events: mpsc::Receiver<DecoderEvent>,
    cancel: CancellationToken,
    source: String,
}

impl DecodeStream {
    fn new(events: mpsc::Receiver<DecoderEvent>, cancel: CancellationToken, source: String) -> Self {
        Self {
            events,
            cancel,
            source,
        }
    }

    /// Next event, or `None` once the terminal event has been taken.
    pub async fn next(&mut self) -> Option<DecoderEvent> {
        self.events.recv().await
    }

    /// Ask the session to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The URL or label this session reads from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Drain the session, concatenating every row in order.
    ///
    /// # Errors
    ///
    /// The session's terminal [`StreamFailure`]. Rows delivered before the
    /// failure are discarded.
    pub async fn into_rows(mut self) -> Result<(Vec<Row>, SessionStats), StreamFailure> {
        let mut rows = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                DecoderEvent::Data(set) => rows.extend(set),
                DecoderEvent::Finished(stats) => return Ok((rows, stats)),
                DecoderEvent::Error(failure) => return Err(failure),
            }
        }
        // The task ended without a terminal event (it panicked or its
        // runtime shut down).
        Err(StreamFailure {
            url: self.source.clone(),
            error: DecodeError::Cancelled,
        })
    }
}

impl Stream for DecodeStream {
    type Item = DecoderEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for DecodeStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Fetch `url` and decode it with the default parser and configuration.
///
/// Shorthand for `StreamingDecoder::new(options).spawn(url)`.
pub fn decode(url: impl Into<String>, options: ParseOptions) -> DecodeStream {
    StreamingDecoder::new(options).spawn(url)
}
