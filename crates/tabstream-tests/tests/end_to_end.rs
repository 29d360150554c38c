//! Full sessions: in-memory bodies, a local HTTP server, and cancellation.
//!
//! Row output is rendered as compact JSON and checked with insta inline
//! snapshots, so a change in typing or key order shows up as a readable
//! diff.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use insta::assert_snapshot;
use tabstream_decoder::{DecodeError, DecoderEvent, ErrorKind, StreamingDecoder, decode};
use tabstream_tests::{body, collect_events, even_pieces, gzip, serve_once, split_at};
use tabstream_types::{ParseOptions, Row};
use tokio_util::sync::CancellationToken;

fn render(rows: &[Row]) -> String {
    serde_json::to_string(rows).unwrap()
}

// ── In-memory bodies ──────────────────────────────────────────────────────────

#[tokio::test]
async fn header_and_dynamic_typing_across_two_chunks() {
    let options = ParseOptions::new().with_header(true).with_dynamic_typing(true);
    let events = collect_events(
        StreamingDecoder::new(options).spawn_stream("memory://body", body(split_at(b"id,val\n1,a\n2,b\n", &[9]))),
    )
    .await;

    let mut rows = Vec::new();
    let mut finished = 0;
    let mut errors = 0;
    for event in events {
        match event {
            DecoderEvent::Data(set) => rows.extend(set),
            DecoderEvent::Finished(_) => finished += 1,
            DecoderEvent::Error(_) => errors += 1,
        }
    }
    assert_eq!(finished, 1);
    assert_eq!(errors, 0);
    assert_snapshot!(render(&rows), @r#"[{"id":1,"val":"a"},{"id":2,"val":"b"}]"#);
}

#[tokio::test]
async fn typed_cells_and_extra_fields() {
    let data = "name,qty,ok\nwidget,3,true\ngadget,,FALSE,spare\nbolt,9007199254740993,True\n";
    let options = ParseOptions::new().with_header(true).with_dynamic_typing(true);
    let (rows, stats) = StreamingDecoder::new(options)
        .spawn_stream("memory://typed", body(even_pieces(data.as_bytes(), 10)))
        .into_rows()
        .await
        .unwrap();

    assert_eq!(stats.rows, 3);
    assert_snapshot!(
        render(&rows),
        @r#"[{"name":"widget","qty":3,"ok":true},{"name":"gadget","qty":null,"ok":false,"__parsed_extra":["spare"]},{"name":"bolt","qty":"9007199254740993","ok":true}]"#
    );
}

#[tokio::test]
async fn final_line_without_newline_is_delivered() {
    let (rows, _) = StreamingDecoder::new(ParseOptions::new())
        .spawn_stream("memory://tail", body(split_at(b"1,a\n2,b", &[5])))
        .into_rows()
        .await
        .unwrap();
    assert_snapshot!(render(&rows), @r#"[["1","a"],["2","b"]]"#);
}

#[tokio::test]
async fn parse_errors_end_the_session() {
    let options = ParseOptions::new().with_delimiter('§');
    let failure = StreamingDecoder::new(options)
        .spawn_stream("memory://bad-options", body(vec![Bytes::from_static(b"1,a\n")]))
        .into_rows()
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Processing);
    assert!(matches!(failure.error, DecodeError::Parse(_)));
}

#[tokio::test]
async fn decode_stream_is_a_stream() {
    let stream = StreamingDecoder::new(ParseOptions::new())
        .spawn_stream("memory://body", body(even_pieces(b"1\n2\n3\n", 2)));
    let events: Vec<DecoderEvent> = stream.collect().await;
    assert!(matches!(events.last(), Some(DecoderEvent::Finished(stats)) if stats.rows == 3));
}

// ── Backpressure and cancellation ─────────────────────────────────────────────

/// A body of `count` one-line chunks that counts how many were pulled.
fn counted_body(
    count: usize,
    pulled: Arc<AtomicUsize>,
) -> impl futures_util::Stream<Item = Result<Bytes, std::convert::Infallible>> + Send + 'static {
    stream::iter(0..count).map(move |i| {
        pulled.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("{i},row\n")))
    })
}

#[tokio::test]
async fn idle_consumer_stops_the_pull() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let mut events = StreamingDecoder::new(ParseOptions::new())
        .spawn_stream("memory://slow", counted_body(100, Arc::clone(&pulled)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    // One event buffered, one blocked on send, nothing further requested.
    assert!(pulled.load(Ordering::SeqCst) <= 3, "pulled {}", pulled.load(Ordering::SeqCst));

    let mut rows = 0;
    while let Some(event) = events.next().await {
        if let DecoderEvent::Data(set) = event {
            rows += set.len();
        }
    }
    assert_eq!(rows, 100);
    assert_eq!(pulled.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn cancel_mid_stream_ends_with_cancelled_and_no_finish() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let mut events = StreamingDecoder::new(ParseOptions::new())
        .spawn_stream("memory://cancel", counted_body(1000, Arc::clone(&pulled)));

    assert!(matches!(events.next().await, Some(DecoderEvent::Data(_))));
    events.cancel();

    let mut late_data = 0;
    let mut terminal = None;
    while let Some(event) = events.next().await {
        match event {
            DecoderEvent::Data(_) => late_data += 1,
            other => terminal = Some(other),
        }
    }

    assert!(late_data <= 2, "{late_data} data events after cancel");
    match terminal {
        Some(DecoderEvent::Error(failure)) => {
            assert!(failure.error.is_cancelled());
            assert_eq!(failure.kind(), ErrorKind::Cancelled);
        }
        other => panic!("expected a cancellation error, got {other:?}"),
    }
    assert!(pulled.load(Ordering::SeqCst) < 1000);
}

#[tokio::test]
async fn host_token_cancels_the_session() {
    let host = CancellationToken::new();
    let pulled = Arc::new(AtomicUsize::new(0));
    let mut events = StreamingDecoder::new(ParseOptions::new())
        .with_cancellation(&host)
        .spawn_stream("memory://host", counted_body(1000, Arc::clone(&pulled)));

    assert!(matches!(events.next().await, Some(DecoderEvent::Data(_))));
    host.cancel();

    let last = collect_events(events).await.pop();
    assert!(matches!(last, Some(DecoderEvent::Error(failure)) if failure.error.is_cancelled()));
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_session() {
    let host = CancellationToken::new();
    let decoder = StreamingDecoder::new(ParseOptions::new()).with_cancellation(&host);
    let session = decoder.cancel_token();
    let events = decoder.spawn_stream("memory://dropped", body(vec![Bytes::from_static(b"1\n")]));

    drop(events);
    assert!(session.is_cancelled());
    assert!(!host.is_cancelled());
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// A decoder whose client talks to the local server directly, whatever
/// proxy the environment configures.
fn local_decoder(options: ParseOptions) -> StreamingDecoder {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    StreamingDecoder::new(options).with_client(client)
}

#[tokio::test]
async fn decode_fetches_plain_body_over_http() {
    let url = serve_once("200 OK", b"id,val\n1,a\n2,b\n".to_vec()).await;
    let options = ParseOptions::new().with_header(true).with_dynamic_typing(true);
    let events = local_decoder(options).spawn(url.clone());
    assert_eq!(events.source(), url);

    let (rows, stats) = events.into_rows().await.unwrap();
    assert!(!stats.gzipped);
    assert_snapshot!(render(&rows), @r#"[{"id":1,"val":"a"},{"id":2,"val":"b"}]"#);
}

#[tokio::test]
async fn decode_inflates_gzip_body_over_http() {
    let url = serve_once("200 OK", gzip(b"id,val\n1,a\n2,b\n")).await;
    let options = ParseOptions::new().with_header(true).with_dynamic_typing(true);

    let (rows, stats) = local_decoder(options).spawn(url).into_rows().await.unwrap();
    assert!(stats.gzipped);
    assert_snapshot!(render(&rows), @r#"[{"id":1,"val":"a"},{"id":2,"val":"b"}]"#);
}

#[tokio::test]
async fn error_status_is_a_setup_failure() {
    let url = serve_once("404 Not Found", b"no such table".to_vec()).await;
    let failure = local_decoder(ParseOptions::new())
        .spawn(url.clone())
        .into_rows()
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Setup);
    assert!(matches!(failure.error, DecodeError::HttpStatus { status: 404 }));
    assert!(failure.to_string().starts_with(&format!("Error loading {url} :: ")));
}

#[tokio::test]
async fn unreachable_host_is_a_setup_failure() {
    // Bind then drop, leaving a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let failure = decode(format!("http://{addr}/gone.csv"), ParseOptions::new())
        .into_rows()
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Setup);
    assert!(failure.to_string().starts_with(&format!("Error loading http://{addr}/gone.csv :: ")));
}
