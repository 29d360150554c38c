//! Shared fixtures for the tabstream integration suite and benches.
//!
//! Bodies are built in memory and cut into network-chunk-sized pieces at
//! chosen offsets, so every test controls exactly where chunk boundaries
//! fall relative to lines, UTF-8 scalars and the gzip header.

use std::convert::Infallible;
use std::io::Write;

use bytes::Bytes;
use futures_util::{Stream, stream};
use tabstream_decoder::{DecodeStream, DecoderConfig, DecoderEvent, StreamingDecoder};
use tabstream_types::ParseOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Deterministic CSV with a header, quoted delimiters and multi-byte text.
///
/// No quoted field contains a newline, so every physical line is one record.
pub fn sample_csv(rows: usize) -> String {
    const CITIES: [&str; 4] = ["Zürich", "東京", "São Paulo", "Reykjavík"];
    let mut out = String::from("id,city,note,score\n");
    for i in 0..rows {
        let city = CITIES[i % CITIES.len()];
        let score = (i * 37) % 1000;
        out.push_str(&format!("{i},{city},\"n{i}, quoted\",{score}.5\n"));
    }
    out
}

/// Gzip `data` as a single member.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

// ── Chunking ──────────────────────────────────────────────────────────────────

/// Cut `data` into pieces of `size` bytes (the last may be shorter).
pub fn even_pieces(data: &[u8], size: usize) -> Vec<Bytes> {
    data.chunks(size.max(1)).map(Bytes::copy_from_slice).collect()
}

/// Cut `data` at the given offsets. Offsets past the end are ignored.
pub fn split_at(data: &[u8], cuts: &[usize]) -> Vec<Bytes> {
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts {
        let cut = cut.min(data.len());
        if cut > start {
            pieces.push(Bytes::copy_from_slice(&data[start..cut]));
            start = cut;
        }
    }
    pieces.push(Bytes::copy_from_slice(&data[start..]));
    pieces
}

/// Cut `data` at pseudo-random offsets drawn from a fixed `seed`.
pub fn scattered_pieces(data: &[u8], seed: u64) -> Vec<Bytes> {
    let mut state = seed.max(1);
    let mut cuts = Vec::new();
    let mut at = 0usize;
    while at < data.len() {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        at += 1 + (state % 97) as usize;
        cuts.push(at);
    }
    split_at(data, &cuts)
}

/// A body stream that yields `pieces` in order and never fails.
pub fn body(pieces: Vec<Bytes>) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::iter(pieces.into_iter().map(Ok))
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// Spawn a session over in-memory `pieces`.
pub fn spawn_pieces(options: ParseOptions, config: DecoderConfig, pieces: Vec<Bytes>) -> DecodeStream {
    StreamingDecoder::new(options)
        .with_config(config)
        .spawn_stream("memory://body", body(pieces))
}

/// Every event a session produced, in order.
pub async fn collect_events(mut stream: DecodeStream) -> Vec<DecoderEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

/// Rows of a session as JSON values, panicking on a failed session.
pub async fn decode_to_json(options: ParseOptions, config: DecoderConfig, pieces: Vec<Bytes>) -> Vec<serde_json::Value> {
    let (rows, _) = spawn_pieces(options, config, pieces)
        .into_rows()
        .await
        .unwrap_or_else(|failure| panic!("session failed: {failure}"));
    rows.into_iter()
        .map(|row| serde_json::to_value(row).expect("rows serialize"))
        .collect()
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// Serve one HTTP/1.1 response on a local port and return its URL.
///
/// The server accepts a single connection, reads the request head, and
/// writes `status` (e.g. `"200 OK"`) with `body`, closing afterwards.
pub async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind local port");
    let addr = listener.local_addr().expect("bound address");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}/data.csv")
}
