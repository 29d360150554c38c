use tabstream_wire::DEFAULT_INFLATE_CHUNK_SIZE;

/// Largest slice of a network chunk processed in one step (8 MiB).
pub const DEFAULT_MAX_SUB_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Tuning knobs for a decoding session.
///
/// ```text
/// ┌────────────────────┬──────────┬─────────────────────────────────────────┐
/// │ Field              │ Default  │ Purpose                                 │
/// ├────────────────────┼──────────┼─────────────────────────────────────────┤
/// │ max_sub_chunk_size │ 8 MiB    │ Upper bound on bytes per processing step│
/// │ inflate_chunk_size │ 256 KiB  │ Inflate output fragment size            │
/// │ event_capacity     │ 1        │ Events buffered ahead of the consumer   │
/// └────────────────────┴──────────┴─────────────────────────────────────────┘
/// ```
///
/// `event_capacity` is the backpressure window: with the default of one,
/// the session stops pulling body bytes as soon as a single unread event
/// is waiting. Zero values are treated as one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub max_sub_chunk_size: usize,
    pub inflate_chunk_size: usize,
    pub event_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_sub_chunk_size: DEFAULT_MAX_SUB_CHUNK_SIZE,
            inflate_chunk_size: DEFAULT_INFLATE_CHUNK_SIZE,
            event_capacity: 1,
        }
    }
}
