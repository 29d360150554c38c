use std::borrow::Cow;

use tracing::debug;

/// Gzip member magic number (RFC 1952 §2.3.1): ID1 = 0x1F, ID2 = 0x8B.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// How the body bytes of a session are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentEncoding {
    /// Body is a single gzip member and must be inflated.
    Gzip,
    /// Body is raw UTF-8 text.
    Plain,
}

impl ContentEncoding {
    /// Classify a body from its first bytes.
    ///
    /// Returns `None` when fewer than two bytes are available, since the
    /// magic number cannot be ruled in or out yet.
    pub fn detect(prefix: &[u8]) -> Option<Self> {
        match prefix {
            [a, b, ..] if [*a, *b] == GZIP_MAGIC => Some(Self::Gzip),
            [_, _, ..] => Some(Self::Plain),
            _ => None,
        }
    }

    pub fn is_gzip(self) -> bool {
        self == Self::Gzip
    }
}

/// Latches the gzip decision for one session.
///
/// The decision is taken on the first two bytes ever seen, not on the
/// first sub-chunk: empty sub-chunks are ignored and a sub-chunk shorter
/// than two bytes is held back until more input arrives. Once decided the
/// encoding never changes.
///
/// ```text
///   push([])        → None              (nothing seen yet)
///   push([0x1F])    → None              (byte held)
///   push([0x8B, …]) → Some(Gzip, [0x1F, 0x8B, …])
///   push([…])       → Some(Gzip, […])   (latched)
/// ```
#[derive(Debug, Default)]
pub struct MagicSniffer {
    held: Vec<u8>,
    decision: Option<ContentEncoding>,
}

impl MagicSniffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latched encoding, if it has been decided.
    pub fn decision(&self) -> Option<ContentEncoding> {
        self.decision
    }

    /// Offer the next sub-chunk.
    ///
    /// Returns the encoding together with the bytes that are now ready for
    /// processing, which include any bytes held back from earlier calls.
    /// Returns `None` while the decision is still pending.
    pub fn push<'a>(&mut self, bytes: &'a [u8]) -> Option<(ContentEncoding, Cow<'a, [u8]>)> {
        if let Some(encoding) = self.decision {
            return Some((encoding, Cow::Borrowed(bytes)));
        }

        if self.held.is_empty() {
            if let Some(encoding) = ContentEncoding::detect(bytes) {
                self.latch(encoding);
                return Some((encoding, Cow::Borrowed(bytes)));
            }
        }

        self.held.extend_from_slice(bytes);
        let encoding = ContentEncoding::detect(&self.held)?;
        self.latch(encoding);
        Some((encoding, Cow::Owned(std::mem::take(&mut self.held))))
    }

    /// Resolve the decision at end of stream.
    ///
    /// A body that never reached two bytes is plain text; the held bytes
    /// (possibly empty) are returned for processing.
    pub fn finish(&mut self) -> (ContentEncoding, Vec<u8>) {
        if let Some(encoding) = self.decision {
            return (encoding, Vec::new());
        }
        self.latch(ContentEncoding::Plain);
        (ContentEncoding::Plain, std::mem::take(&mut self.held))
    }

    fn latch(&mut self, encoding: ContentEncoding) {
        debug!(?encoding, "content encoding decided");
        self.decision = Some(encoding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gzip_magic() {
        assert_eq!(ContentEncoding::detect(&[0x1F, 0x8B, 0x08]), Some(ContentEncoding::Gzip));
        assert_eq!(ContentEncoding::detect(b"id,val\n"), Some(ContentEncoding::Plain));
        assert_eq!(ContentEncoding::detect(&[0x1F]), None);
        assert_eq!(ContentEncoding::detect(&[]), None);
    }

    #[test]
    fn sniffer_decides_on_first_full_chunk() {
        let mut sniffer = MagicSniffer::new();
        let (encoding, bytes) = sniffer.push(b"a,b\n").unwrap();
        assert_eq!(encoding, ContentEncoding::Plain);
        assert!(matches!(bytes, Cow::Borrowed(b"a,b\n")));
    }

    #[test]
    fn sniffer_skips_empty_and_holds_short_chunks() {
        let mut sniffer = MagicSniffer::new();
        assert!(sniffer.push(&[]).is_none());
        assert!(sniffer.push(&[0x1F]).is_none());
        assert!(sniffer.decision().is_none());

        let (encoding, bytes) = sniffer.push(&[0x8B, 0x08, 0x00]).unwrap();
        assert_eq!(encoding, ContentEncoding::Gzip);
        assert_eq!(bytes.as_ref(), &[0x1F, 0x8B, 0x08, 0x00]);
    }

    #[test]
    fn sniffer_never_reevaluates() {
        let mut sniffer = MagicSniffer::new();
        sniffer.push(b"xy").unwrap();
        let (encoding, _) = sniffer.push(&GZIP_MAGIC).unwrap();
        assert_eq!(encoding, ContentEncoding::Plain);
    }

    #[test]
    fn finish_resolves_short_body_as_plain() {
        let mut sniffer = MagicSniffer::new();
        assert!(sniffer.push(b"x").is_none());
        let (encoding, held) = sniffer.finish();
        assert_eq!(encoding, ContentEncoding::Plain);
        assert_eq!(held, b"x");
        assert_eq!(sniffer.decision(), Some(ContentEncoding::Plain));
    }
}
