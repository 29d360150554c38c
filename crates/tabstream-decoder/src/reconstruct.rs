/// Rebuilds whole-line blocks from text fragments cut at arbitrary points.
///
/// Each call joins the carried partial line from the previous fragment
/// onto the new one, keeps everything after the last `\n` as the next
/// carry, and returns the rest as a block that ends on a line boundary.
///
/// Splitting is on physical lines: a quoted field containing `\n` that
/// straddles two fragments is cut at that newline, so each half reaches
/// the parser in a different block.
///
/// In header mode the first line of the first block is cached and every
/// later block is prefixed with it, so each block parses on its own:
///
/// ```text
///   fragment          carry in   block returned           carry out
///   "id,val\n1,"      ""         "id,val\n"               "1,"
///   "a\n2,b\n"        "1,"       "id,val\n1,a\n2,b\n"     ""
///   "3,c"             ""         (none)                   "3,c"
/// ```
#[derive(Debug, Default)]
pub struct LineReconstructor {
    header_mode: bool,
    carry: String,
    header: Option<String>,
}

impl LineReconstructor {
    pub fn new(header_mode: bool) -> Self {
        Self {
            header_mode,
            ..Self::default()
        }
    }

    /// Feed one fragment. Returns `None` while no complete line is
    /// available; the whole text is then carried forward.
    pub fn reconstruct(&mut self, fragment: &str) -> Option<String> {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(fragment);

        let Some(last_lf) = text.rfind('\n') else {
            self.carry = text;
            return None;
        };
        self.carry = text.split_off(last_lf + 1);
        Some(self.frame(text))
    }

    /// End-of-stream flush: the final unterminated line, framed like any
    /// other block. Whitespace-only leftovers (a lone `\r`, say) are
    /// dropped.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.carry);
        if tail.trim().is_empty() {
            return None;
        }
        Some(self.frame(tail))
    }

    /// Partial line waiting for the next fragment.
    pub fn carry(&self) -> &str {
        &self.carry
    }

    /// Cached header line, including its `\n`.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    fn frame(&mut self, block: String) -> String {
        if !self.header_mode {
            return block;
        }
        match &self.header {
            Some(header) => {
                let mut framed = String::with_capacity(header.len() + block.len());
                framed.push_str(header);
                framed.push_str(&block);
                framed
            }
            None => {
                let end = block.find('\n').map_or(block.len(), |at| at + 1);
                self.header = Some(block[..end].to_owned());
                block
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_last_newline() {
        let mut lines = LineReconstructor::new(false);
        assert_eq!(lines.reconstruct("1,a\n2,").as_deref(), Some("1,a\n"));
        assert_eq!(lines.carry(), "2,");
        assert_eq!(lines.reconstruct("b\n3,c\n").as_deref(), Some("2,b\n3,c\n"));
        assert_eq!(lines.carry(), "");
    }

    #[test]
    fn fragment_without_newline_is_carried_whole() {
        let mut lines = LineReconstructor::new(false);
        assert_eq!(lines.reconstruct("partial"), None);
        assert_eq!(lines.carry(), "partial");
        assert_eq!(lines.reconstruct(" record"), None);
        assert_eq!(lines.carry(), "partial record");
    }

    #[test]
    fn header_is_captured_once_and_prefixed_after() {
        let mut lines = LineReconstructor::new(true);
        assert_eq!(lines.reconstruct("id,val\n1,").as_deref(), Some("id,val\n"));
        assert_eq!(lines.header(), Some("id,val\n"));
        assert_eq!(lines.reconstruct("a\n2,b\n").as_deref(), Some("id,val\n1,a\n2,b\n"));
        assert_eq!(lines.reconstruct("3,c\n").as_deref(), Some("id,val\n3,c\n"));
        assert_eq!(lines.header(), Some("id,val\n"));
    }

    #[test]
    fn header_waits_for_its_newline() {
        let mut lines = LineReconstructor::new(true);
        assert_eq!(lines.reconstruct("id,"), None);
        assert_eq!(lines.header(), None);
        assert_eq!(lines.reconstruct("val\n1,a\n").as_deref(), Some("id,val\n1,a\n"));
        assert_eq!(lines.header(), Some("id,val\n"));
    }

    #[test]
    fn no_header_caching_without_header_mode() {
        let mut lines = LineReconstructor::new(false);
        lines.reconstruct("id,val\n");
        assert_eq!(lines.header(), None);
        assert_eq!(lines.reconstruct("1,a\n").as_deref(), Some("1,a\n"));
    }

    #[test]
    fn finish_flushes_unterminated_last_line() {
        let mut lines = LineReconstructor::new(true);
        lines.reconstruct("id,val\n1,a\n2,b");
        assert_eq!(lines.finish().as_deref(), Some("id,val\n2,b"));
        assert_eq!(lines.carry(), "");
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn finish_drops_whitespace_leftovers() {
        let mut lines = LineReconstructor::new(false);
        lines.reconstruct("1,a\r\n\r");
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn quoted_newline_across_fragments_is_cut() {
        let mut lines = LineReconstructor::new(false);
        assert_eq!(lines.reconstruct("1,\"two").as_deref(), None);
        assert_eq!(lines.reconstruct("\nlines\"\n").as_deref(), Some("1,\"two\nlines\"\n"));

        let mut lines = LineReconstructor::new(false);
        assert_eq!(lines.reconstruct("1,\"two\n").as_deref(), Some("1,\"two\n"));
        assert_eq!(lines.reconstruct("lines\"\n").as_deref(), Some("lines\"\n"));
    }

    #[test]
    fn blocks_and_carry_reassemble_the_input() {
        let input = "id,val\n1,a\n22,bb\n333,ccc\n4444";
        for step in 1..input.len() {
            let mut lines = LineReconstructor::new(false);
            let mut seen = String::new();
            for piece in input.as_bytes().chunks(step) {
                let piece = std::str::from_utf8(piece).unwrap();
                if let Some(block) = lines.reconstruct(piece) {
                    assert!(block.ends_with('\n'));
                    seen.push_str(&block);
                }
            }
            seen.push_str(lines.carry());
            assert_eq!(seen, input, "step {step}");
        }
    }
}
