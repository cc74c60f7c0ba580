//! Sentinel framing over a continuous byte stream.
//!
//! Each exchange gets a fresh token. The framed script prints
//! `<token>@<cwd>` on stdout and `<token>:<exit code>` on both stdout and
//! stderr once the caller's command has finished. Everything before the
//! first occurrence of the token on a stream belongs to the command.
//!
//! The token is searched for in the raw bytes, either as UTF-8 or as
//! UTF-16LE, and only the slice before it is decoded. Command output can
//! therefore never change how the trailer itself is read.

use encoding_rs::UTF_16LE;
use uuid::Uuid;

use crate::output::OutputCodec;

/// Unique per-exchange framing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
    token: String,
}

impl Sentinel {
    /// Generate a fresh token.
    pub fn new() -> Self {
        Self {
            token: format!("__RELAY_{}__", Uuid::new_v4().simple()),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The bare token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Prefix of the exit-code trailer line.
    pub fn exit_marker(&self) -> String {
        format!("{}:", self.token)
    }

    /// Prefix of the working-directory line.
    pub fn cwd_marker(&self) -> String {
        format!("{}@", self.token)
    }
}

impl Default for Sentinel {
    fn default() -> Self {
        Self::new()
    }
}

/// One stream's share of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded output preceding the sentinel.
    pub body: String,
    /// Exit code reported by the trailer.
    pub exit_code: i32,
    /// Working directory reported after the command, stdout only.
    pub cwd: Option<String>,
}

/// Code unit width the interpreter wrote the trailer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Narrow,
    Wide,
}

impl Width {
    fn unit(self) -> usize {
        match self {
            Self::Narrow => 1,
            Self::Wide => 2,
        }
    }

    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Narrow => text.as_bytes().to_vec(),
            Self::Wide => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        }
    }

    /// Whether the code unit at `at` is the ASCII byte `ch`.
    fn is_ascii_at(self, bytes: &[u8], at: usize, ch: u8) -> bool {
        match self {
            Self::Narrow => bytes.get(at) == Some(&ch),
            Self::Wide => bytes.get(at..at + 2) == Some(&[ch, 0][..]),
        }
    }

    /// First code unit equal to `ch` at or after `from`, stepping by units.
    fn find_ascii(self, bytes: &[u8], from: usize, ch: u8) -> Option<usize> {
        let unit = self.unit();
        (from..bytes.len())
            .step_by(unit)
            .find(|&at| self.is_ascii_at(bytes, at, ch))
    }

    fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Narrow => String::from_utf8_lossy(bytes).into_owned(),
            Self::Wide => UTF_16LE.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    fn decode_body(self, bytes: &[u8]) -> String {
        match self {
            Self::Narrow => OutputCodec::decode(bytes),
            Self::Wide => UTF_16LE.decode(bytes).0.into_owned(),
        }
    }
}

/// Position of `needle` in `haystack` at or after `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    let first = *needle.first()?;
    let mut at = from;
    while at + needle.len() <= haystack.len() {
        at += haystack[at..].iter().position(|b| *b == first)?;
        if haystack[at..].starts_with(needle) {
            return Some(at);
        }
        at += 1;
    }
    None
}

/// Accumulates one stream's bytes until its trailer shows up.
///
/// Each push only scans the bytes that arrived since the previous one,
/// plus enough overlap to catch a token split across chunks.
#[derive(Debug)]
pub struct StreamCapture {
    buf: Vec<u8>,
    narrow: Vec<u8>,
    wide: Vec<u8>,
    cursor: usize,
    body_end: Option<(usize, Width)>,
    cwd_start: Option<usize>,
    exit: Option<(usize, usize)>,
    frame: Option<Frame>,
}

impl StreamCapture {
    /// Create an empty capture waiting for `sentinel`.
    pub fn new(sentinel: &Sentinel) -> Self {
        Self {
            buf: Vec::new(),
            narrow: Width::Narrow.encode(sentinel.token()),
            wide: Width::Wide.encode(sentinel.token()),
            cursor: 0,
            body_end: None,
            cwd_start: None,
            exit: None,
            frame: None,
        }
    }

    /// Append a chunk. Returns `true` once the trailer has been seen.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.frame.is_none() {
            self.buf.extend_from_slice(chunk);
            self.advance();
        }
        self.frame.is_some()
    }

    /// Whether the trailer has been seen.
    pub fn is_complete(&self) -> bool {
        self.frame.is_some()
    }

    /// Decoded command output accumulated so far, for timeouts and failures.
    ///
    /// Stops at the token so framing lines never reach the caller.
    pub fn partial_text(&self) -> String {
        match self.body_end {
            Some((at, width)) => width.decode_body(&self.buf[..at]),
            None => OutputCodec::decode(&self.buf),
        }
    }

    /// Take the completed frame.
    pub fn into_frame(self) -> Option<Frame> {
        self.frame
    }

    fn pattern(&self, width: Width) -> &[u8] {
        match width {
            Width::Narrow => &self.narrow,
            Width::Wide => &self.wide,
        }
    }

    fn find_token(&self, from: usize) -> Option<(usize, Width)> {
        // Once the first token fixes the width, later markers share it.
        if let Some((_, width)) = self.body_end {
            return find(&self.buf, self.pattern(width), from).map(|at| (at, width));
        }
        let narrow = find(&self.buf, &self.narrow, from).map(|at| (at, Width::Narrow));
        let wide = find(&self.buf, &self.wide, from).map(|at| (at, Width::Wide));
        match (narrow, wide) {
            (Some(n), Some(w)) => Some(if w.0 < n.0 { w } else { n }),
            (n, w) => n.or(w),
        }
    }

    fn advance(&mut self) {
        while self.frame.is_none() {
            if let Some((token_at, value_start)) = self.exit {
                let Some((_, width)) = self.body_end else {
                    return;
                };
                if let Some(line_end) = width.find_ascii(&self.buf, value_start, b'\n') {
                    self.frame = Some(self.complete(token_at, value_start, line_end, width));
                }
                return;
            }

            let Some((at, width)) = self.find_token(self.cursor) else {
                let overlap = self.wide.len().saturating_sub(1);
                self.cursor = self.cursor.max(self.buf.len().saturating_sub(overlap));
                return;
            };
            self.body_end.get_or_insert((at, width));

            let after = at + self.pattern(width).len();
            if after + width.unit() > self.buf.len() {
                // Marker character not here yet.
                self.cursor = at;
                return;
            }

            let value_start = after + width.unit();
            if width.is_ascii_at(&self.buf, after, b':') {
                self.exit = Some((at, value_start));
            } else if width.is_ascii_at(&self.buf, after, b'@') && self.cwd_start.is_none() {
                self.cwd_start = Some(value_start);
            }
            self.cursor = after;
        }
    }

    fn complete(&self, token_at: usize, value_start: usize, line_end: usize, width: Width) -> Frame {
        let exit_code = width
            .decode(&self.buf[value_start..line_end])
            .trim()
            .parse::<i32>()
            .unwrap_or(-1);

        let cwd = self
            .cwd_start
            .filter(|start| *start <= token_at)
            .map(|start| width.decode(&self.buf[start..token_at]))
            .and_then(|line| {
                line.split('\n')
                    .next()
                    .map(|cwd| cwd.trim_end_matches('\r').to_string())
            })
            .filter(|cwd| !cwd.is_empty());

        let body_end = self.body_end.map_or(token_at, |(at, _)| at);
        Frame {
            body: width.decode_body(&self.buf[..body_end]),
            exit_code,
            cwd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel() -> Sentinel {
        Sentinel::from_token("__RELAY_test__")
    }

    fn capture(bytes: &[u8]) -> StreamCapture {
        let mut capture = StreamCapture::new(&sentinel());
        capture.push(bytes);
        capture
    }

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = Sentinel::new();
        let b = Sentinel::new();
        assert_ne!(a, b);
        assert!(a.token().starts_with("__RELAY_"));
        assert!(a.token().ends_with("__"));
    }

    #[test]
    fn test_markers() {
        let s = sentinel();
        assert_eq!(s.exit_marker(), "__RELAY_test__:");
        assert_eq!(s.cwd_marker(), "__RELAY_test__@");
    }

    #[test]
    fn test_stdout_frame() {
        let frame = capture(b"hello\n__RELAY_test__@/tmp\n__RELAY_test__:0\n")
            .into_frame()
            .unwrap();
        assert_eq!(frame.body, "hello\n");
        assert_eq!(frame.exit_code, 0);
        assert_eq!(frame.cwd.as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_body_without_trailing_newline() {
        let frame = capture(b"no newline__RELAY_test__@/\n__RELAY_test__:3\n")
            .into_frame()
            .unwrap();
        assert_eq!(frame.body, "no newline");
        assert_eq!(frame.exit_code, 3);
    }

    #[test]
    fn test_stderr_frame() {
        let frame = capture(b"boom\n__RELAY_test__:1\n").into_frame().unwrap();
        assert_eq!(frame.body, "boom\n");
        assert_eq!(frame.exit_code, 1);
        assert!(frame.cwd.is_none());
    }

    #[test]
    fn test_crlf_trailer() {
        let frame = capture(b"item1\r\n__RELAY_test__@C:\\Temp\r\n__RELAY_test__:0\r\n")
            .into_frame()
            .unwrap();
        assert_eq!(frame.body, "item1\r\n");
        assert_eq!(frame.exit_code, 0);
        assert_eq!(frame.cwd.as_deref(), Some("C:\\Temp"));
    }

    #[test]
    fn test_unparseable_exit_code() {
        let frame = capture(b"__RELAY_test__:oops\n").into_frame().unwrap();
        assert_eq!(frame.exit_code, -1);
    }

    #[test]
    fn test_incomplete_trailer() {
        assert!(!capture(b"out\n__RELAY_test__:").is_complete());
        assert!(!capture(b"out\n__RELAY_test__:12").is_complete());
        assert!(!capture(b"out only\n").is_complete());
        assert!(!capture(b"out\n__RELAY_test__").is_complete());
    }

    #[test]
    fn test_foreign_token_ignored() {
        assert!(!capture(b"__RELAY_other__:0\n").is_complete());
    }

    #[test]
    fn test_capture_across_chunks() {
        let mut capture = StreamCapture::new(&sentinel());

        assert!(!capture.push(b"part one "));
        assert!(!capture.push(b"part two\n__RELAY_te"));
        assert!(!capture.is_complete());
        assert!(!capture.push(b"st__"));
        assert!(capture.push(b":0\n"));

        assert_eq!(capture.partial_text(), "part one part two\n");
        let frame = capture.into_frame().unwrap();
        assert_eq!(frame.body, "part one part two\n");
        assert_eq!(frame.exit_code, 0);
    }

    #[test]
    fn test_capture_byte_at_a_time() {
        let mut capture = StreamCapture::new(&sentinel());
        let bytes = b"abc\n__RELAY_test__@/srv\n__RELAY_test__:42\n";
        for (i, byte) in bytes.iter().enumerate() {
            assert_eq!(capture.push(&[*byte]), i == bytes.len() - 1);
        }

        let frame = capture.into_frame().unwrap();
        assert_eq!(frame.body, "abc\n");
        assert_eq!(frame.exit_code, 42);
        assert_eq!(frame.cwd.as_deref(), Some("/srv"));
    }

    #[test]
    fn test_capture_utf16() {
        let bytes = utf16le("wide\r\n__RELAY_test__@C:\\Users\r\n__RELAY_test__:7\r\n");

        let mut capture = StreamCapture::new(&sentinel());
        let (first, second) = bytes.split_at(9);
        capture.push(first);
        assert!(capture.push(second));

        let frame = capture.into_frame().unwrap();
        assert_eq!(frame.body, "wide\r\n");
        assert_eq!(frame.exit_code, 7);
        assert_eq!(frame.cwd.as_deref(), Some("C:\\Users"));
    }

    #[test]
    fn test_nul_heavy_body_keeps_narrow_trailer() {
        let mut bytes = b"x\0".repeat(300);
        bytes.extend_from_slice(b"__RELAY_test__@/\n__RELAY_test__:0\n");

        let mut capture = StreamCapture::new(&sentinel());
        for chunk in bytes.chunks(64) {
            capture.push(chunk);
        }

        assert!(capture.is_complete());
        let frame = capture.into_frame().unwrap();
        assert_eq!(frame.exit_code, 0);
        assert_eq!(frame.cwd.as_deref(), Some("/"));
        assert!(!frame.body.contains("__RELAY_"));
    }

    #[test]
    fn test_large_output_in_small_chunks() {
        let mut capture = StreamCapture::new(&sentinel());
        let line = [b'a'; 99].iter().copied().chain(Some(b'\n')).collect::<Vec<u8>>();
        for _ in 0..20_000 {
            assert!(!capture.push(&line));
        }
        assert!(capture.push(b"__RELAY_test__:0\n"));

        let frame = capture.into_frame().unwrap();
        assert_eq!(frame.body.len(), 2_000_000);
    }

    #[test]
    fn test_partial_text_on_incomplete() {
        let capture = capture(b"partial");
        assert_eq!(capture.partial_text(), "partial");
        assert!(capture.into_frame().is_none());
    }

    #[test]
    fn test_partial_text_stops_at_token() {
        let capture = capture(b"before\n__RELAY_test__@/\n");
        assert!(!capture.is_complete());
        assert_eq!(capture.partial_text(), "before\n");
    }
}
