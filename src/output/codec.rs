//! Byte-to-text decoding for interpreter output.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// How many leading bytes are inspected when sniffing for BOM-less UTF-16.
const SNIFF_LEN: usize = 512;

/// Output decoder tolerant of wide-character interpreters.
///
/// Detection order: byte-order mark, then the NUL-byte pattern that
/// BOM-less UTF-16 leaves on mostly-ASCII text, then strict UTF-8, then
/// lossy UTF-8. Decoding never fails; invalid sequences become U+FFFD.
pub struct OutputCodec;

impl OutputCodec {
    /// Decode a complete or partial output buffer.
    pub fn decode(bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            return text.into_owned();
        }

        if let Some(encoding) = sniff_utf16(bytes) {
            let (text, _) = encoding.decode_without_bom_handling(bytes);
            return text.into_owned();
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_owned(),
            Err(_) => {
                let (text, _) = UTF_8.decode_without_bom_handling(bytes);
                text.into_owned()
            }
        }
    }
}

fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    let len = bytes.len().min(SNIFF_LEN) & !1;
    if len < 2 {
        return None;
    }

    let pairs = len / 2;
    let (mut even_zeros, mut odd_zeros) = (0usize, 0usize);
    for (i, byte) in bytes[..len].iter().enumerate() {
        if *byte == 0 {
            if i % 2 == 0 {
                even_zeros += 1;
            } else {
                odd_zeros += 1;
            }
        }
    }

    if odd_zeros * 2 >= pairs && odd_zeros > even_zeros {
        Some(UTF_16LE)
    } else if even_zeros * 2 >= pairs && even_zeros > odd_zeros {
        Some(UTF_16BE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn utf16be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    #[test]
    fn test_plain_utf8() {
        assert_eq!(OutputCodec::decode(b"hello\r\n"), "hello\r\n");
        assert_eq!(OutputCodec::decode("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_empty() {
        assert_eq!(OutputCodec::decode(b""), "");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(utf16le("你好"));
        assert_eq!(OutputCodec::decode(&bytes), "你好");
    }

    #[test]
    fn test_utf16be_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        bytes.extend(utf16be("wide"));
        assert_eq!(OutputCodec::decode(&bytes), "wide");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"ok");
        assert_eq!(OutputCodec::decode(&bytes), "ok");
    }

    #[test]
    fn test_utf16le_without_bom() {
        let bytes = utf16le("item1\r\nitem2\r\n");
        assert_eq!(OutputCodec::decode(&bytes), "item1\r\nitem2\r\n");
    }

    #[test]
    fn test_utf16be_without_bom() {
        let bytes = utf16be("Directory: C:\\");
        assert_eq!(OutputCodec::decode(&bytes), "Directory: C:\\");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let bytes = b"ok \xFF\xFE\xFD tail";
        let text = OutputCodec::decode(bytes);
        assert!(text.starts_with("ok "));
        assert!(text.ends_with(" tail"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_truncated_utf8_sequence() {
        // First two bytes of a three-byte sequence
        let text = OutputCodec::decode(b"abc\xE4\xBD");
        assert!(text.starts_with("abc"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_odd_length_utf16_is_lossy() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(utf16le("ab"));
        bytes.push(b'c');
        let text = OutputCodec::decode(&bytes);
        assert!(text.starts_with("ab"));
    }

    #[test]
    fn test_single_nul_is_not_utf16() {
        assert!(sniff_utf16(b"a\0bcdefgh").is_none());
        assert_eq!(OutputCodec::decode(b"a\0bcdefgh"), "a\0bcdefgh");
    }
}
