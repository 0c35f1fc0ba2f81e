//! `<length>:<payload>` framing, where the length is the payload size as
//! ASCII decimal. There is no trailing delimiter.

use std::io::{BufRead, Read, Write};

use crate::error::FramingError;

/// Largest payload we will read or write. Maps are the largest messages the
/// server sends; 64 MiB leaves plenty of headroom.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Longest accepted length prefix, not counting the colon.
pub const MAX_PREFIX_DIGITS: usize = 20;

pub fn write_message<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FramingError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::TooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    write!(writer, "{}:", payload.len())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one framed message.
///
/// Returns `FramingError::Closed` if the stream ends cleanly between
/// messages; any other early end is `UnterminatedLength` or `Truncated`.
/// The prefix must start right where the previous payload ended.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, FramingError> {
    if reader.fill_buf()?.is_empty() {
        return Err(FramingError::Closed);
    }

    let mut prefix = Vec::with_capacity(MAX_PREFIX_DIGITS + 1);
    reader
        .by_ref()
        .take(MAX_PREFIX_DIGITS as u64 + 1)
        .read_until(b':', &mut prefix)?;
    if prefix.last() != Some(&b':') {
        if prefix.len() > MAX_PREFIX_DIGITS {
            return Err(FramingError::PrefixTooLong(MAX_PREFIX_DIGITS));
        }
        return Err(FramingError::UnterminatedLength(
            String::from_utf8_lossy(&prefix).into_owned(),
        ));
    }
    prefix.pop(); // Drop colon

    if prefix.is_empty() {
        return Err(FramingError::MissingLength);
    }
    let len = parse_length(&prefix)?;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::TooLarge {
            len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut payload = Vec::with_capacity(len.min(64 * 1024));
    reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() < len {
        return Err(FramingError::Truncated {
            expected: len,
            got: payload.len(),
        });
    }
    Ok(payload)
}

fn parse_length(digits: &[u8]) -> Result<usize, FramingError> {
    let bad = || FramingError::BadLength(String::from_utf8_lossy(digits).into_owned());
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(bad());
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(bytes: &[u8]) -> Result<Vec<u8>, FramingError> {
        read_message(&mut Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn writes_decimal_prefix() {
        let mut buf = Vec::new();
        write_message(&mut buf, br#"{"me":"bob"}"#).unwrap();
        assert_eq!(buf, br#"12:{"me":"bob"}"#.to_vec());
    }

    #[test]
    fn reads_back_what_was_written() {
        let payloads: Vec<&[u8]> = vec![&b""[..], b"x", br#"{"pass":{"punter":0}}"#, &[0xff, b':', 0]];
        let mut buf = Vec::new();
        for p in &payloads {
            write_message(&mut buf, p).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for p in &payloads {
            assert_eq!(read_message(&mut cursor).unwrap(), p.to_vec());
        }
        match read_message(&mut cursor) {
            Err(FramingError::Closed) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }

    #[test]
    fn rejects_whitespace_before_the_prefix() {
        let mut cursor = Cursor::new(b"2:ab\n3:cde".to_vec());
        assert_eq!(read_message(&mut cursor).unwrap(), b"ab".to_vec());
        match read_message(&mut cursor) {
            Err(FramingError::BadLength(s)) => assert_eq!(s, "\n3"),
            other => panic!("expected BadLength, got {:?}", other),
        }
        assert!(matches!(read_all(b" 12:"), Err(FramingError::BadLength(_))));
    }

    #[test]
    fn rejects_missing_length() {
        match read_all(b":{}") {
            Err(FramingError::MissingLength) => {}
            other => panic!("expected MissingLength, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_numeric_length() {
        match read_all(b"1x:{}") {
            Err(FramingError::BadLength(s)) => assert_eq!(s, "1x"),
            other => panic!("expected BadLength, got {:?}", other),
        }
        match read_all(b"-2:{}") {
            Err(FramingError::BadLength(_)) => {}
            other => panic!("expected BadLength, got {:?}", other),
        }
    }

    #[test]
    fn rejects_endless_prefix() {
        let junk = vec![b'9'; 64];
        match read_all(&junk) {
            Err(FramingError::PrefixTooLong(MAX_PREFIX_DIGITS)) => {}
            other => panic!("expected PrefixTooLong, got {:?}", other),
        }
    }

    #[test]
    fn rejects_prefix_cut_short() {
        match read_all(b"12") {
            Err(FramingError::UnterminatedLength(s)) => assert_eq!(s, "12"),
            other => panic!("expected UnterminatedLength, got {:?}", other),
        }
    }

    #[test]
    fn rejects_oversized_length() {
        let frame = format!("{}:", MAX_MESSAGE_SIZE + 1);
        match read_all(frame.as_bytes()) {
            Err(FramingError::TooLarge { len, .. }) => assert_eq!(len, MAX_MESSAGE_SIZE + 1),
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let mut buf = Vec::new();
        assert!(matches!(
            write_message(&mut buf, &big),
            Err(FramingError::TooLarge { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_truncated_payload() {
        match read_all(b"10:abc") {
            Err(FramingError::Truncated { expected, got }) => {
                assert_eq!(expected, 10);
                assert_eq!(got, 3);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
    }
}
