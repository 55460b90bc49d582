//! Incremental command parser.
//!
//! This parser is designed for:
//! - Streaming input (can handle partial data)
//! - Deterministic verdicts (a pure function of the buffer contents)
//! - Binary-safe keys and values (length-prefixed, never delimited)

use super::names;
use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};

/// A decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert or overwrite a key
    Put {
        /// Key to write
        key: Bytes,
        /// Value to store
        value: Bytes,
    },
    /// Read a key, optionally truncating the returned value
    Get {
        /// Key to read
        key: Bytes,
        /// Maximum bytes to return; `0` means the whole value
        max_len: usize,
    },
    /// Remove a key (a no-op when absent)
    Delete {
        /// Key to remove
        key: Bytes,
    },
    /// Close the connection
    Close,
}

impl Command {
    /// Returns true for commands that change data. Only these are
    /// replicated to peers.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Command::Put { .. } | Command::Delete { .. })
    }
}

/// A complete parsed request.
///
/// `raw` holds the exact encoded bytes the command was decoded from. Peers
/// receive this verbatim, so replication can never drift from what the
/// client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The decoded command
    pub command: Command,
    /// The encoded bytes the command was decoded from
    pub raw: Bytes,
}

/// Try to decode one command from the start of `buffer`.
///
/// Returns:
/// - `Ok(Some(request))` if a complete command was decoded
/// - `Ok(None)` if the buffer holds a valid-so-far prefix; read more bytes
///   and call again with the grown buffer
/// - `Err(e)` if the buffer can never become a valid command; the caller
///   must discard all buffered bytes
///
/// The buffer is never consumed: after `Ok(Some)` or `Err` the caller resets
/// it, after `Ok(None)` it keeps accumulating.
pub fn parse(buffer: &[u8]) -> Result<Option<Request>, ProtocolError> {
    if buffer.len() <= 2 {
        // too short to identify a command name
        return Ok(None);
    }

    match &buffer[..3] {
        names::PUT => parse_put(buffer),
        names::GET => parse_get(buffer),
        names::DEL => parse_delete(buffer),
        names::BYE => Ok(Some(Request {
            command: Command::Close,
            raw: Bytes::from_static(names::BYE),
        })),
        _ => Err(ProtocolError::UnrecognisedCommand),
    }
}

fn parse_put(buffer: &[u8]) -> Result<Option<Request>, ProtocolError> {
    let Some((key, rest)) = parse_argument(&buffer[3..])? else {
        return Ok(None);
    };
    let Some((value, rest)) = parse_argument(rest)? else {
        return Ok(None);
    };

    let consumed = buffer.len() - rest.len();
    Ok(Some(Request {
        command: Command::Put {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        },
        raw: Bytes::copy_from_slice(&buffer[..consumed]),
    }))
}

/// The max-length field is the same two-stage digit-count/digits structure
/// as an argument, without a payload segment. A digit count of `0` stands
/// alone and means "no truncation".
fn parse_get(buffer: &[u8]) -> Result<Option<Request>, ProtocolError> {
    let Some((key, rest)) = parse_argument(&buffer[3..])? else {
        return Ok(None);
    };

    if rest.is_empty() {
        // too short for the digit-count byte to be present
        return Ok(None);
    }

    let digit_count = ascii_digit(rest[0]).ok_or(ProtocolError::InvalidMaxLength)?;

    let max_len = if digit_count == 0 {
        0
    } else {
        if rest.len() < digit_count + 1 {
            // too short for all the max-length digits to be present
            return Ok(None);
        }
        parse_decimal(&rest[1..=digit_count]).ok_or(ProtocolError::InvalidMaxLength)?
    };

    let consumed = buffer.len() - rest.len() + 1 + digit_count;
    Ok(Some(Request {
        command: Command::Get {
            key: Bytes::copy_from_slice(key),
            max_len,
        },
        raw: Bytes::copy_from_slice(&buffer[..consumed]),
    }))
}

fn parse_delete(buffer: &[u8]) -> Result<Option<Request>, ProtocolError> {
    let Some((key, rest)) = parse_argument(&buffer[3..])? else {
        return Ok(None);
    };

    let consumed = buffer.len() - rest.len();
    Ok(Some(Request {
        command: Command::Delete {
            key: Bytes::copy_from_slice(key),
        },
        raw: Bytes::copy_from_slice(&buffer[..consumed]),
    }))
}

/// Try to decode one three-part argument from the start of `buffer`:
/// one digit giving the size of the length field, the length field itself,
/// then that many payload bytes.
///
/// Returns `Ok(Some((payload, remainder)))` on success, with the unconsumed
/// remainder available for continued parsing, `Ok(None)` if the buffer is a
/// valid-so-far prefix of an argument, and `Err` if it can never become one.
pub fn parse_argument(buffer: &[u8]) -> Result<Option<(&[u8], &[u8])>, ProtocolError> {
    if buffer.len() < 3 {
        // too short for all three parts to be present
        return Ok(None);
    }

    let digit_count =
        ascii_digit(buffer[0]).ok_or(ProtocolError::InvalidDigitCount(buffer[0]))?;

    if buffer.len() < digit_count + 1 {
        // too short for all of the length field to be present
        return Ok(None);
    }

    let length = parse_decimal(&buffer[1..=digit_count]).ok_or(ProtocolError::InvalidLength)?;

    if buffer.len() < digit_count + 1 + length {
        // too short for all of the payload to be present
        return Ok(None);
    }

    let payload = &buffer[digit_count + 1..digit_count + 1 + length];
    Ok(Some((payload, &buffer[digit_count + 1 + length..])))
}

/// Encode `payload` as a three-part argument into `buf`. Inverse of
/// [`parse_argument`].
pub fn format_argument(payload: &[u8], buf: &mut BytesMut) {
    let length = payload.len().to_string();
    buf.put_slice(length.len().to_string().as_bytes());
    buf.put_slice(length.as_bytes());
    buf.put_slice(payload);
}

fn ascii_digit(byte: u8) -> Option<usize> {
    byte.is_ascii_digit().then(|| usize::from(byte - b'0'))
}

fn parse_decimal(field: &[u8]) -> Option<usize> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buffer: &[u8]) -> Request {
        parse(buffer)
            .expect("expected a complete command")
            .expect("expected a complete command")
    }

    fn incomplete(buffer: &[u8]) {
        assert_eq!(parse(buffer), Ok(None), "expected incomplete: {buffer:?}");
    }

    fn invalid(buffer: &[u8]) {
        assert!(parse(buffer).is_err(), "expected invalid: {buffer:?}");
    }

    #[test]
    fn test_parse_empty_buffer() {
        incomplete(b"");
        incomplete(b"p");
        incomplete(b"pu");
    }

    #[test]
    fn test_parse_put() {
        let request = complete(b"put11a13foo");
        assert_eq!(
            request.command,
            Command::Put {
                key: Bytes::from_static(b"a"),
                value: Bytes::from_static(b"foo"),
            }
        );
        assert_eq!(request.raw, Bytes::from_static(b"put11a13foo"));
    }

    #[test]
    fn test_parse_get() {
        let request = complete(b"get11b0");
        assert_eq!(
            request.command,
            Command::Get {
                key: Bytes::from_static(b"b"),
                max_len: 0,
            }
        );
        assert_eq!(request.raw, Bytes::from_static(b"get11b0"));
    }

    #[test]
    fn test_parse_get_with_max_length() {
        let request = complete(b"get11a215");
        assert_eq!(
            request.command,
            Command::Get {
                key: Bytes::from_static(b"a"),
                max_len: 15,
            }
        );
    }

    #[test]
    fn test_parse_delete() {
        // trailing bytes beyond the command are not part of the request
        let request = complete(b"del11aww");
        assert_eq!(
            request.command,
            Command::Delete {
                key: Bytes::from_static(b"a"),
            }
        );
        assert_eq!(request.raw, Bytes::from_static(b"del11a"));
    }

    #[test]
    fn test_parse_close() {
        let request = complete(b"bye");
        assert_eq!(request.command, Command::Close);
    }

    #[test]
    fn test_parse_incomplete_put() {
        incomplete(b"put13aaa12b");
    }

    #[test]
    fn test_parse_incomplete_get() {
        incomplete(b"get12a");
        // key complete, max-length digit count not yet present
        incomplete(b"get11b");
        // digit count present, digits missing
        incomplete(b"get11b2");
        incomplete(b"get11b21");
    }

    #[test]
    fn test_parse_incomplete_delete() {
        incomplete(b"del4123");
    }

    #[test]
    fn test_trailing_empty_argument_stays_incomplete() {
        // an empty payload encodes to the two bytes "10", which is below the
        // three-byte minimum of an argument; in final position it can only
        // complete once bytes of a following request arrive
        incomplete(b"del10");
        incomplete(b"put11k10");

        // with a following byte present the empty argument completes
        let request = complete(b"del10x");
        assert_eq!(
            request.command,
            Command::Delete {
                key: Bytes::new(),
            }
        );

        // get's key is never in final position, so an empty key is fine
        let request = complete(b"get100");
        assert_eq!(
            request.command,
            Command::Get {
                key: Bytes::new(),
                max_len: 0,
            }
        );
    }

    #[test]
    fn test_parse_invalid_put() {
        invalid(b"put12aaX7abc");
        invalid(b"put11a1xa");
    }

    #[test]
    fn test_parse_invalid_get() {
        invalid(b"get1yABC");
        invalid(b"get1xd");
        // non-digit in the max-length field
        invalid(b"get11a2x5");
    }

    #[test]
    fn test_parse_invalid_delete() {
        invalid(b"delQQQ");
        invalid(b"delx1b");
    }

    #[test]
    fn test_parse_unrecognised_command() {
        invalid(b"abc");
        invalid(b"zzzzzz");
    }

    #[test]
    fn test_parse_is_pure() {
        let buffer = b"put12bb13999";
        let first = parse(buffer).unwrap();
        let second = parse(buffer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_argument_valid() {
        let (payload, remainder) = parse_argument(b"212stored value..").unwrap().unwrap();
        assert_eq!(payload, b"stored value");
        assert_eq!(remainder, b"..");
    }

    #[test]
    fn test_parse_argument_invalid_digit_count() {
        assert_eq!(
            parse_argument(b"x3key"),
            Err(ProtocolError::InvalidDigitCount(b'x'))
        );
    }

    #[test]
    fn test_parse_argument_invalid_length() {
        assert_eq!(parse_argument(b"2abkey"), Err(ProtocolError::InvalidLength));
        // a digit count of zero leaves an empty length field
        assert_eq!(parse_argument(b"0ab"), Err(ProtocolError::InvalidLength));
    }

    #[test]
    fn test_parse_argument_all_missing() {
        assert_eq!(parse_argument(b"12"), Ok(None));
    }

    #[test]
    fn test_parse_argument_length_field_missing() {
        // digit count of 9 but only 5 digits present
        assert_eq!(parse_argument(b"912345"), Ok(None));
    }

    #[test]
    fn test_parse_argument_payload_missing() {
        assert_eq!(parse_argument(b"15abc"), Ok(None));
    }

    #[test]
    fn test_format_argument() {
        let mut buf = BytesMut::new();
        format_argument(b"key", &mut buf);
        assert_eq!(&buf[..], b"13key");

        buf.clear();
        format_argument(b"stored value", &mut buf);
        assert_eq!(&buf[..], b"212stored value");

        buf.clear();
        format_argument(b"", &mut buf);
        assert_eq!(&buf[..], b"10");
    }
}
