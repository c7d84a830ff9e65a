//! Fixed-width wire frames
//!
//! Every byte exchanged with a client is either a nickname frame
//! (`NICKNAME_SIZE` bytes) or a message frame (`FRAME_SIZE` bytes).
//! Text is whatever precedes the first NUL byte; the rest is padding.
//! Client and server share this codec.

use std::borrow::Cow;
use std::fmt;

/// Size of the nickname frame sent once after connecting
pub const NICKNAME_SIZE: usize = 16;

/// Size of every message frame, in both directions
pub const FRAME_SIZE: usize = 512;

/// Usable bytes in a frame; one byte is always left for the terminator
pub const FRAME_CAPACITY: usize = FRAME_SIZE - 1;

/// Separator appended to every nickname
const NICKNAME_SEPARATOR: &[u8; 2] = b": ";

/// Length of the text part of a buffer: bytes before the first NUL, capped
fn text_len(bytes: &[u8], cap: usize) -> usize {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    end.min(cap)
}

/// A fixed-size, NUL-padded message frame
///
/// Holds at most `FRAME_CAPACITY` bytes of content, so the last byte is
/// always a terminator. All constructors truncate instead of failing.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_SIZE],
    len: usize,
}

impl Frame {
    /// Create an empty (all padding) frame
    pub fn new() -> Self {
        Self {
            bytes: [0; FRAME_SIZE],
            len: 0,
        }
    }

    /// Build a frame from arbitrary bytes
    ///
    /// Content stops at the first NUL and is truncated to `FRAME_CAPACITY`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut frame = Self::new();
        frame.push(&bytes[..text_len(bytes, FRAME_CAPACITY)]);
        frame
    }

    /// Build a frame from text, truncating at `FRAME_CAPACITY` bytes
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Re-frame a raw buffer read off the wire
    pub fn from_wire(buf: &[u8; FRAME_SIZE]) -> Self {
        Self::from_bytes(buf)
    }

    /// Format a broadcast envelope: `[timestamp][nickname][payload]`
    ///
    /// Parts are concatenated in order and cut off at `FRAME_CAPACITY`.
    /// The result is always a single line: trailing CR/LF of the payload
    /// is dropped and any other line break becomes a space.
    pub fn envelope(timestamp: &str, nickname: &Nickname, payload: &Frame) -> Self {
        let body = payload.content();
        let body_end = body
            .iter()
            .rposition(|&b| b != b'\n' && b != b'\r')
            .map_or(0, |i| i + 1);

        let mut frame = Self::new();
        frame.push(timestamp.as_bytes());
        frame.push(nickname.as_bytes());
        frame.push(&body[..body_end]);

        for b in &mut frame.bytes[..frame.len] {
            if *b == b'\n' || *b == b'\r' {
                *b = b' ';
            }
        }
        frame
    }

    /// Append as much of `part` as fits, skipping anything past a NUL
    fn push(&mut self, part: &[u8]) {
        let part = &part[..text_len(part, part.len())];
        let take = part.len().min(FRAME_CAPACITY - self.len);
        self.bytes[self.len..self.len + take].copy_from_slice(&part[..take]);
        self.len += take;
    }

    /// Content bytes, without padding
    pub fn content(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Content as text (invalid UTF-8 is replaced)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }

    /// The full padded frame, as written to the wire
    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.bytes
    }

    /// Content length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the frame carries no content
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frame").field(&self.text()).finish()
    }
}

/// A registered nickname, already suffixed with `": "`
///
/// Produced from the raw nickname frame. Names of up to `NICKNAME_SIZE - 2`
/// bytes get the separator appended. Longer names keep `NICKNAME_SIZE - 1`
/// visible bytes, the last two of which are overwritten with the separator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Nickname(Vec<u8>);

impl Nickname {
    /// Format a nickname received as a raw wire frame
    pub fn from_wire(raw: &[u8; NICKNAME_SIZE]) -> Self {
        let len = text_len(raw, NICKNAME_SIZE - 1);
        let mut name = raw[..len].to_vec();

        if len <= NICKNAME_SIZE - 2 {
            name.extend_from_slice(NICKNAME_SEPARATOR);
        } else {
            name[len - 2..].copy_from_slice(NICKNAME_SEPARATOR);
        }
        Self(name)
    }

    /// Format a nickname the way the server would after receiving it
    pub fn from_text(name: &str) -> Self {
        Self::from_wire(&nickname_frame(name))
    }

    /// Formatted bytes, separator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if this is the "not registered" sentinel
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Encode a nickname into its NUL-padded wire frame
///
/// Keeps at most `NICKNAME_SIZE - 1` bytes so the frame stays terminated.
pub fn nickname_frame(name: &str) -> [u8; NICKNAME_SIZE] {
    let mut raw = [0u8; NICKNAME_SIZE];
    let bytes = name.as_bytes();
    let len = text_len(bytes, NICKNAME_SIZE - 1);
    raw[..len].copy_from_slice(&bytes[..len]);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_nickname_gets_separator() {
        let nick = Nickname::from_text("alice");
        assert_eq!(nick.as_bytes(), b"alice: ");
    }

    #[test]
    fn test_nickname_at_limit_gets_separator() {
        let name = "a".repeat(NICKNAME_SIZE - 2);
        let nick = Nickname::from_text(&name);
        assert_eq!(nick.as_bytes(), format!("{}: ", name).as_bytes());
        assert_eq!(nick.as_bytes().len(), NICKNAME_SIZE);
    }

    #[test]
    fn test_long_nickname_is_truncated() {
        let nick = Nickname::from_text("averyveryverylongname");
        assert_eq!(nick.as_bytes(), b"averyveryvery: ");
        assert_eq!(nick.as_bytes().len(), NICKNAME_SIZE - 1);
        assert!(!nick.as_bytes().contains(&0));
    }

    #[test]
    fn test_unterminated_nickname_frame() {
        let raw = [b'x'; NICKNAME_SIZE];
        let nick = Nickname::from_wire(&raw);
        assert_eq!(nick.as_bytes().len(), NICKNAME_SIZE - 1);
        assert!(nick.as_bytes().ends_with(b": "));
    }

    #[test]
    fn test_nickname_forces_separator_over_content() {
        // 15 visible bytes: the last two are replaced whatever they were
        let nick = Nickname::from_text("abcdefghijklm!?");
        assert_eq!(nick.as_bytes(), b"abcdefghijklm: ");
    }

    #[test]
    fn test_empty_nickname() {
        let nick = Nickname::from_wire(&[0; NICKNAME_SIZE]);
        assert_eq!(nick.as_bytes(), b": ");
        assert!(Nickname::default().is_empty());
    }

    #[test]
    fn test_frame_text_stops_at_nul() {
        let frame = Frame::from_bytes(b"hello\0world");
        assert_eq!(frame.content(), b"hello");
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.as_bytes()[5], 0);
    }

    #[test]
    fn test_frame_truncates_at_capacity() {
        let raw = [b'z'; FRAME_SIZE];
        let frame = Frame::from_wire(&raw);
        assert_eq!(frame.len(), FRAME_CAPACITY);
        assert_eq!(frame.as_bytes()[FRAME_SIZE - 1], 0);
    }

    #[test]
    fn test_envelope_format() {
        let nick = Nickname::from_text("alice");
        let env = Frame::envelope("[2024-01-02 03:04:05] ", &nick, &Frame::from_text("hi"));
        assert_eq!(env.text(), "[2024-01-02 03:04:05] alice: hi");
    }

    #[test]
    fn test_envelope_truncates_oversized_payload() {
        let nick = Nickname::from_text("bob");
        let payload = Frame::from_text(&"p".repeat(FRAME_CAPACITY));
        let env = Frame::envelope("[ts] ", &nick, &payload);

        assert_eq!(env.len(), FRAME_CAPACITY);
        assert!(env.text().starts_with("[ts] bob: ppp"));
        assert_eq!(env.as_bytes()[FRAME_SIZE - 1], 0);
    }

    #[test]
    fn test_envelope_is_single_line() {
        let nick = Nickname::from_text("carol");
        let env = Frame::envelope("[ts] ", &nick, &Frame::from_text("one\ntwo\r\n"));
        assert_eq!(env.text(), "[ts] carol: one two");
    }

    #[test]
    fn test_nickname_frame_padding() {
        let raw = nickname_frame("dave");
        assert_eq!(&raw[..4], b"dave");
        assert!(raw[4..].iter().all(|&b| b == 0));

        let long = nickname_frame(&"n".repeat(40));
        assert_eq!(long[NICKNAME_SIZE - 1], 0);
    }
}
