//! Newline framing and inbound line decoding.
//!
//! Inbound status lines are comma-separated; the first token is a one-letter
//! opcode. Several opcodes are overloaded and are told apart only by token
//! count and by whether the second token is all digits, so the decode rules
//! are tried in a fixed order and the first match wins:
//!
//! | Order | Shape | Event |
//! |---|---|---|
//! | 1 | `D,<digits>,<v>` (exactly 3) | [`Event::DigitalRead`] |
//! | 2 | `A,<digits>,<v>` (exactly 3) | [`Event::AnalogRead`] |
//! | 3 | `A,<name>,...` (2 or more) | [`Event::ParamAdded`] |
//! | 4 | `U,<name>,<v>,...` | [`Event::ParamUpdated`] |
//! | 5 | `S,software set to,<name>` (exactly 3) | [`Event::SoftwareSet`] |
//! | 6 | `S,<i>,<name>,<cur>,...` | [`Event::ParamSwitched`] |
//! | 7 | `G,<name>,<v>,...` | [`Event::ParamGet`] |
//! | 8 | `L,<i>,<name>,<min>,<max>,<cur>,...` | [`Event::ParamList`] |
//! | 9 | anything else | [`Event::Unrecognized`] |
//!
//! A parameter whose name is entirely digits is indistinguishable from an
//! analog read result (`A,42,7`); such lines decode as [`Event::AnalogRead`].

use paramlink_core::events::Event;

/// The newline byte that terminates every line in both directions.
pub const TERMINATOR: u8 = b'\n';

/// Largest amount of unterminated data kept before the buffer is discarded.
/// Status lines are well under 64 bytes; 8192 is generous headroom.
pub const MAX_LINE: usize = 8192;

/// Label carried by the software-name confirmation line.
pub const SOFTWARE_SET_LABEL: &str = "software set to";

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Accumulates raw bytes and yields complete, trimmed, non-empty lines.
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
    /// Set after an overflow; bytes are dropped through the next terminator.
    discarding: bool,
}

impl LineBuffer {
    /// Create a buffer with the default [`MAX_LINE`] limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE)
    }

    /// Create a buffer that discards unterminated data beyond `max_len` bytes.
    pub fn with_limit(max_len: usize) -> Self {
        LineBuffer {
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Append freshly received bytes.
    ///
    /// An unterminated line longer than the limit is dropped whole: the bytes
    /// already held and every byte up to its eventual terminator.
    pub fn extend(&mut self, mut data: &[u8]) {
        if self.discarding {
            match data.iter().position(|&b| b == TERMINATOR) {
                Some(pos) => {
                    self.discarding = false;
                    data = &data[pos + 1..];
                }
                None => return,
            }
        }

        self.buf.extend_from_slice(data);
        let line_start = self
            .buf
            .iter()
            .rposition(|&b| b == TERMINATOR)
            .map_or(0, |pos| pos + 1);
        if self.buf.len() - line_start > self.max_len {
            tracing::warn!(
                len = self.buf.len() - line_start,
                "line buffer overflow, discarding line"
            );
            self.buf.truncate(line_start);
            self.discarding = true;
        }
    }

    /// Remove and return the next complete line, skipping blank ones.
    ///
    /// Returns `None` once no terminated line remains; any partial line is
    /// kept for the next call.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buf.iter().position(|&b| b == TERMINATOR) {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..pos]);
            let line = text.trim();
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
        None
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_index(s: &str) -> Option<u32> {
    s.parse().ok()
}

/// Decode one trimmed line into exactly one [`Event`].
///
/// Tokens are trimmed of surrounding whitespace before matching.
///
/// # Examples
///
/// ```
/// use paramlink_core::Event;
/// use paramlink_text_io::protocol::decode_line;
///
/// assert_eq!(
///     decode_line("A,5,3"),
///     Event::AnalogRead { index: "5".into(), value: "3".into() }
/// );
/// assert_eq!(
///     decode_line("A,tempSensor"),
///     Event::ParamAdded { name: "tempSensor".into() }
/// );
/// ```
pub fn decode_line(line: &str) -> Event {
    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();

    match tokens.as_slice() {
        ["D", pin, value] if is_digits(pin) => Event::DigitalRead {
            pin: pin.to_string(),
            value: value.to_string(),
        },
        ["A", index, value] if is_digits(index) => Event::AnalogRead {
            index: index.to_string(),
            value: value.to_string(),
        },
        ["A", name, ..] => Event::ParamAdded {
            name: name.to_string(),
        },
        ["U", name, value, ..] => Event::ParamUpdated {
            name: name.to_string(),
            value: value.to_string(),
        },
        ["S", label, name] if label.eq_ignore_ascii_case(SOFTWARE_SET_LABEL) => {
            Event::SoftwareSet {
                name: name.to_string(),
            }
        }
        ["S", index, name, current, ..] => Event::ParamSwitched {
            index: parse_index(index),
            name: name.to_string(),
            current: current.to_string(),
        },
        ["G", name, value, ..] => Event::ParamGet {
            name: name.to_string(),
            value: value.to_string(),
        },
        ["L", index, name, min, max, current, ..] => Event::ParamList {
            index: parse_index(index),
            name: name.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            current: current.to_string(),
        },
        _ => Event::Unrecognized {
            raw: line.to_string(),
        },
    }
}
