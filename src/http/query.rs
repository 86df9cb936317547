//! In-place URL query string decoder.
//!
//! Decodes `key1=val1&key2=val2` with `%XX` escapes and `+` as space,
//! writing the decoded bytes back over the same buffer. Every escape
//! shrinks three bytes to one, so the write cursor never passes the read
//! cursor and no second buffer is needed.

use crate::http::dictionary::Span;
use std::{mem, ops::Range};

/// URL query string decoder and encoder.
///
/// # Examples
/// ```rust
/// use restwire::query::Query;
///
/// let params = Query::decode_owned(b"name=John%20Doe&tag=a%2Bb&q=x+y");
///
/// assert_eq!(params[0], (b"name".to_vec(), b"John Doe".to_vec()));
/// assert_eq!(params[1], (b"tag".to_vec(), b"a+b".to_vec()));
/// assert_eq!(params[2], (b"q".to_vec(), b"x y".to_vec()));
/// ```
/// Missing values and aborted escapes:
/// ```rust
/// use restwire::query::Query;
///
/// let params = Query::decode_owned(b"debug&pct=100%&bad=%zz");
///
/// assert_eq!(params[0], (b"debug".to_vec(), b"".to_vec()));
/// assert_eq!(params[1], (b"pct".to_vec(), b"100%".to_vec()));
/// assert_eq!(params[2], (b"bad".to_vec(), b"%zz".to_vec()));
/// ```
pub struct Query;

impl Query {
    /// Decodes `buffer[range]` in place and reports every pair to `collector`.
    ///
    /// Spans handed to the collector point into `buffer`. Returns the end of
    /// the decoded bytes, which is never past `range.end`.
    ///
    /// The `=` and `&` separators stay where they were, outside the spans,
    /// so input without escapes or `+` is left untouched.
    ///
    /// A pair is reported at each `&`. At the end of input the last pair is
    /// reported if anything follows the final `&`, so `=v` yields an empty
    /// key while a trailing `&` does not produce an extra empty pair.
    pub fn decode<C: QueryCollector>(
        buffer: &mut [u8],
        range: Range<usize>,
        collector: &mut C,
    ) -> usize {
        let mut machine = Machine::default();

        let mut write = range.start;
        let mut key_start = write;
        let mut key_end = None;

        for read in range {
            let step = machine.step(buffer[read]);
            write = step.flush.write_literal(buffer, write);

            match step.action {
                Action::BeginValue => {
                    key_end = Some(write);
                    buffer[write] = b'=';
                    write += 1;
                }
                Action::EndPair => {
                    report(collector, key_start, key_end.take(), write);
                    buffer[write] = b'&';
                    write += 1;
                    key_start = write;
                }
                Action::Skip => {}
                Action::Emit(byte) => {
                    buffer[write] = byte;
                    write += 1;
                }
            }
        }

        write = machine.finish().write_literal(buffer, write);

        if write != key_start {
            report(collector, key_start, key_end, write);
        }

        write
    }

    /// Decodes a copy of `query` into owned pairs.
    pub fn decode_owned(query: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut buffer = query.to_vec();
        let mut spans = Vec::new();
        Self::decode(&mut buffer, 0..query.len(), &mut spans);

        spans
            .into_iter()
            .map(|(key, value)| (key.get(&buffer).to_vec(), value.get(&buffer).to_vec()))
            .collect()
    }

    /// Percent-encodes `src` into `out`.
    ///
    /// Unreserved bytes (`A-Z a-z 0-9 - _ . ~`) are copied, everything else
    /// becomes an uppercase `%XX` escape.
    ///
    /// ```rust
    /// use restwire::query::Query;
    ///
    /// let mut out = Vec::new();
    /// Query::encode(b"a b&c=d", &mut out);
    /// assert_eq!(out, b"a%20b%26c%3Dd");
    /// ```
    pub fn encode(src: &[u8], out: &mut Vec<u8>) {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";

        out.reserve(src.len());
        for &byte in src {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte)
                }
                _ => out.extend_from_slice(&[
                    b'%',
                    HEX[(byte >> 4) as usize],
                    HEX[(byte & 0x0F) as usize],
                ]),
            }
        }
    }
}

/// A trait for types that collect decoded query parameters.
///
/// Keys and values arrive as [`Span`]s into the buffer passed to
/// [`Query::decode`].
///
/// # Examples
/// ```rust
/// use restwire::query::{Query, QueryCollector};
/// use restwire::Span;
///
/// struct Keys(Vec<Span>);
///
/// impl QueryCollector for Keys {
///     fn add_param(&mut self, key: Span, _value: Span) {
///         self.0.push(key);
///     }
/// }
///
/// let mut buffer = b"a=1&bb=2".to_vec();
/// let mut keys = Keys(Vec::new());
/// let len = buffer.len();
/// Query::decode(&mut buffer, 0..len, &mut keys);
///
/// assert_eq!(keys.0[1].get(&buffer), b"bb");
/// ```
pub trait QueryCollector {
    /// Adds a decoded parameter.
    fn add_param(&mut self, key: Span, value: Span);
}

/// Reports `key_start..end`, split around the `=` at `key_end` if any.
#[inline(always)]
fn report<C: QueryCollector>(collector: &mut C, key_start: usize, key_end: Option<usize>, end: usize) {
    match key_end {
        Some(split) => collector.add_param(Span::new(key_start, split), Span::new(split + 1, end)),
        None => collector.add_param(Span::new(key_start, end), Span::empty_at(end)),
    }
}

// Preserves parameter order
impl QueryCollector for Vec<(Span, Span)> {
    #[inline(always)]
    fn add_param(&mut self, key: Span, value: Span) {
        self.push((key, value));
    }
}

// STATE MACHINE

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Part {
    #[default]
    Key,
    Value,
}

/// Percent-escape progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Escape {
    #[default]
    Normal,
    /// `%` consumed
    Hex1,
    /// `%` and one hex digit consumed
    Hex2 { digit: u8, high: u8 },
}

impl Escape {
    /// Writes the consumed bytes of an aborted escape at `write`.
    #[inline(always)]
    fn write_literal(self, buffer: &mut [u8], write: usize) -> usize {
        match self {
            Escape::Normal => write,
            Escape::Hex1 => {
                buffer[write] = b'%';
                write + 1
            }
            Escape::Hex2 { digit, .. } => {
                buffer[write] = b'%';
                buffer[write + 1] = digit;
                write + 2
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// `=` ended the key
    BeginValue,
    /// `&` ended the pair
    EndPair,
    /// Byte consumed without output
    Skip,
    Emit(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    /// Escape aborted by this byte, to be written before `action`.
    pub(crate) flush: Escape,
    pub(crate) action: Action,
}

impl Step {
    #[inline(always)]
    const fn new(flush: Escape, action: Action) -> Self {
        Self { flush, action }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Machine {
    part: Part,
    escape: Escape,
}

impl Machine {
    #[inline]
    pub(crate) fn step(&mut self, byte: u8) -> Step {
        let pending = mem::take(&mut self.escape);

        match byte {
            b'=' if self.part == Part::Key => {
                self.part = Part::Value;
                Step::new(pending, Action::BeginValue)
            }
            b'&' => {
                self.part = Part::Key;
                Step::new(pending, Action::EndPair)
            }
            b'%' => {
                self.escape = Escape::Hex1;
                Step::new(pending, Action::Skip)
            }
            _ => match (pending, hex_digit(byte)) {
                (Escape::Hex1, Some(high)) => {
                    self.escape = Escape::Hex2 { digit: byte, high };
                    Step::new(Escape::Normal, Action::Skip)
                }
                (Escape::Hex2 { high, .. }, Some(low)) => {
                    Step::new(Escape::Normal, Action::Emit(high << 4 | low))
                }
                (pending, _) => Step::new(pending, Action::Emit(plain(byte))),
            },
        }
    }

    /// Ends the input, returning any escape left unfinished.
    #[inline]
    pub(crate) fn finish(&mut self) -> Escape {
        self.part = Part::Key;
        mem::take(&mut self.escape)
    }
}

#[inline(always)]
const fn plain(byte: u8) -> u8 {
    match byte {
        b'+' => b' ',
        _ => byte,
    }
}

#[inline(always)]
const fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
