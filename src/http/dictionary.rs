//! Header and parameter dictionary
//!
//! Keys and values are stored as [`Field`]s: spans into the arena of the
//! owning [`Request`](crate::Request)/[`Response`](crate::Response),
//! `'static` defaults, or owned duplicates. Owned duplicates are dropped
//! together with the dictionary.

use crate::{
    errors::Error,
    http::types::{to_lower_case, trim, with_lower_case},
};
use std::{fmt, iter::FusedIterator, slice};

/// A `[start, end)` range inside an arena buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline(always)]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-length span positioned at `at`.
    #[inline(always)]
    pub const fn empty_at(at: usize) -> Self {
        Self { start: at, end: at }
    }

    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline(always)]
    pub fn get<'a>(&self, arena: &'a [u8]) -> &'a [u8] {
        &arena[self.start..self.end]
    }
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Field {
    Span(Span),
    Static(&'static [u8]),
    Owned(Box<[u8]>),
}

impl Field {
    pub(crate) const EMPTY: Field = Field::Static(b"");

    #[inline(always)]
    pub(crate) fn bytes<'a>(&'a self, arena: &'a [u8]) -> &'a [u8] {
        match self {
            Field::Span(span) => span.get(arena),
            Field::Static(value) => value,
            Field::Owned(value) => value,
        }
    }

    /// Copies `src` into an owned field.
    #[inline]
    pub(crate) fn owned(src: &[u8]) -> Result<Field, Error> {
        duplicate(src).map(Field::Owned)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Span(span) => write!(f, "Span({}..{})", span.start, span.end),
            Field::Static(value) => write!(f, "Static({:?})", String::from_utf8_lossy(value)),
            Field::Owned(value) => write!(f, "Owned({:?})", String::from_utf8_lossy(value)),
        }
    }
}

/// Allocates an owned copy of `src`, reporting allocation failure.
pub(crate) fn duplicate(src: &[u8]) -> Result<Box<[u8]>, Error> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(src.len())
        .map_err(|_| Error::OutOfMemory(src.len()))?;
    buffer.extend_from_slice(src);

    Ok(buffer.into_boxed_slice())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) key: Field,
    pub(crate) value: Field,
}

/// Insertion-ordered map from lowercase keys to values.
///
/// Comparison is exact on bytes: callers fold keys to lowercase before
/// [`insert`](Dictionary::insert), lookups fold the query key themselves.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dictionary {
    entries: Vec<Entry>,
}

impl Dictionary {
    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    fn position(&self, arena: &[u8], key: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.key.bytes(arena) == key)
    }

    /// Inserts `(key, value)` or overwrites the value of an equal key.
    ///
    /// The key must already be lowercase.
    pub(crate) fn insert(&mut self, arena: &[u8], key: Field, value: Field) {
        match self.position(arena, key.bytes(arena)) {
            Some(index) => self.entries[index].value = value,
            None => self.entries.push(Entry { key, value }),
        }
    }

    /// Exact-byte lookup of an already lowercase key.
    #[inline]
    pub(crate) fn get_exact<'a>(&'a self, arena: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
        self.entries
            .iter()
            .find(|entry| entry.key.bytes(arena) == key)
            .map(|entry| entry.value.bytes(arena))
    }

    /// Case-insensitive lookup.
    #[inline]
    pub(crate) fn get<'a>(&'a self, arena: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
        with_lower_case(key, |key| self.get_exact(arena, key))
    }

    /// Removes the entry stored under the already lowercase `key`.
    pub(crate) fn erase(&mut self, arena: &[u8], key: &[u8]) -> bool {
        match self.position(arena, key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Programmatic header assignment.
    ///
    /// The key is trimmed and lowercased. An empty `value` erases the entry,
    /// anything else is duplicated into owned storage.
    pub(crate) fn set(&mut self, arena: &[u8], key: &[u8], value: &[u8]) -> Result<(), Error> {
        let mut key = duplicate(trim(key))?;
        to_lower_case(&mut key);

        if value.is_empty() {
            self.erase(arena, &key);
            return Ok(());
        }

        let value = Field::owned(value)?;
        self.insert(arena, Field::Owned(key), value);

        Ok(())
    }

    #[inline]
    pub(crate) fn iter<'a>(&'a self, arena: &'a [u8]) -> Entries<'a> {
        Entries {
            inner: self.entries.iter(),
            arena,
        }
    }

    #[cfg(test)]
    pub(crate) fn spans(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value, Field::Span(_)))
            .count()
    }
}

/// Iterator over `(key, value)` pairs in insertion order.
///
/// Returned by [`Request::headers`](crate::Request::headers),
/// [`Request::values`](crate::Request::values) and
/// [`Response::headers`](crate::Response::headers).
#[derive(Clone)]
pub struct Entries<'a> {
    inner: slice::Iter<'a, Entry>,
    arena: &'a [u8],
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a [u8], &'a [u8]);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let arena = self.arena;
        self.inner
            .next()
            .map(|entry| (entry.key.bytes(arena), entry.value.bytes(arena)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}
impl FusedIterator for Entries<'_> {}

impl fmt::Debug for Entries<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.clone().map(|(key, value)| {
                (
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value),
                )
            }))
            .finish()
    }
}
