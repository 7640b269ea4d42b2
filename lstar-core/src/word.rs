use std::{fmt::Debug, hash::Hash, ops::Deref};

use crate::{alphabet::Symbol, Show};

/// A finite, possibly empty, sequence of symbols. The empty word is written as `ε`.
///
/// Words are plain values: they can be hashed and compared, which makes them usable as keys
/// for looking up rows of an observation table by their prefix. Most operations that
/// produce a word (such as [`Word::append`] or [`Word::concat`]) allocate a fresh one and leave
/// `self` untouched.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Word<S>(Vec<S>);

impl<S: Symbol> Word<S> {
    /// Creates a word from the given vector of symbols.
    pub fn new(symbols: Vec<S>) -> Self {
        Self(symbols)
    }

    /// Returns the empty word `ε`.
    pub fn empty() -> Self {
        Self(vec![])
    }

    /// Creates a word consisting of only the given `symbol`.
    pub fn singleton(symbol: S) -> Self {
        Self(vec![symbol])
    }

    /// Returns the symbols of `self` as a slice.
    pub fn symbols(&self) -> &[S] {
        &self.0
    }

    /// Appends `symbol` to `self` in place.
    pub fn push(&mut self, symbol: S) {
        self.0.push(symbol)
    }

    /// Returns a new word that is `self` followed by `symbol`.
    pub fn append(&self, symbol: S) -> Self {
        let mut symbols = Vec::with_capacity(self.0.len() + 1);
        symbols.extend_from_slice(&self.0);
        symbols.push(symbol);
        Self(symbols)
    }

    /// Returns the concatenation of `self` and `other`.
    pub fn concat(&self, other: &[S]) -> Self {
        let mut symbols = Vec::with_capacity(self.0.len() + other.len());
        symbols.extend_from_slice(&self.0);
        symbols.extend_from_slice(other);
        Self(symbols)
    }

    /// Returns the prefix of `self` of the given `length`. If `length` exceeds the length of
    /// `self`, the whole word is returned.
    pub fn prefix(&self, length: usize) -> Self {
        Self(self.0[..length.min(self.0.len())].to_vec())
    }

    /// Returns the suffix of `self` that starts at position `offset`, which may be empty.
    pub fn suffix(&self, offset: usize) -> Self {
        Self(self.0[offset.min(self.0.len())..].to_vec())
    }

    /// Returns the infix of `self` that spans the positions `from..to`.
    ///
    /// # Example
    /// ```
    /// use lstar_core::word::Word;
    /// let word = Word::from("abcde");
    /// assert_eq!(word.subword(1, 4), Word::from("bcd"));
    /// ```
    pub fn subword(&self, from: usize, to: usize) -> Self {
        let to = to.min(self.0.len());
        Self(self.0[from.min(to)..to].to_vec())
    }

    /// Splits off the last symbol, returning the parent word and the symbol.
    /// Returns `None` for the empty word.
    pub fn split_last(&self) -> Option<(Self, S)> {
        let (last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), *last))
    }

    /// Iterates over all prefixes of `self` in order of increasing length, starting with `ε`
    /// and ending with `self`.
    pub fn prefixes(&self) -> impl Iterator<Item = Word<S>> + '_ {
        (0..=self.0.len()).map(|i| self.prefix(i))
    }

    /// Iterates over all non-empty suffixes of `self` in order of increasing length.
    pub fn suffixes(&self) -> impl Iterator<Item = Word<S>> + '_ {
        (0..self.0.len()).rev().map(|i| self.suffix(i))
    }
}

impl<S> Default for Word<S> {
    fn default() -> Self {
        Self(vec![])
    }
}

impl<S> Deref for Word<S> {
    type Target = [S];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Word hashes exactly like its slice of symbols, so maps keyed by words can be queried with slices.
impl<S> std::borrow::Borrow<[S]> for Word<S> {
    fn borrow(&self) -> &[S] {
        &self.0
    }
}

impl<S> From<Vec<S>> for Word<S> {
    fn from(value: Vec<S>) -> Self {
        Self(value)
    }
}

impl<S: Clone> From<&[S]> for Word<S> {
    fn from(value: &[S]) -> Self {
        Self(value.to_vec())
    }
}

impl<S: Clone, const N: usize> From<[S; N]> for Word<S> {
    fn from(value: [S; N]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for Word<char> {
    fn from(value: &str) -> Self {
        Self(value.chars().collect())
    }
}

impl<S> FromIterator<S> for Word<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, S> IntoIterator for &'a Word<S> {
    type Item = &'a S;
    type IntoIter = std::slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<S: Show> Show for Word<S> {
    fn show(&self) -> String {
        if self.0.is_empty() {
            "ε".to_string()
        } else {
            S::show_collection(self.0.iter())
        }
    }
}

impl<S: Debug> Debug for Word<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<S: Show> std::fmt::Display for Word<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.show())
    }
}
