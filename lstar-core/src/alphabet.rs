use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::prelude::*;

/// A symbol of an alphabet, which is also the type of the symbols in a word. Symbols are small,
/// copyable values that can be compared, hashed and shown.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show {}
impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show> Symbol for S {}

/// An alphabet is a finite, ordered collection of [`Symbol`]s. Each symbol has a stable index
/// in `0..size()`, which is what observation tables use to address the successor of a row.
pub trait Alphabet: Clone + Debug {
    /// The type of symbols in this alphabet.
    type Symbol: Symbol;

    /// Type for an iterator over all symbols in the alphabet, in index order.
    type Universe<'this>: Iterator<Item = Self::Symbol>
    where
        Self: 'this;

    /// Returns an iterator over all symbols in the alphabet, ordered by their index.
    fn universe(&self) -> Self::Universe<'_>;

    /// Returns the number of symbols in the alphabet.
    fn size(&self) -> usize;

    /// Returns the symbol with the given index, if it exists.
    fn symbol(&self, index: usize) -> Option<Self::Symbol>;

    /// Returns the index of the given symbol, if it is present in the alphabet.
    fn index_of(&self, symbol: Self::Symbol) -> Option<usize>;

    /// Returns true if the given symbol is present in the alphabet.
    fn contains(&self, symbol: Self::Symbol) -> bool {
        self.index_of(symbol).is_some()
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// An [`Alphabet`] that can be extended by new symbols. New symbols always receive the next
/// free index, indices of existing symbols never change.
pub trait GrowingAlphabet: Alphabet {
    /// Adds `symbol` and returns its index together with a flag that indicates whether the
    /// symbol was actually new.
    fn add_symbol(&mut self, symbol: Self::Symbol) -> (usize, bool);
}

impl<A: Alphabet> Alphabet for &A {
    type Symbol = A::Symbol;
    type Universe<'this> = A::Universe<'this> where Self: 'this;
    fn universe(&self) -> Self::Universe<'_> {
        A::universe(self)
    }
    fn size(&self) -> usize {
        A::size(self)
    }
    fn symbol(&self, index: usize) -> Option<Self::Symbol> {
        A::symbol(self, index)
    }
    fn index_of(&self, symbol: Self::Symbol) -> Option<usize> {
        A::index_of(self, symbol)
    }
}

/// Represents an alphabet that is just an indexed set of symbols of type `S`.
///
/// # Example
/// Assume we have a [`CharAlphabet`] over the symbols 'a' and 'b'. Then 'a' has index 0 and 'b'
/// has index 1. Adding 'c' afterwards assigns it index 2, while adding 'a' again changes nothing.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SimpleAlphabet<S: Symbol>(math::Set<S>);

/// Represents an alphabet where a [`Symbol`] is just a single `char`.
pub type CharAlphabet = SimpleAlphabet<char>;

impl CharAlphabet {
    /// Creates a new [`CharAlphabet`] alphabet of the given size. The symbols are just the
    /// first `size` letters of the alphabet, i.e. 'a' to 'z'.
    pub fn of_size(size: usize) -> Self {
        assert!(size <= 26, "Alphabet is too large");
        Self((0..size).map(|i| (b'a' + i as u8) as char).collect())
    }
}

impl<S: Symbol> SimpleAlphabet<S> {
    /// Creates a new alphabet from an iterator over the symbols. Duplicates are dropped, the
    /// first occurrence of a symbol determines its index.
    pub fn new<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        Self(symbols.into_iter().collect())
    }
}

/// Helper macro for creating a [`CharAlphabet`] alphabet. Is called simply with a list of symbols
/// that are separated by commata.
///
/// # Examples
/// ```
/// use lstar_core::prelude::*;
/// let alphabet = alphabet!(simple 'a', 'b', 'c');
/// assert_eq!(alphabet.size(), 3);
/// ```
#[macro_export]
macro_rules! alphabet {
    (simple $($c:literal),*) => {
        $crate::prelude::CharAlphabet::new(vec![$($c),*])
    };
}

impl<S: Symbol> From<Vec<S>> for SimpleAlphabet<S> {
    fn from(value: Vec<S>) -> Self {
        Self::new(value)
    }
}

impl<S: Symbol> FromIterator<S> for SimpleAlphabet<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<S: Symbol> std::ops::Index<usize> for SimpleAlphabet<S> {
    type Output = S;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<S: Symbol> Alphabet for SimpleAlphabet<S> {
    type Symbol = S;

    type Universe<'this> = std::iter::Copied<indexmap::set::Iter<'this, S>>
        where
            Self: 'this;

    fn universe(&self) -> Self::Universe<'_> {
        self.0.iter().copied()
    }

    fn size(&self) -> usize {
        self.0.len()
    }

    fn symbol(&self, index: usize) -> Option<S> {
        self.0.get_index(index).copied()
    }

    fn index_of(&self, symbol: S) -> Option<usize> {
        self.0.get_index_of(&symbol)
    }
}

impl<S: Symbol> GrowingAlphabet for SimpleAlphabet<S> {
    fn add_symbol(&mut self, symbol: S) -> (usize, bool) {
        self.0.insert_full(symbol)
    }
}

impl<S: Symbol> Show for SimpleAlphabet<S> {
    fn show(&self) -> String {
        format!("{{{}}}", self.0.iter().map(|sym| sym.show()).join(", "))
    }
}
