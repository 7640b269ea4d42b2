//! Core data structures for learning finite automata: alphabets, finite words, deterministic
//! transition systems and the Moore and Mealy machines built on top of them.
#![allow(missing_docs)]
use std::{fmt::Debug, hash::Hash};

pub mod math;

mod show;
pub use show::{show_duration, Show};

#[macro_use]
pub mod alphabet;

pub mod word;

pub mod transition_system;

pub mod automaton;

/// A color is simply a type that can be used to color states or transitions. It is also the
/// type of the outputs that a membership oracle produces.
pub trait Color: Clone + Eq + Hash + Debug {}

impl<T: Eq + Clone + Hash + Debug> Color for T {}

/// Alias for the default integer type that is used for coloring edges and states.
pub type Int = u8;

/// Represents the absence of a color. This is used for the edges of Moore machines and the
/// states of Mealy machines, which carry no information.
#[derive(Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Void;

impl Debug for Void {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#")
    }
}

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use lstar_core::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        alphabet,
        alphabet::{Alphabet, CharAlphabet, GrowingAlphabet, SimpleAlphabet, Symbol},
        automaton::{MealyMachine, MooreMachine, DFA},
        math,
        transition_system::{Edge, StateIndex, TSBuilder, DTS},
        word::Word,
        Color, Int, Show, Void,
    };
}
