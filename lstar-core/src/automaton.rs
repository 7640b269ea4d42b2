use std::fmt::Debug;

use crate::prelude::*;

/// A Moore machine is a deterministic transition system with a designated initial state, where
/// every state carries an output color. The output on a finite word is the color of the state
/// that is reached by it, so in particular the empty word has an output.
#[derive(Clone)]
pub struct MooreMachine<A: Alphabet = CharAlphabet, Q = Int> {
    ts: DTS<A, Q, Void>,
    initial: StateIndex,
}

/// A deterministic finite automaton is a [`MooreMachine`] that outputs `bool`.
pub type DFA<A = CharAlphabet> = MooreMachine<A, bool>;

impl<A: Alphabet, Q: Color> MooreMachine<A, Q> {
    /// Builds a Moore machine from a transition system and the index of its initial state.
    pub fn from_parts(ts: DTS<A, Q, Void>, initial: StateIndex) -> Self {
        Self { ts, initial }
    }

    pub fn ts(&self) -> &DTS<A, Q, Void> {
        &self.ts
    }

    pub fn alphabet(&self) -> &A {
        self.ts.alphabet()
    }

    pub fn initial(&self) -> StateIndex {
        self.initial
    }

    pub fn size(&self) -> usize {
        self.ts.size()
    }

    /// Returns the color of the state reached by `word`, or `None` if the run is not defined.
    pub fn output(&self, word: &[A::Symbol]) -> Option<Q> {
        self.ts
            .reached_state_index_from(self.initial, word)
            .and_then(|q| self.ts.state_color(q).cloned())
    }
}

impl<A: Alphabet> MooreMachine<A, bool> {
    /// Returns true if the run of `word` exists and ends in an accepting state.
    pub fn accepts(&self, word: &[A::Symbol]) -> bool {
        self.output(word).unwrap_or(false)
    }
}

impl<A: Alphabet, Q: Color + Show> Debug for MooreMachine<A, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Moore machine with initial state {}", self.initial)?;
        write!(f, "{:?}", self.ts)
    }
}

/// A Mealy machine is a deterministic transition system with a designated initial state, where
/// every edge emits an output color. The output on a non-empty word is the color of the last
/// edge that is taken; the empty word has no output.
#[derive(Clone)]
pub struct MealyMachine<A: Alphabet = CharAlphabet, C = Int> {
    ts: DTS<A, Void, C>,
    initial: StateIndex,
}

impl<A: Alphabet, C: Color> MealyMachine<A, C> {
    /// Builds a Mealy machine from a transition system and the index of its initial state.
    pub fn from_parts(ts: DTS<A, Void, C>, initial: StateIndex) -> Self {
        Self { ts, initial }
    }

    pub fn ts(&self) -> &DTS<A, Void, C> {
        &self.ts
    }

    pub fn alphabet(&self) -> &A {
        self.ts.alphabet()
    }

    pub fn initial(&self) -> StateIndex {
        self.initial
    }

    pub fn size(&self) -> usize {
        self.ts.size()
    }

    /// Returns the color of the last edge taken when reading `word`. This is `None` for the
    /// empty word and for words whose run is not defined.
    pub fn output(&self, word: &[A::Symbol]) -> Option<C> {
        self.ts.last_edge_color_from(self.initial, word)
    }

    /// Returns the sequence of colors emitted while reading `word`, stopping at the first
    /// missing edge.
    pub fn transduce(&self, word: &[A::Symbol]) -> Vec<C> {
        let mut out = Vec::with_capacity(word.len());
        let mut q = self.initial;
        for &a in word {
            let Some((c, p)) = self.ts.edge(q, a) else {
                break;
            };
            out.push(c.clone());
            q = p;
        }
        out
    }
}

impl<A: Alphabet, C: Color + Show> Debug for MealyMachine<A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mealy machine with initial state {}", self.initial)?;
        write!(f, "{:?}", self.ts)
    }
}
