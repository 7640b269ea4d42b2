use std::fmt::Debug;

use itertools::Itertools;
use tracing::trace;

use crate::prelude::*;

use self::math::Set;

/// Index of a state in a [`DTS`]. States are numbered densely in the order of their creation.
pub type StateIndex = usize;

/// An edge of a [`DTS`], consisting of the color that is emitted when it is taken and the
/// index of the state it leads to.
pub type Edge<C> = (C, StateIndex);

#[derive(Clone, PartialEq, Eq)]
struct State<Q, C> {
    color: Q,
    edges: Vec<Option<Edge<C>>>,
}

/// A deterministic transition system over some [`Alphabet`] `A`. States carry a color of type `Q`
/// and every edge carries a color of type `C`. For each state, the outgoing edges are stored
/// densely by the index that the corresponding symbol has in the alphabet, so a lookup is a
/// single vector access.
///
/// Transition systems do not need to be complete, a missing edge simply means that the word
/// leaves the system. If the alphabet grows, all states implicitly lack an edge on the new
/// symbol until one is added.
#[derive(Clone)]
pub struct DTS<A: Alphabet = CharAlphabet, Q = Void, C = Void> {
    alphabet: A,
    states: Vec<State<Q, C>>,
}

impl<A: Alphabet, Q: Color, C: Color> DTS<A, Q, C> {
    /// Creates an empty transition system over the given alphabet.
    pub fn for_alphabet(alphabet: A) -> Self {
        Self::for_alphabet_size_hint(alphabet, 0)
    }

    /// Creates an empty transition system that has room for `size_hint` states.
    pub fn for_alphabet_size_hint(alphabet: A, size_hint: usize) -> Self {
        Self {
            alphabet,
            states: Vec::with_capacity(size_hint),
        }
    }

    pub fn alphabet(&self) -> &A {
        &self.alphabet
    }

    /// Returns the number of states.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Iterates over the indices of all states.
    pub fn state_indices(&self) -> std::ops::Range<StateIndex> {
        0..self.states.len()
    }

    /// Adds a new state with the given `color` and returns its index.
    pub fn add_state(&mut self, color: Q) -> StateIndex {
        let id = self.states.len();
        self.states.push(State {
            color,
            edges: vec![None; self.alphabet.size()],
        });
        id
    }

    /// Adds an edge from `source` on `symbol` to `target`, replacing a previously present edge.
    /// Returns the index of `symbol` in the alphabet, or `None` if either of the states does not
    /// exist or the symbol is unknown.
    pub fn add_edge(
        &mut self,
        source: StateIndex,
        symbol: A::Symbol,
        color: C,
        target: StateIndex,
    ) -> Option<usize> {
        if target >= self.states.len() {
            return None;
        }
        let index = self.alphabet.index_of(symbol)?;
        let state = self.states.get_mut(source)?;
        if state.edges.len() <= index {
            state.edges.resize(index + 1, None);
        }
        state.edges[index] = Some((color, target));
        Some(index)
    }

    /// Returns the color of the given state.
    pub fn state_color(&self, state: StateIndex) -> Option<&Q> {
        self.states.get(state).map(|q| &q.color)
    }

    /// Returns the edge that leaves `state` on `symbol`, if it exists.
    pub fn edge(&self, state: StateIndex, symbol: A::Symbol) -> Option<(&C, StateIndex)> {
        let index = self.alphabet.index_of(symbol)?;
        self.edge_by_index(state, index)
    }

    /// Returns the edge that leaves `state` on the symbol with the given alphabet index.
    pub fn edge_by_index(&self, state: StateIndex, index: usize) -> Option<(&C, StateIndex)> {
        self.states
            .get(state)?
            .edges
            .get(index)?
            .as_ref()
            .map(|(c, p)| (c, *p))
    }

    /// Returns the state that is reached from `state` by reading `symbol`.
    pub fn successor(&self, state: StateIndex, symbol: A::Symbol) -> Option<StateIndex> {
        self.edge(state, symbol).map(|(_, p)| p)
    }

    /// Runs `word` starting in `source` and returns the state that is reached, or `None` if the
    /// run leaves the transition system.
    pub fn reached_state_index_from(
        &self,
        source: StateIndex,
        word: &[A::Symbol],
    ) -> Option<StateIndex> {
        word.iter()
            .try_fold(source, |q, &a| self.successor(q, a))
    }

    /// Runs `word` starting in `source` and returns the color of the last edge that is taken.
    /// Gives `None` if the run leaves the transition system or if `word` is empty.
    pub fn last_edge_color_from(&self, source: StateIndex, word: &[A::Symbol]) -> Option<C> {
        let (last, init) = word.split_last()?;
        let q = self.reached_state_index_from(source, init)?;
        self.edge(q, *last).map(|(c, _)| c.clone())
    }

    /// Returns true if every state has an outgoing edge for every symbol of the alphabet.
    pub fn is_complete(&self) -> bool {
        self.state_indices().all(|q| {
            (0..self.alphabet.size()).all(|i| self.edge_by_index(q, i).is_some())
        })
    }
}

impl<A: Alphabet, Q: Color + Show, C: Color + Show> Debug for DTS<A, Q, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for q in self.state_indices() {
            let edges = self
                .alphabet
                .universe()
                .filter_map(|a| {
                    self.edge(q, a)
                        .map(|(c, p)| format!("{}|{} -> {p}", a.show(), c.show()))
                })
                .join(", ");
            writeln!(f, "{q}[{}]: {edges}", self.states[q].color.show())?;
        }
        Ok(())
    }
}

/// Helper struct for the construction of deterministic transition systems over a [`CharAlphabet`].
/// It stores a list of edges, a list of state colors and a default state color. It is mainly used
/// to quickly write down target systems, for example in tests.
///
/// # Example
///
/// We want to create a DFA with two states 0 and 1 over the alphabet `['a', 'b']`. We want to
/// add the following transitions:
/// - From state 0 to state 0 on symbol 'a'
/// - From state 0 to state 1 on symbol 'b'
/// - From state 1 to state 1 on symbol 'a'
/// - From state 1 to state 0 on symbol 'b'
///
/// Further, state 0 should be initial and colored `true` and state 1 should be colored
/// `false`. This can be done as follows
/// ```
/// use lstar_core::prelude::*;
///
/// let dfa = TSBuilder::without_edge_colors()
///     .with_state_colors([true, false]) // colors given in the order of the states
///     .with_transitions([
///         (0, 'a', Void, 0),
///         (0, 'b', Void, 1),
///         (1, 'a', Void, 1),
///         (1, 'b', Void, 0),
///     ])
///     .into_dfa(0); // 0 is the initial state
/// assert!(dfa.accepts(&Word::from("abba")));
/// ```
pub struct TSBuilder<Q = Void, C = Void> {
    symbols: Set<char>,
    edges: Vec<(StateIndex, char, C, StateIndex)>,
    default: Option<Q>,
    colors: Vec<(StateIndex, Q)>,
}

impl<C> TSBuilder<Void, C> {
    /// Creates an empty instance of `Self`, where states are uncolored (have color [`Void`])
    pub fn without_state_colors() -> Self {
        TSBuilder {
            symbols: Set::default(),
            edges: vec![],
            default: Some(Void),
            colors: vec![],
        }
    }
}

impl<Q> TSBuilder<Q, Void> {
    /// Creates an empty instance of `Self`, where edges are uncolored (have color [`Void`])
    pub fn without_edge_colors() -> Self {
        TSBuilder {
            symbols: Set::default(),
            edges: vec![],
            default: None,
            colors: vec![],
        }
    }
}

impl<Q, C> Default for TSBuilder<Q, C> {
    fn default() -> Self {
        Self {
            symbols: Set::default(),
            edges: vec![],
            default: None,
            colors: vec![],
        }
    }
}

impl<Q: Color, C: Color> TSBuilder<Q, C> {
    /// Sets the default color for states that have no color specified.
    pub fn default_color(mut self, color: Q) -> Self {
        self.default = Some(color);
        self
    }

    /// By default, the only alphabet symbols in the transition system that is built are the
    /// ones that appear on at least one transition. This method can be used to force
    /// additional alphabet symbols to appear.
    pub fn with_alphabet_symbols<I>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = char>,
    {
        self.symbols.extend(symbols);
        self
    }

    /// Adds a list of colors to `self`. The colors are assigned to the states in the order in
    /// which they are given.
    pub fn with_state_colors<I: IntoIterator<Item = Q>>(self, iter: I) -> Self {
        iter.into_iter()
            .enumerate()
            .fold(self, |acc, (i, x)| acc.color(i, x))
    }

    /// Assigns the given `color` to the state with the given index `idx`.
    pub fn color(mut self, idx: StateIndex, color: Q) -> Self {
        assert!(self.colors.iter().all(|(q, _c)| q != &idx));
        self.colors.push((idx, color));
        self
    }

    /// Adds a list of transitions to `self`, each given as a tuple
    /// `(source, symbol, color, target)`.
    pub fn with_transitions<T: IntoIterator<Item = (StateIndex, char, C, StateIndex)>>(
        mut self,
        iter: T,
    ) -> Self {
        self.edges.extend(iter);
        self
    }

    /// Builds an instance of [`DTS`] from `self`. The alphabet consists of all symbols that
    /// appear on an edge (in order of appearance) followed by the additional symbols.
    ///
    /// Panics if a state has no color and no default color was set.
    pub fn into_dts(self) -> DTS<CharAlphabet, Q, C> {
        let alphabet =
            CharAlphabet::from_iter(self.edges.iter().map(|(_, c, _, _)| *c).chain(self.symbols));

        let num_states = self
            .edges
            .iter()
            .flat_map(|(q, _, _, p)| [*p, *q])
            .chain(self.colors.iter().map(|(q, _)| *q))
            .max()
            .map_or(0, |max| max + 1);
        let mut ts = DTS::for_alphabet_size_hint(alphabet, num_states);

        for i in 0..num_states {
            let color = self
                .colors
                .iter()
                .find_map(|(q, c)| if *q == i { Some(c.clone()) } else { None })
                .or_else(|| self.default.clone())
                .unwrap_or_else(|| {
                    panic!(
                        "Default is needed as some states (specifically {}) have no color",
                        i.show()
                    )
                });
            ts.add_state(color);
        }

        for (q, e, c, p) in self.edges {
            let added = ts.add_edge(q, e, c, p);
            assert!(added.is_some());
        }
        trace!("built transition system with {num_states} states");
        ts
    }
}

impl<Q: Color> TSBuilder<Q, Void> {
    /// Builds a [`MooreMachine`] with the given `initial` state from `self`.
    pub fn into_moore(self, initial: StateIndex) -> MooreMachine<CharAlphabet, Q> {
        MooreMachine::from_parts(self.into_dts(), initial)
    }
}

impl TSBuilder<bool, Void> {
    /// Turns `self` into a deterministic finite automaton with the given `initial` state.
    pub fn into_dfa(self, initial: StateIndex) -> DFA<CharAlphabet> {
        self.into_moore(initial)
    }
}

impl<C: Color> TSBuilder<Void, C> {
    /// Turns `self` into a [`MealyMachine`] with the given `initial` state.
    pub fn into_mealy(self, initial: StateIndex) -> MealyMachine<CharAlphabet, C> {
        MealyMachine::from_parts(self.into_dts(), initial)
    }
}
