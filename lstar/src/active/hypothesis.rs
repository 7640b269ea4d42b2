use lstar_core::prelude::*;

use crate::error::LStarError;

use super::{ObservationTable, Row};

/// Shorthand for the symbol type of a hypothesis.
pub type SymbolOf<H> = <<H as Hypothesis>::Alphabet as Alphabet>::Symbol;

/// Something that behaves like a deterministic automaton producing outputs of type
/// [`Hypothesis::Output`]. This is what equivalence oracles compare against each other.
///
/// Outputs are either attached to states (as in a Moore machine) or to transitions (as in a
/// Mealy machine). The output of a word is the state output of the initial state for the empty
/// word and the transition output of its last symbol otherwise.
pub trait Hypothesis {
    type Alphabet: Alphabet;
    type Output: Color;

    fn alphabet(&self) -> &Self::Alphabet;

    fn initial(&self) -> StateIndex;

    fn size(&self) -> usize;

    fn successor(&self, state: StateIndex, symbol: SymbolOf<Self>) -> Option<StateIndex>;

    /// The output that is associated with `state`, if there is one.
    fn state_output(&self, state: StateIndex) -> Option<Self::Output>;

    /// The output that is produced when reading `symbol` in `state`.
    fn transition_output(&self, state: StateIndex, symbol: SymbolOf<Self>) -> Option<Self::Output>;

    fn reached_index(&self, word: &[SymbolOf<Self>]) -> Option<StateIndex> {
        word.iter()
            .try_fold(self.initial(), |q, &a| self.successor(q, a))
    }

    fn output(&self, word: &[SymbolOf<Self>]) -> Option<Self::Output> {
        match word.split_last() {
            None => self.state_output(self.initial()),
            Some((last, init)) => {
                let q = self.reached_index(init)?;
                self.transition_output(q, *last)
            }
        }
    }
}

impl<A: Alphabet, Q: Color> Hypothesis for MooreMachine<A, Q> {
    type Alphabet = A;
    type Output = Q;

    fn alphabet(&self) -> &A {
        MooreMachine::alphabet(self)
    }

    fn initial(&self) -> StateIndex {
        MooreMachine::initial(self)
    }

    fn size(&self) -> usize {
        MooreMachine::size(self)
    }

    fn successor(&self, state: StateIndex, symbol: A::Symbol) -> Option<StateIndex> {
        self.ts().successor(state, symbol)
    }

    fn state_output(&self, state: StateIndex) -> Option<Q> {
        self.ts().state_color(state).cloned()
    }

    fn transition_output(&self, state: StateIndex, symbol: A::Symbol) -> Option<Q> {
        self.successor(state, symbol)
            .and_then(|q| self.state_output(q))
    }
}

impl<A: Alphabet, C: Color> Hypothesis for MealyMachine<A, C> {
    type Alphabet = A;
    type Output = C;

    fn alphabet(&self) -> &A {
        MealyMachine::alphabet(self)
    }

    fn initial(&self) -> StateIndex {
        MealyMachine::initial(self)
    }

    fn size(&self) -> usize {
        MealyMachine::size(self)
    }

    fn successor(&self, state: StateIndex, symbol: A::Symbol) -> Option<StateIndex> {
        self.ts().successor(state, symbol)
    }

    fn state_output(&self, _state: StateIndex) -> Option<C> {
        None
    }

    fn transition_output(&self, state: StateIndex, symbol: A::Symbol) -> Option<C> {
        self.ts().edge(state, symbol).map(|(c, _)| c.clone())
    }
}

/// A hypothesis type that L* can construct from a closed observation table. It determines
/// which suffixes must always be present and how rows translate into state and edge colors.
pub trait LStarHypothesis: Hypothesis + Sized {
    type StateColor: Color;
    type EdgeColor: Color;

    /// The suffixes that every table must contain so that the colors can be read off.
    fn mandatory_suffixes(alphabet: &Self::Alphabet) -> Vec<Word<SymbolOf<Self>>>;

    /// The suffixes that have to be added when `symbol` joins the alphabet.
    fn suffixes_for_new_symbol(symbol: SymbolOf<Self>) -> Vec<Word<SymbolOf<Self>>>;

    fn give_state_color(
        table: &ObservationTable<Self::Alphabet, Self::Output>,
        row: &Row<SymbolOf<Self>>,
    ) -> Result<Self::StateColor, LStarError>;

    fn give_transition_color(
        table: &ObservationTable<Self::Alphabet, Self::Output>,
        row: &Row<SymbolOf<Self>>,
        symbol_index: usize,
    ) -> Result<Self::EdgeColor, LStarError>;

    fn from_transition_system(
        ts: DTS<Self::Alphabet, Self::StateColor, Self::EdgeColor>,
        initial: StateIndex,
    ) -> Self;
}

fn lookup<A: Alphabet, D: Color>(
    table: &ObservationTable<A, D>,
    row: &Row<A::Symbol>,
    suffix: &Word<A::Symbol>,
) -> Result<D, LStarError> {
    let index = table.suffix_index(suffix).ok_or_else(|| {
        LStarError::IncompleteTable(format!("mandatory suffix {} is missing", suffix.show()))
    })?;
    table.cell(row.id(), index).cloned().ok_or_else(|| {
        LStarError::IncompleteTable(format!("row {} has no content", row.prefix().show()))
    })
}

impl<A: Alphabet, Q: Color> LStarHypothesis for MooreMachine<A, Q> {
    type StateColor = Q;
    type EdgeColor = Void;

    fn mandatory_suffixes(_alphabet: &A) -> Vec<Word<A::Symbol>> {
        vec![Word::empty()]
    }

    fn suffixes_for_new_symbol(_symbol: A::Symbol) -> Vec<Word<A::Symbol>> {
        vec![]
    }

    fn give_state_color(
        table: &ObservationTable<A, Q>,
        row: &Row<A::Symbol>,
    ) -> Result<Q, LStarError> {
        lookup(table, row, &Word::empty())
    }

    fn give_transition_color(
        _table: &ObservationTable<A, Q>,
        _row: &Row<A::Symbol>,
        _symbol_index: usize,
    ) -> Result<Void, LStarError> {
        Ok(Void)
    }

    fn from_transition_system(ts: DTS<A, Q, Void>, initial: StateIndex) -> Self {
        MooreMachine::from_parts(ts, initial)
    }
}

impl<A: Alphabet, C: Color> LStarHypothesis for MealyMachine<A, C> {
    type StateColor = Void;
    type EdgeColor = C;

    fn mandatory_suffixes(alphabet: &A) -> Vec<Word<A::Symbol>> {
        alphabet.universe().map(Word::singleton).collect()
    }

    fn suffixes_for_new_symbol(symbol: A::Symbol) -> Vec<Word<A::Symbol>> {
        vec![Word::singleton(symbol)]
    }

    fn give_state_color(
        _table: &ObservationTable<A, C>,
        _row: &Row<A::Symbol>,
    ) -> Result<Void, LStarError> {
        Ok(Void)
    }

    fn give_transition_color(
        table: &ObservationTable<A, C>,
        row: &Row<A::Symbol>,
        symbol_index: usize,
    ) -> Result<C, LStarError> {
        let symbol = table.alphabet().symbol(symbol_index).ok_or_else(|| {
            LStarError::IncompleteTable(format!("no symbol with index {symbol_index}"))
        })?;
        lookup(table, row, &Word::singleton(symbol))
    }

    fn from_transition_system(ts: DTS<A, Void, C>, initial: StateIndex) -> Self {
        MealyMachine::from_parts(ts, initial)
    }
}
