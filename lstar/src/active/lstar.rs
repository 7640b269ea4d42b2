use std::time::Instant;

use lstar_core::prelude::*;
use lstar_core::show_duration;
use tracing::{debug, info, trace};

use crate::error::LStarError;

use super::{
    ClassicLStar, CloseFirst, ClosingStrategy, ContentId, CounterexampleHandler,
    EquivalenceOracle, LStarHypothesis, MembershipOracle, ObservationTable, SymbolOf,
    Unclosed,
};

/// The number of table operations after which learning is aborted, unless overridden through
/// the `MAX_ITERATIONS` environment variable.
pub const ITERATION_THRESHOLD: usize = if cfg!(debug_assertions) { 300 } else { 200000 };

/// Knobs of the [`LStar`] learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LStarConfig {
    /// Learning fails with [`LStarError::IterationThresholdExceeded`] once this many closing,
    /// consistency or refinement steps have been made.
    pub max_iterations: usize,
    /// Whether inconsistencies between the initial short prefixes are resolved on start.
    pub check_initial_consistency: bool,
}

impl Default for LStarConfig {
    fn default() -> Self {
        let max_iterations = std::env::var("MAX_ITERATIONS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(ITERATION_THRESHOLD);
        Self {
            max_iterations,
            check_initial_consistency: true,
        }
    }
}

/// An implementation of the L* algorithm on top of an [`ObservationTable`]. It learns a
/// hypothesis of type `H` (a Moore or Mealy machine) from a membership oracle `O`.
///
/// How unclosed tables are closed and how counterexamples are processed can be swapped out
/// through [`LStar::with_closing_strategy`] and [`LStar::with_counterexample_handler`]. By
/// default the first unclosed row is promoted and counterexamples are handled as in Angluin's
/// original algorithm.
pub struct LStar<H: LStarHypothesis, O> {
    oracle: O,
    table: ObservationTable<H::Alphabet, H::Output>,
    closing: Box<dyn ClosingStrategy<H::Alphabet, H::Output>>,
    handler: Box<dyn CounterexampleHandler<H::Alphabet, H::Output>>,
    config: LStarConfig,
    iterations: usize,
}

impl<H, O> LStar<H, O>
where
    H: LStarHypothesis,
    O: MembershipOracle<Symbol = SymbolOf<H>, Output = H::Output>,
{
    pub fn new(alphabet: H::Alphabet, oracle: O) -> Self {
        Self {
            oracle,
            table: ObservationTable::new(alphabet),
            closing: Box::new(CloseFirst),
            handler: Box::new(ClassicLStar),
            config: LStarConfig::default(),
            iterations: 0,
        }
    }

    pub fn with_closing_strategy<C>(mut self, closing: C) -> Self
    where
        C: ClosingStrategy<H::Alphabet, H::Output> + 'static,
    {
        self.closing = Box::new(closing);
        self
    }

    pub fn with_counterexample_handler<X>(mut self, handler: X) -> Self
    where
        X: CounterexampleHandler<H::Alphabet, H::Output> + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    pub fn with_config(mut self, config: LStarConfig) -> Self {
        self.config = config;
        self
    }

    pub fn table(&self) -> &ObservationTable<H::Alphabet, H::Output> {
        &self.table
    }

    pub fn config(&self) -> &LStarConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Initializes the table with the empty word as only short prefix and the suffixes that
    /// the hypothesis type needs, closes it and returns the first hypothesis.
    pub fn start(&mut self) -> Result<H, LStarError> {
        let suffixes = H::mandatory_suffixes(self.table.alphabet());
        let unclosed = self
            .table
            .initialize([Word::empty()], suffixes, &self.oracle)?;
        let check = self.config.check_initial_consistency
            && self.table.is_initial_consistency_check_required();
        self.complete_consistent_table(unclosed, check)?;
        self.hypothesis()
    }

    /// Incorporates a counterexample, i.e. a word together with the output of the system under
    /// learning on it. The table is grown until the hypothesis produces `output` on
    /// `counterexample`. Returns `false` without changing anything if the current hypothesis
    /// already agrees with `output`.
    pub fn refine(
        &mut self,
        counterexample: &Word<SymbolOf<H>>,
        output: H::Output,
    ) -> Result<bool, LStarError> {
        let mut hypothesis = self.hypothesis()?;
        if hypothesis.output(counterexample).as_ref() == Some(&output) {
            return Ok(false);
        }

        loop {
            self.tick()?;
            let unclosed = self.handler.handle(
                &mut self.table,
                counterexample,
                &output,
                &hypothesis,
                &self.oracle,
            )?;
            self.complete_consistent_table(unclosed, self.handler.needs_consistency_check())?;
            hypothesis = self.hypothesis()?;
            if hypothesis.output(counterexample).as_ref() == Some(&output) {
                break;
            }
            trace!(
                "{} is still a counterexample, refining again",
                counterexample.show()
            );
        }
        debug!(
            "refined with counterexample {}, hypothesis now has {} states",
            counterexample.show(),
            hypothesis.size()
        );
        Ok(true)
    }

    /// Builds the hypothesis for the current table. There is one state for every distinct
    /// content among the short rows, the state of a content is represented by its canonical
    /// row. The table must be closed, and consistent if short rows share contents.
    pub fn hypothesis(&self) -> Result<H, LStarError> {
        let start = Instant::now();
        if !self.table.is_initialized() {
            return Err(LStarError::IncompleteTable(
                "table is not initialized".to_string(),
            ));
        }

        let alphabet = self.table.alphabet();
        let mut ts = DTS::for_alphabet_size_hint(alphabet.clone(), self.table.num_distinct_rows());
        let mut states: math::Map<ContentId, StateIndex> = math::Map::default();
        let mut representatives = vec![];

        for row in self.table.short_prefix_rows() {
            let content = row.content_id().ok_or_else(|| {
                LStarError::IncompleteTable(format!("row {} has no content", row.prefix().show()))
            })?;
            if states.contains_key(&content) {
                continue;
            }
            let state = ts.add_state(H::give_state_color(&self.table, row)?);
            states.insert(content, state);
            representatives.push((state, row));
        }

        for (state, row) in representatives {
            for (index, symbol) in alphabet.universe().enumerate() {
                let target = row
                    .successor(index)
                    .and_then(|id| self.table.row(id))
                    .and_then(|successor| successor.content_id())
                    .and_then(|content| states.get(&content))
                    .ok_or_else(|| {
                        LStarError::IncompleteTable(format!(
                            "successor of {} on {} is not closed",
                            row.prefix().show(),
                            symbol.show()
                        ))
                    })?;
                let color = H::give_transition_color(&self.table, row, index)?;
                ts.add_edge(state, symbol, color, *target).ok_or_else(|| {
                    LStarError::IncompleteTable(format!(
                        "no edge from {} on {} to {target}",
                        row.prefix().show(),
                        symbol.show()
                    ))
                })?;
            }
        }

        debug!(
            "building hypothesis with {} states took {}",
            ts.size(),
            show_duration(start.elapsed())
        );
        // the empty word is always the first short row
        Ok(H::from_transition_system(ts, 0))
    }

    /// Runs the full learning loop: hypotheses are built and checked with `equivalence` until
    /// no more counterexamples are found.
    pub fn infer<E: EquivalenceOracle<H>>(&mut self, equivalence: &E) -> Result<H, LStarError> {
        let start = Instant::now();
        let mut hypothesis = if self.table.is_initialized() {
            self.hypothesis()?
        } else {
            self.start()?
        };

        while let Some((counterexample, output)) = equivalence.find_counterexample(&hypothesis) {
            debug!(
                "hypothesis with {} states has counterexample {}",
                hypothesis.size(),
                counterexample.show()
            );
            if !self.refine(&counterexample, output)? {
                return Err(LStarError::SpuriousCounterexample(counterexample.show()));
            }
            hypothesis = self.hypothesis()?;
        }

        info!(
            "L* learned a hypothesis with {} states in {}, {} iterations",
            hypothesis.size(),
            show_duration(start.elapsed()),
            self.iterations
        );
        Ok(hypothesis)
    }

    /// Closes the table and, if `check_consistency` is set, resolves inconsistencies by adding
    /// a distinguishing suffix, until the table is closed and consistent.
    fn complete_consistent_table(
        &mut self,
        mut unclosed: Unclosed,
        check_consistency: bool,
    ) -> Result<(), LStarError> {
        loop {
            while !unclosed.is_empty() {
                self.tick()?;
                let rows = self.closing.select_rows(&unclosed, &self.table);
                unclosed = self.table.promote_to_short(&rows, &self.oracle)?;
            }
            if let Some(row) = self.table.find_unclosed_row() {
                unclosed = vec![vec![row]];
                continue;
            }
            if !check_consistency {
                return Ok(());
            }
            let Some(inconsistency) = self.table.find_inconsistency() else {
                return Ok(());
            };

            self.tick()?;
            let symbol = self
                .table
                .alphabet()
                .symbol(inconsistency.symbol_index)
                .ok_or_else(|| {
                    LStarError::IncompleteTable(format!(
                        "no symbol with index {}",
                        inconsistency.symbol_index
                    ))
                })?;
            let suffix = self
                .table
                .find_distinguishing_suffix(&inconsistency)
                .map(|suffix| Word::singleton(symbol).concat(suffix))
                .ok_or_else(|| {
                    LStarError::IncompleteTable(format!(
                        "no distinguishing suffix for {}",
                        inconsistency.show()
                    ))
                })?;
            debug!(
                "resolving inconsistency {} with suffix {}",
                inconsistency.show(),
                suffix.show()
            );
            unclosed = self.table.add_suffixes([suffix], &self.oracle)?;
        }
    }

    fn tick(&mut self) -> Result<(), LStarError> {
        self.iterations += 1;
        if self.iterations > self.config.max_iterations {
            return Err(LStarError::IterationThresholdExceeded(
                self.config.max_iterations,
            ));
        }
        trace!("L* iteration {} with table\n{:?}", self.iterations, self.table);
        Ok(())
    }
}

impl<H, O> LStar<H, O>
where
    H: LStarHypothesis,
    H::Alphabet: GrowingAlphabet,
    O: MembershipOracle<Symbol = SymbolOf<H>, Output = H::Output>,
{
    /// Adds `symbol` to the alphabet of the learner. The table is extended and closed again,
    /// the next call to [`LStar::hypothesis`] takes the new symbol into account. Does nothing
    /// if the symbol is already known.
    pub fn add_alphabet_symbol(&mut self, symbol: SymbolOf<H>) -> Result<(), LStarError> {
        let created = self.table.add_alphabet_symbol(symbol)?;
        if created.is_empty() {
            return Ok(());
        }
        let unclosed = self
            .table
            .add_suffixes(H::suffixes_for_new_symbol(symbol), &self.oracle)?;
        self.complete_consistent_table(unclosed, self.handler.needs_consistency_check())
    }
}

impl<H: LStarHypothesis, O> std::fmt::Debug for LStar<H, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.table)
    }
}

#[cfg(test)]
mod tests {
    use lstar_core::prelude::*;

    use super::{LStar, LStarConfig};
    use crate::{
        active::{
            product_counterexample, ClassicLStar, CloseFirst, CloseLexMin, CloseRandom,
            CloseShortest, ClosingStrategy, CounterexampleHandler, EquivalenceOracle, FindLinear,
            FindLinearReverse, MalerPnueli, MealyOracle, MooreOracle, RandomWordsOracle,
            RivestSchapire, Shahbaz, Suffix1By1,
        },
        error::LStarError,
    };

    // accepts the words in which the number of `a`s is divisible by three
    fn mod_three() -> DFA {
        TSBuilder::without_edge_colors()
            .with_state_colors([true, false, false])
            .with_transitions([
                (0, 'a', Void, 1),
                (0, 'b', Void, 0),
                (1, 'a', Void, 2),
                (1, 'b', Void, 1),
                (2, 'a', Void, 0),
                (2, 'b', Void, 2),
            ])
            .into_dfa(0)
    }

    // accepts the words that have an `a` in the third position from the end
    fn third_from_end() -> DFA {
        let mut transitions = vec![];
        for q in 0..8usize {
            transitions.push((q, 'a', Void, ((q << 1) | 1) & 7));
            transitions.push((q, 'b', Void, (q << 1) & 7));
        }
        TSBuilder::without_edge_colors()
            .with_state_colors((0..8usize).map(|q| q & 4 != 0))
            .with_transitions(transitions)
            .into_dfa(0)
    }

    fn closing_strategies() -> Vec<(&'static str, Box<dyn ClosingStrategy<CharAlphabet, bool>>)> {
        vec![
            ("first", Box::new(CloseFirst)),
            ("shortest", Box::new(CloseShortest)),
            ("lex-min", Box::new(CloseLexMin)),
            ("random", Box::new(CloseRandom::new(17))),
        ]
    }

    fn handlers() -> Vec<(&'static str, Box<dyn CounterexampleHandler<CharAlphabet, bool>>)> {
        vec![
            ("classic", Box::new(ClassicLStar)),
            ("suffix-1-by-1", Box::new(Suffix1By1)),
            ("maler-pnueli", Box::new(MalerPnueli)),
            ("shahbaz", Box::new(Shahbaz)),
            ("find-linear", Box::new(FindLinear::default())),
            (
                "find-linear-all",
                Box::new(FindLinear { all_suffixes: true }),
            ),
            ("find-linear-reverse", Box::new(FindLinearReverse::default())),
            ("rivest-schapire", Box::new(RivestSchapire::default())),
            (
                "rivest-schapire-all",
                Box::new(RivestSchapire { all_suffixes: true }),
            ),
        ]
    }

    #[test_log::test]
    fn lstar_dfa_with_all_strategies() {
        for target in [mod_three(), third_from_end()] {
            let oracle = MooreOracle::new(target.clone());
            for i in 0..closing_strategies().len() {
                for j in 0..handlers().len() {
                    // the boxes are consumed by the learner, so fresh ones are built every time
                    let (closing_name, closing) = closing_strategies().swap_remove(i);
                    let (handler_name, handler) = handlers().swap_remove(j);

                    let mut learner: LStar<DFA, _> =
                        LStar::new(target.alphabet().clone(), oracle.clone())
                            .with_closing_strategy(closing)
                            .with_counterexample_handler(handler);
                    let learned = learner.infer(&oracle).unwrap();
                    assert_eq!(
                        learned.size(),
                        target.size(),
                        "{closing_name} with {handler_name}"
                    );
                    assert_eq!(product_counterexample(&target, &learned), None);
                    assert!(learner.table().is_closed());
                }
            }
        }
    }

    #[test_log::test]
    fn lstar_mealy() {
        let target = TSBuilder::without_state_colors()
            .with_transitions([
                (0, 'a', 0u8, 0),
                (0, 'b', 1, 1),
                (0, 'c', 2, 2),
                (1, 'a', 0, 2),
                (1, 'b', 1, 1),
                (1, 'c', 2, 2),
                (2, 'a', 2, 2),
                (2, 'b', 0, 0),
                (2, 'c', 1, 2),
            ])
            .into_mealy(0);

        let alphabet = target.alphabet().clone();
        let oracle = MealyOracle::new(target, None);
        let learned: MealyMachine = LStar::new(alphabet.clone(), oracle.clone())
            .infer(&oracle)
            .unwrap();
        assert_eq!(learned.size(), 3);

        let learned: MealyMachine = LStar::new(alphabet, oracle.clone())
            .with_counterexample_handler(RivestSchapire::default())
            .with_closing_strategy(CloseShortest)
            .infer(&oracle)
            .unwrap();
        assert_eq!(learned.size(), 3);
        assert_eq!(oracle.find_counterexample(&learned), None);
    }

    #[test_log::test]
    fn growing_alphabet() {
        let target = mod_three();
        let oracle = MooreOracle::new(target.clone());
        let mut learner: LStar<DFA, _> = LStar::new(alphabet!(simple 'b'), oracle.clone())
            .with_counterexample_handler(RivestSchapire::default());
        // over `b` alone every word is accepted
        assert_eq!(learner.start().unwrap().size(), 1);

        learner.add_alphabet_symbol('a').unwrap();
        assert!(learner.table().pending_rows().is_empty());
        learner.add_alphabet_symbol('a').unwrap();

        let learned = learner.infer(&oracle).unwrap();
        assert_eq!(learned.size(), 3);
        assert_eq!(learned.alphabet().size(), 2);
        assert!(learned.accepts(&Word::from("abaab")));
        assert!(!learned.accepts(&Word::from("abab")));
    }

    #[test_log::test]
    fn random_testing() {
        let target = mod_three();
        let membership = MooreOracle::new(target.clone());
        let equivalence = RandomWordsOracle::new(membership.clone(), 500, 0, 10, 1234);
        let learned: DFA = LStar::new(target.alphabet().clone(), membership)
            .with_counterexample_handler(MalerPnueli)
            .infer(&equivalence)
            .unwrap();
        assert_eq!(learned.size(), 3);
        assert_eq!(product_counterexample(&target, &learned), None);
    }

    #[test]
    fn refinement_and_limits() {
        let target = mod_three();
        let oracle = MooreOracle::new(target.clone());
        let mut learner: LStar<DFA, _> = LStar::new(target.alphabet().clone(), oracle.clone());
        let first = learner.start().unwrap();
        assert_eq!(first.size(), 2);
        // the first hypothesis already rejects `a`
        assert!(!learner.refine(&Word::from("a"), false).unwrap());
        assert!(learner.refine(&Word::from("aaa"), true).unwrap());
        assert_eq!(learner.hypothesis().unwrap().size(), 3);

        let config = LStarConfig {
            max_iterations: 1,
            check_initial_consistency: true,
        };
        let mut limited: LStar<DFA, _> =
            LStar::new(target.alphabet().clone(), oracle.clone()).with_config(config);
        assert!(matches!(
            limited.infer(&oracle),
            Err(LStarError::IterationThresholdExceeded(1))
        ));

        let fresh: LStar<DFA, _> = LStar::new(target.alphabet().clone(), oracle);
        assert!(matches!(
            fresh.hypothesis(),
            Err(LStarError::IncompleteTable(_))
        ));
    }
}
