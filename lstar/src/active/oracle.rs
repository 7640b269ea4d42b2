use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    marker::PhantomData,
};

use lstar_core::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, trace};

use super::{Hypothesis, SymbolOf};

/// A counterexample is an input word together with the output the system under learning
/// actually produces on it.
pub type Counterexample<S, O> = (Word<S>, O);

/// A single membership query. It asks for the output of the system under learning on the
/// concatenation of `prefix` and `suffix`. The oracle provides the output through
/// [`Query::answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<S, D> {
    prefix: Word<S>,
    suffix: Word<S>,
    output: Option<D>,
    answers: usize,
}

impl<S: Symbol, D: Color> Query<S, D> {
    pub fn new(prefix: Word<S>, suffix: Word<S>) -> Self {
        Self {
            prefix,
            suffix,
            output: None,
            answers: 0,
        }
    }

    pub fn prefix(&self) -> &Word<S> {
        &self.prefix
    }

    pub fn suffix(&self) -> &Word<S> {
        &self.suffix
    }

    /// The full input word of this query, i.e. the prefix followed by the suffix.
    pub fn input(&self) -> Word<S> {
        self.prefix.concat(&self.suffix)
    }

    /// Records `output` as the answer to this query.
    pub fn answer(&mut self, output: D) {
        self.answers += 1;
        self.output = Some(output);
    }

    /// Returns the most recent answer, if any was given.
    pub fn output(&self) -> Option<&D> {
        self.output.as_ref()
    }

    pub(crate) fn is_answered_once(&self) -> bool {
        self.answers == 1
    }

    /// Consumes the query and gives back its output, provided it was answered exactly once.
    pub(crate) fn into_output(self) -> Option<D> {
        if self.answers == 1 {
            self.output
        } else {
            None
        }
    }
}

/// A membership oracle answers batches of [`Query`]s about the system under learning. Every
/// query in a batch must be answered exactly once before [`MembershipOracle::process_queries`]
/// returns, and identical queries must receive identical answers. How the oracle gets the
/// answers (sequentially, in parallel, from a cache) is up to the implementation.
///
/// The trait is object safe, so learning strategies can work with a `&dyn MembershipOracle`.
pub trait MembershipOracle {
    type Symbol: Symbol;
    type Output: Color;

    fn process_queries(&self, queries: &mut [Query<Self::Symbol, Self::Output>]);

    /// Poses a single query and returns its output, or `None` if the oracle did not answer it
    /// exactly once.
    fn answer(
        &self,
        prefix: &Word<Self::Symbol>,
        suffix: &Word<Self::Symbol>,
    ) -> Option<Self::Output> {
        let mut queries = [Query::new(prefix.clone(), suffix.clone())];
        self.process_queries(&mut queries);
        let [query] = queries;
        query.into_output()
    }
}

impl<O: MembershipOracle + ?Sized> MembershipOracle for &O {
    type Symbol = O::Symbol;
    type Output = O::Output;

    fn process_queries(&self, queries: &mut [Query<Self::Symbol, Self::Output>]) {
        O::process_queries(self, queries)
    }
}

/// An equivalence oracle checks a hypothesis against the system under learning and produces a
/// [`Counterexample`] if they differ.
pub trait EquivalenceOracle<H: Hypothesis> {
    fn find_counterexample(&self, hypothesis: &H) -> Option<Counterexample<SymbolOf<H>, H::Output>>;
}

/// A membership oracle that is backed by a function. The function may return `None` for
/// inputs on which the output is undefined, such queries stay unanswered.
pub struct FnOracle<S, D, F> {
    f: F,
    _marker: PhantomData<fn(&[S]) -> D>,
}

impl<S: Symbol, D: Color, F: Fn(&[S]) -> Option<D>> FnOracle<S, D, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<S: Symbol, D: Color, F: Fn(&[S]) -> Option<D>> MembershipOracle for FnOracle<S, D, F> {
    type Symbol = S;
    type Output = D;

    fn process_queries(&self, queries: &mut [Query<S, D>]) {
        for query in queries {
            if let Some(output) = (self.f)(query.input().symbols()) {
                query.answer(output);
            }
        }
    }
}

/// Wraps a membership oracle and records every query and batch that passes through it. This
/// is mainly useful for checking that learners do not ask the same question twice.
pub struct CountingOracle<O: MembershipOracle> {
    inner: O,
    inputs: RefCell<Vec<Word<O::Symbol>>>,
    batches: Cell<usize>,
}

impl<O: MembershipOracle> CountingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            inputs: RefCell::new(vec![]),
            batches: Cell::new(0),
        }
    }

    /// The inputs of all queries that were posed so far, in order.
    pub fn inputs(&self) -> Vec<Word<O::Symbol>> {
        self.inputs.borrow().clone()
    }

    pub fn num_queries(&self) -> usize {
        self.inputs.borrow().len()
    }

    /// The number of calls to [`MembershipOracle::process_queries`] so far.
    pub fn num_batches(&self) -> usize {
        self.batches.get()
    }

    /// Forgets all recorded queries and batches.
    pub fn reset(&self) {
        self.inputs.borrow_mut().clear();
        self.batches.set(0);
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: MembershipOracle> MembershipOracle for CountingOracle<O> {
    type Symbol = O::Symbol;
    type Output = O::Output;

    fn process_queries(&self, queries: &mut [Query<O::Symbol, O::Output>]) {
        self.batches.set(self.batches.get() + 1);
        self.inputs
            .borrow_mut()
            .extend(queries.iter().map(|q| q.input()));
        self.inner.process_queries(queries)
    }
}

/// Explores the product of `target` and `hypothesis` breadth-first and returns a shortest word
/// on which the two disagree, together with the output of `target`. Words on which `target` is
/// undefined are skipped.
pub fn product_counterexample<T, H>(
    target: &T,
    hypothesis: &H,
) -> Option<Counterexample<SymbolOf<T>, T::Output>>
where
    T: Hypothesis,
    H: Hypothesis<Alphabet = T::Alphabet, Output = T::Output>,
{
    let start = (target.initial(), hypothesis.initial());
    if let Some(expected) = target.state_output(start.0) {
        if hypothesis.state_output(start.1).as_ref() != Some(&expected) {
            return Some((Word::empty(), expected));
        }
    }

    let mut seen = math::Set::default();
    seen.insert(start);
    let mut queue = VecDeque::from([(start, Word::empty())]);

    while let Some(((t, h), word)) = queue.pop_front() {
        for a in target.alphabet().universe() {
            let Some(expected) = target.transition_output(t, a) else {
                continue;
            };
            let extended = word.append(a);
            if hypothesis.transition_output(h, a).as_ref() != Some(&expected) {
                trace!("found counterexample {} in product", extended.show());
                return Some((extended, expected));
            }
            let (Some(tt), Some(hh)) = (target.successor(t, a), hypothesis.successor(h, a)) else {
                continue;
            };
            if seen.insert((tt, hh)) {
                queue.push_back(((tt, hh), extended));
            }
        }
    }
    None
}

/// An oracle based on a [`MooreMachine`]. Membership queries are answered by running the
/// automaton, equivalence queries by searching the product with the hypothesis.
#[derive(Clone)]
pub struct MooreOracle<A: Alphabet, Q = bool> {
    automaton: MooreMachine<A, Q>,
}

impl<A: Alphabet, Q: Color> MooreOracle<A, Q> {
    /// Creates a new [`MooreOracle`] based on an instance of [`MooreMachine`].
    pub fn new(automaton: MooreMachine<A, Q>) -> Self {
        Self { automaton }
    }

    pub fn alphabet(&self) -> &A {
        self.automaton.alphabet()
    }

    pub fn automaton(&self) -> &MooreMachine<A, Q> {
        &self.automaton
    }
}

impl<A: Alphabet, Q: Color> MembershipOracle for MooreOracle<A, Q> {
    type Symbol = A::Symbol;
    type Output = Q;

    fn process_queries(&self, queries: &mut [Query<A::Symbol, Q>]) {
        for query in queries {
            if let Some(output) = self.automaton.output(&query.input()) {
                query.answer(output);
            }
        }
    }
}

impl<A, Q, H> EquivalenceOracle<H> for MooreOracle<A, Q>
where
    A: Alphabet,
    Q: Color,
    H: Hypothesis<Alphabet = A, Output = Q>,
{
    fn find_counterexample(&self, hypothesis: &H) -> Option<Counterexample<A::Symbol, Q>> {
        product_counterexample(&self.automaton, hypothesis)
    }
}

/// An oracle based on a [`MealyMachine`]. The output on a word is the color of the last edge
/// that is taken. If `default` is set, it is given for words on which the automaton is not
/// defined (including the empty word), otherwise such queries remain unanswered.
#[derive(Clone)]
pub struct MealyOracle<A: Alphabet, C = Int> {
    automaton: MealyMachine<A, C>,
    default: Option<C>,
}

impl<A: Alphabet, C: Color> MealyOracle<A, C> {
    /// Creates a new [`MealyOracle`] based on an instance of [`MealyMachine`].
    pub fn new(automaton: MealyMachine<A, C>, default: Option<C>) -> Self {
        Self { automaton, default }
    }

    pub fn alphabet(&self) -> &A {
        self.automaton.alphabet()
    }

    pub fn automaton(&self) -> &MealyMachine<A, C> {
        &self.automaton
    }
}

impl<A: Alphabet, C: Color> MembershipOracle for MealyOracle<A, C> {
    type Symbol = A::Symbol;
    type Output = C;

    fn process_queries(&self, queries: &mut [Query<A::Symbol, C>]) {
        for query in queries {
            if let Some(output) = self
                .automaton
                .output(&query.input())
                .or_else(|| self.default.clone())
            {
                query.answer(output);
            }
        }
    }
}

impl<A, C, H> EquivalenceOracle<H> for MealyOracle<A, C>
where
    A: Alphabet,
    C: Color,
    H: Hypothesis<Alphabet = A, Output = C>,
{
    fn find_counterexample(&self, hypothesis: &H) -> Option<Counterexample<A::Symbol, C>> {
        product_counterexample(&self.automaton, hypothesis)
    }
}

/// An equivalence oracle that tests a hypothesis on randomly drawn words. The words have a
/// length between `min_length` and `max_length` (both inclusive) and are drawn from a seeded
/// generator, so runs are reproducible. Finding no counterexample does not mean the hypothesis
/// is correct.
pub struct RandomWordsOracle<O> {
    oracle: O,
    num_words: usize,
    min_length: usize,
    max_length: usize,
    rng: RefCell<StdRng>,
}

impl<O: MembershipOracle> RandomWordsOracle<O> {
    pub fn new(
        oracle: O,
        num_words: usize,
        min_length: usize,
        max_length: usize,
        seed: u64,
    ) -> Self {
        assert!(min_length <= max_length, "minimal length exceeds maximal length");
        Self {
            oracle,
            num_words,
            min_length,
            max_length,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn random_word<A: Alphabet<Symbol = O::Symbol>>(
        &self,
        alphabet: &A,
    ) -> Option<Word<O::Symbol>> {
        let mut rng = self.rng.borrow_mut();
        let length = rng.gen_range(self.min_length..=self.max_length);
        if alphabet.is_empty() {
            return (length == 0).then(Word::empty);
        }
        (0..length)
            .map(|_| alphabet.symbol(rng.gen_range(0..alphabet.size())))
            .collect()
    }
}

impl<O, H> EquivalenceOracle<H> for RandomWordsOracle<O>
where
    O: MembershipOracle,
    H: Hypothesis<Output = O::Output>,
    H::Alphabet: Alphabet<Symbol = O::Symbol>,
{
    fn find_counterexample(&self, hypothesis: &H) -> Option<Counterexample<O::Symbol, O::Output>> {
        for _ in 0..self.num_words {
            let Some(word) = self.random_word(hypothesis.alphabet()) else {
                continue;
            };
            let Some(expected) = self.oracle.answer(&Word::empty(), &word) else {
                continue;
            };
            if hypothesis.output(&word).as_ref() != Some(&expected) {
                debug!("random testing found counterexample {}", word.show());
                return Some((word, expected));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use lstar_core::prelude::*;

    use super::{
        CountingOracle, EquivalenceOracle, FnOracle, MealyOracle, MembershipOracle, MooreOracle,
        Query, RandomWordsOracle,
    };

    fn even_bs() -> DFA {
        TSBuilder::without_edge_colors()
            .with_state_colors([true, false])
            .with_transitions([
                (0, 'a', Void, 0),
                (0, 'b', Void, 1),
                (1, 'a', Void, 1),
                (1, 'b', Void, 0),
            ])
            .into_dfa(0)
    }

    fn accept_all() -> DFA {
        TSBuilder::without_edge_colors()
            .with_state_colors([true])
            .with_transitions([(0, 'a', Void, 0), (0, 'b', Void, 0)])
            .into_dfa(0)
    }

    #[test]
    fn queries_record_answers() {
        let mut query: Query<char, bool> = Query::new(Word::from("ab"), Word::from("b"));
        assert_eq!(query.input(), Word::from("abb"));
        assert!(format!("{query:?}").contains("prefix: ['a', 'b']"));
        assert!(!query.is_answered_once());
        query.answer(true);
        assert!(query.is_answered_once());
        query.answer(false);
        assert_eq!(query.output(), Some(&false));
        assert_eq!(query.into_output(), None);
    }

    #[test]
    fn counting_oracle() {
        let oracle = CountingOracle::new(FnOracle::new(|w: &[char]| Some(w.len() % 2 == 0)));
        let mut queries = vec![
            Query::new(Word::empty(), Word::from("a")),
            Query::new(Word::from("a"), Word::from("b")),
        ];
        oracle.process_queries(&mut queries);
        assert_eq!(queries[0].output(), Some(&false));
        assert_eq!(queries[1].output(), Some(&true));
        assert_eq!(oracle.answer(&Word::from("ab"), &Word::empty()), Some(true));
        assert_eq!(oracle.num_batches(), 2);
        assert_eq!(
            oracle.inputs(),
            vec![Word::from("a"), Word::from("ab"), Word::from("ab")]
        );
        oracle.reset();
        assert_eq!(oracle.num_queries(), 0);
    }

    #[test_log::test]
    fn moore_product_search() {
        let oracle = MooreOracle::new(even_bs());
        assert_eq!(oracle.answer(&Word::from("bab"), &Word::empty()), Some(true));
        assert_eq!(
            oracle.find_counterexample(&accept_all()),
            Some((Word::from("b"), false))
        );
        assert_eq!(oracle.find_counterexample(&even_bs()), None);
    }

    #[test]
    fn mealy_default_output() {
        let target = TSBuilder::without_state_colors()
            .with_transitions([(0, 'a', 1u8, 0), (0, 'b', 0, 0)])
            .into_mealy(0);
        let strict = MealyOracle::new(target.clone(), None);
        assert_eq!(strict.answer(&Word::empty(), &Word::empty()), None);
        assert_eq!(strict.answer(&Word::from("b"), &Word::from("a")), Some(1));

        let lenient = MealyOracle::new(target.clone(), Some(7));
        assert_eq!(lenient.answer(&Word::empty(), &Word::empty()), Some(7));

        let swapped = TSBuilder::without_state_colors()
            .with_transitions([(0, 'a', 0u8, 0), (0, 'b', 0, 0)])
            .into_mealy(0);
        assert_eq!(
            strict.find_counterexample(&swapped),
            Some((Word::from("a"), 1))
        );
    }

    #[test]
    fn random_words() {
        let random = RandomWordsOracle::new(MooreOracle::new(even_bs()), 200, 0, 6, 42);
        let counterexample = random.find_counterexample(&accept_all());
        assert!(matches!(counterexample, Some((_, false))));
        assert_eq!(random.find_counterexample(&even_bs()), None);
    }
}
