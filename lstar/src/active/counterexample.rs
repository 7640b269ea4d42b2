use lstar_core::prelude::*;
use tracing::trace;

use crate::error::TableError;

use super::{Hypothesis, MembershipOracle, ObservationTable, Unclosed};

/// Incorporates a counterexample into an observation table, either by adding short prefixes
/// or by adding suffixes. The returned groups of unclosed rows are handed to the closing
/// strategy afterwards.
///
/// Handlers that may introduce inconsistencies report so through
/// [`CounterexampleHandler::needs_consistency_check`], the learner then resolves them before it
/// builds the next hypothesis.
pub trait CounterexampleHandler<A: Alphabet, D: Color> {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        output: &D,
        hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError>;

    fn needs_consistency_check(&self) -> bool {
        false
    }
}

impl<A, D, H> CounterexampleHandler<A, D> for Box<H>
where
    A: Alphabet,
    D: Color,
    H: CounterexampleHandler<A, D> + ?Sized,
{
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        output: &D,
        hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        H::handle(self, table, counterexample, output, hypothesis, oracle)
    }

    fn needs_consistency_check(&self) -> bool {
        H::needs_consistency_check(self)
    }
}

/// The handler of Angluin's original algorithm: every prefix of the counterexample becomes a
/// short prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicLStar;

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for ClassicLStar {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        _hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        table.add_short_prefixes(counterexample.prefixes(), oracle)
    }

    fn needs_consistency_check(&self) -> bool {
        true
    }
}

/// Adds all non-empty suffixes of the counterexample as suffixes, as proposed by Maler and
/// Pnueli.
#[derive(Debug, Clone, Copy, Default)]
pub struct MalerPnueli;

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for MalerPnueli {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        _hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        table.add_suffixes(counterexample.suffixes(), oracle)
    }
}

/// Adds the non-empty suffixes of the counterexample one at a time, shortest first, and stops
/// as soon as one of them makes the table unclosed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Suffix1By1;

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for Suffix1By1 {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        _hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        for suffix in counterexample.suffixes() {
            if table.suffix_index(&suffix).is_some() {
                continue;
            }
            trace!("trying suffix {}", suffix.show());
            let unclosed = table.add_suffixes([suffix], oracle)?;
            if !unclosed.is_empty() {
                return Ok(unclosed);
            }
        }
        Ok(vec![])
    }
}

/// Skips the longest prefix of the counterexample that runs through canonical short rows only
/// and adds all suffixes of the remainder, following Shahbaz.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shahbaz;

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for Shahbaz {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        _hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        let length = counterexample.len();
        let mut i = 0;
        while i <= length && table.is_access_sequence(&counterexample[..i])? {
            i += 1;
        }
        let remainder = counterexample.suffix(i.min(length));
        table.add_suffixes(remainder.suffixes(), oracle)
    }
}

/// Returns true if the hypothesis and the system under learning disagree on the word that is
/// obtained by replacing the first `index` symbols of `counterexample` with their access
/// sequence.
fn disagrees_at<A: Alphabet, D: Color>(
    table: &ObservationTable<A, D>,
    counterexample: &Word<A::Symbol>,
    index: usize,
    hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
    oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
) -> Result<bool, TableError> {
    let access = table.transform_access_sequence(&counterexample[..index])?;
    let suffix = counterexample.suffix(index);
    let expected = oracle
        .answer(&access, &suffix)
        .ok_or(TableError::OracleContractViolation {
            expected: 1,
            answered: 0,
        })?;
    Ok(hypothesis.output(&access.concat(&suffix)).as_ref() != Some(&expected))
}

/// Adds the suffix of the counterexample that starts at `index`, and all of its suffixes if
/// `all_suffixes` is set.
fn add_found_suffix<A: Alphabet, D: Color>(
    table: &mut ObservationTable<A, D>,
    counterexample: &Word<A::Symbol>,
    index: usize,
    all_suffixes: bool,
    oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
) -> Result<Unclosed, TableError> {
    let suffix = counterexample.suffix(index);
    trace!(
        "counterexample {} yields suffix {}",
        counterexample.show(),
        suffix.show()
    );
    if all_suffixes {
        table.add_suffixes(suffix.suffixes(), oracle)
    } else if suffix.is_empty() {
        table.add_suffixes(std::iter::empty(), oracle)
    } else {
        table.add_suffixes([suffix], oracle)
    }
}

/// Scans the counterexample from the front for the first position at which the access
/// sequence transformation stops exposing the disagreement.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindLinear {
    pub all_suffixes: bool,
}

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for FindLinear {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        let length = counterexample.len();
        let mut index = length;
        for i in 1..length {
            if !disagrees_at(table, counterexample, i, hypothesis, oracle)? {
                index = i;
                break;
            }
        }
        add_found_suffix(table, counterexample, index, self.all_suffixes, oracle)
    }
}

/// Like [`FindLinear`], but scans the counterexample from the back.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindLinearReverse {
    pub all_suffixes: bool,
}

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for FindLinearReverse {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        let length = counterexample.len();
        let mut index = length;
        for i in (0..length).rev() {
            if disagrees_at(table, counterexample, i, hypothesis, oracle)? {
                index = i + 1;
                break;
            }
        }
        add_found_suffix(table, counterexample, index, self.all_suffixes, oracle)
    }
}

/// Finds the position at which the access sequence transformation stops exposing the
/// disagreement with a binary search, as proposed by Rivest and Schapire. This needs a
/// logarithmic number of membership queries in the length of the counterexample.
#[derive(Debug, Clone, Copy, Default)]
pub struct RivestSchapire {
    pub all_suffixes: bool,
}

impl<A: Alphabet, D: Color> CounterexampleHandler<A, D> for RivestSchapire {
    fn handle(
        &mut self,
        table: &mut ObservationTable<A, D>,
        counterexample: &Word<A::Symbol>,
        _output: &D,
        hypothesis: &dyn Hypothesis<Alphabet = A, Output = D>,
        oracle: &dyn MembershipOracle<Symbol = A::Symbol, Output = D>,
    ) -> Result<Unclosed, TableError> {
        // the hypothesis disagrees at `low` and agrees at `high`
        let mut low = 0;
        let mut high = counterexample.len();
        while high - low > 1 {
            let mid = low + (high - low + 1) / 2;
            if disagrees_at(table, counterexample, mid, hypothesis, oracle)? {
                low = mid;
            } else {
                high = mid;
            }
        }
        add_found_suffix(table, counterexample, low + 1, self.all_suffixes, oracle)
    }
}
