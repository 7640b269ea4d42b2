use std::cmp::Ordering;

use lstar_core::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{ObservationTable, RowId, Unclosed};

/// Decides which rows are promoted to close an observation table. For every group of unclosed
/// rows (all rows in a group share the same content) one row should be picked, promoting more
/// than one row of a group only creates redundant states.
pub trait ClosingStrategy<A: Alphabet, D: Color> {
    fn select_rows(&mut self, unclosed: &Unclosed, table: &ObservationTable<A, D>) -> Vec<RowId>;
}

impl<A: Alphabet, D: Color, C: ClosingStrategy<A, D> + ?Sized> ClosingStrategy<A, D> for Box<C> {
    fn select_rows(&mut self, unclosed: &Unclosed, table: &ObservationTable<A, D>) -> Vec<RowId> {
        C::select_rows(self, unclosed, table)
    }
}

/// Picks the first row of every group.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseFirst;

impl<A: Alphabet, D: Color> ClosingStrategy<A, D> for CloseFirst {
    fn select_rows(&mut self, unclosed: &Unclosed, _table: &ObservationTable<A, D>) -> Vec<RowId> {
        unclosed
            .iter()
            .filter_map(|group| group.first().copied())
            .collect()
    }
}

/// Picks a row with the shortest prefix of every group, ties are broken by position in the
/// group.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseShortest;

impl<A: Alphabet, D: Color> ClosingStrategy<A, D> for CloseShortest {
    fn select_rows(&mut self, unclosed: &Unclosed, table: &ObservationTable<A, D>) -> Vec<RowId> {
        unclosed
            .iter()
            .filter_map(|group| {
                group
                    .iter()
                    .copied()
                    .min_by_key(|&id| table.row(id).map_or(usize::MAX, |row| row.prefix().len()))
            })
            .collect()
    }
}

/// Picks the row whose prefix is lexicographically minimal with respect to the order of the
/// symbols in the alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseLexMin;

fn compare_lexicographically<A: Alphabet>(
    alphabet: &A,
    left: &[A::Symbol],
    right: &[A::Symbol],
) -> Ordering {
    let indices = |word: &[A::Symbol]| {
        word.iter()
            .map(|&a| alphabet.index_of(a).unwrap_or(usize::MAX))
            .collect::<Vec<_>>()
    };
    indices(left).cmp(&indices(right))
}

impl<A: Alphabet, D: Color> ClosingStrategy<A, D> for CloseLexMin {
    fn select_rows(&mut self, unclosed: &Unclosed, table: &ObservationTable<A, D>) -> Vec<RowId> {
        unclosed
            .iter()
            .filter_map(|group| {
                group
                    .iter()
                    .copied()
                    .min_by(|&l, &r| match (table.row(l), table.row(r)) {
                        (Some(l), Some(r)) => {
                            compare_lexicographically(table.alphabet(), l.prefix(), r.prefix())
                        }
                        _ => l.cmp(&r),
                    })
            })
            .collect()
    }
}

/// Picks a random row of every group. The generator is seeded, so learning runs can be
/// reproduced.
#[derive(Debug, Clone)]
pub struct CloseRandom {
    rng: StdRng,
}

impl CloseRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<A: Alphabet, D: Color> ClosingStrategy<A, D> for CloseRandom {
    fn select_rows(&mut self, unclosed: &Unclosed, _table: &ObservationTable<A, D>) -> Vec<RowId> {
        unclosed
            .iter()
            .filter(|group| !group.is_empty())
            .map(|group| group[self.rng.gen_range(0..group.len())])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use lstar_core::prelude::*;

    use super::{CloseFirst, CloseLexMin, CloseRandom, CloseShortest, ClosingStrategy};
    use crate::active::{FnOracle, ObservationTable};

    #[test]
    fn strategies_pick_one_row_per_group() {
        // the output only depends on whether the word contains a `c`
        let oracle = FnOracle::new(|w: &[char]| Some(w.contains(&'c')));
        let mut table = ObservationTable::new(alphabet!(simple 'b', 'a', 'c'));
        let unclosed = table
            .initialize(
                vec![Word::empty(), Word::from("a"), Word::from("b")],
                vec![Word::empty()],
                &oracle,
            )
            .unwrap();
        assert_eq!(unclosed.len(), 1);
        let prefixes = |rows: Vec<_>| {
            rows.into_iter()
                .map(|id| table.row(id).unwrap().prefix().show())
                .collect::<Vec<_>>()
        };

        let group = prefixes(unclosed[0].clone());
        assert_eq!(group, vec!["c", "ac", "bc"]);

        assert_eq!(prefixes(CloseFirst.select_rows(&unclosed, &table)), vec!["c"]);
        assert_eq!(prefixes(CloseShortest.select_rows(&unclosed, &table)), vec!["c"]);
        // `b` is the smallest symbol
        assert_eq!(prefixes(CloseLexMin.select_rows(&unclosed, &table)), vec!["bc"]);

        let mut random = CloseRandom::new(7);
        let picked = random.select_rows(&unclosed, &table);
        assert_eq!(picked.len(), 1);
        assert!(unclosed[0].contains(&picked[0]));
        assert_eq!(CloseRandom::new(7).select_rows(&unclosed, &table), picked);
    }

    #[test]
    fn lexicographic_order_follows_alphabet() {
        let oracle = FnOracle::new(|w: &[char]| Some(w.len() >= 2));
        let mut table = ObservationTable::new(alphabet!(simple 'b', 'a'));
        let unclosed = table
            .initialize(
                vec![Word::empty(), Word::from("b"), Word::from("a")],
                vec![Word::empty()],
                &oracle,
            )
            .unwrap();
        let picked = CloseLexMin.select_rows(&unclosed, &table);
        // `b` comes before `a` in this alphabet
        assert_eq!(table.row(picked[0]).unwrap().prefix(), &Word::from("bb"));
    }
}
