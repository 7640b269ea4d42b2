use fixedbitset::FixedBitSet;
use itertools::Itertools;
use lstar_core::prelude::*;
use tracing::{debug, trace};

use crate::error::TableError;

use super::{MembershipOracle, Query};

mod row;
pub use row::{ContentId, Row, RowId, RowKind};

mod registry;
use registry::Registry;

mod inconsistency;
pub use inconsistency::Inconsistency;

mod writer;

/// Long rows whose content is not held by any short row, grouped by their content. Groups are
/// ordered by the first appearance of their content, rows within a group follow the order of
/// the long rows in the table.
pub type Unclosed = Vec<Vec<RowId>>;

/// Rows that a growing operation promotes or creates. It is computed without touching the
/// table, so an operation can be abandoned if the oracle misbehaves.
struct Growth<S> {
    promote: Vec<RowId>,
    fresh_short: Vec<Word<S>>,
    fresh_long: Vec<Word<S>>,
    successors: Vec<(RowId, Vec<RowId>)>,
    // rows without content, in the order in which they are folded
    fold: Vec<(RowId, Word<S>, bool)>,
}

/// The observation table of the L* family of learning algorithms.
///
/// Rows are labelled by prefixes and split into short rows (state candidates, each owning one
/// successor per alphabet symbol) and long rows (one-symbol extensions of short rows that are
/// not short themselves). Columns are labelled by suffixes. The cell for prefix `u` and suffix
/// `v` holds the output of the system under learning on `uv`. Rows with equal contents share a
/// single [`ContentId`], the first short row that exhibits a content is its canonical row.
///
/// Every mutating operation asks all of its membership queries in one batch and only changes
/// the table once every query has been answered exactly once. Operations that add rows report
/// the long rows that are not closed, grouped by content, so that a closing strategy can pick
/// one row of each group to promote.
#[derive(Clone)]
pub struct ObservationTable<A: Alphabet, D> {
    alphabet: A,
    suffixes: math::Set<Word<A::Symbol>>,
    registry: Registry<A::Symbol, D>,
    initialized: bool,
    initial_consistency_check_required: bool,
}

impl<A: Alphabet, D: Color> ObservationTable<A, D> {
    /// Creates an empty, uninitialized table over the given alphabet.
    pub fn new(alphabet: A) -> Self {
        Self {
            alphabet,
            suffixes: math::Set::default(),
            registry: Registry::default(),
            initialized: false,
            initial_consistency_check_required: false,
        }
    }

    /// Fills the table with the given short prefixes and suffixes. Every one-symbol extension
    /// of a short prefix that is not short itself becomes a long row, and all rows are queried
    /// for all suffixes in a single batch.
    ///
    /// The short prefixes must be prefix-closed, free of duplicates and start with the empty
    /// word. Duplicate suffixes are dropped.
    pub fn initialize<O, I, J>(
        &mut self,
        short_prefixes: I,
        suffixes: J,
        oracle: &O,
    ) -> Result<Unclosed, TableError>
    where
        O: MembershipOracle<Symbol = A::Symbol, Output = D> + ?Sized,
        I: IntoIterator<Item = Word<A::Symbol>>,
        J: IntoIterator<Item = Word<A::Symbol>>,
    {
        if self.initialized {
            return Err(TableError::InvalidState(
                "table is already initialized".to_string(),
            ));
        }

        let prefixes: math::Set<Word<A::Symbol>> = {
            let listed = short_prefixes.into_iter().collect_vec();
            match listed.first() {
                None => {
                    return Err(TableError::InvalidArgument(
                        "at least one short prefix is required".to_string(),
                    ))
                }
                Some(first) if !first.is_empty() => {
                    return Err(TableError::InvalidArgument(format!(
                        "first short prefix must be ε, got {}",
                        first.show()
                    )))
                }
                _ => {}
            }
            let mut set = math::Set::default();
            for prefix in listed {
                self.check_symbols(&prefix)?;
                if let Some(duplicate) = set.replace(prefix) {
                    return Err(TableError::InvalidArgument(format!(
                        "duplicate short prefix {}",
                        duplicate.show()
                    )));
                }
            }
            set
        };
        for prefix in &prefixes {
            if let Some((parent, _)) = prefix.split_last() {
                if !prefixes.contains(&parent) {
                    return Err(TableError::InvalidArgument(format!(
                        "short prefixes are not prefix-closed, {} is missing its parent {}",
                        prefix.show(),
                        parent.show()
                    )));
                }
            }
        }

        let suffixes: math::Set<Word<A::Symbol>> = suffixes.into_iter().collect();
        for suffix in &suffixes {
            self.check_symbols(suffix)?;
        }
        let columns = suffixes.iter().cloned().collect_vec();

        let growth = self.plan_growth(vec![], prefixes.into_iter().collect());
        let answers = self.fetch(&growth, &columns, oracle)?;

        self.suffixes = suffixes;
        let (touched, shared_short_content) = self.commit_growth(growth, answers);
        self.initialized = true;
        self.initial_consistency_check_required = shared_short_content;

        let unclosed = self.group_unclosed(touched);
        debug!(
            "initialized table with {} short rows, {} long rows and {} suffixes, {} unclosed classes",
            self.registry.short().len(),
            self.registry.long().len(),
            self.suffixes.len(),
            unclosed.len()
        );
        Ok(unclosed)
    }

    /// Adds the given suffixes as new columns. Suffixes that are already present are ignored.
    /// Rows that already have content are only queried for the new suffixes, rows that were
    /// created by growing the alphabet are queried for all of them. Returns the unclosed long
    /// rows of the whole table.
    pub fn add_suffixes<O, I>(
        &mut self,
        new_suffixes: I,
        oracle: &O,
    ) -> Result<Unclosed, TableError>
    where
        O: MembershipOracle<Symbol = A::Symbol, Output = D> + ?Sized,
        I: IntoIterator<Item = Word<A::Symbol>>,
    {
        self.ensure_initialized()?;

        let mut fresh = math::Set::default();
        for suffix in new_suffixes {
            self.check_symbols(&suffix)?;
            if !self.suffixes.contains(&suffix) {
                fresh.insert(suffix);
            }
        }
        let fresh = fresh.into_iter().collect_vec();

        let (filled, pending): (Vec<RowId>, Vec<RowId>) = self
            .registry
            .short()
            .iter()
            .chain(self.registry.long())
            .copied()
            .partition(|&id| self.registry.row(id).content.is_some());

        if fresh.is_empty() && pending.is_empty() {
            return Ok(self.group_unclosed(self.registry.long().to_vec()));
        }

        let columns = self
            .suffixes
            .iter()
            .cloned()
            .chain(fresh.iter().cloned())
            .collect_vec();
        let requests = filled
            .iter()
            .map(|&id| (self.registry.row(id).prefix.clone(), fresh.as_slice()))
            .chain(
                pending
                    .iter()
                    .map(|&id| (self.registry.row(id).prefix.clone(), columns.as_slice())),
            )
            .collect_vec();
        let mut answers = query_batch(oracle, &requests)?.into_iter();

        let old_len = self.suffixes.len();
        self.suffixes.extend(fresh);
        for (id, tail) in filled.iter().copied().zip(answers.by_ref()) {
            let row = self.registry.row(id);
            let short = row.is_short();
            let Some(old) = row.content else {
                continue;
            };
            if self.registry.content(old).len() == old_len {
                // first row with this content, the id is kept
                self.registry.extend_in_place(old, &tail);
            } else {
                let mut content = self.registry.content(old)[..old_len].to_vec();
                content.extend(tail);
                let (id_now, _) = self.registry.intern(content, id, short);
                self.registry.set_content(id, id_now);
            }
        }
        for (id, content) in pending.iter().copied().zip(answers) {
            let short = self.registry.row(id).is_short();
            let (content_id, _) = self.registry.intern(content, id, short);
            trace!("folded pending row {}", self.registry.row(id).prefix.show());
            self.registry.set_content(id, content_id);
        }

        let unclosed = self.group_unclosed(self.registry.long().to_vec());
        debug!(
            "table has {} suffixes and {} distinct rows after adding suffixes, {} unclosed classes",
            self.suffixes.len(),
            self.registry.num_contents(),
            unclosed.len()
        );
        Ok(unclosed)
    }

    /// Promotes the given rows to short rows and creates their missing one-symbol extensions.
    /// Rows without content are queried for all suffixes in one batch. Returns the unclosed
    /// rows among the long rows that received content during this call.
    pub fn promote_to_short<O>(
        &mut self,
        rows: &[RowId],
        oracle: &O,
    ) -> Result<Unclosed, TableError>
    where
        O: MembershipOracle<Symbol = A::Symbol, Output = D> + ?Sized,
    {
        self.ensure_initialized()?;
        let mut promote = math::Set::default();
        for &id in rows {
            let Some(row) = self.registry.get(id) else {
                return Err(TableError::InvalidArgument(format!(
                    "unknown row {}",
                    id.show()
                )));
            };
            if row.is_long() {
                promote.insert(id);
            }
        }
        trace!(
            "promoting {}",
            promote
                .iter()
                .map(|&id| self.registry.row(id).prefix.show())
                .join(", ")
        );
        self.grow(promote.into_iter().collect(), vec![], oracle)
    }

    /// Makes all of the given words short prefixes. Words that are long rows are promoted,
    /// words that are already short are skipped. Words without a row are created as new short
    /// rows, which requires their parent to be short or to become short in the same call.
    /// Returns the unclosed rows among the long rows that received content during this call.
    pub fn add_short_prefixes<O, I>(&mut self, words: I, oracle: &O) -> Result<Unclosed, TableError>
    where
        O: MembershipOracle<Symbol = A::Symbol, Output = D> + ?Sized,
        I: IntoIterator<Item = Word<A::Symbol>>,
    {
        self.ensure_initialized()?;
        let words: math::Set<Word<A::Symbol>> = words.into_iter().collect();

        let mut promote = vec![];
        let mut fresh = vec![];
        for word in &words {
            self.check_symbols(word)?;
            match self.registry.by_prefix(word) {
                Some(id) if self.registry.row(id).is_short() => {}
                Some(id) => promote.push(id),
                None => {
                    let Some((parent, _)) = word.split_last() else {
                        continue;
                    };
                    let parent_short = words.contains(&parent)
                        || self
                            .registry
                            .by_prefix(&parent)
                            .is_some_and(|p| self.registry.row(p).is_short());
                    if !parent_short {
                        return Err(TableError::InvalidArgument(format!(
                            "cannot add {} as short prefix, its parent is not short",
                            word.show()
                        )));
                    }
                    fresh.push(word.clone());
                }
            }
        }
        self.grow(promote, fresh, oracle)
    }

    /// Looks for two short rows with equal content whose successors on some symbol differ.
    /// Rows are scanned in order and symbols by index, the first mismatch is returned.
    /// Successors that have not been queried yet are ignored.
    pub fn find_inconsistency(&self) -> Option<Inconsistency> {
        let mut first_with: Vec<Option<RowId>> = vec![None; self.registry.num_contents()];
        for &id in self.registry.short() {
            let row = self.registry.row(id);
            let Some(content) = row.content else {
                continue;
            };
            let Some(first) = first_with[content.index()] else {
                first_with[content.index()] = Some(id);
                continue;
            };
            let left = self.registry.row(first).successors().unwrap_or_default();
            let right = row.successors().unwrap_or_default();
            for (symbol_index, (&l, &r)) in left.iter().zip(right).enumerate() {
                match (
                    self.registry.row(l).content,
                    self.registry.row(r).content,
                ) {
                    (Some(lc), Some(rc)) if lc != rc => {
                        let inconsistency = Inconsistency::new(first, id, symbol_index);
                        trace!("found inconsistency {}", inconsistency.show());
                        return Some(inconsistency);
                    }
                    _ => {}
                }
            }
        }
        None
    }

    pub fn is_consistent(&self) -> bool {
        self.find_inconsistency().is_none()
    }

    /// Returns the index of the first suffix on which the two rows differ.
    pub fn find_distinguishing_suffix_index(&self, first: RowId, second: RowId) -> Option<usize> {
        let left = self.row_contents(first)?;
        let right = self.row_contents(second)?;
        left.iter().zip(right).position(|(l, r)| l != r)
    }

    /// Returns a suffix that separates the successors of the two rows of `inconsistency`.
    /// Prepending the symbol of the inconsistency gives a suffix that separates the rows
    /// themselves.
    pub fn find_distinguishing_suffix(
        &self,
        inconsistency: &Inconsistency,
    ) -> Option<&Word<A::Symbol>> {
        let first = self
            .registry
            .get(inconsistency.first)?
            .successor(inconsistency.symbol_index)?;
        let second = self
            .registry
            .get(inconsistency.second)?
            .successor(inconsistency.symbol_index)?;
        let index = self.find_distinguishing_suffix_index(first, second)?;
        self.suffixes.get_index(index)
    }

    /// Returns the first long row that is not closed, either because no short row shares its
    /// content or because it has not been queried yet.
    pub fn find_unclosed_row(&self) -> Option<RowId> {
        let short_contents = self.short_contents();
        self.registry.long().iter().copied().find(|&id| {
            self.registry
                .row(id)
                .content
                .map_or(true, |c| !short_contents.contains(c.index()))
        })
    }

    pub fn is_closed(&self) -> bool {
        self.find_unclosed_row().is_none()
    }

    /// Runs `word` through the short rows starting at the empty word. After each step the
    /// reached row is replaced by the canonical row of its content. Returns the prefix of the
    /// canonical row that is reached in the end.
    ///
    /// Fails if a symbol is not part of the alphabet or if the run reaches a row that is not
    /// closed.
    pub fn transform_access_sequence(
        &self,
        word: &[A::Symbol],
    ) -> Result<Word<A::Symbol>, TableError> {
        let mut current = self.canonical_of(self.root()?)?;
        for &symbol in word {
            let index = self.symbol_index(symbol)?;
            let next = self.short_successor(current, index)?;
            current = self.canonical_of(next)?;
        }
        Ok(self.registry.row(current).prefix.clone())
    }

    /// Returns true if every row visited by `word`, starting at the empty word, is its own
    /// canonical row.
    pub fn is_access_sequence(&self, word: &[A::Symbol]) -> Result<bool, TableError> {
        let mut current = self.root()?;
        if !self.is_canonical(current) {
            return Ok(false);
        }
        for &symbol in word {
            let index = self.symbol_index(symbol)?;
            let next = self.short_successor(current, index)?;
            if !self.is_canonical(next) {
                return Ok(false);
            }
            current = next;
        }
        Ok(true)
    }

    pub fn alphabet(&self) -> &A {
        &self.alphabet
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether two of the initial short prefixes already had the same content, in which case
    /// the table may be inconsistent right after initialization.
    pub fn is_initial_consistency_check_required(&self) -> bool {
        self.initial_consistency_check_required
    }

    pub fn row(&self, id: RowId) -> Option<&Row<A::Symbol>> {
        self.registry.get(id)
    }

    pub fn row_by_prefix(&self, prefix: &[A::Symbol]) -> Option<&Row<A::Symbol>> {
        self.registry.by_prefix(prefix).map(|id| self.registry.row(id))
    }

    /// The short rows in the order in which they became short.
    pub fn short_prefix_rows(&self) -> impl Iterator<Item = &Row<A::Symbol>> + '_ {
        self.registry.short().iter().map(|&id| self.registry.row(id))
    }

    pub fn long_prefix_rows(&self) -> impl Iterator<Item = &Row<A::Symbol>> + '_ {
        self.registry.long().iter().map(|&id| self.registry.row(id))
    }

    /// Long rows that have not been queried yet.
    pub fn pending_rows(&self) -> Vec<RowId> {
        self.long_prefix_rows()
            .filter(|row| row.content.is_none())
            .map(|row| row.id)
            .collect()
    }

    pub fn suffixes(&self) -> &math::Set<Word<A::Symbol>> {
        &self.suffixes
    }

    pub fn suffix(&self, index: usize) -> Option<&Word<A::Symbol>> {
        self.suffixes.get_index(index)
    }

    pub fn suffix_index(&self, suffix: &[A::Symbol]) -> Option<usize> {
        self.suffixes.get_index_of(suffix)
    }

    /// The outputs of a row, aligned with the suffixes.
    pub fn row_contents(&self, id: RowId) -> Option<&[D]> {
        let content = self.registry.get(id)?.content?;
        Some(self.registry.content(content))
    }

    pub fn cell(&self, id: RowId, suffix_index: usize) -> Option<&D> {
        self.row_contents(id)?.get(suffix_index)
    }

    /// The number of distinct row contents.
    pub fn num_distinct_rows(&self) -> usize {
        self.registry.num_contents()
    }

    pub fn num_rows(&self) -> usize {
        self.registry.rows().len()
    }

    /// Returns the first short row that exhibited the given content.
    pub fn canonical_row(&self, content: ContentId) -> Option<RowId> {
        if content.index() < self.registry.num_contents() {
            self.registry.canonical(content)
        } else {
            None
        }
    }

    fn ensure_initialized(&self) -> Result<(), TableError> {
        if self.initialized {
            Ok(())
        } else {
            Err(TableError::InvalidState(
                "table is not initialized".to_string(),
            ))
        }
    }

    fn check_symbols(&self, word: &[A::Symbol]) -> Result<(), TableError> {
        match word.iter().find(|&&a| !self.alphabet.contains(a)) {
            Some(a) => Err(TableError::InvalidArgument(format!(
                "symbol {} is not part of the alphabet",
                a.show()
            ))),
            None => Ok(()),
        }
    }

    fn symbol_index(&self, symbol: A::Symbol) -> Result<usize, TableError> {
        self.alphabet.index_of(symbol).ok_or_else(|| {
            TableError::InvalidArgument(format!(
                "symbol {} is not part of the alphabet",
                symbol.show()
            ))
        })
    }

    fn root(&self) -> Result<RowId, TableError> {
        self.ensure_initialized()?;
        self.registry
            .by_prefix(&[])
            .ok_or_else(|| TableError::InvalidState("table has no root row".to_string()))
    }

    fn short_successor(&self, id: RowId, symbol_index: usize) -> Result<RowId, TableError> {
        self.registry.row(id).successor(symbol_index).ok_or_else(|| {
            TableError::InvalidState(format!(
                "row {} has no successor on symbol #{symbol_index}",
                self.registry.row(id).prefix.show()
            ))
        })
    }

    fn canonical_of(&self, id: RowId) -> Result<RowId, TableError> {
        self.registry
            .row(id)
            .content
            .and_then(|c| self.registry.canonical(c))
            .ok_or_else(|| {
                TableError::InvalidState(format!(
                    "row {} is not closed",
                    self.registry.row(id).prefix.show()
                ))
            })
    }

    fn is_canonical(&self, id: RowId) -> bool {
        let row = self.registry.row(id);
        row.is_short() && row.content.and_then(|c| self.registry.canonical(c)) == Some(id)
    }

    fn short_contents(&self) -> FixedBitSet {
        let mut contents = FixedBitSet::with_capacity(self.registry.num_contents());
        for &id in self.registry.short() {
            if let Some(c) = self.registry.row(id).content {
                contents.insert(c.index());
            }
        }
        contents
    }

    fn group_unclosed(&self, candidates: Vec<RowId>) -> Unclosed {
        let short_contents = self.short_contents();
        let mut groups: math::Map<ContentId, Vec<RowId>> = math::Map::default();
        for id in candidates {
            let row = self.registry.row(id);
            if row.is_short() {
                continue;
            }
            if let Some(c) = row.content {
                if !short_contents.contains(c.index()) {
                    groups.entry(c).or_default().push(id);
                }
            }
        }
        groups.into_values().collect()
    }

    /// Determines which rows have to be created and how successors are wired when the rows
    /// in `promote` and the words in `fresh_short` become short. Ids of new rows are assigned
    /// in creation order: fresh short rows first, then fresh long rows.
    fn plan_growth(
        &self,
        promote: Vec<RowId>,
        fresh_short: Vec<Word<A::Symbol>>,
    ) -> Growth<A::Symbol> {
        let mut next = self.registry.next_row_id().index();
        let mut planned: math::Map<Word<A::Symbol>, RowId> = math::Map::default();
        for word in &fresh_short {
            planned.insert(word.clone(), RowId::new(next));
            next += 1;
        }

        let becoming_short = promote
            .iter()
            .map(|&id| (id, self.registry.row(id).prefix.clone()))
            .chain(fresh_short.iter().map(|w| (planned[w], w.clone())))
            .collect_vec();

        let mut fresh_long = vec![];
        let mut successors = Vec::with_capacity(becoming_short.len());
        for (id, prefix) in &becoming_short {
            let mut row_successors = Vec::with_capacity(self.alphabet.size());
            for symbol in self.alphabet.universe() {
                let extension = prefix.append(symbol);
                let successor = match self.registry.by_prefix(&extension) {
                    Some(existing) => existing,
                    None => *planned.entry(extension.clone()).or_insert_with(|| {
                        fresh_long.push(extension);
                        let id = RowId::new(next);
                        next += 1;
                        id
                    }),
                };
                row_successors.push(successor);
            }
            successors.push((*id, row_successors));
        }

        let promoted: math::Set<RowId> = promote.iter().copied().collect();
        let mut fold = vec![];
        for (id, prefix) in &becoming_short {
            if self.registry.get(*id).map_or(true, |row| row.content.is_none()) {
                fold.push((*id, prefix.clone(), true));
            }
        }
        for &id in self.registry.long() {
            let row = self.registry.row(id);
            if row.content.is_none() && !promoted.contains(&id) {
                fold.push((id, row.prefix.clone(), false));
            }
        }
        for word in &fresh_long {
            fold.push((planned[word], word.clone(), false));
        }

        Growth {
            promote,
            fresh_short,
            fresh_long,
            successors,
            fold,
        }
    }

    /// Queries every row of `growth` that lacks content for all of `columns`.
    fn fetch<O>(
        &self,
        growth: &Growth<A::Symbol>,
        columns: &[Word<A::Symbol>],
        oracle: &O,
    ) -> Result<Vec<Vec<D>>, TableError>
    where
        O: MembershipOracle<Symbol = A::Symbol, Output = D> + ?Sized,
    {
        let requests = growth
            .fold
            .iter()
            .map(|(_, prefix, _)| (prefix.clone(), columns))
            .collect_vec();
        query_batch(oracle, &requests)
    }

    /// Applies a growth to the table. Returns the long rows that received content and whether
    /// a short row received a content that another short row already had.
    fn commit_growth(
        &mut self,
        growth: Growth<A::Symbol>,
        answers: Vec<Vec<D>>,
    ) -> (Vec<RowId>, bool) {
        for &id in &growth.promote {
            self.registry.promote(id);
        }
        for word in growth.fresh_short {
            self.registry.create_short(word);
        }
        for word in growth.fresh_long {
            self.registry.create_long(word);
        }
        for (id, successors) in growth.successors {
            self.registry.set_successors(id, successors);
        }

        let mut touched = vec![];
        let mut shared_short_content = false;
        for ((id, prefix, short), content) in growth.fold.into_iter().zip(answers) {
            debug_assert_eq!(self.registry.row(id).prefix, prefix);
            let (content_id, is_new) = self.registry.intern(content, id, short);
            trace!("row {} has content {}", prefix.show(), content_id.show());
            self.registry.set_content(id, content_id);
            if short {
                shared_short_content |= !is_new;
            } else {
                touched.push(id);
            }
        }
        (touched, shared_short_content)
    }

    fn grow<O>(
        &mut self,
        promote: Vec<RowId>,
        fresh_short: Vec<Word<A::Symbol>>,
        oracle: &O,
    ) -> Result<Unclosed, TableError>
    where
        O: MembershipOracle<Symbol = A::Symbol, Output = D> + ?Sized,
    {
        let growth = self.plan_growth(promote, fresh_short);
        let columns = self.suffixes.iter().cloned().collect_vec();
        let answers = self.fetch(&growth, &columns, oracle)?;
        let (touched, _) = self.commit_growth(growth, answers);
        let unclosed = self.group_unclosed(touched);
        debug!(
            "table has {} short and {} long rows, {} unclosed classes among new rows",
            self.registry.short().len(),
            self.registry.long().len(),
            unclosed.len()
        );
        Ok(unclosed)
    }
}

impl<A: GrowingAlphabet, D: Color> ObservationTable<A, D> {
    /// Adds `symbol` to the alphabet. Every short row receives a new long row as its
    /// successor on `symbol`. These rows are not queried here, they are filled in by the next
    /// call to [`Self::add_suffixes`], [`Self::promote_to_short`] or
    /// [`Self::add_short_prefixes`]. Returns the new rows, which is empty if the symbol was
    /// already known.
    pub fn add_alphabet_symbol(&mut self, symbol: A::Symbol) -> Result<Vec<RowId>, TableError> {
        self.ensure_initialized()?;
        if self.alphabet.contains(symbol) {
            return Ok(vec![]);
        }
        self.alphabet.add_symbol(symbol);

        let short = self.registry.short().to_vec();
        let mut created = Vec::with_capacity(short.len());
        for id in short {
            let extension = self.registry.row(id).prefix.append(symbol);
            let new = self.registry.create_long(extension);
            self.registry.push_successor(id, new);
            created.push(new);
        }
        debug!(
            "added symbol {} to the alphabet, {} rows are waiting for content",
            symbol.show(),
            created.len()
        );
        Ok(created)
    }
}

/// Builds one query per pair of prefix and suffix, hands all of them to `oracle` at once and
/// returns the outputs grouped by request. Fails if a query was not answered exactly once.
fn query_batch<S, D, O>(
    oracle: &O,
    requests: &[(Word<S>, &[Word<S>])],
) -> Result<Vec<Vec<D>>, TableError>
where
    S: Symbol,
    D: Color,
    O: MembershipOracle<Symbol = S, Output = D> + ?Sized,
{
    let mut queries = requests
        .iter()
        .flat_map(|(prefix, suffixes)| {
            suffixes
                .iter()
                .map(move |suffix| Query::new(prefix.clone(), suffix.clone()))
        })
        .collect_vec();
    let expected = queries.len();
    if expected > 0 {
        oracle.process_queries(&mut queries);
    }
    let answered = queries.iter().filter(|q| q.is_answered_once()).count();
    if answered != expected {
        return Err(TableError::OracleContractViolation { expected, answered });
    }
    trace!("oracle answered a batch of {expected} queries");

    let mut outputs = queries.into_iter().filter_map(Query::into_output);
    Ok(requests
        .iter()
        .map(|(_, suffixes)| outputs.by_ref().take(suffixes.len()).collect())
        .collect())
}

impl<A: Alphabet, D: Color> std::fmt::Debug for ObservationTable<A, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", writer::render(self))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use itertools::Itertools;
    use lstar_core::prelude::*;

    use super::{Inconsistency, ObservationTable};
    use crate::{
        active::{CountingOracle, FnOracle, MembershipOracle, Query},
        error::TableError,
    };

    fn words(list: &[&str]) -> Vec<Word<char>> {
        list.iter().map(|&w| Word::from(w)).collect()
    }

    fn ends_with_a() -> CountingOracle<impl MembershipOracle<Symbol = char, Output = bool>> {
        CountingOracle::new(FnOracle::new(|w: &[char]| Some(w.last() == Some(&'a'))))
    }

    // accepts words over {a} whose length is divisible by three
    fn mod_three() -> impl MembershipOracle<Symbol = char, Output = bool> {
        FnOracle::new(|w: &[char]| Some(w.len() % 3 == 0))
    }

    fn contents_by_prefix(
        table: &ObservationTable<CharAlphabet, bool>,
    ) -> HashMap<String, Vec<bool>> {
        table
            .short_prefix_rows()
            .chain(table.long_prefix_rows())
            .map(|row| {
                (
                    row.prefix().show(),
                    table.row_contents(row.id()).unwrap().to_vec(),
                )
            })
            .collect()
    }

    fn assert_dedup(table: &ObservationTable<CharAlphabet, bool>) {
        let rows = table
            .short_prefix_rows()
            .chain(table.long_prefix_rows())
            .collect_vec();
        for (l, r) in rows.iter().cartesian_product(rows.iter()) {
            assert_eq!(
                l.content_id() == r.content_id(),
                table.row_contents(l.id()) == table.row_contents(r.id()),
                "rows {} and {}",
                l.prefix().show(),
                r.prefix().show()
            );
        }
    }

    /// Answers every query twice.
    struct Stuttering;

    impl MembershipOracle for Stuttering {
        type Symbol = char;
        type Output = bool;

        fn process_queries(&self, queries: &mut [Query<char, bool>]) {
            for query in queries {
                query.answer(true);
                query.answer(true);
            }
        }
    }

    #[test_log::test]
    fn initialization_scenario() {
        let oracle = FnOracle::new(|w: &[char]| Some(w == ['a']));
        let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
        let unclosed = table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();

        let root = table.row_by_prefix(&[]).unwrap();
        let a = table.row_by_prefix(&['a']).unwrap();
        let b = table.row_by_prefix(&['b']).unwrap();
        assert_eq!(table.short_prefix_rows().count(), 1);
        assert_eq!(table.long_prefix_rows().count(), 2);
        assert_eq!(table.row_contents(root.id()), Some(&[false][..]));
        assert_eq!(table.row_contents(a.id()), Some(&[true][..]));
        assert_eq!(table.row_contents(b.id()), Some(&[false][..]));
        assert_eq!(root.content_id(), b.content_id());
        assert_eq!(unclosed, vec![vec![a.id()]]);
        assert_eq!(root.successors(), Some(&[a.id(), b.id()][..]));
        assert!(!table.is_initial_consistency_check_required());
        assert_eq!(table.find_unclosed_row(), Some(a.id()));
        assert_eq!(table.num_distinct_rows(), 2);
    }

    #[test_log::test]
    fn promotion_does_not_requery() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
        let unclosed = table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();
        assert_eq!(oracle.num_queries(), 3);
        oracle.reset();

        let unclosed = table.promote_to_short(&unclosed[0], &oracle).unwrap();
        assert_eq!(oracle.num_batches(), 1);
        assert_eq!(oracle.inputs(), words(&["aa", "ab"]));
        assert!(unclosed.is_empty());
        assert!(table.is_closed());
        assert!(table.is_consistent());

        let a = table.row_by_prefix(&['a']).unwrap();
        assert!(a.is_short());
        assert_eq!(table.canonical_row(a.content_id().unwrap()), Some(a.id()));
        let a = a.id();
        // b was moved into the slot of a
        assert_eq!(
            table.long_prefix_rows().map(|r| r.prefix().show()).collect_vec(),
            vec!["b", "aa", "ab"]
        );

        // promoting short rows does nothing and asks nothing
        oracle.reset();
        assert!(table.promote_to_short(&[a], &oracle).unwrap().is_empty());
        assert_eq!(oracle.num_queries(), 0);
    }

    #[test_log::test]
    fn incremental_suffixes() {
        let oracle = ends_with_a();
        let mut stepwise = ObservationTable::new(alphabet!(simple 'a', 'b'));
        stepwise
            .initialize(words(&["", "a"]), words(&[""]), &oracle)
            .unwrap();
        oracle.reset();
        stepwise.add_suffixes(words(&["b"]), &oracle).unwrap();
        stepwise.add_suffixes(words(&["ba", "b", ""]), &oracle).unwrap();
        // five rows, each queried exactly once per new suffix
        assert_eq!(oracle.num_queries(), 10);
        assert_eq!(oracle.num_batches(), 2);

        let mut at_once = ObservationTable::new(alphabet!(simple 'a', 'b'));
        at_once
            .initialize(words(&["", "a"]), words(&[""]), &oracle)
            .unwrap();
        at_once.add_suffixes(words(&["b", "ba"]), &oracle).unwrap();

        assert_eq!(stepwise.suffixes(), at_once.suffixes());
        assert_eq!(contents_by_prefix(&stepwise), contents_by_prefix(&at_once));
        assert_dedup(&stepwise);
        assert_dedup(&at_once);

        // nothing new, nothing asked
        oracle.reset();
        at_once.add_suffixes(words(&["b"]), &oracle).unwrap();
        assert_eq!(oracle.num_batches(), 0);
    }

    #[test]
    fn splitting_contents_keeps_ids_of_first_rows() {
        let oracle = mod_three();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        table
            .initialize(words(&["", "a", "aa"]), words(&[""]), &oracle)
            .unwrap();
        let a = table.row_by_prefix(&['a']).unwrap().id();
        let aa = table.row_by_prefix(&['a', 'a']).unwrap().id();
        let before = table.row(a).unwrap().content_id();
        assert_eq!(before, table.row(aa).unwrap().content_id());

        table.add_suffixes(words(&["a"]), &oracle).unwrap();
        assert_eq!(table.row(a).unwrap().content_id(), before);
        assert_ne!(table.row(aa).unwrap().content_id(), before);
        assert_eq!(table.canonical_row(before.unwrap()), Some(a));
        assert_eq!(
            table.canonical_row(table.row(aa).unwrap().content_id().unwrap()),
            Some(aa)
        );
        assert_eq!(table.num_distinct_rows(), 3);
        assert_dedup(&table);
    }

    #[test_log::test]
    fn inconsistency_and_access_sequences() {
        let oracle = mod_three();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        let unclosed = table
            .initialize(words(&["", "a", "aa"]), words(&[""]), &oracle)
            .unwrap();
        assert!(unclosed.is_empty());
        assert!(table.is_initial_consistency_check_required());

        let a = table.row_by_prefix(&['a']).unwrap().id();
        let aa = table.row_by_prefix(&['a', 'a']).unwrap().id();
        let inconsistency = table.find_inconsistency().unwrap();
        assert_eq!(inconsistency, Inconsistency::new(a, aa, 0));
        assert_eq!(
            table.find_distinguishing_suffix(&inconsistency),
            Some(&Word::empty())
        );

        table.add_suffixes(words(&["a"]), &oracle).unwrap();
        assert!(table.is_consistent());
        assert!(table.is_closed());

        let transformed = table.transform_access_sequence(&['a'; 4]).unwrap();
        assert_eq!(transformed, Word::from("a"));
        assert_eq!(
            table.transform_access_sequence(&transformed).unwrap(),
            transformed
        );
        assert!(table.is_access_sequence(&['a', 'a']).unwrap());
        assert!(!table.is_access_sequence(&['a', 'a', 'a']).unwrap());
        assert!(matches!(
            table.transform_access_sequence(&['b']),
            Err(TableError::InvalidArgument(_))
        ));
    }

    #[test]
    fn closing_converges() {
        let oracle = mod_three();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        let mut unclosed = table
            .initialize(words(&[""]), words(&["", "a", "aa"]), &oracle)
            .unwrap();
        let mut promotions = 0;
        while !unclosed.is_empty() {
            let picks = unclosed.iter().map(|group| group[0]).collect_vec();
            promotions += picks.len();
            unclosed = table.promote_to_short(&picks, &oracle).unwrap();
        }
        assert_eq!(promotions, 2);
        assert!(table.is_closed());
        assert!(table.is_consistent());
        assert_eq!(table.short_prefix_rows().count(), 3);
    }

    #[test]
    fn lifecycle_errors() {
        let oracle = mod_three();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        assert!(matches!(
            table.add_suffixes(words(&["a"]), &oracle),
            Err(TableError::InvalidState(_))
        ));
        assert!(matches!(
            table.transform_access_sequence(&[]),
            Err(TableError::InvalidState(_))
        ));
        assert!(matches!(
            table.initialize(words(&["a"]), words(&[""]), &oracle),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(
            table.initialize(words(&["", "aa"]), words(&[""]), &oracle),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(
            table.initialize(words(&["", "", "a"]), words(&[""]), &oracle),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(
            table.initialize(words(&["", "b"]), words(&[""]), &oracle),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(!table.is_initialized());

        table.initialize(words(&[""]), words(&[""]), &oracle).unwrap();
        assert!(matches!(
            table.initialize(words(&[""]), words(&[""]), &oracle),
            Err(TableError::InvalidState(_))
        ));
        assert!(matches!(
            table.add_short_prefixes(words(&["aaa"]), &oracle),
            Err(TableError::InvalidArgument(_))
        ));
    }

    #[test_log::test]
    fn failed_batches_leave_table_untouched() {
        let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
        let silent = FnOracle::new(|w: &[char]| (w.len() < 2).then_some(true));
        assert_eq!(
            table.initialize(words(&[""]), words(&["", "a"]), &silent),
            Err(TableError::OracleContractViolation {
                expected: 6,
                answered: 4
            })
        );
        assert!(!table.is_initialized());
        assert_eq!(table.num_rows(), 0);

        let oracle = ends_with_a();
        let unclosed = table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();
        let rendered = format!("{table:?}");
        assert_eq!(
            table.promote_to_short(&unclosed[0], &Stuttering),
            Err(TableError::OracleContractViolation {
                expected: 2,
                answered: 0
            })
        );
        assert_eq!(
            table.add_suffixes(words(&["aa", "b"]), &silent),
            Err(TableError::OracleContractViolation {
                expected: 6,
                answered: 1
            })
        );
        assert_eq!(format!("{table:?}"), rendered);
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.suffixes().len(), 1);
        assert!(table.row(unclosed[0][0]).unwrap().is_long());
    }

    #[test_log::test]
    fn short_prefixes_from_counterexample() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
        table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();
        oracle.reset();
        table
            .add_short_prefixes(words(&["", "b", "ba", "bab"]), &oracle)
            .unwrap();
        assert_eq!(
            table.short_prefix_rows().map(|r| r.prefix().show()).collect_vec(),
            vec!["ε", "b", "ba", "bab"]
        );
        // b was a long row already, ba and bab are new short rows
        assert_eq!(oracle.num_batches(), 1);
        assert_eq!(
            oracle.inputs(),
            words(&["ba", "bab", "bb", "baa", "baba", "babb"])
        );
        for row in table.short_prefix_rows() {
            assert_eq!(row.successors().map(|s| s.len()), Some(2));
        }
        assert!(table.pending_rows().is_empty());
        assert_dedup(&table);
    }

    #[test_log::test]
    fn growing_alphabet() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        table
            .initialize(words(&["", "a"]), words(&[""]), &oracle)
            .unwrap();
        assert!(table.add_alphabet_symbol('a').unwrap().is_empty());
        oracle.reset();

        let created = table.add_alphabet_symbol('b').unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(oracle.num_queries(), 0);
        assert_eq!(table.pending_rows(), created);
        assert_eq!(table.find_unclosed_row(), Some(created[0]));
        assert_eq!(
            table.row_by_prefix(&[]).unwrap().successor(1),
            Some(created[0])
        );

        table.add_suffixes(Vec::<Word<char>>::new(), &oracle).unwrap();
        assert_eq!(oracle.inputs(), words(&["b", "ab"]));
        assert!(table.pending_rows().is_empty());
        assert!(table.is_closed());
        assert_dedup(&table);
    }

    #[test_log::test]
    fn grown_rows_are_filled_by_promotion() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        let unclosed = table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();
        let created = table.add_alphabet_symbol('b').unwrap();
        oracle.reset();

        assert!(table.promote_to_short(&unclosed[0], &oracle).unwrap().is_empty());
        assert_eq!(oracle.num_batches(), 1);
        assert_eq!(oracle.inputs(), words(&["b", "aa", "ab"]));
        assert!(table.pending_rows().is_empty());
        for id in created {
            assert!(table.row(id).unwrap().content_id().is_some());
        }
        assert!(table.is_closed());
        assert_dedup(&table);
    }

    #[test_log::test]
    fn grown_rows_are_filled_by_short_prefixes() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a'));
        table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();
        let created = table.add_alphabet_symbol('b').unwrap();
        oracle.reset();

        table.add_short_prefixes(words(&["b"]), &oracle).unwrap();
        assert_eq!(oracle.num_batches(), 1);
        assert_eq!(oracle.inputs(), words(&["b", "ba", "bb"]));
        assert!(table.pending_rows().is_empty());
        assert!(table.row(created[0]).unwrap().is_short());
        assert!(table.row(created[0]).unwrap().content_id().is_some());
        assert_dedup(&table);
    }

    #[test]
    fn access_sequences_are_stable() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
        let unclosed = table
            .initialize(words(&[""]), words(&[""]), &oracle)
            .unwrap();
        table.promote_to_short(&unclosed[0], &oracle).unwrap();
        assert!(table.is_closed());

        let all_words = std::iter::once(vec![]).chain((1..=5).flat_map(|n| {
            std::iter::repeat(['a', 'b'])
                .take(n)
                .multi_cartesian_product()
        }));
        for word in all_words {
            let transformed = table.transform_access_sequence(&word).unwrap();
            assert!(table.is_access_sequence(&transformed).unwrap());
            assert_eq!(
                table.transform_access_sequence(&transformed).unwrap(),
                transformed
            );
            assert_eq!(word.last() == Some(&'a'), transformed.last() == Some(&'a'));
        }
    }

    #[test]
    fn deterministic_ids() {
        let build = || {
            let oracle = mod_three();
            let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
            let unclosed = table
                .initialize(words(&[""]), words(&[""]), &oracle)
                .unwrap();
            table.promote_to_short(&unclosed[0], &oracle).unwrap();
            table.add_suffixes(words(&["a", "ab"]), &oracle).unwrap();
            table
                .short_prefix_rows()
                .chain(table.long_prefix_rows())
                .map(|row| (row.id(), row.prefix().clone(), row.content_id()))
                .collect_vec()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn rendering() {
        let oracle = ends_with_a();
        let mut table = ObservationTable::new(alphabet!(simple 'a', 'b'));
        table
            .initialize(words(&[""]), words(&["", "b"]), &oracle)
            .unwrap();
        let rendered = format!("{table:?}");
        assert!(rendered.contains("true"));
        assert!(rendered.contains("ε"));
        let row = table.row_by_prefix(&['b']).unwrap();
        assert!(format!("{row:?}").contains("prefix: ['b']"));
    }
}
