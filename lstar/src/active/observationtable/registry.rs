use lstar_core::prelude::*;
use tracing::trace;

use super::row::{ContentId, Row, RowId, RowKind};

/// Bookkeeping for the rows of an observation table and the deduplication of their contents.
///
/// Rows live in an arena and are addressed by [`RowId`]. The short rows are kept in creation
/// (or promotion) order, the long rows in a dense list that is updated with a swap-remove when
/// one of them is promoted. Every distinct content sequence is stored exactly once and is
/// identified by a [`ContentId`]; `canonical` maps each content id to the first short row that
/// exhibited it, if any.
///
/// All operations are total. Callers are responsible for only passing ids that belong to this
/// registry and for never creating two rows with the same prefix.
#[derive(Clone)]
pub(crate) struct Registry<S, D> {
    rows: Vec<Row<S>>,
    short: Vec<RowId>,
    long: Vec<RowId>,
    prefixes: math::Map<Word<S>, RowId>,
    contents: Vec<Vec<D>>,
    lookup: math::Map<Vec<D>, ContentId>,
    canonical: Vec<Option<RowId>>,
}

impl<S: Symbol, D: Color> Default for Registry<S, D> {
    fn default() -> Self {
        Self {
            rows: vec![],
            short: vec![],
            long: vec![],
            prefixes: math::Map::default(),
            contents: vec![],
            lookup: math::Map::default(),
            canonical: vec![],
        }
    }
}

impl<S: Symbol, D: Color> Registry<S, D> {
    /// The id that the next created row will receive.
    pub fn next_row_id(&self) -> RowId {
        RowId::new(self.rows.len())
    }

    pub fn row(&self, id: RowId) -> &Row<S> {
        &self.rows[id.index()]
    }

    pub fn get(&self, id: RowId) -> Option<&Row<S>> {
        self.rows.get(id.index())
    }

    pub fn rows(&self) -> &[Row<S>] {
        &self.rows
    }

    pub fn by_prefix(&self, prefix: &[S]) -> Option<RowId> {
        self.prefixes.get(prefix).copied()
    }

    pub fn short(&self) -> &[RowId] {
        &self.short
    }

    pub fn long(&self) -> &[RowId] {
        &self.long
    }

    pub fn num_contents(&self) -> usize {
        self.contents.len()
    }

    pub fn content(&self, id: ContentId) -> &[D] {
        &self.contents[id.index()]
    }

    pub fn canonical(&self, id: ContentId) -> Option<RowId> {
        self.canonical[id.index()]
    }

    /// Allocates a short row. Its successors are wired separately with [`Self::set_successors`].
    pub fn create_short(&mut self, prefix: Word<S>) -> RowId {
        let id = self.next_row_id();
        self.prefixes.insert(prefix.clone(), id);
        self.rows.push(Row {
            id,
            prefix,
            content: None,
            kind: RowKind::Short { successors: vec![] },
        });
        self.short.push(id);
        id
    }

    /// Allocates a long row and appends it to the dense list of long rows.
    pub fn create_long(&mut self, prefix: Word<S>) -> RowId {
        let id = self.next_row_id();
        self.prefixes.insert(prefix.clone(), id);
        self.rows.push(Row {
            id,
            prefix,
            content: None,
            kind: RowKind::Long {
                index: self.long.len(),
            },
        });
        self.long.push(id);
        id
    }

    /// Moves a long row into the short partition. The last long row takes over the slot of
    /// the promoted one. Does nothing if the row is already short.
    pub fn promote(&mut self, id: RowId) {
        let RowKind::Long { index } = self.rows[id.index()].kind else {
            return;
        };
        self.long.swap_remove(index);
        if let Some(&moved) = self.long.get(index) {
            self.rows[moved.index()].kind = RowKind::Long { index };
        }
        self.rows[id.index()].kind = RowKind::Short { successors: vec![] };
        self.short.push(id);

        if let Some(content) = self.rows[id.index()].content {
            self.claim_canonical(content, id);
        }
    }

    pub fn set_successors(&mut self, id: RowId, new: Vec<RowId>) {
        if let RowKind::Short { successors } = &mut self.rows[id.index()].kind {
            *successors = new;
        }
    }

    pub fn push_successor(&mut self, id: RowId, successor: RowId) {
        if let RowKind::Short { successors } = &mut self.rows[id.index()].kind {
            successors.push(successor);
        }
    }

    pub fn set_content(&mut self, id: RowId, content: ContentId) {
        self.rows[id.index()].content = Some(content);
    }

    /// Looks up `content` and assigns the next free id to it if it was not seen before. The
    /// given row becomes the canonical representative of the content if `make_canonical` is set
    /// and no short row has claimed it yet. Returns the id and whether it was freshly minted.
    pub fn intern(
        &mut self,
        content: Vec<D>,
        row: RowId,
        make_canonical: bool,
    ) -> (ContentId, bool) {
        if let Some(&id) = self.lookup.get(&content) {
            if make_canonical {
                self.claim_canonical(id, row);
            }
            return (id, false);
        }

        let id = ContentId::new(self.contents.len());
        trace!("minting {} for row {}", id.show(), row.show());
        self.lookup.insert(content.clone(), id);
        self.contents.push(content);
        self.canonical.push(make_canonical.then_some(row));
        (id, true)
    }

    /// Grows the sequence stored for `id` by `tail` while keeping the id itself.
    pub fn extend_in_place(&mut self, id: ContentId, tail: &[D]) {
        if tail.is_empty() {
            return;
        }
        let old = &self.contents[id.index()];
        self.lookup.swap_remove(old);
        let content = &mut self.contents[id.index()];
        content.extend_from_slice(tail);
        self.lookup.insert(content.clone(), id);
    }

    fn claim_canonical(&mut self, id: ContentId, row: RowId) {
        let slot = &mut self.canonical[id.index()];
        if slot.is_none() {
            *slot = Some(row);
        }
    }
}
