use lstar_core::prelude::*;

/// Identifies a row of an [`super::ObservationTable`]. Row ids are assigned densely in the order
/// in which rows are created and never change, even when a long row is promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(usize);

impl RowId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl Show for RowId {
    fn show(&self) -> String {
        format!("r{}", self.0)
    }
}

/// Identifies a distinct row content. Two rows hold the same content id if and only if they
/// produce the same outputs for every suffix of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(usize);

impl ContentId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl Show for ContentId {
    fn show(&self) -> String {
        format!("c{}", self.0)
    }
}

/// Whether a row is a short prefix (a state candidate that owns one successor per symbol) or
/// a long prefix (a one-symbol extension of a short prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    /// The successor rows, indexed by the alphabet index of the symbol.
    Short { successors: Vec<RowId> },
    /// The position of the row in the dense list of long rows.
    Long { index: usize },
}

/// A single row of an observation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<S> {
    pub(super) id: RowId,
    pub(super) prefix: Word<S>,
    pub(super) content: Option<ContentId>,
    pub(super) kind: RowKind,
}

impl<S: Symbol> Row<S> {
    pub fn id(&self) -> RowId {
        self.id
    }

    /// The prefix that labels this row.
    pub fn prefix(&self) -> &Word<S> {
        &self.prefix
    }

    /// The id of the content of this row. This is `None` only for rows that were created by
    /// growing the alphabet and have not been queried yet.
    pub fn content_id(&self) -> Option<ContentId> {
        self.content
    }

    pub fn kind(&self) -> &RowKind {
        &self.kind
    }

    pub fn is_short(&self) -> bool {
        matches!(self.kind, RowKind::Short { .. })
    }

    pub fn is_long(&self) -> bool {
        !self.is_short()
    }

    /// Returns the successor row on the symbol with the given alphabet index. Long rows have no
    /// successors.
    pub fn successor(&self, symbol_index: usize) -> Option<RowId> {
        self.successors()
            .and_then(|successors| successors.get(symbol_index).copied())
    }

    /// Returns all successor rows of a short row.
    pub fn successors(&self) -> Option<&[RowId]> {
        match &self.kind {
            RowKind::Short { successors } => Some(successors),
            RowKind::Long { .. } => None,
        }
    }
}
