use lstar_core::Show;

use super::RowId;

/// Witness for an inconsistent observation table: two short rows with equal contents whose
/// successors on the symbol with index `symbol_index` have different contents.
///
/// `first` is the row that was seen first among all short rows with this content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inconsistency {
    pub first: RowId,
    pub second: RowId,
    pub symbol_index: usize,
}

impl Inconsistency {
    pub fn new(first: RowId, second: RowId, symbol_index: usize) -> Self {
        Self {
            first,
            second,
            symbol_index,
        }
    }
}

impl Show for Inconsistency {
    fn show(&self) -> String {
        format!(
            "({}, {}) on symbol #{}",
            self.first.show(),
            self.second.show(),
            self.symbol_index
        )
    }
}
