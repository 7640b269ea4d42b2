use lstar_core::prelude::*;
use owo_colors::OwoColorize;

use super::{ObservationTable, Row};

/// Renders an observation table as an ASCII table. Short prefixes come first and have their
/// label highlighted, long prefixes follow in the order of the dense long-row list. Cells of
/// rows that have not been queried yet are shown as `?`.
pub(crate) fn render<A: Alphabet, D: Color>(table: &ObservationTable<A, D>) -> String {
    let mut builder = tabled::builder::Builder::default();
    let mut header = vec!["".to_string()];
    for suffix in table.suffixes() {
        header.push(suffix.show());
    }
    builder.push_record(header);

    for row in table.short_prefix_rows() {
        builder.push_record(record(table, row, true));
    }
    for row in table.long_prefix_rows() {
        builder.push_record(record(table, row, false));
    }

    builder.build().to_string()
}

fn record<A: Alphabet, D: Color>(
    table: &ObservationTable<A, D>,
    row: &Row<A::Symbol>,
    short: bool,
) -> Vec<String> {
    let label = if short {
        row.prefix().show().bold().to_string()
    } else {
        row.prefix().show()
    };

    let mut out = vec![label];
    match table.row_contents(row.id()) {
        Some(contents) => out.extend(contents.iter().map(|d| format!("{d:?}"))),
        None => out.extend(std::iter::repeat("?".to_string()).take(table.suffixes().len())),
    }
    out
}
