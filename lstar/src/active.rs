//! Active learning of Moore and Mealy machines with the L* family of algorithms. The core is
//! the [`ObservationTable`], which is driven by [`LStar`] together with a [`ClosingStrategy`]
//! and a [`CounterexampleHandler`].

mod lstar;
pub use lstar::*;

pub(crate) mod oracle;
pub use oracle::*;

mod hypothesis;
pub use hypothesis::*;

mod closing;
pub use closing::*;

mod counterexample;
pub use counterexample::*;

mod observationtable;
pub use observationtable::{
    ContentId, Inconsistency, ObservationTable, Row, RowId, RowKind, Unclosed,
};
