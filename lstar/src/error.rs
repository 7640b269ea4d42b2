use thiserror::Error;

/// Errors that can be raised by an [`crate::active::ObservationTable`]. None of them is
/// recoverable by retrying, and an operation that fails leaves the table exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("operation not permitted in the current state: {0}")]
    InvalidState(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("oracle answered only {answered} out of {expected} queries exactly once")]
    OracleContractViolation { expected: usize, answered: usize },
}

/// Errors that can arise while running [`crate::active::LStar`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LStarError {
    // we let `thiserror` implement From<TableError>
    #[error("observation table error: {0}")]
    Table(#[from] TableError),
    #[error("iteration threshold of {0} exceeded")]
    IterationThresholdExceeded(usize),
    #[error("cannot construct hypothesis from table: {0}")]
    IncompleteTable(String),
    #[error("`{0}` is not a counterexample for the current hypothesis")]
    SpuriousCounterexample(String),
}
