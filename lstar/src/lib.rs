//! A library for learning finite automata with the L* algorithm and its variants.
#![allow(missing_docs)]

/// Deals with active learning algorithms such as L*.
pub mod active;

/// Errors raised by the observation table and the learner.
pub mod error;

/// Everything that is needed to set up a learner, `use lstar::prelude::*;` should suffice.
pub mod prelude {
    pub use super::{
        active::{
            ClassicLStar, CloseFirst, CloseLexMin, CloseRandom, CloseShortest, ClosingStrategy,
            CounterexampleHandler, EquivalenceOracle, FindLinear, FindLinearReverse, FnOracle,
            Hypothesis, LStar, LStarConfig, LStarHypothesis, MalerPnueli, MealyOracle,
            MembershipOracle, MooreOracle, ObservationTable, Query, RandomWordsOracle,
            RivestSchapire, Shahbaz, Suffix1By1,
        },
        error::{LStarError, TableError},
    };
    pub use lstar_core::prelude::*;
}
