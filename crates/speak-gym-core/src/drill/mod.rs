mod runner;
mod state;

pub(crate) use state::DrillState;
pub use {
    runner::{DrillRunner, PHRASE_COUNT_RANGE},
    state::{AttemptOutcome, DrillSeed, PendingAttempt, strip_brackets},
};
