use crate::{CoreError, CoreResult, Slot};

use std::{collections::HashMap, future::Future, panic::Location};

use error_location::ErrorLocation;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one in-flight feedback computation.
///
/// Cancelling is idempotent. Once cancelled, [`RequestTicket::run`] resolves
/// to [`CoreError::Superseded`] and the result must not be applied.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    slot: Slot,
    generation: u64,
    token: CancellationToken,
}

impl RequestTicket {
    /// Slot this request belongs to.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Monotonic cycle number; later cycles have larger numbers.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this request has been aborted.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Abort this request. Aborting twice, or after completion, is a no-op.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drive `fut` unless the ticket is cancelled first.
    ///
    /// A result that arrives after cancellation is discarded.
    pub async fn run<T, F>(&self, fut: F) -> CoreResult<T>
    where
        F: Future<Output = CoreResult<T>>,
    {
        let result = tokio::select! {
            _ = self.token.cancelled() => None,
            result = fut => Some(result),
        };

        match result {
            Some(result) if !self.token.is_cancelled() => result,
            _ => Err(self.superseded()),
        }
    }

    #[track_caller]
    fn superseded(&self) -> CoreError {
        CoreError::Superseded {
            slot: self.slot,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Latest request ticket per slot.
#[derive(Debug, Default)]
pub struct InFlightRequests {
    current: HashMap<Slot, RequestTicket>,
    next_generation: u64,
}

impl InFlightRequests {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is outstanding for `slot` and issue the next ticket.
    pub fn supersede(&mut self, slot: Slot) -> RequestTicket {
        self.next_generation += 1;
        let ticket = RequestTicket {
            slot,
            generation: self.next_generation,
            token: CancellationToken::new(),
        };

        if let Some(previous) = self.current.insert(slot, ticket.clone()) {
            if !previous.is_cancelled() {
                debug!(
                    slot = %slot,
                    generation = previous.generation,
                    "In-flight request superseded"
                );
            }
            previous.cancel();
        }

        ticket
    }

    /// Cancel the outstanding request for `slot`, if any, without issuing a new one.
    pub fn cancel(&mut self, slot: Slot) {
        if let Some(ticket) = self.current.get(&slot) {
            ticket.cancel();
        }
    }

    /// Whether `ticket` is still the newest, uncancelled request for its slot.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        !ticket.is_cancelled()
            && self
                .current
                .get(&ticket.slot)
                .is_some_and(|t| t.generation == ticket.generation)
    }
}
