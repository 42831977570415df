//! # Request Coalescing
//!
//! Per-key registry of in-flight computations. The first caller to enter the
//! group for a key becomes its leader and owns the computation; every later
//! caller joins as a waiter on the same outcome cell. Admission is a single
//! check-and-insert under one lock, so two callers can never both lead the
//! same key.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{CacheError, CacheResult};

/// Outcome of one in-flight computation: the encoded payload on success,
/// shared with every caller of the flight.
pub(crate) type FlightOutcome = CacheResult<Vec<u8>>;

type OutcomeCell = watch::Receiver<Option<FlightOutcome>>;

/// Admission decision for a caller entering the group for a key.
pub(crate) enum Admission {
    /// First caller in: run the computation and publish through the handle.
    Leader(FlightPublisher),
    /// A computation is already in flight: await its outcome.
    Waiter(FlightWaiter),
}

/// Publishing side of a flight, held by its leader.
///
/// Dropping the publisher without publishing (a panicked computation)
/// closes the cell; waiters observe the closure instead of blocking
/// forever, and the next admission for the key replaces the dead flight.
pub(crate) struct FlightPublisher {
    tx: watch::Sender<Option<FlightOutcome>>,
}

/// Waiting side of a flight.
pub(crate) struct FlightWaiter {
    rx: OutcomeCell,
}

impl FlightWaiter {
    /// Awaits the flight outcome. Dropping this future abandons only this
    /// caller's wait; the computation keeps running for the group.
    pub(crate) async fn wait(mut self) -> FlightOutcome {
        loop {
            let published = self.rx.borrow_and_update().as_ref().cloned();
            if let Some(outcome) = published {
                return outcome;
            }
            if self.rx.changed().await.is_err() {
                return Err(CacheError::compute(
                    "in-flight computation was aborted before publishing",
                ));
            }
        }
    }
}

/// Registry of in-flight computations keyed by cache key.
pub(crate) struct FlightGroup {
    flights: Mutex<HashMap<String, OutcomeCell>>,
}

impl FlightGroup {
    pub(crate) fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically joins the flight for `key`, or becomes its leader when no
    /// computation is in flight.
    pub(crate) fn join(&self, key: &str) -> Admission {
        let mut flights = self.flights.lock();
        if let Some(cell) = flights.get(key) {
            // A closed cell belongs to a leader that never published;
            // fall through and replace it.
            if cell.has_changed().is_ok() {
                return Admission::Waiter(FlightWaiter { rx: cell.clone() });
            }
        }
        let (tx, rx) = watch::channel(None);
        flights.insert(key.to_string(), rx);
        Admission::Leader(FlightPublisher { tx })
    }

    /// Completes the flight for `key`: the registry entry is removed first,
    /// so late callers start a fresh flight, then the outcome reaches every
    /// waiter already holding the cell.
    pub(crate) fn finish(&self, key: &str, publisher: FlightPublisher, outcome: FlightOutcome) {
        self.flights.lock().remove(key);
        publisher.tx.send_replace(Some(outcome));
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_caller_leads_then_registry_drains() {
        let group = FlightGroup::new();

        let publisher = match group.join("key") {
            Admission::Leader(publisher) => publisher,
            Admission::Waiter(_) => panic!("first caller must lead"),
        };
        assert!(matches!(group.join("key"), Admission::Waiter(_)));
        assert_eq!(group.in_flight(), 1);

        group.finish("key", publisher, Ok(b"payload".to_vec()));
        assert_eq!(group.in_flight(), 0);
        // With the flight finished, the next caller leads a fresh one.
        assert!(matches!(group.join("key"), Admission::Leader(_)));
    }

    #[tokio::test]
    async fn test_waiters_receive_the_published_outcome() {
        let group = FlightGroup::new();
        let publisher = match group.join("key") {
            Admission::Leader(publisher) => publisher,
            Admission::Waiter(_) => panic!("first caller must lead"),
        };
        let waiter = match group.join("key") {
            Admission::Waiter(waiter) => waiter,
            Admission::Leader(_) => panic!("second caller must wait"),
        };

        let wait = tokio::spawn(waiter.wait());
        group.finish("key", publisher, Ok(b"shared".to_vec()));
        assert_eq!(wait.await.unwrap().unwrap(), b"shared".to_vec());
    }

    #[tokio::test]
    async fn test_error_outcomes_are_shared_too() {
        let group = FlightGroup::new();
        let publisher = match group.join("key") {
            Admission::Leader(publisher) => publisher,
            Admission::Waiter(_) => panic!("first caller must lead"),
        };
        let waiter = match group.join("key") {
            Admission::Waiter(waiter) => waiter,
            Admission::Leader(_) => panic!("second caller must wait"),
        };

        group.finish("key", publisher, Err(CacheError::compute("upstream down")));
        let outcome = waiter.wait().await;
        assert!(matches!(outcome, Err(CacheError::Compute { .. })));
    }

    #[tokio::test]
    async fn test_waiter_joining_after_publish_still_sees_outcome() {
        let group = FlightGroup::new();
        let publisher = match group.join("key") {
            Admission::Leader(publisher) => publisher,
            Admission::Waiter(_) => panic!("first caller must lead"),
        };
        let waiter = match group.join("key") {
            Admission::Waiter(waiter) => waiter,
            Admission::Leader(_) => panic!("second caller must wait"),
        };

        group.finish("key", publisher, Ok(b"v".to_vec()));
        // The waiter starts polling only after the outcome landed.
        assert_eq!(waiter.wait().await.unwrap(), b"v".to_vec());
    }

    #[tokio::test]
    async fn test_dead_flight_is_detected_and_replaced() {
        let group = FlightGroup::new();
        let publisher = match group.join("key") {
            Admission::Leader(publisher) => publisher,
            Admission::Waiter(_) => panic!("first caller must lead"),
        };
        let waiter = match group.join("key") {
            Admission::Waiter(waiter) => waiter,
            Admission::Leader(_) => panic!("second caller must wait"),
        };

        // Leader vanishes without publishing.
        drop(publisher);

        let outcome = waiter.wait().await;
        assert!(matches!(outcome, Err(CacheError::Compute { .. })));
        // The dead entry does not wedge the key: the next caller leads again.
        assert!(matches!(group.join("key"), Admission::Leader(_)));
    }
}
