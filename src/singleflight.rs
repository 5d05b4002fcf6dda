//! # Single-Flight Coordinator
//!
//! Per-process registry of in-progress computations, keyed by cache key.
//! When several callers miss on the same key concurrently, exactly one
//! computation runs; every caller awaits the same shared future and observes
//! the identical success value or the identical error.
//!
//! The registry stores weak handles to the shared futures. Callers are the
//! owners: if every caller of a flight is cancelled, the computation is
//! dropped with them and the next call starts a fresh attempt, while a
//! single surviving waiter is enough to drive the computation to completion.
//! Completion (success or failure) removes the marker, so failures are never
//! cached.

use std::any::Any;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use metrics::counter;
use tracing::warn;

use crate::core::error::CacheResult;

type FlightFuture<V> = Shared<BoxFuture<'static, CacheResult<V>>>;
type WeakFlight<V> = WeakShared<BoxFuture<'static, CacheResult<V>>>;

/// Registry coalescing concurrent computations per key.
///
/// Flights for different value types share one registry; the entries are
/// type-erased and recovered by downcast on lookup.
#[derive(Default)]
pub struct FlightGroup {
    flights: Arc<DashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl FlightGroup {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make`'s future under single-flight protection for `key`.
    ///
    /// If a flight for `key` is already live in this process, `make` is not
    /// invoked and the caller joins the existing flight. Otherwise the
    /// caller leads a new flight that every later caller joins until it
    /// completes.
    pub async fn run<V, F>(&self, key: &str, make: F) -> CacheResult<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, CacheResult<V>>,
    {
        let flight = match self.flights.entry(key.to_string()) {
            Entry::Occupied(mut slot) => match slot.get().downcast_ref::<WeakFlight<V>>() {
                Some(weak) => match weak.upgrade() {
                    Some(live) => {
                        counter!("cache_flight_joined").increment(1);
                        live
                    }
                    None => {
                        // Every caller of the previous flight was cancelled
                        // before it finished; this is a fresh attempt.
                        let flight = self.lead(key, make());
                        if let Some(weak) = flight.downgrade() {
                            slot.insert(Box::new(weak));
                        }
                        flight
                    }
                },
                None => {
                    // Same key in flight at a different value type. Run
                    // uncoalesced rather than disturb the live flight.
                    warn!(
                        key,
                        "single-flight key reused at a different value type; running uncoalesced"
                    );
                    make().shared()
                }
            },
            Entry::Vacant(slot) => {
                let flight = self.lead(key, make());
                if let Some(weak) = flight.downgrade() {
                    slot.insert(Box::new(weak));
                }
                flight
            }
        };

        flight.await
    }

    /// Number of flights currently registered (dead weak handles included
    /// until their key is reused).
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    fn lead<V>(&self, key: &str, fut: BoxFuture<'static, CacheResult<V>>) -> FlightFuture<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        counter!("cache_flight_led").increment(1);
        let flights = Arc::clone(&self.flights);
        let key = key.to_string();
        async move {
            let outcome = fut.await;
            // Retire the marker on completion so the next call is a fresh
            // attempt; a failure here is observed by the waiters, never by
            // the registry.
            flights.remove(&key);
            outcome
        }
        .boxed()
        .shared()
    }
}
