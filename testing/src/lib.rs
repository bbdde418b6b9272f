//! # Stores Testing
//!
//! Testing utilities and helpers for the stores services.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (`FixedClock`)
//! - An in-memory `DocumentStore`
//! - A fluent Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use stores_testing::{test_clock, InMemoryDocumentStore};
//!
//! #[tokio::test]
//! async fn test_requisition_flow() {
//!     let store = Arc::new(InMemoryDocumentStore::new());
//!     let service = RequisitionService::new(store, Arc::new(test_clock()));
//!
//!     let created = service.create(new_requisition("alice")).await.unwrap();
//!     assert_eq!(created.requisition.status(), Status::None);
//! }
//! ```

use chrono::{DateTime, Utc};
use stores_core::environment::Clock;

mod in_memory_store;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    pub use crate::in_memory_store::InMemoryDocumentStore;

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until explicitly advanced, making tests
    /// reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use stores_testing::mocks::FixedClock;
    /// use stores_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now()); // Always the same!
    ///
    /// clock.advance(Duration::minutes(5));
    /// assert_eq!(clock.now() - time1, Duration::minutes(5));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, InMemoryDocumentStore};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = test_clock();
        let start = clock.now();
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(30));
    }
}
