//! # Stores Core
//!
//! Core traits and types shared by the stores services.
//!
//! Every service in the workspace follows the same shape: a pure reducer
//! validates a command against an aggregate and mutates it, while a thin
//! service shell loads the aggregate from a [`DocumentStore`](document_store::DocumentStore),
//! runs the reducer, and writes the result back under an optimistic
//! concurrency check.
//!
//! ## Core Concepts
//!
//! - **State**: The aggregate a reducer operates on (one document)
//! - **Action**: A command addressed to that aggregate
//! - **Event**: A description of what the reducer changed
//! - **Reducer**: `(State, Action, Environment) → Result<Events, Error>`
//! - **Environment**: Injected dependencies (clock) via traits
//!
//! ## Example
//!
//! ```
//! use stores_core::reducer::Reducer;
//! use stores_core::{smallvec, SmallVec};
//!
//! #[derive(Debug, Default)]
//! struct Counter {
//!     count: u32,
//! }
//!
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! #[derive(Debug, PartialEq)]
//! enum CounterEvent {
//!     Changed(u32),
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = CounterAction;
//!     type Event = CounterEvent;
//!     type Error = String;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Counter,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> Result<SmallVec<[CounterEvent; 4]>, String> {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!             CounterAction::Decrement => {
//!                 state.count = state.count.checked_sub(1).ok_or("already zero")?;
//!             },
//!         }
//!         Ok(smallvec![CounterEvent::Changed(state.count)])
//!     }
//! }
//!
//! let mut state = Counter::default();
//! let events = CounterReducer.reduce(&mut state, CounterAction::Increment, &()).unwrap();
//! assert_eq!(events.as_slice(), &[CounterEvent::Changed(1)]);
//! assert!(CounterReducer.reduce(&mut Counter::default(), CounterAction::Decrement, &()).is_err());
//! ```

pub mod document;
pub mod document_store;
pub mod revision;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the core trait for business logic
///
/// Reducers are deterministic: given the same state, action and environment
/// they produce the same mutation and the same events. They perform no I/O;
/// persisting the mutated state is the caller's job.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The aggregate this reducer operates on
    /// - `Action`: The commands this reducer accepts
    /// - `Event`: What the reducer reports back after a successful command
    /// - `Error`: Why a command was rejected
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Atomicity
    ///
    /// A command either applies completely or not at all. When `reduce`
    /// returns `Err`, `state` must be exactly as it was before the call.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Events describing applied changes
        type Event;

        /// Rejection reason for an invalid action
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into a state change
        ///
        /// 1. Validates the action against `state`
        /// 2. Updates state in place
        /// 3. Returns the events describing the change
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` if the action is rejected. `state` is left
        /// untouched in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies of a reducer are abstracted behind traits and
/// injected via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use stores_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
