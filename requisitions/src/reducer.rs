//! Requisition reducer implementing the lifecycle state machine.
//!
//! Commands are applied to the [`Requisition`] aggregate and described by the
//! events they produce. A rejected command returns an error and leaves the
//! requisition exactly as it was.

use crate::requisition::{LifecycleError, ReceiptOutcome, ReceivedLine, Requisition};
use crate::types::{ComponentId, LineItem, Quantity, Status, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use stores_core::environment::Clock;
use stores_core::reducer::Reducer;
use stores_core::{smallvec, SmallVec};

/// Commands accepted by [`RequisitionReducer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequisitionAction {
    /// Submit for approval
    Submit {
        /// Submitting user (becomes the requestee)
        actor: UserId,
    },
    /// Approve
    Approve {
        /// Approver
        actor: UserId,
    },
    /// Decline
    Decline {
        /// User declining
        actor: UserId,
    },
    /// Pass to purchasing
    AwaitPurchase {
        /// User handing over
        actor: UserId,
    },
    /// Record that the order was placed
    MarkOrdered {
        /// User placing the order
        actor: UserId,
    },
    /// Record a receipt against an awaiting line
    ReceiveItem {
        /// What arrived
        line: ReceivedLine,
        /// User booking it in
        actor: UserId,
    },
    /// Complete the requisition
    Complete {
        /// User completing it
        actor: UserId,
    },
    /// Replace every awaiting line
    ReplaceItems {
        /// New awaiting lines (already validated)
        items: Vec<LineItem>,
        /// User editing
        actor: UserId,
    },
    /// Set the status from free text, clamping unknown values to `NONE`
    SetStatus {
        /// Status as supplied
        raw: String,
        /// User setting it
        actor: UserId,
    },
}

impl RequisitionAction {
    /// Short name used in logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Approve { .. } => "approve",
            Self::Decline { .. } => "decline",
            Self::AwaitPurchase { .. } => "await_purchase",
            Self::MarkOrdered { .. } => "mark_ordered",
            Self::ReceiveItem { .. } => "receive_item",
            Self::Complete { .. } => "complete",
            Self::ReplaceItems { .. } => "replace_items",
            Self::SetStatus { .. } => "set_status",
        }
    }

    /// User performing the action
    #[must_use]
    pub const fn actor(&self) -> &UserId {
        match self {
            Self::Submit { actor }
            | Self::Approve { actor }
            | Self::Decline { actor }
            | Self::AwaitPurchase { actor }
            | Self::MarkOrdered { actor }
            | Self::ReceiveItem { actor, .. }
            | Self::Complete { actor }
            | Self::ReplaceItems { actor, .. }
            | Self::SetStatus { actor, .. } => actor,
        }
    }
}

/// What happened to a requisition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum RequisitionEvent {
    Submitted {
        by: UserId,
        at: DateTime<Utc>,
    },
    Approved {
        by: UserId,
        at: DateTime<Utc>,
    },
    Declined {
        by: UserId,
        at: DateTime<Utc>,
    },
    AwaitingPurchase {
        by: UserId,
        at: DateTime<Utc>,
    },
    /// `status` is `AVAILABLE` for stock items
    Ordered {
        by: UserId,
        status: Status,
        at: DateTime<Utc>,
    },
    ItemReceived {
        component: ComponentId,
        quantity: Quantity,
        outcome: ReceiptOutcome,
        by: UserId,
        at: DateTime<Utc>,
    },
    /// Nothing is awaited any more
    BecameAvailable {
        at: DateTime<Utc>,
    },
    Completed {
        by: UserId,
        at: DateTime<Utc>,
    },
    ItemsReplaced {
        count: usize,
        by: UserId,
        at: DateTime<Utc>,
    },
    /// `requested` is the raw input, `status` what was assigned
    StatusSet {
        requested: String,
        status: Status,
        by: UserId,
        at: DateTime<Utc>,
    },
}

/// Environment for the requisition reducer
#[derive(Clone)]
pub struct RequisitionEnvironment {
    /// Clock for generating timestamps
    pub clock: Arc<dyn Clock>,
}

impl RequisitionEnvironment {
    /// Creates a new requisition environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// Reducer implementing the requisition lifecycle.
///
/// # Example
///
/// ```
/// use requisitions::reducer::{RequisitionAction, RequisitionEnvironment, RequisitionReducer};
/// use requisitions::requisition::Requisition;
/// use requisitions::types::{RequisitionId, Status, UserId};
/// use stores_core::environment::SystemClock;
/// use stores_core::reducer::Reducer;
/// use std::sync::Arc;
///
/// let env = RequisitionEnvironment::new(Arc::new(SystemClock));
/// let alice = UserId::new("alice");
/// let mut req = Requisition::new(RequisitionId::new("req-1"), alice.clone(), false, chrono::Utc::now());
///
/// let events = RequisitionReducer::new()
///     .reduce(&mut req, RequisitionAction::Submit { actor: alice }, &env)
///     .expect("submit is always accepted");
///
/// assert_eq!(events.len(), 1);
/// assert_eq!(req.status(), Status::AwaitingApproval);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RequisitionReducer;

impl RequisitionReducer {
    /// Creates a new requisition reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for RequisitionReducer {
    type State = Requisition;
    type Action = RequisitionAction;
    type Event = RequisitionEvent;
    type Error = LifecycleError;
    type Environment = RequisitionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error> {
        if let Err(error) = state.ensure_open() {
            tracing::warn!(requisition_id = %state.id(), action = action.name(), "Rejected action on completed requisition");
            return Err(error);
        }

        let now = env.clock.now();
        let action_name = action.name();

        let events: SmallVec<[RequisitionEvent; 4]> = match action {
            RequisitionAction::Submit { actor } => {
                state.submit(&actor, now);
                smallvec![RequisitionEvent::Submitted { by: actor, at: now }]
            },
            RequisitionAction::Approve { actor } => {
                state.approve(&actor, now);
                smallvec![RequisitionEvent::Approved { by: actor, at: now }]
            },
            RequisitionAction::Decline { actor } => {
                state.decline(&actor, now);
                smallvec![RequisitionEvent::Declined { by: actor, at: now }]
            },
            RequisitionAction::AwaitPurchase { actor } => {
                state.await_purchase(&actor, now);
                smallvec![RequisitionEvent::AwaitingPurchase { by: actor, at: now }]
            },
            RequisitionAction::MarkOrdered { actor } => {
                let status = state.mark_ordered(&actor, now);
                smallvec![RequisitionEvent::Ordered {
                    by: actor,
                    status,
                    at: now
                }]
            },
            RequisitionAction::ReceiveItem { line, actor } => {
                let outcome = match state.receive_item(&line, &actor, now) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        tracing::warn!(requisition_id = %state.id(), %error, "Receipt rejected");
                        return Err(error);
                    },
                };

                if outcome == ReceiptOutcome::Unmatched {
                    tracing::info!(
                        requisition_id = %state.id(),
                        component = %line.id,
                        "Receipt does not match an awaiting line"
                    );
                }

                let mut events: SmallVec<[RequisitionEvent; 4]> = smallvec![RequisitionEvent::ItemReceived {
                    component: line.id,
                    quantity: line.quantity,
                    outcome,
                    by: actor,
                    at: now,
                }];
                if outcome != ReceiptOutcome::Unmatched && state.items().is_empty() {
                    events.push(RequisitionEvent::BecameAvailable { at: now });
                }
                events
            },
            RequisitionAction::Complete { actor } => {
                state.complete(&actor, now);
                smallvec![RequisitionEvent::Completed { by: actor, at: now }]
            },
            RequisitionAction::ReplaceItems { items, actor } => {
                state.replace_items(items, &actor, now);
                smallvec![RequisitionEvent::ItemsReplaced {
                    count: state.items().len(),
                    by: actor,
                    at: now
                }]
            },
            RequisitionAction::SetStatus { raw, actor } => {
                let requested = Status::parse_lenient(&raw);
                if requested == Status::None && raw.trim().to_uppercase() != Status::None.as_str() {
                    tracing::warn!(requisition_id = %state.id(), raw = %raw, "Unknown status, falling back to NONE");
                }
                let status = state.set_status(requested, &actor, now);
                smallvec![RequisitionEvent::StatusSet {
                    requested: raw,
                    status,
                    by: actor,
                    at: now
                }]
            },
        };

        tracing::debug!(
            requisition_id = %state.id(),
            action = action_name,
            status = %state.status(),
            department = %state.department(),
            "Requisition updated"
        );

        Ok(events)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Department, RequisitionId};
    use stores_testing::reducer_test::assertions;
    use stores_testing::{test_clock, ReducerTest};

    fn env() -> RequisitionEnvironment {
        RequisitionEnvironment::new(Arc::new(test_clock()))
    }

    fn user(name: &str) -> UserId {
        UserId::new(name)
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn requisition(stock: bool) -> Requisition {
        Requisition::new(RequisitionId::new("req-1"), user("alice"), stock, test_clock().now())
            .with_items([LineItem::new(ComponentId::new("C1"), qty(5))])
    }

    #[test]
    fn submit_emits_submitted() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(false))
            .when_action(RequisitionAction::Submit { actor: user("alice") })
            .then_state(|state| {
                assert_eq!(state.status(), Status::AwaitingApproval);
                assert_eq!(state.department(), Department::Engineering);
            })
            .then_events(|events| {
                assertions::assert_events_count(events, 1);
                assert_eq!(
                    events[0],
                    RequisitionEvent::Submitted {
                        by: user("alice"),
                        at: test_clock().now()
                    }
                );
            })
            .run();
    }

    #[test]
    fn stock_order_reports_available_status() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(true))
            .when_action(RequisitionAction::MarkOrdered { actor: user("bob") })
            .then_state(|state| assert_eq!(state.status(), Status::Available))
            .then_events(|events| {
                assertions::assert_has_event(events, |e| {
                    matches!(e, RequisitionEvent::Ordered { status: Status::Available, .. })
                });
            })
            .run();
    }

    #[test]
    fn last_receipt_emits_became_available() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(false))
            .when_action(RequisitionAction::ReceiveItem {
                line: ReceivedLine::new(ComponentId::new("C1"), qty(5)),
                actor: user("wes"),
            })
            .then_state(|state| {
                assert!(state.items().is_empty());
                assert_eq!(state.status(), Status::Available);
                assert_eq!(state.received_by(), Some(&user("wes")));
            })
            .then_events(|events| {
                assertions::assert_events_count(events, 2);
                assertions::assert_has_event(events, |e| {
                    matches!(e, RequisitionEvent::ItemReceived { outcome: ReceiptOutcome::Cleared, .. })
                });
                assertions::assert_has_event(events, |e| matches!(e, RequisitionEvent::BecameAvailable { .. }));
            })
            .run();
    }

    #[test]
    fn partial_receipt_does_not_become_available() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(false))
            .when_action(RequisitionAction::ReceiveItem {
                line: ReceivedLine::new(ComponentId::new("C1"), qty(2)),
                actor: user("wes"),
            })
            .then_state(|state| assert_eq!(state.status(), Status::None))
            .then_events(|events| {
                assert_eq!(events.len(), 1);
                assert!(matches!(
                    events[0],
                    RequisitionEvent::ItemReceived {
                        outcome: ReceiptOutcome::Partial { .. },
                        ..
                    }
                ));
            })
            .run();
    }

    #[test]
    fn over_receipt_is_an_error_and_keeps_state() {
        let original = requisition(false);
        let expected = original.clone();

        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(original)
            .when_action(RequisitionAction::ReceiveItem {
                line: ReceivedLine::new(ComponentId::new("C1"), qty(6)),
                actor: user("wes"),
            })
            .then_state(move |state| assert_eq!(*state, expected))
            .then_error(|error| assert!(matches!(error, LifecycleError::OverReceipt { .. })))
            .run();
    }

    #[test]
    fn unmatched_receipt_is_reported_not_rejected() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(false))
            .when_action(RequisitionAction::ReceiveItem {
                line: ReceivedLine::new(ComponentId::new("C7"), qty(1)),
                actor: user("wes"),
            })
            .then_state(|state| assert_eq!(state.items().len(), 1))
            .then_events(|events| {
                assert!(matches!(
                    events[0],
                    RequisitionEvent::ItemReceived {
                        outcome: ReceiptOutcome::Unmatched,
                        ..
                    }
                ));
            })
            .run();
    }

    #[test]
    fn bogus_status_clamps_to_none() {
        let mut approved = requisition(false);
        approved.approve(&user("bob"), test_clock().now());

        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(approved)
            .when_action(RequisitionAction::SetStatus {
                raw: "BOGUS".to_string(),
                actor: user("bob"),
            })
            .then_state(|state| {
                assert_eq!(state.status(), Status::None);
                assert_eq!(state.department(), Department::None);
            })
            .then_events(|events| {
                assert!(matches!(
                    &events[0],
                    RequisitionEvent::StatusSet { requested, status: Status::None, .. } if requested == "BOGUS"
                ));
            })
            .run();
    }

    #[test]
    fn lower_case_status_is_normalized() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(false))
            .when_action(RequisitionAction::SetStatus {
                raw: "awaiting_purchase".to_string(),
                actor: user("pat"),
            })
            .then_state(|state| assert_eq!(state.department(), Department::Purchasing))
            .run();
    }

    #[test]
    fn replace_items_swaps_awaiting_lines() {
        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(requisition(false))
            .when_action(RequisitionAction::ReplaceItems {
                items: vec![
                    LineItem::new(ComponentId::new("C2"), qty(1)),
                    LineItem::new(ComponentId::new("C3"), qty(4)),
                ],
                actor: user("alice"),
            })
            .then_state(|state| {
                let ids: Vec<_> = state.items().iter().map(|i| i.id.as_str()).collect();
                assert_eq!(ids, ["C2", "C3"]);
            })
            .then_events(|events| {
                assert!(matches!(events[0], RequisitionEvent::ItemsReplaced { count: 2, .. }));
            })
            .run();
    }

    #[test]
    fn completed_requisition_rejects_further_actions() {
        let mut done = requisition(false);
        done.complete(&user("alice"), test_clock().now());

        ReducerTest::new(RequisitionReducer::new())
            .with_env(env())
            .given_state(done)
            .when_action(RequisitionAction::Approve { actor: user("bob") })
            .then_state(|state| {
                assert!(state.is_completed());
                assert_eq!(state.status(), Status::None);
                assert_eq!(state.approved_by(), None);
            })
            .then_error(|error| assert!(matches!(error, LifecycleError::AlreadyCompleted(_))))
            .run();
    }

    #[test]
    fn action_names_and_actors() {
        let action = RequisitionAction::Decline { actor: user("eve") };
        assert_eq!(action.name(), "decline");
        assert_eq!(action.actor(), &user("eve"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = RequisitionEvent::BecameAvailable { at: test_clock().now() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "becameAvailable");
    }
}
