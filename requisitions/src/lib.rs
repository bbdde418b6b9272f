//! Requisitions: the stores request lifecycle.
//!
//! A requisition is a request for components raised by an engineer. It moves
//! through approval, purchasing and warehouse receipt until it is completed:
//!
//! ```text
//! NONE ─submit─▶ AWAITING_APPROVAL ─approve─▶ APPROVED ─await-purchase─▶ AWAITING_PURCHASE
//!                       │                         │                             │
//!                    decline                    order                         order
//!                       ▼                         ▼                             ▼
//!                   DECLINED          ORDERED (AVAILABLE for stock) ◀───────────┘
//!                                                 │
//!                                    receive (last awaiting item)
//!                                                 ▼
//!                                             AVAILABLE ─complete─▶ NONE, completed
//! ```
//!
//! The department that owns a requisition is a pure function of its status
//! and whether it is a stock item (see [`Department::for_status`]).
//! Receipts may arrive piecemeal: each partial receipt reduces the awaiting
//! quantity and adds to the received quantity, so their sum stays constant.
//!
//! # Layers
//!
//! - [`types`] and [`requisition`]: the aggregate and its invariants
//! - [`reducer`]: lifecycle actions as a pure [`Reducer`](stores_core::reducer::Reducer)
//! - [`validation`]: building requisitions from loosely typed input
//! - [`service`]: load, reduce and save against a
//!   [`DocumentStore`](stores_core::document_store::DocumentStore)
//! - [`api`]: the axum HTTP surface
//! - [`config`]: environment configuration for the server binary

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod reducer;
pub mod requisition;
pub mod service;
pub mod types;
pub mod validation;

pub use config::Config;
pub use reducer::{RequisitionAction, RequisitionEnvironment, RequisitionEvent, RequisitionReducer};
pub use requisition::{LifecycleError, ReceiptOutcome, ReceivedLine, Requisition};
pub use service::{RequisitionQuery, RequisitionService, ServiceError};
pub use types::{ComponentId, Department, LineItem, LineItems, Quantity, RequisitionId, Status, UserId};
pub use validation::{NewRequisition, ValidationError};
