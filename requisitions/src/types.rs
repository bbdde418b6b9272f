//! Core domain types for requisitions.
//!
//! Requisitions move through a fixed set of [`Status`] values; the owning
//! [`Department`] is always derived from the status and the stock-item flag.
//! Line items pair a component reference with a positive [`Quantity`] and
//! are kept in [`LineItems`], an insertion-ordered collection with at most
//! one entry per component id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an identifier from an empty or blank string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} cannot be empty")]
pub struct EmptyIdError {
    kind: &'static str,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "` without validation")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the inner string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the id, returning the inner string
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EmptyIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(EmptyIdError { kind: $kind });
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

string_id!(
    /// Unique identifier for a requisition
    RequisitionId,
    "Requisition ID"
);

string_id!(
    /// Identifier of a user acting on a requisition
    UserId,
    "User ID"
);

string_id!(
    /// Identifier of the component a line item refers to
    ComponentId,
    "Component ID"
);

impl RequisitionId {
    /// Generates a fresh random id (`req-<uuid>`)
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("req-{}", uuid::Uuid::new_v4()))
    }
}

impl From<RequisitionId> for stores_core::revision::DocumentId {
    fn from(id: RequisitionId) -> Self {
        Self::new(id.0)
    }
}

impl From<&RequisitionId> for stores_core::revision::DocumentId {
    fn from(id: &RequisitionId) -> Self {
        Self::new(id.0.clone())
    }
}

impl ComponentId {
    /// Id used for an item identified only by name and description.
    ///
    /// Ad hoc items with the same (case-insensitive) name share an id, so
    /// adding one twice replaces the earlier entry.
    #[must_use]
    pub fn ad_hoc(name: &str) -> Self {
        Self(format!("ad-hoc:{}", name.trim().to_lowercase()))
    }

    /// Whether this id was derived by [`ComponentId::ad_hoc`]
    #[must_use]
    pub fn is_ad_hoc(&self) -> bool {
        self.0.starts_with("ad-hoc:")
    }
}

/// Lifecycle status of a requisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Not in any workflow (new, or completed)
    #[default]
    None,
    /// Submitted, waiting for engineering sign-off
    AwaitingApproval,
    /// Approved for purchase or warehouse picking
    Approved,
    /// Turned down by engineering
    Declined,
    /// Waiting for purchasing to place the order
    AwaitingPurchase,
    /// Ordered from a supplier
    Ordered,
    /// Every item has been received
    Available,
    /// Finished
    Completed,
}

impl Status {
    /// Every status, in workflow order
    pub const ALL: [Self; 8] = [
        Self::None,
        Self::AwaitingApproval,
        Self::Approved,
        Self::Declined,
        Self::AwaitingPurchase,
        Self::Ordered,
        Self::Available,
        Self::Completed,
    ];

    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::AwaitingApproval => "AWAITING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::AwaitingPurchase => "AWAITING_PURCHASE",
            Self::Ordered => "ORDERED",
            Self::Available => "AVAILABLE",
            Self::Completed => "COMPLETED",
        }
    }

    /// Decodes a status, falling back to [`Status::None`] for unknown input.
    ///
    /// This is the legacy setter behavior. Prefer [`str::parse`] where an
    /// unknown status should be reported.
    ///
    /// ```
    /// use requisitions::types::Status;
    ///
    /// assert_eq!(Status::parse_lenient("ordered"), Status::Ordered);
    /// assert_eq!(Status::parse_lenient("BOGUS"), Status::None);
    /// ```
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a status name outside the fixed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Organizational owner of a requisition at its current status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    /// Nobody owns it
    #[default]
    None,
    /// Engineering (approval)
    Engineering,
    /// Purchasing (ordering)
    Purchasing,
    /// Warehouse (receipt and picking)
    Warehouse,
}

impl Department {
    /// Derives the department owning a requisition.
    ///
    /// Stock items are routed to the warehouse as soon as they are approved.
    #[must_use]
    pub const fn for_status(status: Status, is_stock_item: bool) -> Self {
        match status {
            Status::AwaitingApproval | Status::Declined => Self::Engineering,
            Status::Approved if is_stock_item => Self::Warehouse,
            Status::Approved | Status::AwaitingPurchase => Self::Purchasing,
            Status::Ordered | Status::Available => Self::Warehouse,
            Status::None | Status::Completed => Self::None,
        }
    }

    /// Wire name of the department
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Engineering => "ENGINEERING",
            Self::Purchasing => "PURCHASING",
            Self::Warehouse => "WAREHOUSE",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a department name outside the fixed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown department: {0}")]
pub struct UnknownDepartment(pub String);

impl FromStr for Department {
    type Err = UnknownDepartment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "ENGINEERING" => Ok(Self::Engineering),
            "PURCHASING" => Ok(Self::Purchasing),
            "WAREHOUSE" => Ok(Self::Warehouse),
            _ => Err(UnknownDepartment(s.to_string())),
        }
    }
}

/// Reasons a quantity is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative
    #[error("quantity must be at least 1, got {0}")]
    NotPositive(String),
    /// Not a whole number, or not a number at all
    #[error("quantity must be a whole number, got {0}")]
    NotInteger(String),
    /// Larger than the supported maximum
    #[error("quantity {0} is too large")]
    TooLarge(String),
}

/// Number of units on a line item (always at least 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Smallest valid quantity
    pub const ONE: Self = Self(1);

    /// Creates a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for zero.
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::NotPositive(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Returns the number of units
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Adds two quantities, `None` on overflow
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtracts `other`, `None` unless something is left over
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).filter(|left| *left > 0).map(Self)
    }

    /// Parses a quantity from loosely typed request input.
    ///
    /// Accepts integers, floats with no fractional part, and strings holding
    /// either. Everything else is rejected rather than clamped.
    ///
    /// ```
    /// use requisitions::types::Quantity;
    /// use serde_json::json;
    ///
    /// assert_eq!(Quantity::parse(&json!(3)).map(Quantity::get), Ok(3));
    /// assert_eq!(Quantity::parse(&json!("4")).map(Quantity::get), Ok(4));
    /// assert!(Quantity::parse(&json!(2.5)).is_err());
    /// assert!(Quantity::parse(&json!(0)).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`QuantityError`] describing why the value is unusable.
    pub fn parse(value: &Value) -> Result<Self, QuantityError> {
        match value {
            Value::Number(number) => {
                if let Some(n) = number.as_i64() {
                    return Self::from_i64(n);
                }
                if let Some(n) = number.as_u64() {
                    return u32::try_from(n)
                        .map_err(|_| QuantityError::TooLarge(n.to_string()))
                        .and_then(Self::new);
                }
                number
                    .as_f64()
                    .map_or_else(|| Err(QuantityError::NotInteger(number.to_string())), Self::from_f64)
            },
            Value::String(text) => {
                let trimmed = text.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Self::from_i64(n);
                }
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => Self::from_f64(n),
                    _ => Err(QuantityError::NotInteger(text.clone())),
                }
            },
            other => Err(QuantityError::NotInteger(other.to_string())),
        }
    }

    fn from_i64(n: i64) -> Result<Self, QuantityError> {
        if n < 1 {
            return Err(QuantityError::NotPositive(n.to_string()));
        }
        u32::try_from(n)
            .map_err(|_| QuantityError::TooLarge(n.to_string()))
            .and_then(Self::new)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)] // checked integral and in range first
    fn from_f64(n: f64) -> Result<Self, QuantityError> {
        if n.fract() != 0.0 {
            return Err(QuantityError::NotInteger(n.to_string()));
        }
        if n < 1.0 {
            return Err(QuantityError::NotPositive(n.to_string()));
        }
        if n > f64::from(u32::MAX) {
            return Err(QuantityError::TooLarge(n.to_string()));
        }
        Self::new(n as u32)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component reference with a quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Component the line refers to
    pub id: ComponentId,
    /// Component name
    #[serde(default)]
    pub name: String,
    /// Component type
    #[serde(rename = "type", default)]
    pub item_type: String,
    /// Component description
    #[serde(default)]
    pub description: String,
    /// Number of units
    pub quantity: Quantity,
}

impl LineItem {
    /// Creates a line item with no descriptive fields
    #[must_use]
    pub fn new(id: ComponentId, quantity: Quantity) -> Self {
        Self {
            id,
            name: String::new(),
            item_type: String::new(),
            description: String::new(),
            quantity,
        }
    }

    /// Sets the descriptive fields
    #[must_use]
    pub fn described(
        mut self,
        name: impl Into<String>,
        item_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.name = name.into();
        self.item_type = item_type.into();
        self.description = description.into();
        self
    }

    /// Same line with a different quantity
    #[must_use]
    pub fn with_quantity(&self, quantity: Quantity) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

/// Ordered line items with at most one entry per component id.
///
/// Adding an item whose id is already present removes the old entry and
/// appends the new one, so the most recently written line is always last.
///
/// ```
/// use requisitions::types::{ComponentId, LineItem, LineItems, Quantity};
///
/// let mut items = LineItems::new();
/// items.upsert(LineItem::new(ComponentId::new("C1"), Quantity::ONE));
/// items.upsert(LineItem::new(ComponentId::new("C2"), Quantity::ONE));
/// items.upsert(LineItem::new(ComponentId::new("C1"), Quantity::new(4).unwrap()));
///
/// let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
/// assert_eq!(ids, ["C2", "C1"]);
/// assert_eq!(items.total_quantity(), 5);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineItems(Vec<LineItem>);

impl LineItems {
    /// Creates an empty collection
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts `item`, replacing any existing entry with the same id.
    ///
    /// Returns the replaced entry.
    pub fn upsert(&mut self, item: LineItem) -> Option<LineItem> {
        let previous = self.remove(&item.id);
        self.0.push(item);
        previous
    }

    /// Removes the entry with `id`; a missing id is a no-op.
    pub fn remove(&mut self, id: &ComponentId) -> Option<LineItem> {
        let index = self.0.iter().position(|item| item.id == *id)?;
        Some(self.0.remove(index))
    }

    /// Looks up an entry by id
    #[must_use]
    pub fn get(&self, id: &ComponentId) -> Option<&LineItem> {
        self.0.iter().find(|item| item.id == *id)
    }

    /// Iterates in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.0.iter()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all quantities
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.0.iter().map(|item| u64::from(item.quantity.get())).sum()
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<LineItem> for LineItems {
    fn from_iter<I: IntoIterator<Item = LineItem>>(iter: I) -> Self {
        let mut items = Self::new();
        items.extend(iter);
        items
    }
}

impl Extend<LineItem> for LineItems {
    fn extend<I: IntoIterator<Item = LineItem>>(&mut self, iter: I) {
        for item in iter {
            self.upsert(item);
        }
    }
}

impl<'a> IntoIterator for &'a LineItems {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for LineItems {
    type Item = LineItem;
    type IntoIter = std::vec::IntoIter<LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// Stored documents are trusted to be well-formed, but duplicates are still
// collapsed so the uniqueness guarantee survives a hand-edited record.
impl<'de> Deserialize<'de> for LineItems {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Vec::<LineItem>::deserialize(deserializer).map(Self::from_iter)
    }
}
