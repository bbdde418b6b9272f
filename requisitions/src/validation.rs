//! Construction of requisitions from request input.
//!
//! Requests carry loosely typed data: optional fields, quantities that may
//! be numbers or strings, and an items list that older clients send as a
//! JSON-encoded string. Everything is checked here before a [`Requisition`]
//! exists. Bad line items are collected and reported instead of failing the
//! whole request.

use crate::requisition::Requisition;
use crate::types::{ComponentId, LineItem, Quantity, QuantityError, RequisitionId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stores_core::environment::Clock;
use thiserror::Error;

/// Why a single line item was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemError {
    /// Neither an id nor both a name and a description
    #[error("item needs an id, or both a name and a description")]
    MissingIdentity,
    /// No quantity given
    #[error("item has no quantity")]
    MissingQuantity,
    /// Quantity given but unusable
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
    /// Entry is not an item object at all
    #[error("malformed item: {0}")]
    Malformed(String),
}

impl From<QuantityError> for LineItemError {
    fn from(error: QuantityError) -> Self {
        Self::InvalidQuantity(error.to_string())
    }
}

/// Request-level validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank
    #[error("{0} is required")]
    MissingField(&'static str),
    /// The items field could not be decoded
    #[error("items could not be read: {0}")]
    MalformedItems(String),
    /// Not a single usable item was supplied
    #[error("none of the {} supplied items are valid", rejected.len())]
    AllItemsRejected {
        /// Every item, with the reason it was refused
        rejected: Vec<RejectedItem>,
    },
    /// A field holds a value outside its allowed set
    #[error("invalid {field}: {message}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong
        message: String,
    },
}

/// An input item that was left out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedItem {
    /// The entry exactly as received
    pub item: Value,
    /// Why it was refused
    pub error: LineItemError,
}

/// Raw line item as sent by clients.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct RawLineItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

fn present(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl RawLineItem {
    /// Checks the item and converts it into a [`LineItem`].
    ///
    /// An id identifies a catalogued component. Without one, the item must
    /// carry both a name and a description and gets an ad hoc id.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: identity, then quantity.
    pub fn validate(&self) -> Result<LineItem, LineItemError> {
        let name = present(self.name.as_ref());
        let description = present(self.description.as_ref());

        let id = match (present(self.id.as_ref()), name, description) {
            (Some(id), _, _) => ComponentId::new(id),
            (None, Some(name), Some(_)) => ComponentId::ad_hoc(name),
            _ => return Err(LineItemError::MissingIdentity),
        };

        let quantity = match &self.quantity {
            None | Some(Value::Null) => return Err(LineItemError::MissingQuantity),
            Some(Value::String(s)) if s.trim().is_empty() => return Err(LineItemError::MissingQuantity),
            Some(value) => Quantity::parse(value)?,
        };

        Ok(LineItem::new(id, quantity).described(
            name.unwrap_or_default(),
            present(self.item_type.as_ref()).unwrap_or_default(),
            description.unwrap_or_default(),
        ))
    }
}

/// Items as sent by clients: a JSON array, or the same array encoded as a
/// JSON string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ItemsField {
    /// `"items": [ ... ]`
    List(Vec<Value>),
    /// `"items": "[ ... ]"`
    Encoded(String),
}

impl ItemsField {
    /// Decodes the field into its raw entries.
    ///
    /// A blank encoded string is an empty list.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MalformedItems`] if the encoded string is not a
    /// JSON array.
    pub fn into_entries(self) -> Result<Vec<Value>, ValidationError> {
        match self {
            Self::List(entries) => Ok(entries),
            Self::Encoded(text) if text.trim().is_empty() => Ok(Vec::new()),
            Self::Encoded(text) => {
                serde_json::from_str(&text).map_err(|e| ValidationError::MalformedItems(e.to_string()))
            },
        }
    }
}

impl From<Vec<Value>> for ItemsField {
    fn from(entries: Vec<Value>) -> Self {
        Self::List(entries)
    }
}

/// Valid items and the entries that were refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckedItems {
    /// Items that passed validation, in input order
    pub accepted: Vec<LineItem>,
    /// Items that did not
    pub rejected: Vec<RejectedItem>,
}

/// Validates every entry independently.
#[must_use]
pub fn check_items(entries: Vec<Value>) -> CheckedItems {
    let mut checked = CheckedItems::default();

    for entry in entries {
        let outcome = serde_json::from_value::<RawLineItem>(entry.clone())
            .map_err(|e| LineItemError::Malformed(e.to_string()))
            .and_then(|raw| raw.validate());

        match outcome {
            Ok(item) => checked.accepted.push(item),
            Err(error) => {
                tracing::debug!(%error, item = %entry, "Line item rejected");
                checked.rejected.push(RejectedItem { item: entry, error });
            },
        }
    }

    checked
}

/// Input for creating a requisition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequisition {
    /// Id to store under; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    /// User raising the requisition (required)
    #[serde(default)]
    pub requestee: Option<String>,
    /// Whether the items come from stock
    #[serde(default)]
    pub is_stock_item: bool,
    /// Requested items
    #[serde(default)]
    pub items: Option<ItemsField>,
}

/// A freshly built requisition and the items left out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Built {
    /// The new requisition (status `NONE`, not yet stored)
    pub requisition: Requisition,
    /// Items refused during construction
    pub rejected: Vec<RejectedItem>,
}

impl Built {
    /// Whether some items were refused
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Builds a requisition from request input.
///
/// Invalid line items do not stop construction; they are returned in
/// [`Built::rejected`].
///
/// # Errors
///
/// - [`ValidationError::MissingField`] when `requestee` is absent or blank
/// - [`ValidationError::MalformedItems`] when the items string is not JSON
pub fn build_requisition(input: NewRequisition, clock: &dyn Clock) -> Result<Built, ValidationError> {
    let requestee: UserId = input
        .requestee
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ValidationError::MissingField("requestee"))?;

    let id = match input.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => RequisitionId::new(id),
        _ => RequisitionId::generate(),
    };

    let entries = input.items.map(ItemsField::into_entries).transpose()?.unwrap_or_default();
    let CheckedItems { accepted, rejected } = check_items(entries);

    let requisition = Requisition::new(id, requestee, input.is_stock_item, clock.now()).with_items(accepted);

    Ok(Built { requisition, rejected })
}
