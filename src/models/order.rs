//! Order model: a transactional record tying a listing to its two parties.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Which collection the referenced listing lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Luggage,
    Container,
}

/// An order placed against a listing. Immutable once created; creation
/// bumps the listing's sales counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Order {
    pub id: String,
    pub listing_id: String,
    pub listing_kind: ListingKind,
    pub buyer_id: String,
    pub seller_id: String,
    /// Kilograms for luggage listings, cubic meters for containers
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub created_at: String,
}
