// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listing models: luggage-capacity and container-capacity offers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A luggage-capacity offer posted by a traveler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Listing {
    /// Document id
    pub id: String,
    /// Owning account id; only the owner may mutate or delete
    pub owner_id: String,
    pub origin: String,
    pub destination: String,
    /// Spare capacity on offer (kilograms)
    pub capacity_kg: f64,
    pub price_per_kg: f64,
    /// Expected delivery window in days
    pub delivery_days: u32,
    /// Expiration horizon in days from creation
    pub expires_in_days: u32,
    /// One-way completion flag
    #[serde(default)]
    pub completed: bool,
    /// Account ids that expressed interest (toggled set membership)
    #[serde(default)]
    pub interested: Vec<String>,
    #[serde(default)]
    pub sales_count: u32,
    #[serde(default)]
    pub rating_sum: u32,
    #[serde(default)]
    pub rating_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// A container-capacity offer tied to a sailing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ContainerListing {
    pub id: String,
    pub owner_id: String,
    pub origin_port: String,
    pub destination_port: String,
    /// Spare capacity on offer (cubic meters)
    pub capacity_cbm: f64,
    pub price_per_cbm: f64,
    pub container_type: ContainerType,
    pub tax_clearance: TaxClearance,
    /// Departure date (RFC3339); arrival must be strictly later
    pub departure_date: String,
    pub arrival_date: String,
    pub expires_in_days: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub interested: Vec<String>,
    #[serde(default)]
    pub sales_count: u32,
    #[serde(default)]
    pub rating_sum: u32,
    #[serde(default)]
    pub rating_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Shipping container categories accepted on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    DryVan20,
    DryVan40,
    HighCube40,
    Reefer20,
    Reefer40,
}

/// Who handles customs clearance for a container shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum TaxClearance {
    Included,
    BuyerHandled,
}

/// Whether a listing's expiration horizon has passed.
///
/// Completion is gated on this: a listing can only be marked completed once
/// `created_at + expires_in_days` is in the past. An unparseable creation
/// timestamp keeps the gate closed.
pub fn expiration_passed(created_at: &str, expires_in_days: u32, now: DateTime<Utc>) -> bool {
    let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
        return false;
    };
    let deadline = created.with_timezone(&Utc) + Duration::days(i64::from(expires_in_days));
    now >= deadline
}

/// Check that arrival is strictly after departure. Unparseable dates fail.
pub fn dates_ordered(departure: &str, arrival: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(departure),
        DateTime::parse_from_rfc3339(arrival),
    ) {
        (Ok(dep), Ok(arr)) => arr > dep,
        _ => false,
    }
}

impl Listing {
    pub fn expiration_passed(&self, now: DateTime<Utc>) -> bool {
        expiration_passed(&self.created_at, self.expires_in_days, now)
    }
}

impl ContainerListing {
    pub fn expiration_passed(&self, now: DateTime<Utc>) -> bool {
        expiration_passed(&self.created_at, self.expires_in_days, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiration_gate_opens_at_deadline() {
        let created = "2026-01-01T12:00:00Z";
        let before = Utc.with_ymd_and_hms(2026, 1, 8, 11, 59, 59).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 8, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        assert!(!expiration_passed(created, 7, before));
        assert!(expiration_passed(created, 7, at));
        assert!(expiration_passed(created, 7, after));
    }

    #[test]
    fn expiration_gate_closed_for_bad_timestamp() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert!(!expiration_passed("not-a-date", 0, now));
    }

    #[test]
    fn arrival_must_follow_departure() {
        assert!(dates_ordered(
            "2026-03-01T00:00:00Z",
            "2026-03-20T00:00:00Z"
        ));
        assert!(!dates_ordered(
            "2026-03-20T00:00:00Z",
            "2026-03-01T00:00:00Z"
        ));
        // Equal dates are not strictly ordered
        assert!(!dates_ordered(
            "2026-03-01T00:00:00Z",
            "2026-03-01T00:00:00Z"
        ));
        assert!(!dates_ordered("garbage", "2026-03-01T00:00:00Z"));
    }

    #[test]
    fn container_type_uses_snake_case_wire_names() {
        let json = serde_json::to_string(&ContainerType::HighCube40).unwrap();
        assert_eq!(json, "\"high_cube40\"");
        let parsed: TaxClearance = serde_json::from_str("\"buyer_handled\"").unwrap();
        assert_eq!(parsed, TaxClearance::BuyerHandled);
    }
}
