//! Review model: reputational record from a reviewer to a seller.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Deterministic review document id. Keying by the pair enforces at most
/// one review per (reviewer, seller) at the storage layer.
pub fn review_key(reviewer_id: &str, seller_id: &str) -> String {
    format!("{}_{}", reviewer_id, seller_id)
}

/// A review of a seller. Creating one pushes a rating increment onto the
/// seller's aggregate fields in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Review {
    pub id: String,
    pub reviewer_id: String,
    pub seller_id: String,
    /// The listing this review refers to, when given
    #[serde(default)]
    pub listing_id: Option<String>,
    /// Star rating, 1 to 5
    pub rating: u8,
    pub comment: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_review_per_pair_key() {
        assert_eq!(review_key("r1", "s1"), "r1_s1");
        // Direction matters: a seller reviewing back is a different record
        assert_ne!(review_key("r1", "s1"), review_key("s1", "r1"));
    }
}
