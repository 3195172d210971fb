//! Account model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Sentinel country value for accounts that have not picked one yet.
pub const COUNTRY_NOT_SPECIFIED: &str = "Not specified";

/// Separator used when synthesizing placeholder handles. A handle containing
/// this marker is by definition machine-generated, so the profile is not
/// complete until the user replaces it.
pub const GENERATED_HANDLE_SEPARATOR: char = '_';

/// Number of external-id characters mixed into a synthesized handle.
const SYNTHESIZED_UID_CHARS: usize = 6;

/// Account document stored in Firestore.
///
/// The document id is the local account id. Accounts created through
/// identity reconciliation use the Firebase uid as their id; legacy
/// password accounts use a generated UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Local account id (also the document id)
    pub id: String,
    /// Firebase uid; absent for legacy password accounts
    #[serde(default)]
    pub firebase_uid: Option<String>,
    /// Unique handle, always stored lowercased and trimmed
    pub handle: String,
    /// Unique email address
    pub email: String,
    /// PBKDF2 password hash; absent when the external identity is used
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Display image URL
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Country, or the "Not specified" sentinel
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Whether this account may post listings
    #[serde(default)]
    pub is_seller: bool,
    /// Aggregate rating numerator (sum of star ratings received)
    #[serde(default)]
    pub rating_sum: u32,
    /// Aggregate rating denominator (number of ratings received)
    #[serde(default)]
    pub rating_count: u32,
    /// Completed-trip counter, incremented when a listing is completed
    #[serde(default)]
    pub trips_completed: u32,
    pub created_at: String,
    pub updated_at: String,
}

fn default_country() -> String {
    COUNTRY_NOT_SPECIFIED.to_string()
}

impl Account {
    /// The one definition of profile completeness: a non-empty handle with
    /// no generated-separator marker, and a country the user actually chose.
    pub fn profile_complete(&self) -> bool {
        !self.handle.is_empty()
            && !self.handle.contains(GENERATED_HANDLE_SEPARATOR)
            && !self.country.is_empty()
            && self.country != COUNTRY_NOT_SPECIFIED
    }

    /// Owner-facing view of this account.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            handle: self.handle.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
            country: self.country.clone(),
            phone: self.phone.clone(),
            bio: self.bio.clone(),
            is_seller: self.is_seller,
            rating_sum: self.rating_sum,
            rating_count: self.rating_count,
            trips_completed: self.trips_completed,
            created_at: self.created_at.clone(),
        }
    }

    /// Public summary, safe to show to other users (no email/phone).
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            handle: self.handle.clone(),
            photo_url: self.photo_url.clone(),
            country: self.country.clone(),
            is_seller: self.is_seller,
            rating_sum: self.rating_sum,
            rating_count: self.rating_count,
            trips_completed: self.trips_completed,
        }
    }
}

/// Normalize a user-chosen handle for storage and uniqueness checks.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Base for a synthesized placeholder handle: the email local-part joined to
/// a fragment of the external id. Collision probing appends numeric suffixes
/// to this base.
pub fn synthesized_handle_base(email: &str, external_id: &str) -> String {
    let localpart = email.split('@').next().unwrap_or(email);
    let fragment: String = external_id
        .chars()
        .take(SYNTHESIZED_UID_CHARS)
        .collect();
    normalize_handle(&format!(
        "{}{}{}",
        localpart, GENERATED_HANDLE_SEPARATOR, fragment
    ))
}

/// Canonical owner-facing account shape at the API boundary. Response shape
/// never varies by code path; password hashes never leave the server.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccountView {
    pub id: String,
    pub handle: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub country: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub is_seller: bool,
    pub rating_sum: u32,
    pub rating_count: u32,
    pub trips_completed: u32,
    pub created_at: String,
}

/// Public account summary embedded in listings, reviews and conversations.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccountSummary {
    pub id: String,
    pub handle: String,
    pub photo_url: Option<String>,
    pub country: String,
    pub is_seller: bool,
    pub rating_sum: u32,
    pub rating_count: u32,
    pub trips_completed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(handle: &str, country: &str) -> Account {
        Account {
            id: "acc1".to_string(),
            firebase_uid: Some("acc1".to_string()),
            handle: handle.to_string(),
            email: "a@x.com".to_string(),
            password_hash: None,
            photo_url: None,
            country: country.to_string(),
            phone: None,
            bio: None,
            is_seller: false,
            rating_sum: 0,
            rating_count: 0,
            trips_completed: 0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_handle("  Alice "), "alice");
        assert_eq!(normalize_handle("BOB"), "bob");
        assert_eq!(normalize_handle("carol"), "carol");
    }

    #[test]
    fn profile_complete_requires_real_handle_and_country() {
        assert!(account("alice", "Kenya").profile_complete());
        assert!(!account("", "Kenya").profile_complete());
        assert!(!account("a_ext1", "Kenya").profile_complete());
        assert!(!account("alice", COUNTRY_NOT_SPECIFIED).profile_complete());
        assert!(!account("alice", "").profile_complete());
    }

    #[test]
    fn synthesized_handle_base_shape() {
        let base = synthesized_handle_base("a@x.com", "ext1abcdef");
        assert_eq!(base, "a_ext1ab");

        // Short external ids take what is available
        assert_eq!(synthesized_handle_base("a@x.com", "ext1"), "a_ext1");
    }

    #[test]
    fn synthesized_accounts_are_never_complete() {
        let base = synthesized_handle_base("trader@example.org", "uidABC123");
        assert!(!account(&base, "Kenya").profile_complete());
        assert!(!account(&base, COUNTRY_NOT_SPECIFIED).profile_complete());
    }

    #[test]
    fn summary_omits_contact_details() {
        let mut acc = account("alice", "Kenya");
        acc.phone = Some("+254700000000".to_string());
        let json = serde_json::to_value(acc.summary()).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("phone").is_none());
    }
}
