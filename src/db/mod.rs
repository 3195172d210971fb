//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    /// Uniqueness claims for handles (doc id = urlencoded handle)
    pub const HANDLES: &str = "handles";
    /// Uniqueness claims for emails (doc id = urlencoded email)
    pub const EMAILS: &str = "emails";
    pub const LISTINGS: &str = "listings";
    pub const CONTAINER_LISTINGS: &str = "container_listings";
    pub const CONVERSATIONS: &str = "conversations";
    pub const MESSAGES: &str = "messages";
    pub const ORDERS: &str = "orders";
    pub const REVIEWS: &str = "reviews";
}
