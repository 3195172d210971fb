// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation and message models.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Deterministic conversation document id for a (seller, buyer) pair.
///
/// The seller id always comes first, so both parties compute the same key
/// and find-or-create stays idempotent no matter who opens the thread.
pub fn conversation_key(seller_id: &str, buyer_id: &str) -> String {
    format!("{}_{}", seller_id, buyer_id)
}

/// Which side of a conversation an account is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Seller,
    Buyer,
}

impl Party {
    pub fn other(self) -> Party {
        match self {
            Party::Seller => Party::Buyer,
            Party::Buyer => Party::Seller,
        }
    }
}

/// A buyer/seller conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Conversation {
    /// Composite id, see [`conversation_key`]
    pub id: String,
    pub seller_id: String,
    pub buyer_id: String,
    /// Per-party read flags
    #[serde(default)]
    pub seller_read: bool,
    #[serde(default)]
    pub buyer_read: bool,
    /// Snippet of the most recent message
    #[serde(default)]
    pub last_message: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    pub fn new(seller_id: &str, buyer_id: &str, now: &str) -> Self {
        Self {
            id: conversation_key(seller_id, buyer_id),
            seller_id: seller_id.to_string(),
            buyer_id: buyer_id.to_string(),
            seller_read: false,
            buyer_read: false,
            last_message: String::new(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Which party the account is, if it participates at all.
    pub fn party_of(&self, account_id: &str) -> Option<Party> {
        if account_id == self.seller_id {
            Some(Party::Seller)
        } else if account_id == self.buyer_id {
            Some(Party::Buyer)
        } else {
            None
        }
    }

    pub fn set_read(&mut self, party: Party, read: bool) {
        match party {
            Party::Seller => self.seller_read = read,
            Party::Buyer => self.buyer_read = read,
        }
    }

    /// Record a new message: the author has read the thread, the other
    /// party has not, and the snippet and timestamp move forward.
    pub fn apply_message(&mut self, author: Party, snippet: &str, now: &str) {
        self.set_read(author, true);
        self.set_read(author.other(), false);
        self.last_message = snippet.to_string();
        self.updated_at = now.to_string();
    }
}

/// An immutable entry in a conversation's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_for_a_pair() {
        assert_eq!(conversation_key("s1", "b1"), "s1_b1");
        // Seller always first, regardless of which side queries
        assert_eq!(conversation_key("s1", "b1"), conversation_key("s1", "b1"));
        assert_ne!(conversation_key("s1", "b1"), conversation_key("b1", "s1"));
    }

    #[test]
    fn message_flips_the_other_partys_read_flag() {
        let mut conv = Conversation::new("s1", "b1", "2026-01-01T00:00:00Z");
        conv.seller_read = true;
        conv.buyer_read = true;

        conv.apply_message(Party::Buyer, "hello there", "2026-01-02T00:00:00Z");

        assert!(conv.buyer_read);
        assert!(!conv.seller_read);
        assert_eq!(conv.last_message, "hello there");
        assert_eq!(conv.updated_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn party_lookup() {
        let conv = Conversation::new("s1", "b1", "2026-01-01T00:00:00Z");
        assert_eq!(conv.party_of("s1"), Some(Party::Seller));
        assert_eq!(conv.party_of("b1"), Some(Party::Buyer));
        assert_eq!(conv.party_of("x9"), None);
    }
}
