// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod account;
pub mod conversation;
pub mod listing;
pub mod order;
pub mod review;

pub use account::{Account, AccountSummary, AccountView};
pub use conversation::{Conversation, Message, Party};
pub use listing::{ContainerListing, ContainerType, Listing, TaxClearance};
pub use order::{ListingKind, Order};
pub use review::Review;
