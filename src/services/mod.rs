// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod media;
pub mod password;
pub mod reconcile;

pub use identity::{FirebaseAuthService, IdentityError, VerifiedIdentity};
pub use media::MediaService;
pub use reconcile::{ProfileSync, ReconcileOutcome, ReconcileService};
