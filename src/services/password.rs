// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing for legacy direct registration.
//!
//! PBKDF2-HMAC-SHA256 with a per-password random salt, stored as
//! `iterations$salt_hex$hash_hex`. Accounts created through the external
//! identity provider carry no hash at all.

use crate::error::AppError;
use anyhow::anyhow;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let iterations =
        NonZeroU32::new(ITERATIONS).expect("PBKDF2 iteration count must be non-zero");

    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| AppError::Internal(anyhow!("Failed to generate password salt")))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok(format!(
        "{}${}${}",
        ITERATIONS,
        hex::encode(salt),
        hex::encode(hash)
    ))
}

/// Verify a password against a stored hash in constant time.
///
/// Any malformed stored value simply fails verification.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.splitn(3, '$').collect();
    if parts.len() != 3 {
        return false;
    }

    let Some(iterations) = parts[0].parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let Ok(salt) = hex::decode(parts[1]) else {
        return false;
    };
    let Ok(expected) = hex::decode(parts[2]) else {
        return false;
    };

    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &expected,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_values_fail_closed() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "not-a-hash"));
        assert!(!verify_password("x", "0$aa$bb"));
        assert!(!verify_password("x", "100000$zz$zz"));
    }
}
