// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted media store client (Cloudinary).
//!
//! Only one operation matters to the core: copying a profile photo from the
//! identity provider's CDN into our own media store. The copy is best-effort;
//! a failure falls back to the original URL and never fails the caller.

use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Hosts that belong to the identity provider's CDN. Photos served from
/// these are worth copying so we do not depend on Google's URLs staying
/// stable.
const PROVIDER_PHOTO_HOSTS: &[&str] = &[
    "googleusercontent.com",
    "firebasestorage.googleapis.com",
];

/// Media store client for image uploads.
#[derive(Clone)]
pub struct MediaService {
    http: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl MediaService {
    pub fn new(cloud_name: String, upload_preset: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cloud_name,
            upload_preset,
            enabled: true,
        }
    }

    /// Disabled client for tests: migrations return the original URL.
    pub fn new_disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            cloud_name: String::new(),
            upload_preset: String::new(),
            enabled: false,
        }
    }

    /// Whether a URL points at the identity provider's CDN.
    pub fn is_provider_hosted(url: &str) -> bool {
        PROVIDER_PHOTO_HOSTS.iter().any(|host| url.contains(host))
    }

    /// Upload a remote image by URL, returning the hosted HTTPS URL.
    pub async fn upload_remote_image(&self, source_url: &str) -> Result<String, AppError> {
        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );

        let response = self
            .http
            .post(&url)
            .form(&[
                ("file", source_url),
                ("upload_preset", self.upload_preset.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Media upload request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Media upload returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Media upload response invalid: {e}")))?;

        Ok(uploaded.secure_url)
    }

    /// Copy a provider-hosted profile photo into our media store.
    ///
    /// Best-effort: any failure logs a warning and returns the original URL
    /// unchanged, so photo migration can never fail reconciliation.
    pub async fn migrate_profile_photo(&self, original_url: &str) -> String {
        if !self.enabled || !Self::is_provider_hosted(original_url) {
            return original_url.to_string();
        }

        match self.upload_remote_image(original_url).await {
            Ok(hosted_url) => {
                tracing::info!(hosted_url = %hosted_url, "Profile photo migrated to media store");
                hosted_url
            }
            Err(e) => {
                tracing::warn!(error = %e, "Profile photo migration failed, keeping original URL");
                original_url.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_host_detection() {
        assert!(MediaService::is_provider_hosted(
            "https://lh3.googleusercontent.com/a/photo.jpg"
        ));
        assert!(MediaService::is_provider_hosted(
            "https://firebasestorage.googleapis.com/v0/b/app/o/pic.png"
        ));
        assert!(!MediaService::is_provider_hosted(
            "https://res.cloudinary.com/demo/image/upload/pic.png"
        ));
        assert!(!MediaService::is_provider_hosted(""));
    }

    #[tokio::test]
    async fn disabled_client_keeps_original_url() {
        let media = MediaService::new_disabled();
        let url = "https://lh3.googleusercontent.com/a/photo.jpg";
        assert_eq!(media.migrate_profile_photo(url).await, url);
    }
}
