//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and cached in memory. On Cloud Run the
//! secret bindings inject them as environment variables, so there is no
//! separate Secret Manager code path.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS and redirects
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Firebase project ID (token issuer/audience; usually equals the GCP project)
    pub firebase_project_id: String,
    /// Cloudinary cloud name for profile photo uploads
    pub media_cloud_name: String,
    /// Cloudinary unsigned upload preset
    pub media_upload_preset: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Firebase Web API key (Identity Toolkit REST calls)
    pub firebase_api_key: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gcp_project_id =
            env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string());

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .unwrap_or_else(|_| gcp_project_id.clone()),
            gcp_project_id,
            media_cloud_name: env::var("MEDIA_CLOUD_NAME")
                .map_err(|_| ConfigError::Missing("MEDIA_CLOUD_NAME"))?,
            media_upload_preset: env::var("MEDIA_UPLOAD_PRESET")
                .map_err(|_| ConfigError::Missing("MEDIA_UPLOAD_PRESET"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Fixed configuration for tests; never reads the environment.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            firebase_project_id: "test-project".to_string(),
            media_cloud_name: "test-cloud".to_string(),
            media_upload_preset: "test-preset".to_string(),
            port: 8080,
            firebase_api_key: "test_api_key".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("FIREBASE_API_KEY", "test_key");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("MEDIA_CLOUD_NAME", "demo");
        env::set_var("MEDIA_UPLOAD_PRESET", "unsigned_profile");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.firebase_api_key, "test_key");
        assert_eq!(config.media_cloud_name, "demo");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_firebase_project_defaults_to_gcp_project() {
        let config = Config::test_default();
        assert_eq!(config.firebase_project_id, config.gcp_project_id);
    }
}
