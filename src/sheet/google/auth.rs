// Service account authentication for the Google APIs
//
// A signed RS256 JWT is exchanged at the key's token URI for a bearer token
// (the OAuth2 JWT bearer grant). Tokens live an hour, which covers a run.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::config::SpreadsheetConfig;
use crate::error::RatesError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
// urn:ietf:params:oauth:grant-type:jwt-bearer, form-encoded
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// The fields of a service account key file that signing needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, RatesError> {
        serde_json::from_str(json)
            .map_err(|e| RatesError::Credential(format!("malformed service account JSON: {}", e)))
    }

    /// Read the key from the configured environment variable, else the key file
    pub fn load(config: &SpreadsheetConfig) -> Result<Self, RatesError> {
        if let Ok(json) = std::env::var(&config.credentials_env) {
            if !json.trim().is_empty() {
                debug!("Using credentials from ${}", config.credentials_env);
                return Self::from_json(&json);
            }
        }

        match &config.credentials_file {
            Some(path) => Self::from_file(path),
            None => Err(RatesError::Credential(format!(
                "set ${} or spreadsheet.credentials_file",
                config.credentials_env
            ))),
        }
    }

    fn from_file(path: &Path) -> Result<Self, RatesError> {
        debug!("Using credentials from {}", path.display());
        let json = std::fs::read_to_string(path).map_err(|e| {
            RatesError::Credential(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Signed assertion for the JWT bearer grant
    pub fn signed_assertion(&self, scopes: &[&str], now: i64) -> Result<String, RatesError> {
        let claims = Claims {
            iss: &self.client_email,
            scope: scopes.join(" "),
            aud: &self.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| RatesError::Credential(format!("invalid private key: {}", e)))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| RatesError::Credential(format!("failed to sign token request: {}", e)))
    }
}

/// Exchange the service account key for a bearer token
pub async fn fetch_access_token(client: &Client, key: &ServiceAccountKey) -> Result<String> {
    info!("Authenticating as {}", key.client_email);

    let assertion = key.signed_assertion(SCOPES, Utc::now().timestamp())?;
    // The assertion is base64url segments joined by dots, safe in a form body
    let body = format!("grant_type={}&assertion={}", JWT_BEARER_GRANT, assertion);

    let response = client
        .post(&key.token_uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .context("Failed to send token request")?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(RatesError::Credential(format!(
            "token endpoint returned {}: {}",
            status, detail
        ))
        .into());
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;
    debug!("Access token valid for {:?}s", token.expires_in);
    Ok(token.access_token)
}
