use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// 距离过期不足该秒数时提前刷新
const REFRESH_MARGIN_SECS: i64 = 60;

/// Anything that can hand out a bearer token for the Google APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// 服务账号密钥文件（credentials.json）中用到的字段
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Configuration(format!(
                "Google API credentials not found at: {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(raw)?;
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "Service account key is missing client_email or private_key".to_string(),
            ));
        }
        Ok(key)
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// 服务账号 JWT 换取访问令牌，并在进程内缓存
#[derive(Clone)]
pub struct GoogleAuth {
    client_email: String,
    private_key_id: Option<String>,
    encoding_key: Arc<EncodingKey>,
    token_uri: String,
    scopes: String,
    http_client: Client,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl GoogleAuth {
    pub fn new(key: ServiceAccountKey, http_client: Client, token_uri_override: Option<String>) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let token_uri = token_uri_override.unwrap_or(key.token_uri);

        info!("Google service account loaded: {}", key.client_email);

        Ok(Self {
            client_email: key.client_email,
            private_key_id: key.private_key_id,
            encoding_key: Arc::new(encoding_key),
            token_uri,
            scopes: SCOPES.join(" "),
            http_client,
            cache: Arc::new(RwLock::new(None)),
        })
    }

    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.clone(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        debug!("Requesting Google access token from {}", self.token_uri);

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach Google token endpoint: {}", e);
                AppError::external(format!("Failed to reach Google token endpoint: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(api_error("Token exchange", response).await);
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            AppError::external("Invalid response from Google token endpoint")
        })?;

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenSource for GoogleAuth {
    async fn access_token(&self) -> Result<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(Utc::now()) {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // 等待写锁期间可能已被其他请求刷新
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        debug!("Google access token refreshed, expires at {}", fresh.expires_at);
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoogleErrorDetail {
    Structured { message: String },
    // token 端点返回 {"error": "invalid_grant", "error_description": ...}
    Code(String),
}

/// Turns a non-2xx Google response into an `ExternalService` error carrying
/// the API's own message when it sent one.
pub(crate) async fn api_error(operation: &str, response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = match serde_json::from_str::<GoogleErrorBody>(&body) {
        Ok(GoogleErrorBody { error: GoogleErrorDetail::Structured { message } }) => message,
        Ok(GoogleErrorBody { error: GoogleErrorDetail::Code(code) }) => code,
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.chars().take(200).collect(),
    };

    error!("{} failed with status {}: {}", operation, status, detail);
    AppError::external(format!("{} failed ({}): {}", operation, status.as_u16(), detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_requires_email_and_private_key() {
        let err = ServiceAccountKey::from_json(r#"{"client_email": "", "private_key": "x"}"#);
        assert!(matches!(err, Err(AppError::Configuration(_))));

        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "bot@project.iam.gserviceaccount.com", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(key.private_key_id.is_none());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "bot@example.com", "private_key": "SUPER-SECRET"}"#,
        )
        .unwrap();
        let printed = format!("{:?}", key);
        assert!(!printed.contains("SUPER-SECRET"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_missing_credentials_file() {
        let err = ServiceAccountKey::from_file("/definitely/not/here/credentials.json").unwrap_err();
        assert!(err.to_string().contains("credentials not found"));
    }

    #[test]
    fn test_cached_token_freshness_margin() {
        let now = Utc::now();
        let token = CachedToken {
            token: "t".to_string(),
            expires_at: now + Duration::seconds(REFRESH_MARGIN_SECS + 5),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(10)));
    }
}
