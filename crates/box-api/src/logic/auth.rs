//! Enterprise access tokens
//!
//! Box JWT server authentication: sign a short-lived RS256 assertion with the
//! app's private key and exchange it for an enterprise access token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use tokio::sync::Mutex;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::config::BoxAppConfig;
use crate::logic::client::BoxClientError;

/// Token endpoint, also the required `aud` of every assertion
pub const BOX_TOKEN_URL: &str = "https://api.box.com/oauth2/token";

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ENTERPRISE_SUB_TYPE: &str = "enterprise";
const ASSERTION_LIFETIME_SECS: i64 = 45;
/// Cached tokens are refreshed this long before Box expires them
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub box_sub_type: String,
    pub aud: String,
    pub jti: String,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    access_token: String,
    refresh_at: DateTime<Utc>,
}

/// Parse the app's private key, decrypting it first when it is an
/// `ENCRYPTED PRIVATE KEY`.
pub fn load_encoding_key(
    private_key_pem: &str,
    passphrase: Option<&str>,
) -> Result<EncodingKey, CommonError> {
    let pem = private_key_pem.trim();

    if !pem.contains("ENCRYPTED PRIVATE KEY") {
        return EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            CommonError::InvalidRequest {
                msg: format!("Failed to parse private key: {e}"),
                source: Some(e.into()),
            }
        });
    }

    let passphrase = passphrase
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CommonError::InvalidRequest {
            msg: "private key is encrypted but no passphrase was configured".to_string(),
            source: None,
        })?;

    let (_label, document) =
        pkcs8::Document::from_pem(pem).map_err(|e| CommonError::InvalidRequest {
            msg: format!("Failed to decode private key PEM: {e}"),
            source: None,
        })?;
    let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(document.as_bytes()).map_err(|e| {
        CommonError::InvalidRequest {
            msg: format!("Failed to parse encrypted private key: {e}"),
            source: None,
        }
    })?;
    let decrypted = encrypted
        .decrypt(passphrase)
        .map_err(|e| CommonError::InvalidRequest {
            msg: format!("Failed to decrypt private key: {e}"),
            source: None,
        })?;
    let decrypted_pem = decrypted
        .to_pem("PRIVATE KEY", pkcs8::LineEnding::LF)
        .map_err(|e| CommonError::InvalidRequest {
            msg: format!("Failed to encode decrypted private key: {e}"),
            source: None,
        })?;

    EncodingKey::from_rsa_pem(decrypted_pem.as_bytes()).map_err(|e| {
        CommonError::InvalidRequest {
            msg: format!("Failed to parse private key: {e}"),
            source: Some(e.into()),
        }
    })
}

/// Issues and caches enterprise access tokens for one Box app
pub struct EnterpriseAuthenticator {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    enterprise_id: String,
    public_key_id: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl EnterpriseAuthenticator {
    pub fn new(config: &BoxAppConfig, http: Client) -> Result<Self, CommonError> {
        let settings = &config.box_app_settings;
        let encoding_key = load_encoding_key(
            &settings.app_auth.private_key,
            settings.app_auth.passphrase.as_deref(),
        )?;

        Ok(Self {
            http,
            token_url: BOX_TOKEN_URL.to_string(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            enterprise_id: config.enterprise_id.clone(),
            public_key_id: settings.app_auth.public_key_id.clone(),
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    /// Exchange assertions at a different endpoint. The `aud` claim is
    /// unaffected.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn build_assertion(&self, now: DateTime<Utc>) -> Result<String, BoxClientError> {
        let claims = AssertionClaims {
            iss: self.client_id.clone(),
            sub: self.enterprise_id.clone(),
            box_sub_type: ENTERPRISE_SUB_TYPE.to_string(),
            aud: BOX_TOKEN_URL.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.public_key_id.clone());

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| BoxClientError::Auth {
                error: "assertion_signing_failed".to_string(),
                description: Some(e.to_string()),
            })
    }

    /// A valid access token, requesting a new one only when the cached token
    /// is missing or close to expiry. Concurrent callers wait on the same
    /// request.
    pub async fn access_token(&self) -> Result<String, BoxClientError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                trace!("Reusing cached Box access token");
                return Ok(token.access_token.clone());
            }
        }

        let response = self.request_token(now).await?;
        let refresh_at =
            now + Duration::seconds(response.expires_in - TOKEN_EXPIRY_MARGIN_SECS);
        debug!(expires_in = response.expires_in, "Obtained Box enterprise access token");

        let access_token = response.access_token.clone();
        *cached = Some(CachedToken {
            access_token: response.access_token,
            refresh_at,
        });
        Ok(access_token)
    }

    async fn request_token(&self, now: DateTime<Utc>) -> Result<TokenResponse, BoxClientError> {
        let assertion = self.build_assertion(now)?;
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT_TYPE)
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(BoxClientError::Request)?;

        let status = response.status();
        let body = response.text().await.map_err(BoxClientError::Request)?;

        if !status.is_success() {
            let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            error!(
                status = %status,
                error = ?parsed.error,
                "Box token exchange failed"
            );
            return Err(BoxClientError::Auth {
                error: parsed
                    .error
                    .unwrap_or_else(|| format!("http_{}", status.as_u16())),
                description: parsed.error_description,
            });
        }

        serde_json::from_str(&body).map_err(|e| BoxClientError::Parse { body, error: e })
    }
}

/// Source of the bearer token sent with every Box API call
pub enum AccessTokenProvider {
    /// A fixed token, e.g. a developer token
    Static(String),
    Enterprise(EnterpriseAuthenticator),
}

impl AccessTokenProvider {
    pub async fn access_token(&self) -> Result<String, BoxClientError> {
        match self {
            AccessTokenProvider::Static(token) => Ok(token.clone()),
            AccessTokenProvider::Enterprise(auth) => auth.access_token().await,
        }
    }
}


#[cfg(test)]
mod tests {
    mod unit {
        use super::super::test_keys;
        use super::super::*;
        use crate::config::{BoxAppAuth, BoxAppSettings};
        use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
        use serde_json::json;
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn app_config(private_key: String, passphrase: Option<&str>) -> BoxAppConfig {
            BoxAppConfig {
                box_app_settings: BoxAppSettings {
                    client_id: "client-id".to_string(),
                    client_secret: "client-secret".to_string(),
                    app_auth: BoxAppAuth {
                        public_key_id: "kid-1".to_string(),
                        private_key,
                        passphrase: passphrase.map(str::to_string),
                    },
                },
                enterprise_id: "12345".to_string(),
            }
        }

        #[test]
        fn test_assertion_claims_and_header() {
            let key = test_keys::generate();
            let auth =
                EnterpriseAuthenticator::new(&app_config(key.private_pem.clone(), None), Client::new())
                    .unwrap();

            let now = Utc::now();
            let assertion = auth.build_assertion(now).unwrap();

            let header = decode_header(&assertion).unwrap();
            assert_eq!(header.alg, Algorithm::RS256);
            assert_eq!(header.kid.as_deref(), Some("kid-1"));

            let mut validation = Validation::new(Algorithm::RS256);
            validation.set_audience(&[BOX_TOKEN_URL]);
            let decoded = decode::<AssertionClaims>(
                &assertion,
                &DecodingKey::from_rsa_pem(key.public_pem.as_bytes()).unwrap(),
                &validation,
            )
            .unwrap();
            let claims = decoded.claims;
            assert_eq!(claims.iss, "client-id");
            assert_eq!(claims.sub, "12345");
            assert_eq!(claims.box_sub_type, "enterprise");
            assert_eq!(claims.exp, now.timestamp() + ASSERTION_LIFETIME_SECS);
            assert!(Uuid::parse_str(&claims.jti).is_ok());
        }

        #[test]
        fn test_each_assertion_has_fresh_jti() {
            let key = test_keys::generate();
            let auth =
                EnterpriseAuthenticator::new(&app_config(key.private_pem, None), Client::new())
                    .unwrap();
            let now = Utc::now();
            let a = decode_header(&auth.build_assertion(now).unwrap()).unwrap();
            assert_eq!(a.kid.as_deref(), Some("kid-1"));
            assert_ne!(
                auth.build_assertion(now).unwrap(),
                auth.build_assertion(now).unwrap()
            );
        }

        #[test]
        fn test_encrypted_key_requires_passphrase() {
            let key = test_keys::generate();
            let encrypted = test_keys::encrypted_pem(&key, "hunter2");

            assert!(load_encoding_key(&encrypted, Some("hunter2")).is_ok());
            assert!(load_encoding_key(&encrypted, None).is_err());
            assert!(load_encoding_key(&encrypted, Some("wrong")).is_err());
        }

        #[test]
        fn test_garbage_key_rejected() {
            let err = load_encoding_key("not a key", None).err().unwrap();
            assert!(matches!(err, CommonError::InvalidRequest { .. }));
        }

        #[tokio::test]
        async fn test_token_is_requested_once_and_cached() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth2/token"))
                .and(body_string_contains(
                    "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
                ))
                .and(body_string_contains("client_id=client-id"))
                .and(body_string_contains("assertion="))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": "enterprise-token",
                    "expires_in": 3600,
                    "token_type": "bearer"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let key = test_keys::generate();
            let auth =
                EnterpriseAuthenticator::new(&app_config(key.private_pem, None), Client::new())
                    .unwrap()
                    .with_token_url(format!("{}/oauth2/token", server.uri()));

            assert_eq!(auth.access_token().await.unwrap(), "enterprise-token");
            assert_eq!(auth.access_token().await.unwrap(), "enterprise-token");
        }

        #[tokio::test]
        async fn test_token_near_expiry_is_refreshed() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth2/token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": "short-lived",
                    "expires_in": 30
                })))
                .expect(2)
                .mount(&server)
                .await;

            let key = test_keys::generate();
            let auth =
                EnterpriseAuthenticator::new(&app_config(key.private_pem, None), Client::new())
                    .unwrap()
                    .with_token_url(format!("{}/oauth2/token", server.uri()));

            auth.access_token().await.unwrap();
            auth.access_token().await.unwrap();
        }

        #[tokio::test]
        async fn test_token_error_surfaces_box_error_code() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth2/token"))
                .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                    "error": "invalid_grant",
                    "error_description": "Please check the 'sub' claim."
                })))
                .mount(&server)
                .await;

            let key = test_keys::generate();
            let auth =
                EnterpriseAuthenticator::new(&app_config(key.private_pem, None), Client::new())
                    .unwrap()
                    .with_token_url(format!("{}/oauth2/token", server.uri()));

            match auth.access_token().await {
                Err(BoxClientError::Auth { error, description }) => {
                    assert_eq!(error, "invalid_grant");
                    assert!(description.unwrap().contains("sub"));
                }
                other => panic!("Expected Auth error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_static_provider_returns_token() {
            let provider = AccessTokenProvider::Static("dev-token".to_string());
            assert_eq!(provider.access_token().await.unwrap(), "dev-token");
        }
    }
}
