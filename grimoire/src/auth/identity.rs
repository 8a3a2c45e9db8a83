//! Identity provider client.
//!
//! Talks to the hosted sign-in UI (authorize, token and logout endpoints) and verifies RS256
//! tokens against the provider's published JWKS. Signing keys are cached for
//! `identity.jwks_cache_ttl` and refetched when a token names an unknown key id, which is how
//! key rotation shows up. Such forced refetches happen at most once per
//! `identity.jwks_refresh_interval`, so made-up key ids cannot drive traffic to the provider.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use moka::future::Cache;
use rand::{RngCore, rngs::OsRng};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{config::IdentityConfig, db::models::users::UserUpsertDBRequest, errors::Error};

const SERVICE: &str = "identity provider";

/// Random URL-safe string with `bytes` bytes of entropy
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// PKCE S256 challenge for a verifier
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, wanted: &str) -> bool {
        match self {
            Audience::One(aud) => aud == wanted,
            Audience::Many(auds) => auds.iter().any(|a| a == wanted),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkedIdentity {
    #[serde(rename = "providerName")]
    pub provider_name: String,
}

/// Claims of a verified provider token (ID or access token)
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    pub aud: Option<Audience>,
    pub client_id: Option<String>,
    pub token_use: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "cognito:username")]
    pub pool_username: Option<String>,
    pub username: Option<String>,
    pub preferred_username: Option<String>,
    pub identities: Option<Vec<LinkedIdentity>>,
}

impl IdentityClaims {
    pub fn username(&self) -> String {
        self.pool_username
            .as_ref()
            .or(self.username.as_ref())
            .or(self.preferred_username.as_ref())
            .or(self.email.as_ref())
            .unwrap_or(&self.sub)
            .clone()
    }

    /// The social provider behind a federated sign-in, if any
    pub fn provider(&self) -> Option<String> {
        self.identities
            .as_ref()
            .and_then(|ids| ids.first())
            .map(|id| id.provider_name.clone())
    }

    pub fn to_upsert(&self) -> UserUpsertDBRequest {
        UserUpsertDBRequest {
            subject: self.sub.clone(),
            email: self.email.clone().unwrap_or_default(),
            username: self.username(),
            display_name: self.name.clone(),
            identity_provider: self.provider(),
        }
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub id_token: String,
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

pub struct IdentityClient {
    config: IdentityConfig,
    issuer: Option<String>,
    jwks_url: Option<String>,
    http: Client,
    keys: Cache<String, Arc<JwkSet>>,
    /// Present while a forced refetch of the keys at that URL is too recent to repeat
    refreshed: Cache<String, ()>,
}

fn unauthenticated(message: &str) -> Error {
    Error::Unauthenticated {
        message: Some(message.to_string()),
    }
}

fn upstream(message: impl std::fmt::Display) -> Error {
    Error::Upstream {
        service: SERVICE.to_string(),
        message: message.to_string(),
    }
}

impl IdentityClient {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        let keys = Cache::builder().max_capacity(4).time_to_live(config.jwks_cache_ttl).build();
        let refreshed = Cache::builder()
            .max_capacity(4)
            .time_to_live(config.jwks_refresh_interval)
            .build();

        Ok(Self {
            issuer: config.issuer(),
            jwks_url: config.jwks_url(),
            config: config.clone(),
            http,
            keys,
            refreshed,
        })
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let raw = self.config.hosted_ui_endpoint(path).ok_or_else(|| Error::BadRequest {
            message: "Sign-in is not configured".to_string(),
        })?;
        Url::parse(&raw).map_err(|e| Error::Internal {
            operation: format!("build {path} URL: {e}"),
        })
    }

    /// Hosted UI URL that starts the authorization code flow
    pub fn authorize_url(&self, redirect_uri: &str, state: &str, code_challenge: &str, provider: Option<&str>) -> Result<Url, Error> {
        let mut url = self.endpoint("/oauth2/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &self.config.scopes.join(" "))
                .append_pair("state", state)
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(provider) = provider.or(self.config.default_provider.as_deref()) {
                query.append_pair("identity_provider", provider);
            }
        }
        Ok(url)
    }

    /// Hosted UI logout URL that returns the browser to `logout_uri`
    pub fn logout_url(&self, logout_uri: &str) -> Result<Url, Error> {
        let mut url = self.endpoint("/logout")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("logout_uri", logout_uri);
        Ok(url)
    }

    /// Exchange an authorization code (plus PKCE verifier) for tokens
    #[instrument(skip_all, err)]
    pub async fn exchange_code(&self, code: &str, verifier: &str, redirect_uri: &str) -> Result<TokenResponse, Error> {
        let url = self.endpoint("/oauth2/token")?;
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
        ];

        let mut request = self.http.post(url).form(&form);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(&self.config.client_id, Some(secret));
        }

        let response = request.send().await.map_err(upstream)?;
        match response.status() {
            status if status.is_success() => response.json::<TokenResponse>().await.map_err(upstream),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                warn!(body = %body, "Identity provider rejected authorization code");
                Err(unauthenticated("Sign-in code was rejected, please sign in again"))
            }
            status => Err(upstream(format!("token endpoint returned {status}"))),
        }
    }

    async fn fetch_keys(&self, url: String) -> anyhow::Result<Arc<JwkSet>> {
        debug!(url = %url, "Fetching identity provider signing keys");
        let keys = self.http.get(&url).send().await?.error_for_status()?.json::<JwkSet>().await?;
        Ok(Arc::new(keys))
    }

    /// The provider's signing keys, from cache unless `refresh` is set and no forced refetch
    /// happened within `jwks_refresh_interval`
    pub async fn signing_keys(&self, refresh: bool) -> Result<Arc<JwkSet>, Error> {
        let url = self.jwks_url.clone().ok_or_else(|| unauthenticated("Sign-in is not configured"))?;
        if refresh {
            if self.refreshed.entry(url.clone()).or_insert(()).await.is_fresh() {
                self.keys.invalidate(&url).await;
            } else {
                debug!("Signing keys were refetched recently, using the cached set");
            }
        }
        self.keys
            .try_get_with(url.clone(), self.fetch_keys(url))
            .await
            .map_err(|e| upstream(format!("fetch signing keys: {e}")))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, Error> {
        let keys = self.signing_keys(false).await?;
        let jwk = match keys.find(kid) {
            Some(jwk) => jwk.clone(),
            None => {
                debug!(kid, "Unknown signing key id, refreshing key set");
                let fresh = self.signing_keys(true).await?;
                fresh.find(kid).cloned().ok_or_else(|| unauthenticated("Token signed with an unknown key"))?
            }
        };
        DecodingKey::from_jwk(&jwk).map_err(|e| upstream(format!("unusable signing key {kid}: {e}")))
    }

    /// Verify a provider-issued ID or access token
    #[instrument(skip_all, err)]
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, Error> {
        if !self.config.enabled {
            return Err(unauthenticated("Sign-in is not configured"));
        }
        let issuer = self.issuer.as_deref().ok_or_else(|| unauthenticated("Sign-in is not configured"))?;

        let header = decode_header(token).map_err(|_| unauthenticated("Malformed token"))?;
        if header.alg != Algorithm::RS256 {
            return Err(unauthenticated("Unsupported token algorithm"));
        }
        let kid = header.kid.ok_or_else(|| unauthenticated("Token has no key id"))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Checked below, the claim depends on token_use
        validation.validate_aud = false;

        let claims = decode::<IdentityClaims>(token, &key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Identity token rejected");
                unauthenticated("Invalid or expired token")
            })?
            .claims;

        let client_id = self.config.client_id.as_str();
        let audience_ok = match claims.token_use.as_deref() {
            Some("access") => claims.client_id.as_deref() == Some(client_id),
            Some("id") | None => claims.aud.as_ref().is_some_and(|aud| aud.contains(client_id)),
            Some(_) => false,
        };
        if !audience_ok {
            return Err(unauthenticated("Token was issued to a different client"));
        }

        Ok(claims)
    }

    /// Whether the signing keys can be fetched right now
    pub async fn keys_reachable(&self) -> bool {
        self.jwks_url.is_some() && self.signing_keys(false).await.is_ok()
    }
}
