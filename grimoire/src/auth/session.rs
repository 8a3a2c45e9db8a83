//! Signed session and login-state tokens, and the cookies that carry them.
//!
//! Both are HS256 JWTs signed with `secret_key`. A session token is only ever minted after the
//! identity provider's ID token has been verified, and never outlives it.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{api::models::users::CurrentUser, config::Config, errors::Error, types::UserId};

/// Cookie holding the signed [`LoginState`] between `/api/auth/login` and the callback
pub const LOGIN_STATE_COOKIE: &str = "grimoire_login_state";

/// JWT session claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,      // Subject (user ID)
    pub email: String,    // User email
    pub username: String, // Username
    pub exp: i64,         // Expiration time
    pub iat: i64,         // Issued at
}

/// In-flight sign-in: CSRF state, PKCE verifier and where to send the browser afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginState {
    pub state: String,
    pub verifier: String,
    pub return_to: String,
    pub exp: i64,
}

fn secret(config: &Config) -> Result<&[u8], Error> {
    config.secret_key.as_deref().map(str::as_bytes).ok_or_else(|| Error::Internal {
        operation: "sign session: secret_key is required".to_string(),
    })
}

fn sign<T: Serialize>(claims: &T, config: &Config) -> Result<String, Error> {
    let key = EncodingKey::from_secret(secret(config)?);
    encode(&Header::default(), claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

fn verify<T: DeserializeOwned>(token: &str, config: &Config) -> Result<T, Error> {
    use jsonwebtoken::errors::ErrorKind;

    let key = DecodingKey::from_secret(secret(config)?);
    let token_data = decode::<T>(token, &key, &Validation::default()).map_err(|e| match e.kind() {
        // Client errors (401) - malformed, expired or foreign tokens
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Correctly signed, but minted for the other token type
        ErrorKind::Json(_) => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::MissingAlgorithm
        | ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(token_data.claims)
}

/// When a new session must end: the configured timeout, capped by the provider token's expiry
pub fn session_expiry(config: &Config, provider_exp: Option<i64>) -> DateTime<Utc> {
    let by_timeout = Utc::now() + ChronoDuration::from_std(config.session.timeout).unwrap_or(ChronoDuration::hours(24));
    provider_exp
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
        .map_or(by_timeout, |by_provider| by_timeout.min(by_provider))
}

/// Create a session token for a user
pub fn create_session_token(user: &CurrentUser, expires_at: DateTime<Utc>, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims {
        sub: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        exp: expires_at.timestamp(),
        iat: Utc::now().timestamp(),
    };
    sign(&claims, config)
}

/// Verify and decode a session token
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    verify(token, config)
}

pub fn create_login_state_token(state: &str, verifier: &str, return_to: &str, config: &Config) -> Result<String, Error> {
    let ttl = ChronoDuration::from_std(config.identity.login_state_ttl).unwrap_or(ChronoDuration::minutes(10));
    let claims = LoginState {
        state: state.to_string(),
        verifier: verifier.to_string(),
        return_to: return_to.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
    };
    sign(&claims, config)
}

pub fn verify_login_state_token(token: &str, config: &Config) -> Result<LoginState, Error> {
    verify(token, config)
}

fn secure_attr(config: &Config) -> &'static str {
    if config.session.cookie_secure { "; Secure" } else { "" }
}

/// `Set-Cookie` value for a session that lasts until `expires_at`
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, config: &Config) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        config.session.cookie_name,
        token,
        secure_attr(config),
        config.session.cookie_same_site,
        max_age
    )
}

/// `Set-Cookie` value for the sign-in state.
///
/// Always `SameSite=Lax`: the provider's redirect back to the callback is a cross-site navigation.
pub fn login_state_cookie(token: &str, config: &Config) -> String {
    format!(
        "{}={}; Path=/api/auth; HttpOnly{}; SameSite=Lax; Max-Age={}",
        LOGIN_STATE_COOKIE,
        token,
        secure_attr(config),
        config.identity.login_state_ttl.as_secs()
    )
}

/// `Set-Cookie` value that deletes a cookie set with `path`
pub fn expired_cookie(name: &str, path: &str, config: &Config) -> String {
    format!("{name}=; Path={path}; HttpOnly{}; SameSite=Lax; Max-Age=0", secure_attr(config))
}

/// Find a cookie value in the request headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        Config {
            secret_key: Some("test-secret-key-for-jwt".to_string()),
            ..Default::default()
        }
    }

    fn create_test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            subject: "provider-sub".to_string(),
            email: "test@example.com".to_string(),
            username: "testuser".to_string(),
            display_name: Some("Test User".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_session_token(&user, Utc::now() + ChronoDuration::hours(1), &config).unwrap();
        let claims = verify_session_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.username, user.username);
    }

    #[test]
    fn test_verify_invalid_token() {
        let config = create_test_config();
        let result = verify_session_token("invalid.token.here", &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let token = create_session_token(&create_test_user(), Utc::now() + ChronoDuration::hours(1), &config).unwrap();

        config.secret_key = Some("different-secret-key".to_string());
        let result = verify_session_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let token = create_session_token(&create_test_user(), Utc::now() - ChronoDuration::hours(2), &config).unwrap();

        let result = verify_session_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_login_state_is_not_a_session() {
        let config = create_test_config();
        let token = create_login_state_token("state-123", "verifier", "/decks", &config).unwrap();

        let state = verify_login_state_token(&token, &config).unwrap();
        assert_eq!(state.state, "state-123");
        assert_eq!(state.return_to, "/decks");

        assert!(matches!(verify_session_token(&token, &config), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let config = Config::default();
        let result = create_session_token(&create_test_user(), Utc::now(), &config);
        assert!(matches!(result, Err(Error::Internal { .. })));
    }

    #[test]
    fn test_session_expiry_is_capped_by_provider() {
        let mut config = create_test_config();
        config.session.timeout = Duration::from_secs(24 * 3600);

        let provider_exp = (Utc::now() + ChronoDuration::hours(1)).timestamp();
        let expiry = session_expiry(&config, Some(provider_exp));
        assert_eq!(expiry.timestamp(), provider_exp);

        let uncapped = session_expiry(&config, None);
        assert!(uncapped > Utc::now() + ChronoDuration::hours(23));
    }

    #[test]
    fn test_cookie_formatting() {
        let mut config = create_test_config();
        let cookie = session_cookie("tok", Utc::now() + ChronoDuration::seconds(120), &config);
        assert!(cookie.starts_with("grimoire_session=tok; Path=/; HttpOnly; Secure; SameSite=lax; Max-Age="));

        config.session.cookie_secure = false;
        let cleared = expired_cookie("grimoire_session", "/", &config);
        assert_eq!(cleared, "grimoire_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; grimoire_session=abc.def.ghi"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(read_cookie(&headers, "grimoire_session"), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, "other"), Some("1"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }
}
