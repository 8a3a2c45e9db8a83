//! Hosted sign-in flow.
//!
//! `login` sends the browser to the identity provider with a PKCE challenge and remembers the
//! verifier in a signed, short-lived cookie. `callback` checks that cookie, exchanges the code,
//! verifies the returned ID token and only then mints the session cookie.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use tracing::{info, warn};

use crate::{
    AppState,
    api::models::{
        auth::{AuthStatus, CallbackQuery, LoginQuery, LogoutResponse, WithCookies},
        envelope::{ApiResponse, ok},
        users::CurrentUser,
    },
    auth::{
        identity::{pkce_challenge, random_token},
        session::{self, LOGIN_STATE_COOKIE},
    },
    db::handlers::Users,
    errors::{Error, Result},
};

/// Only same-origin relative paths are followed after sign-in
pub(crate) fn safe_return_to(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(|c| c.is_control()) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

fn sign_in_disabled() -> Error {
    Error::BadRequest {
        message: "Sign-in is not configured".to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/auth/login",
    tag = "authentication",
    summary = "Start sign-in",
    description = "Redirects to the hosted sign-in UI. After sign-in the browser returns to `return_to`.",
    params(LoginQuery),
    responses(
        (status = 302, description = "Redirect to the identity provider"),
        (status = 400, description = "Sign-in is not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Query(query): Query<LoginQuery>) -> Result<impl IntoResponse> {
    if !state.identity.enabled() {
        return Err(sign_in_disabled());
    }

    let csrf_state = random_token(32);
    let verifier = random_token(48);
    let return_to = safe_return_to(query.return_to.as_deref());

    let url = state.identity.authorize_url(
        &state.config.callback_url(),
        &csrf_state,
        &pkce_challenge(&verifier),
        query.provider.as_deref().filter(|p| !p.trim().is_empty()),
    )?;
    let token = session::create_login_state_token(&csrf_state, &verifier, &return_to, &state.config)?;

    Ok((
        StatusCode::FOUND,
        AppendHeaders([
            (header::LOCATION, url.to_string()),
            (header::SET_COOKIE, session::login_state_cookie(&token, &state.config)),
        ]),
    ))
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = "authentication",
    summary = "Finish sign-in",
    description = "Redirect target registered with the identity provider.",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Signed in; redirect to the page sign-in started from"),
        (status = 400, description = "Missing authorization code"),
        (status = 401, description = "Sign-in failed, expired or was not started here"),
        (status = 502, description = "Identity provider unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>, headers: HeaderMap) -> Response {
    // A login state is single use, whatever the outcome
    let clear_state = session::expired_cookie(LOGIN_STATE_COOKIE, "/api/auth", &state.config);
    match complete_sign_in(&state, query, &headers).await {
        Ok((return_to, session_cookie)) => (
            StatusCode::FOUND,
            AppendHeaders([
                (header::LOCATION, return_to),
                (header::SET_COOKIE, session_cookie),
                (header::SET_COOKIE, clear_state),
            ]),
        )
            .into_response(),
        Err(error) => (AppendHeaders([(header::SET_COOKIE, clear_state)]), error).into_response(),
    }
}

/// Checks the returned state, redeems the code and mints a session. Yields the redirect target
/// and the session cookie.
async fn complete_sign_in(state: &AppState, query: CallbackQuery, headers: &HeaderMap) -> Result<(String, String)> {
    if let Some(error) = query.error {
        warn!(error = %error, "Identity provider reported a sign-in failure");
        return Err(Error::Unauthenticated {
            message: Some(query.error_description.unwrap_or(error)),
        });
    }
    if !state.identity.enabled() {
        return Err(sign_in_disabled());
    }

    let restart = || Error::Unauthenticated {
        message: Some("Sign-in session expired, please sign in again".to_string()),
    };
    let cookie = session::read_cookie(headers, LOGIN_STATE_COOKIE).ok_or_else(restart)?;
    let login = session::verify_login_state_token(cookie, &state.config).map_err(|_| restart())?;
    if query.state.as_deref() != Some(login.state.as_str()) {
        warn!("Sign-in state mismatch");
        return Err(restart());
    }

    let code = query.code.filter(|c| !c.is_empty()).ok_or_else(|| Error::BadRequest {
        message: "Missing authorization code".to_string(),
    })?;

    let tokens = state
        .identity
        .exchange_code(&code, &login.verifier, &state.config.callback_url())
        .await?;
    let claims = state.identity.verify(&tokens.id_token).await?;
    if claims.token_use.as_deref() == Some("access") {
        return Err(Error::Unauthenticated {
            message: Some("Expected an ID token".to_string()),
        });
    }

    let user = Users::new(state.store.as_ref()).upsert_from_identity(&claims.to_upsert()).await?;
    let current_user = CurrentUser::from(user);
    let expires_at = session::session_expiry(&state.config, Some(claims.exp));
    let token = session::create_session_token(&current_user, expires_at, &state.config)?;

    info!(user_id = %current_user.id, provider = ?claims.provider(), "User signed in");

    Ok((login.return_to, session::session_cookie(&token, expires_at, &state.config)))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "authentication",
    summary = "Sign out",
    description = "Clears the session cookie. Visit `logout_url` to end the identity provider session too.",
    responses(
        (status = 200, description = "Signed out", body = ApiResponse<LogoutResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<WithCookies<LogoutResponse>> {
    let logout_url = if state.identity.enabled() {
        let landing = state
            .identity
            .config()
            .logout_redirect_url
            .as_ref()
            .unwrap_or(&state.config.public_url)
            .to_string();
        state.identity.logout_url(&landing).ok().map(|url| url.to_string())
    } else {
        None
    };

    Ok(WithCookies {
        body: ApiResponse {
            success: true,
            data: LogoutResponse { logout_url },
        },
        cookies: vec![session::expired_cookie(&state.config.session.cookie_name, "/", &state.config)],
    })
}

#[utoipa::path(
    get,
    path = "/auth/check",
    tag = "authentication",
    summary = "Sign-in status",
    description = "Whether sign-in is configured and reachable, and whether the caller is signed in. Never returns secrets.",
    responses(
        (status = 200, description = "Sign-in status", body = ApiResponse<AuthStatus>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn check(State(state): State<AppState>, current_user: Result<CurrentUser>) -> Json<ApiResponse<AuthStatus>> {
    let identity = state.identity.config();
    let issuer = state.identity.issuer().map(str::to_string);
    let configured = identity.enabled && !identity.client_id.trim().is_empty() && identity.hosted_ui_url.is_some() && issuer.is_some();
    let jwks_reachable = identity.enabled && state.identity.keys_reachable().await;

    ok(AuthStatus {
        enabled: identity.enabled,
        configured,
        issuer,
        client_id_set: !identity.client_id.trim().is_empty(),
        client_secret_set: identity.client_secret.is_some(),
        hosted_ui_url: identity.hosted_ui_url.as_ref().map(|url| url.to_string()),
        default_provider: identity.default_provider.clone(),
        jwks_reachable,
        authenticated: current_user.is_ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_return_to() {
        assert_eq!(safe_return_to(Some("/decks/1?board=main")), "/decks/1?board=main");
        assert_eq!(safe_return_to(None), "/");
        assert_eq!(safe_return_to(Some("https://evil.example.com")), "/");
        assert_eq!(safe_return_to(Some("//evil.example.com")), "/");
        assert_eq!(safe_return_to(Some("/\\evil.example.com")), "/");
        assert_eq!(safe_return_to(Some("/a\r\nSet-Cookie: x=1")), "/");
    }
}
