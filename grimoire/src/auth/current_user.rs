use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::handlers::Users,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, info, instrument, trace};

/// Extract user from a provider-issued bearer token if present
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Token verified; the user is provisioned on first sight
/// - Some(Err(error)): Bearer token present but invalid
#[instrument(skip_all)]
async fn try_bearer_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };
    let token = auth_str.strip_prefix("Bearer ")?;

    let claims = match state.identity.verify(token.trim()).await {
        Ok(claims) => claims,
        Err(e) => return Some(Err(e)),
    };

    let mut users = Users::new(state.store.as_ref());
    let user = match users.get_by_subject(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => match users.upsert_from_identity(&claims.to_upsert()).await {
            Ok(user) => {
                info!(username = %user.username, "Provisioned user from bearer token");
                user
            }
            Err(e) => return Some(Err(e.into())),
        },
        Err(e) => return Some(Err(e.into())),
    };

    Some(Ok(CurrentUser::from(user)))
}

/// Extract user from the session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Session verified and its user still exists
/// - Some(Err(error)): Cookie present but invalid, expired or for a deleted user
#[instrument(skip_all)]
async fn try_session_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentUser>> {
    let token = session::read_cookie(&parts.headers, &state.config.session.cookie_name)?;

    let claims = match session::verify_session_token(token, &state.config) {
        Ok(claims) => claims,
        Err(e) => return Some(Err(e)),
    };

    match Users::new(state.store.as_ref()).get_by_id(claims.sub).await {
        Ok(Some(user)) => Some(Ok(CurrentUser::from(user))),
        Ok(None) => Some(Err(Error::Unauthenticated {
            message: Some("Session user no longer exists".to_string()),
        })),
        Err(e) => Some(Err(e.into())),
    }
}

/// The one answer to "who is calling": a verified provider token or a session minted from one.
///
/// `None` covers both missing and invalid credentials.
pub async fn current_session(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    if let Some(result) = try_bearer_auth(parts, state).await {
        match result {
            Ok(user) => return Some(user),
            Err(e) => trace!("Bearer authentication failed: {e}"),
        }
    }
    match try_session_auth(parts, state).await {
        Some(Ok(user)) => Some(user),
        Some(Err(e)) => {
            trace!("Session authentication failed: {e}");
            None
        }
        None => None,
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        match current_session(parts, state).await {
            Some(user) => {
                debug!("Authenticated user: {}", user.id);
                parts.extensions.insert(user.clone());
                Ok(user)
            }
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}
