use crate::{AppState, auth::current_user::current_session, errors::Error};
use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, trace};

/// Prefixes the guard never redirects: the API answers 401 itself, and sign-in lives there.
const UNGUARDED: [&str; 3] = ["/api", "/healthz", "/internal"];

fn under(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// Whether `path` is one of the protected prefixes or below one
pub(crate) fn is_protected(path: &str, prefixes: &[String]) -> bool {
    if UNGUARDED.iter().any(|prefix| under(path, prefix)) {
        return false;
    }
    prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        prefix.is_empty() || under(path, prefix)
    })
}

/// Where to send a browser that needs to sign in before seeing `return_to`
pub(crate) fn login_redirect(return_to: &str) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("return_to", return_to)
        .finish();
    (StatusCode::FOUND, [(header::LOCATION, format!("/api/auth/login?{query}"))]).into_response()
}

/// Page guard for the single-page app.
///
/// Navigation to a protected page without a valid session redirects to sign-in, carrying the
/// original path and query along. A cookie that merely exists does not count.
pub async fn page_guard_middleware(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    if !is_protected(request.uri().path(), &state.config.frontend.protected_paths) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    if current_session(&parts, &state).await.is_some() {
        trace!(path = %parts.uri.path(), "Protected page, session valid");
        return Ok(next.run(Request::from_parts(parts, body)).await);
    }

    let return_to = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    debug!(return_to, "No valid session for protected page, redirecting to sign-in");
    Ok(login_redirect(return_to))
}
