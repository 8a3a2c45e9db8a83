//! API request/response models for the sign-in flow.

use axum::{
    Json,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::envelope::ApiResponse;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LoginQuery {
    /// Same-origin path to land on after sign-in
    pub return_to: Option<String>,
    /// Social provider to skip straight to, e.g. "Google"
    pub provider: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when sign-in failed
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogoutResponse {
    /// Hosted sign-in UI logout URL; the browser should visit it to end the provider session
    pub logout_url: Option<String>,
}

/// Public sign-in status. Never includes secrets.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthStatus {
    pub enabled: bool,
    /// Every setting sign-in needs is present
    pub configured: bool,
    pub issuer: Option<String>,
    pub client_id_set: bool,
    pub client_secret_set: bool,
    pub hosted_ui_url: Option<String>,
    pub default_provider: Option<String>,
    pub jwks_reachable: bool,
    pub authenticated: bool,
}

/// A JSON body plus any number of `Set-Cookie` headers
#[derive(Debug)]
pub struct WithCookies<T> {
    pub body: ApiResponse<T>,
    pub cookies: Vec<String>,
}

impl<T: Serialize> IntoResponse for WithCookies<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        for cookie in self.cookies {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!("Dropping unrepresentable Set-Cookie header: {e}"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_with_cookies_appends_headers() {
        let response = WithCookies {
            body: ApiResponse {
                success: true,
                data: LogoutResponse { logout_url: None },
            },
            cookies: vec!["a=; Max-Age=0".to_string(), "b=1".to_string()],
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
    }
}
