//! Authentication.
//!
//! Sign-in is delegated to the identity provider's hosted UI. This service only:
//!
//! 1. Starts the authorization code flow with PKCE (`GET /api/auth/login`)
//! 2. Exchanges the code and verifies the returned ID token against the provider's JWKS
//!    (`GET /api/auth/callback`)
//! 3. Mints a signed session cookie from the verified token
//!
//! Every request is then authenticated by exactly one path, [`current_user::current_session`],
//! which accepts either a provider-issued bearer token or that session cookie. Nothing else
//! (cookie presence, client-side flags, fallbacks) counts as being signed in; failures are
//! answered with 401, or with a redirect to sign-in for protected pages.
//!
//! # Modules
//!
//! - [`current_user`]: The `CurrentUser` extractor
//! - [`identity`]: Identity provider client (authorize/token/logout URLs, JWKS verification)
//! - [`middleware`]: Page guard for protected single-page-app routes
//! - [`session`]: Session and login-state tokens and their cookies
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use grimoire::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> Result<String, Error> {
//!     Ok(format!("Hello, {}!", current_user.username))
//! }
//! ```

pub mod current_user;
pub mod identity;
pub mod middleware;
pub mod session;
