//! # grimoire: a Magic: The Gathering collection manager
//!
//! `grimoire` is a self-hostable web service for keeping track of a Magic: The Gathering
//! collection. Users sign in through a hosted identity provider and then manage their own
//! collections, decks and favorite cards, import collections from CSV, print proxy sheets as
//! PDF and unlock achievements as their collection grows.
//!
//! ## Architecture
//!
//! The service is a single [Axum](https://github.com/tokio-rs/axum) application. Requests flow
//! through three layers:
//!
//! - **Route handlers** ([`api::handlers`]) validate input, resolve the caller through the
//!   [`CurrentUser`](api::models::users::CurrentUser) extractor and wrap results in the
//!   `{ success, data }` envelope.
//! - **Repositories** ([`db::handlers`]) give typed, owner-scoped access to records. A record
//!   owned by someone else behaves exactly like one that does not exist.
//! - **The item store** ([`db::store`]) persists records as JSON items, either in memory or in
//!   a PostgreSQL table.
//!
//! Authentication ([`auth`]) has one source of truth: a token issued and signed by the identity
//! provider. The browser flow exchanges the provider's ID token for a signed session cookie;
//! API clients may present the provider token directly as a bearer token. Protected pages of an
//! optional single-page app are guarded by [`auth::middleware::page_guard_middleware`].
//!
//! Alongside the CRUD surface live the [`import`] module (CSV in and out), [`proxies`] (PDF proxy
//! sheets) and [`achievements`] (catalog and evaluation).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use grimoire::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = grimoire::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     grimoire::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Storage
//!
//! By default everything is kept in memory, which suits development and tests. Point
//! `DATABASE_URL` (or `storage.url` with `storage.type: postgres`) at a PostgreSQL database for
//! durable storage; migrations run on startup.

pub mod achievements;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod import;
mod openapi;
pub mod proxies;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    auth::{identity::IdentityClient, middleware::page_guard_middleware},
    config::{CorsOrigin, StorageConfig},
    db::store::{InMemoryStore, KeyValueStore, PostgresStore},
    openapi::ApiDoc,
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{CollectionId, DeckId, FavoriteId, UserId};

/// Room for multipart boundaries and headers on top of the import file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(Arc::new(InMemoryStore::new()))
///     .identity(Arc::new(IdentityClient::new(&config.identity)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub identity: Arc<IdentityClient>,
}

/// Open the configured item store
async fn setup_store(config: &Config) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    debug!(backend = config.storage.backend_name(), "Opening item store");
    match &config.storage {
        StorageConfig::Memory => {
            info!("Using in-memory storage; data will be lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageConfig::Postgres { url, pool } => Ok(Arc::new(PostgresStore::connect(url, pool).await?)),
    }
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.security.cors.allowed_origins;
    let allow_origin = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(config.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION, http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/api/*`: the JSON API, its OpenAPI document and Scalar docs at `/api/docs`
/// - `/healthz`: liveness
/// - `/internal/metrics`: Prometheus metrics, when enabled
/// - everything else: the single-page app from `frontend.static_dir`, if configured
///
/// The page guard wraps the whole router so protected SPA routes redirect to sign-in.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{achievements, auth, collections, decks, favorites, users};

    let import_limit = state.config.import.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        // Sign-in
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/check", get(auth::check))
        .route("/cognito-check", get(auth::check))
        // Profile
        .route("/users/me", get(users::get_current_user).patch(users::update_current_user))
        // Collections
        .route(
            "/collections",
            get(collections::list_collections).post(collections::create_collection),
        )
        .route(
            "/collections/{id}",
            get(collections::get_collection)
                .patch(collections::update_collection)
                .delete(collections::delete_collection),
        )
        .route("/collections/{id}/cards", post(collections::add_card))
        .route(
            "/collections/{id}/cards/{card_id}",
            patch(collections::update_card).delete(collections::remove_card),
        )
        .route(
            "/collections/{id}/import",
            post(collections::import_cards).layer(DefaultBodyLimit::max(import_limit)),
        )
        .route("/collections/{id}/export.csv", get(collections::export_cards))
        .route("/collections/{id}/proxies.pdf", get(collections::collection_proxies))
        // Decks
        .route("/decks", get(decks::list_decks).post(decks::create_deck))
        .route(
            "/decks/{id}",
            get(decks::get_deck).patch(decks::update_deck).delete(decks::delete_deck),
        )
        .route("/decks/{id}/cards", post(decks::add_card))
        .route(
            "/decks/{id}/cards/{card_id}",
            patch(decks::update_card).delete(decks::remove_card),
        )
        .route("/decks/{id}/proxies.pdf", get(decks::deck_proxies))
        // Favorites
        .route("/favorites", get(favorites::list_favorites).post(favorites::create_favorite))
        .route(
            "/favorites/{id}",
            patch(favorites::update_favorite).delete(favorites::delete_favorite),
        )
        // Achievements
        .route("/achievements", get(achievements::list_achievements))
        // Docs
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    if let Some(static_dir) = &state.config.frontend.static_dir {
        debug!(path = %static_dir.display(), "Serving single-page app");
        let index = ServeFile::new(static_dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(static_dir).fallback(index));
    }

    // Guard protected pages before anything else sees them
    let mut router = router
        .layer(from_fn_with_state(state.clone(), page_guard_middleware))
        .layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting grimoire with configuration: {:#?}", config);

        let store = setup_store(&config).await?;
        let identity = Arc::new(IdentityClient::new(&config.identity)?);
        if identity.enabled() {
            info!(issuer = ?identity.issuer(), "Sign-in through the hosted identity provider is enabled");
        } else {
            info!("Sign-in is disabled; only the public endpoints will be usable");
        }

        let app_state = AppState::builder().config(config.clone()).store(store).identity(identity).build();
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Grimoire listening on http://{}, available at {}",
            bind_addr, self.config.public_url
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing item store...");
        self.app_state.store.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::*;
    use axum::http::{StatusCode, header};
    use axum_test::{
        TestResponse,
        multipart::{MultipartForm, Part},
    };
    use serde_json::{Value, json};

    /// The `name=value` pair of the first `Set-Cookie` header for `name`
    fn cookie_pair(response: &TestResponse, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{name}=")))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    fn location(response: &TestResponse) -> String {
        response.header(header::LOCATION).to_str().unwrap().to_string()
    }

    #[test_log::test(tokio::test)]
    async fn test_application_integration() {
        let app = crate::Application::new(create_test_config()).await.unwrap();
        let server = app.into_test_server();

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");

        let openapi = server.get("/api/openapi.json").await;
        openapi.assert_status_ok();
        assert_eq!(openapi.json::<Value>()["info"]["title"], "Grimoire API");

        server.get("/api/docs").await.assert_status_ok();

        let api = server.get("/api/collections").await;
        api.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            api.json::<Value>(),
            json!({ "success": false, "error": "Authentication required" })
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_login_callback_and_me() {
        let provider = mock_identity_provider().await;
        let (server, _state) = create_test_server(identity_test_config(&provider.uri()));

        // Start sign-in: redirect to the hosted UI with state and PKCE
        let login = server.get("/api/auth/login").add_query_param("return_to", "/decks").await;
        login.assert_status(StatusCode::FOUND);
        let authorize = url::Url::parse(&location(&login)).unwrap();
        assert_eq!(authorize.path(), "/oauth2/authorize");
        let query: std::collections::HashMap<_, _> = authorize.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], TEST_CLIENT_ID);
        assert_eq!(query["redirect_uri"], "http://localhost:3001/api/auth/callback");
        assert_eq!(query["code_challenge_method"], "S256");
        let state_cookie = cookie_pair(&login, "grimoire_login_state").expect("state cookie set");

        // Provider redirects back with a code
        let id_token = mint_token(&id_token_claims(&provider.uri(), "sub-nissa", "nissa@example.com"), TEST_KID);
        mount_token_endpoint(&provider, &id_token).await;

        let callback = server
            .get("/api/auth/callback")
            .add_query_param("code", "auth-code")
            .add_query_param("state", &query["state"])
            .add_header("cookie", &state_cookie)
            .await;
        callback.assert_status(StatusCode::FOUND);
        assert_eq!(location(&callback), "/decks");
        let session = cookie_pair(&callback, "grimoire_session").expect("session cookie set");
        assert_eq!(cookie_pair(&callback, "grimoire_login_state").as_deref(), Some("grimoire_login_state="));

        // The session cookie now authenticates the API
        let me = server.get("/api/users/me").add_header("cookie", &session).await;
        me.assert_status_ok();
        let body: Value = me.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "nissa@example.com");
        assert_eq!(body["user"]["username"], "nissa");

        let status: Value = server.get("/api/cognito-check").add_header("cookie", &session).await.json();
        assert_eq!(status["data"]["authenticated"], true);
        assert_eq!(status["data"]["configured"], true);
        assert_eq!(status["data"]["jwks_reachable"], true);
    }

    #[test_log::test(tokio::test)]
    async fn test_callback_rejects_forged_state() {
        let provider = mock_identity_provider().await;
        let (server, _state) = create_test_server(identity_test_config(&provider.uri()));

        let login = server.get("/api/auth/login").await;
        let state_cookie = cookie_pair(&login, "grimoire_login_state").unwrap();

        let forged = server
            .get("/api/auth/callback")
            .add_query_param("code", "auth-code")
            .add_query_param("state", "attacker-state")
            .add_header("cookie", &state_cookie)
            .await;
        forged.assert_status(StatusCode::UNAUTHORIZED);
        assert!(cookie_pair(&forged, "grimoire_session").is_none());

        let no_cookie = server
            .get("/api/auth/callback")
            .add_query_param("code", "auth-code")
            .add_query_param("state", "whatever")
            .await;
        no_cookie.assert_status(StatusCode::UNAUTHORIZED);

        let provider_error = server
            .get("/api/auth/callback")
            .add_query_param("error", "access_denied")
            .add_query_param("error_description", "User cancelled")
            .await;
        provider_error.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(provider_error.json::<Value>()["error"], "User cancelled");
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_callback_clears_login_state() {
        // No token endpoint mounted, so redeeming the code fails
        let provider = mock_identity_provider().await;
        let (server, _state) = create_test_server(identity_test_config(&provider.uri()));

        let login = server.get("/api/auth/login").await;
        let state_cookie = cookie_pair(&login, "grimoire_login_state").unwrap();
        let authorize = url::Url::parse(&location(&login)).unwrap();
        let (_, csrf_state) = authorize.query_pairs().find(|(k, _)| k == "state").unwrap();

        let callback = server
            .get("/api/auth/callback")
            .add_query_param("code", "auth-code")
            .add_query_param("state", &csrf_state)
            .add_header("cookie", &state_cookie)
            .await;
        callback.assert_status(StatusCode::BAD_GATEWAY);
        assert!(cookie_pair(&callback, "grimoire_session").is_none());
        assert_eq!(cookie_pair(&callback, "grimoire_login_state").as_deref(), Some("grimoire_login_state="));

        let missing_code = server
            .get("/api/auth/callback")
            .add_query_param("state", &csrf_state)
            .add_header("cookie", &state_cookie)
            .await;
        missing_code.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(cookie_pair(&missing_code, "grimoire_login_state").as_deref(), Some("grimoire_login_state="));
    }

    #[test_log::test(tokio::test)]
    async fn test_login_without_identity_config() {
        let (server, _state) = create_test_server(create_test_config());

        let login = server.get("/api/auth/login").await;
        login.assert_status(StatusCode::BAD_REQUEST);

        let status: Value = server.get("/api/auth/check").await.json();
        assert_eq!(status["success"], true);
        assert_eq!(status["data"]["enabled"], false);
        assert_eq!(status["data"]["configured"], false);
        assert_eq!(status["data"]["authenticated"], false);
    }

    #[test_log::test(tokio::test)]
    async fn test_bearer_token_authenticates_api() {
        let provider = mock_identity_provider().await;
        let (server, _state) = create_test_server(identity_test_config(&provider.uri()));
        let token = mint_token(&id_token_claims(&provider.uri(), "sub-ajani", "ajani@example.com"), TEST_KID);

        let me = server.get("/api/users/me").authorization_bearer(&token).await;
        me.assert_status_ok();
        assert_eq!(me.json::<Value>()["user"]["email"], "ajani@example.com");

        let forged = server.get("/api/users/me").authorization_bearer("a.b.c").await;
        forged.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_clears_session() {
        let provider = mock_identity_provider().await;
        let (server, state) = create_test_server(identity_test_config(&provider.uri()));
        let (_user, cookie) = sign_in(&state, "gideon@example.com").await;

        let logout = server.post("/api/auth/logout").add_header("cookie", &cookie).await;
        logout.assert_status_ok();
        assert_eq!(cookie_pair(&logout, "grimoire_session").as_deref(), Some("grimoire_session="));
        let body: Value = logout.json();
        let logout_url = body["data"]["logout_url"].as_str().unwrap();
        assert!(logout_url.starts_with(&format!("{}/logout", provider.uri())));
    }

    #[test_log::test(tokio::test)]
    async fn test_profile_update() {
        let (server, state) = create_test_server(create_test_config());
        let (_user, cookie) = sign_in(&state, "karn@example.com").await;

        let updated = server
            .patch("/api/users/me")
            .add_header("cookie", &cookie)
            .json(&json!({ "display_name": "Karn", "avatar_url": "https://img.example.com/karn.png" }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["user"]["display_name"], "Karn");

        let invalid = server
            .patch("/api/users/me")
            .add_header("cookie", &cookie)
            .json(&json!({ "avatar_url": "ftp://img.example.com/karn.png" }))
            .await;
        invalid.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_collection_crud_and_isolation() {
        let (server, state) = create_test_server(create_test_config());
        let (_alice, alice) = sign_in(&state, "alice@example.com").await;
        let (_bob, bob) = sign_in(&state, "bob@example.com").await;

        let created = server
            .post("/api/collections")
            .add_header("cookie", &alice)
            .json(&json!({ "name": "  Trade Binder ", "description": "For trading" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: Value = created.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "Trade Binder");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        // Same card twice merges
        for quantity in [2, 3] {
            server
                .post(&format!("/api/collections/{id}/cards"))
                .add_header("cookie", &alice)
                .json(&json!({ "name": "Lightning Bolt", "set_code": "lea", "quantity": quantity }))
                .await
                .assert_status(StatusCode::CREATED);
        }
        let fetched: Value = server.get(&format!("/api/collections/{id}")).add_header("cookie", &alice).await.json();
        assert_eq!(fetched["data"]["card_count"], 5);
        assert_eq!(fetched["data"]["unique_cards"], 1);
        assert_eq!(fetched["data"]["cards"][0]["set_code"], "LEA");
        let card_id = fetched["data"]["cards"][0]["id"].as_str().unwrap().to_string();

        let updated = server
            .patch(&format!("/api/collections/{id}/cards/{card_id}"))
            .add_header("cookie", &alice)
            .json(&json!({ "quantity": 4, "foil": true }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["data"]["cards"][0]["foil"], true);

        let list: Value = server.get("/api/collections").add_header("cookie", &alice).await.json();
        assert_eq!(list["data"]["total_count"], 1);
        assert!(list["data"]["items"][0].get("cards").is_none());

        // Bob can neither see nor touch it
        let bobs_list: Value = server.get("/api/collections").add_header("cookie", &bob).await.json();
        assert_eq!(bobs_list["data"]["total_count"], 0);
        for response in [
            server.get(&format!("/api/collections/{id}")).add_header("cookie", &bob).await,
            server
                .patch(&format!("/api/collections/{id}"))
                .add_header("cookie", &bob)
                .json(&json!({ "name": "Mine" }))
                .await,
            server.delete(&format!("/api/collections/{id}")).add_header("cookie", &bob).await,
            server
                .delete(&format!("/api/collections/{id}/cards/{card_id}"))
                .add_header("cookie", &bob)
                .await,
            server.get(&format!("/api/collections/{id}/export.csv")).add_header("cookie", &bob).await,
        ] {
            response.assert_status(StatusCode::NOT_FOUND);
            assert_eq!(response.json::<Value>()["success"], false);
        }

        let invalid = server
            .post("/api/collections")
            .add_header("cookie", &alice)
            .json(&json!({ "name": "   " }))
            .await;
        invalid.assert_status(StatusCode::BAD_REQUEST);

        let deleted = server.delete(&format!("/api/collections/{id}")).add_header("cookie", &alice).await;
        deleted.assert_status_ok();
        assert_eq!(deleted.json::<Value>()["data"]["id"], id.as_str());
        server
            .get(&format!("/api/collections/{id}"))
            .add_header("cookie", &alice)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    const IMPORT_CSV: &str = "Quantity,Name,Set,Condition\n\
        4,Lightning Bolt,LEA,NM\n\
        ,Counterspell,ICE,LP\n\
        x,Dark Ritual,LEA,NM\n\
        2,lightning bolt,lea,NM\n\
        1,,LEA,NM\n";

    #[test_log::test(tokio::test)]
    async fn test_import_export_and_achievements() {
        let (server, state) = create_test_server(create_test_config());
        let (_user, cookie) = sign_in(&state, "jhoira@example.com").await;

        let created: Value = server
            .post("/api/collections")
            .add_header("cookie", &cookie)
            .json(&json!({ "name": "Imported" }))
            .await
            .json();
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let form = MultipartForm::new().add_part("file", Part::bytes(IMPORT_CSV.as_bytes()).file_name("cards.csv"));
        let imported = server
            .post(&format!("/api/collections/{id}/import"))
            .add_header("cookie", &cookie)
            .multipart(form)
            .await;
        imported.assert_status_ok();
        let body: Value = imported.json();
        assert_eq!(body["data"]["added"], 2);
        assert_eq!(body["data"]["merged"], 1);
        assert_eq!(body["data"]["copies"], 7);
        assert_eq!(body["data"]["collection"]["card_count"], 7);
        let rejected: Vec<u64> = body["data"]["rejected"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["line"].as_u64().unwrap())
            .collect();
        assert_eq!(rejected, vec![4, 6]);

        let export = server
            .get(&format!("/api/collections/{id}/export.csv"))
            .add_header("cookie", &cookie)
            .await;
        export.assert_status_ok();
        assert!(export.header(header::CONTENT_TYPE).to_str().unwrap().starts_with("text/csv"));
        let csv = export.text();
        assert_eq!(csv.lines().next(), Some("Name,Set,Quantity"));
        assert!(csv.contains("Lightning Bolt,LEA,6"));
        assert!(csv.contains("Counterspell,ICE,1"));

        let achievements: Value = server.get("/api/achievements").add_header("cookie", &cookie).await.json();
        let unlocked: Vec<&str> = achievements["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["unlocked"] == true)
            .map(|a| a["code"].as_str().unwrap())
            .collect();
        assert!(unlocked.contains(&"first_collection"));
        assert!(unlocked.contains(&"bulk_loader"));
        assert!(!unlocked.contains(&"hoarder"));
    }

    #[test_log::test(tokio::test)]
    async fn test_import_rejects_bad_files() {
        let mut config = create_test_config();
        config.import.max_file_size = 64;
        let (server, state) = create_test_server(config);
        let (_user, cookie) = sign_in(&state, "urza@example.com").await;

        let created: Value = server
            .post("/api/collections")
            .add_header("cookie", &cookie)
            .json(&json!({ "name": "Workshop" }))
            .await
            .json();
        let id = created["data"]["id"].as_str().unwrap().to_string();
        let url = format!("/api/collections/{id}/import");

        let missing_column = MultipartForm::new().add_part("file", Part::bytes(b"Name,Set\nSol Ring,LEA\n".as_slice()).file_name("a.csv"));
        let response = server.post(&url).add_header("cookie", &cookie).multipart(missing_column).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].as_str().unwrap().contains("quantity"));

        let too_big = MultipartForm::new().add_part("file", Part::bytes(IMPORT_CSV.as_bytes()).file_name("b.csv"));
        server
            .post(&url)
            .add_header("cookie", &cookie)
            .multipart(too_big)
            .await
            .assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let wrong_field = MultipartForm::new().add_text("notes", "no file here");
        server
            .post(&url)
            .add_header("cookie", &cookie)
            .multipart(wrong_field)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Nothing was merged
        let fetched: Value = server.get(&format!("/api/collections/{id}")).add_header("cookie", &cookie).await.json();
        assert_eq!(fetched["data"]["card_count"], 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_deck_boards_and_proxies() {
        let (server, state) = create_test_server(create_test_config());
        let (_user, cookie) = sign_in(&state, "yawgmoth@example.com").await;

        let created = server
            .post("/api/decks")
            .add_header("cookie", &cookie)
            .json(&json!({ "name": "Phyrexian Arena", "format": "Commander" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

        // No cards yet
        server
            .get(&format!("/api/decks/{id}/proxies.pdf"))
            .add_header("cookie", &cookie)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        for card in [
            json!({ "name": "Yawgmoth, Thran Physician", "set_code": "MH1", "board": "commander" }),
            json!({ "name": "Swamp", "quantity": 10 }),
            json!({ "name": "Duress", "set_code": "M19", "quantity": 2, "board": "sideboard" }),
        ] {
            server
                .post(&format!("/api/decks/{id}/cards"))
                .add_header("cookie", &cookie)
                .json(&card)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let deck: Value = server.get(&format!("/api/decks/{id}")).add_header("cookie", &cookie).await.json();
        assert_eq!(deck["data"]["format"], "commander");
        assert_eq!(deck["data"]["counts"], json!({ "main": 10, "sideboard": 2, "commander": 1 }));

        let pdf = server
            .get(&format!("/api/decks/{id}/proxies.pdf"))
            .add_header("cookie", &cookie)
            .await;
        pdf.assert_status_ok();
        assert_eq!(pdf.header(header::CONTENT_TYPE), "application/pdf");
        assert!(
            pdf.header(header::CONTENT_DISPOSITION)
                .to_str()
                .unwrap()
                .contains("Phyrexian_Arena.pdf")
        );
        let document = lopdf::Document::load_mem(pdf.as_bytes()).unwrap();
        assert_eq!(document.get_pages().len(), 2);

        let sideboard = server
            .get(&format!("/api/decks/{id}/proxies.pdf"))
            .add_query_param("board", "sideboard")
            .add_header("cookie", &cookie)
            .await;
        sideboard.assert_status_ok();
        assert_eq!(lopdf::Document::load_mem(sideboard.as_bytes()).unwrap().get_pages().len(), 1);

        let achievements: Value = server.get("/api/achievements").add_header("cookie", &cookie).await.json();
        let first_deck = achievements["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["code"] == "first_deck")
            .unwrap()
            .clone();
        assert_eq!(first_deck["unlocked"], true);
        assert_eq!(first_deck["progress"], 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_moving_card_between_boards_merges() {
        let (server, state) = create_test_server(create_test_config());
        let (_user, cookie) = sign_in(&state, "liliana@example.com").await;

        let created: Value = server
            .post("/api/decks")
            .add_header("cookie", &cookie)
            .json(&json!({ "name": "Mono Black" }))
            .await
            .json();
        let id = created["data"]["id"].as_str().unwrap().to_string();

        server
            .post(&format!("/api/decks/{id}/cards"))
            .add_header("cookie", &cookie)
            .json(&json!({ "name": "Swamp", "quantity": 2 }))
            .await
            .assert_status(StatusCode::CREATED);
        let deck: Value = server
            .post(&format!("/api/decks/{id}/cards"))
            .add_header("cookie", &cookie)
            .json(&json!({ "name": "Swamp", "quantity": 3, "board": "sideboard" }))
            .await
            .json();
        let side_id = deck["data"]["cards"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["board"] == "sideboard")
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let moved = server
            .patch(&format!("/api/decks/{id}/cards/{side_id}"))
            .add_header("cookie", &cookie)
            .json(&json!({ "board": "main" }))
            .await;
        moved.assert_status_ok();
        let body: Value = moved.json();
        let cards = body["data"]["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0]["quantity"], 5);
        assert_eq!(body["data"]["counts"], json!({ "main": 5, "sideboard": 0, "commander": 0 }));
    }

    #[test_log::test(tokio::test)]
    async fn test_favorites() {
        let (server, state) = create_test_server(create_test_config());
        let (_user, cookie) = sign_in(&state, "teferi@example.com").await;

        let card = json!({ "card_name": "Time Walk", "set_code": "LEA", "note": "someday" });
        let created = server.post("/api/favorites").add_header("cookie", &cookie).json(&card).await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

        let duplicate = server
            .post("/api/favorites")
            .add_header("cookie", &cookie)
            .json(&json!({ "card_name": "time walk", "set_code": "lea" }))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            duplicate.json::<Value>(),
            json!({ "success": false, "error": "This card is already in your favorites" })
        );

        let noted = server
            .patch(&format!("/api/favorites/{id}"))
            .add_header("cookie", &cookie)
            .json(&json!({ "note": "never" }))
            .await;
        noted.assert_status_ok();
        assert_eq!(noted.json::<Value>()["data"]["note"], "never");

        server
            .delete(&format!("/api/favorites/{id}"))
            .add_header("cookie", &cookie)
            .await
            .assert_status_ok();
        let list: Value = server.get("/api/favorites").add_header("cookie", &cookie).await.json();
        assert_eq!(list["data"]["total_count"], 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_page_guard() {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<html>grimoire</html>").unwrap();

        let mut config = create_test_config();
        config.frontend.static_dir = Some(static_dir.path().to_path_buf());
        let (server, state) = create_test_server(config);

        // Public pages are served as-is
        let home = server.get("/").await;
        home.assert_status_ok();
        assert!(home.text().contains("grimoire"));

        // Protected pages need a real session
        let guarded = server.get("/decks/42").add_query_param("tab", "main").await;
        guarded.assert_status(StatusCode::FOUND);
        assert_eq!(location(&guarded), "/api/auth/login?return_to=%2Fdecks%2F42%3Ftab%3Dmain");

        let bogus = server.get("/collections").add_header("cookie", "grimoire_session=anything").await;
        bogus.assert_status(StatusCode::FOUND);

        let (_user, cookie) = sign_in(&state, "elspeth@example.com").await;
        let allowed = server.get("/collections").add_header("cookie", &cookie).await;
        allowed.assert_status_ok();
        assert!(allowed.text().contains("grimoire"));
    }

    #[test_log::test(tokio::test)]
    async fn test_page_guard_leaves_sign_in_reachable() {
        let provider = mock_identity_provider().await;
        let mut config = identity_test_config(&provider.uri());
        config.frontend.protected_paths = vec!["/".to_string()];
        let (server, _state) = create_test_server(config);

        let login = server.get("/api/auth/login").await;
        login.assert_status(StatusCode::FOUND);
        assert!(location(&login).starts_with(&provider.uri()));

        server.get("/api/collections").await.assert_status(StatusCode::UNAUTHORIZED);
        server.get("/healthz").await.assert_status_ok();

        let page = server.get("/decks").await;
        page.assert_status(StatusCode::FOUND);
        assert_eq!(location(&page), "/api/auth/login?return_to=%2Fdecks");
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_origins() {
        let mut config = create_test_config();
        config.security.cors.allowed_origins = vec![crate::config::CorsOrigin::Wildcard];
        config.security.cors.allow_credentials = false;
        config.validate().unwrap();
        let (server, _state) = create_test_server(config);

        let response = server.get("/healthz").add_header("origin", "https://anywhere.example.com").await;
        response.assert_status_ok();
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");

        let mut config = create_test_config();
        config.security.cors.allowed_origins =
            vec![crate::config::CorsOrigin::Url(url::Url::parse("https://app.example.com/").unwrap())];
        let (server, _state) = create_test_server(config);

        let allowed = server.get("/healthz").add_header("origin", "https://app.example.com").await;
        assert_eq!(allowed.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "https://app.example.com");
        let foreign = server.get("/healthz").add_header("origin", "https://evil.example.com").await;
        assert!(foreign.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_metrics_endpoint() {
        let mut config = create_test_config();
        config.enable_metrics = true;
        let (server, _state) = create_test_server(config);

        server.get("/healthz").await.assert_status_ok();
        let metrics = server.get("/internal/metrics").await;
        metrics.assert_status_ok();
        assert!(metrics.text().contains("# TYPE") || metrics.text().contains("axum_http_requests"));
    }
}
