//! OpenAPI documentation for the `/api` surface.
//!
//! Served as JSON at `/api/openapi.json` and rendered with Scalar at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};

/// Both ways of presenting a session: a provider token or the session cookie.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "An ID or access token issued by the identity provider:\n\n\
                            ```\nAuthorization: Bearer <token>\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "grimoire_session",
                    "Session cookie set by `/api/auth/callback` after signing in through the hosted UI.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "Grimoire API")
    ),
    modifiers(&SecurityAddon),
    paths(
        handlers::auth::login,
        handlers::auth::callback,
        handlers::auth::logout,
        handlers::auth::check,
        handlers::users::get_current_user,
        handlers::users::update_current_user,
        handlers::collections::list_collections,
        handlers::collections::create_collection,
        handlers::collections::get_collection,
        handlers::collections::update_collection,
        handlers::collections::delete_collection,
        handlers::collections::add_card,
        handlers::collections::update_card,
        handlers::collections::remove_card,
        handlers::collections::import_cards,
        handlers::collections::export_cards,
        handlers::collections::collection_proxies,
        handlers::decks::list_decks,
        handlers::decks::create_deck,
        handlers::decks::get_deck,
        handlers::decks::update_deck,
        handlers::decks::delete_deck,
        handlers::decks::add_card,
        handlers::decks::update_card,
        handlers::decks::remove_card,
        handlers::decks::deck_proxies,
        handlers::favorites::list_favorites,
        handlers::favorites::create_favorite,
        handlers::favorites::update_favorite,
        handlers::favorites::delete_favorite,
        handlers::achievements::list_achievements,
    ),
    components(
        schemas(
            models::envelope::ErrorResponse,
            models::envelope::Deleted,
            models::auth::AuthStatus,
            models::auth::LogoutResponse,
            models::users::UserResponse,
            models::users::UserUpdate,
            models::users::UserEnvelope,
            models::cards::CardCreate,
            models::cards::CardUpdate,
            models::cards::CollectionCardResponse,
            models::cards::DeckCardResponse,
            models::collections::CollectionCreate,
            models::collections::CollectionUpdate,
            models::collections::CollectionResponse,
            models::collections::ImportResponse,
            models::decks::DeckCreate,
            models::decks::DeckUpdate,
            models::decks::DeckResponse,
            models::decks::BoardCounts,
            models::favorites::FavoriteCreate,
            models::favorites::FavoriteUpdate,
            models::favorites::FavoriteResponse,
            models::achievements::AchievementResponse,
            crate::import::RowError,
            crate::types::Board,
        )
    ),
    tags(
        (name = "authentication", description = "Sign-in through the hosted identity provider UI."),
        (name = "users", description = "The signed-in user's profile."),
        (name = "collections", description = "Card collections, CSV import and export, and proxy sheets."),
        (name = "decks", description = "Decks with main, sideboard and commander boards."),
        (name = "favorites", description = "Favorite card printings."),
        (name = "achievements", description = "Milestones unlocked by building collections and decks."),
    ),
    info(
        title = "Grimoire API",
        version = "1.0.0",
        description = "Manage a Magic: The Gathering collection: collections, decks, favorites and achievements.

Every response is wrapped in an envelope: `{ \"success\": true, \"data\": ... }` on success and \
`{ \"success\": false, \"error\": \"...\" }` on failure.",
    )
)]
pub struct ApiDoc;
