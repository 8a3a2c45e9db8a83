use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::{attachment, collections::render_proxies, not_found, or_not_found, refresh_achievements};
use crate::{
    AppState,
    api::models::{
        cards::{CardCreate, CardUpdate},
        decks::{DeckCreate, DeckResponse, DeckUpdate, ProxyQuery},
        envelope::{ApiResponse, Deleted, ok},
        pagination::{PaginatedResponse, Pagination},
        users::CurrentUser,
    },
    db::{
        handlers::{Decks, Repository},
        models::{
            cards::{CardCreateDBRequest, CardUpdateDBRequest},
            decks::{DeckCreateDBRequest, DeckUpdateDBRequest},
        },
    },
    errors::Result,
    proxies::ProxyCard,
    types::{CardEntryId, DeckId},
};

#[utoipa::path(
    get,
    path = "/decks",
    tag = "decks",
    summary = "List decks",
    params(Pagination),
    responses(
        (status = 200, description = "The caller's decks, newest first", body = ApiResponse<PaginatedResponse<DeckResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_decks(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<DeckResponse>>>> {
    let filter = pagination.filter();
    let mut repo = Decks::new(state.store.as_ref(), current_user.id);

    let decks = repo.list(&filter).await?;
    let total_count = repo.count().await?;

    let items = decks.into_iter().map(DeckResponse::summary).collect();
    Ok(ok(PaginatedResponse::page(items, total_count, &filter)))
}

#[utoipa::path(
    post,
    path = "/decks",
    tag = "decks",
    summary = "Create deck",
    request_body = DeckCreate,
    responses(
        (status = 201, description = "Deck created", body = ApiResponse<DeckResponse>),
        (status = 400, description = "Invalid deck"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_deck(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<DeckCreate>,
) -> Result<(StatusCode, Json<ApiResponse<DeckResponse>>)> {
    let request = DeckCreateDBRequest::try_from(create)?;
    let deck = Decks::new(state.store.as_ref(), current_user.id).create(&request).await?;
    refresh_achievements(&state, current_user.id).await;

    Ok((StatusCode::CREATED, ok(DeckResponse::from(deck))))
}

#[utoipa::path(
    get,
    path = "/decks/{id}",
    tag = "decks",
    summary = "Get deck",
    params(("id" = uuid::Uuid, Path, description = "Deck ID")),
    responses(
        (status = 200, description = "Deck with its cards", body = ApiResponse<DeckResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_deck(State(state): State<AppState>, Path(id): Path<DeckId>, current_user: CurrentUser) -> Result<Json<ApiResponse<DeckResponse>>> {
    let deck = Decks::new(state.store.as_ref(), current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Deck", id))?;
    Ok(ok(DeckResponse::from(deck)))
}

#[utoipa::path(
    patch,
    path = "/decks/{id}",
    tag = "decks",
    summary = "Update deck",
    request_body = DeckUpdate,
    params(("id" = uuid::Uuid, Path, description = "Deck ID")),
    responses(
        (status = 200, description = "Deck updated", body = ApiResponse<DeckResponse>),
        (status = 400, description = "Invalid update"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_deck(
    State(state): State<AppState>,
    Path(id): Path<DeckId>,
    current_user: CurrentUser,
    Json(update): Json<DeckUpdate>,
) -> Result<Json<ApiResponse<DeckResponse>>> {
    let request = DeckUpdateDBRequest::try_from(update)?;
    let deck = Decks::new(state.store.as_ref(), current_user.id)
        .update(id, &request)
        .await
        .map_err(or_not_found("Deck", id))?;
    Ok(ok(DeckResponse::from(deck)))
}

#[utoipa::path(
    delete,
    path = "/decks/{id}",
    tag = "decks",
    summary = "Delete deck",
    params(("id" = uuid::Uuid, Path, description = "Deck ID")),
    responses(
        (status = 200, description = "Deck deleted", body = ApiResponse<Deleted>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_deck(State(state): State<AppState>, Path(id): Path<DeckId>, current_user: CurrentUser) -> Result<Json<ApiResponse<Deleted>>> {
    if !Decks::new(state.store.as_ref(), current_user.id).delete(id).await? {
        return Err(not_found("Deck", id));
    }
    Ok(ok(Deleted { id }))
}

#[utoipa::path(
    post,
    path = "/decks/{id}/cards",
    tag = "decks",
    summary = "Add card to deck",
    description = "Adds copies of a card to a board. An entry for the same card on the same board absorbs the copies.",
    request_body = CardCreate,
    params(("id" = uuid::Uuid, Path, description = "Deck ID")),
    responses(
        (status = 201, description = "Card added", body = ApiResponse<DeckResponse>),
        (status = 400, description = "Invalid card"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_card(
    State(state): State<AppState>,
    Path(id): Path<DeckId>,
    current_user: CurrentUser,
    Json(card): Json<CardCreate>,
) -> Result<(StatusCode, Json<ApiResponse<DeckResponse>>)> {
    let request = CardCreateDBRequest::try_from(card)?;
    let (deck, _entry_id) = Decks::new(state.store.as_ref(), current_user.id)
        .add_card(id, &request)
        .await
        .map_err(or_not_found("Deck", id))?;
    Ok((StatusCode::CREATED, ok(DeckResponse::from(deck))))
}

#[utoipa::path(
    patch,
    path = "/decks/{id}/cards/{card_id}",
    tag = "decks",
    summary = "Update deck card",
    description = "Change the quantity of a card or move it to another board.",
    request_body = CardUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Deck ID"),
        ("card_id" = uuid::Uuid, Path, description = "Card entry ID"),
    ),
    responses(
        (status = 200, description = "Card updated", body = ApiResponse<DeckResponse>),
        (status = 400, description = "Invalid update"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck or card not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_card(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(DeckId, CardEntryId)>,
    current_user: CurrentUser,
    Json(update): Json<CardUpdate>,
) -> Result<Json<ApiResponse<DeckResponse>>> {
    let request = CardUpdateDBRequest::try_from(update)?;
    let deck = Decks::new(state.store.as_ref(), current_user.id)
        .update_card(id, card_id, &request)
        .await
        .map_err(or_not_found("Card", card_id))?;
    Ok(ok(DeckResponse::from(deck)))
}

#[utoipa::path(
    delete,
    path = "/decks/{id}/cards/{card_id}",
    tag = "decks",
    summary = "Remove deck card",
    params(
        ("id" = uuid::Uuid, Path, description = "Deck ID"),
        ("card_id" = uuid::Uuid, Path, description = "Card entry ID"),
    ),
    responses(
        (status = 200, description = "Card removed", body = ApiResponse<DeckResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck or card not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_card(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(DeckId, CardEntryId)>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<DeckResponse>>> {
    let deck = Decks::new(state.store.as_ref(), current_user.id)
        .remove_card(id, card_id)
        .await
        .map_err(or_not_found("Card", card_id))?;
    Ok(ok(DeckResponse::from(deck)))
}

#[utoipa::path(
    get,
    path = "/decks/{id}/proxies.pdf",
    tag = "decks",
    summary = "Proxy sheet for a deck",
    description = "One proxy per card copy, nine to a US Letter page. Pass `board` to print a single board.",
    params(("id" = uuid::Uuid, Path, description = "Deck ID"), ProxyQuery),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf", body = Vec<u8>),
        (status = 400, description = "Nothing to print or too many copies"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deck not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn deck_proxies(
    State(state): State<AppState>,
    Path(id): Path<DeckId>,
    Query(query): Query<ProxyQuery>,
    current_user: CurrentUser,
) -> Result<impl IntoResponse> {
    let deck = Decks::new(state.store.as_ref(), current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Deck", id))?;

    let cards: Vec<ProxyCard> = deck
        .cards
        .iter()
        .filter(|card| query.board.is_none_or(|board| card.board == board))
        .map(ProxyCard::from)
        .collect();

    let pdf = render_proxies(&state, deck.name.clone(), cards).await?;
    Ok((attachment("application/pdf", &deck.name, "pdf"), pdf))
}
