use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::BytesMut;
use tracing::{info, warn};

use super::{attachment, not_found, or_not_found, refresh_achievements};
use crate::{
    AppState,
    api::models::{
        cards::{CardCreate, CardUpdate},
        collections::{CollectionCreate, CollectionResponse, CollectionUpdate, ImportResponse},
        envelope::{ApiResponse, Deleted, ok},
        pagination::{PaginatedResponse, Pagination},
        users::CurrentUser,
    },
    db::{
        handlers::{Collections, Repository, Users},
        models::{
            cards::{CardCreateDBRequest, CardUpdateDBRequest},
            collections::{CollectionCreateDBRequest, CollectionRecord, CollectionUpdateDBRequest},
        },
    },
    errors::{Error, Result},
    import,
    proxies::{self, ProxyCard},
    types::{CardEntryId, CollectionId},
};

async fn load(state: &AppState, current_user: &CurrentUser, id: CollectionId) -> Result<CollectionRecord> {
    Collections::new(state.store.as_ref(), current_user.id)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Collection", id))
}

#[utoipa::path(
    get,
    path = "/collections",
    tag = "collections",
    summary = "List collections",
    params(Pagination),
    responses(
        (status = 200, description = "The caller's collections, newest first", body = ApiResponse<PaginatedResponse<CollectionResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_collections(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<CollectionResponse>>>> {
    let filter = pagination.filter();
    let mut repo = Collections::new(state.store.as_ref(), current_user.id);

    let collections = repo.list(&filter).await?;
    let total_count = repo.count().await?;

    let items = collections.into_iter().map(CollectionResponse::summary).collect();
    Ok(ok(PaginatedResponse::page(items, total_count, &filter)))
}

#[utoipa::path(
    post,
    path = "/collections",
    tag = "collections",
    summary = "Create collection",
    request_body = CollectionCreate,
    responses(
        (status = 201, description = "Collection created", body = ApiResponse<CollectionResponse>),
        (status = 400, description = "Invalid name or description"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_collection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<CollectionCreate>,
) -> Result<(StatusCode, Json<ApiResponse<CollectionResponse>>)> {
    let request = CollectionCreateDBRequest::try_from(create)?;
    let collection = Collections::new(state.store.as_ref(), current_user.id).create(&request).await?;
    refresh_achievements(&state, current_user.id).await;

    Ok((StatusCode::CREATED, ok(CollectionResponse::from(collection))))
}

#[utoipa::path(
    get,
    path = "/collections/{id}",
    tag = "collections",
    summary = "Get collection",
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection with its cards", body = ApiResponse<CollectionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<CollectionResponse>>> {
    let collection = load(&state, &current_user, id).await?;
    Ok(ok(CollectionResponse::from(collection)))
}

#[utoipa::path(
    patch,
    path = "/collections/{id}",
    tag = "collections",
    summary = "Update collection",
    request_body = CollectionUpdate,
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection updated", body = ApiResponse<CollectionResponse>),
        (status = 400, description = "Invalid name or description"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
    Json(update): Json<CollectionUpdate>,
) -> Result<Json<ApiResponse<CollectionResponse>>> {
    let request = CollectionUpdateDBRequest::try_from(update)?;
    let collection = Collections::new(state.store.as_ref(), current_user.id)
        .update(id, &request)
        .await
        .map_err(or_not_found("Collection", id))?;
    Ok(ok(CollectionResponse::from(collection)))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}",
    tag = "collections",
    summary = "Delete collection",
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection deleted", body = ApiResponse<Deleted>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<Deleted>>> {
    if !Collections::new(state.store.as_ref(), current_user.id).delete(id).await? {
        return Err(not_found("Collection", id));
    }
    Ok(ok(Deleted { id }))
}

#[utoipa::path(
    post,
    path = "/collections/{id}/cards",
    tag = "collections",
    summary = "Add card to collection",
    description = "Adds copies of a card. An entry with the same name, set and finish absorbs the copies.",
    request_body = CardCreate,
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 201, description = "Card added", body = ApiResponse<CollectionResponse>),
        (status = 400, description = "Invalid card"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_card(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
    Json(card): Json<CardCreate>,
) -> Result<(StatusCode, Json<ApiResponse<CollectionResponse>>)> {
    let request = CardCreateDBRequest::try_from(card)?;
    let (collection, _entry_id) = Collections::new(state.store.as_ref(), current_user.id)
        .add_card(id, &request)
        .await
        .map_err(or_not_found("Collection", id))?;
    refresh_achievements(&state, current_user.id).await;

    Ok((StatusCode::CREATED, ok(CollectionResponse::from(collection))))
}

#[utoipa::path(
    patch,
    path = "/collections/{id}/cards/{card_id}",
    tag = "collections",
    summary = "Update collection card",
    request_body = CardUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Collection ID"),
        ("card_id" = uuid::Uuid, Path, description = "Card entry ID"),
    ),
    responses(
        (status = 200, description = "Card updated", body = ApiResponse<CollectionResponse>),
        (status = 400, description = "Invalid update"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection or card not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_card(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(CollectionId, CardEntryId)>,
    current_user: CurrentUser,
    Json(update): Json<CardUpdate>,
) -> Result<Json<ApiResponse<CollectionResponse>>> {
    let request = CardUpdateDBRequest::try_from(update)?;
    let collection = Collections::new(state.store.as_ref(), current_user.id)
        .update_card(id, card_id, &request)
        .await
        .map_err(or_not_found("Card", card_id))?;
    refresh_achievements(&state, current_user.id).await;

    Ok(ok(CollectionResponse::from(collection)))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}/cards/{card_id}",
    tag = "collections",
    summary = "Remove collection card",
    params(
        ("id" = uuid::Uuid, Path, description = "Collection ID"),
        ("card_id" = uuid::Uuid, Path, description = "Card entry ID"),
    ),
    responses(
        (status = 200, description = "Card removed", body = ApiResponse<CollectionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection or card not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_card(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(CollectionId, CardEntryId)>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<CollectionResponse>>> {
    let collection = Collections::new(state.store.as_ref(), current_user.id)
        .remove_card(id, card_id)
        .await
        .map_err(or_not_found("Card", card_id))?;
    Ok(ok(CollectionResponse::from(collection)))
}

#[utoipa::path(
    post,
    path = "/collections/{id}/import",
    tag = "collections",
    summary = "Import cards from CSV",
    description = "Upload a CSV file with `Name`, `Set` and `Quantity` columns as the multipart field `file`. \
        Invalid rows are skipped and reported; valid rows are merged into the collection.",
    request_body(content_type = "multipart/form-data", description = "CSV file in the `file` field"),
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Import summary", body = ApiResponse<ImportResponse>),
        (status = 400, description = "Missing columns, no valid rows or too many rows"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
        (status = 413, description = "File too large"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(collection_id = %id))]
pub async fn import_cards(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImportResponse>>> {
    // Fail on a foreign or missing collection before reading the upload
    load(&state, &current_user, id).await?;

    let max_file_size = state.config.import.max_file_size;
    let mut file: Option<BytesMut> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let buffer = file.get_or_insert_with(BytesMut::new);
        while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read file chunk: {e}"),
        })? {
            if buffer.len() + chunk.len() > max_file_size {
                warn!(max_file_size, "Import file size limit exceeded, aborting upload");
                return Err(import::ImportError::TooLarge { limit: max_file_size }.into());
            }
            buffer.extend_from_slice(&chunk);
        }
    }

    let file = file.ok_or_else(|| Error::BadRequest {
        message: "Missing multipart field 'file'".to_string(),
    })?;

    let parsed = import::parse(&file, &state.config.import)?;
    let (collection, outcome) = Collections::new(state.store.as_ref(), current_user.id)
        .merge_cards(id, &parsed.cards)
        .await
        .map_err(or_not_found("Collection", id))?;
    Users::new(state.store.as_ref()).record_import(current_user.id).await?;
    refresh_achievements(&state, current_user.id).await;

    info!(
        added = outcome.added,
        merged = outcome.merged,
        rejected = parsed.errors.len(),
        "Imported cards from CSV"
    );

    Ok(ok(ImportResponse::new(collection, outcome, parsed.errors)))
}

#[utoipa::path(
    get,
    path = "/collections/{id}/export.csv",
    tag = "collections",
    summary = "Export collection as CSV",
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "CSV with Name, Set and Quantity columns", content_type = "text/csv", body = String),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn export_cards(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
) -> Result<impl IntoResponse> {
    let collection = load(&state, &current_user, id).await?;
    let csv = import::export(&collection.cards)?;
    Ok((attachment("text/csv; charset=utf-8", &collection.name, "csv"), csv))
}

#[utoipa::path(
    get,
    path = "/collections/{id}/proxies.pdf",
    tag = "collections",
    summary = "Proxy sheet for a collection",
    description = "One proxy per card copy, nine to a US Letter page.",
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf", body = Vec<u8>),
        (status = 400, description = "Collection is empty or has too many copies"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn collection_proxies(
    State(state): State<AppState>,
    Path(id): Path<CollectionId>,
    current_user: CurrentUser,
) -> Result<impl IntoResponse> {
    let collection = load(&state, &current_user, id).await?;
    let cards: Vec<ProxyCard> = collection.cards.iter().map(ProxyCard::from).collect();
    let pdf = render_proxies(&state, collection.name.clone(), cards).await?;
    Ok((attachment("application/pdf", &collection.name, "pdf"), pdf))
}

/// Render a proxy sheet off the async runtime
pub(crate) async fn render_proxies(state: &AppState, title: String, cards: Vec<ProxyCard>) -> Result<Vec<u8>> {
    let limits = state.config.proxies.clone();
    let pdf = tokio::task::spawn_blocking(move || proxies::render(&title, &cards, &limits))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn proxy rendering task: {e}"),
        })??;
    Ok(pdf)
}
