use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::{not_found, or_not_found, refresh_achievements};
use crate::{
    AppState,
    api::models::{
        envelope::{ApiResponse, Deleted, ok},
        favorites::{FavoriteCreate, FavoriteResponse, FavoriteUpdate},
        pagination::{PaginatedResponse, Pagination},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Favorites, Repository},
        models::favorites::{FavoriteCreateDBRequest, FavoriteUpdateDBRequest},
    },
    errors::{Error, Result},
    types::FavoriteId,
};

#[utoipa::path(
    get,
    path = "/favorites",
    tag = "favorites",
    summary = "List favorites",
    params(Pagination),
    responses(
        (status = 200, description = "The caller's favorite cards, newest first", body = ApiResponse<PaginatedResponse<FavoriteResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_favorites(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<FavoriteResponse>>>> {
    let filter = pagination.filter();
    let mut repo = Favorites::new(state.store.as_ref(), current_user.id);

    let favorites = repo.list(&filter).await?;
    let total_count = repo.count().await?;

    let items = favorites.into_iter().map(FavoriteResponse::from).collect();
    Ok(ok(PaginatedResponse::page(items, total_count, &filter)))
}

#[utoipa::path(
    post,
    path = "/favorites",
    tag = "favorites",
    summary = "Add favorite",
    request_body = FavoriteCreate,
    responses(
        (status = 201, description = "Favorite added", body = ApiResponse<FavoriteResponse>),
        (status = 400, description = "Invalid card"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Card is already a favorite"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_favorite(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<FavoriteCreate>,
) -> Result<(StatusCode, Json<ApiResponse<FavoriteResponse>>)> {
    let request = FavoriteCreateDBRequest::try_from(create)?;
    let favorite = Favorites::new(state.store.as_ref(), current_user.id)
        .create(&request)
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => Error::Conflict {
                message: "This card is already in your favorites".to_string(),
            },
            other => Error::Database(other),
        })?;
    refresh_achievements(&state, current_user.id).await;

    Ok((StatusCode::CREATED, ok(FavoriteResponse::from(favorite))))
}

#[utoipa::path(
    patch,
    path = "/favorites/{id}",
    tag = "favorites",
    summary = "Update favorite note",
    request_body = FavoriteUpdate,
    params(("id" = uuid::Uuid, Path, description = "Favorite ID")),
    responses(
        (status = 200, description = "Favorite updated", body = ApiResponse<FavoriteResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Favorite not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_favorite(
    State(state): State<AppState>,
    Path(id): Path<FavoriteId>,
    current_user: CurrentUser,
    Json(update): Json<FavoriteUpdate>,
) -> Result<Json<ApiResponse<FavoriteResponse>>> {
    let request = FavoriteUpdateDBRequest::try_from(update)?;
    let favorite = Favorites::new(state.store.as_ref(), current_user.id)
        .update(id, &request)
        .await
        .map_err(or_not_found("Favorite", id))?;
    Ok(ok(FavoriteResponse::from(favorite)))
}

#[utoipa::path(
    delete,
    path = "/favorites/{id}",
    tag = "favorites",
    summary = "Remove favorite",
    params(("id" = uuid::Uuid, Path, description = "Favorite ID")),
    responses(
        (status = 200, description = "Favorite removed", body = ApiResponse<Deleted>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Favorite not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_favorite(
    State(state): State<AppState>,
    Path(id): Path<FavoriteId>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<Deleted>>> {
    if !Favorites::new(state.store.as_ref(), current_user.id).delete(id).await? {
        return Err(not_found("Favorite", id));
    }
    Ok(ok(Deleted { id }))
}
