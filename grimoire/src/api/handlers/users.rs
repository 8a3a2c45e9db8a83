use axum::{Json, extract::State};

use super::not_found;
use crate::{
    AppState,
    api::models::users::{CurrentUser, UserEnvelope, UserUpdate},
    db::{handlers::Users, models::users::UserUpdateDBRequest},
    errors::Result,
};

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "The signed-in user", body = UserEnvelope),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserEnvelope>> {
    let user = Users::new(state.store.as_ref())
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| not_found("User", current_user.id))?;
    Ok(Json(UserEnvelope::from(user)))
}

#[utoipa::path(
    patch,
    path = "/users/me",
    tag = "users",
    summary = "Update current user",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Profile updated", body = UserEnvelope),
        (status = 400, description = "Invalid display name or avatar URL"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_current_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserEnvelope>> {
    let request = UserUpdateDBRequest::try_from(update)?;
    let user = Users::new(state.store.as_ref()).update(current_user.id, &request).await?;
    Ok(Json(UserEnvelope::from(user)))
}
