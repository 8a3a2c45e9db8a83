use axum::{Json, extract::State};

use crate::{
    AppState,
    achievements,
    api::models::{
        achievements::AchievementResponse,
        envelope::{ApiResponse, ok},
        users::CurrentUser,
    },
    errors::Result,
};

#[utoipa::path(
    get,
    path = "/achievements",
    tag = "achievements",
    summary = "List achievements",
    description = "Every achievement in the catalog with the caller's progress towards it.",
    responses(
        (status = 200, description = "Achievement catalog with progress", body = ApiResponse<Vec<AchievementResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_achievements(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<Vec<AchievementResponse>>>> {
    // Catch up on anything earned before evaluation ran, e.g. after a catalog change
    achievements::evaluate(state.store.as_ref(), current_user.id).await?;

    let entries = achievements::progress(state.store.as_ref(), current_user.id).await?;
    Ok(ok(entries.into_iter().map(AchievementResponse::from).collect()))
}
