use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::auth::CurrentUser,
    models::{ApiResponse, Series, SeriesCreateDto, SeriesInfo},
    routes::{invalid_body, invalid_path, AppState},
};

/// POST /api/series
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<SeriesCreateDto>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Series>>)> {
    let Json(dto) = payload.map_err(invalid_body)?;
    let series = state.library.add_series(&user_id, dto).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Series added", series)),
    ))
}

/// GET /api/series
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Series>>>> {
    let series = state.library.get_all(&user_id).await?;
    Ok(Json(ApiResponse::new("", series)))
}

/// GET /api/series/titles/:title
pub async fn by_title(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(title): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<Series>>>> {
    let series = state.library.get_by_title(&user_id, &title).await?;
    Ok(Json(ApiResponse::new("", series)))
}

/// GET /api/series/:id/infos
pub async fn infos(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    series_id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ApiResponse<SeriesInfo>>> {
    let Path(series_id) = series_id.map_err(invalid_path)?;
    let infos = state.library.get_infos(&user_id, series_id).await?;
    Ok(Json(ApiResponse::new("", infos)))
}

/// DELETE /api/series/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    series_id: Result<Path<i32>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(series_id) = series_id.map_err(invalid_path)?;

    if state.library.delete(&user_id, series_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotOwned(
            "An error occurred while deleting the series".to_string(),
        ))
    }
}
