use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::{auth::CurrentUser, request_id::RequestId},
    models::{
        ApiResponse, Season, SeasonCreateDto, SeasonDetailsViewed, SeasonInfo, SeasonUpdateDto,
        SeasonsCreateAllDto,
    },
    routes::{invalid_body, invalid_path, AppState},
    services::ContinueWatching,
};

/// POST /api/seasons
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<SeasonCreateDto>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Season>>)> {
    let Json(dto) = payload.map_err(invalid_body)?;
    let season = state.reconciler.add_season(&user_id, dto).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Season added", season)),
    ))
}

/// POST /api/seasons/series/all
pub async fn create_all(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<SeasonsCreateAllDto>, JsonRejection>,
) -> AppResult<Json<ApiResponse<SeasonsCreateAllDto>>> {
    let Json(dto) = payload.map_err(invalid_body)?;
    let series_id = dto.series_id.clone();
    let seasons = state
        .reconciler
        .add_all_seasons(&user_id, &series_id, dto)
        .await?;

    Ok(Json(ApiResponse::new("Seasons added", seasons)))
}

/// GET /api/seasons/series/:id
pub async fn distinct_by_series(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    series_id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ApiResponse<Vec<Season>>>> {
    let Path(series_id) = series_id.map_err(invalid_path)?;
    let seasons = state
        .reconciler
        .get_distinct_seasons_by_series(&user_id, series_id)
        .await?;

    Ok(Json(ApiResponse::new("", seasons)))
}

/// GET /api/seasons/:number/series/:series_id/infos
pub async fn infos(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    params: Result<Path<(i32, i32)>, PathRejection>,
) -> AppResult<Json<ApiResponse<Vec<SeasonInfo>>>> {
    let Path((number, series_id)) = params.map_err(invalid_path)?;
    let infos = state
        .reconciler
        .get_season_infos(&user_id, series_id, number)
        .await?;

    Ok(Json(ApiResponse::new("", infos)))
}

/// GET /api/seasons/series/:id/viewed
pub async fn viewed_details(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    series_id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ApiResponse<Vec<SeasonDetailsViewed>>>> {
    let Path(series_id) = series_id.map_err(invalid_path)?;
    let details = state
        .reconciler
        .get_viewed_details(&user_id, series_id)
        .await?;

    Ok(Json(ApiResponse::new("", details)))
}

/// GET /api/seasons/continue
pub async fn to_continue(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<ApiResponse<ContinueWatching>>> {
    tracing::info!(request_id = %request_id, "Reconciling continue watching");

    let result = state.reconciler.get_to_continue(&user_id).await?;
    let message = match &result {
        ContinueWatching::Complete { .. } => "",
        ContinueWatching::Partial { .. } => "Some series could not be checked against the catalog",
    };

    Ok(Json(ApiResponse::new(message, result)))
}

/// PATCH /api/seasons/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    season_id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<SeasonUpdateDto>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Season>>> {
    let Path(season_id) = season_id.map_err(invalid_path)?;
    let Json(mut dto) = payload.map_err(invalid_body)?;

    if dto.id.is_some_and(|id| id != season_id) {
        return Err(AppError::InvalidInput(
            "Season id in body does not match the path".to_string(),
        ));
    }
    dto.id = Some(season_id);

    let season = state.reconciler.update_season(&user_id, dto).await?;
    Ok(Json(ApiResponse::new("Season updated", season)))
}

/// DELETE /api/seasons/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    season_id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<ApiResponse<()>>> {
    let Path(season_id) = season_id.map_err(invalid_path)?;

    if state.reconciler.delete_season(&user_id, season_id).await? {
        Ok(Json(ApiResponse::empty("Season deleted")))
    } else {
        Err(AppError::NotOwned("Unable to delete the season".to_string()))
    }
}
