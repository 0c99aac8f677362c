use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_user_address, AppState};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct WatermarkQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkResponse {
    pub user: String,
    /// Newest stored fill; the next harvest resumes one millisecond later.
    pub latest_fill_time_ms: Option<i64>,
    pub fill_count: i64,
}

/// How far the stored fill history of a user reaches.
pub async fn get_watermark(
    Query(params): Query<WatermarkQuery>,
    State(state): State<AppState>,
) -> Result<Json<WatermarkResponse>, AppError> {
    let user = parse_user_address(&params.user)?;

    let latest = state.repo.latest_fill_time(&user).await?;
    let fill_count = state.repo.count_fills(&user).await?;

    Ok(Json(WatermarkResponse {
        user: user.as_str().to_string(),
        latest_fill_time_ms: latest.map(|t| t.as_ms()),
        fill_count,
    }))
}
