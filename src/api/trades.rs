use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_user_address, AppState};
use crate::domain::{Coin, CompletedTrade};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesQuery {
    pub user: String,
    pub coin: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesResponse {
    pub trades: Vec<TradeDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub coin: String,
    pub margin_mode: String,
    pub direction: String,
    pub size: String,
    pub entry_price: String,
    pub close_price: String,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub total_fee: String,
    pub pnl: String,
    pub fill_count: i64,
}

impl From<CompletedTrade> for TradeDto {
    fn from(t: CompletedTrade) -> Self {
        TradeDto {
            coin: t.coin.as_str().to_string(),
            margin_mode: t.margin_mode.as_str().to_string(),
            direction: t.direction.as_str().to_string(),
            size: t.size.to_canonical_string(),
            entry_price: t.entry_price.to_canonical_string(),
            close_price: t.close_price.to_canonical_string(),
            start_time_ms: t.start_time_ms.as_ms(),
            end_time_ms: t.end_time_ms.as_ms(),
            total_fee: t.total_fee.to_canonical_string(),
            pnl: t.pnl.to_canonical_string(),
            fill_count: t.fill_count,
        }
    }
}

/// Completed trades of a user, optionally for one coin, oldest first.
pub async fn get_trades(
    Query(params): Query<TradesQuery>,
    State(state): State<AppState>,
) -> Result<Json<TradesResponse>, AppError> {
    let user = parse_user_address(&params.user)?;

    let coin = match params.coin.as_deref() {
        Some("") | None => None,
        Some(c) => Some(Coin::new(c.to_string())),
    };

    let trades = state
        .repo
        .query_completed_trades(&user, coin.as_ref())
        .await?
        .into_iter()
        .map(TradeDto::from)
        .collect();

    Ok(Json(TradesResponse { trades }))
}
