//! `POST /api/market/state`: the snapped board for the current UTC hour.

use crate::error::AppResult;
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use market_core::{HourKey, MarketHourState};
use market_gen::get_or_create_market_hour;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MarketStateResponse {
    pub market: MarketHourState,
}

pub async fn market_state(
    State(state): State<SharedState>,
) -> AppResult<Json<MarketStateResponse>> {
    let hour = HourKey::now();
    let market = get_or_create_market_hour(&state.store, state.llm(), &hour, &state.gen).await?;
    Ok(Json(MarketStateResponse { market }))
}
