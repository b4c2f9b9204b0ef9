//! `POST /api/trade/execute`: parse and apply one trade command.
//!
//! Delistings settle against the account before the trade runs, so a player
//! holding a just-delisted ticker sees the payout reflected in the receipt.

use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use ledger::{apply_trade, parse_command, TradeReceipt};
use market_core::HourKey;
use market_gen::accounts::{load_settled_account, save_account};
use market_gen::get_or_create_market_hour;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeRequest {
    pub player_id: String,
    pub command: String,
}

pub async fn execute(
    State(state): State<SharedState>,
    Json(req): Json<TradeRequest>,
) -> AppResult<Json<TradeReceipt>> {
    let player_id = req.player_id.trim();
    if player_id.is_empty() {
        return Err(AppError::BadRequest("Missing playerId".into()));
    }

    let hour = HourKey::now();
    let market = get_or_create_market_hour(&state.store, state.llm(), &hour, &state.gen).await?;
    let command = parse_command(&req.command)?;

    let mut account = load_settled_account(&state.store, &market, player_id).await;
    let receipt = apply_trade(&mut account, &market, &command)?;
    save_account(&state.store, &account).await;

    tracing::info!(
        player = player_id,
        side = ?receipt.side,
        qty = receipt.qty,
        ticker = %receipt.company_id,
        price = %receipt.price,
        "trade executed"
    );
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_is_lenient() {
        let req: TradeRequest =
            serde_json::from_str(r#"{"playerId": "p1", "command": "Buy 10 FIRE"}"#).unwrap();
        assert_eq!(req.player_id, "p1");
        // Missing fields default to empty and fail validation later.
        let req: TradeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.player_id.is_empty());
    }
}
