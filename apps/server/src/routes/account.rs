//! Account endpoints: load (with settlement) and reset.

use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use ledger::{snapshot, AccountSnapshot};
use market_core::HourKey;
use market_gen::accounts::{load_settled_account, reset_account};
use market_gen::get_or_create_market_hour;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountRequest {
    pub player_id: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub ok: bool,
    pub account: AccountSnapshot,
}

fn player_id(req: &AccountRequest) -> AppResult<&str> {
    let id = req.player_id.trim();
    if id.is_empty() {
        return Err(AppError::BadRequest("Missing playerId".into()));
    }
    Ok(id)
}

/// `POST /api/account/get`: load (creating on first sight), settle any
/// delistings, and mark to this hour's prices.
pub async fn get(
    State(state): State<SharedState>,
    Json(req): Json<AccountRequest>,
) -> AppResult<Json<AccountResponse>> {
    let player_id = player_id(&req)?;
    let hour = HourKey::now();
    let market = get_or_create_market_hour(&state.store, state.llm(), &hour, &state.gen).await?;
    let account = load_settled_account(&state.store, &market, player_id).await;
    Ok(Json(AccountResponse {
        ok: true,
        account: snapshot(&account, &market),
    }))
}

/// `POST /api/account/reset`: back to the starting balance.
pub async fn reset(
    State(state): State<SharedState>,
    Json(req): Json<AccountRequest>,
) -> AppResult<Json<AccountResponse>> {
    let player_id = player_id(&req)?;
    let hour = HourKey::now();
    let market = get_or_create_market_hour(&state.store, state.llm(), &hour, &state.gen).await?;
    let account = reset_account(&state.store, player_id).await;
    Ok(Json(AccountResponse {
        ok: true,
        account: snapshot(&account, &market),
    }))
}
