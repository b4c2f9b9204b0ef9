//! Pearly Gates endpoints: start a game, interview the soul, judge it.

use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use gates::{
    ask_soul, get_or_create_profile, judge_soul, load_profile, AskOutcome, GameMode, GatesError,
    Judgment, QAItem, VisibleProfile,
};
use market_core::DateKey;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    pub mode: Option<GameMode>,
    pub date_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub mode: GameMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_key: Option<DateKey>,
    pub game_id: String,
    pub visible: VisibleProfile,
}

fn parse_date_key(raw: &Option<String>) -> AppResult<Option<DateKey>> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateKey::parse(s)
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid dateKey {s:?}"))),
    }
}

/// `POST /api/game/start`: get today's dossier (or mint a random one) and
/// return only the visible card.
pub async fn start(
    State(state): State<SharedState>,
    Json(req): Json<StartRequest>,
) -> AppResult<Json<StartResponse>> {
    let mode = req.mode.unwrap_or(GameMode::Daily);
    let date_key = parse_date_key(&req.date_key)?;
    let profile = get_or_create_profile(&state.store, state.llm(), mode, date_key).await?;
    Ok(Json(StartResponse {
        mode,
        date_key: profile.date_key.clone(),
        game_id: profile.game_id.clone(),
        visible: profile.visible,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AskRequest {
    pub mode: Option<GameMode>,
    pub date_key: Option<String>,
    pub game_id: Option<String>,
    pub question: String,
    pub qa_so_far: Vec<QAItem>,
}

/// Resolve mode/dateKey/gameId the way the client sends them. Daily games are
/// keyed by date: the dateKey is mandatory (a gameId alone is not enough) and
/// doubles as the gameId when none is sent.
fn resolve_game(
    mode: Option<GameMode>,
    date_key: &Option<String>,
    game_id: &Option<String>,
) -> AppResult<(GameMode, Option<DateKey>, String)> {
    let mode = mode.unwrap_or(GameMode::Daily);
    let date_key = parse_date_key(date_key)?;
    let game_id = game_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    match mode {
        GameMode::Daily => {
            let Some(date_key) = date_key else {
                return Err(AppError::BadRequest("Missing dateKey for daily mode".into()));
            };
            let game_id = game_id.unwrap_or_else(|| date_key.as_str().to_string());
            Ok((mode, Some(date_key), game_id))
        }
        GameMode::DebugRandom => {
            let Some(game_id) = game_id else {
                return Err(AppError::BadRequest("Missing gameId".into()));
            };
            Ok((mode, date_key, game_id))
        }
    }
}

/// `POST /api/game/ask`: one question to the soul.
pub async fn ask(
    State(state): State<SharedState>,
    Json(req): Json<AskRequest>,
) -> AppResult<Json<Value>> {
    let (mode, date_key, game_id) = resolve_game(req.mode, &req.date_key, &req.game_id)?;
    let profile = load_profile(&state.store, mode, &game_id, date_key.as_ref())
        .await
        .ok_or(GatesError::GameNotFound)?;

    match ask_soul(state.llm(), &profile, &req.question, &req.qa_so_far).await? {
        AskOutcome::Answer(answer) => Ok(Json(json!({ "answer": answer }))),
        AskOutcome::Blocked { god_message } => {
            Ok(Json(json!({ "blocked": true, "godMessage": god_message })))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JudgeRequest {
    pub mode: Option<GameMode>,
    pub date_key: Option<String>,
    pub game_id: Option<String>,
    pub judgment: Option<Judgment>,
    pub qa: Vec<QAItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResponse {
    pub correct: bool,
    pub god_message: String,
}

/// `POST /api/game/judge`: stamp the soul and hear the verdict.
pub async fn judge(
    State(state): State<SharedState>,
    Json(req): Json<JudgeRequest>,
) -> AppResult<Json<JudgeResponse>> {
    let judgment = req
        .judgment
        .ok_or_else(|| AppError::BadRequest("Missing judgment".into()))?;
    let (mode, date_key, game_id) = resolve_game(req.mode, &req.date_key, &req.game_id)?;
    let profile = load_profile(&state.store, mode, &game_id, date_key.as_ref())
        .await
        .ok_or(GatesError::GameNotFound)?;

    let outcome = judge_soul(state.llm(), &profile, &req.qa, judgment).await;
    Ok(Json(JudgeResponse {
        correct: outcome.correct,
        god_message: outcome.god_message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_games_resolve_by_date_key_alone() {
        let (mode, dk, game_id) =
            resolve_game(None, &Some("2026-02-02".into()), &None).unwrap();
        assert_eq!(mode, GameMode::Daily);
        assert_eq!(dk.unwrap().as_str(), "2026-02-02");
        assert_eq!(game_id, "2026-02-02");
    }

    #[test]
    fn daily_without_date_key_is_a_client_error() {
        let err = resolve_game(Some(GameMode::Daily), &None, &None).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn daily_with_a_game_id_still_requires_the_date_key() {
        let err = resolve_game(None, &None, &Some("2026-02-02".into())).unwrap_err();
        match err {
            AppError::BadRequest(msg) => assert_eq!(msg, "Missing dateKey for daily mode"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn random_games_resolve_by_game_id() {
        let (mode, dk, game_id) =
            resolve_game(Some(GameMode::DebugRandom), &None, &Some("g-123".into())).unwrap();
        assert_eq!(mode, GameMode::DebugRandom);
        assert!(dk.is_none());
        assert_eq!(game_id, "g-123");
    }

    #[test]
    fn bad_date_key_is_rejected() {
        let err = resolve_game(None, &Some("02/02/2026".into()), &None).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn request_shapes_accept_the_wire_names() {
        let req: JudgeRequest = serde_json::from_str(
            r#"{"mode": "daily", "dateKey": "2026-02-02", "judgment": "HEAVEN",
                "qa": [{"q": "?", "a": "!", "from": "SOUL"}]}"#,
        )
        .unwrap();
        assert_eq!(req.judgment, Some(Judgment::Heaven));
        assert_eq!(req.qa.len(), 1);
    }
}
