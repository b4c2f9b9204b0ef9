//! Error-to-HTTP mapping.
//!
//! Client mistakes map to 400/404, transient conditions to 503, and model or
//! invariant failures to 500. A 500 caused by bad model output carries the
//! raw text in the body so it can be debugged without server logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gates::GatesError;
use ledger::TradeError;
use market_gen::MarketGenError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{message}")]
    Internal {
        message: String,
        raw: Option<String>,
    },
}

impl From<TradeError> for AppError {
    fn from(e: TradeError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<MarketGenError> for AppError {
    fn from(e: MarketGenError) -> Self {
        match e {
            MarketGenError::GenerationInFlight => {
                AppError::Unavailable("Market generation in progress; retry shortly".into())
            }
            MarketGenError::LlmUnavailable => AppError::Unavailable(e.to_string()),
            other => {
                let raw = other.raw().map(str::to_string);
                AppError::Internal {
                    message: other.to_string(),
                    raw,
                }
            }
        }
    }
}

impl From<GatesError> for AppError {
    fn from(e: GatesError) -> Self {
        match e {
            GatesError::GameNotFound => AppError::NotFound(e.to_string()),
            GatesError::EmptyQuestion
            | GatesError::QuestionTooLong
            | GatesError::NoQuestionsLeft => AppError::BadRequest(e.to_string()),
            GatesError::LlmUnavailable => AppError::Unavailable(e.to_string()),
            other => {
                let raw = other.raw().map(str::to_string);
                AppError::Internal {
                    message: other.to_string(),
                    raw,
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, raw) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            AppError::Internal { message, raw } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, raw)
            }
        };

        let mut body = json!({
            "error": message,
            "status": status.as_u16(),
        });
        if let Some(raw) = raw {
            body["raw"] = json!(raw);
        }
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(MarketGenError::GenerationInFlight)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(GatesError::GameNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn trade_rejections_keep_their_exact_message() {
        let err = AppError::from(TradeError::BadCommand);
        assert_eq!(
            err.to_string(),
            "Invalid command. Use: Buy/Sell/Short [number] [stock ID]"
        );
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn model_failures_carry_the_raw_text() {
        let err = AppError::from(MarketGenError::Unparseable {
            raw: "not json".into(),
        });
        match &err {
            AppError::Internal { raw, .. } => assert_eq!(raw.as_deref(), Some("not json")),
            other => panic!("unexpected: {other}"),
        }
    }
}
