#![deny(warnings)]

//! Hourly market generation pipeline.
//!
//! The one part of the system with real invariants: each UTC hour bucket gets
//! exactly one market state, generated lazily behind a best-effort lock,
//! validated hard against the board rules, and cached immutably. Model output
//! is untrusted; every failure that stems from it carries the raw text.

pub mod accounts;
pub mod keys;
mod delta;
mod full;
mod pipeline;
mod prompt;

pub use delta::parse_delta_response;
pub use full::parse_full_response;
pub use pipeline::{get_or_create_market_hour, GenConfig, GenMode};
pub use prompt::{build_delta_prompt, build_full_prompt};

use llm_client::LlmError;
use market_core::MarketError;
use thiserror::Error;

/// Market generation failures. Variants produced while interpreting model
/// output carry the raw text so a bad payload can be debugged from the error
/// alone.
#[derive(Debug, Error)]
pub enum MarketGenError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("no chat client configured; cannot generate hour")]
    LlmUnavailable,
    #[error("model output did not contain parseable JSON")]
    Unparseable { raw: String },
    #[error("model output had {got} valid unique companies; expected {expected}")]
    WrongCompanyCount {
        got: usize,
        expected: usize,
        raw: String,
    },
    #[error("model output prices lack variation")]
    PriceVariation { raw: String },
    #[error("model output missing bigNews items")]
    MissingBigNews { raw: String },
    #[error("model output delisted {got} companies; at most {max} allowed")]
    TooManyDelistings { got: usize, max: usize, raw: String },
    #[error("invalid delisting of {id}: {reason}")]
    InvalidDelist {
        id: String,
        reason: &'static str,
        raw: String,
    },
    #[error("{id} disappeared from the board without a delist entry")]
    UndeclaredDelisting { id: String, raw: String },
    #[error("delta update missing for ticker(s): {}", missing.join(", "))]
    MissingUpdates { missing: Vec<String>, raw: String },
    #[error("duplicate delta update for {id}")]
    DuplicateUpdate { id: String, raw: String },
    #[error("bad delta update for {id}: {reason}")]
    BadUpdate {
        id: String,
        reason: &'static str,
        raw: String,
    },
    #[error("generated state broke a board invariant: {source}")]
    Invariant { source: MarketError, raw: String },
    #[error("another caller is generating this hour; try again")]
    GenerationInFlight,
}

impl MarketGenError {
    /// The raw model output attached to this failure, when there is one.
    pub fn raw(&self) -> Option<&str> {
        match self {
            MarketGenError::Unparseable { raw }
            | MarketGenError::WrongCompanyCount { raw, .. }
            | MarketGenError::PriceVariation { raw }
            | MarketGenError::MissingBigNews { raw }
            | MarketGenError::TooManyDelistings { raw, .. }
            | MarketGenError::InvalidDelist { raw, .. }
            | MarketGenError::UndeclaredDelisting { raw, .. }
            | MarketGenError::MissingUpdates { raw, .. }
            | MarketGenError::DuplicateUpdate { raw, .. }
            | MarketGenError::BadUpdate { raw, .. }
            | MarketGenError::Invariant { raw, .. } => Some(raw),
            MarketGenError::Llm(_)
            | MarketGenError::LlmUnavailable
            | MarketGenError::GenerationInFlight => None,
        }
    }
}
