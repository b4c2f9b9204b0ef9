#![deny(warnings)]

//! Pearly Gates: judge a dead soul GOOD or EVIL from an interview.
//!
//! A character dossier (visible card + hidden truth + alignment) is generated
//! once per game and cached; the player asks the soul a handful of questions
//! and then stamps HEAVEN or HELL. The soul knows its hidden truth and
//! dissembles; GOD delivers the verdict.

mod ask;
mod judge;
pub mod keys;
mod profile;

pub use ask::{ask_soul, AskOutcome, MAX_QUESTIONS, MAX_QUESTION_CHARS};
pub use judge::{judge_soul, parse_god_response, JudgeOutcome};
pub use profile::{get_or_create_profile, load_profile};

use llm_client::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Wire format version for cached dossiers.
pub const PROFILE_VERSION: u32 = 1;

/// Which game a dossier belongs to: the shared daily puzzle or a throwaway
/// random one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "debug-random")]
    DebugRandom,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GameMode::Daily => "daily",
            GameMode::DebugRandom => "debug-random",
        })
    }
}

/// The soul's true nature. Fixed at creation, never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "EVIL")]
    Evil,
}

/// The player's stamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Judgment {
    #[serde(rename = "HEAVEN")]
    Heaven,
    #[serde(rename = "HELL")]
    Hell,
}

/// The verdict that matches an alignment: GOOD souls belong in HEAVEN.
pub fn correct_judgment(alignment: Alignment) -> Judgment {
    match alignment {
        Alignment::Good => Judgment::Heaven,
        Alignment::Evil => Judgment::Hell,
    }
}

/// What the player sees before judging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleProfile {
    /// Four digits, derived deterministically from the game id.
    pub case_number: u32,
    pub name: String,
    pub age: u32,
    pub occupation: String,
    pub cause_of_death: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portrait_url: Option<String>,
}

/// The truth the soul hides. Exactly three acts each way.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenProfile {
    pub bio: String,
    pub best_acts: [String; 3],
    pub worst_acts: [String; 3],
}

/// A full cached dossier. Old cached profiles may carry a `faceEmoji` field;
/// deserialization ignores it and it never reappears on write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_key: Option<market_core::DateKey>,
    /// Daily games: equals the date key. Random games: a uuid.
    pub game_id: String,
    pub mode: GameMode,
    pub alignment: Alignment,
    pub visible: VisibleProfile,
    pub hidden: HiddenProfile,
}

/// One interview exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QAItem {
    pub q: String,
    pub a: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Speaker>,
}

/// Who produced an answer: the soul, or GOD interrupting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    #[serde(rename = "SOUL")]
    Soul,
    #[serde(rename = "GOD")]
    God,
}

/// Pearly Gates failures.
#[derive(Debug, Error)]
pub enum GatesError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("no chat client configured; cannot generate profiles")]
    LlmUnavailable,
    #[error("Game not found")]
    GameNotFound,
    #[error("model output did not contain a parseable dossier")]
    Unparseable { raw: String },
    #[error("generated dossier rejected: {reason}")]
    InvalidProfile { reason: String, raw: String },
    #[error("question is empty")]
    EmptyQuestion,
    #[error("question exceeds {MAX_QUESTION_CHARS} characters")]
    QuestionTooLong,
    #[error("no questions left; {MAX_QUESTIONS} already asked")]
    NoQuestionsLeft,
}

impl GatesError {
    /// Raw model output attached to this failure, when there is one.
    pub fn raw(&self) -> Option<&str> {
        match self {
            GatesError::Unparseable { raw } | GatesError::InvalidProfile { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
