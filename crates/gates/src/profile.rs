//! Dossier generation and caching.
//!
//! Dailies are shared: everyone who opens the game on the same UTC date meets
//! the same soul, so the dossier is generated once behind the cache and the
//! model picks the alignment itself (the 50/50 balance lives in the prompt,
//! there is no post-hoc coin flip).

use crate::keys::{
    daily_profile_key, profile_key_for, random_profile_key, DAILY_PROFILE_TTL_SECONDS,
    RANDOM_PROFILE_TTL_SECONDS,
};
use crate::{
    Alignment, CharacterProfile, GameMode, GatesError, HiddenProfile, VisibleProfile,
    PROFILE_VERSION,
};
use kv_store::KvStore;
use llm_client::{extract_json, ChatClient, ChatRequest};
use market_core::DateKey;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

const PROFILE_MAX_TOKENS: u32 = 900;

const MIN_AGE: u32 = 10;
const MAX_AGE: u32 = 110;

/// Load a cached dossier for an in-progress game.
pub async fn load_profile(
    store: &KvStore,
    mode: GameMode,
    game_id: &str,
    date_key: Option<&DateKey>,
) -> Option<CharacterProfile> {
    store
        .get_json::<CharacterProfile>(&profile_key_for(mode, game_id, date_key))
        .await
}

/// Get today's dossier, or mint a random one, generating on a cache miss.
pub async fn get_or_create_profile(
    store: &KvStore,
    llm: Option<&ChatClient>,
    mode: GameMode,
    date_key: Option<DateKey>,
) -> Result<CharacterProfile, GatesError> {
    match mode {
        GameMode::Daily => {
            let date_key = date_key.unwrap_or_else(DateKey::today);
            let key = daily_profile_key(&date_key);
            if let Some(profile) = store.get_json::<CharacterProfile>(&key).await {
                return Ok(profile);
            }
            let game_id = date_key.as_str().to_string();
            let profile = generate_profile(llm, mode, &game_id, Some(date_key)).await?;
            store
                .set_json(&key, &profile, Some(DAILY_PROFILE_TTL_SECONDS))
                .await;
            Ok(profile)
        }
        GameMode::DebugRandom => {
            let game_id = Uuid::new_v4().to_string();
            let profile = generate_profile(llm, mode, &game_id, None).await?;
            store
                .set_json(
                    &random_profile_key(&game_id),
                    &profile,
                    Some(RANDOM_PROFILE_TTL_SECONDS),
                )
                .await;
            Ok(profile)
        }
    }
}

async fn generate_profile(
    llm: Option<&ChatClient>,
    mode: GameMode,
    game_id: &str,
    date_key: Option<DateKey>,
) -> Result<CharacterProfile, GatesError> {
    let llm = llm.ok_or(GatesError::LlmUnavailable)?;
    let prompt = build_profile_prompt();
    let raw = llm
        .complete(&ChatRequest {
            system: &prompt,
            max_tokens: PROFILE_MAX_TOKENS,
            json_object: true,
        })
        .await?;
    let profile = parse_profile_response(mode, game_id, date_key, &raw)?;
    tracing::info!(
        game_id,
        %mode,
        case_number = profile.visible.case_number,
        "generated dossier"
    );
    Ok(profile)
}

fn build_profile_prompt() -> String {
    "You are the CASE WRITER for a judgment game called \"Pearly Gates\". A soul \
     has just died; the player will interview it briefly and stamp HEAVEN or HELL.\n\n\
     Invent one dead character with a SECRET moral alignment:\n\
     - Flip a fair mental coin for GOOD or EVIL. Over many cases the split must \
     feel 50/50; do not favor either.\n\
     - The visible card (name, age, occupation, cause of death) must NOT give \
     the alignment away. A kindly-looking EVIL soul and a gruff GOOD soul are \
     both excellent.\n\
     - The hidden truth must make the alignment clear once known: a short bio, \
     exactly 3 best acts and exactly 3 worst acts. For a GOOD soul the worst \
     acts are forgivable flaws; for an EVIL soul the best acts are thin cover.\n\
     - Keep it darkly funny, specific, and mortal. No celebrities, no demons.\n\n\
     Respond with STRICT JSON only, no markdown fences, exactly this shape:\n\
     {\"name\": \"string\", \"age\": number, \"occupation\": \"string\", \
     \"causeOfDeath\": \"string\", \"alignment\": \"GOOD\" or \"EVIL\", \
     \"bio\": \"string\", \"bestActs\": [\"string\", \"string\", \"string\"], \
     \"worstActs\": [\"string\", \"string\", \"string\"]}\n"
        .to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileWire {
    name: String,
    age: Value,
    occupation: String,
    cause_of_death: String,
    alignment: String,
    bio: String,
    best_acts: Vec<String>,
    worst_acts: Vec<String>,
}

fn coerce_age(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deterministic 4-digit case number from the game id (FNV-1a).
fn case_number(game_id: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in game_id.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    1000 + hash % 9000
}

fn three_acts(acts: Vec<String>, which: &str, raw: &str) -> Result<[String; 3], GatesError> {
    let acts: Vec<String> = acts
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    <[String; 3]>::try_from(acts).map_err(|bad| GatesError::InvalidProfile {
        reason: format!("expected exactly 3 {which} acts, got {}", bad.len()),
        raw: raw.to_string(),
    })
}

fn parse_profile_response(
    mode: GameMode,
    game_id: &str,
    date_key: Option<DateKey>,
    raw: &str,
) -> Result<CharacterProfile, GatesError> {
    let json = extract_json(raw).ok_or_else(|| GatesError::Unparseable {
        raw: raw.to_string(),
    })?;
    let wire: ProfileWire =
        serde_json::from_str(&json).map_err(|_| GatesError::Unparseable {
            raw: raw.to_string(),
        })?;

    let invalid = |reason: String| GatesError::InvalidProfile {
        reason,
        raw: raw.to_string(),
    };

    let alignment = match wire.alignment.trim() {
        "GOOD" => Alignment::Good,
        "EVIL" => Alignment::Evil,
        other => return Err(invalid(format!("alignment {other:?}"))),
    };
    let age = coerce_age(&wire.age)
        .filter(|a| (MIN_AGE..=MAX_AGE).contains(a))
        .ok_or_else(|| invalid(format!("age {}", wire.age)))?;

    for (field, value) in [
        ("name", &wire.name),
        ("occupation", &wire.occupation),
        ("causeOfDeath", &wire.cause_of_death),
        ("bio", &wire.bio),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(format!("empty {field}")));
        }
    }

    Ok(CharacterProfile {
        version: PROFILE_VERSION,
        date_key,
        game_id: game_id.to_string(),
        mode,
        alignment,
        visible: VisibleProfile {
            case_number: case_number(game_id),
            name: wire.name.trim().to_string(),
            age,
            occupation: wire.occupation.trim().to_string(),
            cause_of_death: wire.cause_of_death.trim().to_string(),
            portrait_url: None,
        },
        hidden: HiddenProfile {
            bio: wire.bio.trim().to_string(),
            best_acts: three_acts(wire.best_acts, "best", raw)?,
            worst_acts: three_acts(wire.worst_acts, "worst", raw)?,
        },
    })
}
