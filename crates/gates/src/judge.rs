//! The verdict: GOD announces whether the player stamped correctly.
//!
//! Correctness is pure bookkeeping; the model only writes the flavor text.
//! The endpoint must never fail on bad model output, so parsing falls back
//! from strict JSON to a quoted-string salvage to a canned message.

use crate::{correct_judgment, CharacterProfile, Judgment, QAItem};
use llm_client::{ChatClient, ChatRequest};
use serde::Deserialize;

const VERDICT_MAX_TOKENS: u32 = 650;

/// Transcript lines shown to GOD; matches the question budget.
const TRANSCRIPT_LIMIT: usize = 5;

const FALLBACK_VERDICT: &str = "VERDICT: INCONCLUSIVE.\n\
    MORTAL, THE HEAVENS ARE EXPERIENCING TECHNICAL DIFFICULTIES.\n\
    TRY AGAIN.";

/// Outcome of a judgment.
#[derive(Clone, Debug, PartialEq)]
pub struct JudgeOutcome {
    pub correct: bool,
    pub god_message: String,
}

/// Resolve the player's stamp and have GOD write the verdict screen.
///
/// Infallible: correctness never depends on the model, and a failed or
/// missing completion degrades to the canned verdict.
pub async fn judge_soul(
    llm: Option<&ChatClient>,
    profile: &CharacterProfile,
    qa: &[QAItem],
    judgment: Judgment,
) -> JudgeOutcome {
    let expected = correct_judgment(profile.alignment);
    let correct = judgment == expected;

    let god_message = match llm {
        None => {
            tracing::warn!(game_id = %profile.game_id, "no chat client; canned verdict");
            FALLBACK_VERDICT.to_string()
        }
        Some(llm) => {
            let prompt = build_god_prompt(profile, qa, judgment, expected);
            match llm
                .complete(&ChatRequest {
                    system: &prompt,
                    max_tokens: VERDICT_MAX_TOKENS,
                    json_object: true,
                })
                .await
            {
                Ok(raw) => parse_god_response(&raw),
                Err(e) => {
                    tracing::warn!(game_id = %profile.game_id, error = %e, "verdict generation failed");
                    FALLBACK_VERDICT.to_string()
                }
            }
        }
    };

    tracing::info!(game_id = %profile.game_id, correct, "soul judged");
    JudgeOutcome {
        correct,
        god_message,
    }
}

fn judgment_word(j: Judgment) -> &'static str {
    match j {
        Judgment::Heaven => "HEAVEN",
        Judgment::Hell => "HELL",
    }
}

fn build_god_prompt(
    profile: &CharacterProfile,
    qa: &[QAItem],
    stamped: Judgment,
    expected: Judgment,
) -> String {
    let transcript = if qa.is_empty() {
        "(THE PLAYER ASKED NO QUESTIONS.)".to_string()
    } else {
        qa.iter()
            .take(TRANSCRIPT_LIMIT)
            .enumerate()
            .map(|(i, item)| format!("Q{n}: {q}\nA{n}: {a}", n = i + 1, q = item.q, a = item.a))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let v = &profile.visible;
    let h = &profile.hidden;
    format!(
        "YOU ARE GOD. OLD TESTAMENT THUNDER. ALL CAPS ALWAYS.\n\n\
         YOU ARE DELIVERING THE FINAL VERDICT SCREEN FOR A GAME CALLED \"PEARLY GATES\".\n\n\
         FACTS (DO NOT CONTRADICT):\n\
         - THE PLAYER STAMPED: {stamped}\n\
         - THE CORRECT STAMP WAS: {expected}\n\
         - THE SOUL'S TRUE ALIGNMENT: {alignment:?}\n\n\
         CHARACTER CARD (PLAYER SAW THIS):\n\
         - NAME: {name}\n\
         - AGE: {age}\n\
         - OCCUPATION: {occupation}\n\
         - CAUSE OF DEATH: {cause}\n\n\
         HIDDEN TRUTH (FOR YOU ONLY):\n\
         - BIO: {bio}\n\
         - 3 BEST ACTS:\n  1) {b0}\n  2) {b1}\n  3) {b2}\n\
         - 3 WORST ACTS:\n  1) {w0}\n  2) {w1}\n  3) {w2}\n\n\
         PLAYER TRANSCRIPT:\n{transcript}\n\n\
         YOUR JOB:\n\
         - WRITE A SHORT GAME-OVER MESSAGE AS GOD.\n\
         - IT MUST BE FUNNY, THUNDEROUS, AND SPECIFIC.\n\
         - IT MUST CLEARLY STATE WHETHER THE PLAYER WAS CORRECT.\n\
         - IF THE PLAYER WAS WRONG, COMEDICALLY EXPOSE WHAT THEY MISSED \
         (REFERENCE THE HIDDEN ACTS).\n\
         - IF THE PLAYER WAS RIGHT, CONGRATULATE THEM BUT STILL ROAST THEM A LITTLE.\n\
         - DO NOT REVEAL THE ENTIRE DOSSIER AS A LIST; WEAVE IT INTO THE JOKE.\n\
         - 4-8 LINES. EACH LINE SHOULD FEEL LIKE A GODLY PRONOUNCEMENT.\n\n\
         CRITICAL FAIRNESS RULE (MANDATORY):\n\
         - YOU MAY ONLY CLAIM THE PLAYER \"SAW\", \"HEARD\", \"KNEW\" OR \"NOTICED\" \
         THINGS THAT APPEAR IN THE PLAYER TRANSCRIPT OR THE CHARACTER CARD ABOVE.\n\
         - DO NOT INVENT IMPLIED EVIDENCE.\n\
         - YOU MAY REVEAL NEW FACTS FROM HIDDEN TRUTH, BUT FRAME THEM AS GOD \
         REVEALING THEM NOW (\"I REVEAL...\", \"BEHOLD...\", \"THOU DIDST NOT ASK ABOUT...\").\n\n\
         RESPOND ONLY WITH STRICT JSON IN THIS SHAPE:\n\
         {{\"godMessage\": \"string\"}}",
        stamped = judgment_word(stamped),
        expected = judgment_word(expected),
        alignment = profile.alignment,
        name = v.name,
        age = v.age,
        occupation = v.occupation,
        cause = v.cause_of_death,
        bio = h.bio,
        b0 = h.best_acts[0],
        b1 = h.best_acts[1],
        b2 = h.best_acts[2],
        w0 = h.worst_acts[0],
        w1 = h.worst_acts[1],
        w2 = h.worst_acts[2],
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VerdictWire {
    god_message: String,
}

/// Extract the god message from model output. Never fails: strict JSON first,
/// then a quoted-string salvage of a mangled payload, then a canned verdict.
pub fn parse_god_response(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(wire) = serde_json::from_str::<VerdictWire>(raw) {
        if !wire.god_message.trim().is_empty() {
            return wire.god_message.trim().to_string();
        }
    }
    if let Some(salvaged) = salvage_quoted_field(raw, "\"godMessage\"") {
        if !salvaged.trim().is_empty() {
            return salvaged.trim().to_string();
        }
    }
    FALLBACK_VERDICT.to_string()
}

/// Find `field` in `raw` and read the JSON string value after the colon,
/// honoring backslash escapes.
fn salvage_quoted_field(raw: &str, field: &str) -> Option<String> {
    let at = find_ascii_case_insensitive(raw, field)?;
    let rest = &raw[at + field.len()..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('"')?;

    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            other => out.push(other),
        }
    }
    None
}

/// ASCII-case-insensitive substring search returning a byte offset valid in
/// `haystack` itself. The needle must be ASCII so the match start and end
/// land on char boundaries.
fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_profile;
    use crate::Alignment;

    #[test]
    fn strict_json_wins() {
        let msg = parse_god_response(r#"{"godMessage": "  THOU HAST CHOSEN WISELY.  "}"#);
        assert_eq!(msg, "THOU HAST CHOSEN WISELY.");
    }

    #[test]
    fn mangled_payload_is_salvaged() {
        let raw = "Sure! Here is the verdict:\n{\"godMessage\": \"BEHOLD.\\nTHE TRUTH.\"";
        assert_eq!(parse_god_response(raw), "BEHOLD.\nTHE TRUTH.");
    }

    #[test]
    fn salvage_survives_multibyte_text_around_the_field() {
        // Characters whose lowercase form has a different byte length must
        // not shift the salvage offset (or panic on a bad slice).
        let raw = format!("{}{}", "İ".repeat(10), r#"{"godMessage": "x""#);
        assert_eq!(parse_god_response(&raw), "x");

        let raw = "ÅNGSTRÖM SAYS: {\"GodMessage\": \"THUNDER.\"";
        assert_eq!(parse_god_response(raw), "THUNDER.");
    }

    #[test]
    fn hopeless_output_gets_the_canned_verdict() {
        for raw in ["", "I cannot do that.", r#"{"godMessage": ""}"#, "{\"godMessage\": \"unterminated"] {
            assert!(parse_god_response(raw).starts_with("VERDICT: INCONCLUSIVE."), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn correctness_matrix_is_independent_of_the_model() {
        for (alignment, judgment, expect) in [
            (Alignment::Good, Judgment::Heaven, true),
            (Alignment::Good, Judgment::Hell, false),
            (Alignment::Evil, Judgment::Hell, true),
            (Alignment::Evil, Judgment::Heaven, false),
        ] {
            let p = sample_profile(alignment);
            let outcome = judge_soul(None, &p, &[], judgment).await;
            assert_eq!(outcome.correct, expect, "{alignment:?} -> {judgment:?}");
            // No client: flavor text degrades to the canned verdict.
            assert!(outcome.god_message.starts_with("VERDICT: INCONCLUSIVE."));
        }
    }

    #[test]
    fn god_prompt_pins_the_facts() {
        let p = sample_profile(Alignment::Evil);
        let qa = vec![QAItem {
            q: "What happened to the rival's boat?".to_string(),
            a: "Rocks happen, officer.".to_string(),
            from: None,
        }];
        let prompt = build_god_prompt(&p, &qa, Judgment::Heaven, Judgment::Hell);
        assert!(prompt.contains("THE PLAYER STAMPED: HEAVEN"));
        assert!(prompt.contains("THE CORRECT STAMP WAS: HELL"));
        assert!(prompt.contains("Q1: What happened to the rival's boat?"));
        assert!(prompt.contains("{\"godMessage\": \"string\"}"));

        let empty = build_god_prompt(&p, &[], Judgment::Hell, Judgment::Hell);
        assert!(empty.contains("(THE PLAYER ASKED NO QUESTIONS.)"));
    }
}
