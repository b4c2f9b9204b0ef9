//! The interview: the player questions the soul.
//!
//! The soul answers in character. It knows its hidden truth and dissembles
//! according to alignment, but asking it point-blank whether it is good or
//! evil is cheating; those questions never reach the soul and GOD interrupts
//! instead.

use crate::{Alignment, CharacterProfile, GatesError, QAItem, Speaker};
use llm_client::{ChatClient, ChatRequest};

/// Question length cap, counted in characters.
pub const MAX_QUESTION_CHARS: usize = 200;

/// Soul questions allowed per game.
pub const MAX_QUESTIONS: usize = 5;

const ANSWER_MAX_TOKENS: u32 = 300;

const GOD_INTERRUPTION: &str = "SILENCE, MORTAL.\n\
    THOU SHALT NOT SIMPLY ASK A SOUL WHETHER IT IS GOOD OR EVIL.\n\
    THE DEAD LIE AS EASILY AS THE LIVING. INTERROGATE PROPERLY.";

/// What came back from an accepted question.
#[derive(Clone, Debug, PartialEq)]
pub enum AskOutcome {
    /// The soul's in-character reply.
    Answer(String),
    /// GOD blocked the question; no question was consumed.
    Blocked { god_message: String },
}

/// Ask the soul one question, given the interview so far.
pub async fn ask_soul(
    llm: Option<&ChatClient>,
    profile: &CharacterProfile,
    question: &str,
    qa_so_far: &[QAItem],
) -> Result<AskOutcome, GatesError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(GatesError::EmptyQuestion);
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(GatesError::QuestionTooLong);
    }
    let asked = qa_so_far
        .iter()
        .filter(|item| item.from != Some(Speaker::God))
        .count();
    if asked >= MAX_QUESTIONS {
        return Err(GatesError::NoQuestionsLeft);
    }

    if is_alignment_probe(question) {
        tracing::debug!(game_id = %profile.game_id, "alignment probe blocked");
        return Ok(AskOutcome::Blocked {
            god_message: GOD_INTERRUPTION.to_string(),
        });
    }

    let llm = llm.ok_or(GatesError::LlmUnavailable)?;
    let prompt = build_soul_prompt(profile, question, qa_so_far);
    let answer = llm
        .complete(&ChatRequest {
            system: &prompt,
            max_tokens: ANSWER_MAX_TOKENS,
            json_object: false,
        })
        .await?;
    Ok(AskOutcome::Answer(answer.trim().to_string()))
}

/// Detect point-blank good-or-evil questions. Matched on a lowercased,
/// punctuation-stripped rendering so "Are you... EVIL?!" still trips it.
fn is_alignment_probe(question: &str) -> bool {
    let normalized: String = question
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    const PROBES: &[&str] = &[
        "are you good",
        "are you evil",
        "were you good",
        "were you evil",
        "are you a good person",
        "are you a bad person",
        "were you a good person",
        "were you a bad person",
        "good or evil",
        "evil or good",
        "heaven or hell",
        "do you belong in heaven",
        "do you belong in hell",
        "should you go to heaven",
        "should you go to hell",
        "what is your alignment",
    ];
    PROBES.iter().any(|p| normalized.contains(p))
}

fn build_soul_prompt(profile: &CharacterProfile, question: &str, qa_so_far: &[QAItem]) -> String {
    let disposition = match profile.alignment {
        Alignment::Good => {
            "You were GOOD. Answer honestly but modestly; you downplay your best \
             acts out of humility and own your flaws a little too readily."
        }
        Alignment::Evil => {
            "You were EVIL. Never admit it. Deflect, minimize, spin your worst \
             acts as misunderstandings, and polish your thin good deeds."
        }
    };
    let transcript = if qa_so_far.is_empty() {
        "(no questions yet)".to_string()
    } else {
        qa_so_far
            .iter()
            .map(|item| format!("Q: {}\nA: {}", item.q, item.a))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You are a dead soul at the pearly gates, being interviewed before \
         judgment. Stay in character at all times.\n\n\
         WHO YOU WERE:\n\
         - Name: {name}\n\
         - Age: {age}\n\
         - Occupation: {occupation}\n\
         - Cause of death: {cause}\n\
         - Bio (secret): {bio}\n\
         - Your 3 best acts (secret): {best:?}\n\
         - Your 3 worst acts (secret): {worst:?}\n\n\
         DISPOSITION: {disposition}\n\n\
         INTERVIEW SO FAR:\n{transcript}\n\n\
         THE INTERVIEWER ASKS: {question}\n\n\
         Reply with the soul's answer only: plain text, first person, 1-3 \
         sentences, no quotation marks around the whole reply, no JSON.",
        name = profile.visible.name,
        age = profile.visible.age,
        occupation = profile.visible.occupation,
        cause = profile.visible.cause_of_death,
        bio = profile.hidden.bio,
        best = profile.hidden.best_acts,
        worst = profile.hidden.worst_acts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_profile;

    fn qa(n: usize, from: Option<Speaker>) -> Vec<QAItem> {
        (0..n)
            .map(|i| QAItem {
                q: format!("question {i}"),
                a: "an answer".to_string(),
                from,
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_and_oversized_questions_are_rejected() {
        let p = sample_profile(Alignment::Good);
        let err = ask_soul(None, &p, "   ", &[]).await.unwrap_err();
        assert!(matches!(err, GatesError::EmptyQuestion));

        let long = "x".repeat(MAX_QUESTION_CHARS + 1);
        let err = ask_soul(None, &p, &long, &[]).await.unwrap_err();
        assert!(matches!(err, GatesError::QuestionTooLong));
    }

    #[tokio::test]
    async fn question_budget_counts_only_soul_answers() {
        let p = sample_profile(Alignment::Good);
        let err = ask_soul(None, &p, "What did you do?", &qa(MAX_QUESTIONS, None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatesError::NoQuestionsLeft));

        // GOD interruptions do not consume the budget; the next failure is the
        // missing client, not the budget.
        let err = ask_soul(None, &p, "What did you do?", &qa(MAX_QUESTIONS, Some(Speaker::God)))
            .await
            .unwrap_err();
        assert!(matches!(err, GatesError::LlmUnavailable));
    }

    #[tokio::test]
    async fn alignment_probes_are_blocked_without_a_model_call() {
        let p = sample_profile(Alignment::Evil);
        for q in [
            "Are you evil?",
            "are you... GOOD?!",
            "So, good or evil?",
            "Do you belong in Heaven or Hell?",
        ] {
            match ask_soul(None, &p, q, &[]).await.unwrap() {
                AskOutcome::Blocked { god_message } => {
                    assert!(god_message.contains("SILENCE"), "{q}")
                }
                AskOutcome::Answer(_) => panic!("{q} should have been blocked"),
            }
        }
    }

    #[test]
    fn ordinary_questions_are_not_probes() {
        for q in [
            "What was your proudest moment?",
            "Did you treat the foghorn fund honestly?",
            "Tell me about a good deed.",
            "Was the evil rumor about you true?",
        ] {
            assert!(!is_alignment_probe(q), "{q}");
        }
    }
}
