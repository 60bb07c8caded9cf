pub mod speech;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::Error;
use crate::progress::ProgressUpdate;

/// Attempts at or above this score mark the exercise completed.
pub const PASS_SCORE: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(Error::UnknownDifficulty(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PronunciationExercise {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub target_phrase: String,
    pub target_phonetic: String,
    #[serde(default)]
    pub hints: Vec<String>,
    pub difficulty: Difficulty,
    pub is_published: bool,
    pub author_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Match state of one target word at its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WordResult {
    pub word: String,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PronunciationResult {
    pub score: u8,
    pub word_results: Vec<WordResult>,
}

/// Score a spoken transcript against a target phrase.
///
/// Both strings are lowercased and split on whitespace runs, then compared
/// word by word at the same index. No alignment, no stemming: a dropped word
/// shifts every later word out of place and fails it. Extra spoken words past
/// the target length are ignored. An empty target scores 0.
pub fn compare_pronunciation(target: &str, spoken: &str) -> PronunciationResult {
    let target = target.to_lowercase();
    let spoken = spoken.to_lowercase();
    let target_words: Vec<&str> = target.split_whitespace().collect();
    let spoken_words: Vec<&str> = spoken.split_whitespace().collect();

    let word_results: Vec<WordResult> = target_words
        .iter()
        .enumerate()
        .map(|(i, word)| WordResult {
            word: word.to_string(),
            matched: spoken_words.get(i) == Some(word),
        })
        .collect();

    let matched_count = word_results.iter().filter(|w| w.matched).count();
    let score = if target_words.is_empty() {
        0
    } else {
        (matched_count as f64 / target_words.len() as f64 * 100.0).round() as u8
    };

    PronunciationResult {
        score,
        word_results,
    }
}

/// Handle for one capture started through [`PracticeSession::begin_capture`].
/// Transcripts carrying a stale token are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureToken {
    generation: u64,
}

/// Outcome of applying a final transcript to a practice session.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub result: PronunciationResult,
    /// Ledger update to persist; present only when the attempt beat the
    /// previous best score.
    pub progress: Option<ProgressUpdate>,
}

/// One student working on one pronunciation exercise screen.
///
/// Tracks the best score seen so far and a capture generation: starting a new
/// capture invalidates any prior in-flight one, so a late transcript from an
/// abandoned capture cannot overwrite a newer attempt.
#[derive(Debug)]
pub struct PracticeSession {
    student_id: i64,
    exercise_id: i64,
    exercise_title: String,
    target_phrase: String,
    best_score: u8,
    generation: u64,
}

impl PracticeSession {
    pub fn new(student_id: i64, exercise: &PronunciationExercise, best_score: u8) -> Self {
        Self {
            student_id,
            exercise_id: exercise.id,
            exercise_title: exercise.title.clone(),
            target_phrase: exercise.target_phrase.clone(),
            best_score,
            generation: 0,
        }
    }

    pub fn best_score(&self) -> u8 {
        self.best_score
    }

    /// Start a capture on the given adapter and return the token that tags
    /// its transcript as current.
    pub fn begin_capture(
        &mut self,
        capture: &mut dyn speech::SpeechCapture,
        lang: &str,
    ) -> anyhow::Result<CaptureToken> {
        capture.start(lang)?;
        self.generation += 1;
        Ok(CaptureToken {
            generation: self.generation,
        })
    }

    /// Score a final transcript. Returns `None` when the token is stale
    /// (a newer capture has been started since).
    pub fn apply_transcript(
        &mut self,
        token: CaptureToken,
        transcript: &str,
    ) -> Option<AttemptOutcome> {
        if token.generation != self.generation {
            return None;
        }
        let result = compare_pronunciation(&self.target_phrase, transcript);
        let progress = if result.score > self.best_score {
            self.best_score = result.score;
            Some(ProgressUpdate::pronunciation_attempt(
                self.student_id,
                self.exercise_id.to_string(),
                self.exercise_title.clone(),
                result.score,
            ))
        } else {
            None
        };
        Some(AttemptOutcome { result, progress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressStatus;
    use crate::utils::now_utc;

    fn exercise(target_phrase: &str) -> PronunciationExercise {
        PronunciationExercise {
            id: 7,
            title: "Greetings".to_string(),
            description: String::new(),
            target_phrase: target_phrase.to_string(),
            target_phonetic: String::new(),
            hints: vec![],
            difficulty: Difficulty::Beginner,
            is_published: true,
            author_id: 1,
            created_at: now_utc(),
            updated_at: now_utc(),
        }
    }

    #[test]
    fn self_match_is_perfect() {
        let result = compare_pronunciation("How are you doing today", "how are you doing today");
        assert_eq!(result.score, 100);
        assert_eq!(result.word_results.len(), 5);
        assert!(result.word_results.iter().all(|w| w.matched));
    }

    #[test]
    fn dropped_word_shifts_everything_after_it() {
        // "you" is missing, so every word from index 2 on compares against
        // the wrong position.
        let result = compare_pronunciation("How are you doing today", "how are doing today");
        assert_eq!(result.score, 40);
        let matched: Vec<bool> = result.word_results.iter().map(|w| w.matched).collect();
        assert_eq!(matched, vec![true, true, false, false, false]);
    }

    #[test]
    fn empty_transcript_scores_zero_with_full_word_list() {
        let result = compare_pronunciation("good morning teacher", "");
        assert_eq!(result.score, 0);
        assert_eq!(result.word_results.len(), 3);
        assert!(result.word_results.iter().all(|w| !w.matched));
    }

    #[test]
    fn empty_target_scores_zero() {
        let result = compare_pronunciation("", "anything at all");
        assert_eq!(result.score, 0);
        assert!(result.word_results.is_empty());
    }

    #[test]
    fn trailing_extra_words_are_ignored() {
        let exact = compare_pronunciation("good morning", "good morning");
        let extra = compare_pronunciation("good morning", "good morning everyone here");
        assert_eq!(exact.score, extra.score);
        assert_eq!(exact.word_results, extra.word_results);
    }

    #[test]
    fn partial_score_rounds() {
        // 1 of 3 matched -> 33.33 rounds to 33
        let result = compare_pronunciation("one two three", "one x y");
        assert_eq!(result.score, 33);
        // 2 of 3 matched -> 66.67 rounds to 67
        let result = compare_pronunciation("one two three", "one two y");
        assert_eq!(result.score, 67);
    }

    struct FakeCapture {
        started: Vec<String>,
    }

    impl speech::SpeechCapture for FakeCapture {
        fn start(&mut self, lang: &str) -> anyhow::Result<()> {
            self.started.push(lang.to_string());
            Ok(())
        }

        fn stop(&mut self) {}
    }

    #[test]
    fn stale_capture_transcript_is_dropped() {
        let mut capture = FakeCapture { started: vec![] };
        let mut session = PracticeSession::new(1, &exercise("good morning"), 0);
        let first = session.begin_capture(&mut capture, "en-US").unwrap();
        let second = session.begin_capture(&mut capture, "en-US").unwrap();
        assert!(session.apply_transcript(first, "good morning").is_none());
        let outcome = session.apply_transcript(second, "good morning").unwrap();
        assert_eq!(outcome.result.score, 100);
        assert_eq!(capture.started.len(), 2);
    }

    #[test]
    fn only_improved_attempts_touch_the_ledger() {
        let mut capture = FakeCapture { started: vec![] };
        let mut session = PracticeSession::new(1, &exercise("good morning teacher"), 0);

        let token = session.begin_capture(&mut capture, "en-US").unwrap();
        let outcome = session.apply_transcript(token, "good x y").unwrap();
        assert_eq!(outcome.result.score, 33);
        let update = outcome.progress.expect("first attempt beats best of 0");
        assert_eq!(update.status, ProgressStatus::InProgress);
        assert_eq!(update.pronunciation_best_score, Some(33));

        // Same score again: no new best, nothing to persist.
        let token = session.begin_capture(&mut capture, "en-US").unwrap();
        let outcome = session.apply_transcript(token, "good x y").unwrap();
        assert!(outcome.progress.is_none());

        // Full match passes the threshold and completes the exercise.
        let token = session.begin_capture(&mut capture, "en-US").unwrap();
        let outcome = session
            .apply_transcript(token, "Good Morning Teacher")
            .unwrap();
        let update = outcome.progress.unwrap();
        assert_eq!(update.status, ProgressStatus::Completed);
        assert_eq!(update.completion_percentage, 100);
        assert_eq!(session.best_score(), 100);
    }

    #[tokio::test]
    async fn speech_events_flow_through_a_channel() {
        let (tx, mut rx) = speech::event_channel(4);
        tx.send(speech::SpeechEvent::Final("hello there".to_string()))
            .await
            .unwrap();
        drop(tx);
        match rx.recv().await {
            Some(speech::SpeechEvent::Final(text)) => assert_eq!(text, "hello there"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }
}
