use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::Error;

/// Completion percentage written when a lesson or story is opened but not
/// yet finished. A fixed midpoint convention, not derived from content length.
pub const OPENED_PERCENTAGE: u8 = 50;

/// Synthetic content id for a vocabulary flashcard run; progress is tracked
/// per study session, not per word.
pub const VOCAB_SESSION_ID: &str = "study-session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Lesson,
    Story,
    Vocabulary,
    Pronunciation,
    Quiz,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Lesson => "lesson",
            ContentType::Story => "story",
            ContentType::Vocabulary => "vocabulary",
            ContentType::Pronunciation => "pronunciation",
            ContentType::Quiz => "quiz",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(ContentType::Lesson),
            "story" => Ok(ContentType::Story),
            "vocabulary" => Ok(ContentType::Vocabulary),
            "pronunciation" => Ok(ContentType::Pronunciation),
            "quiz" => Ok(ContentType::Quiz),
            other => Err(Error::UnknownContentType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(Error::UnknownProgressStatus(other.to_string())),
        }
    }
}

/// One student's state for one content item. Keyed by
/// (student_id, content_type, content_id); never deleted by normal flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressRecord {
    pub student_id: i64,
    pub content_type: ContentType,
    pub content_id: String,
    pub content_title: String,
    pub status: ProgressStatus,
    pub completion_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_best_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation_best_score: Option<u8>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_accessed_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A single progress event, merged into the ledger by [`ProgressUpdate::apply`].
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub student_id: i64,
    pub content_type: ContentType,
    pub content_id: String,
    pub content_title: String,
    pub status: ProgressStatus,
    pub completion_percentage: u8,
    pub quiz_best_score: Option<u8>,
    pub pronunciation_best_score: Option<u8>,
}

impl ProgressUpdate {
    /// First view of a lesson or story: opened but not finished.
    pub fn opened(
        student_id: i64,
        content_type: ContentType,
        content_id: impl Into<String>,
        content_title: impl Into<String>,
    ) -> Self {
        Self {
            student_id,
            content_type,
            content_id: content_id.into(),
            content_title: content_title.into(),
            status: ProgressStatus::InProgress,
            completion_percentage: OPENED_PERCENTAGE,
            quiz_best_score: None,
            pronunciation_best_score: None,
        }
    }

    /// Explicit "mark complete" on a lesson or story.
    pub fn completed(
        student_id: i64,
        content_type: ContentType,
        content_id: impl Into<String>,
        content_title: impl Into<String>,
    ) -> Self {
        Self {
            student_id,
            content_type,
            content_id: content_id.into(),
            content_title: content_title.into(),
            status: ProgressStatus::Completed,
            completion_percentage: 100,
            quiz_best_score: None,
            pronunciation_best_score: None,
        }
    }

    /// A scored pronunciation attempt; completed at or above
    /// [`crate::pronunciation::PASS_SCORE`], otherwise in progress.
    pub fn pronunciation_attempt(
        student_id: i64,
        exercise_id: impl Into<String>,
        exercise_title: impl Into<String>,
        score: u8,
    ) -> Self {
        let status = if score >= crate::pronunciation::PASS_SCORE {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };
        Self {
            student_id,
            content_type: ContentType::Pronunciation,
            content_id: exercise_id.into(),
            content_title: exercise_title.into(),
            status,
            completion_percentage: score,
            quiz_best_score: None,
            pronunciation_best_score: Some(score),
        }
    }

    /// A submitted quiz. Completing the quiz marks the item done even when
    /// the student failed; the percentage feeds the best-score field only.
    pub fn quiz_submitted(
        student_id: i64,
        quiz_id: impl Into<String>,
        quiz_title: impl Into<String>,
        percentage: u8,
    ) -> Self {
        Self {
            student_id,
            content_type: ContentType::Quiz,
            content_id: quiz_id.into(),
            content_title: quiz_title.into(),
            status: ProgressStatus::Completed,
            completion_percentage: 100,
            quiz_best_score: Some(percentage),
            pronunciation_best_score: None,
        }
    }

    /// A vocabulary flashcard run reaching its last card.
    pub fn vocabulary_session(student_id: i64) -> Self {
        Self {
            student_id,
            content_type: ContentType::Vocabulary,
            content_id: VOCAB_SESSION_ID.to_string(),
            content_title: "Vocabulary Study".to_string(),
            status: ProgressStatus::Completed,
            completion_percentage: 100,
            quiz_best_score: None,
            pronunciation_best_score: None,
        }
    }

    /// Merge this event into the ledger. Pure: the caller reads the existing
    /// record, applies, and writes the result back under the composite key.
    ///
    /// Completed is sticky: a later partial event never downgrades the status
    /// or lowers the percentage of a completed record. Best-score fields only
    /// move up. `completed_at` is set on the first transition into completed
    /// and never overwritten. Replaying the same event is idempotent.
    pub fn apply(&self, existing: Option<&ProgressRecord>, now: OffsetDateTime) -> ProgressRecord {
        let Some(prev) = existing else {
            return ProgressRecord {
                student_id: self.student_id,
                content_type: self.content_type,
                content_id: self.content_id.clone(),
                content_title: self.content_title.clone(),
                status: self.status,
                completion_percentage: self.completion_percentage,
                quiz_best_score: self.quiz_best_score,
                pronunciation_best_score: self.pronunciation_best_score,
                last_accessed_at: now,
                completed_at: (self.status == ProgressStatus::Completed).then_some(now),
                created_at: now,
                updated_at: now,
            };
        };

        let was_completed = prev.status == ProgressStatus::Completed;
        let status = if was_completed {
            ProgressStatus::Completed
        } else {
            self.status
        };
        let completion_percentage = if was_completed {
            prev.completion_percentage.max(self.completion_percentage)
        } else {
            self.completion_percentage
        };
        let completed_at = match prev.completed_at {
            Some(t) => Some(t),
            None if status == ProgressStatus::Completed => Some(now),
            None => None,
        };
        ProgressRecord {
            student_id: self.student_id,
            content_type: self.content_type,
            content_id: self.content_id.clone(),
            content_title: self.content_title.clone(),
            status,
            completion_percentage,
            quiz_best_score: max_score(prev.quiz_best_score, self.quiz_best_score),
            pronunciation_best_score: max_score(
                prev.pronunciation_best_score,
                self.pronunciation_best_score,
            ),
            last_accessed_at: now,
            completed_at,
            created_at: prev.created_at,
            updated_at: now,
        }
    }
}

fn max_score(prev: Option<u8>, new: Option<u8>) -> Option<u8> {
    match (prev, new) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}
