pub mod timer;

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use utoipa::ToSchema;

use crate::error::Error;
use crate::utils::now_utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillInBlank,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    pub id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Choices shown to the student; only meaningful for multiple choice and
    /// true/false questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Exact-match key; comparison is trimmed and case-insensitive.
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub points: u32,
    /// Display position; grading walks questions in this order.
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Minutes allowed for an attempt; untimed when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    /// Percentage (1-100) an attempt must reach to pass.
    pub passing_score: u8,
    pub questions: Vec<QuizQuestion>,
    pub is_published: bool,
    pub author_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttemptAnswer {
    pub question_id: String,
    pub selected_answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GradeResult {
    pub score: u32,
    pub max_score: u32,
    pub percentage: u8,
    pub passed: bool,
    pub answer_results: Vec<AttemptAnswer>,
}

/// One persisted submission. Immutable: every submission creates a new
/// attempt, attempts are never edited.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub student_id: i64,
    pub student_name: String,
    pub answers: Vec<AttemptAnswer>,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u8,
    pub passed: bool,
    /// Seconds between opening the quiz and submitting.
    pub time_spent: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

/// Grade a set of submitted answers against the quiz questions.
///
/// Pure and total: every question yields exactly one [`AttemptAnswer`], in
/// question order, whether or not the student visited it. A missing answer
/// grades as the empty string. Percentage is 0 when the quiz carries no
/// points, and an attempt passes on exact equality with `passing_score`.
pub fn grade(
    questions: &[QuizQuestion],
    passing_score: u8,
    answers: &HashMap<String, String>,
) -> GradeResult {
    let mut ordered: Vec<&QuizQuestion> = questions.iter().collect();
    ordered.sort_by_key(|q| q.order);

    let answer_results: Vec<AttemptAnswer> = ordered
        .iter()
        .map(|q| {
            let selected = answers.get(&q.id).map(String::as_str).unwrap_or("");
            let is_correct =
                selected.trim().to_lowercase() == q.correct_answer.trim().to_lowercase();
            AttemptAnswer {
                question_id: q.id.clone(),
                selected_answer: selected.to_string(),
                is_correct,
                points_earned: if is_correct { q.points } else { 0 },
            }
        })
        .collect();

    let score: u32 = answer_results.iter().map(|a| a.points_earned).sum();
    let max_score: u32 = questions.iter().map(|q| q.points).sum();
    let percentage = if max_score > 0 {
        (score as f64 / max_score as f64 * 100.0).round() as u8
    } else {
        0
    };

    GradeResult {
        score,
        max_score,
        percentage,
        passed: percentage >= passing_score,
        answer_results,
    }
}

/// One student taking one quiz: collects answers and guards submission so
/// grading runs at most once per attempt, whether triggered by the student
/// or by timer expiry.
#[derive(Debug)]
pub struct QuizSession {
    quiz: Quiz,
    answers: HashMap<String, String>,
    started: Instant,
    submitted: bool,
}

impl QuizSession {
    pub fn start(quiz: Quiz) -> Self {
        Self {
            quiz,
            answers: HashMap::new(),
            started: Instant::now(),
            submitted: false,
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Start the countdown for a timed quiz; `None` for untimed quizzes.
    /// When the receiver resolves, the caller submits through the same
    /// [`QuizSession::submit`] path as a manual submit.
    pub fn start_timer(&self) -> Option<(timer::CountdownTimer, oneshot::Receiver<()>)> {
        self.quiz
            .time_limit
            .map(|minutes| timer::CountdownTimer::start(u64::from(minutes) * 60))
    }

    pub fn select_answer(
        &mut self,
        question_id: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<(), Error> {
        if self.submitted {
            return Err(Error::AlreadySubmitted);
        }
        self.answers.insert(question_id.into(), answer.into());
        Ok(())
    }

    /// Grade whatever answers have been captured so far. The second and any
    /// later invocation fails, so a manual submit racing the timer's
    /// auto-submit grades exactly once.
    pub fn submit(&mut self) -> Result<Submission, Error> {
        if self.submitted {
            return Err(Error::AlreadySubmitted);
        }
        self.submitted = true;
        let result = grade(&self.quiz.questions, self.quiz.passing_score, &self.answers);
        Ok(Submission {
            result,
            time_spent: self.started.elapsed().as_secs() as u32,
            completed_at: now_utc(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub result: GradeResult,
    pub time_spent: u32,
    pub completed_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, correct: &str, points: u32, order: u32) -> QuizQuestion {
        QuizQuestion {
            id: id.to_string(),
            question_text: format!("Question {id}"),
            question_type: QuestionType::MultipleChoice,
            options: vec!["a".to_string(), "b".to_string(), correct.to_string()],
            correct_answer: correct.to_string(),
            explanation: None,
            points,
            order,
        }
    }

    fn quiz(questions: Vec<QuizQuestion>, passing_score: u8) -> Quiz {
        Quiz {
            id: 1,
            title: "Tenses".to_string(),
            description: String::new(),
            time_limit: None,
            passing_score,
            questions,
            is_published: true,
            author_id: 1,
            created_at: now_utc(),
            updated_at: now_utc(),
        }
    }

    #[test]
    fn no_answers_scores_zero() {
        let questions = vec![question("q1", "went", 1, 1), question("q2", "True", 1, 2)];
        let result = grade(&questions, 70, &HashMap::new());
        assert_eq!(result.score, 0);
        assert_eq!(result.max_score, 2);
        assert_eq!(result.percentage, 0);
        assert!(!result.passed);
        assert_eq!(result.answer_results.len(), 2);
        assert!(result.answer_results.iter().all(|a| a.selected_answer.is_empty()));
    }

    #[test]
    fn half_right_is_fifty_percent_and_fails_seventy() {
        let questions = vec![question("q1", "went", 1, 1), question("q2", "True", 1, 2)];
        let answers = HashMap::from([("q1".to_string(), "went".to_string())]);
        let result = grade(&questions, 70, &answers);
        assert_eq!(result.score, 1);
        assert_eq!(result.max_score, 2);
        assert_eq!(result.percentage, 50);
        assert!(!result.passed);
    }

    #[test]
    fn passing_boundary_is_inclusive() {
        let questions = vec![
            question("q1", "a", 7, 1),
            question("q2", "b", 3, 2),
        ];
        let answers = HashMap::from([("q1".to_string(), "a".to_string())]);
        let result = grade(&questions, 70, &answers);
        assert_eq!(result.percentage, 70);
        assert!(result.passed);
    }

    #[test]
    fn comparison_ignores_case_and_surrounding_whitespace() {
        let questions = vec![question("q1", "  The Cat ", 2, 1)];
        let answers = HashMap::from([("q1".to_string(), "the cat".to_string())]);
        let result = grade(&questions, 100, &answers);
        assert_eq!(result.percentage, 100);
        assert!(result.passed);
    }

    #[test]
    fn zero_question_quiz_passes_only_a_zero_threshold() {
        let result = grade(&[], 70, &HashMap::new());
        assert_eq!(result.max_score, 0);
        assert_eq!(result.percentage, 0);
        assert!(!result.passed);
        assert!(grade(&[], 0, &HashMap::new()).passed);
    }

    #[test]
    fn results_follow_question_order_not_input_order() {
        let questions = vec![question("later", "x", 1, 5), question("first", "y", 1, 1)];
        let result = grade(&questions, 50, &HashMap::new());
        let ids: Vec<&str> = result
            .answer_results
            .iter()
            .map(|a| a.question_id.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "later"]);
    }

    #[test]
    fn grading_is_deterministic() {
        let questions = vec![question("q1", "went", 2, 1), question("q2", "False", 3, 2)];
        let answers = HashMap::from([
            ("q1".to_string(), "goed".to_string()),
            ("q2".to_string(), "false".to_string()),
        ]);
        assert_eq!(grade(&questions, 60, &answers), grade(&questions, 60, &answers));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_timer_auto_submits_whatever_was_answered() {
        let mut q = quiz(vec![question("q1", "went", 1, 1), question("q2", "True", 1, 2)], 70);
        q.time_limit = Some(1);
        let mut session = QuizSession::start(q);
        let (_timer, rx) = session.start_timer().expect("quiz is timed");
        session.select_answer("q1", "went").unwrap();

        rx.await.expect("timer should expire");
        let submission = session.submit().unwrap();
        assert_eq!(submission.result.percentage, 50);
        assert_eq!(submission.result.answer_results[1].selected_answer, "");
    }

    #[tokio::test(start_paused = true)]
    async fn early_submit_cancels_the_countdown() {
        let mut q = quiz(vec![question("q1", "went", 1, 1)], 70);
        q.time_limit = Some(30);
        let mut session = QuizSession::start(q);
        let (timer, rx) = session.start_timer().expect("quiz is timed");

        session.select_answer("q1", "went").unwrap();
        let submission = session.submit().unwrap();
        assert!(submission.result.passed);
        timer.cancel();

        // the expiry notification never arrives, and even if the auto-submit
        // path raced the cancel it would hit the guard
        assert!(rx.await.is_err());
        assert!(matches!(session.submit(), Err(Error::AlreadySubmitted)));
    }

    #[test]
    fn untimed_quiz_has_no_timer() {
        let session = QuizSession::start(quiz(vec![question("q1", "a", 1, 1)], 50));
        assert!(session.start_timer().is_none());
    }

    #[test]
    fn session_submits_exactly_once() {
        let mut session = QuizSession::start(quiz(vec![question("q1", "went", 1, 1)], 70));
        session.select_answer("q1", "went").unwrap();
        let submission = session.submit().unwrap();
        assert_eq!(submission.result.percentage, 100);
        assert!(matches!(session.submit(), Err(Error::AlreadySubmitted)));
        assert!(matches!(
            session.select_answer("q1", "goed"),
            Err(Error::AlreadySubmitted)
        ));
    }
}
