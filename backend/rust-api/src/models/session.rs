use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::question::QuestionView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Correct,
    Wrong,
    Reviewing,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Correct => "CORRECT",
            SubmissionStatus::Wrong => "WRONG",
            SubmissionStatus::Reviewing => "REVIEWING",
        }
    }
}

/// String-encoded score: a number, `"0"`, or `"?"` while under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(String);

impl Score {
    pub fn points(value: f64) -> Self {
        Score(format_points(value))
    }

    pub fn zero() -> Self {
        Score("0".to_string())
    }

    pub fn pending() -> Self {
        Score("?".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole numbers render without a fractional part ("4", not "4.0").
fn format_points(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub question_id: String,
    pub score: Score,
    pub status: SubmissionStatus,
    pub answers: Vec<String>,
    /// Snapshot of the question's answers at grading time.
    pub correct_answers: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(default = "default_true")]
    pub show_solutions: bool,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default = "default_true")]
    pub shuffle_answer_options: bool,
    #[serde(default)]
    pub allow_guest_students: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub total_duration_minutes: Option<u32>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            show_solutions: true,
            shuffle_questions: false,
            shuffle_answer_options: true,
            allow_guest_students: false,
            starts_at: None,
            ends_at: None,
            total_duration_minutes: None,
        }
    }
}

impl SessionSettings {
    /// Whether `now` falls inside the configured time window (open-ended sides allowed).
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        let started = self.starts_at.map_or(true, |starts_at| now >= starts_at);
        let not_over = self.ends_at.map_or(true, |ends_at| now <= ends_at);
        started && not_over
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub code: String,
    pub owner_id: String,
    /// Ordered question ids.
    pub questions: Vec<String>,
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub settings: SessionSettings,
    /// Roster restricted to invited students (plus guests when allowed).
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub done_students: Vec<String>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn has_student(&self, student_id: &str) -> bool {
        self.students.iter().any(|id| id == student_id)
    }

    pub fn find_submission(&self, student_id: &str, question_id: &str) -> Option<&Submission> {
        self.submissions
            .iter()
            .find(|s| s.student_id == student_id && s.question_id == question_id)
    }

    /// Whether the session currently accepts answers.
    pub fn accepts_answers(&self, now: DateTime<Utc>) -> bool {
        !self.ended && self.settings.window_contains(now)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub question_sets: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditSessionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub questions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteStudentsRequest {
    #[validate(length(min = 1, message = "At least one student is required"))]
    pub student_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    #[validate(length(min = 1))]
    pub student_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1))]
    pub student_id: String,
    #[validate(length(min = 1))]
    pub question_id: String,
    pub answers: Vec<String>,
    #[serde(default)]
    pub is_activation: bool,
}

/// Reply to a submission: a verdict for primary attempts, a boolean for activations.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubmitAnswerResponse {
    #[serde(rename_all = "camelCase")]
    Graded {
        status: SubmissionStatus,
        score: Score,
    },
    #[serde(rename_all = "camelCase")]
    Activation {
        activation: bool,
        is_correct_answer: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Correct,
    Wrong,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmissionRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    #[validate(length(min = 1))]
    pub session_id: String,
    pub status: ReviewStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct QuestionsQuery {
    #[serde(default)]
    pub activation: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestionsResponse {
    pub questions: Vec<QuestionView>,
    pub settings: SessionSettings,
    /// Empty in activation mode.
    pub submissions: Vec<Submission>,
    pub session: SessionSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub code: String,
    pub ended: bool,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            code: session.code.clone(),
            ended: session.ended,
        }
    }
}

/// Reply to a join or join-status request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub student_id: String,
    pub session: SessionSummary,
}
