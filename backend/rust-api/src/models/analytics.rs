use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::session::{Session, SubmissionStatus};
use crate::utils::time::CalendarDay;

/// One student's activity for a single calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAnalytics {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub year: i32,
    /// Zero-based month.
    pub month: u32,
    /// Week of month, Sunday-start weeks, one-based.
    pub week: u32,
    /// Weekday, 0 = Sunday.
    pub day: u32,
    #[serde(default)]
    pub right_questions: Vec<String>,
    #[serde(default)]
    pub wrong_questions: Vec<String>,
    /// Milliseconds.
    #[serde(default)]
    pub time_spent: i64,
    pub created_at: DateTime<Utc>,
}

impl DailyAnalytics {
    pub fn new(user_id: &str, day: CalendarDay) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            year: day.year,
            month: day.month,
            week: day.week,
            day: day.weekday,
            right_questions: Vec::new(),
            wrong_questions: Vec::new(),
            time_spent: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Right,
    Wrong,
}

impl AnswerOutcome {
    pub fn field(&self) -> &'static str {
        match self {
            AnswerOutcome::Right => "rightQuestions",
            AnswerOutcome::Wrong => "wrongQuestions",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScreenTimeRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 0, message = "screenTime must not be negative"))]
    pub screen_time: i64,
}

/// A student's graded answers in one session. Answers still under review
/// appear in neither list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvaluation {
    pub session_id: String,
    pub name: String,
    pub code: String,
    pub ended: bool,
    pub correct_answers: Vec<String>,
    pub wrong_answers: Vec<String>,
}

impl SessionEvaluation {
    /// `None` when the student has no graded answer in the session.
    pub fn of(session: &Session, student_id: &str) -> Option<Self> {
        let mut correct_answers = Vec::new();
        let mut wrong_answers = Vec::new();
        for submission in session
            .submissions
            .iter()
            .filter(|s| s.student_id == student_id)
        {
            match submission.status {
                SubmissionStatus::Correct => correct_answers.push(submission.question_id.clone()),
                SubmissionStatus::Wrong => wrong_answers.push(submission.question_id.clone()),
                SubmissionStatus::Reviewing => {}
            }
        }

        if correct_answers.is_empty() && wrong_answers.is_empty() {
            return None;
        }
        Some(Self {
            session_id: session.id.clone(),
            name: session.name.clone(),
            code: session.code.clone(),
            ended: session.ended,
            correct_answers,
            wrong_answers,
        })
    }
}
