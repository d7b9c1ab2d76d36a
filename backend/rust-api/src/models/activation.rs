use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::QuestionView;
use super::session::SessionSummary;

/// Recall state of one (student, question, session) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Primary question whose complementary variant is tracked.
    pub question_id: String,
    pub student_id: String,
    pub session_id: String,
    pub correct_answered_count: u32,
    /// Set to the creation time until the first correct activation answer.
    pub last_answered_correct: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActivationRecord {
    pub fn new(question_id: &str, student_id: &str, session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            student_id: student_id.to_string(),
            session_id: session_id.to_string(),
            correct_answered_count: 0,
            last_answered_correct: now,
            created_at: now,
        }
    }

    pub fn record_correct(&mut self, now: DateTime<Utc>) {
        self.correct_answered_count += 1;
        self.last_answered_correct = now;
    }
}

/// The open recall records of one student within one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub session_id: String,
    /// Activation record ids, insertion ordered.
    #[serde(default)]
    pub records: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecall {
    pub id: String,
    pub session: SessionSummary,
    pub questions: Vec<QuestionView>,
    pub created_at: DateTime<Utc>,
}
