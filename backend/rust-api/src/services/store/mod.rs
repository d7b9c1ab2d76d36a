//! Document store boundary. Every read and write the services perform goes
//! through [`Store`], so the grading and scheduling rules never see a driver.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    analytics::AnswerOutcome, ActivationRecord, ActivationSession, AnswerAnalysis,
    DailyAnalytics, Question, QuestionSet, Score, Session, SessionSettings, Submission,
    SubmissionStatus,
};
use crate::utils::time::CalendarDay;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Field-level session update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub questions: Option<Vec<String>>,
    pub settings: Option<SessionSettings>,
    pub ended: Option<bool>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap liveness probe used by the health check.
    async fn ping(&self) -> Result<()>;

    // Question sets and questions
    async fn insert_question_set(&self, set: &QuestionSet) -> Result<()>;
    async fn find_question_set(&self, id: &str) -> Result<Option<QuestionSet>>;
    /// Newest first.
    async fn list_question_sets(&self, owner_id: &str) -> Result<Vec<QuestionSet>>;
    async fn rename_question_set(&self, id: &str, name: &str) -> Result<Option<QuestionSet>>;
    /// Removes the set together with every question filed under it.
    async fn delete_question_set(&self, id: &str) -> Result<bool>;
    async fn insert_question(&self, question: &Question) -> Result<()>;
    async fn insert_questions(&self, questions: &[Question]) -> Result<()>;
    /// Overwrites a stored question by id. Returns `false` if it does not exist.
    async fn replace_question(&self, question: &Question) -> Result<bool>;
    async fn delete_question(&self, id: &str) -> Result<Option<Question>>;
    async fn find_question(&self, id: &str) -> Result<Option<Question>>;
    /// Unordered; missing ids are skipped.
    async fn find_questions(&self, ids: &[String]) -> Result<Vec<Question>>;
    /// Questions of the given sets owned by `owner_id`, in creation order.
    async fn questions_in_sets(&self, set_ids: &[String], owner_id: &str) -> Result<Vec<Question>>;

    // Sessions
    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn find_session(&self, id: &str) -> Result<Option<Session>>;
    async fn find_session_by_code(&self, code: &str) -> Result<Option<Session>>;
    /// Newest first.
    async fn list_sessions_by_owner(&self, owner_id: &str) -> Result<Vec<Session>>;
    /// Sessions the student joined that have not ended, newest first.
    async fn list_active_sessions_for_student(&self, student_id: &str) -> Result<Vec<Session>>;
    /// Every session the student joined, ended or not, newest first.
    async fn list_sessions_for_student(&self, student_id: &str) -> Result<Vec<Session>>;
    async fn patch_session(&self, id: &str, patch: SessionPatch) -> Result<Option<Session>>;
    async fn delete_session(&self, id: &str) -> Result<Option<Session>>;
    /// Adds to the roster with set semantics; `invite_only` is or-ed into the flag.
    async fn add_students(&self, session_id: &str, student_ids: &[String], invite_only: bool) -> Result<()>;
    async fn add_done_student(&self, session_id: &str, student_id: &str) -> Result<bool>;
    /// Appends unless the (student, question) pair already has a submission.
    /// Returns `false` when the pair was taken; the check and the write are one step.
    async fn append_submission(&self, session_id: &str, submission: &Submission) -> Result<bool>;
    /// Overrides the verdict of one submission. Returns `false` if it does not exist.
    async fn set_submission_verdict(
        &self,
        session_id: &str,
        submission_id: &str,
        status: SubmissionStatus,
        score: &Score,
    ) -> Result<bool>;

    // Activation
    async fn find_activation_record(
        &self,
        question_id: &str,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<ActivationRecord>>;
    async fn insert_activation_record(&self, record: &ActivationRecord) -> Result<()>;
    async fn save_activation_record(&self, record: &ActivationRecord) -> Result<()>;
    /// Adds the record to the student's activation session, creating it if absent.
    async fn attach_activation_record(
        &self,
        student_id: &str,
        session_id: &str,
        record_id: &str,
    ) -> Result<()>;
    async fn find_activation_session(
        &self,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<ActivationSession>>;
    /// Newest first.
    async fn list_activation_sessions(&self, student_id: &str) -> Result<Vec<ActivationSession>>;
    /// Unordered; missing ids are skipped.
    async fn find_activation_records(&self, ids: &[String]) -> Result<Vec<ActivationRecord>>;

    // Analytics
    async fn find_analytics(&self, user_id: &str, day: CalendarDay) -> Result<Option<DailyAnalytics>>;
    async fn insert_analytics(&self, analytics: &DailyAnalytics) -> Result<()>;
    async fn add_analytics_question(
        &self,
        analytics_id: &str,
        outcome: AnswerOutcome,
        question_id: &str,
    ) -> Result<()>;
    async fn add_screen_time(&self, analytics_id: &str, millis: i64) -> Result<Option<DailyAnalytics>>;
    async fn list_analytics_week(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        week: u32,
    ) -> Result<Vec<DailyAnalytics>>;

    // Answer analyses
    /// Replaces the analysis for (session, question, student) or inserts it.
    async fn upsert_answer_analysis(&self, analysis: &AnswerAnalysis) -> Result<AnswerAnalysis>;
    async fn find_answer_analysis(
        &self,
        session_id: &str,
        question_id: &str,
        student_id: &str,
    ) -> Result<Option<AnswerAnalysis>>;
}

/// Restores `ids` order over an unordered lookup result.
pub fn order_by_ids<T, F>(ids: &[String], mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut ordered = Vec::with_capacity(items.len());
    for id in ids {
        if let Some(pos) = items.iter().position(|item| key(item) == id.as_str()) {
            ordered.push(items.swap_remove(pos));
        }
    }
    ordered
}
