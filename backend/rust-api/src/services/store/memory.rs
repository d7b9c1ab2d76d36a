use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{SessionPatch, Store};
use crate::models::{
    analytics::AnswerOutcome, ActivationRecord, ActivationSession, AnswerAnalysis,
    DailyAnalytics, Question, QuestionSet, Score, Session, Submission, SubmissionStatus,
};
use crate::utils::time::CalendarDay;

/// Process-local store for tests and `STORE_BACKEND=memory` runs.
/// Collections keep insertion order; "newest first" walks them backwards.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    #[cfg(test)]
    activation_writes_fail: std::sync::atomic::AtomicBool,
}

#[derive(Default)]
struct Collections {
    question_sets: Vec<QuestionSet>,
    questions: Vec<Question>,
    sessions: Vec<Session>,
    activation_records: Vec<ActivationRecord>,
    activation_sessions: Vec<ActivationSession>,
    analytics: Vec<DailyAnalytics>,
    analyses: Vec<AnswerAnalysis>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later activation record write fail.
    #[cfg(test)]
    pub(crate) fn fail_activation_writes(&self) {
        self.activation_writes_fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_activation_writes(&self) -> Result<()> {
        if self
            .activation_writes_fail
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            anyhow::bail!("activation records unavailable");
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_activation_writes(&self) -> Result<()> {
        Ok(())
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) -> bool {
    if values.iter().any(|v| v == value) {
        false
    } else {
        values.push(value.to_string());
        true
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_question_set(&self, set: &QuestionSet) -> Result<()> {
        self.inner.write().await.question_sets.push(set.clone());
        Ok(())
    }

    async fn find_question_set(&self, id: &str) -> Result<Option<QuestionSet>> {
        let inner = self.inner.read().await;
        Ok(inner.question_sets.iter().find(|s| s.id == id).cloned())
    }

    async fn list_question_sets(&self, owner_id: &str) -> Result<Vec<QuestionSet>> {
        let inner = self.inner.read().await;
        Ok(inner
            .question_sets
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn rename_question_set(&self, id: &str, name: &str) -> Result<Option<QuestionSet>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .question_sets
            .iter_mut()
            .find(|s| s.id == id)
            .map(|set| {
                set.name = name.to_string();
                set.clone()
            }))
    }

    async fn delete_question_set(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.question_sets.len();
        inner.question_sets.retain(|s| s.id != id);
        if inner.question_sets.len() == before {
            return Ok(false);
        }
        inner.questions.retain(|q| q.question_set_id != id);
        Ok(true)
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        self.inner.write().await.questions.push(question.clone());
        Ok(())
    }

    async fn insert_questions(&self, questions: &[Question]) -> Result<()> {
        self.inner
            .write()
            .await
            .questions
            .extend_from_slice(questions);
        Ok(())
    }

    async fn replace_question(&self, question: &Question) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.questions.iter_mut().find(|q| q.id == question.id) {
            Some(existing) => {
                *existing = question.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_question(&self, id: &str) -> Result<Option<Question>> {
        let mut inner = self.inner.write().await;
        let pos = inner.questions.iter().position(|q| q.id == id);
        Ok(pos.map(|pos| inner.questions.remove(pos)))
    }

    async fn find_question(&self, id: &str) -> Result<Option<Question>> {
        let inner = self.inner.read().await;
        Ok(inner.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn find_questions(&self, ids: &[String]) -> Result<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn questions_in_sets(&self, set_ids: &[String], owner_id: &str) -> Result<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .iter()
            .filter(|q| q.owner_id == owner_id && set_ids.contains(&q.question_set_id))
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.inner.write().await.sessions.push(session.clone());
        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_session_by_code(&self, code: &str) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.iter().find(|s| s.code == code).cloned())
    }

    async fn list_sessions_by_owner(&self, owner_id: &str) -> Result<Vec<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_active_sessions_for_student(&self, student_id: &str) -> Result<Vec<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .rev()
            .filter(|s| !s.ended && s.has_student(student_id))
            .cloned()
            .collect())
    }

    async fn list_sessions_for_student(&self, student_id: &str) -> Result<Vec<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .rev()
            .filter(|s| s.has_student(student_id))
            .cloned()
            .collect())
    }

    async fn patch_session(&self, id: &str, patch: SessionPatch) -> Result<Option<Session>> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            session.name = name;
        }
        if let Some(questions) = patch.questions {
            session.questions = questions;
        }
        if let Some(settings) = patch.settings {
            session.settings = settings;
        }
        if let Some(ended) = patch.ended {
            session.ended = ended;
        }
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn delete_session(&self, id: &str) -> Result<Option<Session>> {
        let mut inner = self.inner.write().await;
        let pos = inner.sessions.iter().position(|s| s.id == id);
        Ok(pos.map(|pos| inner.sessions.remove(pos)))
    }

    async fn add_students(&self, session_id: &str, student_ids: &[String], invite_only: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            for student_id in student_ids {
                push_unique(&mut session.students, student_id);
            }
            session.invite_only |= invite_only;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn add_done_student(&self, session_id: &str, student_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                push_unique(&mut session.done_students, student_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_submission(&self, session_id: &str, submission: &Submission) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Ok(false);
        };
        if session
            .find_submission(&submission.student_id, &submission.question_id)
            .is_some()
        {
            return Ok(false);
        }
        session.submissions.push(submission.clone());
        session.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_submission_verdict(
        &self,
        session_id: &str,
        submission_id: &str,
        status: SubmissionStatus,
        score: &Score,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let submission = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .and_then(|s| s.submissions.iter_mut().find(|sub| sub.id == submission_id));
        match submission {
            Some(submission) => {
                submission.status = status;
                submission.score = score.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_activation_record(
        &self,
        question_id: &str,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<ActivationRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .activation_records
            .iter()
            .find(|r| {
                r.question_id == question_id
                    && r.student_id == student_id
                    && r.session_id == session_id
            })
            .cloned())
    }

    async fn insert_activation_record(&self, record: &ActivationRecord) -> Result<()> {
        self.check_activation_writes()?;
        self.inner
            .write()
            .await
            .activation_records
            .push(record.clone());
        Ok(())
    }

    async fn save_activation_record(&self, record: &ActivationRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner
            .activation_records
            .iter_mut()
            .find(|r| r.id == record.id)
        {
            Some(existing) => *existing = record.clone(),
            None => inner.activation_records.push(record.clone()),
        }
        Ok(())
    }

    async fn attach_activation_record(
        &self,
        student_id: &str,
        session_id: &str,
        record_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner
            .activation_sessions
            .iter_mut()
            .find(|a| a.student_id == student_id && a.session_id == session_id)
        {
            Some(activation) => {
                push_unique(&mut activation.records, record_id);
            }
            None => inner.activation_sessions.push(ActivationSession {
                id: uuid::Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                session_id: session_id.to_string(),
                records: vec![record_id.to_string()],
                created_at: Utc::now(),
            }),
        }
        Ok(())
    }

    async fn find_activation_session(
        &self,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<ActivationSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .activation_sessions
            .iter()
            .find(|a| a.student_id == student_id && a.session_id == session_id)
            .cloned())
    }

    async fn list_activation_sessions(&self, student_id: &str) -> Result<Vec<ActivationSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .activation_sessions
            .iter()
            .rev()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn find_activation_records(&self, ids: &[String]) -> Result<Vec<ActivationRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .activation_records
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn find_analytics(&self, user_id: &str, day: CalendarDay) -> Result<Option<DailyAnalytics>> {
        let inner = self.inner.read().await;
        Ok(inner
            .analytics
            .iter()
            .find(|a| {
                a.user_id == user_id
                    && a.year == day.year
                    && a.month == day.month
                    && a.week == day.week
                    && a.day == day.weekday
            })
            .cloned())
    }

    async fn insert_analytics(&self, analytics: &DailyAnalytics) -> Result<()> {
        self.inner.write().await.analytics.push(analytics.clone());
        Ok(())
    }

    async fn add_analytics_question(
        &self,
        analytics_id: &str,
        outcome: AnswerOutcome,
        question_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(analytics) = inner.analytics.iter_mut().find(|a| a.id == analytics_id) {
            let list = match outcome {
                AnswerOutcome::Right => &mut analytics.right_questions,
                AnswerOutcome::Wrong => &mut analytics.wrong_questions,
            };
            push_unique(list, question_id);
        }
        Ok(())
    }

    async fn add_screen_time(&self, analytics_id: &str, millis: i64) -> Result<Option<DailyAnalytics>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .analytics
            .iter_mut()
            .find(|a| a.id == analytics_id)
            .map(|analytics| {
                analytics.time_spent += millis;
                analytics.clone()
            }))
    }

    async fn list_analytics_week(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        week: u32,
    ) -> Result<Vec<DailyAnalytics>> {
        let inner = self.inner.read().await;
        Ok(inner
            .analytics
            .iter()
            .filter(|a| a.user_id == user_id && a.year == year && a.month == month && a.week == week)
            .cloned()
            .collect())
    }

    async fn upsert_answer_analysis(&self, analysis: &AnswerAnalysis) -> Result<AnswerAnalysis> {
        let mut inner = self.inner.write().await;
        let existing = inner.analyses.iter_mut().find(|a| {
            a.session_id == analysis.session_id
                && a.question_id == analysis.question_id
                && a.student_id == analysis.student_id
        });
        let stored = match existing {
            Some(existing) => {
                let id = existing.id.clone();
                *existing = AnswerAnalysis {
                    id,
                    ..analysis.clone()
                };
                existing.clone()
            }
            None => {
                inner.analyses.push(analysis.clone());
                analysis.clone()
            }
        };
        Ok(stored)
    }

    async fn find_answer_analysis(
        &self,
        session_id: &str,
        question_id: &str,
        student_id: &str,
    ) -> Result<Option<AnswerAnalysis>> {
        let inner = self.inner.read().await;
        Ok(inner
            .analyses
            .iter()
            .find(|a| {
                a.session_id == session_id
                    && a.question_id == question_id
                    && a.student_id == student_id
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionBody, SessionSettings};

    fn session(id: &str, ended: bool) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            name: "Quiz".to_string(),
            code: format!("CODE{}", id),
            owner_id: "t1".to_string(),
            questions: vec![],
            ended,
            settings: SessionSettings::default(),
            invite_only: false,
            students: vec!["s1".to_string()],
            done_students: vec![],
            submissions: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn submission(id: &str, question_id: &str) -> Submission {
        Submission {
            id: id.to_string(),
            student_id: "s1".to_string(),
            question_id: question_id.to_string(),
            score: Score::zero(),
            status: SubmissionStatus::Wrong,
            answers: vec![],
            correct_answers: vec![],
            submitted_at: Utc::now(),
        }
    }

    fn question(id: &str, set_id: &str) -> Question {
        Question {
            id: id.to_string(),
            question_set_id: set_id.to_string(),
            owner_id: "t1".to_string(),
            question: None,
            details: None,
            explanation: None,
            body: QuestionBody::FillInTheGaps {
                answers: vec!["Paris".to_string()],
            },
            score: 1.0,
            duration: 10,
            activate_immediately: true,
            activation_repeat_count_limit: 0,
            complementary_question: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_submission_refuses_a_taken_pair() {
        let store = MemoryStore::new();
        store.insert_session(&session("sess", false)).await.unwrap();

        assert!(store.append_submission("sess", &submission("a", "q1")).await.unwrap());
        assert!(!store.append_submission("sess", &submission("b", "q1")).await.unwrap());
        assert!(store.append_submission("sess", &submission("c", "q2")).await.unwrap());
        assert!(!store.append_submission("missing", &submission("d", "q3")).await.unwrap());

        let stored = store.find_session("sess").await.unwrap().unwrap();
        let ids: Vec<&str> = stored.submissions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn deleting_a_set_takes_its_questions_along() {
        let store = MemoryStore::new();
        for set_id in ["set-a", "set-b"] {
            store
                .insert_question_set(&QuestionSet {
                    id: set_id.to_string(),
                    name: set_id.to_string(),
                    owner_id: "t1".to_string(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        store
            .insert_questions(&[question("q1", "set-a"), question("q2", "set-b")])
            .await
            .unwrap();

        assert!(store.delete_question_set("set-a").await.unwrap());
        assert!(!store.delete_question_set("set-a").await.unwrap());
        assert!(store.find_question("q1").await.unwrap().is_none());
        assert!(store.find_question("q2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn student_session_listings_differ_on_ended() {
        let store = MemoryStore::new();
        store.insert_session(&session("old", true)).await.unwrap();
        store.insert_session(&session("new", false)).await.unwrap();

        let all = store.list_sessions_for_student("s1").await.unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let active = store.list_active_sessions_for_student("s1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(store.list_sessions_for_student("s2").await.unwrap().is_empty());
    }
}
