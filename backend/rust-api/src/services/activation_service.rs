use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult};
use crate::metrics::ACTIVATION_ATTEMPTS_TOTAL;
use crate::models::{ActivationRecord, PendingRecall, Question, QuestionView};
use crate::services::store::{order_by_ids, Store};

/// Minimum gap between a correct recall and the next one for questions that
/// are not activated immediately.
pub const RECALL_INTERVAL_HOURS: i64 = 24;

/// Whether the complementary variant tracked by `record` should be offered now.
pub fn is_due(record: &ActivationRecord, question: &Question, now: DateTime<Utc>) -> bool {
    if !question.has_complementary_question() {
        return false;
    }

    let interval_elapsed = question.activate_immediately
        || now - record.last_answered_correct >= Duration::hours(RECALL_INTERVAL_HOURS);
    if !interval_elapsed {
        return false;
    }

    // A limit of 0 means "until answered correctly once".
    let limit = question.activation_repeat_count_limit.max(1);
    record.correct_answered_count < limit
}

/// Complementary views of every due record, in record order. Records whose
/// question no longer exists are skipped.
pub fn due_views(
    records: &[ActivationRecord],
    questions: &HashMap<String, Question>,
    now: DateTime<Utc>,
) -> Vec<QuestionView> {
    records
        .iter()
        .filter_map(|record| {
            let question = questions.get(&record.question_id)?;
            if is_due(record, question, now) {
                QuestionView::complementary(question)
            } else {
                None
            }
        })
        .collect()
}

pub struct ActivationService {
    store: Arc<dyn Store>,
}

impl ActivationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Opens a recall record after a wrong primary answer. A record that
    /// already exists for the triple is reused rather than duplicated.
    pub async fn open_record(
        &self,
        student_id: &str,
        session_id: &str,
        question_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ActivationRecord> {
        let record = match self
            .store
            .find_activation_record(question_id, student_id, session_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let record = ActivationRecord::new(question_id, student_id, session_id, now);
                self.store.insert_activation_record(&record).await?;
                record
            }
        };

        self.store
            .attach_activation_record(student_id, session_id, &record.id)
            .await?;

        tracing::info!(
            "Activation record {} opened for student {} question {}",
            record.id,
            student_id,
            question_id
        );
        Ok(record)
    }

    /// Applies an activation attempt. Only correct answers move the counter;
    /// wrong ones leave the record untouched.
    pub async fn record_attempt(
        &self,
        student_id: &str,
        session_id: &str,
        question_id: &str,
        correct: bool,
        now: DateTime<Utc>,
    ) -> AppResult<ActivationRecord> {
        let mut record = self
            .store
            .find_activation_record(question_id, student_id, session_id)
            .await?
            .ok_or_else(|| AppError::not_found("activation-record-not-found"))?;

        let result = if correct { "correct" } else { "wrong" };
        ACTIVATION_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();

        if correct {
            record.record_correct(now);
            self.store.save_activation_record(&record).await?;
        }

        tracing::info!(
            "Activation attempt for record {}: {} (count {})",
            record.id,
            result,
            record.correct_answered_count
        );
        Ok(record)
    }

    /// Due complementary questions of one student within one session.
    pub async fn due_questions(
        &self,
        student_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<QuestionView>> {
        let Some(activation) = self
            .store
            .find_activation_session(student_id, session_id)
            .await?
        else {
            return Ok(Vec::new());
        };

        let records = self.load_records(&activation.records).await?;
        let questions = self.load_questions(&records).await?;
        Ok(due_views(&records, &questions, now))
    }

    /// Every activation session of the student that still has something due,
    /// newest first. Sessions that were deleted are dropped.
    pub async fn pending_recalls(
        &self,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PendingRecall>> {
        let activations = self.store.list_activation_sessions(student_id).await?;
        let mut pending = Vec::new();

        for activation in activations {
            let Some(session) = self.store.find_session(&activation.session_id).await? else {
                continue;
            };

            let records = self.load_records(&activation.records).await?;
            let questions = self.load_questions(&records).await?;
            let due = due_views(&records, &questions, now);
            if due.is_empty() {
                continue;
            }

            pending.push(PendingRecall {
                id: activation.id,
                session: (&session).into(),
                questions: due,
                created_at: activation.created_at,
            });
        }

        Ok(pending)
    }

    async fn load_records(&self, ids: &[String]) -> AppResult<Vec<ActivationRecord>> {
        let records = self.store.find_activation_records(ids).await?;
        Ok(order_by_ids(ids, records, |r| r.id.as_str()))
    }

    async fn load_questions(
        &self,
        records: &[ActivationRecord],
    ) -> AppResult<HashMap<String, Question>> {
        let ids: Vec<String> = records.iter().map(|r| r.question_id.clone()).collect();
        let questions = self.store.find_questions(&ids).await?;
        Ok(questions.into_iter().map(|q| (q.id.clone(), q)).collect())
    }
}
