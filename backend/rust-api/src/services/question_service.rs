use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::question::{CreateQuestionRequest, CreateQuestionSetRequest};
use crate::models::{Question, QuestionSet};
use crate::services::store::Store;

pub struct QuestionService {
    store: Arc<dyn Store>,
}

impl QuestionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_set(
        &self,
        owner_id: &str,
        req: CreateQuestionSetRequest,
    ) -> AppResult<QuestionSet> {
        let set = QuestionSet {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_question_set(&set).await?;
        tracing::info!("Question set {} created by {}", set.id, owner_id);
        Ok(set)
    }

    pub async fn list_sets(&self, owner_id: &str) -> AppResult<Vec<QuestionSet>> {
        Ok(self.store.list_question_sets(owner_id).await?)
    }

    pub async fn rename_set(
        &self,
        owner_id: &str,
        set_id: &str,
        req: CreateQuestionSetRequest,
    ) -> AppResult<QuestionSet> {
        self.owned_set(owner_id, set_id).await?;
        self.store
            .rename_question_set(set_id, &req.name)
            .await?
            .ok_or_else(|| AppError::not_found("question-set-not-found"))
    }

    /// Deletes the set and its questions. Sessions already built from them keep
    /// their question ids; missing questions are skipped when a session is read.
    pub async fn delete_set(&self, owner_id: &str, set_id: &str) -> AppResult<()> {
        self.owned_set(owner_id, set_id).await?;
        if !self.store.delete_question_set(set_id).await? {
            return Err(AppError::not_found("question-set-not-found"));
        }
        tracing::info!("Question set {} deleted by {}", set_id, owner_id);
        Ok(())
    }

    async fn owned_set(&self, owner_id: &str, set_id: &str) -> AppResult<QuestionSet> {
        let set = self
            .store
            .find_question_set(set_id)
            .await?
            .ok_or_else(|| AppError::not_found("question-set-not-found"))?;
        if set.owner_id != owner_id {
            return Err(AppError::forbidden("not-question-set-owner"));
        }
        Ok(set)
    }

    pub async fn add_question(
        &self,
        owner_id: &str,
        set_id: &str,
        req: CreateQuestionRequest,
    ) -> AppResult<Question> {
        let set = self.owned_set(owner_id, set_id).await?;
        let question = req.into_question(Uuid::new_v4().to_string(), set.id, owner_id.to_string());
        self.store.insert_question(&question).await?;
        tracing::info!(
            "Question {} ({:?}) added to set {}",
            question.id,
            question.body.kind(),
            question.question_set_id
        );
        Ok(question)
    }

    /// Copies every question of `source_set_id` into `set_id` under fresh ids.
    pub async fn import_questions(
        &self,
        owner_id: &str,
        set_id: &str,
        source_set_id: &str,
    ) -> AppResult<Vec<Question>> {
        if set_id == source_set_id {
            return Err(AppError::validation("cannot-import-set-into-itself"));
        }
        let target = self.owned_set(owner_id, set_id).await?;
        let source = self.owned_set(owner_id, source_set_id).await?;

        let now = Utc::now();
        let copies: Vec<Question> = self
            .store
            .questions_in_sets(std::slice::from_ref(&source.id), owner_id)
            .await?
            .into_iter()
            .map(|question| Question {
                id: Uuid::new_v4().to_string(),
                question_set_id: target.id.clone(),
                created_at: now,
                ..question
            })
            .collect();

        self.store.insert_questions(&copies).await?;
        tracing::info!(
            "Imported {} questions from set {} into {}",
            copies.len(),
            source.id,
            target.id
        );
        Ok(copies)
    }

    async fn owned_question(&self, owner_id: &str, question_id: &str) -> AppResult<Question> {
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question-not-found"))?;
        if question.owner_id != owner_id {
            return Err(AppError::forbidden("not-question-owner"));
        }
        Ok(question)
    }

    pub async fn get_question(&self, owner_id: &str, question_id: &str) -> AppResult<Question> {
        self.owned_question(owner_id, question_id).await
    }

    /// Replaces the question's content. Id, set, owner and creation time stay.
    pub async fn edit_question(
        &self,
        owner_id: &str,
        question_id: &str,
        req: CreateQuestionRequest,
    ) -> AppResult<Question> {
        let existing = self.owned_question(owner_id, question_id).await?;
        let question = Question {
            created_at: existing.created_at,
            ..req.into_question(existing.id, existing.question_set_id, existing.owner_id)
        };
        self.save(&question).await?;
        tracing::info!("Question {} updated", question.id);
        Ok(question)
    }

    /// Drops the remedial variant. Recall records pointing at the question stop
    /// being due from then on.
    pub async fn remove_complementary(
        &self,
        owner_id: &str,
        question_id: &str,
    ) -> AppResult<Question> {
        let mut question = self.owned_question(owner_id, question_id).await?;
        if question.complementary_question.take().is_none() {
            return Err(AppError::not_found("complementary-question-not-found"));
        }
        self.save(&question).await?;
        tracing::info!("Complementary variant removed from question {}", question.id);
        Ok(question)
    }

    pub async fn delete_question(&self, owner_id: &str, question_id: &str) -> AppResult<()> {
        self.owned_question(owner_id, question_id).await?;
        self.store
            .delete_question(question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question-not-found"))?;
        tracing::info!("Question {} deleted by {}", question_id, owner_id);
        Ok(())
    }

    async fn save(&self, question: &Question) -> AppResult<()> {
        if !self.store.replace_question(question).await? {
            return Err(AppError::not_found("question-not-found"));
        }
        Ok(())
    }

    pub async fn list_questions(&self, owner_id: &str, set_id: &str) -> AppResult<Vec<Question>> {
        let set = self.owned_set(owner_id, set_id).await?;
        Ok(self
            .store
            .questions_in_sets(std::slice::from_ref(&set.id), owner_id)
            .await?)
    }
}
