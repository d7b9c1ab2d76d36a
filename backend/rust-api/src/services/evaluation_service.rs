//! Model-assisted review of free-form answers. The model itself is behind
//! [`LanguageModel`]; this module owns the prompts, the confidence gate and
//! the checks on what comes back.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::AI_EVALUATIONS_TOTAL;
use crate::models::evaluation::{
    AnswerKind, EvaluateAnswerResponse, MIN_CLASSIFICATION_CONFIDENCE,
};
use crate::models::{AnswerAnalysis, AnswerEvaluation, Classification};
use crate::services::store::Store;

const CLASSIFY_PROMPT: &str = "Classify questions as either requiring \"calculation\" or being \"conceptual\".\n\
Respond with {\"type\": \"calculation\" | \"conceptual\", \"confidence\": number between 0 and 1}.\n\
Only use \"calculation\" if a mathematical process is clearly needed to answer.";

const CONCEPTUAL_PROMPT: &str = "You are an expert tutor. Analyze the student's answer to a conceptual question. \
Decide whether it is correct, partially correct or incorrect. Do not penalize missing details unless they affect \
the core understanding, and do not mention unrelated facts.\n\
type: \"conceptual\".\n\
evaluation: at most three lines on whether the understanding shown is correct and complete enough.\n\
incorrectAnswers: only statements from the answer that are actually wrong or misleading, each with the exact \
statement, an explanation and a confidence between 0 and 1.\n\
score: 0 to 5 for how well the answer demonstrates understanding.\n\
confidence: your confidence in this evaluation, 0 to 1.";

const CALCULATION_PROMPT: &str = "You are an expert math evaluator. Evaluate the student's answer to a \
calculation question.\n\
type: \"calculation\".\n\
evaluation: correctness, approach and feedback.\n\
incorrectAnswers: each incorrect part of the answer with an explanation of at most three lines and a confidence \
between 0 and 1.\n\
score: 0 to 5 for how well the student answered.\n\
confidence: your confidence in the overall evaluation, 0 to 1.";

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn classify(&self, question: &str) -> Result<Classification>;
    async fn evaluate(
        &self,
        kind: AnswerKind,
        question: &str,
        answer: &str,
    ) -> Result<AnswerEvaluation>;
}

/// Chat completions client constrained to JSON-schema output.
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        )
    }

    async fn chat_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: JsonValue,
    ) -> Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OpenAI API key is not configured"))?;

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": schema_name, "strict": true, "schema": schema },
            },
        });

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .context("OpenAI request failed")?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, text));
        }

        let body: JsonValue = res.json().await.context("OpenAI response is not JSON")?;
        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow!("Invalid OpenAI response format"))?;

        serde_json::from_str(content).context("OpenAI content does not match the schema")
    }
}

fn classification_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "enum": ["calculation", "conceptual"] },
            "confidence": { "type": "number" }
        },
        "required": ["type", "confidence"],
        "additionalProperties": false
    })
}

fn evaluation_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "enum": ["calculation", "conceptual"] },
            "evaluation": { "type": "string" },
            "incorrectAnswers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "statement": { "type": "string" },
                        "explanation": { "type": "string" },
                        "confidence": { "type": "number" }
                    },
                    "required": ["statement", "explanation", "confidence"],
                    "additionalProperties": false
                }
            },
            "score": { "type": "number" },
            "confidence": { "type": "number" }
        },
        "required": ["type", "evaluation", "incorrectAnswers", "score", "confidence"],
        "additionalProperties": false
    })
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn classify(&self, question: &str) -> Result<Classification> {
        self.chat_json(CLASSIFY_PROMPT, question, "classification", classification_schema())
            .await
    }

    async fn evaluate(
        &self,
        kind: AnswerKind,
        question: &str,
        answer: &str,
    ) -> Result<AnswerEvaluation> {
        let system = match kind {
            AnswerKind::Conceptual => CONCEPTUAL_PROMPT,
            AnswerKind::Calculation => CALCULATION_PROMPT,
        };
        let user = format!("question: {}, studentAnswer: {}", question, answer);
        self.chat_json(system, &user, "evaluation", evaluation_schema())
            .await
    }
}

/// Canned model for tests and offline runs. Records the prompts it receives.
pub struct ScriptedModel {
    classification: Classification,
    evaluation: AnswerEvaluation,
    seen: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(classification: Classification, evaluation: AnswerEvaluation) -> Self {
        Self {
            classification,
            evaluation,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answers the model has been asked to evaluate.
    pub fn evaluated_answers(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn classify(&self, _question: &str) -> Result<Classification> {
        Ok(self.classification.clone())
    }

    async fn evaluate(
        &self,
        _kind: AnswerKind,
        _question: &str,
        answer: &str,
    ) -> Result<AnswerEvaluation> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(answer.to_string());
        }
        Ok(self.evaluation.clone())
    }
}

/// Turns a classification into the kind to evaluate as, or refuses it.
pub fn gate_classification(classification: &Classification) -> AppResult<AnswerKind> {
    if !(0.0..=1.0).contains(&classification.confidence) {
        return Err(AppError::upstream(format!(
            "classification confidence {} outside 0..=1",
            classification.confidence
        )));
    }
    if classification.confidence < MIN_CLASSIFICATION_CONFIDENCE {
        return Err(AppError::validation(
            "Question classification confidence too low",
        ));
    }
    Ok(classification.kind)
}

pub struct EvaluationService {
    store: Arc<dyn Store>,
    model: Arc<dyn LanguageModel>,
}

impl EvaluationService {
    pub fn new(store: Arc<dyn Store>, model: Arc<dyn LanguageModel>) -> Self {
        Self { store, model }
    }

    pub async fn evaluate(
        &self,
        owner_id: &str,
        session_id: &str,
        question_id: &str,
        student_id: &str,
    ) -> AppResult<EvaluateAnswerResponse> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))?;
        if session.owner_id != owner_id {
            return Err(AppError::forbidden("not-session-owner"));
        }
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question-not-found"))?;
        let answer = session
            .find_submission(student_id, question_id)
            .and_then(|s| s.answers.first())
            .cloned()
            .ok_or_else(|| AppError::not_found("submission-not-found"))?;

        let prompt = question.question.clone().unwrap_or_default();
        let outcome = self.run_model(&prompt, &answer).await;
        let label = match &outcome {
            Ok(_) => "stored",
            Err(AppError::ValidationFailed(_)) => "low_confidence",
            Err(_) => "upstream_error",
        };
        AI_EVALUATIONS_TOTAL.with_label_values(&[label]).inc();
        let (classification, evaluation) = outcome?;

        let analysis = AnswerAnalysis {
            id: Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            session_id: session_id.to_string(),
            student_id: student_id.to_string(),
            original_text: answer,
            classification,
            answer_analysis: vec![evaluation.clone()],
            created_at: Utc::now(),
        };
        let stored = self.store.upsert_answer_analysis(&analysis).await?;

        tracing::info!(
            "Answer evaluated: session={}, question={}, student={}, score={}",
            session_id,
            question_id,
            student_id,
            evaluation.score
        );

        Ok(EvaluateAnswerResponse {
            suggested_verdict: evaluation.suggested_verdict(question.score),
            evaluation,
            analysis_id: stored.id,
        })
    }

    async fn run_model(
        &self,
        question: &str,
        answer: &str,
    ) -> AppResult<(Classification, AnswerEvaluation)> {
        let classification = self
            .model
            .classify(question)
            .await
            .map_err(|e| AppError::upstream(format!("classification failed: {:#}", e)))?;
        let kind = gate_classification(&classification)?;

        let evaluation = self
            .model
            .evaluate(kind, question, answer)
            .await
            .map_err(|e| AppError::upstream(format!("evaluation failed: {:#}", e)))?;
        evaluation.check_ranges().map_err(AppError::upstream)?;

        Ok((classification, evaluation))
    }

    pub async fn analysis(
        &self,
        owner_id: &str,
        session_id: &str,
        question_id: &str,
        student_id: &str,
    ) -> AppResult<AnswerAnalysis> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))?;
        if session.owner_id != owner_id {
            return Err(AppError::forbidden("not-session-owner"));
        }
        self.store
            .find_answer_analysis(session_id, question_id, student_id)
            .await?
            .ok_or_else(|| AppError::not_found("analysis-not-found"))
    }
}
