use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::session::{Score, SubmissionStatus};

/// Minimum classifier confidence before an answer is evaluated.
pub const MIN_CLASSIFICATION_CONFIDENCE: f64 = 0.7;
/// Evaluation scores run from 0 to this value.
pub const MAX_EVALUATION_SCORE: f64 = 5.0;
/// Evaluation score at which the suggested verdict becomes CORRECT.
pub const PASSING_EVALUATION_SCORE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Calculation,
    Conceptual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub kind: AnswerKind,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncorrectStatement {
    pub statement: String,
    pub explanation: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvaluation {
    #[serde(rename = "type")]
    pub kind: AnswerKind,
    pub evaluation: String,
    #[serde(default)]
    pub incorrect_answers: Vec<IncorrectStatement>,
    pub score: f64,
    pub confidence: f64,
}

impl AnswerEvaluation {
    /// Rejects payloads outside the contracted ranges.
    pub fn check_ranges(&self) -> Result<(), String> {
        if !(0.0..=MAX_EVALUATION_SCORE).contains(&self.score) {
            return Err(format!("evaluation score {} outside 0..=5", self.score));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("evaluation confidence {} outside 0..=1", self.confidence));
        }
        if let Some(bad) = self
            .incorrect_answers
            .iter()
            .find(|item| !(0.0..=1.0).contains(&item.confidence))
        {
            return Err(format!(
                "incorrect statement confidence {} outside 0..=1",
                bad.confidence
            ));
        }
        Ok(())
    }

    /// Maps the 0..5 evaluation onto the grader's verdict shape.
    pub fn suggested_verdict(&self, question_score: f64) -> SuggestedVerdict {
        let status = if self.score >= PASSING_EVALUATION_SCORE {
            SubmissionStatus::Correct
        } else {
            SubmissionStatus::Wrong
        };
        SuggestedVerdict {
            status,
            score: Score::points(self.score * question_score / MAX_EVALUATION_SCORE),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedVerdict {
    pub status: SubmissionStatus,
    pub score: Score,
}

/// Persisted model review of one student's free-form answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAnalysis {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_id: String,
    pub session_id: String,
    pub student_id: String,
    pub original_text: String,
    pub classification: Classification,
    pub answer_analysis: Vec<AnswerEvaluation>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAnswerRequest {
    #[validate(length(min = 1))]
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisQuery {
    pub student_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAnswerResponse {
    pub evaluation: AnswerEvaluation,
    pub suggested_verdict: SuggestedVerdict,
    pub analysis_id: String,
}
