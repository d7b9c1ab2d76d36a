use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Answer layout of a question, keyed by its `type` on the wire.
///
/// `answers` always holds the canonical correct answer(s); how they are
/// compared against a learner's input depends on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionBody {
    #[serde(rename = "MCQ")]
    Mcq {
        #[serde(default)]
        options: Vec<String>,
        answers: Vec<String>,
    },
    #[serde(rename = "CHECKBOXES")]
    Checkboxes {
        #[serde(default)]
        options: Vec<String>,
        answers: Vec<String>,
    },
    #[serde(rename = "TRUE-OR-FALSE", alias = "TRUE_OR_FALSE")]
    TrueOrFalse {
        #[serde(default)]
        options: Vec<String>,
        answers: Vec<String>,
    },
    /// `answers` is a sample answer / expected key concepts; never auto-graded.
    #[serde(rename = "FREE-TEXT", alias = "FREE_TEXT")]
    FreeText {
        #[serde(default)]
        answers: Vec<String>,
    },
    #[serde(rename = "SORTER")]
    Sorter {
        #[serde(default)]
        options: Vec<String>,
        answers: Vec<String>,
    },
    #[serde(rename = "FILL-IN-THE-GAPS", alias = "FILL_IN_THE_GAPS")]
    FillInTheGaps { answers: Vec<String> },
}

impl QuestionBody {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionBody::Mcq { .. } => QuestionKind::Mcq,
            QuestionBody::Checkboxes { .. } => QuestionKind::Checkboxes,
            QuestionBody::TrueOrFalse { .. } => QuestionKind::TrueOrFalse,
            QuestionBody::FreeText { .. } => QuestionKind::FreeText,
            QuestionBody::Sorter { .. } => QuestionKind::Sorter,
            QuestionBody::FillInTheGaps { .. } => QuestionKind::FillInTheGaps,
        }
    }

    pub fn answers(&self) -> &[String] {
        match self {
            QuestionBody::Mcq { answers, .. }
            | QuestionBody::Checkboxes { answers, .. }
            | QuestionBody::TrueOrFalse { answers, .. }
            | QuestionBody::FreeText { answers }
            | QuestionBody::Sorter { answers, .. }
            | QuestionBody::FillInTheGaps { answers } => answers,
        }
    }

    pub fn options(&self) -> &[String] {
        match self {
            QuestionBody::Mcq { options, .. }
            | QuestionBody::Checkboxes { options, .. }
            | QuestionBody::TrueOrFalse { options, .. }
            | QuestionBody::Sorter { options, .. } => options,
            QuestionBody::FreeText { .. } | QuestionBody::FillInTheGaps { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "CHECKBOXES")]
    Checkboxes,
    #[serde(rename = "TRUE-OR-FALSE")]
    TrueOrFalse,
    #[serde(rename = "FREE-TEXT")]
    FreeText,
    #[serde(rename = "SORTER")]
    Sorter,
    #[serde(rename = "FILL-IN-THE-GAPS")]
    FillInTheGaps,
}

/// Remedial variant resurfaced after a wrong primary answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplementaryQuestion {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
    /// Falls back to the primary question's score when absent.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default = "default_duration")]
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_set_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
    pub score: f64,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_true")]
    pub activate_immediately: bool,
    #[serde(default)]
    pub activation_repeat_count_limit: u32,
    /// Present iff the question has a complementary variant.
    #[serde(default)]
    pub complementary_question: Option<ComplementaryQuestion>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn has_complementary_question(&self) -> bool {
        self.complementary_question.is_some()
    }

    /// Body and maximum score used when grading. Activation attempts use the
    /// complementary variant when one exists and the primary otherwise.
    pub fn gradable(&self, is_activation: bool) -> (&QuestionBody, f64) {
        match (&self.complementary_question, is_activation) {
            (Some(complementary), true) => (
                &complementary.body,
                complementary.score.unwrap_or(self.score),
            ),
            _ => (&self.body, self.score),
        }
    }
}

fn default_duration() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionSetRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_question"))]
pub struct CreateQuestionRequest {
    pub question: Option<String>,
    pub details: Option<String>,
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
    #[validate(range(min = 1.0, message = "Score must be at least 1"))]
    pub score: f64,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_true")]
    pub activate_immediately: bool,
    #[serde(default)]
    pub activation_repeat_count_limit: u32,
    #[serde(default)]
    pub has_complementary_question: bool,
    #[serde(default)]
    pub complementary_question: Option<ComplementaryQuestion>,
}

fn validate_create_question(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    if !matches!(req.body, QuestionBody::FreeText { .. }) && req.body.answers().is_empty() {
        return Err(ValidationError::new("answers_required")
            .with_message("At least one correct answer is required".into()));
    }
    if req.has_complementary_question && req.complementary_question.is_none() {
        return Err(ValidationError::new("complementary_question_required")
            .with_message("complementaryQuestion is required when hasComplementaryQuestion is set".into()));
    }
    if let Some(score) = req.complementary_question.as_ref().and_then(|c| c.score) {
        if score < 1.0 {
            return Err(ValidationError::new("complementary_score")
                .with_message("Complementary score must be at least 1".into()));
        }
    }
    Ok(())
}

impl CreateQuestionRequest {
    pub fn into_question(self, id: String, question_set_id: String, owner_id: String) -> Question {
        // The complementary variant only exists when the flag says so.
        let complementary_question = if self.has_complementary_question {
            self.complementary_question
        } else {
            None
        };

        Question {
            id,
            question_set_id,
            owner_id,
            question: self.question,
            details: self.details,
            explanation: self.explanation,
            body: self.body,
            score: self.score,
            duration: self.duration,
            activate_immediately: self.activate_immediately,
            activation_repeat_count_limit: self.activation_repeat_count_limit,
            complementary_question,
            created_at: Utc::now(),
        }
    }
}

/// Student-facing projection: the prompt and options without the answer key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: Option<String>,
    pub details: Option<String>,
    pub options: Vec<String>,
    /// Number of blanks for fill-in-the-gaps, items for sorter.
    pub answer_slots: usize,
    pub score: f64,
    pub duration: u32,
    pub has_complementary_question: bool,
}

impl QuestionView {
    pub fn primary(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            kind: question.body.kind(),
            question: question.question.clone(),
            details: question.details.clone(),
            options: question.body.options().to_vec(),
            answer_slots: question.body.answers().len(),
            score: question.score,
            duration: question.duration,
            has_complementary_question: question.has_complementary_question(),
        }
    }

    /// The complementary variant, addressed by the primary question's id so
    /// that activation submissions resolve back to it.
    pub fn complementary(question: &Question) -> Option<Self> {
        let complementary = question.complementary_question.as_ref()?;
        Some(Self {
            id: question.id.clone(),
            kind: complementary.body.kind(),
            question: complementary.question.clone(),
            details: complementary.details.clone(),
            options: complementary.body.options().to_vec(),
            answer_slots: complementary.body.answers().len(),
            score: complementary.score.unwrap_or(question.score),
            duration: complementary.duration,
            has_complementary_question: false,
        })
    }
}
