pub mod activation;
pub mod analytics;
pub mod evaluation;
pub mod event;
pub mod question;
pub mod session;

pub use activation::{ActivationRecord, ActivationSession, PendingRecall};
pub use analytics::DailyAnalytics;
pub use evaluation::{AnswerAnalysis, AnswerEvaluation, Classification};
pub use event::SessionEvent;
pub use question::{Question, QuestionBody, QuestionKind, QuestionSet, QuestionView};
pub use session::{Score, Session, SessionSettings, Submission, SubmissionStatus};
