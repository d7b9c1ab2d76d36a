use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics::SUBMISSIONS_TOTAL;
use crate::models::analytics::AnswerOutcome;
use crate::models::session::{SubmitAnswerRequest, SubmitAnswerResponse};
use crate::models::{SessionEvent, Submission, SubmissionStatus};
use crate::services::activation_service::ActivationService;
use crate::services::analytics_service::AnalyticsService;
use crate::services::grading::grade_question;
use crate::services::notifier::SessionNotifier;
use crate::services::store::Store;

pub struct SubmissionService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn SessionNotifier>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn SessionNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Grades and records one answer.
    ///
    /// Primary attempts are stored on the session (at most one per student and
    /// question) and a wrong one opens a recall record. Activation attempts only
    /// move the recall record and never touch the session's submissions.
    pub async fn submit(
        &self,
        code: &str,
        req: SubmitAnswerRequest,
        now: DateTime<Utc>,
    ) -> AppResult<SubmitAnswerResponse> {
        let session = self
            .store
            .find_session_by_code(code)
            .await?
            .filter(|s| s.accepts_answers(now))
            .ok_or_else(|| AppError::not_found("session-not-found-or-ended"))?;

        if !session.has_student(&req.student_id) {
            return Err(AppError::forbidden("student-not-signed-in"));
        }

        if !req.is_activation
            && session
                .find_submission(&req.student_id, &req.question_id)
                .is_some()
        {
            return Err(AppError::conflict("question-already-answered"));
        }

        let question = self
            .store
            .find_question(&req.question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question-not-found"))?;

        let verdict = grade_question(&question, &req.answers, req.is_activation);
        let activation = ActivationService::new(self.store.clone());

        if req.is_activation {
            let is_correct_answer = verdict.status == SubmissionStatus::Correct;
            activation
                .record_attempt(&req.student_id, &session.id, &question.id, is_correct_answer, now)
                .await?;

            self.notifier.notify(SessionEvent::test_update(code));
            return Ok(SubmitAnswerResponse::Activation {
                activation: true,
                is_correct_answer,
            });
        }

        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            student_id: req.student_id.clone(),
            question_id: question.id.clone(),
            score: verdict.score.clone(),
            status: verdict.status,
            answers: req.answers,
            correct_answers: verdict.correct_answers,
            submitted_at: now,
        };

        // The earlier check only short-circuits the common case; this write is
        // the one that decides a race between two identical submissions.
        if !self.store.append_submission(&session.id, &submission).await? {
            return Err(AppError::conflict("question-already-answered"));
        }

        SUBMISSIONS_TOTAL
            .with_label_values(&[verdict.status.as_str()])
            .inc();
        tracing::info!(
            "Submission graded: session={}, student={}, question={}, status={}, score={}",
            session.code,
            submission.student_id,
            submission.question_id,
            verdict.status.as_str(),
            verdict.score
        );

        // From here on the verdict is stored, so follow-up writes only log.
        if verdict.status == SubmissionStatus::Wrong {
            if let Err(e) = activation
                .open_record(&req.student_id, &session.id, &question.id, now)
                .await
            {
                tracing::error!(
                    "Recall record not opened for student {} question {}: {}",
                    req.student_id,
                    question.id,
                    e
                );
            }
        }

        self.notifier.notify(SessionEvent::test_update(code));

        let outcome = if verdict.status == SubmissionStatus::Correct {
            AnswerOutcome::Right
        } else {
            AnswerOutcome::Wrong
        };
        if let Err(e) = AnalyticsService::new(self.store.clone())
            .record_answer(&req.student_id, &question.id, outcome, now)
            .await
        {
            tracing::warn!("Analytics not updated for {}: {}", req.student_id, e);
        }

        Ok(SubmitAnswerResponse::Graded {
            status: verdict.status,
            score: verdict.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionBody, Session, SessionSettings};
    use crate::services::notifier::BroadcastNotifier;
    use crate::services::store::MemoryStore;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<BroadcastNotifier>,
        service: SubmissionService,
    }

    async fn fixture(ended: bool) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(BroadcastNotifier::default());
        let now = Utc::now();

        store
            .insert_question(&Question {
                id: "q1".to_string(),
                question_set_id: "set".to_string(),
                owner_id: "t1".to_string(),
                question: Some("Pick B".to_string()),
                details: None,
                explanation: None,
                body: QuestionBody::Mcq {
                    options: vec!["A".to_string(), "B".to_string()],
                    answers: vec!["B".to_string()],
                },
                score: 4.0,
                duration: 10,
                activate_immediately: true,
                activation_repeat_count_limit: 0,
                complementary_question: None,
                created_at: now,
            })
            .await
            .unwrap();
        store
            .insert_session(&Session {
                id: "sess".to_string(),
                name: "Quiz".to_string(),
                code: "ABC123".to_string(),
                owner_id: "t1".to_string(),
                questions: vec!["q1".to_string()],
                ended,
                settings: SessionSettings::default(),
                invite_only: false,
                students: vec!["s1".to_string()],
                done_students: vec![],
                submissions: vec![],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let service = SubmissionService::new(store.clone(), notifier.clone());
        Fixture {
            store,
            notifier,
            service,
        }
    }

    fn request(student: &str, answer: &str, is_activation: bool) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            student_id: student.to_string(),
            question_id: "q1".to_string(),
            answers: vec![answer.to_string()],
            is_activation,
        }
    }

    #[tokio::test]
    async fn correct_primary_answer_is_stored_and_announced() {
        let f = fixture(false).await;
        let mut events = f.notifier.subscribe();

        let response = f
            .service
            .submit("ABC123", request("s1", "B", false), Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            response,
            SubmitAnswerResponse::Graded { status: SubmissionStatus::Correct, ref score } if score.as_str() == "4"
        ));

        let session = f.store.find_session("sess").await.unwrap().unwrap();
        assert_eq!(session.submissions.len(), 1);
        assert_eq!(session.submissions[0].correct_answers, vec!["B".to_string()]);
        assert_eq!(events.recv().await.unwrap().event_name(), "TEST_UPDATE");
    }

    #[tokio::test]
    async fn second_primary_answer_conflicts() {
        let f = fixture(false).await;
        f.service
            .submit("ABC123", request("s1", "A", false), Utc::now())
            .await
            .unwrap();
        let err = f
            .service
            .submit("ABC123", request("s1", "B", false), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_student_is_forbidden() {
        let f = fixture(false).await;
        let err = f
            .service
            .submit("ABC123", request("stranger", "B", false), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "student-not-signed-in"));
    }

    #[tokio::test]
    async fn ended_session_rejects_answers() {
        let f = fixture(true).await;
        let err = f
            .service
            .submit("ABC123", request("s1", "B", false), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "session-not-found-or-ended"));
    }

    #[tokio::test]
    async fn session_outside_its_window_rejects_answers() {
        let f = fixture(false).await;
        let settings = SessionSettings {
            ends_at: Some(Utc::now() - Duration::minutes(5)),
            ..SessionSettings::default()
        };
        f.store
            .patch_session(
                "sess",
                crate::services::store::SessionPatch {
                    settings: Some(settings),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = f
            .service
            .submit("ABC123", request("s1", "B", false), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn wrong_answer_opens_recall_and_activation_never_conflicts() {
        let f = fixture(false).await;
        let now = Utc::now();
        f.service
            .submit("ABC123", request("s1", "A", false), now)
            .await
            .unwrap();

        let record = f
            .store
            .find_activation_record("q1", "s1", "sess")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.correct_answered_count, 0);
        let activation = f
            .store
            .find_activation_session("s1", "sess")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(activation.records, vec![record.id.clone()]);

        for answer in ["A", "B", "B"] {
            f.service
                .submit("ABC123", request("s1", answer, true), now)
                .await
                .unwrap();
        }
        let record = f
            .store
            .find_activation_record("q1", "s1", "sess")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.correct_answered_count, 2);

        let session = f.store.find_session("sess").await.unwrap().unwrap();
        assert_eq!(session.submissions.len(), 1);
    }

    #[tokio::test]
    async fn activation_without_record_is_not_found() {
        let f = fixture(false).await;
        let err = f
            .service
            .submit("ABC123", request("s1", "B", true), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "activation-record-not-found"));
    }

    #[tokio::test]
    async fn stored_verdict_survives_a_failed_recall_write() {
        let f = fixture(false).await;
        f.store.fail_activation_writes();

        let response = f
            .service
            .submit("ABC123", request("s1", "A", false), Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            response,
            SubmitAnswerResponse::Graded { status: SubmissionStatus::Wrong, .. }
        ));

        let session = f.store.find_session("sess").await.unwrap().unwrap();
        assert_eq!(session.submissions.len(), 1);
        assert!(f
            .store
            .find_activation_record("q1", "s1", "sess")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_identical_submissions_store_exactly_one() {
        let f = fixture(false).await;
        let service = Arc::new(f.service);

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .submit("ABC123", request("s1", "B", false), Utc::now())
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => {
                    assert!(matches!(e, AppError::Conflict(ref m) if m == "question-already-answered"))
                }
            }
        }

        assert_eq!(accepted, 1);
        let session = f.store.find_session("sess").await.unwrap().unwrap();
        assert_eq!(session.submissions.len(), 1);
    }
}
