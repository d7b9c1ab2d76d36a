use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::metrics::SESSIONS_TOTAL;
use crate::models::question::QuestionBody;
use crate::models::session::{
    CreateSessionRequest, EditSessionRequest, ParticipantResponse, ReviewStatus,
    ReviewSubmissionRequest, SessionQuestionsResponse,
};
use crate::models::{
    Question, QuestionView, Score, Session, SessionEvent, SessionSettings, SubmissionStatus,
};
use crate::services::activation_service::ActivationService;
use crate::services::notifier::SessionNotifier;
use crate::services::store::{order_by_ids, SessionPatch, Store};

pub const SESSION_CODE_LEN: usize = 6;
const CODE_ATTEMPTS: usize = 5;

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(SESSION_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Per-request presentation order. Nothing here is persisted, so two calls
/// may order questions and options differently.
pub fn shuffle_for_display<R: Rng + ?Sized>(
    mut questions: Vec<QuestionView>,
    settings: &SessionSettings,
    rng: &mut R,
) -> Vec<QuestionView> {
    if settings.shuffle_questions {
        questions.shuffle(rng);
    }
    if settings.shuffle_answer_options {
        for question in &mut questions {
            question.options.shuffle(rng);
        }
    }
    questions
}

pub struct SessionService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn SessionNotifier>,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn SessionNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn create(&self, owner_id: &str, req: CreateSessionRequest) -> AppResult<Session> {
        let Some(first_set_id) = req.question_sets.first() else {
            return Err(AppError::forbidden("no-question-sets-included"));
        };

        let name = self
            .store
            .find_question_set(first_set_id)
            .await?
            .map(|set| set.name)
            .unwrap_or_else(|| "Untitled".to_string());
        let questions = self
            .store
            .questions_in_sets(&req.question_sets, owner_id)
            .await?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            name,
            code: self.unused_code().await?,
            owner_id: owner_id.to_string(),
            questions: questions.into_iter().map(|q| q.id).collect(),
            ended: false,
            settings: SessionSettings::default(),
            invite_only: false,
            students: Vec::new(),
            done_students: Vec::new(),
            submissions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_session(&session).await?;

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(
            "Session {} created: code={}, questions={}",
            session.id,
            session.code,
            session.questions.len()
        );
        Ok(session)
    }

    async fn unused_code(&self) -> AppResult<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code(&mut rand::rng());
            if self.store.find_session_by_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::conflict("session-code-unavailable"))
    }

    pub async fn list(&self, owner_id: &str) -> AppResult<Vec<Session>> {
        Ok(self.store.list_sessions_by_owner(owner_id).await?)
    }

    pub async fn by_code(&self, code: &str) -> AppResult<Session> {
        self.store
            .find_session_by_code(code)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))
    }

    async fn owned(&self, owner_id: &str, session_id: &str) -> AppResult<Session> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))?;
        if session.owner_id != owner_id {
            return Err(AppError::forbidden("not-session-owner"));
        }
        Ok(session)
    }

    async fn patch_owned(
        &self,
        owner_id: &str,
        session_id: &str,
        patch: SessionPatch,
    ) -> AppResult<Session> {
        self.owned(owner_id, session_id).await?;
        self.store
            .patch_session(session_id, patch)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))
    }

    pub async fn update_settings(
        &self,
        owner_id: &str,
        session_id: &str,
        settings: SessionSettings,
    ) -> AppResult<SessionSettings> {
        settings.validate()?;
        if let (Some(starts_at), Some(ends_at)) = (settings.starts_at, settings.ends_at) {
            if ends_at <= starts_at {
                return Err(AppError::validation("endsAt must be after startsAt"));
            }
        }

        let session = self
            .patch_owned(
                owner_id,
                session_id,
                SessionPatch {
                    settings: Some(settings),
                    ..SessionPatch::default()
                },
            )
            .await?;

        self.notifier
            .notify(SessionEvent::session_update(&session.code));
        Ok(session.settings)
    }

    pub async fn edit(
        &self,
        owner_id: &str,
        session_id: &str,
        req: EditSessionRequest,
    ) -> AppResult<Session> {
        if let Some(ids) = &req.questions {
            let found = self.store.find_questions(ids).await?;
            if let Some(missing) = ids.iter().find(|id| !found.iter().any(|q| &q.id == *id)) {
                return Err(AppError::not_found(format!("question-not-found: {}", missing)));
            }
        }

        self.patch_owned(
            owner_id,
            session_id,
            SessionPatch {
                name: req.name,
                questions: req.questions,
                ..SessionPatch::default()
            },
        )
        .await
    }

    /// Ends or reactivates a session.
    pub async fn set_ended(&self, owner_id: &str, session_id: &str, ended: bool) -> AppResult<Session> {
        let session = self
            .patch_owned(
                owner_id,
                session_id,
                SessionPatch {
                    ended: Some(ended),
                    ..SessionPatch::default()
                },
            )
            .await?;

        let event = if ended { "ended" } else { "reactivated" };
        SESSIONS_TOTAL.with_label_values(&[event]).inc();
        tracing::info!("Session {} {}", session.id, event);

        self.notifier
            .notify(SessionEvent::session_update(&session.code));
        Ok(session)
    }

    pub async fn delete(&self, owner_id: &str, session_id: &str) -> AppResult<Session> {
        self.owned(owner_id, session_id).await?;
        let session = self
            .store
            .delete_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))?;

        SESSIONS_TOTAL.with_label_values(&["deleted"]).inc();
        tracing::info!("Session {} deleted", session.id);

        self.notifier
            .notify(SessionEvent::session_update(&session.code));
        Ok(session)
    }

    /// Adds students to the roster and restricts the session to it.
    pub async fn invite(
        &self,
        owner_id: &str,
        session_id: &str,
        student_ids: &[String],
    ) -> AppResult<Session> {
        self.owned(owner_id, session_id).await?;
        self.store.add_students(session_id, student_ids, true).await?;
        tracing::info!("{} students invited to session {}", student_ids.len(), session_id);
        self.store
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found"))
    }

    pub async fn join(&self, code: &str, student_id: &str) -> AppResult<ParticipantResponse> {
        let session = self
            .store
            .find_session_by_code(code)
            .await?
            .filter(|s| !s.ended)
            .ok_or_else(|| AppError::not_found("session-not-found-or-ended"))?;

        if !session.has_student(student_id) {
            if session.invite_only && !session.settings.allow_guest_students {
                return Err(AppError::forbidden("student-not-invited"));
            }
            self.store
                .add_students(&session.id, &[student_id.to_string()], false)
                .await?;
            tracing::info!("Student {} joined session {}", student_id, session.code);
        }

        self.notifier.notify(SessionEvent::test_update(code));
        Ok(ParticipantResponse {
            student_id: student_id.to_string(),
            session: (&session).into(),
        })
    }

    pub async fn join_status(&self, code: &str, student_id: &str) -> AppResult<ParticipantResponse> {
        let session = self.by_code(code).await?;
        if !session.has_student(student_id) {
            return Err(AppError::forbidden("student-not-joined"));
        }
        Ok(ParticipantResponse {
            student_id: student_id.to_string(),
            session: (&session).into(),
        })
    }

    pub async fn active_for_student(&self, student_id: &str) -> AppResult<Vec<Session>> {
        Ok(self.store.list_active_sessions_for_student(student_id).await?)
    }

    pub async fn mark_done(&self, session_id: &str, student_id: &str) -> AppResult<()> {
        if !self.store.add_done_student(session_id, student_id).await? {
            return Err(AppError::not_found("session-not-found"));
        }
        tracing::info!("Student {} finished session {}", student_id, session_id);
        Ok(())
    }

    /// Teacher verdict for a free-text submission.
    pub async fn review(
        &self,
        owner_id: &str,
        submission_id: &str,
        req: ReviewSubmissionRequest,
    ) -> AppResult<()> {
        let session = self.owned(owner_id, &req.session_id).await?;
        let question = self
            .store
            .find_question(&req.question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question-not-found"))?;

        if !matches!(question.body, QuestionBody::FreeText { .. }) {
            return Err(AppError::forbidden("not-free-text-question"));
        }

        let (status, score) = match req.status {
            ReviewStatus::Correct => (SubmissionStatus::Correct, Score::points(question.score)),
            ReviewStatus::Wrong => (SubmissionStatus::Wrong, Score::zero()),
        };
        if !self
            .store
            .set_submission_verdict(&session.id, submission_id, status, &score)
            .await?
        {
            return Err(AppError::not_found("submission-not-found"));
        }

        tracing::info!(
            "Submission {} reviewed as {} ({})",
            submission_id,
            status.as_str(),
            score
        );
        self.notifier
            .notify(SessionEvent::session_update(&session.code));
        Ok(())
    }

    /// Question list for a viewer: the primary questions with the viewer's
    /// submissions, or only the due complementary questions in activation mode.
    /// The session owner sees every submission.
    pub async fn questions(
        &self,
        code: &str,
        viewer_id: &str,
        activation: bool,
        now: DateTime<Utc>,
    ) -> AppResult<SessionQuestionsResponse> {
        let session = self
            .store
            .find_session_by_code(code)
            .await?
            .ok_or_else(|| AppError::not_found("session-not-found-or-ended"))?;

        let (views, submissions) = if activation {
            let due = ActivationService::new(self.store.clone())
                .due_questions(viewer_id, &session.id, now)
                .await?;
            (due, Vec::new())
        } else {
            let questions = self.store.find_questions(&session.questions).await?;
            let questions: Vec<Question> =
                order_by_ids(&session.questions, questions, |q| q.id.as_str());
            let views = questions.iter().map(QuestionView::primary).collect();

            let submissions = if session.owner_id == viewer_id {
                session.submissions.clone()
            } else {
                session
                    .submissions
                    .iter()
                    .filter(|s| s.student_id == viewer_id)
                    .cloned()
                    .collect()
            };
            (views, submissions)
        };

        let questions = shuffle_for_display(views, &session.settings, &mut rand::rng());

        Ok(SessionQuestionsResponse {
            questions,
            settings: session.settings.clone(),
            submissions,
            session: (&session).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn view(id: &str, options: &[&str]) -> QuestionView {
        QuestionView {
            id: id.to_string(),
            kind: QuestionKind::Mcq,
            question: None,
            details: None,
            options: options.iter().map(|o| o.to_string()).collect(),
            answer_slots: 1,
            score: 1.0,
            duration: 10,
            has_complementary_question: false,
        }
    }

    fn many_views() -> Vec<QuestionView> {
        (0..20)
            .map(|i| view(&format!("q{}", i), &["a", "b", "c", "d", "e", "f"]))
            .collect()
    }

    #[test]
    fn generated_codes_are_six_alphanumerics() {
        let code = generate_code(&mut rand::rng());
        assert_eq!(code.len(), SESSION_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn no_shuffle_keeps_order() {
        let settings = SessionSettings {
            shuffle_questions: false,
            shuffle_answer_options: false,
            ..SessionSettings::default()
        };
        let shuffled = shuffle_for_display(many_views(), &settings, &mut StdRng::seed_from_u64(7));
        assert_eq!(shuffled[0].id, "q0");
        assert_eq!(shuffled[19].id, "q19");
        assert_eq!(shuffled[0].options[0], "a");
    }

    #[test]
    fn shuffle_permutes_questions_and_options() {
        let settings = SessionSettings {
            shuffle_questions: true,
            shuffle_answer_options: true,
            ..SessionSettings::default()
        };
        let shuffled = shuffle_for_display(many_views(), &settings, &mut StdRng::seed_from_u64(7));

        let mut ids: Vec<String> = shuffled.iter().map(|q| q.id.clone()).collect();
        let original: Vec<String> = (0..20).map(|i| format!("q{}", i)).collect();
        assert_ne!(ids, original);
        ids.sort();
        let mut sorted = original.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        for question in &shuffled {
            let mut options = question.options.clone();
            options.sort();
            assert_eq!(options, vec!["a", "b", "c", "d", "e", "f"]);
        }
    }
}
