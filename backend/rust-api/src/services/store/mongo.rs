use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};

use super::{SessionPatch, Store};
use crate::metrics::track_db_operation;
use crate::models::{
    analytics::AnswerOutcome, ActivationRecord, ActivationSession, AnswerAnalysis,
    DailyAnalytics, Question, QuestionSet, Score, Session, Submission, SubmissionStatus,
};
use crate::utils::time::CalendarDay;

const QUESTION_SETS: &str = "question_sets";
const QUESTIONS: &str = "questions";
const SESSIONS: &str = "sessions";
const ACTIVATION_RECORDS: &str = "activation_records";
const ACTIVATION_SESSIONS: &str = "activation_sessions";
const ANALYTICS: &str = "analytics";
const ANSWER_ANALYSES: &str = "answer_analyses";

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn question_sets(&self) -> Collection<QuestionSet> {
        self.db.collection(QUESTION_SETS)
    }

    fn questions(&self) -> Collection<Question> {
        self.db.collection(QUESTIONS)
    }

    fn sessions(&self) -> Collection<Session> {
        self.db.collection(SESSIONS)
    }

    fn activation_records(&self) -> Collection<ActivationRecord> {
        self.db.collection(ACTIVATION_RECORDS)
    }

    fn activation_sessions(&self) -> Collection<ActivationSession> {
        self.db.collection(ACTIVATION_SESSIONS)
    }

    fn analytics(&self) -> Collection<DailyAnalytics> {
        self.db.collection(ANALYTICS)
    }

    fn answer_analyses(&self) -> Collection<AnswerAnalysis> {
        self.db.collection(ANSWER_ANALYSES)
    }

    async fn find_all<T>(
        &self,
        collection: Collection<T>,
        filter: Document,
        sort: Document,
    ) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        let cursor = collection
            .find(filter)
            .sort(sort)
            .await
            .context("Failed to open cursor")?;
        cursor
            .try_collect()
            .await
            .context("Failed to read cursor")
    }
}

fn now_bson() -> Result<mongodb::bson::Bson> {
    to_bson(&Utc::now()).context("Failed to encode timestamp")
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }

    async fn insert_question_set(&self, set: &QuestionSet) -> Result<()> {
        track_db_operation("insert_one", QUESTION_SETS, async {
            self.question_sets()
                .insert_one(set)
                .await
                .context("Failed to insert question set")?;
            Ok(())
        })
        .await
    }

    async fn find_question_set(&self, id: &str) -> Result<Option<QuestionSet>> {
        track_db_operation("find_one", QUESTION_SETS, async {
            self.question_sets()
                .find_one(doc! { "_id": id })
                .await
                .context("Failed to query question set")
        })
        .await
    }

    async fn list_question_sets(&self, owner_id: &str) -> Result<Vec<QuestionSet>> {
        track_db_operation(
            "find",
            QUESTION_SETS,
            self.find_all(
                self.question_sets(),
                doc! { "ownerId": owner_id },
                doc! { "createdAt": -1 },
            ),
        )
        .await
    }

    async fn rename_question_set(&self, id: &str, name: &str) -> Result<Option<QuestionSet>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        track_db_operation("find_one_and_update", QUESTION_SETS, async {
            self.question_sets()
                .find_one_and_update(doc! { "_id": id }, doc! { "$set": { "name": name } })
                .with_options(options)
                .await
                .context("Failed to rename question set")
        })
        .await
    }

    async fn delete_question_set(&self, id: &str) -> Result<bool> {
        let deleted = track_db_operation("delete_one", QUESTION_SETS, async {
            self.question_sets()
                .delete_one(doc! { "_id": id })
                .await
                .context("Failed to delete question set")
        })
        .await?;
        if deleted.deleted_count == 0 {
            return Ok(false);
        }

        track_db_operation("delete_many", QUESTIONS, async {
            self.questions()
                .delete_many(doc! { "questionSetId": id })
                .await
                .context("Failed to delete questions of set")?;
            Ok(true)
        })
        .await
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        track_db_operation("insert_one", QUESTIONS, async {
            self.questions()
                .insert_one(question)
                .await
                .context("Failed to insert question")?;
            Ok(())
        })
        .await
    }

    async fn insert_questions(&self, questions: &[Question]) -> Result<()> {
        if questions.is_empty() {
            return Ok(());
        }
        track_db_operation("insert_many", QUESTIONS, async {
            self.questions()
                .insert_many(questions)
                .await
                .context("Failed to insert questions")?;
            Ok(())
        })
        .await
    }

    async fn replace_question(&self, question: &Question) -> Result<bool> {
        track_db_operation("replace_one", QUESTIONS, async {
            let result = self
                .questions()
                .replace_one(doc! { "_id": &question.id }, question)
                .await
                .context("Failed to replace question")?;
            Ok(result.matched_count > 0)
        })
        .await
    }

    async fn delete_question(&self, id: &str) -> Result<Option<Question>> {
        track_db_operation("find_one_and_delete", QUESTIONS, async {
            self.questions()
                .find_one_and_delete(doc! { "_id": id })
                .await
                .context("Failed to delete question")
        })
        .await
    }

    async fn find_question(&self, id: &str) -> Result<Option<Question>> {
        track_db_operation("find_one", QUESTIONS, async {
            self.questions()
                .find_one(doc! { "_id": id })
                .await
                .context("Failed to query question")
        })
        .await
    }

    async fn find_questions(&self, ids: &[String]) -> Result<Vec<Question>> {
        track_db_operation(
            "find",
            QUESTIONS,
            self.find_all(self.questions(), doc! { "_id": { "$in": ids.to_vec() } }, doc! {}),
        )
        .await
    }

    async fn questions_in_sets(&self, set_ids: &[String], owner_id: &str) -> Result<Vec<Question>> {
        track_db_operation(
            "find",
            QUESTIONS,
            self.find_all(
                self.questions(),
                doc! { "questionSetId": { "$in": set_ids.to_vec() }, "ownerId": owner_id },
                doc! { "createdAt": 1 },
            ),
        )
        .await
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        track_db_operation("insert_one", SESSIONS, async {
            self.sessions()
                .insert_one(session)
                .await
                .context("Failed to insert session")?;
            Ok(())
        })
        .await
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>> {
        track_db_operation("find_one", SESSIONS, async {
            self.sessions()
                .find_one(doc! { "_id": id })
                .await
                .context("Failed to query session")
        })
        .await
    }

    async fn find_session_by_code(&self, code: &str) -> Result<Option<Session>> {
        track_db_operation("find_one", SESSIONS, async {
            self.sessions()
                .find_one(doc! { "code": code })
                .await
                .context("Failed to query session by code")
        })
        .await
    }

    async fn list_sessions_by_owner(&self, owner_id: &str) -> Result<Vec<Session>> {
        track_db_operation(
            "find",
            SESSIONS,
            self.find_all(
                self.sessions(),
                doc! { "ownerId": owner_id },
                doc! { "createdAt": -1 },
            ),
        )
        .await
    }

    async fn list_active_sessions_for_student(&self, student_id: &str) -> Result<Vec<Session>> {
        track_db_operation(
            "find",
            SESSIONS,
            self.find_all(
                self.sessions(),
                doc! { "students": student_id, "ended": false },
                doc! { "createdAt": -1 },
            ),
        )
        .await
    }

    async fn list_sessions_for_student(&self, student_id: &str) -> Result<Vec<Session>> {
        track_db_operation(
            "find",
            SESSIONS,
            self.find_all(
                self.sessions(),
                doc! { "students": student_id },
                doc! { "createdAt": -1 },
            ),
        )
        .await
    }

    async fn patch_session(&self, id: &str, patch: SessionPatch) -> Result<Option<Session>> {
        let mut set = doc! { "updatedAt": now_bson()? };
        if let Some(name) = patch.name {
            set.insert("name", name);
        }
        if let Some(questions) = patch.questions {
            set.insert("questions", questions);
        }
        if let Some(settings) = patch.settings {
            set.insert(
                "settings",
                to_bson(&settings).context("Failed to encode session settings")?,
            );
        }
        if let Some(ended) = patch.ended {
            set.insert("ended", ended);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        track_db_operation("find_one_and_update", SESSIONS, async {
            self.sessions()
                .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
                .with_options(options)
                .await
                .context("Failed to update session")
        })
        .await
    }

    async fn delete_session(&self, id: &str) -> Result<Option<Session>> {
        track_db_operation("find_one_and_delete", SESSIONS, async {
            self.sessions()
                .find_one_and_delete(doc! { "_id": id })
                .await
                .context("Failed to delete session")
        })
        .await
    }

    async fn add_students(&self, session_id: &str, student_ids: &[String], invite_only: bool) -> Result<()> {
        let mut update = doc! {
            "$addToSet": { "students": { "$each": student_ids.to_vec() } },
            "$set": { "updatedAt": now_bson()? },
        };
        if invite_only {
            update.get_document_mut("$set")?.insert("inviteOnly", true);
        }

        track_db_operation("update_one", SESSIONS, async {
            self.sessions()
                .update_one(doc! { "_id": session_id }, update)
                .await
                .context("Failed to add students")?;
            Ok(())
        })
        .await
    }

    async fn add_done_student(&self, session_id: &str, student_id: &str) -> Result<bool> {
        track_db_operation("update_one", SESSIONS, async {
            let result = self
                .sessions()
                .update_one(
                    doc! { "_id": session_id },
                    doc! { "$addToSet": { "doneStudents": student_id } },
                )
                .await
                .context("Failed to mark student done")?;
            Ok(result.matched_count > 0)
        })
        .await
    }

    async fn append_submission(&self, session_id: &str, submission: &Submission) -> Result<bool> {
        let encoded = to_bson(submission).context("Failed to encode submission")?;
        // The filter only matches while no submission exists for the pair,
        // so two racing pushes cannot both land.
        let filter = doc! {
            "_id": session_id,
            "submissions": {
                "$not": {
                    "$elemMatch": {
                        "studentId": &submission.student_id,
                        "questionId": &submission.question_id,
                    }
                }
            },
        };
        let update = doc! {
            "$push": { "submissions": encoded },
            "$set": { "updatedAt": now_bson()? },
        };

        track_db_operation("update_one", SESSIONS, async {
            let result = self
                .sessions()
                .update_one(filter, update)
                .await
                .context("Failed to append submission")?;
            Ok(result.matched_count > 0)
        })
        .await
    }

    async fn set_submission_verdict(
        &self,
        session_id: &str,
        submission_id: &str,
        status: SubmissionStatus,
        score: &Score,
    ) -> Result<bool> {
        track_db_operation("update_one", SESSIONS, async {
            let result = self
                .sessions()
                .update_one(
                    doc! { "_id": session_id, "submissions._id": submission_id },
                    doc! { "$set": {
                        "submissions.$.status": status.as_str(),
                        "submissions.$.score": score.as_str(),
                    } },
                )
                .await
                .context("Failed to review submission")?;
            Ok(result.matched_count > 0)
        })
        .await
    }

    async fn find_activation_record(
        &self,
        question_id: &str,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<ActivationRecord>> {
        track_db_operation("find_one", ACTIVATION_RECORDS, async {
            self.activation_records()
                .find_one(doc! {
                    "questionId": question_id,
                    "studentId": student_id,
                    "sessionId": session_id,
                })
                .await
                .context("Failed to query activation record")
        })
        .await
    }

    async fn insert_activation_record(&self, record: &ActivationRecord) -> Result<()> {
        track_db_operation("insert_one", ACTIVATION_RECORDS, async {
            self.activation_records()
                .insert_one(record)
                .await
                .context("Failed to insert activation record")?;
            Ok(())
        })
        .await
    }

    async fn save_activation_record(&self, record: &ActivationRecord) -> Result<()> {
        track_db_operation("replace_one", ACTIVATION_RECORDS, async {
            self.activation_records()
                .replace_one(doc! { "_id": &record.id }, record)
                .upsert(true)
                .await
                .context("Failed to save activation record")?;
            Ok(())
        })
        .await
    }

    async fn attach_activation_record(
        &self,
        student_id: &str,
        session_id: &str,
        record_id: &str,
    ) -> Result<()> {
        let update = doc! {
            "$addToSet": { "records": record_id },
            "$setOnInsert": {
                "_id": uuid::Uuid::new_v4().to_string(),
                "createdAt": now_bson()?,
            },
        };

        track_db_operation("update_one", ACTIVATION_SESSIONS, async {
            self.activation_sessions()
                .update_one(
                    doc! { "studentId": student_id, "sessionId": session_id },
                    update,
                )
                .upsert(true)
                .await
                .context("Failed to attach activation record")?;
            Ok(())
        })
        .await
    }

    async fn find_activation_session(
        &self,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<ActivationSession>> {
        track_db_operation("find_one", ACTIVATION_SESSIONS, async {
            self.activation_sessions()
                .find_one(doc! { "studentId": student_id, "sessionId": session_id })
                .await
                .context("Failed to query activation session")
        })
        .await
    }

    async fn list_activation_sessions(&self, student_id: &str) -> Result<Vec<ActivationSession>> {
        track_db_operation(
            "find",
            ACTIVATION_SESSIONS,
            self.find_all(
                self.activation_sessions(),
                doc! { "studentId": student_id },
                doc! { "createdAt": -1 },
            ),
        )
        .await
    }

    async fn find_activation_records(&self, ids: &[String]) -> Result<Vec<ActivationRecord>> {
        track_db_operation(
            "find",
            ACTIVATION_RECORDS,
            self.find_all(
                self.activation_records(),
                doc! { "_id": { "$in": ids.to_vec() } },
                doc! {},
            ),
        )
        .await
    }

    async fn find_analytics(&self, user_id: &str, day: CalendarDay) -> Result<Option<DailyAnalytics>> {
        track_db_operation("find_one", ANALYTICS, async {
            self.analytics()
                .find_one(doc! {
                    "userId": user_id,
                    "year": day.year,
                    "month": day.month as i64,
                    "week": day.week as i64,
                    "day": day.weekday as i64,
                })
                .await
                .context("Failed to query analytics")
        })
        .await
    }

    async fn insert_analytics(&self, analytics: &DailyAnalytics) -> Result<()> {
        track_db_operation("insert_one", ANALYTICS, async {
            self.analytics()
                .insert_one(analytics)
                .await
                .context("Failed to insert analytics")?;
            Ok(())
        })
        .await
    }

    async fn add_analytics_question(
        &self,
        analytics_id: &str,
        outcome: AnswerOutcome,
        question_id: &str,
    ) -> Result<()> {
        let mut add = Document::new();
        add.insert(outcome.field(), question_id);

        track_db_operation("update_one", ANALYTICS, async {
            self.analytics()
                .update_one(doc! { "_id": analytics_id }, doc! { "$addToSet": add })
                .await
                .context("Failed to record answered question")?;
            Ok(())
        })
        .await
    }

    async fn add_screen_time(&self, analytics_id: &str, millis: i64) -> Result<Option<DailyAnalytics>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        track_db_operation("find_one_and_update", ANALYTICS, async {
            self.analytics()
                .find_one_and_update(
                    doc! { "_id": analytics_id },
                    doc! { "$inc": { "timeSpent": millis } },
                )
                .with_options(options)
                .await
                .context("Failed to add screen time")
        })
        .await
    }

    async fn list_analytics_week(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        week: u32,
    ) -> Result<Vec<DailyAnalytics>> {
        track_db_operation(
            "find",
            ANALYTICS,
            self.find_all(
                self.analytics(),
                doc! {
                    "userId": user_id,
                    "year": year,
                    "month": month as i64,
                    "week": week as i64,
                },
                doc! { "day": 1 },
            ),
        )
        .await
    }

    async fn upsert_answer_analysis(&self, analysis: &AnswerAnalysis) -> Result<AnswerAnalysis> {
        let mut set = mongodb::bson::to_document(analysis).context("Failed to encode analysis")?;
        let id = set.remove("_id");
        let mut update = doc! { "$set": set };
        if let Some(id) = id {
            update.insert("$setOnInsert", doc! { "_id": id });
        }
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        track_db_operation("find_one_and_update", ANSWER_ANALYSES, async {
            self.answer_analyses()
                .find_one_and_update(
                    doc! {
                        "sessionId": &analysis.session_id,
                        "questionId": &analysis.question_id,
                        "studentId": &analysis.student_id,
                    },
                    update,
                )
                .with_options(options)
                .await
                .context("Failed to upsert answer analysis")?
                .context("Upserted answer analysis was not returned")
        })
        .await
    }

    async fn find_answer_analysis(
        &self,
        session_id: &str,
        question_id: &str,
        student_id: &str,
    ) -> Result<Option<AnswerAnalysis>> {
        track_db_operation("find_one", ANSWER_ANALYSES, async {
            self.answer_analyses()
                .find_one(doc! {
                    "sessionId": session_id,
                    "questionId": question_id,
                    "studentId": student_id,
                })
                .await
                .context("Failed to query answer analysis")
        })
        .await
    }
}
