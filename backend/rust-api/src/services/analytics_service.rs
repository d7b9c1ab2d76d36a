use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;
use crate::models::analytics::{AnswerOutcome, SessionEvaluation};
use crate::models::DailyAnalytics;
use crate::services::store::Store;
use crate::utils::time::{weeks_in_month, CalendarDay};

#[derive(Debug, Serialize)]
pub struct MonthlyTimeReport {
    pub labels: Vec<String>,
    /// Whole minutes per week.
    pub data: Vec<i64>,
}

pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Today's bucket for the user, created on first activity.
    async fn bucket(&self, user_id: &str, day: CalendarDay) -> AppResult<DailyAnalytics> {
        if let Some(existing) = self.store.find_analytics(user_id, day).await? {
            return Ok(existing);
        }
        let bucket = DailyAnalytics::new(user_id, day);
        self.store.insert_analytics(&bucket).await?;
        tracing::debug!("Analytics bucket created for user {}", user_id);
        Ok(bucket)
    }

    pub async fn record_answer(
        &self,
        user_id: &str,
        question_id: &str,
        outcome: AnswerOutcome,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let bucket = self.bucket(user_id, CalendarDay::of(at)).await?;
        self.store
            .add_analytics_question(&bucket.id, outcome, question_id)
            .await?;
        Ok(())
    }

    pub async fn add_screen_time(&self, user_id: &str, millis: i64) -> AppResult<DailyAnalytics> {
        let bucket = self.bucket(user_id, CalendarDay::today()).await?;
        let updated = self.store.add_screen_time(&bucket.id, millis).await?;
        Ok(updated.unwrap_or(DailyAnalytics {
            time_spent: bucket.time_spent + millis,
            ..bucket
        }))
    }

    /// Weekdays (0 = Sunday) with recorded activity in the current week.
    pub async fn days_studied_this_week(&self, user_id: &str) -> AppResult<Vec<u32>> {
        let today = CalendarDay::today();
        let buckets = self
            .store
            .list_analytics_week(user_id, today.year, today.month, today.week)
            .await?;
        Ok(buckets.into_iter().map(|b| b.day).collect())
    }

    /// Graded answers per joined session, newest first. With `owner_id` set only
    /// that teacher's sessions are reported.
    pub async fn student_evaluation(
        &self,
        student_id: &str,
        owner_id: Option<&str>,
    ) -> AppResult<Vec<SessionEvaluation>> {
        let sessions = self.store.list_sessions_for_student(student_id).await?;
        Ok(sessions
            .iter()
            .filter(|s| owner_id.map_or(true, |owner| s.owner_id == owner))
            .filter_map(|s| SessionEvaluation::of(s, student_id))
            .collect())
    }

    /// Minutes spent per week of the current month.
    pub async fn monthly_time_spent(&self, user_id: &str) -> AppResult<MonthlyTimeReport> {
        let now = Utc::now();
        let today = CalendarDay::of(now);
        let mut report = MonthlyTimeReport {
            labels: Vec::new(),
            data: Vec::new(),
        };

        for week in 1..=weeks_in_month(now) {
            let buckets = self
                .store
                .list_analytics_week(user_id, today.year, today.month, week)
                .await?;
            let millis: i64 = buckets.iter().map(|b| b.time_spent).sum();

            report.labels.push(if week == today.week {
                "This Week".to_string()
            } else {
                format!("Week {}", week)
            });
            report.data.push(millis / 60_000);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;

    fn service() -> AnalyticsService {
        AnalyticsService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn answers_land_in_one_bucket_per_day() {
        let analytics = service();
        let now = Utc::now();
        analytics
            .record_answer("s1", "q1", AnswerOutcome::Right, now)
            .await
            .unwrap();
        analytics
            .record_answer("s1", "q2", AnswerOutcome::Wrong, now)
            .await
            .unwrap();
        analytics
            .record_answer("s1", "q1", AnswerOutcome::Right, now)
            .await
            .unwrap();

        let bucket = analytics
            .store
            .find_analytics("s1", CalendarDay::of(now))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bucket.right_questions, vec!["q1".to_string()]);
        assert_eq!(bucket.wrong_questions, vec!["q2".to_string()]);
    }

    #[tokio::test]
    async fn screen_time_accumulates() {
        let analytics = service();
        analytics.add_screen_time("s1", 60_000).await.unwrap();
        let bucket = analytics.add_screen_time("s1", 30_000).await.unwrap();
        assert_eq!(bucket.time_spent, 90_000);

        let days = analytics.days_studied_this_week("s1").await.unwrap();
        assert_eq!(days, vec![CalendarDay::today().weekday]);

        let report = analytics.monthly_time_spent("s1").await.unwrap();
        assert_eq!(report.data.iter().sum::<i64>(), 1);
        assert!(report.labels.contains(&"This Week".to_string()));
    }
}
