use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invalidation hint for clients watching a session. Carries no authoritative
/// state; consumers refetch on receipt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Teacher-side change: settings, end/reactivate, delete, review.
    #[serde(rename = "SESSION_UPDATE")]
    SessionUpdate(SessionRef),
    /// Student-side change: join, submission.
    #[serde(rename = "TEST_UPDATE")]
    TestUpdate(SessionRef),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionRef {
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn session_update(code: &str) -> Self {
        SessionEvent::SessionUpdate(SessionRef {
            code: code.to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn test_update(code: &str) -> Self {
        SessionEvent::TestUpdate(SessionRef {
            code: code.to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn code(&self) -> &str {
        match self {
            SessionEvent::SessionUpdate(r) | SessionEvent::TestUpdate(r) => &r.code,
        }
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::SessionUpdate(_) => "SESSION_UPDATE",
            SessionEvent::TestUpdate(_) => "TEST_UPDATE",
        }
    }
}
