use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::services::evaluation_service::{LanguageModel, OpenAiClient};
use crate::services::notifier::{BroadcastNotifier, FanoutNotifier, RedisNotifier, SessionNotifier};
use crate::services::store::{MongoStore, Store};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    /// Everything session events are published to.
    pub notifier: Arc<dyn SessionNotifier>,
    /// The in-process leg of `notifier`, subscribed to by SSE clients.
    pub events: Arc<BroadcastNotifier>,
    pub model: Arc<dyn LanguageModel>,
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    /// Production wiring: MongoDB store, OpenAI model, and Redis fan-out when configured.
    pub async fn new(config: Config, mongo_client: mongodb::Client) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> =
            Arc::new(MongoStore::new(mongo_client.database(&config.mongo_database)));
        Self::with_store(config, store).await
    }

    /// Same as [`AppState::new`] over an arbitrary store.
    pub async fn with_store(config: Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let redis = match &config.redis_uri {
            Some(uri) => Some(connect_redis(uri).await?),
            None => {
                tracing::warn!("REDIS_URI not set; session events stay in-process");
                None
            }
        };

        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&config));
        if config.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; answer evaluation is unavailable");
        }

        let events = Arc::new(BroadcastNotifier::default());
        let notifier: Arc<dyn SessionNotifier> = match &redis {
            Some(conn) => Arc::new(FanoutNotifier::new(vec![
                events.clone() as Arc<dyn SessionNotifier>,
                Arc::new(RedisNotifier::new(conn.clone())),
            ])),
            None => events.clone(),
        };

        Ok(Self {
            config,
            store,
            notifier,
            events,
            model,
            redis,
        })
    }

    /// Assembles state from ready-made parts; used by tests.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        events: Arc<BroadcastNotifier>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            config,
            store,
            notifier: events.clone(),
            events,
            model,
            redis: None,
        }
    }
}

async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");
    let client = redis::Client::open(uri)?;

    let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod activation_service;
pub mod analytics_service;
pub mod evaluation_service;
pub mod grading;
pub mod notifier;
pub mod question_service;
pub mod session_service;
pub mod store;
pub mod submission_service;
