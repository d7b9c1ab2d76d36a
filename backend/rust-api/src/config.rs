use serde::Deserialize;
use std::env;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    /// Without Redis, session events only reach this process's SSE clients.
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub bind_addr: String,
    /// `user:password` guarding `/metrics`.
    pub metrics_auth: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one.
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, var: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(var).ok())
                .filter(|v| !v.trim().is_empty())
        };

        let mongo_uri = lookup("database.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let mongo_database = lookup("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|| "classroom".to_string());

        let redis_uri = lookup("redis.uri", "REDIS_URI");

        let jwt_secret = match lookup("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let openai_api_key = lookup("openai.api_key", "OPENAI_API_KEY");
        let openai_model = lookup("openai.model", "OPENAI_MODEL")
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let openai_base_url = lookup("openai.base_url", "OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let bind_addr =
            lookup("server.bind_addr", "BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let metrics_auth = lookup("metrics.auth", "METRICS_AUTH");

        Ok(Config {
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            openai_api_key,
            openai_model,
            openai_base_url,
            bind_addr,
            metrics_auth,
        })
    }

    /// Settings for tests and in-memory runs.
    pub fn for_tests() -> Self {
        Config {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "classroom_test".to_string(),
            redis_uri: None,
            jwt_secret: "test-secret".to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            metrics_auth: None,
        }
    }
}
