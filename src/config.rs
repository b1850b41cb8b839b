// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use url::Url;

/// Length of the trailing lookback used by both the idempotency guard and the bank rotation.
pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 30;

/// Per-slot bound on a single generator call.
pub const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 20;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Settings for the optional external challenge generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub recent_window_days: i64,
    /// `None` when no API key is configured; every slot then uses the bank.
    pub generator: Option<GeneratorConfig>,
    pub challenge_bank_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://127.0.0.1:5173".to_string(),
                ]
            });

        let recent_window_days =
            parse_or("RECENT_WINDOW_DAYS", DEFAULT_RECENT_WINDOW_DAYS).max(1);

        let generator = generator_from_env();

        let challenge_bank_path = env::var("CHALLENGE_BANK_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            allowed_origins,
            recent_window_days,
            generator,
            challenge_bank_path,
        }
    }
}

fn generator_from_env() -> Option<GeneratorConfig> {
    let api_key = env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())?;

    let base_url = env::var("OPENAI_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
    let base_url = match Url::parse(&base_url) {
        Ok(_) => base_url.trim_end_matches('/').to_string(),
        Err(e) => {
            tracing::warn!(
                "OPENAI_BASE_URL '{}' is not a valid URL ({}), using {}",
                base_url,
                e,
                DEFAULT_OPENAI_BASE_URL
            );
            DEFAULT_OPENAI_BASE_URL.to_string()
        }
    };

    let model = env::var("OPENAI_MODEL")
        .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());

    let timeout_secs = parse_or("GENERATOR_TIMEOUT_SECS", DEFAULT_GENERATOR_TIMEOUT_SECS);

    Some(GeneratorConfig {
        api_key,
        base_url,
        model,
        timeout_secs,
    })
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins = parse_origins(" http://a.test , ,http://b.test");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }
}
