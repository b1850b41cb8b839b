// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use challenges_backend::config::Config;
use challenges_backend::daily::bank::ChallengeBank;
use challenges_backend::daily::generator::{ChallengeGenerator, OpenAiGenerator};
use challenges_backend::daily::store::PgHistoryStore;
use challenges_backend::daily::{DailyChallengeService, DailySettings};
use challenges_backend::routes;
use challenges_backend::state::AppState;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let bank = ChallengeBank::load(config.challenge_bank_path.as_deref())
        .unwrap_or_else(|e| panic!("Invalid challenge bank: {}", e));
    tracing::info!("Challenge bank loaded with {} sets", bank.len());

    let generator: Option<Arc<dyn ChallengeGenerator>> = config
        .generator
        .as_ref()
        .and_then(OpenAiGenerator::from_config)
        .map(|g| Arc::new(g) as Arc<dyn ChallengeGenerator>);
    match &config.generator {
        Some(g) if generator.is_some() => tracing::info!("Challenge generator enabled (model {})", g.model),
        _ => tracing::warn!("No challenge generator configured, every slot uses the bank"),
    }

    let daily = DailyChallengeService::new(
        Arc::new(PgHistoryStore::new(pool.clone())),
        generator,
        Arc::new(bank),
        DailySettings::from_config(&config),
    );

    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        daily: Arc::new(daily),
    };

    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));

    axum::serve(listener, app).await.expect("Server error");
}
