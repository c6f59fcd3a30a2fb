use std::sync::Arc;

use billiards_hub::config::Config;
use billiards_hub::modules::navigation::Route;
use billiards_hub::services::backend::HttpBackend;
use billiards_hub::AppContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billiards_hub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load environment configuration");
    if config.uses_default_key() {
        tracing::warn!("Using the built-in anon key for {}", config.backend_url);
    }

    let backend = Arc::new(HttpBackend::new(&config));
    let app = AppContext::init(config, backend).await;

    let route = app.landing().await;
    tracing::info!("Landing route: {}", route);

    if route == Route::PendingReview {
        let (watcher, mut updates) = app.watch_status();
        tracing::info!(
            "Account under review, checking every {}s (Ctrl-C to stop)",
            app.config.poll_interval.as_secs()
        );
        tokio::select! {
            update = updates.recv() => {
                if let Some(update) = update {
                    tracing::info!("Review settled: {} -> {}", update.status, update.route);
                    if let Some(notes) = update.return_notes {
                        tracing::info!("Reviewer notes: {}", notes);
                    }
                    if let Some(reason) = update.rejection_reason {
                        tracing::info!("Rejection reason: {}", reason);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
            }
        }
        drop(watcher);
    }

    app.teardown();
}
