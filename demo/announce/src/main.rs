mod config;
use config::AppConfig;
use homecast_core::announce::DuckingPlan;
use homecast_core::auth::{AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource};
use homecast_core::cast::CastLocator;
use homecast_core::storage::GcsStore;
use homecast_core::tts::GoogleSynthesizer;
use homecast_core::{AnnounceError, Announcer, Publisher};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Values in .env win over nothing but lose to the real environment
    let dotenv = dotenvy::dotenv();

    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,homecast_core=info,announce=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match dotenv {
        Ok(path) => info!(target = "announce", path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(target = "announce", error = %e, "Failed to load .env"),
    }

    if let Err(e) = run().await {
        error!(target = "announce", category = e.category(), error = %e, "Announcement failed");
        return Err(e.into());
    }
    Ok(())
}

async fn run() -> Result<(), AnnounceError> {
    let cfg = AppConfig::load();
    cfg.core.validate()?;

    // Clients are built once and handed to each component
    let key = Arc::new(ServiceAccountKey::from_file(&cfg.core.credentials_path)?);
    let tokens: Arc<dyn AccessTokenSource> = Arc::new(ServiceAccountTokenSource::with_timeout(
        key.as_ref().clone(),
        cfg.core.auth_timeout(),
    ));

    let synthesizer = Arc::new(GoogleSynthesizer::new(
        cfg.core.synthesis.clone(),
        Arc::clone(&tokens),
    ));
    let store = Arc::new(GcsStore::new(&cfg.core.storage, Arc::clone(&key), tokens));
    let publisher = Publisher::from_config(store, &cfg.core.storage)?;

    let mut announcer = Announcer::new(synthesizer, publisher);
    if cfg.core.ducking.enabled {
        announcer = announcer.with_ducking(DuckingPlan {
            volume: cfg.core.ducking.volume,
            margin: cfg.core.ducking.margin(),
        });
    }

    let locator = CastLocator::new(&cfg.core.device);
    let report = announcer
        .run(
            &locator,
            &cfg.core.device.address,
            &cfg.announcement.text,
            &cfg.announcement.overrides,
        )
        .await?;

    info!(
        target = "announce",
        key = %report.object_key,
        stages = ?report.stages,
        waited_ms = report.waited.map(|d| d.as_millis() as u64),
        "Announcement done"
    );
    Ok(())
}
