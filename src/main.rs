use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loan_approval_api::api::handlers::{self, AppState};
use loan_approval_api::config::Config;
use loan_approval_api::core::prediction::PredictionService;
use loan_approval_api::integrations::classifier::{GbdtClassifier, LoanClassifier};
use loan_approval_api::integrations::dataset::Dataset;

/// Loads the model and wraps it in the prediction workflow.
///
/// A missing or invalid model aborts start-up unless `ALLOW_MISSING_MODEL`
/// is set, in which case prediction endpoints answer 503.
fn load_predictor(config: &Config) -> anyhow::Result<Option<PredictionService>> {
    let model = match GbdtClassifier::from_path(&config.model_path) {
        Ok(model) => model,
        Err(e) if config.allow_missing_model => {
            tracing::error!("⚠️ Model not loaded ({}); predictions disabled", e);
            return Ok(None);
        }
        Err(e) => anyhow::bail!("Failed to load model from {}: {}", config.model_path, e),
    };

    let scale = config.resolve_score_scale(model.payment_score_scale())?;
    tracing::info!(
        "Model '{}' v{} ready ({} trees, payment scores as {})",
        model.name(),
        model.version(),
        model.tree_count(),
        scale.as_str()
    );

    Ok(Some(PredictionService::new(
        Arc::new(model),
        scale,
        Duration::from_secs(config.prediction_cache_ttl_secs),
        config.prediction_cache_capacity,
    )))
}

/// Loads the historical dataset. Statistics endpoints answer 503 without it.
fn load_dataset(config: &Config) -> Option<Dataset> {
    match Dataset::load(&config.dataset_path) {
        Ok(dataset) => Some(dataset),
        Err(e) => {
            tracing::warn!("⚠️ Dataset not loaded ({}); statistics disabled", e);
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Model and dataset loading (once, read-only afterwards).
/// - HTTP routes and middleware (CORS, Rate Limiting, Body Limit).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loan_approval_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let predictor = load_predictor(&config)?;
    let dataset = load_dataset(&config);

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        predictor,
        dataset,
    });

    // Configure per-IP rate limiter
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(ServiceBuilder::new().layer(
        GovernorLayer {
            config: governor_conf,
        },
    ));

    // Health check and docs bypass rate limiting
    let app = handlers::public_routes()
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
