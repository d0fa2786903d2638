use std::sync::Arc;

use tower_http::cors::CorsLayer;

use sure_onboarding::config::ServiceConfig;
use sure_onboarding::onboarding::flow::OnboardingFlow;
use sure_onboarding::onboarding::routes::{OnboardingRouteState, onboarding_routes};
use sure_onboarding::partners::Partners;
use sure_onboarding::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env();

    eprintln!("💰 Sure Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding", config.port);
    eprintln!("   Database: {}", config.db_path.display());

    // Partner registry — built once, injected into request state.
    let partners_config = config.load_partners_config()?;
    let partners = Arc::new(Partners::from_config(partners_config));
    let registry = partners.all();
    eprintln!(
        "   Partners: {}",
        if registry.is_empty() {
            "none".to_string()
        } else {
            registry.keys().join(", ")
        }
    );

    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let flow = Arc::new(OnboardingFlow::new(db, partners));
    let app = onboarding_routes(OnboardingRouteState { flow }).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
