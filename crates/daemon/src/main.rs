use anyhow::Context;
use axum::{response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod llm;
mod media;
mod planner;
mod preprocess;
mod tasks;

use config::Config;
use llm::MlServiceClient;
use planner::Planner;
use preprocess::Preprocessor;
use tasks::{PlanExecutor, TaskStore};

/// Default `EnvFilter` directives when `RUST_LOG` is unset. Events from this
/// binary carry its crate name as their target.
const DEFAULT_LOG_FILTER: &str = concat!(env!("CARGO_CRATE_NAME"), "=info,tower_http=info");

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
    started_at: DateTime<Utc>,
}

fn app(state: api::AppState, started_at: DateTime<Utc>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route(
            "/health",
            get(move || async move {
                Json(HealthResponse {
                    ok: true,
                    version: env!("CARGO_PKG_VERSION"),
                    started_at,
                })
            }),
        )
        .nest("/api", api::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.cache_dir)
        .await
        .with_context(|| format!("creating cache dir {}", config.cache_dir.display()))?;
    info!(?config, "configuration loaded");

    let ml = Arc::new(MlServiceClient::new(config.ml_service_url.clone()));
    let store = Arc::new(TaskStore::new());
    let executor = Arc::new(PlanExecutor::new(store, ml.clone()));
    let state = api::AppState {
        preprocessor: Arc::new(Preprocessor::new(
            ml.clone(),
            ml.clone(),
            config.describe_concurrency,
            config.sample_width,
            config.cache_dir.clone(),
        )),
        planner: Arc::new(Planner::new(ml, executor)),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "daemon listening");
    axum::serve(listener, app(state, Utc::now())).await?;

    Ok(())
}
