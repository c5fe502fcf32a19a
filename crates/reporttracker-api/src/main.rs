use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reporttracker_api::auth::AuthConfig;
use reporttracker_api::evidence::DiskEvidenceStore;
use reporttracker_api::{router, AppState};
use reporttracker_core::notify::LogSink;
use reporttracker_core::workflow::FlagWorkflow;
use reporttracker_repository::{
    connect, run_migrations, PostgresDailyDataRepository, PostgresFlagRepository,
};
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET not set");
    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);

    let pool = connect(&database_url, 5).await?;
    run_migrations(&pool).await?;

    let daily = Arc::new(PostgresDailyDataRepository::new(pool.clone()));
    let flags = Arc::new(PostgresFlagRepository::new(pool.clone()));
    let evidence = Arc::new(DiskEvidenceStore::new(upload_dir.clone()).await?);
    let workflow = Arc::new(FlagWorkflow::new(daily, flags, evidence, Arc::new(LogSink)));

    let state = AppState::new(workflow, AuthConfig::new(jwt_secret));

    let app = router(state).nest_service("/uploads", ServeDir::new(upload_dir));

    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, port)).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
