use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState, Pages, ServerConfig};
use docdir_files::{DocumentStore, FilesService};

/// Main entry point for the docdir server
///
/// Resolves configuration, creates the store directory if needed, and serves
/// the document routes until the process is stopped.
///
/// # Environment Variables
/// - `DOCDIR_ADDR`: listen address (default: "0.0.0.0:8080")
/// - `DOCDIR_STORE_DIR`: directory holding the documents (default: "./public")
/// - `DOCDIR_TEMPLATE_DIR`: directory holding the page templates (default: "templates")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the store directory cannot be created,
/// - the listen address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docdir_run=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = ServerConfig::from_env_values(
        std::env::var("DOCDIR_ADDR").ok(),
        std::env::var("DOCDIR_STORE_DIR").ok(),
        std::env::var("DOCDIR_TEMPLATE_DIR").ok(),
    )?;

    let store = DocumentStore::open_or_create(cfg.store_dir())?;
    tracing::info!("++ Serving documents from {}", store.root().display());

    let app = router(AppState::new(
        FilesService::new(store),
        Pages::new(cfg.template_dir()),
    ));

    let listener = tokio::net::TcpListener::bind(cfg.addr()).await?;
    tracing::info!("++ Starting docdir on {}", cfg.addr());
    axum::serve(listener, app).await?;

    Ok(())
}
