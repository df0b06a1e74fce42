use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lexicard::config::AppConfig;
use lexicard::state::AppState;
use lexicard::{db, handlers};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lexicard=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = AppConfig::load().expect("Failed to load configuration");

  let db_path = config.database_path();
  let pool = db::init_db(&db_path).expect("Failed to initialize database");
  tracing::info!("Database ready at {}", db_path.display());

  let state = AppState::new(pool, &config);
  let app = handlers::router(state);

  let bind_addr = config.server.bind_addr();
  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://localhost:{}", config.server.port);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
