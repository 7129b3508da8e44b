use bucket_hook::config;
use bucket_hook::http;
use std::{env, process};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
  // Initialize tracing
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bucket_hook=debug,tower_http=debug".into()),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact(),
    )
    .init();

  // Load config, refusing to serve anything when it is incomplete
  let config_path =
    env::var(config::CONFIG_PATH_ENV).unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_owned());
  let cfg = match config::parse(&config_path) {
    Ok(cfg) => cfg,
    Err(e) => {
      error!("invalid configuration: {:#}", e);
      process::exit(1);
    }
  };

  let router = match http::bootstrap(&cfg) {
    Ok(router) => router,
    Err(e) => {
      error!("failed creating router: {:#}", e);
      process::exit(1);
    }
  };

  // Serve
  if let Err(e) = tokio::try_join!(
    http::serve(router, &cfg.app.listen),
    http::serve_metrics(&cfg.app.metrics_listen),
  ) {
    error!("{:#}", e);
    process::exit(1);
  }
}
