/// API сервер признаков для моделей прогноза

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use race_outcome_ml::{
    api::{router, AppState},
    config::PipelineConfig,
    serving::FeatureExpander,
    types::RaceVariant,
};

#[derive(Parser, Debug)]
#[command(name = "race-outcome-api", about = "Serve pick-lists and feature rows for race outcome models")]
struct Args {
    /// JSON-файл конфигурации конвейера
    #[arg(long, env = "RACE_ML_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "RACE_ML_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();

    let helper_dir = config.features_helper_dir();
    let mut expanders = Vec::new();
    for variant in RaceVariant::ALL {
        match FeatureExpander::load(&helper_dir, variant) {
            Ok(expander) => {
                tracing::info!(
                    "Loaded {} pick-lists: {} drivers, {} constructors, {} circuits",
                    variant,
                    expander.pick_lists().drivers.len(),
                    expander.pick_lists().constructors.len(),
                    expander.pick_lists().circuits.len()
                );
                expanders.push(expander);
            }
            Err(e) => tracing::warn!("Skipping {}: {}", variant, e),
        }
    }

    let app = router(AppState::new(expanders));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!("Server listening on http://{}", args.bind);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
