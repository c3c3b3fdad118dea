//! Пересборка обучающих таблиц из сырых выгрузок

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use race_outcome_ml::{
    config::PipelineConfig,
    pipeline::Pipeline,
    preprocessing::FeatureEngineer,
    sources::{load_tables, AuxiliaryTables, SchemaKind},
    types::RaceVariant,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Build ML-ready race outcome tables", long_about = None)]
struct Cli {
    /// Raw dump layout: jolpica or legacy
    #[arg(long, default_value = "jolpica")]
    schema: SchemaKind,

    /// Variants to build (all when omitted)
    #[arg(long = "variant")]
    variants: Vec<RaceVariant>,

    /// JSON pipeline configuration
    #[arg(long, env = "RACE_ML_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    raw_dir: Option<PathBuf>,

    #[arg(long)]
    processed_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    if let Some(dir) = cli.raw_dir {
        config.raw_dir = dir;
    }
    if let Some(dir) = cli.processed_dir {
        config.processed_dir = dir;
    }

    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;
    let raw_dir = pipeline.config().raw_dir.clone();
    let tables = load_tables(cli.schema, &raw_dir).with_context(|| format!("loading raw tables from {}", raw_dir.display()))?;
    let aux = AuxiliaryTables::load(&raw_dir).context("loading auxiliary tables")?;

    let variants = if cli.variants.is_empty() {
        RaceVariant::ALL.to_vec()
    } else {
        cli.variants
    };
    for variant in variants {
        let output = pipeline.run(variant, tables.as_ref(), &aux);
        pipeline
            .persist(variant, &output)
            .with_context(|| format!("writing {variant} outputs"))?;

        let label = match variant {
            RaceVariant::Status => "dnf",
            RaceVariant::MainRace | RaceVariant::Qualifying => "deviation_from_median_ms",
        };
        let (matrix, _, columns) = FeatureEngineer::numeric_matrix(&output.features, label)?;
        tracing::info!(
            "{}: numeric matrix {}x{} ({})",
            variant,
            matrix.nrows(),
            matrix.ncols(),
            columns.join(", ")
        );
    }
    Ok(())
}
