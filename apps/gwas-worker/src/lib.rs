pub mod worker;

mod error;

pub use error::{Error, Result};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gwas_cli::ConfigArgs;
use gwas_service::{GwasService, Providers};
use gwas_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = gwas_cli::VERSION,
	rename_all = "kebab",
	styles = gwas_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub config: ConfigArgs,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = gwas_config::load(&args.config.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let mut backfill = config.worker.backfill_enabled;

	if backfill && let Err(err) = db.ensure_vector_schema(config.storage.vectors.dimensions).await {
		tracing::warn!(error = %err, "Vector schema unavailable. Embedding backfill is disabled.");

		backfill = false;
	}

	let providers = Providers::default();
	let state = worker::WorkerState {
		service: GwasService::with_parts(
			config,
			gwas_service::Stores::postgres(db.clone()),
			providers.clone(),
		),
		db,
		embedding: providers.embedding,
		backfill,
	};

	worker::run_worker(state).await?;

	Ok(())
}
