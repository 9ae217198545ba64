use std::sync::Arc;

use gwas_service::GwasService;
use gwas_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<GwasService>,
}
impl AppState {
	/// Connects to Postgres, applies the schema, and warms the embedding provider. A database
	/// without pgvector is served lexically.
	pub async fn new(config: gwas_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		if let Err(err) = db.ensure_vector_schema(config.storage.vectors.dimensions).await {
			tracing::warn!(
				error = %err,
				strategy = "lexical",
				"Vector schema unavailable. Similarity search is disabled."
			);
		}

		let service = GwasService::new(config, db);

		service.resolver.warm_up().await;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: GwasService) -> Self {
		Self { service: Arc::new(service) }
	}
}
