pub mod cache;
pub mod capability;
pub mod pg;
pub mod resolver;
pub mod search;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use search::{
	FilterRequest, ParsedStudy, SearchMode, SearchResponse, SortDirection, SortKey, StudyStats,
	VariantMatcher,
};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use time::OffsetDateTime;

use gwas_config::{Config, EmbeddingProviderConfig};
use gwas_domain::quality::QualityPolicy;
use gwas_providers::embedding;
use gwas_storage::{
	catalogue::{CatalogueQuery, PgVectorDialect},
	db::{Capabilities, Db},
	embedding_cache::SweepPolicy,
	models::StudyPage,
};

use crate::{
	cache::EmbeddingCache,
	capability::CapabilityProbe,
	pg::{PgCatalogue, PgEmbeddingCache},
	resolver::VectorResolver,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text-to-vector capability.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Read access to the study catalogue.
pub trait CatalogueStore
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		query: &'a CatalogueQuery,
	) -> BoxFuture<'a, gwas_storage::Result<StudyPage>>;

	/// Rows matching the store predicates, ignoring the scan limit.
	fn count<'a>(&'a self, query: &'a CatalogueQuery) -> BoxFuture<'a, gwas_storage::Result<u64>>;

	fn capabilities(&self) -> BoxFuture<'_, gwas_storage::Result<Capabilities>>;
}

/// Durable key-to-vector tier of the embedding cache. Keys arrive already normalized.
pub trait EmbeddingCacheStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, gwas_storage::Result<Option<Vec<f32>>>>;

	fn touch<'a>(
		&'a self,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, gwas_storage::Result<()>>;

	fn upsert<'a>(
		&'a self,
		key: &'a str,
		vector: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, gwas_storage::Result<()>>;

	fn sweep(
		&self,
		policy: SweepPolicy,
		now: OffsetDateTime,
	) -> BoxFuture<'_, gwas_storage::Result<u64>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}

impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

/// Store-side collaborators, swappable for in-memory fakes.
#[derive(Clone)]
pub struct Stores {
	pub catalogue: Arc<dyn CatalogueStore>,
	pub embedding_cache: Arc<dyn EmbeddingCacheStore>,
}
impl Stores {
	pub fn postgres(db: Db) -> Self {
		Self {
			catalogue: Arc::new(PgCatalogue::new(db.clone(), Arc::new(PgVectorDialect))),
			embedding_cache: Arc::new(PgEmbeddingCache::new(db.pool)),
		}
	}
}

pub struct GwasService {
	pub cfg: Config,
	pub catalogue: Arc<dyn CatalogueStore>,
	pub cache: Arc<EmbeddingCache>,
	pub resolver: VectorResolver,
	pub capabilities: CapabilityProbe,
	pub policy: QualityPolicy,
	pub variant_matcher: Option<Arc<dyn VariantMatcher>>,
}
impl GwasService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_parts(cfg, Stores::postgres(db), Providers::default())
	}

	pub fn with_parts(cfg: Config, stores: Stores, providers: Providers) -> Self {
		let cache = Arc::new(EmbeddingCache::new(cfg.cache.memory_capacity, stores.embedding_cache));
		let resolver =
			VectorResolver::new(cfg.providers.embedding.clone(), cache.clone(), providers.embedding);
		let capabilities =
			CapabilityProbe::new(Duration::from_secs(cfg.search.capability_ttl_seconds));
		let policy = QualityPolicy::from_config(&cfg.quality);

		Self {
			cfg,
			catalogue: stores.catalogue,
			cache,
			resolver,
			capabilities,
			policy,
			variant_matcher: None,
		}
	}

	/// Installs a post-filter deciding whether a study matches the caller's variants.
	pub fn with_variant_matcher(mut self, matcher: Arc<dyn VariantMatcher>) -> Self {
		self.variant_matcher = Some(matcher);

		self
	}

	/// Evicts idle and unpopular entries from the durable embedding cache.
	pub async fn sweep_embedding_cache(&self, now: OffsetDateTime) -> Result<u64> {
		let policy = SweepPolicy {
			max_idle: time::Duration::days(self.cfg.cache.max_idle_days),
			max_age: time::Duration::days(self.cfg.cache.max_age_days),
			min_access_count: self.cfg.cache.min_access_count,
		};
		let removed = self.cache.sweep(policy, now).await?;

		tracing::info!(removed, cache_tier = "durable", "Embedding cache swept.");

		Ok(removed)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
