//! Postgres-backed implementations of the store traits.

use std::sync::Arc;

use sqlx::PgPool;
use time::OffsetDateTime;

use gwas_storage::{
	catalogue::{self, CatalogueQuery, SqlDialect},
	db::{Capabilities, Db},
	embedding_cache::{self, SweepPolicy},
	models::StudyPage,
};

use crate::{BoxFuture, CatalogueStore, EmbeddingCacheStore};

pub struct PgCatalogue {
	db: Db,
	dialect: Arc<dyn SqlDialect>,
}
impl PgCatalogue {
	pub fn new(db: Db, dialect: Arc<dyn SqlDialect>) -> Self {
		Self { db, dialect }
	}
}

impl CatalogueStore for PgCatalogue {
	fn fetch<'a>(
		&'a self,
		query: &'a CatalogueQuery,
	) -> BoxFuture<'a, gwas_storage::Result<StudyPage>> {
		Box::pin(catalogue::fetch_studies(&self.db.pool, self.dialect.as_ref(), query))
	}

	fn count<'a>(&'a self, query: &'a CatalogueQuery) -> BoxFuture<'a, gwas_storage::Result<u64>> {
		Box::pin(catalogue::count_studies(&self.db.pool, self.dialect.as_ref(), query))
	}

	fn capabilities(&self) -> BoxFuture<'_, gwas_storage::Result<Capabilities>> {
		Box::pin(self.db.probe_capabilities())
	}
}

pub struct PgEmbeddingCache {
	pool: PgPool,
}
impl PgEmbeddingCache {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

impl EmbeddingCacheStore for PgEmbeddingCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, gwas_storage::Result<Option<Vec<f32>>>> {
		Box::pin(async move {
			let cached = embedding_cache::fetch(&self.pool, key).await?;

			Ok(cached.map(|entry| entry.vector))
		})
	}

	fn touch<'a>(
		&'a self,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, gwas_storage::Result<()>> {
		Box::pin(embedding_cache::touch(&self.pool, key, now))
	}

	fn upsert<'a>(
		&'a self,
		key: &'a str,
		vector: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, gwas_storage::Result<()>> {
		Box::pin(embedding_cache::upsert(&self.pool, key, vector, now))
	}

	fn sweep(
		&self,
		policy: SweepPolicy,
		now: OffsetDateTime,
	) -> BoxFuture<'_, gwas_storage::Result<u64>> {
		Box::pin(embedding_cache::sweep(&self.pool, policy, now))
	}
}
