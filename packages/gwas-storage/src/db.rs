use std::{str::FromStr, time::Duration};

use sqlx::{
	PgPool,
	postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{Result, schema};

const SCHEMA_LOCK_ID: i64 = 4_702_113;

/// What the connected database can do beyond plain relational queries.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capabilities {
	pub vector_extension: bool,
	pub study_embeddings: bool,
}
impl Capabilities {
	pub fn similarity_search(&self) -> bool {
		self.vector_extension && self.study_embeddings
	}
}

#[derive(Clone)]
pub struct Db {
	pub pool: PgPool,
}
impl Db {
	/// Every pooled connection carries `statement_timeout`, so a slow catalogue scan fails with a
	/// storage error instead of holding the request.
	pub async fn connect(cfg: &gwas_config::Postgres) -> Result<Self> {
		let options = PgConnectOptions::from_str(&cfg.dsn)?
			.options([("statement_timeout", cfg.statement_timeout_ms.to_string())]);
		let pool = PgPoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.acquire_timeout(Duration::from_millis(cfg.statement_timeout_ms))
			.connect_with(options)
			.await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		self.apply_locked(&schema::render_schema()).await
	}

	/// Installs pgvector and the `study_embeddings` table. Fails on servers without the
	/// extension; callers treat that as "lexical only".
	pub async fn ensure_vector_schema(&self, vector_dim: u32) -> Result<()> {
		self.apply_locked(&schema::render_vector_schema(vector_dim)).await
	}

	pub async fn probe_capabilities(&self) -> Result<Capabilities> {
		let (vector_extension, study_embeddings): (bool, bool) = sqlx::query_as(
			"\
SELECT
	EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'vector'),
	to_regclass('study_embeddings') IS NOT NULL",
		)
		.fetch_one(&self.pool)
		.await?;

		Ok(Capabilities { vector_extension, study_embeddings })
	}

	async fn apply_locked(&self, sql: &str) -> Result<()> {
		// The advisory lock is scoped to this transaction's connection and released on commit.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
