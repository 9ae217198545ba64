//! Durable tier of the query embedding cache, keyed by normalized query text.

use serde_json::Value;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::{Error, Result, models::CachedEmbedding};

/// Eviction rule for [`sweep`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepPolicy {
	pub max_idle: Duration,
	pub max_age: Duration,
	pub min_access_count: i64,
}

pub async fn fetch(pool: &PgPool, query_text: &str) -> Result<Option<CachedEmbedding>> {
	let row: Option<(Value,)> =
		sqlx::query_as("SELECT embedding FROM embedding_cache WHERE query_text = $1")
			.bind(query_text)
			.fetch_optional(pool)
			.await?;
	let Some((embedding,)) = row else {
		return Ok(None);
	};
	let vector = serde_json::from_value::<Vec<f32>>(embedding).map_err(|err| {
		Error::InvalidArgument(format!("Cached embedding for {query_text:?} is malformed: {err}."))
	})?;

	Ok(Some(CachedEmbedding { query_text: query_text.to_string(), vector }))
}

pub async fn touch(pool: &PgPool, query_text: &str, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
UPDATE embedding_cache
SET last_accessed_at = $1, access_count = access_count + 1
WHERE query_text = $2",
	)
	.bind(now)
	.bind(query_text)
	.execute(pool)
	.await?;

	Ok(())
}

/// Last writer wins. Re-inserting a key refreshes the vector and access time but keeps the
/// original creation time and access count.
pub async fn upsert(
	pool: &PgPool,
	query_text: &str,
	vector: &[f32],
	now: OffsetDateTime,
) -> Result<()> {
	let embedding = serde_json::to_value(vector).map_err(|err| {
		Error::InvalidArgument(format!("Failed to encode embedding for {query_text:?}: {err}."))
	})?;

	sqlx::query(
		"\
INSERT INTO embedding_cache (query_text, embedding, created_at, last_accessed_at, access_count)
VALUES ($1, $2, $3, $3, 0)
ON CONFLICT (query_text) DO UPDATE SET
	embedding = EXCLUDED.embedding,
	last_accessed_at = EXCLUDED.last_accessed_at",
	)
	.bind(query_text)
	.bind(embedding)
	.bind(now)
	.execute(pool)
	.await?;

	Ok(())
}

/// Deletes idle entries and old entries that never became popular. Returns the number removed.
pub async fn sweep(pool: &PgPool, policy: SweepPolicy, now: OffsetDateTime) -> Result<u64> {
	let idle_cutoff = now - policy.max_idle;
	let age_cutoff = now - policy.max_age;
	let result = sqlx::query(
		"\
DELETE FROM embedding_cache
WHERE last_accessed_at < $1
	OR (created_at < $2 AND access_count < $3)",
	)
	.bind(idle_cutoff)
	.bind(age_cutoff)
	.bind(policy.min_access_count)
	.execute(pool)
	.await?;

	Ok(result.rows_affected())
}
