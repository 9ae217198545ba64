//! Background maintenance: durable embedding-cache sweeps and study-embedding backfill.

use std::{sync::Arc, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};

use gwas_service::{EmbeddingProvider, GwasService};
use gwas_storage::{db::Db, embeddings, models::PendingStudyEmbedding};

use crate::{Error, Result};

pub struct WorkerState {
	pub service: GwasService,
	pub db: Db,
	pub embedding: Arc<dyn EmbeddingProvider>,
	/// Off when disabled in config or when the vector schema could not be applied.
	pub backfill: bool,
}

pub async fn run_worker(state: WorkerState) -> Result<()> {
	let cfg = &state.service.cfg;
	let poll_interval = StdDuration::from_millis(cfg.worker.poll_interval_ms);
	let sweep_interval = Duration::seconds(cfg.cache.sweep_interval_seconds as i64);
	let mut last_sweep = None;

	tracing::info!(backfill = state.backfill, "Worker started.");

	loop {
		let now = OffsetDateTime::now_utc();

		if sweep_due(last_sweep, now, sweep_interval) {
			match state.service.sweep_embedding_cache(now).await {
				Ok(_) => last_sweep = Some(now),
				Err(err) => tracing::error!(error = %err, "Embedding cache sweep failed."),
			}
		}
		if state.backfill
			&& let Err(err) = backfill_once(&state).await
		{
			tracing::error!(error = %err, "Study embedding backfill failed.");
		}

		tokio::time::sleep(poll_interval).await;
	}
}

/// Embeds one batch of catalogue rows lacking a stored vector. Returns the rows inserted.
pub async fn backfill_once(state: &WorkerState) -> Result<u64> {
	let cfg = &state.service.cfg;
	let pending = embeddings::pending(&state.db.pool, cfg.worker.backfill_batch_size).await?;

	if pending.is_empty() {
		return Ok(0);
	}

	let texts = document_texts(cfg.providers.embedding.document_prefix.as_deref(), &pending);
	let vectors = state
		.embedding
		.embed(&cfg.providers.embedding, &texts)
		.await
		.map_err(|err| Error::Provider(err.to_string()))?;

	check_vectors(&vectors, pending.len(), cfg.storage.vectors.dimensions)?;

	let inserted = embeddings::insert_batch(&state.db.pool, &pending, &vectors).await?;

	tracing::info!(pending = pending.len(), inserted, "Study embeddings backfilled.");

	Ok(inserted)
}

fn sweep_due(last_sweep: Option<OffsetDateTime>, now: OffsetDateTime, interval: Duration) -> bool {
	last_sweep.is_none_or(|last| now - last >= interval)
}

fn document_texts(prefix: Option<&str>, rows: &[PendingStudyEmbedding]) -> Vec<String> {
	let prefix = prefix.unwrap_or_default();

	rows.iter()
		.map(|row| {
			let text = row.combined_text.split_whitespace().collect::<Vec<_>>().join(" ");

			format!("{prefix}{text}")
		})
		.collect()
}

fn check_vectors(vectors: &[Vec<f32>], expected_rows: usize, dimensions: u32) -> Result<()> {
	if vectors.len() != expected_rows {
		return Err(Error::Validation(format!(
			"Embedding provider returned {} vectors for {expected_rows} studies.",
			vectors.len()
		)));
	}
	if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimensions as usize) {
		return Err(Error::Validation(format!(
			"Embedding provider returned {} dimensions, expected {dimensions}.",
			vector.len()
		)));
	}
	if vectors.iter().flatten().any(|value| !value.is_finite()) {
		return Err(Error::Validation(
			"Embedding provider returned non-finite values.".to_string(),
		));
	}

	Ok(())
}
