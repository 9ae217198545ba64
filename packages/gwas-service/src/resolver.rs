use std::{sync::Arc, time::Duration};

use gwas_config::EmbeddingProviderConfig;

use crate::{EmbeddingProvider, cache::EmbeddingCache};

const WARM_UP_TEXT: &str = "genome-wide association study";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
	#[error("Embedding provider is unavailable: {message}")]
	Unavailable { message: String },
	#[error("Embedding provider timed out after {timeout_ms} ms.")]
	TimedOut { timeout_ms: u64 },
	#[error("Embedding provider returned an invalid vector: {message}")]
	InvalidVector { message: String },
}

/// Turns query text into a vector through the embedding cache and, on a miss, the provider.
/// Failures are returned to the caller; choosing a fallback is the planner's job.
pub struct VectorResolver {
	cfg: EmbeddingProviderConfig,
	cache: Arc<EmbeddingCache>,
	provider: Arc<dyn EmbeddingProvider>,
}
impl VectorResolver {
	pub fn new(
		cfg: EmbeddingProviderConfig,
		cache: Arc<EmbeddingCache>,
		provider: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { cfg, cache, provider }
	}

	pub async fn resolve(&self, text: &str) -> Result<Vec<f32>, ResolveError> {
		if let Some(vector) = self.cache.get(text).await {
			if self.validate(&vector).is_ok() {
				return Ok(vector);
			}

			tracing::warn!(
				dimensions = vector.len(),
				"Cached embedding has the wrong shape. Re-embedding."
			);
		}

		let vector = self.embed(&crate::cache::normalize_query(text)).await?;

		self.cache.set(text, vector.clone()).await;

		Ok(vector)
	}

	/// Issues one uncached resolution so the provider's cold start is not paid by a request.
	pub async fn warm_up(&self) {
		match self.embed(WARM_UP_TEXT).await {
			Ok(_) => tracing::info!(model = %self.cfg.model, "Embedding provider warmed up."),
			Err(err) => tracing::warn!(error = %err, "Embedding provider warm-up failed."),
		}
	}

	async fn embed(&self, text: &str) -> Result<Vec<f32>, ResolveError> {
		let input = vec![format!("{}{}", self.cfg.query_prefix.as_deref().unwrap_or_default(), text)];
		let timeout_ms = self.cfg.timeout_ms;
		let result = tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			self.provider.embed(&self.cfg, &input),
		)
		.await
		.map_err(|_| ResolveError::TimedOut { timeout_ms })?;
		let vectors =
			result.map_err(|err| ResolveError::Unavailable { message: err.to_string() })?;
		let vector = vectors.into_iter().next().ok_or_else(|| ResolveError::InvalidVector {
			message: "Provider returned no vectors.".to_string(),
		})?;

		self.validate(&vector)?;

		Ok(vector)
	}

	fn validate(&self, vector: &[f32]) -> Result<(), ResolveError> {
		let expected = self.cfg.dimensions as usize;

		if vector.len() != expected {
			return Err(ResolveError::InvalidVector {
				message: format!("Expected {expected} dimensions, got {}.", vector.len()),
			});
		}
		if vector.iter().any(|value| !value.is_finite()) {
			return Err(ResolveError::InvalidVector {
				message: "Vector contains non-finite values.".to_string(),
			});
		}

		Ok(())
	}
}
