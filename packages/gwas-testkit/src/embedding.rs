use std::{
	collections::hash_map::DefaultHasher,
	hash::{Hash, Hasher},
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};

use color_eyre::eyre;

use gwas_config::EmbeddingProviderConfig;
use gwas_service::{BoxFuture, EmbeddingProvider};

#[derive(Clone, Copy, Debug)]
enum Behavior {
	Embed,
	Fail,
	Stall(Duration),
}

/// Deterministic bag-of-words embedder: each lowercase token adds weight to one hashed bucket,
/// and the result is unit length. Texts sharing tokens land close together.
pub struct HashEmbedding {
	dimensions: usize,
	behavior: Behavior,
	calls: AtomicUsize,
}
impl HashEmbedding {
	pub fn new(dimensions: u32) -> Self {
		Self { dimensions: dimensions as usize, behavior: Behavior::Embed, calls: AtomicUsize::new(0) }
	}

	/// Every call fails as if the model were unavailable.
	pub fn failing(dimensions: u32) -> Self {
		Self { behavior: Behavior::Fail, ..Self::new(dimensions) }
	}

	/// Every call sleeps for `delay` before answering.
	pub fn stalling(dimensions: u32, delay: Duration) -> Self {
		Self { behavior: Behavior::Stall(delay), ..Self::new(dimensions) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector_for(&self, text: &str) -> Vec<f32> {
		let mut vector = vec![0.0_f32; self.dimensions.max(1)];

		for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
			if token.is_empty() {
				continue;
			}

			let mut hasher = DefaultHasher::new();

			token.hash(&mut hasher);

			let bucket = (hasher.finish() % vector.len() as u64) as usize;

			vector[bucket] += 1.0;
		}

		let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

		if norm == 0.0 {
			vector[0] = 1.0;

			return vector;
		}

		vector.iter().map(|value| value / norm).collect()
	}
}

impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let behavior = self.behavior;

		Box::pin(async move {
			match behavior {
				Behavior::Embed => {},
				Behavior::Fail => return Err(eyre::eyre!("Embedding model is not loaded.")),
				Behavior::Stall(delay) => tokio::time::sleep(delay).await,
			}

			Ok(texts.iter().map(|text| self.vector_for(text)).collect())
		})
	}
}
