//! Two-tier query embedding cache.
//!
//! Tier 1 is a bounded in-process map evicted in strict insertion order. Tier 2 is the durable
//! [`EmbeddingCacheStore`], consulted only on a tier-1 miss. Tier-2 failures never reach the
//! caller: a failed read is a miss and a failed write is dropped.

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
};

use time::OffsetDateTime;

use gwas_storage::embedding_cache::SweepPolicy;

use crate::{EmbeddingCacheStore, Result};

/// Cache key for a query: surrounding whitespace trimmed, lowercased.
pub fn normalize_query(query: &str) -> String {
	query.trim().to_lowercase()
}

pub struct EmbeddingCache {
	capacity: usize,
	memory: Mutex<MemoryTier>,
	store: Arc<dyn EmbeddingCacheStore>,
}
impl EmbeddingCache {
	pub fn new(capacity: usize, store: Arc<dyn EmbeddingCacheStore>) -> Self {
		Self { capacity: capacity.max(1), memory: Mutex::new(MemoryTier::default()), store }
	}

	pub async fn get(&self, query: &str) -> Option<Vec<f32>> {
		let key = normalize_query(query);

		if key.is_empty() {
			return None;
		}
		if let Some(vector) = self.memory_get(&key) {
			tracing::debug!(cache_tier = "memory", "Embedding cache hit.");

			return Some(vector);
		}

		match self.store.get(&key).await {
			Ok(Some(vector)) => {
				tracing::debug!(cache_tier = "durable", "Embedding cache hit.");

				self.memory_insert(key.clone(), vector.clone());
				self.spawn_touch(key);

				Some(vector)
			},
			Ok(None) => None,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_tier = "durable",
					"Embedding cache read failed. Treating as a miss."
				);

				None
			},
		}
	}

	pub async fn set(&self, query: &str, vector: Vec<f32>) {
		let key = normalize_query(query);

		if key.is_empty() {
			return;
		}

		self.memory_insert(key.clone(), vector.clone());

		if let Err(err) = self.store.upsert(&key, &vector, OffsetDateTime::now_utc()).await {
			tracing::warn!(error = %err, cache_tier = "durable", "Embedding cache write failed.");
		}
	}

	/// Tier-1 membership only; never touches the durable tier.
	pub fn contains_in_memory(&self, query: &str) -> bool {
		let key = normalize_query(query);

		self.lock().entries.contains_key(&key)
	}

	pub fn memory_len(&self) -> usize {
		self.lock().entries.len()
	}

	pub async fn sweep(&self, policy: SweepPolicy, now: OffsetDateTime) -> Result<u64> {
		Ok(self.store.sweep(policy, now).await?)
	}

	fn memory_get(&self, key: &str) -> Option<Vec<f32>> {
		self.lock().entries.get(key).cloned()
	}

	fn memory_insert(&self, key: String, vector: Vec<f32>) {
		let mut memory = self.lock();

		if let Some(slot) = memory.entries.get_mut(&key) {
			*slot = vector;

			return;
		}

		while memory.entries.len() >= self.capacity {
			let Some(oldest) = memory.order.pop_front() else {
				break;
			};

			memory.entries.remove(&oldest);
		}

		memory.order.push_back(key.clone());
		memory.entries.insert(key, vector);
	}

	fn spawn_touch(&self, key: String) {
		let store = self.store.clone();

		tokio::spawn(async move {
			if let Err(err) = store.touch(&key, OffsetDateTime::now_utc()).await {
				tracing::warn!(
					error = %err,
					cache_tier = "durable",
					"Failed to record embedding cache access."
				);
			}
		});
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTier> {
		self.memory.lock().unwrap_or_else(|err| err.into_inner())
	}
}

#[derive(Default)]
struct MemoryTier {
	entries: HashMap<String, Vec<f32>>,
	order: VecDeque<String>,
}
