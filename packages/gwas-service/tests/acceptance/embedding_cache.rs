use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;

use gwas_service::cache::EmbeddingCache;
use gwas_testkit::{
	HashEmbedding, MemoryCatalogue, MemoryEmbeddingStore, TEST_DIMENSIONS, memory::MemoryEntry,
};

use super::{harness, sample_records};

#[tokio::test]
async fn lookup_is_case_and_whitespace_insensitive() {
	let store = Arc::new(MemoryEmbeddingStore::new());
	let cache = EmbeddingCache::new(4, store.clone());
	let vector = vec![0.25, 0.5, 0.75];

	cache.set("Alzheimer", vector.clone()).await;

	assert_eq!(cache.get("  ALZHEIMER  ").await, Some(vector.clone()));
	assert_eq!(store.entry("alzheimer").map(|entry| entry.vector), Some(vector));
}

#[tokio::test]
async fn memory_tier_evicts_in_insertion_order() {
	let store = Arc::new(MemoryEmbeddingStore::new());
	let cache = EmbeddingCache::new(2, store.clone());

	cache.set("first", vec![1.0]).await;
	cache.set("second", vec![2.0]).await;

	// Reads do not refresh the slot of "first".
	assert_eq!(cache.get("first").await, Some(vec![1.0]));

	cache.set("third", vec![3.0]).await;

	assert!(!cache.contains_in_memory("first"));
	assert!(cache.contains_in_memory("second"));
	assert!(cache.contains_in_memory("third"));
	assert_eq!(cache.memory_len(), 2);

	let reads_before = store.reads();

	assert_eq!(cache.get("first").await, Some(vec![1.0]));
	assert_eq!(store.reads(), reads_before + 1);
	assert!(cache.contains_in_memory("first"));
}

#[tokio::test]
async fn durable_failures_are_misses() {
	let store = Arc::new(MemoryEmbeddingStore::new());
	let cache = EmbeddingCache::new(2, store.clone());

	store.set_failing(true);

	assert_eq!(cache.get("apoe").await, None);

	cache.set("apoe", vec![0.5]).await;

	assert_eq!(cache.get("APOE").await, Some(vec![0.5]));
}

#[tokio::test]
async fn durable_hit_promotes_and_records_access() {
	let store = Arc::new(MemoryEmbeddingStore::new());
	let cache = EmbeddingCache::new(2, store.clone());
	let now = OffsetDateTime::now_utc();

	store.insert_entry(
		"body mass index",
		MemoryEntry { vector: vec![0.1, 0.2], created_at: now, last_accessed_at: now, access_count: 0 },
	);

	assert_eq!(cache.get("Body Mass Index").await, Some(vec![0.1, 0.2]));
	assert!(cache.contains_in_memory("body mass index"));

	let mut access_count = 0;

	for _ in 0..100 {
		access_count = store.entry("body mass index").map(|entry| entry.access_count).unwrap_or(0);

		if access_count == 1 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	assert_eq!(access_count, 1);
}

#[tokio::test]
async fn sweep_evicts_idle_and_unpopular_entries() {
	let h = harness(MemoryCatalogue::new(sample_records()), HashEmbedding::new(TEST_DIMENSIONS));
	let now = OffsetDateTime::now_utc();
	let entry = |created_days: i64, accessed_days: i64, access_count: i64| MemoryEntry {
		vector: vec![1.0],
		created_at: now - time::Duration::days(created_days),
		last_accessed_at: now - time::Duration::days(accessed_days),
		access_count,
	};

	h.cache.insert_entry("idle", entry(40, 31, 50));
	h.cache.insert_entry("old and unpopular", entry(100, 1, 2));
	h.cache.insert_entry("old and popular", entry(100, 1, 3));
	h.cache.insert_entry("fresh", entry(1, 1, 0));

	let removed = h.service.sweep_embedding_cache(now).await.expect("Sweep failed.");

	assert_eq!(removed, 2);
	assert!(h.cache.entry("idle").is_none());
	assert!(h.cache.entry("old and unpopular").is_none());
	assert!(h.cache.entry("old and popular").is_some());
	assert!(h.cache.entry("fresh").is_some());
}
