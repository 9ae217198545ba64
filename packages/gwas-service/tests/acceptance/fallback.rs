use std::{collections::BTreeSet, time::Duration};

use gwas_service::{SearchMode, SortKey};
use gwas_storage::db::Capabilities;
use gwas_testkit::{HashEmbedding, MemoryCatalogue, TEST_DIMENSIONS};

use super::{
	accessions, embeddings_for, harness, harness_with_config, sample_records, text_request,
};

#[tokio::test]
async fn similarity_without_vector_support_matches_exact_results() {
	let h = harness(MemoryCatalogue::new(sample_records()), HashEmbedding::new(TEST_DIMENSIONS));
	let similarity = h
		.service
		.search(text_request("alzheimer", SearchMode::Similarity))
		.await
		.expect("Similarity search failed.");
	let exact = h
		.service
		.search(text_request("alzheimer", SearchMode::Exact))
		.await
		.expect("Exact search failed.");

	assert_eq!(
		accessions(&similarity).into_iter().collect::<BTreeSet<_>>(),
		accessions(&exact).into_iter().collect::<BTreeSet<_>>()
	);
	assert_eq!(similarity.total, 2);
	assert!(similarity.items.iter().all(|item| item.similarity.is_none()));
	assert_eq!(h.catalogue.fetch_strategies(), vec!["lexical", "lexical"]);
	assert_eq!(h.embedder.calls(), 0);
}

#[tokio::test]
async fn similarity_ranks_by_distance_and_reuses_cached_vectors() {
	let records = sample_records();
	let catalogue = MemoryCatalogue::new(records.clone()).with_embeddings(embeddings_for(&records));
	let h = harness(catalogue, HashEmbedding::new(TEST_DIMENSIONS));
	let mut req = text_request("Alzheimer disease", SearchMode::Similarity);

	req.sort = Some(SortKey::Alphabetical);

	let first = h.service.search(req.clone()).await.expect("Similarity search failed.");

	assert_eq!(first.items.len(), 5);
	assert!(first.items.iter().all(|item| item.similarity.is_some()));

	let scores = first.items.iter().filter_map(|item| item.similarity).collect::<Vec<_>>();

	assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
	assert!(scores.iter().all(|score| (0.0..=1.0).contains(score)));

	req.query = Some("  ALZHEIMER DISEASE ".to_string());

	let second = h.service.search(req).await.expect("Similarity search failed.");

	assert_eq!(accessions(&first), accessions(&second));
	assert_eq!(h.embedder.calls(), 1);
	assert!(h.cache.entry("alzheimer disease").is_some());
	assert_eq!(h.catalogue.fetch_strategies(), vec!["similarity", "similarity"]);
}

#[tokio::test]
async fn failed_vector_resolution_falls_back_to_lexical() {
	let records = sample_records();
	let catalogue = MemoryCatalogue::new(records.clone()).with_embeddings(embeddings_for(&records));
	let h = harness(catalogue, HashEmbedding::failing(TEST_DIMENSIONS));
	let response = h
		.service
		.search(text_request("diabetes", SearchMode::Similarity))
		.await
		.expect("Search should degrade instead of failing.");

	assert_eq!(accessions(&response), vec!["GCST000003".to_string()]);
	assert_eq!(h.catalogue.fetch_strategies(), vec!["lexical"]);
	assert!(h.cache.entry("diabetes").is_none());
}

#[tokio::test]
async fn slow_vector_resolution_times_out_to_lexical() {
	let records = sample_records();
	let catalogue = MemoryCatalogue::new(records.clone()).with_embeddings(embeddings_for(&records));
	let h = harness(catalogue, HashEmbedding::stalling(TEST_DIMENSIONS, Duration::from_secs(5)));
	let response = tokio::time::timeout(
		Duration::from_secs(2),
		h.service.search(text_request("glucose", SearchMode::Similarity)),
	)
	.await
	.expect("Search did not honor the resolution timeout.")
	.expect("Search should degrade instead of failing.");

	assert_eq!(accessions(&response), vec!["GCST000004".to_string()]);
	assert_eq!(h.catalogue.fetch_strategies(), vec!["lexical"]);
}

#[tokio::test]
async fn missing_similarity_relation_reexecutes_lexically_and_reprobes() {
	let catalogue = MemoryCatalogue::new(sample_records())
		.reporting(Capabilities { vector_extension: true, study_embeddings: true });
	let h = harness(catalogue, HashEmbedding::new(TEST_DIMENSIONS));
	let response = h
		.service
		.search(text_request("coronary", SearchMode::Similarity))
		.await
		.expect("Search should degrade instead of failing.");

	assert_eq!(accessions(&response), vec!["GCST000005".to_string()]);
	assert!(response.items.iter().all(|item| item.similarity.is_none()));
	assert_eq!(response.source_count, 1);
	assert_eq!(h.catalogue.fetch_strategies(), vec!["similarity", "lexical"]);
	assert_eq!(h.catalogue.probe_count(), 1);

	h.service
		.search(text_request("coronary", SearchMode::Similarity))
		.await
		.expect("Search should degrade instead of failing.");

	assert_eq!(h.catalogue.probe_count(), 2);
}

#[tokio::test]
async fn full_candidate_set_is_truncated_when_every_candidate_is_filtered_out() {
	let records = sample_records()[..3].to_vec();

	for (candidates, truncated) in [(2, true), (10, false)] {
		let mut cfg = gwas_testkit::test_config();

		cfg.search.min_candidates = candidates;
		cfg.search.max_candidates = candidates;

		let catalogue =
			MemoryCatalogue::new(records.clone()).with_embeddings(embeddings_for(&records));
		let h = harness_with_config(cfg, catalogue, HashEmbedding::new(TEST_DIMENSIONS));
		let mut req = text_request("alzheimer", SearchMode::Similarity);

		req.trait_name = Some("Coronary artery disease".to_string());

		let response = h.service.search(req).await.expect("Similarity search failed.");

		assert!(response.items.is_empty());
		assert_eq!(response.truncated, truncated, "candidates {candidates}");
		assert_eq!(h.catalogue.fetch_strategies(), vec!["similarity"]);
	}
}
