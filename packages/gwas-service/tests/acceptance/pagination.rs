use std::collections::HashSet;

use gwas_service::{FilterRequest, SortDirection, SortKey};
use gwas_storage::models::StudyRecord;
use gwas_testkit::{HashEmbedding, MemoryCatalogue, TEST_DIMENSIONS};

use super::{accessions, harness, harness_with_config, sample_records};

fn cohort_records(count: i64) -> Vec<StudyRecord> {
	(1..=count)
		.map(|id| {
			let mut record = gwas_testkit::study_record(
				id,
				&format!("GCST{id:06}"),
				&format!("Height study {id}"),
				"Body height",
			);

			// Repeating sizes force id tie-breaks.
			record.initial_sample_size = Some(format!("{} individuals", 5_000 + (id % 7) * 1_000));

			record
		})
		.collect()
}

fn page(sort: SortKey, limit: u32, offset: u32) -> FilterRequest {
	FilterRequest {
		sort: Some(sort),
		direction: Some(SortDirection::Desc),
		limit: Some(limit),
		offset: Some(offset),
		..FilterRequest::default()
	}
}

#[tokio::test]
async fn consecutive_pages_tile_a_single_large_page() {
	let h = harness(MemoryCatalogue::new(cohort_records(120)), HashEmbedding::new(TEST_DIMENSIONS));
	let first = h.service.search(page(SortKey::Power, 50, 0)).await.expect("Search failed.");
	let second = h.service.search(page(SortKey::Power, 50, 50)).await.expect("Search failed.");
	let whole = h.service.search(page(SortKey::Power, 100, 0)).await.expect("Search failed.");
	let mut tiled = accessions(&first);

	tiled.extend(accessions(&second));

	assert_eq!(tiled.len(), 100);
	assert_eq!(tiled.iter().collect::<HashSet<_>>().len(), 100);
	assert_eq!(tiled, accessions(&whole));
	assert_eq!(first.total, 120);
	assert_eq!(second.offset, 50);
}

#[tokio::test]
async fn repeated_requests_return_identical_pages() {
	let h = harness(MemoryCatalogue::new(cohort_records(60)), HashEmbedding::new(TEST_DIMENSIONS));
	let once = h.service.search(page(SortKey::Power, 20, 20)).await.expect("Search failed.");
	let again = h.service.search(page(SortKey::Power, 20, 20)).await.expect("Search failed.");

	assert_eq!(accessions(&once), accessions(&again));
}

#[tokio::test]
async fn undated_studies_sort_last_in_both_directions() {
	let mut records = sample_records();

	records[0].date = None;
	records[1].date = Some("2015-03-02".to_string());
	records[2].date = Some("not a date".to_string());
	records[3].date = Some("2021-11-30".to_string());
	records[4].date = Some("2018-07-15".to_string());

	let h = harness(MemoryCatalogue::new(records), HashEmbedding::new(TEST_DIMENSIONS));

	for (direction, dated) in [
		(SortDirection::Desc, ["GCST000004", "GCST000005", "GCST000002"]),
		(SortDirection::Asc, ["GCST000002", "GCST000005", "GCST000004"]),
	] {
		let req = FilterRequest {
			sort: Some(SortKey::Recent),
			direction: Some(direction),
			..FilterRequest::default()
		};
		let response = h.service.search(req).await.expect("Search failed.");
		let mut expected = dated.iter().map(|accession| accession.to_string()).collect::<Vec<_>>();

		expected.extend(["GCST000001".to_string(), "GCST000003".to_string()]);

		assert_eq!(accessions(&response), expected);
	}
}

#[tokio::test]
async fn reaching_the_scan_limit_marks_the_page_truncated() {
	let mut cfg = gwas_testkit::test_config();

	cfg.search.max_scan_rows = 30;

	let h = harness_with_config(
		cfg,
		MemoryCatalogue::new(cohort_records(45)),
		HashEmbedding::new(TEST_DIMENSIONS),
	);
	let response = h.service.search(page(SortKey::Relevance, 10, 0)).await.expect("Search failed.");

	assert!(response.truncated);
	assert_eq!(response.total, 30);
	assert_eq!(response.source_count, 45);

	let short = h
		.service
		.search(FilterRequest {
			query: Some("Height study 4".to_string()),
			..page(SortKey::Relevance, 10, 0)
		})
		.await
		.expect("Search failed.");

	assert!(!short.truncated);
}

/// Every sortable field rises with the id, so the best row in any descending order is the last
/// one inserted.
fn rising_records(count: i64) -> Vec<StudyRecord> {
	(1..=count)
		.map(|id| {
			let mut record = gwas_testkit::study_record(
				id,
				&format!("GCST{id:06}"),
				&format!("Study {}", char::from(b'a' + id as u8)),
				"Body height",
			);

			record.initial_sample_size = Some(format!("{} individuals", id * 1_000));
			record.date = Some(format!("{}-03-01", 2000 + id));
			record.pvalue_mlog = None;
			record.p_value = Some(format!("1 x 10^-{}", 6 + id));

			record
		})
		.collect()
}

#[tokio::test]
async fn scan_limit_keeps_the_top_of_the_requested_order() {
	let mut cfg = gwas_testkit::test_config();

	cfg.search.max_scan_rows = 4;

	let h = harness_with_config(
		cfg,
		MemoryCatalogue::new(rising_records(10)),
		HashEmbedding::new(TEST_DIMENSIONS),
	);

	for sort in [SortKey::Relevance, SortKey::Power, SortKey::Recent, SortKey::Alphabetical] {
		let response = h.service.search(page(sort, 1, 0)).await.expect("Search failed.");

		assert_eq!(accessions(&response), vec!["GCST000010".to_string()], "{sort:?}");
		assert!(response.truncated);
		assert_eq!(response.total, 4);
		assert_eq!(response.source_count, 10);
	}

	let ascending = h
		.service
		.search(FilterRequest { direction: Some(SortDirection::Asc), ..page(SortKey::Power, 4, 0) })
		.await
		.expect("Search failed.");

	assert_eq!(accessions(&ascending), ["GCST000001", "GCST000002", "GCST000003", "GCST000004"]);
}

#[tokio::test]
async fn count_failure_reports_fetched_rows() {
	let h = harness(MemoryCatalogue::new(cohort_records(12)), HashEmbedding::new(TEST_DIMENSIONS));

	h.catalogue.set_count_failure(true);

	let response = h.service.search(page(SortKey::Power, 5, 0)).await.expect("Search failed.");

	assert_eq!(response.source_count, 12);
	assert_eq!(response.items.len(), 5);
}
