use std::sync::Arc;

use gwas_domain::quality::ConfidenceBand;
use gwas_service::{Error, FilterRequest, ParsedStudy, VariantMatcher};
use gwas_storage::models::StudyRecord;
use gwas_testkit::{HashEmbedding, MemoryCatalogue, TEST_DIMENSIONS};

use super::{accessions, harness};

struct GeneMatcher(&'static str);
impl VariantMatcher for GeneMatcher {
	fn matches(&self, study: &ParsedStudy) -> bool {
		study.record.mapped_gene.as_deref() == Some(self.0)
	}
}

fn mixed_quality_records() -> Vec<StudyRecord> {
	let mut small = gwas_testkit::study_record(1, "GCST100001", "Pilot asthma scan", "Asthma");

	small.initial_sample_size = Some("312 cases, 150 controls".to_string());

	let mut medium = gwas_testkit::study_record(2, "GCST100002", "Asthma in children", "Asthma");

	medium.initial_sample_size = Some("3,100 European ancestry children".to_string());
	medium.p_value = Some("4E-8".to_string());
	medium.pvalue_mlog = Some("7.397940008672037".to_string());
	medium.mapped_gene = Some("IL33".to_string());

	let high = gwas_testkit::study_record(3, "GCST100003", "Adult-onset asthma", "Asthma");
	let mut no_genotype =
		gwas_testkit::study_record(4, "GCST100004", "Asthma exacerbations", "Asthma");

	no_genotype.snps = Some("NR".to_string());
	no_genotype.strongest_snp_risk_allele = Some("rs1004-?".to_string());

	let mut no_sample_size = gwas_testkit::study_record(5, "GCST100005", "Severe asthma", "Asthma");

	no_sample_size.initial_sample_size = Some("NR".to_string());

	vec![small, medium, high, no_genotype, no_sample_size]
}

fn asthma() -> FilterRequest {
	FilterRequest { trait_name: Some("asthma".to_string()), ..FilterRequest::default() }
}

#[tokio::test]
async fn low_quality_and_ungenotyped_studies_are_excluded_by_default() {
	let h = harness(
		MemoryCatalogue::new(mixed_quality_records()),
		HashEmbedding::new(TEST_DIMENSIONS),
	);
	let response = h.service.search(asthma()).await.expect("Search failed.");
	let mut found = accessions(&response);

	found.sort();

	assert_eq!(found, vec!["GCST100002", "GCST100003", "GCST100005"]);
	assert_eq!(response.source_count, 4);
	assert_eq!(response.total, 3);
}

#[tokio::test]
async fn opting_out_keeps_flagged_studies() {
	let h = harness(
		MemoryCatalogue::new(mixed_quality_records()),
		HashEmbedding::new(TEST_DIMENSIONS),
	);
	let req = FilterRequest {
		exclude_low_quality: Some(false),
		exclude_missing_genotype: Some(false),
		..asthma()
	};
	let response = h.service.search(req).await.expect("Search failed.");

	assert_eq!(response.total, 5);

	let small = response
		.items
		.iter()
		.find(|item| item.record.id == 1)
		.expect("Expected the small study.");

	assert!(small.low_quality);
	assert_eq!(small.confidence, ConfidenceBand::Low);
	assert!(small.quality_flags.iter().any(|flag| flag.message == "Very small cohort."));

	let ungenotyped = response
		.items
		.iter()
		.find(|item| item.record.id == 4)
		.expect("Expected the ungenotyped study.");

	assert!(!ungenotyped.stats.usable_genotype);
}

#[tokio::test]
async fn confidence_band_and_numeric_thresholds_narrow_results() {
	let h = harness(
		MemoryCatalogue::new(mixed_quality_records()),
		HashEmbedding::new(TEST_DIMENSIONS),
	);
	let medium = h
		.service
		.search(FilterRequest { confidence_band: Some(ConfidenceBand::Medium), ..asthma() })
		.await
		.expect("Search failed.");

	// Study 5 reaches medium on significance alone.
	assert_eq!(accessions(&medium), vec!["GCST100005", "GCST100002"]);

	let strong = h
		.service
		.search(FilterRequest { min_log_p: Some(9.0), min_sample_size: Some(5_000), ..asthma() })
		.await
		.expect("Search failed.");

	assert_eq!(accessions(&strong), vec!["GCST100003"]);

	let by_p = h
		.service
		.search(FilterRequest { max_p_value: Some(5e-8), ..asthma() })
		.await
		.expect("Search failed.");

	assert_eq!(by_p.total, 3);
}

#[tokio::test]
async fn variant_matcher_post_filters_results() {
	let h = harness(
		MemoryCatalogue::new(mixed_quality_records()),
		HashEmbedding::new(TEST_DIMENSIONS),
	);
	let service = h.service.with_variant_matcher(Arc::new(GeneMatcher("IL33")));
	let response = service.search(asthma()).await.expect("Search failed.");

	assert_eq!(accessions(&response), vec!["GCST100002"]);
	assert_eq!(response.source_count, 4);
}

#[tokio::test]
async fn conflicting_significance_thresholds_are_rejected() {
	let h = harness(
		MemoryCatalogue::new(mixed_quality_records()),
		HashEmbedding::new(TEST_DIMENSIONS),
	);
	let err = h
		.service
		.search(FilterRequest { max_p_value: Some(1e-8), min_log_p: Some(8.0), ..asthma() })
		.await
		.expect_err("Expected a validation error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(h.catalogue.fetch_strategies().is_empty());
}
