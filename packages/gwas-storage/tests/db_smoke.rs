use time::{Duration, OffsetDateTime};

use gwas_config::Postgres;
use gwas_storage::{
	catalogue::{
		self, CatalogueQuery, OrderKey, PgVectorDialect, StudyFilters, StudyOrder, TextMatch,
	},
	db::Db,
	embedding_cache::{self, SweepPolicy},
};
use gwas_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres {
		dsn: test_db.dsn().to_string(),
		pool_max_conns: 1,
		statement_timeout_ms: 5_000,
	};
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

async fn insert_study(db: &Db, accession: &str, trait_name: &str, sample_size: &str, mlog: &str) {
	sqlx::query(
		"\
INSERT INTO gwas_catalog (
	study_accession, study, disease_trait, mapped_trait, snps, strongest_snp_risk_allele,
	initial_sample_size, p_value, pvalue_mlog
) VALUES ($1, $2, $3, $3, 'rs429358', 'rs429358-C', $4, '1E-10', $5)",
	)
	.bind(accession)
	.bind(format!("Genome-wide study of {trait_name}"))
	.bind(trait_name)
	.bind(sample_size)
	.bind(mlog)
	.execute(&db.pool)
	.await
	.expect("Failed to insert study.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GWAS_PG_DSN to run."]
async fn db_connects_and_bootstraps() {
	let Some(base_dsn) = gwas_testkit::env_dsn() else {
		eprintln!("Skipping db_connects_and_bootstraps; set GWAS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name IN ('gwas_catalog', 'embedding_cache')",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GWAS_PG_DSN to run."]
async fn lexical_scan_applies_numeric_filters() {
	let Some(base_dsn) = gwas_testkit::env_dsn() else {
		eprintln!("Skipping lexical_scan_applies_numeric_filters; set GWAS_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	insert_study(&db, "GCST000001", "Alzheimer's disease", "1,000 cases, 1,034 controls", "10").await;
	insert_study(&db, "GCST000002", "Alzheimer's disease", "12,500 European ancestry", "6").await;
	insert_study(&db, "GCST000003", "Type 2 diabetes", "80,000 individuals", "20").await;

	let query = CatalogueQuery {
		text: TextMatch::Lexical("ALZHEIMER".to_string()),
		filters: StudyFilters {
			min_sample_size: Some(2_000),
			..StudyFilters::default()
		},
		order: StudyOrder::default(),
		scan_limit: 100,
	};
	let page = catalogue::fetch_studies(&db.pool, &PgVectorDialect, &query)
		.await
		.expect("Failed to fetch studies.");
	let accessions =
		page.rows.iter().filter_map(|row| row.record.study_accession.as_deref()).collect::<Vec<_>>();

	assert_eq!(accessions, vec!["GCST000002"]);

	let query = CatalogueQuery {
		text: TextMatch::None,
		filters: StudyFilters { min_neg_log10_p: Some(8.0), ..StudyFilters::default() },
		order: StudyOrder::default(),
		scan_limit: 100,
	};
	let count = catalogue::count_studies(&db.pool, &PgVectorDialect, &query)
		.await
		.expect("Failed to count studies.");

	assert_eq!(count, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

async fn insert_raw(db: &Db, accession: &str, date: &str, sample_size: &str, p_value: &str) {
	sqlx::query(
		"\
INSERT INTO gwas_catalog (study_accession, \"date\", study, initial_sample_size, p_value, pvalue_mlog)
VALUES ($1, $2, $1, $3, $4, '')",
	)
	.bind(accession)
	.bind(date)
	.bind(sample_size)
	.bind(p_value)
	.execute(&db.pool)
	.await
	.expect("Failed to insert study.");
}

async fn scan_accessions(db: &Db, order: StudyOrder, filters: StudyFilters) -> Vec<String> {
	let query = CatalogueQuery { text: TextMatch::None, filters, order, scan_limit: 1 };
	let page = catalogue::fetch_studies(&db.pool, &PgVectorDialect, &query)
		.await
		.expect("Failed to fetch studies.");

	page.rows.into_iter().filter_map(|row| row.record.study_accession).collect()
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GWAS_PG_DSN to run."]
async fn scan_limit_applies_after_the_requested_order() {
	let Some(base_dsn) = gwas_testkit::env_dsn() else {
		eprintln!("Skipping scan_limit_applies_after_the_requested_order; set GWAS_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	insert_raw(&db, "GCST000001", "2001-01-01", "100 cases", "1E-3").await;
	insert_raw(&db, "GCST000002", "March 5, 2019", "90,000 individuals", "5 x 10^-8").await;
	insert_raw(&db, "GCST000003", "31/02/2021", "NR", "2 × 10−12").await;
	insert_raw(&db, "GCST000004", "12/11/2015", "4,000 cases", "not reported").await;

	let descending = |key| StudyOrder { key, descending: true };

	assert_eq!(
		scan_accessions(&db, descending(OrderKey::SampleSize), StudyFilters::default()).await,
		vec!["GCST000002"]
	);
	assert_eq!(
		scan_accessions(&db, descending(OrderKey::NegLog10P), StudyFilters::default()).await,
		vec!["GCST000003"]
	);
	// The impossible 31 February sorts with the undated rows.
	assert_eq!(
		scan_accessions(&db, descending(OrderKey::PublishedOn), StudyFilters::default()).await,
		vec!["GCST000002"]
	);
	assert_eq!(
		scan_accessions(
			&db,
			StudyOrder { key: OrderKey::PublishedOn, descending: false },
			StudyFilters::default()
		)
		.await,
		vec!["GCST000001"]
	);

	let significant = StudyFilters { min_neg_log10_p: Some(7.0), ..StudyFilters::default() };
	let count = catalogue::count_studies(
		&db.pool,
		&PgVectorDialect,
		&CatalogueQuery {
			text: TextMatch::None,
			filters: significant.clone(),
			order: StudyOrder::default(),
			scan_limit: 100,
		},
	)
	.await
	.expect("Failed to count studies.");

	assert_eq!(count, 2);
	assert_eq!(
		scan_accessions(&db, StudyOrder::default(), significant).await,
		vec!["GCST000002"]
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GWAS_PG_DSN to run."]
async fn similarity_without_vector_table_is_capability_missing() {
	let Some(base_dsn) = gwas_testkit::env_dsn() else {
		eprintln!("Skipping similarity_without_vector_table_is_capability_missing; set GWAS_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let capabilities = db.probe_capabilities().await.expect("Failed to probe capabilities.");

	assert!(!capabilities.study_embeddings);

	let query = CatalogueQuery {
		text: TextMatch::Similarity { vector: vec![0.1; 4], candidate_limit: 1_000 },
		filters: StudyFilters::default(),
		order: StudyOrder::default(),
		scan_limit: 100,
	};
	let err = catalogue::fetch_studies(&db.pool, &PgVectorDialect, &query)
		.await
		.expect_err("Expected a capability error.");

	assert!(matches!(err, gwas_storage::Error::CapabilityMissing(_)), "Unexpected error: {err:?}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set GWAS_PG_DSN to run."]
async fn cache_sweep_removes_idle_and_unpopular_entries() {
	let Some(base_dsn) = gwas_testkit::env_dsn() else {
		eprintln!("Skipping cache_sweep_removes_idle_and_unpopular_entries; set GWAS_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();

	embedding_cache::upsert(&db.pool, "idle", &[1.0, 0.0], now - Duration::days(40))
		.await
		.expect("Failed to upsert cache entry.");
	embedding_cache::upsert(&db.pool, "fresh", &[0.0, 1.0], now).await.expect("Failed to upsert.");

	let hit = embedding_cache::fetch(&db.pool, "fresh").await.expect("Failed to fetch.");

	assert_eq!(hit.map(|entry| entry.vector), Some(vec![0.0, 1.0]));

	let removed = embedding_cache::sweep(
		&db.pool,
		SweepPolicy {
			max_idle: Duration::days(30),
			max_age: Duration::days(90),
			min_access_count: 3,
		},
		now,
	)
	.await
	.expect("Failed to sweep cache.");

	assert_eq!(removed, 1);
	assert!(embedding_cache::fetch(&db.pool, "idle").await.expect("Failed to fetch.").is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
