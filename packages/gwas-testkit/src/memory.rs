//! In-memory stand-ins for the catalogue and the durable embedding cache. Predicates mirror the
//! SQL the Postgres store compiles, using the same parsers.

use std::{
	cmp::Ordering as CmpOrdering,
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use time::OffsetDateTime;

use gwas_domain::{genotype, parse};
use gwas_service::{BoxFuture, CatalogueStore, EmbeddingCacheStore};
use gwas_storage::{
	Error as StorageError,
	catalogue::{CatalogueQuery, OrderKey, StudyFilters, StudyOrder, TextMatch},
	db::Capabilities,
	embedding_cache::SweepPolicy,
	models::{StudyPage, StudyRecord, StudyRow},
};

pub struct MemoryCatalogue {
	records: Vec<StudyRecord>,
	/// `None` behaves like a database without `study_embeddings`.
	embeddings: Option<HashMap<i64, Vec<f32>>>,
	reported: Capabilities,
	fail_fetch: AtomicBool,
	fail_count: AtomicBool,
	fetches: Mutex<Vec<&'static str>>,
	probes: AtomicUsize,
}
impl MemoryCatalogue {
	pub fn new(records: Vec<StudyRecord>) -> Self {
		Self {
			records,
			embeddings: None,
			reported: Capabilities::default(),
			fail_fetch: AtomicBool::new(false),
			fail_count: AtomicBool::new(false),
			fetches: Mutex::new(Vec::new()),
			probes: AtomicUsize::new(0),
		}
	}

	pub fn with_embeddings(mut self, embeddings: HashMap<i64, Vec<f32>>) -> Self {
		self.embeddings = Some(embeddings);
		self.reported = Capabilities { vector_extension: true, study_embeddings: true };

		self
	}

	/// Overrides what the capability probe reports, e.g. to claim similarity support the store
	/// cannot honor.
	pub fn reporting(mut self, capabilities: Capabilities) -> Self {
		self.reported = capabilities;

		self
	}

	/// While set, every fetch fails like a timed-out statement.
	pub fn set_fetch_failure(&self, fail: bool) {
		self.fail_fetch.store(fail, Ordering::SeqCst);
	}

	pub fn set_count_failure(&self, fail: bool) {
		self.fail_count.store(fail, Ordering::SeqCst);
	}

	/// Strategy of every fetch, in call order.
	pub fn fetch_strategies(&self) -> Vec<&'static str> {
		self.fetches.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn probe_count(&self) -> usize {
		self.probes.load(Ordering::SeqCst)
	}

	fn evaluate(&self, query: &CatalogueQuery) -> gwas_storage::Result<StudyPage> {
		match &query.text {
			TextMatch::Similarity { vector, candidate_limit } => {
				let Some(embeddings) = &self.embeddings else {
					return Err(StorageError::CapabilityMissing(
						"relation \"study_embeddings\" does not exist".to_string(),
					));
				};
				let mut candidates = self
					.records
					.iter()
					.filter_map(|record| {
						embeddings
							.get(&record.id)
							.map(|embedding| (cosine_distance(vector, embedding), record))
					})
					.collect::<Vec<_>>();

				candidates.sort_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)));
				candidates.truncate(*candidate_limit as usize);

				let candidate_count = candidates.len() as u64;
				let rows = candidates
					.into_iter()
					.filter(|(_, record)| matches_filters(record, &query.filters))
					.map(|(distance, record)| StudyRow {
						record: record.clone(),
						distance: Some(distance),
						candidate_count: Some(candidate_count as i64),
					})
					.collect();

				Ok(StudyPage { rows, candidate_count: Some(candidate_count) })
			},
			TextMatch::Lexical(text) => {
				let needle = text.trim().to_lowercase();
				let rows = self.relational(query, |record| matches_text(record, &needle));

				Ok(StudyPage { rows, candidate_count: None })
			},
			TextMatch::None =>
				Ok(StudyPage { rows: self.relational(query, |_| true), candidate_count: None }),
		}
	}

	fn relational(
		&self,
		query: &CatalogueQuery,
		text_predicate: impl Fn(&StudyRecord) -> bool,
	) -> Vec<StudyRow> {
		let mut records = self
			.records
			.iter()
			.filter(|&record| text_predicate(record) && matches_filters(record, &query.filters))
			.collect::<Vec<_>>();

		records.sort_by(|a, b| compare_records(a, b, query.order));

		records
			.into_iter()
			.map(|record| StudyRow { record: record.clone(), distance: None, candidate_count: None })
			.collect()
	}
}

impl CatalogueStore for MemoryCatalogue {
	fn fetch<'a>(
		&'a self,
		query: &'a CatalogueQuery,
	) -> BoxFuture<'a, gwas_storage::Result<StudyPage>> {
		self.fetches.lock().unwrap_or_else(|err| err.into_inner()).push(query.text.strategy());

		let result = if self.fail_fetch.load(Ordering::SeqCst) {
			Err(StorageError::Timeout)
		} else {
			self.evaluate(query).map(|mut page| {
				page.rows.truncate(query.scan_limit as usize);

				page
			})
		};

		Box::pin(async move { result })
	}

	fn count<'a>(&'a self, query: &'a CatalogueQuery) -> BoxFuture<'a, gwas_storage::Result<u64>> {
		let result = if self.fail_count.load(Ordering::SeqCst) {
			Err(StorageError::InvalidArgument("count unavailable".to_string()))
		} else {
			self.evaluate(query).map(|page| page.rows.len() as u64)
		};

		Box::pin(async move { result })
	}

	fn capabilities(&self) -> BoxFuture<'_, gwas_storage::Result<Capabilities>> {
		self.probes.fetch_add(1, Ordering::SeqCst);

		let reported = self.reported;

		Box::pin(async move { Ok(reported) })
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryEntry {
	pub vector: Vec<f32>,
	pub created_at: OffsetDateTime,
	pub last_accessed_at: OffsetDateTime,
	pub access_count: i64,
}

#[derive(Default)]
pub struct MemoryEmbeddingStore {
	entries: Mutex<HashMap<String, MemoryEntry>>,
	failing: AtomicBool,
	reads: AtomicUsize,
}
impl MemoryEmbeddingStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// While set, every operation fails like an unreachable database.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn reads(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	pub fn entry(&self, key: &str) -> Option<MemoryEntry> {
		self.lock().get(key).cloned()
	}

	pub fn insert_entry(&self, key: &str, entry: MemoryEntry) {
		self.lock().insert(key.to_string(), entry);
	}

	fn check(&self) -> gwas_storage::Result<()> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(StorageError::Timeout);
		}

		Ok(())
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner())
	}
}

impl EmbeddingCacheStore for MemoryEmbeddingStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, gwas_storage::Result<Option<Vec<f32>>>> {
		self.reads.fetch_add(1, Ordering::SeqCst);

		let result = self.check().map(|()| self.lock().get(key).map(|entry| entry.vector.clone()));

		Box::pin(async move { result })
	}

	fn touch<'a>(
		&'a self,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, gwas_storage::Result<()>> {
		let result = self.check().map(|()| {
			if let Some(entry) = self.lock().get_mut(key) {
				entry.last_accessed_at = now;
				entry.access_count += 1;
			}
		});

		Box::pin(async move { result })
	}

	fn upsert<'a>(
		&'a self,
		key: &'a str,
		vector: &'a [f32],
		now: OffsetDateTime,
	) -> BoxFuture<'a, gwas_storage::Result<()>> {
		let result = self.check().map(|()| {
			let mut entries = self.lock();

			match entries.get_mut(key) {
				Some(entry) => {
					entry.vector = vector.to_vec();
					entry.last_accessed_at = now;
				},
				None => {
					entries.insert(
						key.to_string(),
						MemoryEntry {
							vector: vector.to_vec(),
							created_at: now,
							last_accessed_at: now,
							access_count: 0,
						},
					);
				},
			}
		});

		Box::pin(async move { result })
	}

	fn sweep(
		&self,
		policy: SweepPolicy,
		now: OffsetDateTime,
	) -> BoxFuture<'_, gwas_storage::Result<u64>> {
		let result = self.check().map(|()| {
			let idle_cutoff = now - policy.max_idle;
			let age_cutoff = now - policy.max_age;
			let mut entries = self.lock();
			let before = entries.len();

			entries.retain(|_, entry| {
				!(entry.last_accessed_at < idle_cutoff
					|| (entry.created_at < age_cutoff
						&& entry.access_count < policy.min_access_count))
			});

			(before - entries.len()) as u64
		});

		Box::pin(async move { result })
	}
}

fn matches_text(record: &StudyRecord, needle: &str) -> bool {
	[
		&record.study,
		&record.disease_trait,
		&record.mapped_trait,
		&record.first_author,
		&record.mapped_gene,
		&record.study_accession,
		&record.snps,
	]
	.into_iter()
	.flatten()
	.any(|value| value.to_lowercase().contains(needle))
}

fn matches_filters(record: &StudyRecord, filters: &StudyFilters) -> bool {
	if let Some(trait_name) = &filters.trait_name {
		let wanted = trait_name.to_lowercase();
		let matches = [&record.disease_trait, &record.mapped_trait]
			.into_iter()
			.flatten()
			.any(|value| value.to_lowercase() == wanted);

		if !matches {
			return false;
		}
	}
	if let Some(min_sample_size) = filters.min_sample_size {
		let sample_size = record.initial_sample_size.as_deref().and_then(parse::parse_sample_size);

		if sample_size.is_none_or(|sample_size| sample_size < min_sample_size) {
			return false;
		}
	}
	if let Some(min_neg_log10_p) = filters.min_neg_log10_p {
		if neg_log10_p(record).is_none_or(|neg_log10_p| neg_log10_p < min_neg_log10_p) {
			return false;
		}
	}
	if filters.require_genotype
		&& !genotype::has_usable_genotype(
			record.snps.as_deref(),
			record.strongest_snp_risk_allele.as_deref(),
		) {
		return false;
	}

	true
}

fn neg_log10_p(record: &StudyRecord) -> Option<f64> {
	record
		.pvalue_mlog
		.as_deref()
		.and_then(parse::parse_neg_log10)
		.or_else(|| record.p_value.as_deref().and_then(parse::neg_log10_from_p_text))
}

/// Same ordering as the Postgres scan: nulls last in either direction, then ascending id.
fn compare_records(a: &StudyRecord, b: &StudyRecord, order: StudyOrder) -> CmpOrdering {
	let descending = order.descending;
	let by_key = match order.key {
		OrderKey::Id if descending => return b.id.cmp(&a.id),
		OrderKey::Id => return a.id.cmp(&b.id),
		OrderKey::NegLog10P =>
			nulls_last(neg_log10_p(a), neg_log10_p(b), descending, |x, y| x.total_cmp(y)),
		OrderKey::SampleSize => {
			let sample_size = |record: &StudyRecord| {
				record.initial_sample_size.as_deref().and_then(parse::parse_sample_size)
			};

			nulls_last(sample_size(a), sample_size(b), descending, Ord::cmp)
		},
		OrderKey::PublishedOn => {
			let published_on =
				|record: &StudyRecord| record.date.as_deref().and_then(parse::parse_publication_date);

			nulls_last(published_on(a), published_on(b), descending, Ord::cmp)
		},
		OrderKey::Title => {
			let title = |record: &StudyRecord| {
				record
					.study
					.as_deref()
					.map(str::trim)
					.filter(|title| !title.is_empty())
					.map(str::to_lowercase)
			};

			nulls_last(title(a), title(b), descending, Ord::cmp)
		},
	};

	by_key.then(a.id.cmp(&b.id))
}

fn nulls_last<T>(
	a: Option<T>,
	b: Option<T>,
	descending: bool,
	cmp: impl Fn(&T, &T) -> CmpOrdering,
) -> CmpOrdering {
	match (a, b) {
		(Some(a), Some(b)) if descending => cmp(&b, &a),
		(Some(a), Some(b)) => cmp(&a, &b),
		(Some(_), None) => CmpOrdering::Less,
		(None, Some(_)) => CmpOrdering::Greater,
		(None, None) => CmpOrdering::Equal,
	}
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
	let dot = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum::<f64>();
	let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
	let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	1.0 - dot / (norm_a * norm_b)
}
