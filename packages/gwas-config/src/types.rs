use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
	pub cache: Cache,
	#[serde(default)]
	pub quality: Quality,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub vectors: Vectors,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	#[serde(default = "default_statement_timeout_ms")]
	pub statement_timeout_ms: u64,
}

/// Layout of the optional `study_embeddings` similarity table.
#[derive(Debug, Deserialize)]
pub struct Vectors {
	pub dimensions: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	/// Optional. Task prefix prepended to search queries, e.g. "search_query: ".
	#[serde(default)]
	pub query_prefix: Option<String>,
	/// Optional. Task prefix prepended to catalogue text during backfill.
	#[serde(default)]
	pub document_prefix: Option<String>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
	pub max_scan_rows: u32,
	#[serde(default = "default_min_candidates")]
	pub min_candidates: u32,
	#[serde(default = "default_max_candidates")]
	pub max_candidates: u32,
	#[serde(default = "default_candidate_multiplier")]
	pub candidate_multiplier: u32,
	#[serde(default = "default_filtered_candidate_multiplier")]
	pub filtered_candidate_multiplier: u32,
	#[serde(default = "default_capability_ttl_seconds")]
	pub capability_ttl_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	#[serde(default = "default_memory_capacity")]
	pub memory_capacity: usize,
	pub max_age_days: i64,
	pub max_idle_days: i64,
	pub min_access_count: i64,
	pub sweep_interval_seconds: u64,
}

/// Optional overrides for the quality classifier cutoffs. Unset fields keep the defaults defined
/// next to the classifier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Quality {
	pub small_cohort_size: Option<u64>,
	pub suggestive_p_value: Option<f64>,
	pub compensating_cohort_size: Option<u64>,
	pub high_min_sample_size: Option<u64>,
	pub high_min_neg_log10_p: Option<f64>,
	pub high_max_p_value: Option<f64>,
	pub medium_min_sample_size: Option<u64>,
	pub medium_min_neg_log10_p: Option<f64>,
	pub medium_max_p_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub backfill_enabled: bool,
	pub backfill_batch_size: u32,
	pub poll_interval_ms: u64,
}
impl Default for Worker {
	fn default() -> Self {
		Self { backfill_enabled: false, backfill_batch_size: 256, poll_interval_ms: 5_000 }
	}
}

fn default_memory_capacity() -> usize {
	100
}

fn default_statement_timeout_ms() -> u64 {
	10_000
}

fn default_min_candidates() -> u32 {
	1_000
}

fn default_max_candidates() -> u32 {
	10_000
}

fn default_candidate_multiplier() -> u32 {
	10
}

fn default_filtered_candidate_multiplier() -> u32 {
	50
}

fn default_capability_ttl_seconds() -> u64 {
	300
}
