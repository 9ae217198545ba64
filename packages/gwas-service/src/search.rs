pub mod assemble;
pub mod plan;

use serde::{Deserialize, Serialize};
use time::Date;

use gwas_domain::{
	parse::Effect,
	quality::{ConfidenceBand, QualityFlag},
};
use gwas_storage::{
	catalogue::{CatalogueQuery, TextMatch},
	models::{StudyPage, StudyRecord, StudyRow},
};

use crate::{Error, GwasService, Result};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	#[default]
	Similarity,
	Exact,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
	/// Statistical strength, `-log10(p)`.
	#[default]
	Relevance,
	/// Initial cohort size.
	Power,
	/// Publication date.
	Recent,
	/// Study title, case-insensitive.
	Alphabetical,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
	Asc,
	#[default]
	Desc,
}

/// Caller-facing retrieval request. Absent fields take the service defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FilterRequest {
	#[serde(default, alias = "q")]
	pub query: Option<String>,
	#[serde(default, rename = "trait")]
	pub trait_name: Option<String>,
	#[serde(default)]
	pub search_mode: Option<SearchMode>,
	#[serde(default)]
	pub min_sample_size: Option<u64>,
	#[serde(default)]
	pub max_p_value: Option<f64>,
	#[serde(default)]
	pub min_log_p: Option<f64>,
	#[serde(default)]
	pub exclude_low_quality: Option<bool>,
	#[serde(default)]
	pub exclude_missing_genotype: Option<bool>,
	#[serde(default)]
	pub confidence_band: Option<ConfidenceBand>,
	#[serde(default)]
	pub sort: Option<SortKey>,
	#[serde(default)]
	pub direction: Option<SortDirection>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: Option<u32>,
}

/// Values derived from the free-text columns of a catalogue row. Unparseable fields are null.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StudyStats {
	pub sample_size: Option<u64>,
	pub p_value: Option<f64>,
	pub neg_log10_p: Option<f64>,
	#[serde(with = "crate::time_serde::option")]
	pub published_on: Option<Date>,
	pub effect: Option<Effect>,
	pub usable_genotype: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedStudy {
	#[serde(flatten)]
	pub record: StudyRecord,
	pub stats: StudyStats,
	/// Cosine similarity to the query in `[0, 1]`, only on the similarity path.
	pub similarity: Option<f64>,
	pub quality_flags: Vec<QualityFlag>,
	pub confidence: ConfidenceBand,
	pub low_quality: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub items: Vec<ParsedStudy>,
	/// Quality-filtered matches within the scanned rows.
	pub total: u64,
	pub limit: u32,
	pub offset: u32,
	/// Matches may exist beyond the scanned rows.
	pub truncated: bool,
	/// Rows matching the store predicates before quality post-filtering.
	pub source_count: u64,
}

/// Black-box genotype predicate supplied by the host.
pub trait VariantMatcher
where
	Self: Send + Sync,
{
	fn matches(&self, study: &ParsedStudy) -> bool;
}

/// A request after defaults, clamping, and validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedRequest {
	pub text: Option<String>,
	pub trait_name: Option<String>,
	pub mode: SearchMode,
	pub min_sample_size: Option<u64>,
	pub min_neg_log10_p: Option<f64>,
	pub exclude_low_quality: bool,
	pub require_genotype: bool,
	pub confidence_band: Option<ConfidenceBand>,
	pub sort: SortKey,
	pub direction: SortDirection,
	pub limit: u32,
	pub offset: u32,
}
impl ValidatedRequest {
	/// Rows needed to serve the requested page.
	pub fn depth(&self) -> u32 {
		self.offset.saturating_add(self.limit)
	}
}

pub fn validate(cfg: &gwas_config::Search, req: FilterRequest) -> Result<ValidatedRequest> {
	if req.max_p_value.is_some() && req.min_log_p.is_some() {
		return Err(Error::InvalidRequest {
			message: "max_p_value and min_log_p are mutually exclusive.".to_string(),
		});
	}
	if let Some(max_p_value) = req.max_p_value
		&& !(max_p_value > 0.0 && max_p_value <= 1.0)
	{
		return Err(Error::InvalidRequest {
			message: "max_p_value must be in the range (0, 1].".to_string(),
		});
	}
	if let Some(min_log_p) = req.min_log_p
		&& (!min_log_p.is_finite() || min_log_p < 0.0)
	{
		return Err(Error::InvalidRequest {
			message: "min_log_p must be a finite number, zero or greater.".to_string(),
		});
	}

	let min_neg_log10_p = req.min_log_p.or_else(|| req.max_p_value.map(|p| -p.log10()));

	Ok(ValidatedRequest {
		text: non_blank(req.query),
		trait_name: non_blank(req.trait_name),
		mode: req.search_mode.unwrap_or_default(),
		min_sample_size: req.min_sample_size,
		min_neg_log10_p,
		exclude_low_quality: req.exclude_low_quality.unwrap_or(true),
		require_genotype: req.exclude_missing_genotype.unwrap_or(true),
		confidence_band: req.confidence_band,
		sort: req.sort.unwrap_or_default(),
		direction: req.direction.unwrap_or_default(),
		limit: req.limit.unwrap_or(cfg.default_limit).clamp(1, cfg.max_limit),
		offset: req.offset.unwrap_or(0),
	})
}

impl GwasService {
	pub async fn search(&self, req: FilterRequest) -> Result<SearchResponse> {
		let request = validate(&self.cfg.search, req)?;
		let filters = plan::filters(&request);
		let query = CatalogueQuery {
			text: self.plan_text_match(&request, filters.has_numeric_filter()).await,
			filters,
			order: plan::order(request.sort, request.direction),
			scan_limit: self.cfg.search.max_scan_rows,
		};
		let execution = self.execute(query, request.text.as_deref()).await?;
		let similarity_ordered = matches!(execution.query.text, TextMatch::Similarity { .. });
		let truncated = execution.truncated();
		let page = assemble::assemble(
			&self.policy,
			&request,
			execution.rows,
			similarity_ordered,
			self.variant_matcher.as_deref(),
		);

		tracing::info!(
			strategy = execution.query.text.strategy(),
			degraded = execution.degraded,
			source_count = execution.source_count,
			total = page.total,
			returned = page.items.len(),
			truncated,
			"Study search completed."
		);

		Ok(SearchResponse {
			items: page.items,
			total: page.total,
			limit: request.limit,
			offset: request.offset,
			truncated,
			source_count: execution.source_count,
		})
	}

	async fn plan_text_match(&self, request: &ValidatedRequest, numeric_filter: bool) -> TextMatch {
		let Some(text) = request.text.as_deref() else {
			return TextMatch::None;
		};

		if request.mode == SearchMode::Exact {
			return TextMatch::Lexical(text.to_string());
		}
		if !self.capabilities.similarity_available(self.catalogue.as_ref()).await {
			tracing::debug!(strategy = "lexical", "Similarity search unavailable.");

			return TextMatch::Lexical(text.to_string());
		}

		match self.resolver.resolve(text).await {
			Ok(vector) => TextMatch::Similarity {
				vector,
				candidate_limit: plan::candidate_limit(
					&self.cfg.search,
					request.depth(),
					numeric_filter,
				),
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					strategy = "lexical",
					"Vector resolution failed. Falling back to lexical matching."
				);

				TextMatch::Lexical(text.to_string())
			},
		}
	}

	async fn execute(&self, query: CatalogueQuery, text: Option<&str>) -> Result<Execution> {
		let (page, count) = tokio::join!(self.catalogue.fetch(&query), self.catalogue.count(&query));
		let fallback_text = match &query.text {
			TextMatch::Similarity { .. } => text,
			TextMatch::None | TextMatch::Lexical(_) => None,
		};

		match (page, fallback_text) {
			(Err(gwas_storage::Error::CapabilityMissing(detail)), Some(text)) => {
				tracing::warn!(
					detail = %detail,
					degraded = true,
					"Similarity stage failed. Re-executing lexically."
				);

				self.capabilities.invalidate();

				let query = query.into_lexical(text);
				let (page, count) =
					tokio::join!(self.catalogue.fetch(&query), self.catalogue.count(&query));

				Ok(Execution::new(query, page?, count, true))
			},
			(page, _) => Ok(Execution::new(query, page?, count, false)),
		}
	}
}

struct Execution {
	query: CatalogueQuery,
	rows: Vec<StudyRow>,
	candidate_count: Option<u64>,
	source_count: u64,
	degraded: bool,
}
impl Execution {
	fn new(
		query: CatalogueQuery,
		page: StudyPage,
		count: gwas_storage::Result<u64>,
		degraded: bool,
	) -> Self {
		let StudyPage { rows, candidate_count } = page;
		let source_count = match count {
			Ok(count) => count,
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Source count query failed. Using the fetched row count."
				);

				rows.len() as u64
			},
		};

		Self { query, rows, candidate_count, source_count, degraded }
	}

	fn truncated(&self) -> bool {
		if self.rows.len() >= self.query.scan_limit as usize {
			return true;
		}

		match &self.query.text {
			TextMatch::Similarity { candidate_limit, .. } => self
				.candidate_count
				.is_some_and(|count| count >= u64::from(*candidate_limit)),
			TextMatch::None | TextMatch::Lexical(_) => false,
		}
	}
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
