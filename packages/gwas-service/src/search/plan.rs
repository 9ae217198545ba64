use gwas_config::Search;
use gwas_storage::catalogue::{OrderKey, StudyFilters, StudyOrder};

use crate::search::{SortDirection, SortKey, ValidatedRequest};

/// Size of the similarity candidate set: `depth` times the multiplier, capped at
/// `max_candidates`, and never below `min_candidates`. Numeric filters reject candidates after
/// the similarity stage, so they get the larger multiplier.
pub fn candidate_limit(cfg: &Search, depth: u32, numeric_filter: bool) -> u32 {
	let multiplier =
		if numeric_filter { cfg.filtered_candidate_multiplier } else { cfg.candidate_multiplier };

	depth.saturating_mul(multiplier).min(cfg.max_candidates).max(cfg.min_candidates)
}

pub fn filters(request: &ValidatedRequest) -> StudyFilters {
	StudyFilters {
		trait_name: request.trait_name.clone(),
		min_sample_size: request.min_sample_size,
		min_neg_log10_p: request.min_neg_log10_p,
		require_genotype: request.require_genotype,
	}
}

/// Store-side scan order matching the in-memory sort, so the scan limit keeps the top of the
/// requested ordering.
pub fn order(sort: SortKey, direction: SortDirection) -> StudyOrder {
	let key = match sort {
		SortKey::Relevance => OrderKey::NegLog10P,
		SortKey::Power => OrderKey::SampleSize,
		SortKey::Recent => OrderKey::PublishedOn,
		SortKey::Alphabetical => OrderKey::Title,
	};

	StudyOrder { key, descending: direction == SortDirection::Desc }
}
