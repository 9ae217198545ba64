//! Turns store rows into the annotated, sorted, paginated page.

use std::cmp::Ordering;

use gwas_domain::{
	genotype, parse,
	quality::{self, QualityInputs, QualityPolicy},
};
use gwas_storage::models::StudyRow;

use crate::search::{
	ParsedStudy, SortDirection, SortKey, StudyStats, ValidatedRequest, VariantMatcher,
};

pub struct Page {
	pub items: Vec<ParsedStudy>,
	pub total: u64,
}

/// `similarity_ordered` rows keep the store's distance order; everything else is sorted by the
/// requested key with nulls last in both directions and ties broken by catalogue id.
pub fn assemble(
	policy: &QualityPolicy,
	request: &ValidatedRequest,
	rows: Vec<StudyRow>,
	similarity_ordered: bool,
	matcher: Option<&dyn VariantMatcher>,
) -> Page {
	let mut studies = rows
		.into_iter()
		.map(|row| parse_row(policy, row))
		.filter(|study| !(request.exclude_low_quality && study.low_quality))
		.filter(|study| request.confidence_band.is_none_or(|band| study.confidence == band))
		.filter(|study| matcher.is_none_or(|matcher| matcher.matches(study)))
		.collect::<Vec<_>>();

	if !similarity_ordered {
		studies.sort_by(|a, b| compare(a, b, request.sort, request.direction));
	}

	let total = studies.len() as u64;
	let items = studies
		.into_iter()
		.skip(request.offset as usize)
		.take(request.limit as usize)
		.collect();

	Page { items, total }
}

pub fn parse_row(policy: &QualityPolicy, row: StudyRow) -> ParsedStudy {
	let record = row.record;
	let sample_size = record.initial_sample_size.as_deref().and_then(parse::parse_sample_size);
	let p_value = record.p_value.as_deref().and_then(parse::parse_p_value);
	let neg_log10_p = record
		.pvalue_mlog
		.as_deref()
		.and_then(parse::parse_neg_log10)
		.or_else(|| record.p_value.as_deref().and_then(parse::neg_log10_from_p_text));
	let published_on = record.date.as_deref().and_then(parse::parse_publication_date);
	let effect = record
		.or_or_beta
		.as_deref()
		.and_then(|raw| parse::parse_effect(raw, record.ci_text.as_deref()));
	let usable_genotype = genotype::has_usable_genotype(
		record.snps.as_deref(),
		record.strongest_snp_risk_allele.as_deref(),
	);
	let assessment = quality::assess(policy, &QualityInputs { sample_size, p_value, neg_log10_p });

	ParsedStudy {
		record,
		stats: StudyStats { sample_size, p_value, neg_log10_p, published_on, effect, usable_genotype },
		similarity: row.distance.map(|distance| (1.0 - distance).clamp(0.0, 1.0)),
		quality_flags: assessment.flags,
		confidence: assessment.confidence,
		low_quality: assessment.low_quality,
	}
}

fn compare(a: &ParsedStudy, b: &ParsedStudy, key: SortKey, direction: SortDirection) -> Ordering {
	let ordering = match key {
		SortKey::Relevance => nulls_last(
			a.stats.neg_log10_p,
			b.stats.neg_log10_p,
			direction,
			|x, y| x.total_cmp(y),
		),
		SortKey::Power =>
			nulls_last(a.stats.sample_size, b.stats.sample_size, direction, |x, y| x.cmp(y)),
		SortKey::Recent =>
			nulls_last(a.stats.published_on, b.stats.published_on, direction, |x, y| x.cmp(y)),
		SortKey::Alphabetical =>
			nulls_last(title_key(a), title_key(b), direction, |x, y| x.cmp(y)),
	};

	ordering.then_with(|| a.record.id.cmp(&b.record.id))
}

/// Orders present values by `direction` and places absent values after all present ones.
fn nulls_last<T>(
	a: Option<T>,
	b: Option<T>,
	direction: SortDirection,
	cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
	match (a, b) {
		(Some(a), Some(b)) => match direction {
			SortDirection::Asc => cmp(&a, &b),
			SortDirection::Desc => cmp(&b, &a),
		},
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}

fn title_key(study: &ParsedStudy) -> Option<String> {
	study
		.record
		.study
		.as_deref()
		.map(str::trim)
		.filter(|title| !title.is_empty())
		.map(str::to_lowercase)
}
