use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cohorts below this size carry a major flag.
pub const SMALL_COHORT_SIZE: u64 = 500;
/// P-values above this are not considered suggestive.
pub const SUGGESTIVE_P_VALUE: f64 = 0.05;
/// A cohort at least this large suppresses the non-significance flag.
pub const COMPENSATING_COHORT_SIZE: u64 = 10_000;
pub const HIGH_MIN_SAMPLE_SIZE: u64 = 5_000;
pub const HIGH_MIN_NEG_LOG10_P: f64 = 9.0;
pub const HIGH_MAX_P_VALUE: f64 = 5e-9;
pub const MEDIUM_MIN_SAMPLE_SIZE: u64 = 2_000;
pub const MEDIUM_MIN_NEG_LOG10_P: f64 = 7.0;
pub const MEDIUM_MAX_P_VALUE: f64 = 1e-6;

pub const FLAG_SMALL_COHORT: &str = "Very small cohort.";
pub const FLAG_NOT_SIGNIFICANT: &str = "Not statistically significant.";
pub const FLAG_INDICATORS_UNAVAILABLE: &str = "Quality indicators unavailable.";
pub const FLAG_SAMPLE_SIZE_UNAVAILABLE: &str = "Sample size unavailable.";
pub const FLAG_P_VALUE_UNAVAILABLE: &str = "P-value unavailable.";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Minor,
	Major,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct QualityFlag {
	pub message: String,
	pub severity: Severity,
}
impl QualityFlag {
	fn minor(message: &str) -> Self {
		Self { message: message.to_string(), severity: Severity::Minor }
	}

	fn major(message: &str) -> Self {
		Self { message: message.to_string(), severity: Severity::Major }
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
	High,
	Medium,
	Low,
}
impl ConfidenceBand {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}
}
impl FromStr for ConfidenceBand {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"high" => Ok(Self::High),
			"medium" => Ok(Self::Medium),
			"low" => Ok(Self::Low),
			other => Err(format!("Unknown confidence band {other:?}.")),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct QualityPolicy {
	pub small_cohort_size: u64,
	pub suggestive_p_value: f64,
	pub compensating_cohort_size: u64,
	pub high_min_sample_size: u64,
	pub high_min_neg_log10_p: f64,
	pub high_max_p_value: f64,
	pub medium_min_sample_size: u64,
	pub medium_min_neg_log10_p: f64,
	pub medium_max_p_value: f64,
}
impl QualityPolicy {
	pub fn from_config(cfg: &gwas_config::Quality) -> Self {
		let defaults = Self::default();

		Self {
			small_cohort_size: cfg.small_cohort_size.unwrap_or(defaults.small_cohort_size),
			suggestive_p_value: cfg.suggestive_p_value.unwrap_or(defaults.suggestive_p_value),
			compensating_cohort_size: cfg
				.compensating_cohort_size
				.unwrap_or(defaults.compensating_cohort_size),
			high_min_sample_size: cfg.high_min_sample_size.unwrap_or(defaults.high_min_sample_size),
			high_min_neg_log10_p: cfg.high_min_neg_log10_p.unwrap_or(defaults.high_min_neg_log10_p),
			high_max_p_value: cfg.high_max_p_value.unwrap_or(defaults.high_max_p_value),
			medium_min_sample_size: cfg
				.medium_min_sample_size
				.unwrap_or(defaults.medium_min_sample_size),
			medium_min_neg_log10_p: cfg
				.medium_min_neg_log10_p
				.unwrap_or(defaults.medium_min_neg_log10_p),
			medium_max_p_value: cfg.medium_max_p_value.unwrap_or(defaults.medium_max_p_value),
		}
	}
}
impl Default for QualityPolicy {
	fn default() -> Self {
		Self {
			small_cohort_size: SMALL_COHORT_SIZE,
			suggestive_p_value: SUGGESTIVE_P_VALUE,
			compensating_cohort_size: COMPENSATING_COHORT_SIZE,
			high_min_sample_size: HIGH_MIN_SAMPLE_SIZE,
			high_min_neg_log10_p: HIGH_MIN_NEG_LOG10_P,
			high_max_p_value: HIGH_MAX_P_VALUE,
			medium_min_sample_size: MEDIUM_MIN_SAMPLE_SIZE,
			medium_min_neg_log10_p: MEDIUM_MIN_NEG_LOG10_P,
			medium_max_p_value: MEDIUM_MAX_P_VALUE,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QualityInputs {
	pub sample_size: Option<u64>,
	pub p_value: Option<f64>,
	pub neg_log10_p: Option<f64>,
}
impl QualityInputs {
	/// The reported `-log10(p)`, or one derived from the p-value when only that is present.
	pub fn effective_neg_log10_p(&self) -> Option<f64> {
		self.neg_log10_p
			.or_else(|| self.p_value.filter(|p| *p > 0.0).map(|p| -p.log10()))
			.filter(|value| value.is_finite())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assessment {
	pub flags: Vec<QualityFlag>,
	pub confidence: ConfidenceBand,
	pub low_quality: bool,
}

pub fn assess(policy: &QualityPolicy, inputs: &QualityInputs) -> Assessment {
	let flags = quality_flags(policy, inputs);
	let confidence = confidence_band(policy, inputs, &flags);
	let low_quality = is_low_quality(&flags);

	Assessment { flags, confidence, low_quality }
}

pub fn quality_flags(policy: &QualityPolicy, inputs: &QualityInputs) -> Vec<QualityFlag> {
	let mut flags = Vec::new();
	let neg_log10_p = inputs.effective_neg_log10_p();

	if let Some(sample_size) = inputs.sample_size
		&& sample_size < policy.small_cohort_size
	{
		flags.push(QualityFlag::major(FLAG_SMALL_COHORT));
	}

	let above_suggestive = match (inputs.p_value, neg_log10_p) {
		(Some(p), _) => p > policy.suggestive_p_value,
		(None, Some(lp)) => lp < -policy.suggestive_p_value.log10(),
		(None, None) => false,
	};
	let compensated =
		inputs.sample_size.map(|n| n >= policy.compensating_cohort_size).unwrap_or(false);

	if above_suggestive && !compensated {
		flags.push(QualityFlag::minor(FLAG_NOT_SIGNIFICANT));
	}

	let has_significance = inputs.p_value.is_some() || neg_log10_p.is_some();

	match (inputs.sample_size.is_some(), has_significance) {
		(false, false) => flags.push(QualityFlag::minor(FLAG_INDICATORS_UNAVAILABLE)),
		(false, true) => flags.push(QualityFlag::minor(FLAG_SAMPLE_SIZE_UNAVAILABLE)),
		(true, false) => flags.push(QualityFlag::minor(FLAG_P_VALUE_UNAVAILABLE)),
		(true, true) => {},
	}

	flags
}

/// Evaluated strictly in order: major flag, then high, then medium, then low.
pub fn confidence_band(
	policy: &QualityPolicy,
	inputs: &QualityInputs,
	flags: &[QualityFlag],
) -> ConfidenceBand {
	if is_low_quality(flags) {
		return ConfidenceBand::Low;
	}

	let sample_size = inputs.sample_size;
	let neg_log10_p = inputs.effective_neg_log10_p();
	let p_within = |max: f64| inputs.p_value.map(|p| p <= max).unwrap_or(true);

	let high = sample_size.map(|n| n >= policy.high_min_sample_size).unwrap_or(false)
		&& neg_log10_p.map(|lp| lp >= policy.high_min_neg_log10_p).unwrap_or(false)
		&& p_within(policy.high_max_p_value);

	if high {
		return ConfidenceBand::High;
	}

	let strong_enough = sample_size.map(|n| n >= policy.medium_min_sample_size).unwrap_or(false)
		|| neg_log10_p.map(|lp| lp >= policy.medium_min_neg_log10_p).unwrap_or(false);

	if strong_enough && p_within(policy.medium_max_p_value) {
		return ConfidenceBand::Medium;
	}

	ConfidenceBand::Low
}

pub fn is_low_quality(flags: &[QualityFlag]) -> bool {
	flags.iter().any(|flag| flag.severity == Severity::Major)
}
