//! Lenient parsers for the free-text numeric and date columns of the study catalogue.
//!
//! Every parser returns `None` instead of failing: a dirty field degrades the quality
//! annotation of one record and never the request that touched it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[T ].*)?$").expect("ISO date pattern")
});
static NUMERIC_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d{1,2})([/-])(\d{1,2})([/-])(\d{4})$").expect("numeric date pattern")
});
static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?,?\s+(\d{4})$")
		.expect("day-first date pattern")
});
static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$")
		.expect("month-first date pattern")
});
static TIMES_TEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d*\.?\d+)\s*[x×\*]\s*10\s*\^?\s*([-−+]?\d+)$").expect("x10 notation pattern")
});

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
	OddsRatio,
	Beta,
}

/// Reported effect size with its sign resolved from the confidence-interval description.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Effect {
	pub value: f64,
	pub kind: EffectKind,
}

/// Takes the first run of digits and thousands separators. Later numbers in the same string
/// (replication arms, control counts) are ignored rather than summed.
pub fn parse_sample_size(raw: &str) -> Option<u64> {
	let start = raw.find(|c: char| c.is_ascii_digit())?;
	let run: String = raw[start..]
		.chars()
		.take_while(|c| c.is_ascii_digit() || *c == ',')
		.filter(|c| *c != ',')
		.collect();

	run.parse::<u64>().ok()
}

pub fn parse_p_value(raw: &str) -> Option<f64> {
	let normalized = normalize_scientific(raw)?;
	let value = normalized.parse::<f64>().ok()?;

	if !value.is_finite() || value < 0.0 {
		return None;
	}
	// Literals such as 1E-400 parse to zero; the caller must fall back to -log10(p).
	if value == 0.0 && mantissa_of(&normalized).map(|m| m != 0.0).unwrap_or(false) {
		return None;
	}

	Some(value)
}

pub fn parse_neg_log10(raw: &str) -> Option<f64> {
	let value = raw.trim().parse::<f64>().ok()?;

	value.is_finite().then_some(value)
}

/// Computes `-log10(p)` from the literal's mantissa and exponent so that p-values below the
/// `f64` range still produce a usable significance figure.
pub fn neg_log10_from_p_text(raw: &str) -> Option<f64> {
	let normalized = normalize_scientific(raw)?;
	let (mantissa, exponent) = match normalized.split_once('e') {
		Some((mantissa, exponent)) =>
			(mantissa.parse::<f64>().ok()?, exponent.parse::<i32>().ok()?),
		None => (normalized.parse::<f64>().ok()?, 0),
	};

	if !mantissa.is_finite() || mantissa <= 0.0 {
		return None;
	}

	let value = -(mantissa.log10() + f64::from(exponent));

	value.is_finite().then_some(value)
}

/// Accepts, in order: ISO-like dates, numeric `D/M/Y` or `D-M-Y` (day-first, then month-first),
/// `D Month Y`, and `Month D, Y`.
pub fn parse_publication_date(raw: &str) -> Option<Date> {
	let text = raw.trim();

	if text.is_empty() {
		return None;
	}
	if let Some(caps) = ISO_DATE.captures(text) {
		let year = caps[1].parse().ok()?;
		let month = caps[2].parse().ok()?;
		let day = caps[3].parse().ok()?;

		return calendar_date(year, month, day);
	}
	if let Some(caps) = NUMERIC_TRIPLE.captures(text) {
		if caps[2] != caps[4] {
			return None;
		}

		let first: u8 = caps[1].parse().ok()?;
		let second: u8 = caps[3].parse().ok()?;
		let year = caps[5].parse().ok()?;

		return calendar_date(year, second, first).or_else(|| calendar_date(year, first, second));
	}
	if let Some(caps) = DAY_MONTH_YEAR.captures(text) {
		let day = caps[1].parse().ok()?;
		let month = month_number(&caps[2])?;
		let year = caps[3].parse().ok()?;

		return calendar_date(year, month, day);
	}
	if let Some(caps) = MONTH_DAY_YEAR.captures(text) {
		let month = month_number(&caps[1])?;
		let day = caps[2].parse().ok()?;
		let year = caps[3].parse().ok()?;

		return calendar_date(year, month, day);
	}

	None
}

pub fn parse_effect(or_or_beta: &str, ci_text: Option<&str>) -> Option<Effect> {
	let value = or_or_beta.trim().parse::<f64>().ok().filter(|value| value.is_finite())?;
	let ci = ci_text.map(str::to_ascii_lowercase).unwrap_or_default();

	if ci.contains("decrease") {
		Some(Effect { value: -value.abs(), kind: EffectKind::Beta })
	} else if ci.contains("increase") {
		Some(Effect { value: value.abs(), kind: EffectKind::Beta })
	} else {
		Some(Effect { value, kind: EffectKind::OddsRatio })
	}
}

/// Builds a date and rejects it unless the calendar reproduces the same year, month, and day.
fn calendar_date(year: i32, month: u8, day: u8) -> Option<Date> {
	let month_enum = Month::try_from(month).ok()?;
	let date = Date::from_calendar_date(year, month_enum, day).ok()?;

	(date.year() == year && u8::from(date.month()) == month && date.day() == day).then_some(date)
}

fn month_number(name: &str) -> Option<u8> {
	let lower = name.to_ascii_lowercase();
	let number = match lower.as_str() {
		"january" | "jan" => 1,
		"february" | "feb" => 2,
		"march" | "mar" => 3,
		"april" | "apr" => 4,
		"may" => 5,
		"june" | "jun" => 6,
		"july" | "jul" => 7,
		"august" | "aug" => 8,
		"september" | "sept" | "sep" => 9,
		"october" | "oct" => 10,
		"november" | "nov" => 11,
		"december" | "dec" => 12,
		_ => return None,
	};

	Some(number)
}

/// Rewrites `5 x 10^-8` style literals to `5e-8`; other inputs are trimmed and lowercased.
fn normalize_scientific(raw: &str) -> Option<String> {
	let text = raw.trim();

	if text.is_empty() {
		return None;
	}
	if let Some(caps) = TIMES_TEN.captures(text) {
		let exponent = caps[2].replace('−', "-");

		return Some(format!("{}e{}", &caps[1], exponent));
	}

	Some(text.to_ascii_lowercase())
}

fn mantissa_of(normalized: &str) -> Option<f64> {
	let mantissa = normalized.split_once('e').map(|(mantissa, _)| mantissa).unwrap_or(normalized);

	mantissa.parse::<f64>().ok()
}
