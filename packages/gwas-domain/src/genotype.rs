use std::sync::LazyLock;

use regex::Regex;

/// A risk allele field is usable when every listed variant names a concrete nucleotide allele,
/// e.g. `rs7329174-G` or `rs1-A; rs2-TT`. `rs123-?` is not usable. The same expression is
/// evaluated case-insensitively by the catalogue store (`~*`).
pub const USABLE_RISK_ALLELE_PATTERN: &str =
	r"^\s*[^;,]+-[ACGT]+\s*(?:[;,]\s*[^;,]+-[ACGT]+\s*)*$";

/// Placeholder values the catalogue uses for "no variant reported".
pub const MISSING_VARIANT_MARKERS: [&str; 2] = ["NR", "NA"];

static USABLE_RISK_ALLELE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(&format!("(?i){USABLE_RISK_ALLELE_PATTERN}")).expect("risk allele pattern")
});

pub fn has_usable_genotype(snps: Option<&str>, risk_allele: Option<&str>) -> bool {
	let Some(snps) = snps.map(str::trim).filter(|snps| !snps.is_empty()) else {
		return false;
	};

	if MISSING_VARIANT_MARKERS.iter().any(|marker| snps.eq_ignore_ascii_case(marker)) {
		return false;
	}

	risk_allele.map(|allele| USABLE_RISK_ALLELE.is_match(allele)).unwrap_or(false)
}
