//! SQL compilation and execution for catalogue retrieval.
//!
//! All three retrieval paths (relational, lexical, similarity) share one predicate builder so a
//! fallback from similarity to lexical keeps the caller's filters byte-for-byte identical. The
//! store-flavor specific fragments live behind [`SqlDialect`].

use sqlx::{PgPool, Postgres, QueryBuilder};

use gwas_domain::genotype::{MISSING_VARIANT_MARKERS, USABLE_RISK_ALLELE_PATTERN};

use crate::{
	Result,
	models::{StudyPage, StudyRow},
};

/// Columns matched by the lexical fallback, ORed together.
pub const LEXICAL_COLUMNS: [&str; 7] = [
	"study",
	"disease_trait",
	"mapped_trait",
	"first_author",
	"mapped_gene",
	"study_accession",
	"snps",
];

const STUDY_COLUMNS: &str = "\
c.id, c.study_accession, c.pubmed_id, c.first_author, c.\"date\", c.journal, c.study, \
c.disease_trait, c.mapped_trait, c.mapped_gene, c.snps, c.strongest_snp_risk_allele, \
c.or_or_beta, c.ci_text, c.initial_sample_size, c.replication_sample_size, c.p_value, \
c.pvalue_mlog";
/// First run of digits and thousands separators in the initial cohort description.
const SAMPLE_SIZE_EXPR: &str = "gwas_sample_size(c.initial_sample_size)";
/// Reported `-log10(p)`, or one derived from the p-value column when that is all there is.
const NEG_LOG10_P_EXPR: &str = "gwas_neg_log10_p(c.pvalue_mlog, c.p_value)";
const PUBLISHED_ON_EXPR: &str = "gwas_publication_date(c.\"date\")";
const TITLE_EXPR: &str = "NULLIF(lower(btrim(c.study)), '') COLLATE \"C\"";

/// Predicates applied identically on every retrieval path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudyFilters {
	/// Case-insensitive equality against the reported or the mapped trait.
	pub trait_name: Option<String>,
	pub min_sample_size: Option<u64>,
	pub min_neg_log10_p: Option<f64>,
	pub require_genotype: bool,
}
impl StudyFilters {
	pub fn has_numeric_filter(&self) -> bool {
		self.min_sample_size.is_some() || self.min_neg_log10_p.is_some()
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum TextMatch {
	None,
	Lexical(String),
	Similarity { vector: Vec<f32>, candidate_limit: u32 },
}
impl TextMatch {
	pub fn strategy(&self) -> &'static str {
		match self {
			Self::None => "relational",
			Self::Lexical(_) => "lexical",
			Self::Similarity { .. } => "similarity",
		}
	}
}

/// Key the relational and lexical scans are ordered by before the scan limit applies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderKey {
	#[default]
	Id,
	NegLog10P,
	SampleSize,
	PublishedOn,
	Title,
}

/// Rows without a value for the key sort last in either direction, ties break on ascending id.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StudyOrder {
	pub key: OrderKey,
	pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogueQuery {
	pub text: TextMatch,
	pub filters: StudyFilters,
	/// Ignored on the similarity path, which is ordered by distance.
	pub order: StudyOrder,
	/// Upper bound on rows returned by a single scan.
	pub scan_limit: u32,
}
impl CatalogueQuery {
	/// The same query with the free text matched lexically instead of by similarity.
	pub fn into_lexical(self, text: &str) -> Self {
		Self { text: TextMatch::Lexical(text.to_string()), ..self }
	}
}

/// Store-flavor specific SQL fragments.
pub trait SqlDialect: Send + Sync {
	/// Appends the `WHERE` clause for the text match (lexical only) and the shared filters.
	fn push_predicate(&self, builder: &mut QueryBuilder<'static, Postgres>, query: &CatalogueQuery);

	/// Appends a `candidates` CTE holding at most `candidate_limit` composite keys ordered by
	/// ascending distance to `vector`, with the distance in a `distance` column.
	fn push_similarity_stage(
		&self,
		builder: &mut QueryBuilder<'static, Postgres>,
		vector: &[f32],
		candidate_limit: u32,
	);

	/// Appends the `ORDER BY` clause of a relational or lexical scan.
	fn push_order(&self, builder: &mut QueryBuilder<'static, Postgres>, order: StudyOrder);
}

/// Postgres with the pgvector extension and cosine distance.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgVectorDialect;
impl SqlDialect for PgVectorDialect {
	fn push_predicate(&self, builder: &mut QueryBuilder<'static, Postgres>, query: &CatalogueQuery) {
		builder.push(" WHERE TRUE");

		if let TextMatch::Lexical(text) = &query.text {
			let pattern = format!("%{}%", escape_like(text.trim()));

			builder.push(" AND (");

			for (idx, column) in LEXICAL_COLUMNS.iter().enumerate() {
				if idx > 0 {
					builder.push(" OR ");
				}

				builder.push(format_args!("c.{column} ILIKE "));
				builder.push_bind(pattern.clone());
			}

			builder.push(")");
		}

		let filters = &query.filters;

		if let Some(trait_name) = &filters.trait_name {
			builder.push(" AND (lower(c.disease_trait) = lower(");
			builder.push_bind(trait_name.clone());
			builder.push(") OR lower(c.mapped_trait) = lower(");
			builder.push_bind(trait_name.clone());
			builder.push("))");
		}
		if let Some(min_sample_size) = filters.min_sample_size {
			builder.push(format_args!(" AND {SAMPLE_SIZE_EXPR} >= "));
			builder.push_bind(i64::try_from(min_sample_size).unwrap_or(i64::MAX));
			builder.push("::numeric");
		}
		if let Some(min_neg_log10_p) = filters.min_neg_log10_p {
			builder.push(format_args!(" AND {NEG_LOG10_P_EXPR} >= "));
			builder.push_bind(min_neg_log10_p);
		}
		if filters.require_genotype {
			let markers =
				MISSING_VARIANT_MARKERS.iter().map(|marker| marker.to_string()).collect::<Vec<_>>();

			builder.push(" AND NULLIF(btrim(c.snps), '') IS NOT NULL AND upper(btrim(c.snps)) <> ALL(");
			builder.push_bind(markers);
			builder.push(") AND c.strongest_snp_risk_allele ~* ");
			builder.push_bind(USABLE_RISK_ALLELE_PATTERN.to_string());
		}
	}

	fn push_similarity_stage(
		&self,
		builder: &mut QueryBuilder<'static, Postgres>,
		vector: &[f32],
		candidate_limit: u32,
	) {
		builder.push(
			"\
WITH candidates AS (
	SELECT se.study_accession, se.snps, se.strongest_snp_risk_allele, se.embedding <=> ",
		);
		builder.push_bind(vector_literal(vector));
		builder.push(
			"::vector AS distance
	FROM study_embeddings se
	ORDER BY distance
	LIMIT ",
		);
		builder.push_bind(i64::from(candidate_limit));
		builder.push("\n)\n");
	}

	fn push_order(&self, builder: &mut QueryBuilder<'static, Postgres>, order: StudyOrder) {
		let expr = match order.key {
			OrderKey::Id => {
				builder.push(if order.descending { " ORDER BY c.id DESC" } else { " ORDER BY c.id ASC" });

				return;
			},
			OrderKey::NegLog10P => NEG_LOG10_P_EXPR,
			OrderKey::SampleSize => SAMPLE_SIZE_EXPR,
			OrderKey::PublishedOn => PUBLISHED_ON_EXPR,
			OrderKey::Title => TITLE_EXPR,
		};
		let direction = if order.descending { "DESC" } else { "ASC" };

		builder.push(format_args!(" ORDER BY {expr} {direction} NULLS LAST, c.id ASC"));
	}
}

pub fn build_select(dialect: &dyn SqlDialect, query: &CatalogueQuery) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new("");

	match &query.text {
		TextMatch::Similarity { vector, candidate_limit } => {
			dialect.push_similarity_stage(&mut builder, vector, *candidate_limit);
			builder.push(format_args!(
				"SELECT {STUDY_COLUMNS}, candidates.distance, \
(SELECT count(*) FROM candidates) AS candidate_count
FROM candidates
JOIN gwas_catalog c
	ON c.study_accession = candidates.study_accession
	AND c.snps = candidates.snps
	AND c.strongest_snp_risk_allele = candidates.strongest_snp_risk_allele"
			));
			dialect.push_predicate(&mut builder, query);
			builder.push(" ORDER BY candidates.distance ASC, c.id ASC");
		},
		TextMatch::None | TextMatch::Lexical(_) => {
			builder.push(format_args!(
				"SELECT {STUDY_COLUMNS}, NULL::double precision AS distance, \
NULL::bigint AS candidate_count
FROM gwas_catalog c"
			));
			dialect.push_predicate(&mut builder, query);
			dialect.push_order(&mut builder, query.order);
		},
	}

	builder.push(" LIMIT ");
	builder.push_bind(i64::from(query.scan_limit));

	builder
}

/// Counts rows matching the store predicates, ignoring the scan limit.
pub fn build_count(dialect: &dyn SqlDialect, query: &CatalogueQuery) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new("");

	match &query.text {
		TextMatch::Similarity { vector, candidate_limit } => {
			dialect.push_similarity_stage(&mut builder, vector, *candidate_limit);
			builder.push(
				"\
SELECT count(*)
FROM candidates
JOIN gwas_catalog c
	ON c.study_accession = candidates.study_accession
	AND c.snps = candidates.snps
	AND c.strongest_snp_risk_allele = candidates.strongest_snp_risk_allele",
			);
		},
		TextMatch::None | TextMatch::Lexical(_) => {
			builder.push("SELECT count(*) FROM gwas_catalog c");
		},
	}

	dialect.push_predicate(&mut builder, query);

	builder
}

/// Size of the similarity candidate set alone, before any predicate.
pub fn build_candidate_count(
	dialect: &dyn SqlDialect,
	vector: &[f32],
	candidate_limit: u32,
) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new("");

	dialect.push_similarity_stage(&mut builder, vector, candidate_limit);
	builder.push("SELECT count(*) FROM candidates");

	builder
}

/// Runs the scan. On the similarity path the candidate set size is reported even when every
/// candidate fails the predicates.
pub async fn fetch_studies(
	pool: &PgPool,
	dialect: &dyn SqlDialect,
	query: &CatalogueQuery,
) -> Result<StudyPage> {
	let mut builder = build_select(dialect, query);
	let rows = builder.build_query_as::<StudyRow>().fetch_all(pool).await?;
	let candidate_count = match &query.text {
		TextMatch::Similarity { vector, candidate_limit } => match rows.first() {
			Some(row) => row.candidate_count.map(|count| u64::try_from(count).unwrap_or_default()),
			None => {
				let mut builder = build_candidate_count(dialect, vector, *candidate_limit);
				let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;

				Some(u64::try_from(count).unwrap_or_default())
			},
		},
		TextMatch::None | TextMatch::Lexical(_) => None,
	};

	Ok(StudyPage { rows, candidate_count })
}

pub async fn count_studies(
	pool: &PgPool,
	dialect: &dyn SqlDialect,
	query: &CatalogueQuery,
) -> Result<u64> {
	let mut builder = build_count(dialect, query);
	let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;

	Ok(u64::try_from(count).unwrap_or_default())
}

/// pgvector text input form, e.g. `[0.1,0.2]`.
pub fn vector_literal(vector: &[f32]) -> String {
	let body = vector.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(",");

	format!("[{body}]")
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
