//! Precomputed per-study vectors in `study_embeddings`.

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{Result, catalogue, models::PendingStudyEmbedding};

/// Catalogue rows with a complete composite key and no stored embedding, in ingest order.
pub async fn pending(pool: &PgPool, limit: u32) -> Result<Vec<PendingStudyEmbedding>> {
	let rows = sqlx::query_as::<_, PendingStudyEmbedding>(
		"\
SELECT
	c.study_accession,
	c.snps,
	c.strongest_snp_risk_allele,
	COALESCE(c.mapped_trait, '') || ' ' ||
	COALESCE(c.disease_trait, '') || ' ' ||
	COALESCE(c.study, '') || ' ' ||
	COALESCE(c.mapped_gene, '') AS combined_text
FROM gwas_catalog c
LEFT JOIN study_embeddings se
	ON se.study_accession = c.study_accession
	AND se.snps = c.snps
	AND se.strongest_snp_risk_allele = c.strongest_snp_risk_allele
WHERE se.study_accession IS NULL
	AND c.study_accession IS NOT NULL
	AND c.snps IS NOT NULL
	AND c.strongest_snp_risk_allele IS NOT NULL
ORDER BY c.id
LIMIT $1",
	)
	.bind(i64::from(limit))
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

/// Inserts one batch. Rows that already have an embedding are left untouched.
pub async fn insert_batch(
	pool: &PgPool,
	rows: &[PendingStudyEmbedding],
	vectors: &[Vec<f32>],
) -> Result<u64> {
	if rows.is_empty() {
		return Ok(0);
	}

	let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
		"INSERT INTO study_embeddings (study_accession, snps, strongest_snp_risk_allele, embedding) ",
	);

	builder.push_values(rows.iter().zip(vectors), |mut row, (study, vector)| {
		row.push_bind(study.study_accession.as_str())
			.push_bind(study.snps.as_str())
			.push_bind(study.strongest_snp_risk_allele.as_str())
			.push_bind(catalogue::vector_literal(vector))
			.push_unseparated("::vector");
	});
	builder.push(" ON CONFLICT (study_accession, snps, strongest_snp_risk_allele) DO NOTHING");

	let result = builder.build().execute(pool).await?;

	Ok(result.rows_affected())
}
