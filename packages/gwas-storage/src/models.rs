use serde::Serialize;

/// One catalogue row as stored. Every descriptive column is free text and may be null.
#[derive(Clone, Debug, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct StudyRecord {
	pub id: i64,
	pub study_accession: Option<String>,
	pub pubmed_id: Option<String>,
	pub first_author: Option<String>,
	pub date: Option<String>,
	pub journal: Option<String>,
	pub study: Option<String>,
	pub disease_trait: Option<String>,
	pub mapped_trait: Option<String>,
	pub mapped_gene: Option<String>,
	pub snps: Option<String>,
	pub strongest_snp_risk_allele: Option<String>,
	pub or_or_beta: Option<String>,
	pub ci_text: Option<String>,
	pub initial_sample_size: Option<String>,
	pub replication_sample_size: Option<String>,
	pub p_value: Option<String>,
	pub pvalue_mlog: Option<String>,
}

/// A catalogue row returned by a store query. `distance` is the cosine distance to the query
/// vector and `candidate_count` the size of the candidate set; both are only set on the
/// similarity path.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct StudyRow {
	#[sqlx(flatten)]
	pub record: StudyRecord,
	pub distance: Option<f64>,
	pub candidate_count: Option<i64>,
}

/// Rows of one scan. `candidate_count` is the similarity candidate set size and is `None` on
/// the other paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudyPage {
	pub rows: Vec<StudyRow>,
	pub candidate_count: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CachedEmbedding {
	pub query_text: String,
	pub vector: Vec<f32>,
}

/// Composite key and embedding text of a catalogue row without a `study_embeddings` entry.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct PendingStudyEmbedding {
	pub study_accession: String,
	pub snps: String,
	pub strongest_snp_risk_allele: String,
	pub combined_text: String,
}
