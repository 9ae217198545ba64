pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Validation(String),
	#[error("Embedding provider failed: {0}")]
	Provider(String),
	#[error(transparent)]
	Storage(#[from] gwas_storage::Error),
}
