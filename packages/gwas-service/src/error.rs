pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<gwas_storage::Error> for Error {
	fn from(err: gwas_storage::Error) -> Self {
		match err {
			gwas_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			gwas_storage::Error::Timeout =>
				Self::Storage { message: "Catalogue query timed out.".to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
