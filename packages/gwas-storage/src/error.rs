/// SQLSTATE codes raised when the similarity stage references a table, function, or type that
/// this database does not provide.
const CAPABILITY_SQLSTATES: [&str; 3] = ["42P01", "42883", "42704"];
/// `query_canceled`, raised when `statement_timeout` fires.
const STATEMENT_TIMEOUT_SQLSTATE: &str = "57014";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Similarity capability missing: {0}")]
	CapabilityMissing(String),
	#[error("Statement timed out.")]
	Timeout,
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		if let sqlx::Error::PoolTimedOut = err {
			return Self::Timeout;
		}

		let code = err.as_database_error().and_then(|db| db.code().map(|code| code.into_owned()));

		match code.as_deref() {
			Some(code) if CAPABILITY_SQLSTATES.contains(&code) =>
				Self::CapabilityMissing(format!("SQLSTATE {code}: {err}")),
			Some(STATEMENT_TIMEOUT_SQLSTATE) => Self::Timeout,
			_ => Self::Sqlx(err),
		}
	}
}
