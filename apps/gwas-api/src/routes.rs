use axum::{
	Json, Router,
	extract::{Query, State, rejection::QueryRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
};
use serde::Serialize;

use gwas_service::{Error as ServiceError, FilterRequest, SearchResponse};

use crate::state::AppState;

const STORAGE_ERROR_MESSAGE: &str = "The study catalogue is temporarily unavailable.";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/studies", get(search_studies))
		.route("/studies", get(search_studies))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search_studies(
	State(state): State<AppState>,
	query: Result<Query<FilterRequest>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let Query(request) = query
		.map_err(|err| json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text()))?;
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Study search failed in storage.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", STORAGE_ERROR_MESSAGE)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
) -> ApiError {
	ApiError::new(status, code, message)
}
