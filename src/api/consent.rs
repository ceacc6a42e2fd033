use crate::api::ApiError;
use crate::backend::{UploadError, UploadFile};
use crate::consent::workflow::ConsentLookup;
use crate::consent::DEFAULT_FILE_NAME;
use crate::types::Id;
use crate::AppState;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{instrument, warn};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/patients/{patient}/consent-forms", get(lookup))
		.route("/patients/{patient}/consent-forms/{template}", post(upload))
}

#[derive(Debug, Deserialize)]
struct InvestigationQuery {
	investigation: String,
}

#[instrument(skip_all, fields(patient = %patient))]
async fn lookup(
	State(state): State<AppState>,
	Path(patient): Path<String>,
	Query(query): Query<InvestigationQuery>,
) -> Result<Json<ConsentLookup>, ApiError> {
	let lookup = state
		.workflow
		.lookup(&Id::new(patient), &query.investigation)
		.await?;
	Ok(Json(lookup))
}

#[instrument(skip_all, fields(patient = %patient, template = %template))]
async fn upload(
	State(state): State<AppState>,
	Path((patient, template)): Path<(String, String)>,
	Query(query): Query<InvestigationQuery>,
	multipart: Multipart,
) -> Result<(StatusCode, Json<ConsentLookup>), ApiError> {
	let file = read_upload(multipart).await?;
	let lookup = state
		.workflow
		.upload(
			&Id::new(patient),
			&Id::new(template),
			&query.investigation,
			file,
		)
		.await?;
	Ok((StatusCode::CREATED, Json(lookup)))
}

/// Reads the `file` field. Other fields are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<UploadFile, ApiError> {
	while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
		if field.name() != Some("file") {
			continue;
		}
		let file_name = field
			.file_name()
			.map(str::trim)
			.filter(|name| !name.is_empty())
			.unwrap_or(DEFAULT_FILE_NAME)
			.to_owned();
		let content_type = field.content_type().map(str::to_owned);
		let bytes = field.bytes().await.map_err(multipart_error)?;
		return Ok(UploadFile {
			file_name,
			content_type,
			bytes,
		});
	}
	Err(UploadError::MissingFile.into())
}

fn multipart_error(err: MultipartError) -> ApiError {
	if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
		warn!("Upload limit exceeded");
		UploadError::UploadLimitExceeded.into()
	} else {
		ApiError::Multipart(err.body_text())
	}
}
