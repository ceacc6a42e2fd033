use crate::api::ApiError;
use crate::backend::FetchError;
use crate::documents::{file_name_of, media_type, normalize_remote_path};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::instrument;

pub fn routes() -> Router<AppState> {
	Router::new().route("/documents/{*path}", get(document))
}

/// Streams a stored binary through to the client for inline display.
#[instrument(skip_all, fields(path = %path))]
async fn document(
	State(state): State<AppState>,
	Path(path): Path<String>,
) -> Result<Response, ApiError> {
	let normalized = normalize_remote_path(&path);
	let Some(file_name) = file_name_of(&normalized) else {
		return Err(FetchError::InvalidPath { path }.into());
	};

	let disposition = content_disposition("inline", file_name);
	let content_type = media_type(&normalized).to_string();
	let bytes = state.backend.fetch_document_binary(&normalized).await?;

	Ok((
		[(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
		bytes,
	)
		.into_response())
}

/// `Content-Disposition` value with the file name reduced to printable ASCII.
pub fn content_disposition(disposition: &str, file_name: &str) -> String {
	let file_name: String = file_name
		.chars()
		.map(|c| {
			if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
				c
			} else {
				'_'
			}
		})
		.collect();
	format!("{disposition}; filename=\"{file_name}\"")
}
