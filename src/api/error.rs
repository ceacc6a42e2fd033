use crate::backend::{FetchError, UploadError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	Fetch(#[from] FetchError),
	#[error(transparent)]
	Upload(#[from] UploadError),
	#[error("Invalid multipart body: {0}")]
	Multipart(String),
	#[error("There is no viewer with id {0}")]
	UnknownViewer(Uuid),
	#[error("The viewer has no document loaded")]
	NoDocument,
	#[error("The viewer is not loading a document")]
	NotLoading,
	#[error("The viewer has no displayed document to print")]
	NotPrintable,
	#[error("Unknown viewer `{0}`, expected `pdf` or `image`")]
	UnknownViewerKind(String),
}

impl ApiError {
	const fn status(&self) -> StatusCode {
		match self {
			Self::Fetch(err) | Self::Upload(UploadError::Fetch(err)) => fetch_status(err),
			Self::Upload(UploadError::MissingFile) | Self::Multipart(_) => StatusCode::BAD_REQUEST,
			Self::Upload(UploadError::UploadLimitExceeded) => StatusCode::PAYLOAD_TOO_LARGE,
			Self::UnknownViewer(_) | Self::NoDocument | Self::UnknownViewerKind(_) => {
				StatusCode::NOT_FOUND
			}
			Self::NotLoading | Self::NotPrintable => StatusCode::CONFLICT,
		}
	}
}

const fn fetch_status(err: &FetchError) -> StatusCode {
	match err {
		FetchError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
		FetchError::Status { status: 404, .. } => StatusCode::NOT_FOUND,
		FetchError::Transport { .. }
		| FetchError::Status { .. }
		| FetchError::Rejected { .. }
		| FetchError::Decode { .. } => StatusCode::BAD_GATEWAY,
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			error!("{self}");
		} else {
			warn!("{self}");
		}
		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backend_failures_are_bad_gateway() {
		let err = ApiError::from(FetchError::Rejected {
			resource: String::from("consent-form templates"),
			reason: String::from("database offline"),
		});
		assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

		let err = ApiError::from(UploadError::Fetch(FetchError::Transport {
			resource: String::from("consent-form upload"),
			reason: String::from("connection refused"),
		}));
		assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
	}

	#[test]
	fn client_errors_keep_their_meaning() {
		let missing = ApiError::from(FetchError::Status {
			resource: String::from("document `a.pdf`"),
			status: 404,
		});
		assert_eq!(missing.status(), StatusCode::NOT_FOUND);
		assert_eq!(
			ApiError::from(UploadError::UploadLimitExceeded).status(),
			StatusCode::PAYLOAD_TOO_LARGE
		);
		assert_eq!(ApiError::NotLoading.status(), StatusCode::CONFLICT);
	}
}
