use crate::api::ApiError;
use crate::viewer::events::{ViewRequest, ViewSignal};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::instrument;

pub fn routes() -> Router<AppState> {
	Router::new().route("/signals/{viewer}", post(emit))
}

/// Publishes a view signal. Listeners open the document asynchronously in the session
/// returned as `viewer`.
#[instrument(skip_all, fields(%viewer))]
async fn emit(
	State(state): State<AppState>,
	Path(viewer): Path<String>,
	Json(request): Json<ViewRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
	let signal = match viewer.as_str() {
		"pdf" => ViewSignal::Pdf(request),
		"image" => ViewSignal::Image(request),
		_ => return Err(ApiError::UnknownViewerKind(viewer)),
	};
	let (id, _) = state.sessions.signal_session(signal.viewer());
	let listeners = state.signals.emit(signal);
	Ok((
		StatusCode::ACCEPTED,
		Json(json!({ "listeners": listeners, "viewer": id })),
	))
}
