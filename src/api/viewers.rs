use crate::api::documents::content_disposition;
use crate::api::ApiError;
use crate::documents::{media_type, normalize_remote_path, OBJECT_URL_PREFIX};
use crate::utils::lock;
use crate::viewer::controls::PageControls;
use crate::viewer::download::{DownloadError, DownloadLink, DownloadSink};
use crate::viewer::print::PrintJob;
use crate::viewer::sessions::Session;
use crate::viewer::ViewerSnapshot;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{instrument, trace};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/viewers", get(list_viewers).post(open_viewer))
		.route(
			"/viewers/{id}",
			get(viewer).put(reopen_viewer).delete(close_viewer),
		)
		.route("/viewers/{id}/blob", get(viewer_blob))
		.route("/viewers/{id}/download", get(download))
		.route("/viewers/{id}/surface", post(surface_event))
		.route("/viewers/{id}/controls", post(update_controls))
		.route("/viewers/{id}/print", post(print))
		.route("/viewers/{id}/print-jobs", get(print_jobs))
		.route("/viewers/{id}/notice", delete(dismiss_notice))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenViewer {
	document_url: String,
	#[serde(default)]
	file_name: Option<String>,
	#[serde(default)]
	auto_print: bool,
}

#[derive(Debug, Serialize)]
struct ViewerResponse {
	id: Uuid,
	#[serde(flatten)]
	snapshot: ViewerSnapshot,
}

/// Reported by the client once it tried to render the object URL.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum SurfaceEvent {
	Loaded {
		#[serde(default, rename = "totalPages")]
		total_pages: Option<u32>,
	},
	Failed {
		#[serde(default)]
		reason: Option<String>,
	},
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ControlAction {
	ZoomIn,
	ZoomOut,
	SetScale { scale: f64 },
	NextPage,
	PreviousPage,
	GoTo { page: u32 },
}

#[derive(Debug, Serialize)]
struct ControlsResponse {
	rerender: bool,
	controls: PageControls,
}

fn session(state: &AppState, id: Uuid) -> Result<Session, ApiError> {
	state.sessions.get(&id).ok_or(ApiError::UnknownViewer(id))
}

/// Opens a viewer session. A failed fetch still creates the session, in the `failed` state.
#[instrument(skip_all, fields(url = %request.document_url))]
async fn open_viewer(
	State(state): State<AppState>,
	Json(request): Json<OpenViewer>,
) -> impl IntoResponse {
	let (id, session) = state.sessions.create();
	session
		.viewer
		.open(
			&request.document_url,
			request.file_name.as_deref(),
			request.auto_print,
		)
		.await;
	let snapshot = session.viewer.snapshot();
	(StatusCode::CREATED, Json(ViewerResponse { id, snapshot }))
}

async fn list_viewers(State(state): State<AppState>) -> Json<Vec<ViewerResponse>> {
	let viewers = state
		.sessions
		.list()
		.into_iter()
		.map(|(id, session)| ViewerResponse {
			id,
			snapshot: session.viewer.snapshot(),
		})
		.collect();
	Json(viewers)
}

/// Opens another document in an existing session. The previous document is released.
#[instrument(skip_all, fields(%id, url = %request.document_url))]
async fn reopen_viewer(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(request): Json<OpenViewer>,
) -> Result<Json<ViewerResponse>, ApiError> {
	let viewer = session(&state, id)?.viewer;
	viewer
		.open(
			&request.document_url,
			request.file_name.as_deref(),
			request.auto_print,
		)
		.await;
	Ok(Json(ViewerResponse {
		id,
		snapshot: viewer.snapshot(),
	}))
}

#[instrument(skip_all, fields(%id))]
async fn viewer(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<ViewerResponse>, ApiError> {
	let snapshot = session(&state, id)?.viewer.snapshot();
	Ok(Json(ViewerResponse { id, snapshot }))
}

fn document_response(
	disposition: &str,
	media_type: &str,
	file_name: &str,
	bytes: Bytes,
) -> Response {
	(
		[
			(CONTENT_TYPE, media_type.to_owned()),
			(CONTENT_DISPOSITION, content_disposition(disposition, file_name)),
		],
		bytes,
	)
		.into_response()
}

#[instrument(skip_all, fields(%id))]
async fn viewer_blob(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
	let blob = session(&state, id)?
		.viewer
		.blob()
		.ok_or(ApiError::NoDocument)?;
	Ok(document_response(
		"inline",
		blob.media_type.as_ref(),
		&blob.file_name,
		blob.bytes,
	))
}

/// Download sink of the HTTP API. The activated link is answered as an attachment.
#[derive(Default)]
struct AttachmentSink {
	activated: Mutex<Option<DownloadLink>>,
}

impl DownloadSink for AttachmentSink {
	fn attach(&self, link: &DownloadLink) -> Result<(), DownloadError> {
		trace!(href = %link.href, "Preparing attachment");
		Ok(())
	}

	fn activate(&self, link: &DownloadLink) -> Result<(), DownloadError> {
		*lock(&self.activated) = Some(link.clone());
		Ok(())
	}

	fn detach(&self, _link: &DownloadLink) {}
}

/// Downloads the displayed content, or the original document if nothing could be fetched.
#[instrument(skip_all, fields(%id))]
async fn download(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
	let viewer = session(&state, id)?.viewer;
	let sink = AttachmentSink::default();
	if !viewer.download(&sink) {
		return Err(ApiError::NoDocument);
	}
	let link = lock(&sink.activated).take().ok_or(ApiError::NoDocument)?;

	if link.href.starts_with(OBJECT_URL_PREFIX) {
		let blob = viewer.blob().ok_or(ApiError::NoDocument)?;
		return Ok(document_response(
			"attachment",
			blob.media_type.as_ref(),
			&link.file_name,
			blob.bytes,
		));
	}

	let path = normalize_remote_path(&link.href);
	let bytes = state.backend.fetch_document_binary(&path).await?;
	Ok(document_response(
		"attachment",
		media_type(&path).as_ref(),
		&link.file_name,
		bytes,
	))
}

#[instrument(skip_all, fields(%id))]
async fn surface_event(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(event): Json<SurfaceEvent>,
) -> Result<Json<ViewerResponse>, ApiError> {
	let viewer = session(&state, id)?.viewer;
	let accepted = match event {
		SurfaceEvent::Loaded { total_pages } => viewer.surface_loaded(total_pages),
		SurfaceEvent::Failed { reason } => {
			viewer.surface_failed(reason.as_deref().unwrap_or("unknown render error"))
		}
	};
	if !accepted {
		return Err(ApiError::NotLoading);
	}
	Ok(Json(ViewerResponse {
		id,
		snapshot: viewer.snapshot(),
	}))
}

#[instrument(skip_all, fields(%id))]
async fn update_controls(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(action): Json<ControlAction>,
) -> Result<Json<ControlsResponse>, ApiError> {
	let viewer = session(&state, id)?.viewer;
	let rerender = viewer.update_controls(|controls| match action {
		ControlAction::ZoomIn => controls.zoom_in(),
		ControlAction::ZoomOut => controls.zoom_out(),
		ControlAction::SetScale { scale } => controls.set_scale(scale),
		ControlAction::NextPage => controls.next_page(),
		ControlAction::PreviousPage => controls.previous_page(),
		ControlAction::GoTo { page } => controls.go_to(page),
	});
	Ok(Json(ControlsResponse {
		rerender,
		controls: viewer.snapshot().controls,
	}))
}

/// Prints the displayed document. The resulting jobs are collected through `print-jobs`.
#[instrument(skip_all, fields(%id))]
async fn print(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	let viewer = session(&state, id)?.viewer;
	match viewer.print() {
		Some(_) => Ok(StatusCode::ACCEPTED),
		None => Err(ApiError::NotPrintable),
	}
}

#[instrument(skip_all, fields(%id))]
async fn print_jobs(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<Vec<PrintJob>>, ApiError> {
	Ok(Json(session(&state, id)?.prints.take()))
}

#[instrument(skip_all, fields(%id))]
async fn dismiss_notice(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	session(&state, id)?.viewer.notices().dismiss();
	Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(%id))]
async fn close_viewer(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	if state.sessions.remove(&id) {
		Ok(StatusCode::NO_CONTENT)
	} else {
		Err(ApiError::UnknownViewer(id))
	}
}
