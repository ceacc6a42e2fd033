//! The document viewer.
//! - One document at a time, rendered into a PDF frame or an image element.
//! - The viewer exclusively owns the [`BlobHandle`] of the displayed document.
//! - A newer open request always supersedes an older one; late responses are released unseen.

pub mod controls;
pub mod download;
pub mod events;
pub mod notice;
pub mod print;
pub mod sessions;

use crate::config::ViewerConfig;
use crate::consent::DEFAULT_FILE_NAME;
use crate::documents::{
	file_name_of, release_document, BlobHandle, DocumentKind, DocumentOpener, StoredBlob, ViewerKind,
};
use crate::utils::lock;
use controls::PageControls;
use download::{trigger_download, DownloadError, DownloadLink, DownloadSink};
use notice::{Notice, NoticeBoard, NoticeLevel};
use print::{print_best_effort, RenderSurface, IMAGE_STRATEGIES, PDF_STRATEGIES};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerState {
	Idle,
	Loading,
	Ready,
	Failed,
}

/// The render surface could not display the document.
#[derive(Debug, Error)]
#[error("The document could not be displayed: {reason}")]
pub struct RenderError {
	pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
	/// The document was fetched and handed to the render surface.
	Opened,
	/// The fetch failed; the viewer shows the error.
	Failed,
	/// A newer request or a close overtook this one; its content was released.
	Superseded,
}

#[derive(Debug, Clone)]
struct OpenRequest {
	token: u64,
	path: String,
	file_name: Option<String>,
	auto_print: bool,
	/// Viewer asked for by the caller, used when the extension says nothing.
	viewer: Option<ViewerKind>,
}

struct ViewerInner {
	state: ViewerState,
	request: Option<OpenRequest>,
	handle: Option<BlobHandle>,
	error: Option<String>,
	last_token: u64,
	auto_print_triggered: bool,
	surface: Option<Arc<dyn RenderSurface>>,
	controls: PageControls,
}

impl ViewerInner {
	fn is_current(&self, token: u64) -> bool {
		self.request
			.as_ref()
			.is_some_and(|request| request.token == token)
	}

	fn release_handle(&mut self) {
		release_document(self.handle.as_mut());
		self.handle = None;
	}

	fn kind(&self) -> Option<DocumentKind> {
		self.handle.as_ref().map(BlobHandle::kind).or_else(|| {
			self.request
				.as_ref()
				.map(|request| DocumentKind::from_path(&request.path))
		})
	}

	/// Routing by extension, unless the extension is unknown and a viewer was asked for.
	fn viewer(&self) -> Option<ViewerKind> {
		let kind = self.kind()?;
		let requested = self.request.as_ref().and_then(|request| request.viewer);
		Some(match (kind, requested) {
			(DocumentKind::Unknown, Some(viewer)) => viewer,
			(kind, _) => kind.viewer(),
		})
	}

	fn download_link(&self) -> Option<DownloadLink> {
		if let Some(handle) = &self.handle {
			return Some(DownloadLink {
				href: handle.url().to_owned(),
				file_name: handle.file_name().to_owned(),
			});
		}
		self.request.as_ref().map(|request| DownloadLink {
			href: request.path.clone(),
			file_name: request
				.file_name
				.clone()
				.or_else(|| file_name_of(&request.path).map(str::to_owned))
				.unwrap_or_else(|| DEFAULT_FILE_NAME.to_owned()),
		})
	}
}

/// What the host UI renders for a viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSnapshot {
	pub state: ViewerState,
	pub show_spinner: bool,
	pub show_error: bool,
	pub show_content: bool,
	pub document_path: Option<String>,
	/// The normalized path the displayed content was fetched from.
	pub source_path: Option<String>,
	pub file_name: Option<String>,
	pub kind: Option<DocumentKind>,
	pub viewer: Option<ViewerKind>,
	pub object_url: Option<String>,
	pub error: Option<String>,
	pub can_download: bool,
	pub notice: Option<Notice>,
	pub controls: PageControls,
}

pub struct Viewer {
	opener: DocumentOpener,
	notices: NoticeBoard,
	print_delay: Duration,
	inner: Mutex<ViewerInner>,
}

impl Viewer {
	pub fn new(opener: DocumentOpener, config: &ViewerConfig) -> Self {
		Self {
			opener,
			notices: NoticeBoard::new(Duration::from_millis(config.notice_timeout)),
			print_delay: Duration::from_millis(config.auto_print_delay),
			inner: Mutex::new(ViewerInner {
				state: ViewerState::Idle,
				request: None,
				handle: None,
				error: None,
				last_token: 0,
				auto_print_triggered: false,
				surface: None,
				controls: PageControls::new(config),
			}),
		}
	}

	fn inner(&self) -> MutexGuard<'_, ViewerInner> {
		lock(&self.inner)
	}

	pub const fn notices(&self) -> &NoticeBoard {
		&self.notices
	}

	/// Opens a document, replacing whatever is displayed.
	///
	/// The previous handle is released before the new document is fetched. Fetch failures are
	/// turned into the `Failed` state and a notice.
	pub async fn open(&self, path: &str, file_name: Option<&str>, auto_print: bool) -> OpenOutcome {
		self.open_request(path, file_name, auto_print, None).await
	}

	/// Like [`Viewer::open`], but a document without a recognised extension goes to `viewer`.
	pub async fn open_in(
		&self,
		viewer: ViewerKind,
		path: &str,
		file_name: Option<&str>,
		auto_print: bool,
	) -> OpenOutcome {
		self.open_request(path, file_name, auto_print, Some(viewer))
			.await
	}

	async fn open_request(
		&self,
		path: &str,
		file_name: Option<&str>,
		auto_print: bool,
		viewer: Option<ViewerKind>,
	) -> OpenOutcome {
		let token = {
			let mut inner = self.inner();
			inner.release_handle();
			inner.last_token += 1;
			let token = inner.last_token;
			inner.request = Some(OpenRequest {
				token,
				path: path.to_owned(),
				file_name: file_name.map(str::to_owned),
				auto_print,
				viewer,
			});
			inner.state = ViewerState::Loading;
			inner.error = None;
			inner.auto_print_triggered = false;
			inner.controls.reset();
			token
		};

		info!(path, token, "Opening document");
		let result = self.opener.open_document(path, file_name).await;

		let mut inner = self.inner();
		if !inner.is_current(token) {
			drop(inner);
			debug!(path, token, "Discarding superseded document response");
			if let Ok(mut handle) = result {
				handle.release();
			}
			return OpenOutcome::Superseded;
		}

		match result {
			Ok(handle) => {
				inner.handle = Some(handle);
				OpenOutcome::Opened
			}
			Err(err) => {
				inner.state = ViewerState::Failed;
				inner.error = Some(err.to_string());
				drop(inner);
				warn!(path, "Failed to open document: {err}");
				self.notices
					.post(NoticeLevel::Error, format!("Failed to load document: {err}"));
				OpenOutcome::Failed
			}
		}
	}

	/// Closes the viewer from any state. A fetch still in flight is released once it resolves.
	pub fn close(&self) {
		let mut inner = self.inner();
		inner.release_handle();
		inner.request = None;
		inner.state = ViewerState::Idle;
		inner.error = None;
		inner.auto_print_triggered = false;
		inner.controls.reset();
		debug!("Closed viewer");
	}

	pub fn attach_surface(&self, surface: Arc<dyn RenderSurface>) {
		self.inner().surface = Some(surface);
	}

	pub fn detach_surface(&self) {
		self.inner().surface = None;
	}

	/// The render surface finished loading the current document.
	///
	/// Schedules the auto-print if it was requested and has not run in this open cycle.
	pub fn surface_loaded(self: &Arc<Self>, total_pages: Option<u32>) -> bool {
		let mut inner = self.inner();
		if inner.state != ViewerState::Loading || inner.handle.is_none() {
			debug!(state = ?inner.state, "Ignoring load signal outside of a loading cycle");
			return false;
		}

		inner.state = ViewerState::Ready;
		if let Some(total_pages) = total_pages {
			inner.controls.set_total_pages(total_pages);
		}

		let auto_print = inner
			.request
			.as_ref()
			.filter(|request| request.auto_print && !inner.auto_print_triggered)
			.map(|request| request.token);
		if let Some(token) = auto_print {
			inner.auto_print_triggered = true;
			drop(inner);
			self.schedule_print(token);
		}
		true
	}

	/// The render surface could not display the current document. Never retried.
	pub fn surface_failed(&self, reason: &str) -> bool {
		let mut inner = self.inner();
		if inner.state != ViewerState::Loading {
			debug!(state = ?inner.state, "Ignoring render failure outside of a loading cycle");
			return false;
		}
		let err = RenderError {
			reason: reason.to_owned(),
		};
		warn!("{err}");
		inner.state = ViewerState::Failed;
		inner.error = Some(err.to_string());
		true
	}

	fn schedule_print(self: &Arc<Self>, token: u64) {
		let viewer = Arc::clone(self);
		let delay = self.print_delay;
		tokio::spawn(async move {
			// Give the surface time to lay out the content.
			tokio::time::sleep(delay).await;
			let displayed = {
				let inner = viewer.inner();
				inner.is_current(token) && inner.state == ViewerState::Ready
			};
			if displayed {
				viewer.print();
			} else {
				debug!(token, "Skipping auto-print for a document that is no longer displayed");
			}
		});
	}

	/// Prints the displayed document. Failures are logged, never surfaced.
	pub fn print(&self) -> Option<&'static str> {
		let (surface, viewer) = {
			let inner = self.inner();
			if inner.state != ViewerState::Ready {
				debug!(state = ?inner.state, "Nothing to print");
				return None;
			}
			let Some(surface) = inner.surface.clone() else {
				warn!("No render surface attached, cannot print");
				return None;
			};
			(surface, inner.viewer().unwrap_or(ViewerKind::Image))
		};

		let strategies = match viewer {
			ViewerKind::Pdf => PDF_STRATEGIES,
			ViewerKind::Image => IMAGE_STRATEGIES,
		};
		print_best_effort(surface.as_ref(), strategies)
	}

	/// Link to the displayed content, or to the original remote path if nothing was fetched.
	pub fn download_link(&self) -> Option<DownloadLink> {
		self.inner().download_link()
	}

	/// Downloads the current document. Failures become a notice.
	pub fn download(&self, sink: &dyn DownloadSink) -> bool {
		let result = self
			.download_link()
			.ok_or(DownloadError::NothingToDownload)
			.and_then(|link| trigger_download(sink, &link));

		match result {
			Ok(()) => true,
			Err(err) => {
				warn!("{err}");
				self.notices.post(NoticeLevel::Warning, err.to_string());
				false
			}
		}
	}

	/// Applies a zoom or pagination change. Returns whether the page must be rendered again.
	pub fn update_controls(&self, update: impl FnOnce(&mut PageControls) -> bool) -> bool {
		let mut inner = self.inner();
		let rerender = update(&mut inner.controls);
		let controls = inner.controls;
		trace!(
			page = controls.page(),
			total_pages = controls.total_pages(),
			scale = controls.scale(),
			rerender,
			"Updated page controls"
		);
		rerender
	}

	/// Content of the displayed document.
	pub fn blob(&self) -> Option<StoredBlob> {
		let inner = self.inner();
		inner
			.handle
			.as_ref()
			.and_then(|handle| self.opener.registry().resolve(handle.url()))
	}

	pub fn snapshot(&self) -> ViewerSnapshot {
		let inner = self.inner();
		let kind = inner.kind();
		let viewer = inner.viewer();
		ViewerSnapshot {
			state: inner.state,
			show_spinner: inner.state == ViewerState::Loading,
			show_error: inner.state == ViewerState::Failed,
			show_content: inner.state == ViewerState::Ready,
			document_path: inner.request.as_ref().map(|request| request.path.clone()),
			source_path: inner
				.handle
				.as_ref()
				.map(|handle| handle.source_path().to_owned()),
			file_name: inner.download_link().map(|link| link.file_name),
			kind,
			viewer,
			object_url: inner.handle.as_ref().map(|handle| handle.url().to_owned()),
			error: inner.error.clone(),
			can_download: inner.request.is_some(),
			notice: self.notices.current(),
			controls: inner.controls,
		}
	}
}

impl Drop for Viewer {
	fn drop(&mut self) {
		lock(&self.inner).release_handle();
	}
}
