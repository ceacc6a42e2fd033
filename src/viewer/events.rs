use crate::documents::ViewerKind;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Payload of a view signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
	pub document_url: String,
	#[serde(default)]
	pub file_name: Option<String>,
}

/// A request, from anywhere in the host application, to show a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSignal {
	Pdf(ViewRequest),
	Image(ViewRequest),
}

impl ViewSignal {
	pub const fn viewer(&self) -> ViewerKind {
		match self {
			Self::Pdf(_) => ViewerKind::Pdf,
			Self::Image(_) => ViewerKind::Image,
		}
	}

	pub const fn request(&self) -> &ViewRequest {
		match self {
			Self::Pdf(request) | Self::Image(request) => request,
		}
	}

	pub fn into_request(self) -> ViewRequest {
		match self {
			Self::Pdf(request) | Self::Image(request) => request,
		}
	}
}

/// Broadcast bus for [`ViewSignal`]s.
#[derive(Debug, Clone)]
pub struct ViewSignals {
	sender: broadcast::Sender<ViewSignal>,
}

impl ViewSignals {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Publishes a signal. Returns how many listeners received it.
	pub fn emit(&self, signal: ViewSignal) -> usize {
		trace!(viewer = ?signal.viewer(), url = %signal.request().document_url, "Emitting view signal");
		self.sender.send(signal).unwrap_or(0)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ViewSignal> {
		self.sender.subscribe()
	}
}
