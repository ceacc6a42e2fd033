use super::events::{ViewSignal, ViewSignals};
use super::print::PrintQueue;
use super::Viewer;
use crate::config::ViewerConfig;
use crate::documents::{DocumentOpener, ViewerKind};
use crate::utils::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// A viewer driven by a remote client, and the print jobs waiting for that client.
#[derive(Clone)]
pub struct Session {
	pub viewer: Arc<Viewer>,
	pub prints: Arc<PrintQueue>,
}

/// The open viewer sessions, keyed by id.
///
/// View signals of one kind always reuse the same session, so a new signal replaces the
/// document shown for the previous one.
#[derive(Clone)]
pub struct ViewerSessions {
	sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
	signal_sessions: Arc<Mutex<HashMap<ViewerKind, Uuid>>>,
	opener: DocumentOpener,
	config: ViewerConfig,
}

impl ViewerSessions {
	pub fn new(opener: DocumentOpener, config: ViewerConfig) -> Self {
		Self {
			sessions: Arc::default(),
			signal_sessions: Arc::default(),
			opener,
			config,
		}
	}

	pub fn create(&self) -> (Uuid, Session) {
		let id = Uuid::new_v4();
		let session = Session {
			viewer: Arc::new(Viewer::new(self.opener.clone(), &self.config)),
			prints: Arc::new(PrintQueue::default()),
		};
		session.viewer.attach_surface(session.prints.clone());
		lock(&self.sessions).insert(id, session.clone());
		debug!(%id, "Created viewer session");
		(id, session)
	}

	pub fn get(&self, id: &Uuid) -> Option<Session> {
		lock(&self.sessions).get(id).cloned()
	}

	pub fn list(&self) -> Vec<(Uuid, Session)> {
		lock(&self.sessions)
			.iter()
			.map(|(id, session)| (*id, session.clone()))
			.collect()
	}

	/// The session that shows view signals of one kind. Created again if it was removed.
	pub fn signal_session(&self, viewer: ViewerKind) -> (Uuid, Session) {
		let mut signal_sessions = lock(&self.signal_sessions);
		if let Some(id) = signal_sessions.get(&viewer).copied() {
			if let Some(session) = self.get(&id) {
				return (id, session);
			}
		}
		let (id, session) = self.create();
		signal_sessions.insert(viewer, id);
		(id, session)
	}

	/// Closes the viewer and forgets the session.
	pub fn remove(&self, id: &Uuid) -> bool {
		let Some(session) = lock(&self.sessions).remove(id) else {
			return false;
		};
		session.viewer.close();
		session.viewer.detach_surface();

		let registry = self.opener.registry();
		debug!(
			%id,
			open = self.len(),
			live = registry.live(),
			released = registry.released(),
			"Removed viewer session"
		);
		if self.is_empty() {
			trace!("No viewer sessions left");
		}
		true
	}

	pub fn len(&self) -> usize {
		lock(&self.sessions).len()
	}

	pub fn is_empty(&self) -> bool {
		lock(&self.sessions).is_empty()
	}

	/// Opens a new viewer session for every view signal until the bus is closed.
	pub fn listen(&self, signals: &ViewSignals) -> JoinHandle<()> {
		let mut receiver = signals.subscribe();
		let sessions = self.clone();
		tokio::spawn(async move {
			loop {
				match receiver.recv().await {
					Ok(signal) => sessions.open_signal(signal).await,
					Err(RecvError::Lagged(skipped)) => {
						warn!(skipped, "View signal listener fell behind, signals were dropped");
					}
					Err(RecvError::Closed) => break,
				}
			}
			debug!("View signal bus closed");
		})
	}

	async fn open_signal(&self, signal: ViewSignal) {
		let viewer_kind = signal.viewer();
		let request = signal.into_request();
		let (id, session) = self.signal_session(viewer_kind);
		info!(%id, viewer = ?viewer_kind, url = %request.document_url, "Opening document for view signal");
		let outcome = session
			.viewer
			.open_in(
				viewer_kind,
				&request.document_url,
				request.file_name.as_deref(),
				false,
			)
			.await;
		debug!(%id, ?outcome, "Handled view signal");
	}
}
