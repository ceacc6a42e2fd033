use crate::utils::lock;
use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
	Info,
	Warning,
	Error,
}

/// A transient, dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
	pub id: u64,
	pub level: NoticeLevel,
	pub message: String,
}

#[derive(Default)]
struct Board {
	current: Option<Notice>,
	expiry: Option<JoinHandle<()>>,
	last_id: u64,
}

impl Drop for Board {
	fn drop(&mut self) {
		if let Some(expiry) = self.expiry.take() {
			expiry.abort();
		}
	}
}

/// Holds at most one notice and clears it after a fixed delay.
///
/// Posting a notice cancels the pending expiry of the previous one, so an old timer never
/// clears a newer message. Posting requires a Tokio runtime.
#[derive(Clone)]
pub struct NoticeBoard {
	board: Arc<Mutex<Board>>,
	timeout: Duration,
}

impl NoticeBoard {
	pub fn new(timeout: Duration) -> Self {
		Self {
			board: Arc::new(Mutex::new(Board::default())),
			timeout,
		}
	}

	pub fn post(&self, level: NoticeLevel, message: impl Into<String>) -> u64 {
		let mut board = lock(&self.board);
		if let Some(expiry) = board.expiry.take() {
			expiry.abort();
		}

		board.last_id += 1;
		let id = board.last_id;
		board.current = Some(Notice {
			id,
			level,
			message: message.into(),
		});
		board.expiry = Some(tokio::spawn(expire(
			Arc::downgrade(&self.board),
			id,
			self.timeout,
		)));
		id
	}

	pub fn current(&self) -> Option<Notice> {
		lock(&self.board).current.clone()
	}

	pub fn dismiss(&self) {
		let mut board = lock(&self.board);
		if let Some(expiry) = board.expiry.take() {
			expiry.abort();
		}
		board.current = None;
	}
}

async fn expire(board: Weak<Mutex<Board>>, id: u64, timeout: Duration) {
	tokio::time::sleep(timeout).await;
	let Some(board) = board.upgrade() else {
		return;
	};
	let mut board = lock(&board);
	if board.current.as_ref().is_some_and(|notice| notice.id == id) {
		trace!(id, "Notice expired");
		board.current = None;
		board.expiry = None;
	}
}
