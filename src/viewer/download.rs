use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
	#[error("There is no document to download")]
	NothingToDownload,
	#[error("Download failed: {0}")]
	Failed(String),
}

/// A link to the current document with a suggested file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
	pub href: String,
	pub file_name: String,
}

/// Where download links are placed and activated, e.g. the host page.
pub trait DownloadSink: Send + Sync {
	fn attach(&self, link: &DownloadLink) -> Result<(), DownloadError>;

	fn activate(&self, link: &DownloadLink) -> Result<(), DownloadError>;

	fn detach(&self, link: &DownloadLink);
}

/// Detaches the link again however activation ends.
struct AttachedLink<'a> {
	sink: &'a dyn DownloadSink,
	link: &'a DownloadLink,
}

impl Drop for AttachedLink<'_> {
	fn drop(&mut self) {
		self.sink.detach(self.link);
	}
}

/// Attaches a transient link, activates it and removes it.
pub fn trigger_download(sink: &dyn DownloadSink, link: &DownloadLink) -> Result<(), DownloadError> {
	sink.attach(link)?;
	let _attached = AttachedLink { sink, link };
	sink.activate(link)
}


#[cfg(test)]
mod tests {
	use super::testing::RecordingSink;
	use super::*;

	fn link() -> DownloadLink {
		DownloadLink {
			href: String::from("blob:consent-rst/1"),
			file_name: String::from("trus.pdf"),
		}
	}

	#[test]
	fn link_is_removed_after_activation() {
		let sink = RecordingSink::default();
		trigger_download(&sink, &link()).unwrap();
		assert_eq!(
			*sink.events.lock().unwrap(),
			vec!["attach blob:consent-rst/1", "activate trus.pdf", "detach blob:consent-rst/1"]
		);
	}

	#[test]
	fn link_is_removed_when_activation_fails() {
		let sink = RecordingSink {
			fail_activate: true,
			..RecordingSink::default()
		};
		assert!(trigger_download(&sink, &link()).is_err());
		assert_eq!(sink.events.lock().unwrap().last().unwrap(), "detach blob:consent-rst/1");
	}
}
