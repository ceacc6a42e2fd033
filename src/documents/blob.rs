use super::{file_name_of, media_type, normalize_remote_path, DocumentKind};
use crate::backend::{ConsentBackend, FetchError};
use crate::consent::DEFAULT_FILE_NAME;
use crate::utils::lock;
use bytes::Bytes;
use mime::Mime;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

/// Scheme prefix of the object URLs handed out by the [`BlobRegistry`].
pub const OBJECT_URL_PREFIX: &str = "blob:consent-rst/";

/// Fetched binary content kept alive for as long as a handle references it.
#[derive(Debug, Clone)]
pub struct StoredBlob {
	pub bytes: Bytes,
	pub media_type: Mime,
	pub file_name: String,
}

#[derive(Debug, Default)]
struct RegistryInner {
	blobs: Mutex<HashMap<Uuid, StoredBlob>>,
	released: AtomicUsize,
}

/// Process-local store behind object URLs.
///
/// Every entry is owned by exactly one [`BlobHandle`] and removed when that handle is released.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
	inner: Arc<RegistryInner>,
}

impl BlobRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	fn blobs(&self) -> MutexGuard<'_, HashMap<Uuid, StoredBlob>> {
		lock(&self.inner.blobs)
	}

	fn register(&self, blob: StoredBlob) -> String {
		let id = Uuid::new_v4();
		self.blobs().insert(id, blob);
		format!("{OBJECT_URL_PREFIX}{id}")
	}

	fn revoke(&self, url: &str) -> bool {
		let removed = parse_object_url(url).and_then(|id| self.blobs().remove(&id));
		if removed.is_some() {
			self.inner.released.fetch_add(1, Ordering::Relaxed);
		}
		removed.is_some()
	}

	/// Dereferences an object URL.
	pub fn resolve(&self, url: &str) -> Option<StoredBlob> {
		parse_object_url(url).and_then(|id| self.blobs().get(&id).cloned())
	}

	/// Number of handles currently holding content.
	pub fn live(&self) -> usize {
		self.blobs().len()
	}

	/// Total number of handles released since the registry was created.
	pub fn released(&self) -> usize {
		self.inner.released.load(Ordering::Relaxed)
	}
}

fn parse_object_url(url: &str) -> Option<Uuid> {
	url.strip_prefix(OBJECT_URL_PREFIX)
		.and_then(|id| Uuid::parse_str(id).ok())
}

/// A revocable reference to fetched document content.
///
/// Release is idempotent. A handle that goes out of scope unreleased releases itself.
pub struct BlobHandle {
	url: String,
	file_name: String,
	kind: DocumentKind,
	source_path: String,
	registry: BlobRegistry,
	released: bool,
}

impl BlobHandle {
	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn file_name(&self) -> &str {
		&self.file_name
	}

	pub const fn kind(&self) -> DocumentKind {
		self.kind
	}

	/// The normalized remote path the content was fetched from.
	pub fn source_path(&self) -> &str {
		&self.source_path
	}

	/// Releases the content. Returns `false` if it was already released.
	pub fn release(&mut self) -> bool {
		if self.released {
			return false;
		}
		self.released = true;
		trace!(url = %self.url, "Releasing blob handle");
		self.registry.revoke(&self.url)
	}
}

impl Debug for BlobHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BlobHandle")
			.field("url", &self.url)
			.field("file_name", &self.file_name)
			.field("kind", &self.kind)
			.field("released", &self.released)
			.finish_non_exhaustive()
	}
}

impl Drop for BlobHandle {
	fn drop(&mut self) {
		if !self.released {
			debug!(url = %self.url, "Releasing blob handle dropped while live");
			self.release();
		}
	}
}

/// Releases a handle if there is one. Releasing twice or releasing nothing is a no-op.
pub fn release_document(handle: Option<&mut BlobHandle>) {
	if let Some(handle) = handle {
		handle.release();
	}
}

/// Fetches documents from the backend and registers them as object URLs.
#[derive(Clone)]
pub struct DocumentOpener {
	backend: Arc<dyn ConsentBackend>,
	registry: BlobRegistry,
}

impl DocumentOpener {
	pub fn new(backend: Arc<dyn ConsentBackend>, registry: BlobRegistry) -> Self {
		Self { backend, registry }
	}

	pub const fn registry(&self) -> &BlobRegistry {
		&self.registry
	}

	/// Fetches the document at `remote_path` and wraps it in a [`BlobHandle`].
	///
	/// Nothing is registered if the fetch fails.
	#[instrument(skip(self))]
	pub async fn open_document(
		&self,
		remote_path: &str,
		file_name: Option<&str>,
	) -> Result<BlobHandle, FetchError> {
		let source_path = normalize_remote_path(remote_path);
		if file_name_of(&source_path).is_none() {
			warn!("Refusing to open a document without a file name");
			return Err(FetchError::InvalidPath {
				path: remote_path.to_owned(),
			});
		}

		let bytes = self.backend.fetch_document_binary(&source_path).await?;

		let file_name = file_name
			.map(str::trim)
			.filter(|name| !name.is_empty())
			.or_else(|| file_name_of(&source_path))
			.unwrap_or(DEFAULT_FILE_NAME)
			.to_owned();
		let kind = DocumentKind::from_path(&source_path);

		let url = self.registry.register(StoredBlob {
			bytes,
			media_type: media_type(&source_path),
			file_name: file_name.clone(),
		});
		debug!(url = %url, %kind, "Opened document");

		Ok(BlobHandle {
			url,
			file_name,
			kind,
			source_path,
			registry: self.registry.clone(),
			released: false,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::mock::MockBackend;

	fn opener(backend: MockBackend) -> (Arc<MockBackend>, DocumentOpener) {
		let backend = Arc::new(backend);
		let opener = DocumentOpener::new(backend.clone(), BlobRegistry::new());
		(backend, opener)
	}

	#[tokio::test]
	async fn opens_pdf_with_normalized_path() {
		let (backend, opener) = opener(
			MockBackend::new().with_document("consent-forms/patients/5/trus.pdf", b"%PDF-1.7"),
		);

		let handle = opener
			.open_document("uploads/consent-forms/patients/5/trus.pdf", Some("trus.pdf"))
			.await
			.unwrap();

		assert_eq!(backend.fetched(), vec!["consent-forms/patients/5/trus.pdf"]);
		assert_eq!(handle.kind(), DocumentKind::Pdf);
		assert_eq!(handle.file_name(), "trus.pdf");
		let blob = opener.registry().resolve(handle.url()).unwrap();
		assert_eq!(blob.bytes, Bytes::from_static(b"%PDF-1.7"));
		assert_eq!(blob.media_type, mime::APPLICATION_PDF);
	}

	#[tokio::test]
	async fn failed_fetch_registers_nothing() {
		let (_, opener) = opener(MockBackend::new());
		let result = opener.open_document("consent-forms/missing.pdf", None).await;
		assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
		assert_eq!(opener.registry().live(), 0);
	}

	#[tokio::test]
	async fn empty_path_is_refused_without_fetching() {
		let (backend, opener) = opener(MockBackend::new());
		let result = opener.open_document("uploads/", None).await;
		assert!(matches!(result, Err(FetchError::InvalidPath { .. })));
		assert!(backend.fetched().is_empty());
	}

	#[tokio::test]
	async fn release_is_idempotent() {
		let (_, opener) = opener(MockBackend::new().with_document("a/scan.png", b"png"));
		let mut handle = opener.open_document("a/scan.png", None).await.unwrap();
		assert_eq!(handle.file_name(), "scan.png");
		assert_eq!(opener.registry().live(), 1);

		assert!(handle.release());
		assert!(!handle.release());
		release_document(Some(&mut handle));
		release_document(None);
		drop(handle);

		assert_eq!(opener.registry().live(), 0);
		assert_eq!(opener.registry().released(), 1);
	}

	#[tokio::test]
	async fn dropped_handles_release_themselves() {
		let (_, opener) = opener(MockBackend::new().with_document("a/scan.png", b"png"));
		let handle = opener.open_document("a/scan.png", None).await.unwrap();
		let url = handle.url().to_owned();
		drop(handle);
		assert!(opener.registry().resolve(&url).is_none());
		assert_eq!(opener.registry().released(), 1);
	}

	#[test]
	fn foreign_urls_do_not_resolve() {
		let registry = BlobRegistry::new();
		assert!(registry.resolve("blob:https://example.org/123").is_none());
		assert!(registry.resolve("blob:consent-rst/not-a-uuid").is_none());
	}
}
