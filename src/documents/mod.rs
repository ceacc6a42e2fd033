//! Binary documents (signed forms and blank templates) fetched from the backend.

pub mod blob;

pub use blob::{
	release_document, BlobHandle, BlobRegistry, DocumentOpener, StoredBlob, OBJECT_URL_PREFIX,
};

use mime::Mime;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The document fetch endpoint is already rooted at the uploads directory.
pub const UPLOADS_PREFIX: &str = "uploads/";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg", "tif", "tiff"];

/// Normalizes a stored file path into the path expected by the document fetch endpoint.
///
/// Backslashes become forward slashes, leading slashes are dropped and a single leading
/// `uploads/` segment is stripped.
pub fn normalize_remote_path(path: &str) -> String {
	let path = path.trim().replace('\\', "/");
	let path = path.trim_start_matches('/');
	path.strip_prefix(UPLOADS_PREFIX)
		.unwrap_or(path)
		.to_owned()
}

/// The final path segment.
pub fn file_name_of(path: &str) -> Option<&str> {
	path.rsplit('/').next().filter(|name| !name.is_empty())
}

fn extension_of(path: &str) -> Option<String> {
	file_name_of(path)
		.and_then(|name| name.rsplit_once('.'))
		.map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Document kind as detected from the file extension. Content is never sniffed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
	Pdf,
	Image,
	#[default]
	Unknown,
}

impl DocumentKind {
	pub fn from_path(path: &str) -> Self {
		match extension_of(path).as_deref() {
			Some("pdf") => Self::Pdf,
			Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => Self::Image,
			_ => Self::Unknown,
		}
	}

	/// Only PDFs go to the PDF viewer; everything else is shown as an image.
	pub const fn viewer(self) -> ViewerKind {
		match self {
			Self::Pdf => ViewerKind::Pdf,
			Self::Image | Self::Unknown => ViewerKind::Image,
		}
	}
}

impl Display for DocumentKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Pdf => write!(f, "pdf"),
			Self::Image => write!(f, "image"),
			Self::Unknown => write!(f, "unknown"),
		}
	}
}

/// The render surface a document is routed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerKind {
	Pdf,
	Image,
}

/// Media type served for a document path.
pub fn media_type(path: &str) -> Mime {
	match extension_of(path).as_deref() {
		Some("pdf") => mime::APPLICATION_PDF,
		Some("png") => mime::IMAGE_PNG,
		Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
		Some("gif") => mime::IMAGE_GIF,
		Some("bmp") => mime::IMAGE_BMP,
		Some("svg") => mime::IMAGE_SVG,
		Some("webp") => parse_media_type("image/webp"),
		Some("tif" | "tiff") => parse_media_type("image/tiff"),
		_ => mime::APPLICATION_OCTET_STREAM,
	}
}

fn parse_media_type(essence: &str) -> Mime {
	essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_leading_uploads_segment() {
		assert_eq!(
			normalize_remote_path("uploads/consent-forms/patients/5/trus.pdf"),
			"consent-forms/patients/5/trus.pdf"
		);
		assert_eq!(
			normalize_remote_path("\\uploads\\consent-forms\\a.png"),
			"consent-forms/a.png"
		);
		assert_eq!(
			normalize_remote_path("consent-forms/uploads/a.pdf"),
			"consent-forms/uploads/a.pdf"
		);
		assert_eq!(normalize_remote_path("uploads/uploads/a.pdf"), "uploads/a.pdf");
	}

	#[test]
	fn detects_kind_from_final_segment() {
		assert_eq!(DocumentKind::from_path("a/b/TRUS.PDF"), DocumentKind::Pdf);
		assert_eq!(DocumentKind::from_path("a/b/scan.JpG"), DocumentKind::Image);
		assert_eq!(DocumentKind::from_path("pdf.folder/readme"), DocumentKind::Unknown);
		assert_eq!(DocumentKind::from_path("a/b/"), DocumentKind::Unknown);
	}

	#[test]
	fn everything_but_pdf_routes_to_the_image_viewer() {
		assert_eq!(DocumentKind::Pdf.viewer(), ViewerKind::Pdf);
		assert_eq!(DocumentKind::Image.viewer(), ViewerKind::Image);
		assert_eq!(DocumentKind::Unknown.viewer(), ViewerKind::Image);
	}

	#[test]
	fn media_types() {
		assert_eq!(media_type("x.pdf"), mime::APPLICATION_PDF);
		assert_eq!(media_type("x.jpeg"), mime::IMAGE_JPEG);
		assert_eq!(media_type("x.webp").essence_str(), "image/webp");
		assert_eq!(media_type("x.docx"), mime::APPLICATION_OCTET_STREAM);
	}
}
