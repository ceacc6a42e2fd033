//! Collaborators of the consent subsystem.
//! The clinical application's REST backend owns templates, patient uploads and the stored
//! binaries. Everything here talks to it through [`ConsentBackend`].

pub mod http;

#[cfg(test)]
pub mod mock;

use crate::consent::{ConsentFormTemplate, PatientConsentFormInstance};
use crate::types::{PatientId, TemplateId};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

#[async_trait]
pub trait ConsentBackend: Send + Sync {
	async fn fetch_consent_form_templates(&self) -> Result<Vec<ConsentFormTemplate>, FetchError>;

	async fn fetch_patient_consent_forms(
		&self,
		patient_id: &PatientId,
	) -> Result<Vec<PatientConsentFormInstance>, FetchError>;

	async fn upload_consent_form(
		&self,
		patient_id: &PatientId,
		template_id: &TemplateId,
		file: UploadFile,
	) -> Result<PatientConsentFormInstance, UploadError>;

	/// Fetches a stored binary. The path must already be normalized.
	async fn fetch_document_binary(&self, relative_path: &str) -> Result<Bytes, FetchError>;
}

/// A signed consent form as received from the user.
#[derive(Debug, Clone)]
pub struct UploadFile {
	pub file_name: String,
	pub content_type: Option<String>,
	pub bytes: Bytes,
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
	#[error("request for {resource} failed: {reason}")]
	Transport { resource: String, reason: String },
	#[error("{resource} returned HTTP status {status}")]
	Status { resource: String, status: u16 },
	#[error("{resource} was rejected by the backend: {reason}")]
	Rejected { resource: String, reason: String },
	#[error("failed to decode {resource}: {reason}")]
	Decode { resource: String, reason: String },
	#[error("`{path}` is not a valid document path")]
	InvalidPath { path: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
	#[error("The upload does not contain a file")]
	MissingFile,
	#[error("The file exceeds the configured upload size limit")]
	UploadLimitExceeded,
	#[error(transparent)]
	Fetch(#[from] FetchError),
}

/// The `{success, data | error}` envelope every backend response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
	#[serde(default)]
	pub success: bool,
	pub data: Option<T>,
	pub error: Option<String>,
	pub message: Option<String>,
}

impl<T> Envelope<T> {
	fn rejection(self, resource: &str) -> FetchError {
		FetchError::Rejected {
			resource: resource.to_owned(),
			reason: self
				.error
				.or(self.message)
				.unwrap_or_else(|| String::from("unknown error")),
		}
	}

	/// Unwraps the payload, treating `success: false` and a missing payload as errors.
	pub fn into_data(self, resource: &str) -> Result<T, FetchError> {
		if !self.success {
			return Err(self.rejection(resource));
		}
		self.data.ok_or_else(|| FetchError::Decode {
			resource: resource.to_owned(),
			reason: String::from("response carries no data"),
		})
	}
}

impl<T: Default> Envelope<T> {
	/// Like [`Envelope::into_data`], but a successful response without payload is empty.
	pub fn into_data_or_default(self, resource: &str) -> Result<T, FetchError> {
		if self.success {
			Ok(self.data.unwrap_or_default())
		} else {
			Err(self.rejection(resource))
		}
	}
}
