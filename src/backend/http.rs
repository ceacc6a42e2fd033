use super::{ConsentBackend, Envelope, FetchError, UploadError, UploadFile};
use crate::config::BackendConfig;
use crate::consent::{ConsentFormTemplate, PatientConsentFormInstance};
use crate::types::{PatientId, TemplateId};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, trace, warn};
use url::Url;

/// [`ConsentBackend`] backed by the clinical application's REST API.
pub struct HttpConsentBackend {
	base_url: Url,
	client: reqwest::Client,
}

#[derive(Debug, Error)]
pub enum BackendInitError {
	#[error("invalid backend base URL: {0}")]
	BaseUrl(#[from] url::ParseError),
	#[error("backend base URL `{0}` cannot carry a path")]
	CannotBeABase(String),
	#[error("failed to create HTTP client: {0}")]
	Client(#[from] reqwest::Error),
}

impl HttpConsentBackend {
	pub fn new(config: &BackendConfig) -> Result<Self, BackendInitError> {
		let base_url = Url::parse(&config.base_url)?;
		if base_url.cannot_be_a_base() {
			return Err(BackendInitError::CannotBeABase(config.base_url.clone()));
		}

		let client = reqwest::Client::builder()
			.timeout(Duration::from_millis(config.timeout))
			.build()?;

		info!("Using consent backend {base_url}");
		Ok(Self { base_url, client })
	}

	fn endpoint<'a>(
		&self,
		resource: &str,
		segments: impl IntoIterator<Item = &'a str>,
	) -> Result<Url, FetchError> {
		let mut url = self.base_url.clone();
		{
			let mut path = url.path_segments_mut().map_err(|()| FetchError::Transport {
				resource: resource.to_owned(),
				reason: String::from("backend URL cannot carry a path"),
			})?;
			path.pop_if_empty();
			for segment in segments {
				if segment == ".." || segment == "." {
					return Err(FetchError::InvalidPath {
						path: segment.to_owned(),
					});
				}
				path.push(segment);
			}
		}
		Ok(url)
	}

	async fn send(
		&self,
		resource: &str,
		request: reqwest::RequestBuilder,
	) -> Result<reqwest::Response, FetchError> {
		let response = request.send().await.map_err(|err| transport(resource, &err))?;
		let status = response.status();
		if !status.is_success() {
			warn!(resource, status = status.as_u16(), "Backend request failed");
			return Err(FetchError::Status {
				resource: resource.to_owned(),
				status: status.as_u16(),
			});
		}
		Ok(response)
	}

	async fn envelope<T: DeserializeOwned>(
		&self,
		resource: &str,
		request: reqwest::RequestBuilder,
	) -> Result<Envelope<T>, FetchError> {
		self.send(resource, request)
			.await?
			.json::<Envelope<T>>()
			.await
			.map_err(|err| FetchError::Decode {
				resource: resource.to_owned(),
				reason: err.to_string(),
			})
	}
}

fn transport(resource: &str, err: &reqwest::Error) -> FetchError {
	let reason = if err.is_timeout() {
		String::from("request timed out")
	} else if err.is_connect() {
		format!("backend unreachable: {err}")
	} else {
		err.to_string()
	};
	FetchError::Transport {
		resource: resource.to_owned(),
		reason,
	}
}

#[async_trait]
impl ConsentBackend for HttpConsentBackend {
	#[instrument(skip_all)]
	async fn fetch_consent_form_templates(&self) -> Result<Vec<ConsentFormTemplate>, FetchError> {
		const RESOURCE: &str = "consent-form templates";
		let url = self.endpoint(RESOURCE, ["consent-forms", "templates"])?;
		let templates = self
			.envelope::<Vec<ConsentFormTemplate>>(RESOURCE, self.client.get(url))
			.await?
			.into_data_or_default(RESOURCE)?;
		trace!("Fetched {} consent-form templates", templates.len());
		Ok(templates)
	}

	#[instrument(skip_all, fields(patient = %patient_id))]
	async fn fetch_patient_consent_forms(
		&self,
		patient_id: &PatientId,
	) -> Result<Vec<PatientConsentFormInstance>, FetchError> {
		const RESOURCE: &str = "patient consent forms";
		let url = self.endpoint(
			RESOURCE,
			["consent-forms", "patients", patient_id.as_str()],
		)?;
		let forms = self
			.envelope::<Vec<PatientConsentFormInstance>>(RESOURCE, self.client.get(url))
			.await?
			.into_data_or_default(RESOURCE)?;
		trace!("Fetched {} patient consent forms", forms.len());
		Ok(forms)
	}

	#[instrument(skip_all, fields(patient = %patient_id, template = %template_id))]
	async fn upload_consent_form(
		&self,
		patient_id: &PatientId,
		template_id: &TemplateId,
		file: UploadFile,
	) -> Result<PatientConsentFormInstance, UploadError> {
		const RESOURCE: &str = "consent-form upload";
		let url = self.endpoint(
			RESOURCE,
			["consent-forms", "patients", patient_id.as_str(), "upload"],
		)?;

		let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.file_name);
		if let Some(content_type) = &file.content_type {
			part = part.mime_str(content_type).map_err(|err| FetchError::Transport {
				resource: RESOURCE.to_owned(),
				reason: err.to_string(),
			})?;
		}
		let form = Form::new()
			.text("templateId", template_id.to_string())
			.part("file", part);

		let instance = self
			.envelope::<PatientConsentFormInstance>(RESOURCE, self.client.post(url).multipart(form))
			.await?
			.into_data(RESOURCE)?;
		trace!(instance = %instance.id, "Backend stored consent form");
		Ok(instance)
	}

	#[instrument(skip_all, fields(path = relative_path))]
	async fn fetch_document_binary(&self, relative_path: &str) -> Result<Bytes, FetchError> {
		let resource = format!("document `{relative_path}`");
		let url = self.endpoint(
			&resource,
			std::iter::once("files").chain(relative_path.split('/').filter(|s| !s.is_empty())),
		)?;
		let bytes = self
			.send(&resource, self.client.get(url))
			.await?
			.bytes()
			.await
			.map_err(|err| transport(&resource, &err))?;
		trace!("Fetched {} bytes", bytes.len());
		Ok(bytes)
	}
}
