use super::{ConsentBackend, FetchError, UploadError, UploadFile};
use crate::consent::{ConsentFormTemplate, PatientConsentFormInstance};
use crate::types::{Id, PatientId, TemplateId};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// In-memory backend. Document fetches can be held back with [`MockBackend::gate`].
#[derive(Default)]
pub struct MockBackend {
	pub templates: Mutex<Vec<ConsentFormTemplate>>,
	pub forms: Mutex<HashMap<PatientId, Vec<PatientConsentFormInstance>>>,
	pub documents: Mutex<HashMap<String, Bytes>>,
	pub fetched_paths: Mutex<Vec<String>>,
	pub fail_templates: Mutex<Option<String>>,
	gates: Mutex<HashMap<String, Arc<Notify>>>,
	next_id: AtomicU64,
}

impl MockBackend {
	pub fn new() -> Self {
		Self {
			next_id: AtomicU64::new(1000),
			..Self::default()
		}
	}

	pub fn with_template(self, template: ConsentFormTemplate) -> Self {
		self.templates.lock().unwrap().push(template);
		self
	}

	pub fn with_form(self, patient: &str, form: PatientConsentFormInstance) -> Self {
		self.forms
			.lock()
			.unwrap()
			.entry(Id::from(patient))
			.or_default()
			.push(form);
		self
	}

	pub fn with_document(self, path: &str, bytes: &'static [u8]) -> Self {
		self.documents
			.lock()
			.unwrap()
			.insert(path.to_owned(), Bytes::from_static(bytes));
		self
	}

	/// Holds fetches of `path` until the returned notifier is signalled.
	pub fn gate(&self, path: &str) -> Arc<Notify> {
		let notify = Arc::new(Notify::new());
		self.gates
			.lock()
			.unwrap()
			.insert(path.to_owned(), Arc::clone(&notify));
		notify
	}

	pub fn fetched(&self) -> Vec<String> {
		self.fetched_paths.lock().unwrap().clone()
	}
}

#[async_trait]
impl ConsentBackend for MockBackend {
	async fn fetch_consent_form_templates(&self) -> Result<Vec<ConsentFormTemplate>, FetchError> {
		if let Some(reason) = self.fail_templates.lock().unwrap().clone() {
			return Err(FetchError::Rejected {
				resource: String::from("consent-form templates"),
				reason,
			});
		}
		Ok(self.templates.lock().unwrap().clone())
	}

	async fn fetch_patient_consent_forms(
		&self,
		patient_id: &PatientId,
	) -> Result<Vec<PatientConsentFormInstance>, FetchError> {
		Ok(self
			.forms
			.lock()
			.unwrap()
			.get(patient_id)
			.cloned()
			.unwrap_or_default())
	}

	async fn upload_consent_form(
		&self,
		patient_id: &PatientId,
		template_id: &TemplateId,
		file: UploadFile,
	) -> Result<PatientConsentFormInstance, UploadError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let path = format!("consent-forms/patients/{patient_id}/{}", file.file_name);
		self.documents
			.lock()
			.unwrap()
			.insert(path.clone(), file.bytes);

		let instance = PatientConsentFormInstance {
			id: Id::from(id),
			patient_id: Some(patient_id.clone()),
			template_id: Some(template_id.clone()),
			legacy_template_id: None,
			consent_form_name: None,
			test_name: None,
			procedure_name: None,
			file_path: Some(path),
			file_name: Some(file.file_name),
		};
		self.forms
			.lock()
			.unwrap()
			.entry(patient_id.clone())
			.or_default()
			.push(instance.clone());
		Ok(instance)
	}

	async fn fetch_document_binary(&self, relative_path: &str) -> Result<Bytes, FetchError> {
		self.fetched_paths
			.lock()
			.unwrap()
			.push(relative_path.to_owned());

		let gate = self.gates.lock().unwrap().get(relative_path).cloned();
		if let Some(gate) = gate {
			gate.notified().await;
		}

		self.documents
			.lock()
			.unwrap()
			.get(relative_path)
			.cloned()
			.ok_or_else(|| FetchError::Status {
				resource: format!("document `{relative_path}`"),
				status: 404,
			})
	}
}
