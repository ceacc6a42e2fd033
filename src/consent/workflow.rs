use super::{
	find_patient_form, is_uploaded, resolve_template, ConsentFormTemplate, PatientConsentFormInstance,
};
use crate::backend::{ConsentBackend, FetchError, UploadError, UploadFile};
use crate::types::{PatientId, TemplateId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What the UI may offer for one investigation of one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentActions {
	pub upload: bool,
	pub view: bool,
	pub reupload: bool,
	pub print_template: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentLookup {
	pub investigation_name: String,
	pub template: Option<ConsentFormTemplate>,
	pub instance: Option<PatientConsentFormInstance>,
	pub template_available: bool,
	pub uploaded: bool,
	/// Name to open the uploaded form under.
	pub file_name: Option<String>,
	pub actions: ConsentActions,
}

impl ConsentLookup {
	pub fn evaluate(
		investigation_name: &str,
		templates: &[ConsentFormTemplate],
		instances: &[PatientConsentFormInstance],
	) -> Self {
		let template = resolve_template(investigation_name, templates);
		let instance = find_patient_form(
			investigation_name,
			template.map(|template| &template.id),
			instances,
			templates,
		);
		let uploaded = is_uploaded(instance);
		let template_available = template.is_some();

		Self {
			investigation_name: investigation_name.to_owned(),
			template: template.cloned(),
			instance: instance.cloned(),
			template_available,
			uploaded,
			file_name: instance
				.filter(|_| uploaded)
				.map(|instance| instance.display_name().to_owned()),
			actions: ConsentActions {
				upload: template_available && !uploaded,
				view: uploaded,
				reupload: template_available && uploaded,
				print_template: template
					.and_then(|template| template.file_path.as_deref())
					.is_some_and(|path| !path.trim().is_empty()),
			},
		}
	}
}

/// Consent-form lookups and uploads against the backend.
#[derive(Clone)]
pub struct ConsentWorkflow {
	backend: Arc<dyn ConsentBackend>,
}

impl ConsentWorkflow {
	pub fn new(backend: Arc<dyn ConsentBackend>) -> Self {
		Self { backend }
	}

	#[instrument(skip(self))]
	pub async fn lookup(
		&self,
		patient_id: &PatientId,
		investigation_name: &str,
	) -> Result<ConsentLookup, FetchError> {
		let (templates, instances) = futures::future::try_join(
			self.backend.fetch_consent_form_templates(),
			self.backend.fetch_patient_consent_forms(patient_id),
		)
		.await?;
		let lookup = ConsentLookup::evaluate(investigation_name, &templates, &instances);
		debug!(
			template_available = lookup.template_available,
			uploaded = lookup.uploaded,
			"Evaluated consent form"
		);
		Ok(lookup)
	}

	/// Stores a signed form and returns the lookup as it stands afterwards.
	#[instrument(skip(self, file), fields(file_name = %file.file_name))]
	pub async fn upload(
		&self,
		patient_id: &PatientId,
		template_id: &TemplateId,
		investigation_name: &str,
		file: UploadFile,
	) -> Result<ConsentLookup, UploadError> {
		if file.bytes.is_empty() {
			return Err(UploadError::MissingFile);
		}

		let instance = self
			.backend
			.upload_consent_form(patient_id, template_id, file)
			.await?;
		info!(instance = %instance.id, "Uploaded signed consent form");

		Ok(self.lookup(patient_id, investigation_name).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::super::fixtures::{instance, template};
	use super::*;
	use crate::backend::mock::MockBackend;
	use crate::types::Id;
	use bytes::Bytes;

	fn trus_template() -> ConsentFormTemplate {
		template(1, Some("TRUS BIOPSY"), None)
	}

	fn trus_upload() -> PatientConsentFormInstance {
		PatientConsentFormInstance {
			template_id: Some(Id::from(1)),
			file_path: Some(String::from("consent-forms/patients/5/trus.pdf")),
			file_name: Some(String::from("trus.pdf")),
			..instance(10)
		}
	}

	#[test]
	fn uploaded_form_offers_view_and_reupload() {
		let lookup = ConsentLookup::evaluate("TRUS Biopsy", &[trus_template()], &[trus_upload()]);
		assert_eq!(lookup.template.unwrap().id, Id::from(1));
		assert_eq!(lookup.instance.unwrap().id, Id::from(10));
		assert!(lookup.uploaded);
		assert_eq!(lookup.file_name.as_deref(), Some("trus.pdf"));
		assert_eq!(
			lookup.actions,
			ConsentActions {
				upload: false,
				view: true,
				reupload: true,
				print_template: false,
			}
		);
	}

	#[test]
	fn missing_upload_offers_upload_only() {
		let lookup = ConsentLookup::evaluate("TRUS Biopsy", &[trus_template()], &[]);
		assert!(lookup.template_available);
		assert!(lookup.instance.is_none());
		assert_eq!(
			lookup.actions,
			ConsentActions {
				upload: true,
				..ConsentActions::default()
			}
		);
	}

	#[test]
	fn placeholder_record_is_not_viewable() {
		let placeholder = PatientConsentFormInstance {
			file_path: Some(String::from("templates/trus.pdf")),
			..trus_upload()
		};
		let lookup = ConsentLookup::evaluate("TRUS Biopsy", &[trus_template()], &[placeholder]);
		assert!(lookup.instance.is_some());
		assert!(!lookup.uploaded);
		assert!(lookup.file_name.is_none());
		assert!(lookup.actions.upload);
		assert!(!lookup.actions.view);
	}

	#[test]
	fn unknown_investigation_disables_template_actions() {
		let lookup = ConsentLookup::evaluate("Colonoscopy", &[trus_template()], &[]);
		assert!(!lookup.template_available);
		assert_eq!(lookup.actions, ConsentActions::default());
	}

	#[test]
	fn blank_template_can_be_printed() {
		let template = ConsentFormTemplate {
			file_path: Some(String::from("templates/trus.pdf")),
			..trus_template()
		};
		let lookup = ConsentLookup::evaluate("trus biopsy", &[template], &[]);
		assert!(lookup.actions.print_template);
	}

	#[tokio::test]
	async fn lookup_reads_both_collections() {
		let backend = MockBackend::new()
			.with_template(trus_template())
			.with_form("5", trus_upload());
		let workflow = ConsentWorkflow::new(Arc::new(backend));

		let lookup = workflow.lookup(&Id::from("5"), "TRUS Biopsy").await.unwrap();
		assert!(lookup.uploaded);

		let other_patient = workflow.lookup(&Id::from("6"), "TRUS Biopsy").await.unwrap();
		assert!(!other_patient.uploaded);
	}

	#[tokio::test]
	async fn lookup_propagates_backend_failures() {
		let backend = MockBackend::new();
		*backend.fail_templates.lock().unwrap() = Some(String::from("database offline"));
		let workflow = ConsentWorkflow::new(Arc::new(backend));

		let err = workflow.lookup(&Id::from("5"), "TRUS Biopsy").await.unwrap_err();
		assert!(matches!(err, FetchError::Rejected { .. }));
	}

	#[tokio::test]
	async fn upload_refreshes_the_lookup() {
		let backend = MockBackend::new().with_template(trus_template());
		let workflow = ConsentWorkflow::new(Arc::new(backend));
		let file = UploadFile {
			file_name: String::from("signed.pdf"),
			content_type: Some(String::from("application/pdf")),
			bytes: Bytes::from_static(b"%PDF-1.7"),
		};

		let lookup = workflow
			.upload(&Id::from("5"), &Id::from(1), "TRUS Biopsy", file)
			.await
			.unwrap();
		assert!(lookup.uploaded);
		assert_eq!(
			lookup.instance.unwrap().file_path.as_deref(),
			Some("consent-forms/patients/5/signed.pdf")
		);
	}

	#[tokio::test]
	async fn empty_upload_is_refused() {
		let workflow = ConsentWorkflow::new(Arc::new(MockBackend::new()));
		let file = UploadFile {
			file_name: String::from("signed.pdf"),
			content_type: None,
			bytes: Bytes::new(),
		};
		let result = workflow
			.upload(&Id::from("5"), &Id::from(1), "TRUS Biopsy", file)
			.await;
		assert!(matches!(result, Err(UploadError::MissingFile)));
	}
}
