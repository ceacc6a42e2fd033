//! Consent-form templates, patient consent-form instances and the rules that associate them.
//! - The resolver maps a free-text investigation name to a template.
//! - The matcher finds the patient's uploaded instance for that template.
//! - The workflow composes both with the backend calls.

pub mod matcher;
pub mod resolver;
pub mod workflow;

pub use matcher::{find_patient_form, is_uploaded};
pub use resolver::resolve_template;

use crate::types::{Id, PatientId, TemplateId};
use serde::{Deserialize, Serialize};

/// Display name used when an uploaded instance carries no file name.
pub const DEFAULT_FILE_NAME: &str = "Consent Form";

/// Substrings that mark a file path as a placeholder rather than a signed upload.
pub const PLACEHOLDER_MARKERS: &[&str] = &["template", "auto-generated"];

/// A reusable, patient-independent consent-form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentFormTemplate {
	pub id: TemplateId,
	#[serde(default)]
	pub test_name: Option<String>,
	#[serde(default)]
	pub procedure_name: Option<String>,
	/// Server-relative path of the blank template document.
	#[serde(default, alias = "templateFileUrl")]
	pub file_path: Option<String>,
}

impl ConsentFormTemplate {
	/// Whether the normalized test or procedure name equals an already normalized name.
	pub fn labelled(&self, normalized_name: &str) -> bool {
		label_matches(self.test_name.as_deref(), normalized_name)
			|| label_matches(self.procedure_name.as_deref(), normalized_name)
	}
}

/// A patient's uploaded consent form.
///
/// Upload records come from several historical schema shapes, so every label is optional and
/// the template reference may sit in either of two fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientConsentFormInstance {
	pub id: Id,
	#[serde(default)]
	pub patient_id: Option<PatientId>,
	#[serde(default)]
	pub template_id: Option<TemplateId>,
	/// Legacy alternate template reference.
	#[serde(default, rename = "consentFormTemplateId")]
	pub legacy_template_id: Option<TemplateId>,
	#[serde(default)]
	pub consent_form_name: Option<String>,
	#[serde(default)]
	pub test_name: Option<String>,
	#[serde(default)]
	pub procedure_name: Option<String>,
	#[serde(default)]
	pub file_path: Option<String>,
	#[serde(default)]
	pub file_name: Option<String>,
}

impl PatientConsentFormInstance {
	pub fn display_name(&self) -> &str {
		self.file_name
			.as_deref()
			.filter(|name| !name.trim().is_empty())
			.unwrap_or(DEFAULT_FILE_NAME)
	}

	/// Both template references, primary first.
	pub fn template_refs(&self) -> impl Iterator<Item = &TemplateId> {
		self.template_id
			.iter()
			.chain(self.legacy_template_id.iter())
	}

	pub fn references(&self, template_id: &TemplateId) -> bool {
		self.template_refs().any(|id| id == template_id)
	}
}

/// Upper-cases and trims surrounding whitespace. Internal whitespace is kept.
pub fn normalize(name: &str) -> String {
	name.trim().to_uppercase()
}

/// Compares an optional label against an already normalized name. Blank names never match.
pub fn label_matches(label: Option<&str>, normalized_name: &str) -> bool {
	!normalized_name.is_empty() && label.is_some_and(|label| normalize(label) == normalized_name)
}


#[cfg(test)]
mod tests {
	use super::fixtures::*;
	use super::*;

	#[test]
	fn normalize_keeps_internal_whitespace() {
		assert_eq!(normalize("  trus  biopsy \n"), "TRUS  BIOPSY");
	}

	#[test]
	fn deserializes_heterogeneous_instances() {
		let json = r#"[
			{"id": 1, "templateId": 7, "filePath": "consent-forms/patients/5/a.pdf"},
			{"id": "2", "consentFormTemplateId": "7", "consentFormName": "MRI"}
		]"#;
		let instances: Vec<PatientConsentFormInstance> = serde_json::from_str(json).unwrap();

		assert_eq!(instances[0].template_id, Some(Id::from(7)));
		assert_eq!(instances[1].legacy_template_id, Some(Id::from(7)));
		assert!(instances[1].references(&Id::from(7)));
		assert_eq!(instances[1].display_name(), DEFAULT_FILE_NAME);
	}

	#[test]
	fn template_accepts_template_file_url_alias() {
		let template: ConsentFormTemplate =
			serde_json::from_str(r#"{"id": 3, "testName": "PSA", "templateFileUrl": "templates/psa.pdf"}"#)
				.unwrap();
		assert_eq!(template.file_path.as_deref(), Some("templates/psa.pdf"));
	}

	#[test]
	fn blank_labels_never_match() {
		let template = template(1, Some(""), None);
		assert!(!template.labelled(""));
		assert!(!label_matches(Some("  "), &normalize("  ")));
	}

	#[test]
	fn display_name_falls_back_for_blank_names() {
		let mut form = instance(1);
		form.file_name = Some("  ".into());
		assert_eq!(form.display_name(), DEFAULT_FILE_NAME);
		form.file_name = Some("trus.pdf".into());
		assert_eq!(form.display_name(), "trus.pdf");
	}
}
