use super::{label_matches, normalize, ConsentFormTemplate, PatientConsentFormInstance, PLACEHOLDER_MARKERS};
use crate::types::TemplateId;
use tracing::debug;

/// Everything a match rule may look at besides the instance itself.
struct MatchContext<'a> {
	/// The normalized investigation name.
	name: String,
	template_id: Option<&'a TemplateId>,
	templates: &'a [ConsentFormTemplate],
}

struct MatchRule {
	name: &'static str,
	matches: fn(&MatchContext<'_>, &PatientConsentFormInstance) -> bool,
}

/// Rules in priority order. An explicit identifier match always beats a label match.
const RULES: &[MatchRule] = &[
	MatchRule {
		name: "template-id",
		matches: template_id_rule,
	},
	MatchRule {
		name: "consent-form-name",
		matches: consent_form_name_rule,
	},
	MatchRule {
		name: "joined-label",
		matches: joined_label_rule,
	},
	MatchRule {
		name: "reverse-template",
		matches: reverse_template_rule,
	},
];

fn template_id_rule(ctx: &MatchContext<'_>, instance: &PatientConsentFormInstance) -> bool {
	ctx.template_id.is_some_and(|id| instance.references(id))
}

fn consent_form_name_rule(ctx: &MatchContext<'_>, instance: &PatientConsentFormInstance) -> bool {
	label_matches(instance.consent_form_name.as_deref(), &ctx.name)
}

fn joined_label_rule(ctx: &MatchContext<'_>, instance: &PatientConsentFormInstance) -> bool {
	label_matches(instance.test_name.as_deref(), &ctx.name)
		|| label_matches(instance.procedure_name.as_deref(), &ctx.name)
}

fn reverse_template_rule(ctx: &MatchContext<'_>, instance: &PatientConsentFormInstance) -> bool {
	ctx.templates
		.iter()
		.filter(|template| instance.references(&template.id))
		.any(|template| template.labelled(&ctx.name))
}

/// Finds the patient's uploaded consent form for an investigation.
///
/// Rules are tried in priority order; for each rule the instances are scanned in catalog order
/// and the first instance satisfying it is returned. Absence of a match is not an error.
pub fn find_patient_form<'a>(
	investigation_name: &str,
	template_id: Option<&TemplateId>,
	instances: &'a [PatientConsentFormInstance],
	templates: &[ConsentFormTemplate],
) -> Option<&'a PatientConsentFormInstance> {
	let ctx = MatchContext {
		name: normalize(investigation_name),
		template_id,
		templates,
	};

	for rule in RULES {
		if let Some(instance) = instances.iter().find(|instance| (rule.matches)(&ctx, instance)) {
			debug!(
				rule = rule.name,
				instance = %instance.id,
				"Matched patient consent form"
			);
			return Some(instance);
		}
	}

	debug!(investigation = %ctx.name, "No patient consent form matched");
	None
}

/// Whether an instance is a genuinely uploaded, viewable signed form.
///
/// Paths mentioning a placeholder marker are treated as template records rather than uploads.
pub fn is_uploaded(instance: Option<&PatientConsentFormInstance>) -> bool {
	instance
		.and_then(|instance| instance.file_path.as_deref())
		.is_some_and(|path| {
			let path = path.to_lowercase();
			!path.is_empty() && !PLACEHOLDER_MARKERS.iter().any(|marker| path.contains(marker))
		})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consent::fixtures::{instance, template};
	use crate::types::Id;

	fn with_path(path: Option<&str>) -> PatientConsentFormInstance {
		let mut form = instance(1);
		form.file_path = path.map(str::to_owned);
		form
	}

	#[test]
	fn template_id_match_beats_name_match() {
		let mut by_name = instance(1);
		by_name.consent_form_name = Some("TRUS Biopsy".into());
		let mut by_id = instance(2);
		by_id.template_id = Some(Id::from(9));

		let instances = vec![by_name, by_id];
		let found = find_patient_form("TRUS Biopsy", Some(&Id::from(9)), &instances, &[]);
		assert_eq!(found.map(|i| &i.id), Some(&Id::from(2)));
	}

	#[test]
	fn legacy_template_id_counts_as_direct_match() {
		let mut legacy = instance(3);
		legacy.legacy_template_id = Some(Id::from("9"));
		let instances = vec![legacy];
		assert!(find_patient_form("anything", Some(&Id::from(9)), &instances, &[]).is_some());
	}

	#[test]
	fn no_template_id_skips_the_direct_rule() {
		let mut linked = instance(1);
		linked.template_id = Some(Id::from(9));
		let instances = vec![linked];
		assert!(find_patient_form("MRI", None, &instances, &[]).is_none());
	}

	#[test]
	fn consent_form_name_beats_joined_label() {
		let mut by_label = instance(1);
		by_label.test_name = Some("mri".into());
		let mut by_name = instance(2);
		by_name.consent_form_name = Some(" MRI ".into());

		let instances = vec![by_label, by_name];
		let found = find_patient_form("MRI", None, &instances, &[]);
		assert_eq!(found.map(|i| &i.id), Some(&Id::from(2)));
	}

	#[test]
	fn joined_label_matches_procedure_name() {
		let mut form = instance(4);
		form.procedure_name = Some("Cystoscopy".into());
		let instances = vec![form];
		assert!(find_patient_form("CYSTOSCOPY", None, &instances, &[]).is_some());
	}

	#[test]
	fn reverse_lookup_through_template_catalog() {
		let mut form = instance(5);
		form.legacy_template_id = Some(Id::from(3));
		let instances = vec![form];
		let templates = vec![template(2, Some("MRI"), None), template(3, None, Some("PSA"))];

		let found = find_patient_form("psa", Some(&Id::from(42)), &instances, &templates);
		assert_eq!(found.map(|i| &i.id), Some(&Id::from(5)));
		assert!(find_patient_form("MRI", None, &instances, &templates).is_none());
	}

	#[test]
	fn no_match_returns_none() {
		let instances = vec![instance(1), instance(2)];
		assert!(find_patient_form("MRI", Some(&Id::from(1)), &instances, &[]).is_none());
		assert!(find_patient_form("MRI", None, &[], &[]).is_none());
	}

	#[test]
	fn uploaded_predicate() {
		assert!(!is_uploaded(None));
		assert!(!is_uploaded(Some(&with_path(None))));
		assert!(!is_uploaded(Some(&with_path(Some("")))));
		assert!(!is_uploaded(Some(&with_path(Some("templates/x.pdf")))));
		assert!(!is_uploaded(Some(&with_path(Some("auto-generated/x.pdf")))));
		assert!(!is_uploaded(Some(&with_path(Some("forms/AUTO-GENERATED-x.pdf")))));
		assert!(is_uploaded(Some(&with_path(Some("consent-forms/patients/123/x.pdf")))));
	}

	#[test]
	fn trus_biopsy_scenario() {
		let templates = vec![template(1, Some("TRUS BIOPSY"), None)];
		let mut form = instance(10);
		form.template_id = Some(Id::from(1));
		form.file_path = Some("consent-forms/patients/5/trus.pdf".into());
		form.file_name = Some("trus.pdf".into());
		let instances = vec![form];

		let resolved = crate::consent::resolve_template("TRUS Biopsy", &templates).unwrap();
		assert_eq!(resolved.id, Id::from(1));

		let found = find_patient_form("TRUS Biopsy", Some(&resolved.id), &instances, &templates);
		assert_eq!(found, instances.first());
		assert!(is_uploaded(found));

		assert!(find_patient_form("TRUS Biopsy", Some(&resolved.id), &[], &templates).is_none());
	}
}
