use super::{label_matches, normalize, ConsentFormTemplate};
use tracing::trace;

/// Finds the consent-form template for a free-text investigation or procedure name.
///
/// Test names take precedence over procedure names. Within each, the first template in catalog
/// order wins.
pub fn resolve_template<'a>(
	investigation_name: &str,
	templates: &'a [ConsentFormTemplate],
) -> Option<&'a ConsentFormTemplate> {
	let name = normalize(investigation_name);
	if name.is_empty() {
		return None;
	}

	let resolved = templates
		.iter()
		.find(|template| label_matches(template.test_name.as_deref(), &name))
		.or_else(|| {
			templates
				.iter()
				.find(|template| label_matches(template.procedure_name.as_deref(), &name))
		});

	trace!(
		investigation = %name,
		template = ?resolved.map(|template| &template.id),
		"Resolved consent-form template"
	);
	resolved
}
