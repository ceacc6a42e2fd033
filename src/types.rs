use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Opaque server-assigned identifier.
///
/// The REST backend is not consistent about identifier encoding: older records carry numeric
/// ids, newer ones strings. Both deserialize into the same canonical string form so that a
/// numeric `1` and a string `"1"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for Id {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Id {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}

impl From<String> for Id {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl From<u64> for Id {
	fn from(value: u64) -> Self {
		Self(value.to_string())
	}
}

impl Serialize for Id {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.0)
	}
}

struct IdVisitor;

impl Visitor<'_> for IdVisitor {
	type Value = Id;

	fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
		write!(formatter, "a string or integer identifier")
	}

	fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
	where
		E: Error,
	{
		Ok(Id::from(v))
	}

	fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
	where
		E: Error,
	{
		Ok(Id(v))
	}

	fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
	where
		E: Error,
	{
		Ok(Id::from(v))
	}

	fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
	where
		E: Error,
	{
		Ok(Id(v.to_string()))
	}
}

impl<'de> Deserialize<'de> for Id {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(IdVisitor)
	}
}

/// Identifier of a consent-form template.
pub type TemplateId = Id;

/// Identifier of a patient.
pub type PatientId = Id;
