use crate::types::tag_key;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use serde_json::Value;

/// Placeholder for tags that are absent or have no usable value.
pub const UNKNOWN: &str = "Unknown";

/// The attributes logged for each new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceInfo<'a> {
	pub patient_id: &'a str,
	pub study_date: &'a str,
}

impl<'a> InstanceInfo<'a> {
	pub fn from_tags(document: &'a Value) -> Self {
		Self {
			patient_id: first_value(document, tags::PATIENT_ID),
			study_date: first_value(document, tags::STUDY_DATE),
		}
	}
}

/// Looks up the first value of a tag in a document keyed by `gggg,eeee`.
///
/// Accepts both the DICOM JSON style (`"Value": ["..."]`) and Orthanc's default `/tags` style
/// (`"Value": "..."`). Falls back to [`UNKNOWN`] instead of failing.
pub fn first_value(document: &Value, tag: Tag) -> &str {
	match document.get(tag_key(tag)).and_then(|element| element.get("Value")) {
		Some(Value::Array(values)) => values.first().and_then(Value::as_str).unwrap_or(UNKNOWN),
		Some(Value::String(value)) => value.as_str(),
		_ => UNKNOWN,
	}
}
