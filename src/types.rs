use dicom::core::Tag;
use serde::Deserialize;
use std::fmt::{Display, Formatter};

/// Orthanc identifier of a resource (patient, study, series or instance).
pub type ResourceId = String;

/// Sequence number of an entry in the Orthanc change log.
pub type Seq = u64;

/// Type of a change reported by Orthanc.
///
/// <https://orthanc.uclouvain.be/book/plugins/python.html#listening-to-changes>
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ChangeType {
	CompletedSeries,
	Deleted,
	NewChildInstance,
	NewInstance,
	NewPatient,
	NewSeries,
	NewStudy,
	StablePatient,
	StableSeries,
	StableStudy,
	OrthancStarted,
	OrthancStopped,
	UpdatedAttachment,
	UpdatedMetadata,
	UpdatedPeers,
	UpdatedConfiguration,
	UpdatedModalities,
	JobSubmitted,
	JobSuccess,
	JobFailure,
	/// A change type introduced by a newer Orthanc release.
	Other(String),
}

impl ChangeType {
	pub fn as_str(&self) -> &str {
		match self {
			Self::CompletedSeries => "CompletedSeries",
			Self::Deleted => "Deleted",
			Self::NewChildInstance => "NewChildInstance",
			Self::NewInstance => "NewInstance",
			Self::NewPatient => "NewPatient",
			Self::NewSeries => "NewSeries",
			Self::NewStudy => "NewStudy",
			Self::StablePatient => "StablePatient",
			Self::StableSeries => "StableSeries",
			Self::StableStudy => "StableStudy",
			Self::OrthancStarted => "OrthancStarted",
			Self::OrthancStopped => "OrthancStopped",
			Self::UpdatedAttachment => "UpdatedAttachment",
			Self::UpdatedMetadata => "UpdatedMetadata",
			Self::UpdatedPeers => "UpdatedPeers",
			Self::UpdatedConfiguration => "UpdatedConfiguration",
			Self::UpdatedModalities => "UpdatedModalities",
			Self::JobSubmitted => "JobSubmitted",
			Self::JobSuccess => "JobSuccess",
			Self::JobFailure => "JobFailure",
			Self::Other(name) => name,
		}
	}
}

impl From<String> for ChangeType {
	fn from(value: String) -> Self {
		match value.as_str() {
			"CompletedSeries" => Self::CompletedSeries,
			"Deleted" => Self::Deleted,
			"NewChildInstance" => Self::NewChildInstance,
			"NewInstance" => Self::NewInstance,
			"NewPatient" => Self::NewPatient,
			"NewSeries" => Self::NewSeries,
			"NewStudy" => Self::NewStudy,
			"StablePatient" => Self::StablePatient,
			"StableSeries" => Self::StableSeries,
			"StableStudy" => Self::StableStudy,
			"OrthancStarted" => Self::OrthancStarted,
			"OrthancStopped" => Self::OrthancStopped,
			"UpdatedAttachment" => Self::UpdatedAttachment,
			"UpdatedMetadata" => Self::UpdatedMetadata,
			"UpdatedPeers" => Self::UpdatedPeers,
			"UpdatedConfiguration" => Self::UpdatedConfiguration,
			"UpdatedModalities" => Self::UpdatedModalities,
			"JobSubmitted" => Self::JobSubmitted,
			"JobSuccess" => Self::JobSuccess,
			"JobFailure" => Self::JobFailure,
			_ => Self::Other(value),
		}
	}
}

impl Display for ChangeType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The level of the resource a change refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ResourceType {
	Patient,
	Study,
	Series,
	Instance,
	/// Server-level events that are not bound to a resource.
	None,
}

impl From<String> for ResourceType {
	fn from(value: String) -> Self {
		match value.as_str() {
			"Patient" => Self::Patient,
			"Study" => Self::Study,
			"Series" => Self::Series,
			"Instance" => Self::Instance,
			_ => Self::None,
		}
	}
}

impl Display for ResourceType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Patient => write!(f, "Patient"),
			Self::Study => write!(f, "Study"),
			Self::Series => write!(f, "Series"),
			Self::Instance => write!(f, "Instance"),
			Self::None => write!(f, "None"),
		}
	}
}

/// A single entry of the Orthanc change log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Change {
	pub seq: Seq,
	pub change_type: ChangeType,
	pub resource_type: ResourceType,
	#[serde(rename = "ID")]
	pub id: ResourceId,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub date: String,
}

/// A page of the change log as returned by `GET /changes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangesPage {
	pub changes: Vec<Change>,
	/// Whether the end of the change log was reached.
	pub done: bool,
	/// Sequence number of the last change contained in this page.
	pub last: Seq,
}

/// Formats a tag the way Orthanc keys its `/tags` documents, e.g. `0010,0020`.
pub fn tag_key(tag: Tag) -> String {
	format!("{:04x},{:04x}", tag.group(), tag.element())
}
