//! Reactions to changes reported by Orthanc.
//!
//! [`InstanceInfoWriter`] archives the tags of every new instance:
//! - `NewInstance`: fetches `/instances/{id}/tags`, logs PatientID and StudyDate and writes the
//!     document to `{directory}/{id}_info.json`.
//! - `OrthancStarted`: logs that the server is ready.
//! - Any other change is ignored.

pub mod output;
pub mod tags;

use crate::orthanc::{ApiError, OrthancApi};
use crate::types::{ChangeType, ResourceType};
use async_trait::async_trait;
use output::JsonFileSink;
use std::path::PathBuf;
use std::sync::Arc;
use tags::InstanceInfo;
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

#[async_trait]
pub trait ChangeHandler: Send + Sync {
	async fn on_change(
		&self,
		change_type: &ChangeType,
		level: ResourceType,
		resource: &str,
	) -> Result<(), HandlerError>;
}

#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("Failed to fetch tags: {0}")]
	Fetch(#[from] ApiError),
	#[error("Failed to parse tags: {0}")]
	Parse(#[from] serde_json::Error),
	#[error("Resource identifier {0:?} cannot be used as a file name")]
	InvalidResource(String),
	#[error("Failed to write {}: {source}", path.display())]
	Write {
		path: PathBuf,
		source: std::io::Error,
	},
}

pub struct InstanceInfoWriter {
	api: Arc<dyn OrthancApi>,
	sink: JsonFileSink,
}

impl InstanceInfoWriter {
	pub fn new(api: Arc<dyn OrthancApi>, sink: JsonFileSink) -> Self {
		Self { api, sink }
	}

	async fn on_new_instance(&self, resource: &str) -> Result<(), HandlerError> {
		info!(instance = resource, "New DICOM instance received");
		let path = self
			.sink
			.path_for(resource)
			.ok_or_else(|| HandlerError::InvalidResource(resource.to_owned()))?;

		let body = self.api.instance_tags(resource).await?;
		let document: serde_json::Value = serde_json::from_str(&body)?;

		let InstanceInfo {
			patient_id,
			study_date,
		} = InstanceInfo::from_tags(&document);
		info!(instance = resource, patient_id, study_date, "Extracted instance information");

		self.sink
			.write(resource, &document)
			.await
			.map_err(|source| HandlerError::Write {
				path: path.clone(),
				source,
			})?;
		debug!(instance = resource, path = %path.display(), "Saved instance tags");

		Ok(())
	}
}

#[async_trait]
impl ChangeHandler for InstanceInfoWriter {
	#[instrument(skip_all, fields(change = %change_type, resource_type = %level))]
	async fn on_change(
		&self,
		change_type: &ChangeType,
		level: ResourceType,
		resource: &str,
	) -> Result<(), HandlerError> {
		match change_type {
			ChangeType::NewInstance => self.on_new_instance(resource).await,
			ChangeType::OrthancStarted => {
				info!("Orthanc started and is ready to process DICOM files");
				Ok(())
			}
			_ => {
				trace!(resource, "Ignoring change");
				Ok(())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::orthanc::SystemInfo;
	use crate::types::{ChangesPage, Seq};
	use serde_json::json;
	use std::collections::HashMap;
	use std::sync::Mutex;

	const INSTANCE: &str = "6e2c0ec2-5d99f8ca-0c4c1a4c-2f8a2b3b-c8e1f6a1";

	/// Serves canned tag documents and records every tag lookup.
	#[derive(Default)]
	struct FakeOrthanc {
		tags: HashMap<String, String>,
		lookups: Mutex<Vec<String>>,
	}

	impl FakeOrthanc {
		fn with_tags(id: &str, body: &str) -> Self {
			Self {
				tags: HashMap::from([(id.to_owned(), body.to_owned())]),
				..Default::default()
			}
		}

		fn lookups(&self) -> Vec<String> {
			self.lookups.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl OrthancApi for FakeOrthanc {
		async fn system(&self) -> Result<SystemInfo, ApiError> {
			unimplemented!()
		}

		async fn changes(&self, _since: Seq, _limit: u32) -> Result<ChangesPage, ApiError> {
			unimplemented!()
		}

		async fn last_change(&self) -> Result<ChangesPage, ApiError> {
			unimplemented!()
		}

		async fn instance_tags(&self, id: &str) -> Result<String, ApiError> {
			self.lookups.lock().unwrap().push(id.to_owned());
			self.tags.get(id).cloned().ok_or_else(|| ApiError::Status {
				status: 404,
				url: url::Url::parse("http://localhost:8042/instances").unwrap(),
			})
		}
	}

	fn writer(api: &Arc<FakeOrthanc>, dir: &tempfile::TempDir) -> InstanceInfoWriter {
		InstanceInfoWriter::new(api.clone(), JsonFileSink::new(dir.path()))
	}

	fn written_files(dir: &tempfile::TempDir) -> Vec<PathBuf> {
		std::fs::read_dir(dir.path())
			.unwrap()
			.map(|entry| entry.unwrap().path())
			.collect()
	}

	#[tokio::test]
	async fn new_instance_fetches_once_and_writes_one_file() {
		let body = r#"{
			"0010,0020": { "vr": "LO", "Value": ["P-1"] },
			"0008,0020": { "vr": "DA", "Value": ["20240612"] },
			"0008,0060": { "vr": "CS", "Value": ["MR"] }
		}"#;
		let api = Arc::new(FakeOrthanc::with_tags(INSTANCE, body));
		let dir = tempfile::tempdir().unwrap();

		writer(&api, &dir)
			.on_change(&ChangeType::NewInstance, ResourceType::Instance, INSTANCE)
			.await
			.unwrap();

		assert_eq!(api.lookups(), vec![INSTANCE.to_owned()]);
		let files = written_files(&dir);
		assert_eq!(files, vec![dir.path().join(format!("{INSTANCE}_info.json"))]);

		let written = std::fs::read_to_string(&files[0]).unwrap();
		let fetched: serde_json::Value = serde_json::from_str(body).unwrap();
		assert_eq!(serde_json::from_str::<serde_json::Value>(&written).unwrap(), fetched);
		assert!(written.starts_with("{\n    \"0010,0020\""));
	}

	#[tokio::test]
	async fn new_instance_without_known_tags_still_writes_file() {
		let api = Arc::new(FakeOrthanc::with_tags(
			INSTANCE,
			r#"{"0008,0060": {"vr": "CS", "Value": ["CT"]}}"#,
		));
		let dir = tempfile::tempdir().unwrap();

		writer(&api, &dir)
			.on_change(&ChangeType::NewInstance, ResourceType::Instance, INSTANCE)
			.await
			.unwrap();

		assert_eq!(written_files(&dir).len(), 1);
	}

	#[tokio::test]
	async fn orthanc_started_neither_fetches_nor_writes() {
		let api = Arc::new(FakeOrthanc::default());
		let dir = tempfile::tempdir().unwrap();

		writer(&api, &dir)
			.on_change(&ChangeType::OrthancStarted, ResourceType::None, "")
			.await
			.unwrap();

		assert!(api.lookups().is_empty());
		assert!(written_files(&dir).is_empty());
	}

	#[tokio::test]
	async fn other_changes_are_ignored() {
		let api = Arc::new(FakeOrthanc::with_tags(INSTANCE, "{}"));
		let dir = tempfile::tempdir().unwrap();
		let writer = writer(&api, &dir);

		for change_type in [
			ChangeType::NewSeries,
			ChangeType::StableStudy,
			ChangeType::Deleted,
			ChangeType::Other(String::from("SomethingNew")),
		] {
			writer
				.on_change(&change_type, ResourceType::Instance, INSTANCE)
				.await
				.unwrap();
		}

		assert!(api.lookups().is_empty());
		assert!(written_files(&dir).is_empty());
	}

	#[tokio::test]
	async fn malformed_tags_are_reported() {
		let api = Arc::new(FakeOrthanc::with_tags(INSTANCE, "not json"));
		let dir = tempfile::tempdir().unwrap();

		let error = writer(&api, &dir)
			.on_change(&ChangeType::NewInstance, ResourceType::Instance, INSTANCE)
			.await
			.unwrap_err();

		assert!(matches!(error, HandlerError::Parse(_)));
		assert!(written_files(&dir).is_empty());
	}

	#[tokio::test]
	async fn unreachable_tags_are_reported() {
		let api = Arc::new(FakeOrthanc::default());
		let dir = tempfile::tempdir().unwrap();

		let error = writer(&api, &dir)
			.on_change(&ChangeType::NewInstance, ResourceType::Instance, INSTANCE)
			.await
			.unwrap_err();

		assert!(matches!(error, HandlerError::Fetch(ApiError::Status { status: 404, .. })));
		assert_eq!(api.lookups(), vec![INSTANCE.to_owned()]);
	}

	#[tokio::test]
	async fn write_failures_name_the_file() {
		let api = Arc::new(FakeOrthanc::with_tags(INSTANCE, "{}"));
		let dir = tempfile::tempdir().unwrap();
		let writer = InstanceInfoWriter::new(api.clone(), JsonFileSink::new(dir.path().join("missing")));

		let error = writer
			.on_change(&ChangeType::NewInstance, ResourceType::Instance, INSTANCE)
			.await
			.unwrap_err();

		match error {
			HandlerError::Write { path, .. } => assert!(path.ends_with(format!("{INSTANCE}_info.json"))),
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn resource_with_path_separator_is_rejected() {
		let api = Arc::new(FakeOrthanc::with_tags("../escape", "{}"));
		let dir = tempfile::tempdir().unwrap();

		let error = writer(&api, &dir)
			.on_change(&ChangeType::NewInstance, ResourceType::Instance, "../escape")
			.await
			.unwrap_err();

		assert!(matches!(error, HandlerError::InvalidResource(_)));
		assert!(api.lookups().is_empty());
		assert!(written_files(&dir).is_empty());
	}

	#[test]
	fn fetched_key_order_is_preserved() {
		let body = r#"{"0010,0020": {"Value": ["P-1"]}, "0008,0020": {"Value": ["20240612"]}}"#;
		let document: serde_json::Value = serde_json::from_str(body).unwrap();

		let keys: Vec<&String> = document.as_object().unwrap().keys().collect();

		assert_eq!(keys, ["0010,0020", "0008,0020"]);
		assert_eq!(document, json!({"0008,0020": {"Value": ["20240612"]}, "0010,0020": {"Value": ["P-1"]}}));
	}
}
