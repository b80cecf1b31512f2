//! Access to the REST API of the Orthanc server this service is attached to.
//!
//! Only the few endpoints needed to follow the change log and read instance tags are covered.

mod client;

pub use client::OrthancClient;

use crate::types::{ChangesPage, Seq};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[async_trait]
pub trait OrthancApi: Send + Sync {
	/// `GET /system`
	async fn system(&self) -> Result<SystemInfo, ApiError>;

	/// `GET /changes?since={since}&limit={limit}`
	async fn changes(&self, since: Seq, limit: u32) -> Result<ChangesPage, ApiError>;

	/// `GET /changes?last`
	async fn last_change(&self) -> Result<ChangesPage, ApiError>;

	/// `GET /instances/{id}/tags`
	///
	/// Returns the response body as is. Parsing is left to the caller.
	async fn instance_tags(&self, id: &str) -> Result<String, ApiError>;
}

/// Subset of the `GET /system` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
	pub name: String,
	pub version: String,
	#[serde(default)]
	pub api_version: Option<u32>,
	#[serde(default)]
	pub dicom_aet: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("Orthanc URL {0} cannot be used as a base URL")]
	InvalidBaseUrl(Url),
	#[error("Request to Orthanc failed: {0}")]
	Request(#[from] reqwest::Error),
	#[error("Orthanc responded with status {status} for {url}")]
	Status { status: u16, url: Url },
	#[error("Failed to decode Orthanc response: {0}")]
	Decode(#[from] serde_json::Error),
}
