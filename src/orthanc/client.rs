use super::{ApiError, OrthancApi, SystemInfo};
use crate::config::OrthancConfig;
use crate::types::{ChangesPage, Seq};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{instrument, trace};
use url::Url;

const USER_AGENT: &str = concat!("orthanc-middleman/", env!("CARGO_PKG_VERSION"));

/// [`OrthancApi`] implementation backed by the Orthanc REST API.
#[derive(Debug, Clone)]
pub struct OrthancClient {
	http: reqwest::Client,
	base_url: Url,
	username: Option<String>,
	password: Option<String>,
}

impl OrthancClient {
	pub fn new(config: &OrthancConfig) -> Result<Self, ApiError> {
		if config.url.cannot_be_a_base() {
			return Err(ApiError::InvalidBaseUrl(config.url.clone()));
		}

		let http = reqwest::Client::builder()
			.timeout(config.timeout())
			.user_agent(USER_AGENT)
			.build()?;

		Ok(Self {
			http,
			base_url: config.url.clone(),
			username: config.username.clone(),
			password: config.password.clone(),
		})
	}

	/// Appends the path segments to the base URL.
	/// Segments are percent-encoded, so resource identifiers can be passed as is.
	fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|()| ApiError::InvalidBaseUrl(self.base_url.clone()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	#[instrument(skip_all, fields(url = %url))]
	async fn get_text(&self, url: Url) -> Result<String, ApiError> {
		let mut request = self.http.get(url.clone());
		if let Some(username) = &self.username {
			request = request.basic_auth(username, self.password.as_deref());
		}

		let response = request.send().await?;
		let status = response.status();
		trace!(%status, "Received response from Orthanc");
		if !status.is_success() {
			return Err(ApiError::Status {
				status: status.as_u16(),
				url,
			});
		}

		Ok(response.text().await?)
	}

	async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
		let body = self.get_text(url).await?;
		Ok(serde_json::from_str(&body)?)
	}
}

#[async_trait]
impl OrthancApi for OrthancClient {
	async fn system(&self) -> Result<SystemInfo, ApiError> {
		self.get_json(self.endpoint(&["system"])?).await
	}

	async fn changes(&self, since: Seq, limit: u32) -> Result<ChangesPage, ApiError> {
		let mut url = self.endpoint(&["changes"])?;
		url.query_pairs_mut()
			.append_pair("since", &since.to_string())
			.append_pair("limit", &limit.to_string());
		self.get_json(url).await
	}

	async fn last_change(&self) -> Result<ChangesPage, ApiError> {
		let mut url = self.endpoint(&["changes"])?;
		url.set_query(Some("last"));
		self.get_json(url).await
	}

	async fn instance_tags(&self, id: &str) -> Result<String, ApiError> {
		self.get_text(self.endpoint(&["instances", id, "tags"])?)
			.await
	}
}
