use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_CONFIG: &str = include_str!("defaults.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub orthanc: OrthancConfig,
	pub changes: ChangeFeedConfig,
	pub output: OutputConfig,
}

impl AppConfig {
	/// Loads the application configuration from the following sources:
	/// 1. Defaults (defined in `defaults.toml`)
	/// 2. `config.toml` in the working directory (optional)
	/// 3. Environment variables prefixed with `ORTHANC_MIDDLEMAN`
	pub fn new() -> Result<Self, config::ConfigError> {
		config::Config::builder()
			.add_source(config::File::from_str(
				DEFAULT_CONFIG,
				config::FileFormat::Toml,
			))
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(config::Environment::with_prefix("ORTHANC_MIDDLEMAN").separator("_"))
			.build()?
			.try_deserialize()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	/// Default logging level. `RUST_LOG` takes precedence.
	#[serde(deserialize_with = "deserialize_level")]
	pub level: tracing::Level,
	/// Sentry DSN. Sentry stays disabled if unset.
	pub sentry: Option<String>,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
	D: Deserializer<'de>,
{
	let value = String::deserialize(deserializer)?;
	tracing::Level::from_str(&value).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrthancConfig {
	/// Base URL of the Orthanc REST API.
	pub url: Url,
	pub username: Option<String>,
	pub password: Option<String>,
	/// Request timeout in milliseconds.
	pub timeout: u64,
}

impl OrthancConfig {
	pub const fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeFeedConfig {
	/// Delay between two polls of the change log in milliseconds.
	pub interval: u64,
	/// Maximum number of changes requested per poll.
	pub limit: u32,
	/// Sequence number to resume from. Starts at the tail of the change log if unset.
	pub since: Option<u64>,
}

impl ChangeFeedConfig {
	pub const fn interval(&self) -> Duration {
		Duration::from_millis(self.interval)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
	/// Directory that receives one `{id}_info.json` file per new instance.
	pub directory: PathBuf,
}
