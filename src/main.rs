pub(crate) mod changes;
pub(crate) mod config;
pub(crate) mod handler;
pub(crate) mod orthanc;
pub(crate) mod types;

use crate::changes::ChangeFeed;
use crate::config::AppConfig;
use crate::handler::output::JsonFileSink;
use crate::handler::InstanceInfoWriter;
use crate::orthanc::OrthancClient;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logger(level: tracing::Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// No DSN leaves Sentry inactive
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	}

	guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = AppConfig::new()?;
	init_logger(config.telemetry.level);

	// Worker threads only inherit the Sentry hub if it is set up before the runtime exists
	let _sentry = init_sentry(&config);

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(async move {
			if let Err(error) = run(config).await {
				error!("Failed to start application due to error: {error}");
			}
		});
	Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
	let api = Arc::new(OrthancClient::new(&config.orthanc)?);

	let sink = JsonFileSink::new(&config.output.directory);
	sink.prepare().await?;
	info!(directory = %sink.directory().display(), "Writing instance tags");

	let handler = Arc::new(InstanceInfoWriter::new(api.clone(), sink));

	info!(url = %config.orthanc.url, "Watching Orthanc for changes");
	let mut feed = ChangeFeed::new(api, handler, config.changes);
	feed.run(shutdown_signal()).await;
	info!(seq = feed.seq(), "Stopped following the Orthanc change log");

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl-C: {err}");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(err) => {
				error!("Failed to listen for SIGTERM: {err}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}
