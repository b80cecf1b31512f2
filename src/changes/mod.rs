//! Follows the Orthanc change log and forwards every change to a [`ChangeHandler`].
//!
//! Orthanc does not record its own start-up in the change log. The feed reports
//! [`ChangeType::OrthancStarted`] whenever it (re)connects to the server instead, and whenever
//! the change log shrinks below the cursor, which means Orthanc restarted with a new database.

use crate::config::ChangeFeedConfig;
use crate::handler::ChangeHandler;
use crate::orthanc::{ApiError, OrthancApi};
use crate::types::{Change, ChangeType, ResourceType, Seq};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a single [`ChangeFeed::tick`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Progress {
	/// More changes may be pending. Poll again right away.
	Pending,
	/// The end of the change log was reached.
	Idle,
}

pub struct ChangeFeed {
	api: Arc<dyn OrthancApi>,
	handler: Arc<dyn ChangeHandler>,
	config: ChangeFeedConfig,
	/// Sequence number of the last change that was dispatched.
	seq: Option<Seq>,
	connected: bool,
}

impl ChangeFeed {
	pub fn new(
		api: Arc<dyn OrthancApi>,
		handler: Arc<dyn ChangeHandler>,
		config: ChangeFeedConfig,
	) -> Self {
		Self {
			api,
			handler,
			config,
			seq: None,
			connected: false,
		}
	}

	pub const fn seq(&self) -> Option<Seq> {
		self.seq
	}

	/// Polls the change log until `shutdown` completes.
	pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
		tokio::pin!(shutdown);
		let interval = self.config.interval();

		loop {
			let delay = match self.tick().await {
				Ok(Progress::Pending) => Duration::ZERO,
				Ok(Progress::Idle) => interval,
				Err(err) => {
					warn!("Orthanc is not reachable, retrying in {interval:?}: {err}");
					interval
				}
			};

			tokio::select! {
				biased;
				() = &mut shutdown => break,
				() = tokio::time::sleep(delay) => {}
			}
		}
	}

	/// Connects to Orthanc if necessary, otherwise dispatches the next page of the change log.
	pub async fn tick(&mut self) -> Result<Progress, ApiError> {
		if !self.connected {
			return self.connect().await.map(|()| Progress::Pending);
		}

		let since = self.seq.unwrap_or_default();
		let tail = match self.api.last_change().await {
			Ok(page) => page.last,
			Err(err) => {
				self.connected = false;
				return Err(err);
			}
		};
		if tail < since {
			self.connected = false;
			return self.connect().await.map(|()| Progress::Pending);
		}

		let page = match self.api.changes(since, self.config.limit).await {
			Ok(page) => page,
			Err(err) => {
				self.connected = false;
				return Err(err);
			}
		};

		debug!(since, count = page.changes.len(), last = page.last, "Fetched changes");
		for change in &page.changes {
			self.dispatch(change).await;
			self.seq = Some(change.seq.max(since));
		}
		self.seq = Some(page.last.max(self.seq.unwrap_or(since)));

		Ok(if page.done {
			Progress::Idle
		} else {
			Progress::Pending
		})
	}

	#[instrument(skip_all)]
	async fn connect(&mut self) -> Result<(), ApiError> {
		let system = self.api.system().await?;
		let tail = self.api.last_change().await?.last;

		let start = match self.seq {
			None => self.config.since.unwrap_or(tail),
			Some(seq) if tail < seq => {
				warn!(seq, tail, "Orthanc change log was reset, replaying it from the start");
				0
			}
			Some(seq) => seq,
		};
		self.seq = Some(start);

		self.connected = true;
		info!(
			server = %system.name,
			version = %system.version,
			api = system.api_version,
			aet = system.dicom_aet.as_deref(),
			seq = self.seq,
			"Following the Orthanc change log"
		);

		if let Err(err) = self
			.handler
			.on_change(&ChangeType::OrthancStarted, ResourceType::None, "")
			.await
		{
			error!("Failed to handle {}: {err}", ChangeType::OrthancStarted);
		}
		Ok(())
	}

	async fn dispatch(&self, change: &Change) {
		debug!(
			seq = change.seq,
			path = %change.path,
			date = %change.date,
			"Dispatching {}",
			change.change_type
		);
		if let Err(err) = self
			.handler
			.on_change(&change.change_type, change.resource_type, &change.id)
			.await
		{
			error!(
				seq = change.seq,
				resource = %change.id,
				"Failed to handle {}: {err}",
				change.change_type
			);
		}
	}
}
