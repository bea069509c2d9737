//! Top-level owner of every display session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use signage_protocol::{DisplayId, ModeParams, StatusSnapshot};
use tracing::{info, warn};

use crate::config::Config;
use crate::display::DisplayRegistry;
use crate::display::surface::{FramebufferProvider, SurfaceProvider};
use crate::error::{OrchestratorError, Result};
use crate::session::Session;

/// Routes start, stop and status requests to per-display sessions.
///
/// The session table lock is held only for lookup and insertion; everything
/// slower runs under the session's own lock, so displays never wait on each other.
pub struct Orchestrator {
	config: Arc<Config>,
	registry: DisplayRegistry,
	surfaces: Arc<dyn SurfaceProvider>,
	sessions: Mutex<HashMap<DisplayId, Arc<Session>>>,
}

impl Orchestrator {
	/// Orchestrator drawing to the configured framebuffer devices.
	pub fn new(config: Config) -> Self {
		Self::with_surfaces(config, Arc::new(FramebufferProvider))
	}

	pub fn with_surfaces(config: Config, surfaces: Arc<dyn SurfaceProvider>) -> Self {
		let registry = DisplayRegistry::from_config(&config);
		Self {
			config: Arc::new(config),
			registry,
			surfaces,
			sessions: Mutex::new(HashMap::new()),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn registry(&self) -> &DisplayRegistry {
		&self.registry
	}

	fn existing_session(&self, display: DisplayId) -> Option<Arc<Session>> {
		self.sessions.lock().get(&display).cloned()
	}

	/// Starts the mode in `params` on `display_id`, replacing whatever runs there.
	///
	/// # Errors
	///
	/// [`OrchestratorError::InvalidDisplay`] or [`OrchestratorError::ModeDisabled`]
	/// before anything is touched; [`OrchestratorError::RendererStartFailed`] when
	/// the renderer cannot reach its running state; [`OrchestratorError::StopTimeout`]
	/// when the previous renderer could not be torn down.
	pub async fn start(&self, display_id: DisplayId, params: ModeParams) -> Result<()> {
		let target = self.registry.get(display_id).ok_or(OrchestratorError::InvalidDisplay(display_id))?;
		let mode = params.mode();
		if !self.config.mode_enabled(mode) {
			return Err(OrchestratorError::ModeDisabled(mode));
		}

		let session = {
			let mut sessions = self.sessions.lock();
			Arc::clone(
				sessions
					.entry(display_id)
					.or_insert_with(|| Arc::new(Session::new(Arc::clone(target), Arc::clone(&self.surfaces)))),
			)
		};
		info!(target = "signage.orchestrator", display = %display_id, %mode, "start requested");
		session.start(params, &self.config).await
	}

	/// Stops `display_id`. Succeeds without side effects when nothing runs there.
	pub async fn stop(&self, display_id: DisplayId) -> Result<()> {
		if self.registry.get(display_id).is_none() {
			return Err(OrchestratorError::InvalidDisplay(display_id));
		}
		let Some(session) = self.existing_session(display_id) else {
			return Ok(());
		};
		info!(target = "signage.orchestrator", display = %display_id, "stop requested");
		session.stop(&self.config).await
	}

	pub fn status(&self, display: DisplayId) -> Result<StatusSnapshot> {
		if self.registry.get(display).is_none() {
			return Err(OrchestratorError::UnknownDisplay(display));
		}
		Ok(self
			.existing_session(display)
			.map(|session| session.snapshot())
			.unwrap_or_else(|| StatusSnapshot::idle(display)))
	}

	/// Status of every display, ordered by id.
	pub fn status_all(&self) -> Vec<StatusSnapshot> {
		self.registry
			.ids()
			.map(|display| {
				self.existing_session(display)
					.map(|session| session.snapshot())
					.unwrap_or_else(|| StatusSnapshot::idle(display))
			})
			.collect()
	}

	/// Stops every session concurrently; returns the failures.
	pub async fn stop_all(&self) -> Vec<OrchestratorError> {
		let sessions: Vec<Arc<Session>> = self.sessions.lock().values().cloned().collect();
		let handles: Vec<_> = sessions
			.into_iter()
			.map(|session| {
				let config = Arc::clone(&self.config);
				tokio::spawn(async move { session.stop(&config).await })
			})
			.collect();

		let mut failures = Vec::new();
		for handle in handles {
			match handle.await {
				Ok(Ok(())) => {}
				Ok(Err(err)) => {
					warn!(target = "signage.orchestrator", error = %err, "stop during shutdown failed");
					failures.push(err);
				}
				Err(err) => warn!(target = "signage.orchestrator", error = %err, "stop task failed"),
			}
		}
		failures
	}
}

#[cfg(test)]
mod tests {
	use signage_protocol::{Mode, SessionStatus};

	use super::*;
	use crate::display::surface::HeadlessProvider;

	fn orchestrator(config: Config) -> Orchestrator {
		Orchestrator::with_surfaces(config, Arc::new(HeadlessProvider::new()))
	}

	#[tokio::test]
	async fn unknown_display_is_rejected_per_operation() {
		let orch = orchestrator(Config::default());
		let bad = DisplayId(9);

		let err = orch.start(bad, ModeParams::defaults_for(Mode::Recognition)).await.unwrap_err();
		assert!(matches!(err, OrchestratorError::InvalidDisplay(d) if d == bad));
		assert!(matches!(orch.stop(bad).await, Err(OrchestratorError::InvalidDisplay(_))));
		assert!(matches!(orch.status(bad), Err(OrchestratorError::UnknownDisplay(_))));
	}

	#[tokio::test]
	async fn disabled_mode_is_rejected_before_a_session_exists() {
		let mut config = Config::default();
		config.modes.kiosk.enabled = false;
		let orch = orchestrator(config);

		let err = orch.start(DisplayId(0), ModeParams::defaults_for(Mode::Kiosk)).await.unwrap_err();
		assert!(matches!(err, OrchestratorError::ModeDisabled(Mode::Kiosk)));
		assert_eq!(orch.status(DisplayId(0)).unwrap(), StatusSnapshot::idle(DisplayId(0)));
	}

	#[tokio::test]
	async fn stop_without_session_is_a_no_op() {
		let orch = orchestrator(Config::default());
		orch.stop(DisplayId(1)).await.unwrap();
		orch.stop(DisplayId(1)).await.unwrap();
		assert_eq!(orch.status(DisplayId(1)).unwrap().status, SessionStatus::Idle);
	}

	#[test]
	fn status_all_covers_both_displays() {
		let orch = orchestrator(Config::default());
		let all = orch.status_all();
		assert_eq!(all.iter().map(|s| s.display).collect::<Vec<_>>(), vec![DisplayId(0), DisplayId(1)]);
		assert!(all.iter().all(|s| !s.running));
	}
}
