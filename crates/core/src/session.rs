//! One display's session: the renderer bound to it and its lifecycle.
//!
//! Start and stop on a session are serialized by an async lock. Status reads
//! go through a separate view guarded by a short synchronous lock, so they
//! never wait behind a start or stop in progress.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use signage_protocol::{Mode, ModeParams, RenderState, SessionStatus, StatusSnapshot};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::display::Display;
use crate::display::surface::SurfaceProvider;
use crate::error::{OrchestratorError, RenderError, Result};
use crate::renderer::{RenderContext, Renderer, build_renderer};

/// Bounded waits applied to renderer transitions.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
	pub start: Duration,
	pub stop: Duration,
	pub force_grace: Duration,
}

impl Timeouts {
	pub fn from_config(config: &Config) -> Self {
		Self {
			start: config.start_timeout(),
			stop: config.stop_timeout(),
			force_grace: config.force_grace(),
		}
	}
}

/// What status queries see.
struct SessionView {
	status: SessionStatus,
	mode: Option<Mode>,
	renderer: Option<Arc<dyn Renderer>>,
	last_state: Option<RenderState>,
	last_error: Option<String>,
	generation: u64,
}

impl SessionView {
	fn is_current(&self, generation: u64) -> bool {
		self.generation == generation
	}
}

/// The renderer a session currently owns.
struct ActiveRenderer {
	renderer: Arc<dyn Renderer>,
	generation: u64,
	exited: watch::Receiver<bool>,
}

pub struct Session {
	display: Arc<Display>,
	surfaces: Arc<dyn SurfaceProvider>,
	lifecycle: tokio::sync::Mutex<Option<ActiveRenderer>>,
	view: Arc<Mutex<SessionView>>,
}

impl Session {
	pub fn new(display: Arc<Display>, surfaces: Arc<dyn SurfaceProvider>) -> Self {
		Self {
			display,
			surfaces,
			lifecycle: tokio::sync::Mutex::new(None),
			view: Arc::new(Mutex::new(SessionView {
				status: SessionStatus::Idle,
				mode: None,
				renderer: None,
				last_state: None,
				last_error: None,
				generation: 0,
			})),
		}
	}

	pub fn display(&self) -> &Arc<Display> {
		&self.display
	}

	/// Replaces whatever runs on this display with the renderer for `params`.
	///
	/// Returns once the new renderer reports it is running. The renderer is
	/// owned by the session from the moment it is spawned, so a caller that
	/// abandons this future still leaves it reachable by [`Session::stop`].
	pub async fn start(&self, params: ModeParams, config: &Config) -> Result<()> {
		let timeouts = Timeouts::from_config(config);
		let display_id = self.display.id();
		let mode = params.mode();
		let mut lifecycle = self.lifecycle.lock().await;

		if let Some(previous) = lifecycle.as_ref() {
			debug!(target = "signage.session", display = %display_id, generation = previous.generation, "superseding running renderer");
			let outcome = self.teardown(previous, &timeouts).await;
			match outcome {
				Ok(()) | Err(OrchestratorError::StopTimeout { forced: true, .. }) => {}
				Err(err) => return Err(err),
			}
		}
		*lifecycle = None;

		let renderer = build_renderer(params, config);
		let generation = {
			let mut view = self.view.lock();
			view.generation += 1;
			view.status = SessionStatus::Starting;
			view.mode = Some(mode);
			view.renderer = Some(Arc::clone(&renderer));
			view.last_error = None;
			view.generation
		};

		let (ready_tx, ready_rx) = oneshot::channel();
		let (outcome_tx, outcome_rx) = oneshot::channel();
		let (exited_tx, exited_rx) = watch::channel(false);
		let ctx = RenderContext::new(Arc::clone(&self.display), Arc::clone(&self.surfaces), ready_tx);

		let task_renderer = Arc::clone(&renderer);
		let task = tokio::spawn(async move { task_renderer.run(ctx).await });
		let view = Arc::clone(&self.view);
		let monitored = Arc::clone(&renderer);
		tokio::spawn(async move {
			let outcome = match task.await {
				Ok(outcome) => outcome,
				Err(err) if err.is_panic() => Err(RenderError::Task("renderer panicked".to_string())),
				Err(_) => Err(RenderError::Task("renderer task cancelled".to_string())),
			};
			record_exit(&view, display_id, generation, monitored.as_ref(), &outcome);
			let _ = outcome_tx.send(outcome);
			exited_tx.send_replace(true);
		});

		*lifecycle = Some(ActiveRenderer {
			renderer,
			generation,
			exited: exited_rx,
		});

		match tokio::time::timeout(timeouts.start, ready_rx).await {
			Ok(Ok(())) => {
				{
					let mut view = self.view.lock();
					if view.is_current(generation) && view.status == SessionStatus::Starting {
						view.status = SessionStatus::Running;
					}
				}
				info!(target = "signage.session", display = %display_id, %mode, generation, "renderer running");
				Ok(())
			}
			Ok(Err(_)) => {
				// The context was dropped before the renderer reported running.
				*lifecycle = None;
				let cause = match outcome_rx.await {
					Ok(Err(err)) => err,
					Ok(Ok(())) => RenderError::ExitedBeforeRunning,
					Err(_) => RenderError::Task("renderer monitor vanished".to_string()),
				};
				warn!(target = "signage.session", display = %display_id, %mode, error = %cause, "renderer failed to start");
				Err(OrchestratorError::RendererStartFailed {
					display: display_id,
					mode,
					source: cause,
				})
			}
			Err(_) => {
				warn!(
					target = "signage.session",
					display = %display_id,
					%mode,
					timeout_ms = timeouts.start.as_millis() as u64,
					"renderer did not reach running state; tearing down"
				);
				let cause = RenderError::StartTimeout(timeouts.start.as_millis() as u64);
				if let Some(active) = lifecycle.as_ref() {
					let outcome = self.teardown(active, &timeouts).await;
					if let Err(err) = outcome {
						if !matches!(err, OrchestratorError::StopTimeout { forced: true, .. }) {
							return Err(err);
						}
					}
				}
				*lifecycle = None;
				{
					let mut view = self.view.lock();
					if view.is_current(generation) {
						view.status = SessionStatus::Stopped;
						view.last_error = Some(cause.to_string());
					}
				}
				Err(OrchestratorError::RendererStartFailed {
					display: display_id,
					mode,
					source: cause,
				})
			}
		}
	}

	/// Stops the current renderer. A session with nothing running succeeds immediately.
	///
	/// The renderer stays owned by the session until teardown finishes, so an
	/// abandoned stop can be retried.
	pub async fn stop(&self, config: &Config) -> Result<()> {
		let timeouts = Timeouts::from_config(config);
		let mut lifecycle = self.lifecycle.lock().await;
		let Some(active) = lifecycle.as_ref() else {
			return Ok(());
		};
		let generation = active.generation;

		let outcome = self.teardown(active, &timeouts).await;
		match outcome {
			Ok(()) => {
				*lifecycle = None;
				let mut view = self.view.lock();
				if view.is_current(generation) {
					view.status = SessionStatus::Stopped;
				}
				info!(target = "signage.session", display = %self.display.id(), generation, "session stopped");
				Ok(())
			}
			Err(err @ OrchestratorError::StopTimeout { forced: true, .. }) => {
				*lifecycle = None;
				let mut view = self.view.lock();
				if view.is_current(generation) {
					view.status = SessionStatus::Stopped;
				}
				Err(err)
			}
			Err(err) => Err(err),
		}
	}

	/// Requests a stop and waits for the run loop to exit, escalating to
	/// `force_stop` when the stop timeout elapses.
	async fn teardown(&self, active: &ActiveRenderer, timeouts: &Timeouts) -> Result<()> {
		let display_id = self.display.id();
		{
			let mut view = self.view.lock();
			if view.is_current(active.generation) && matches!(view.status, SessionStatus::Starting | SessionStatus::Running) {
				view.status = SessionStatus::Stopping;
			}
		}

		active.renderer.request_stop();
		let mut exited = active.exited.clone();
		if wait_for_exit(&mut exited, timeouts.stop).await {
			return Ok(());
		}

		warn!(
			target = "signage.session",
			display = %display_id,
			timeout_ms = timeouts.stop.as_millis() as u64,
			"renderer ignored stop request; forcing"
		);
		active.renderer.force_stop();
		let forced = wait_for_exit(&mut exited, timeouts.force_grace).await;
		if !forced {
			error!(target = "signage.session", display = %display_id, "renderer still running after forced termination");
		}
		Err(OrchestratorError::StopTimeout {
			display: display_id,
			forced,
		})
	}

	/// Point-in-time status. Never waits on start or stop.
	pub fn snapshot(&self) -> StatusSnapshot {
		let (mut snapshot, renderer) = {
			let view = self.view.lock();
			let snapshot = StatusSnapshot {
				display: self.display.id(),
				running: view.status == SessionStatus::Running,
				status: view.status,
				mode: view.mode,
				render: None,
				last_state: view.last_state.clone(),
				last_error: view.last_error.clone(),
				generation: view.generation,
			};
			(snapshot, view.renderer.clone())
		};
		snapshot.render = renderer.map(|r| r.snapshot());
		snapshot
	}
}

/// Resolves `true` once the renderer task has finished (or its monitor is gone).
async fn wait_for_exit(exited: &mut watch::Receiver<bool>, limit: Duration) -> bool {
	tokio::time::timeout(limit, exited.wait_for(|done| *done)).await.is_ok()
}

/// Exit bookkeeping from a renderer task; ignored when a newer start has taken over.
fn record_exit(
	view: &Mutex<SessionView>,
	display_id: signage_protocol::DisplayId,
	generation: u64,
	renderer: &dyn Renderer,
	outcome: &std::result::Result<(), RenderError>,
) {
	let last_state = renderer.snapshot();
	let mut view = view.lock();
	if !view.is_current(generation) {
		debug!(target = "signage.session", display = %display_id, generation, current = view.generation, "ignoring exit of superseded renderer");
		return;
	}

	view.renderer = None;
	view.last_state = Some(last_state);
	match outcome {
		Err(err) if view.status == SessionStatus::Running => {
			error!(target = "signage.session", display = %display_id, generation, error = %err, "renderer failed");
			view.status = SessionStatus::Failed;
			view.last_error = Some(err.to_string());
		}
		Err(err) => {
			view.status = SessionStatus::Stopped;
			view.last_error = Some(err.to_string());
		}
		Ok(()) => {
			debug!(target = "signage.session", display = %display_id, generation, "renderer exited");
			view.status = SessionStatus::Stopped;
		}
	}
}
