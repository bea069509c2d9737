//! Looping video playlist handed to an external player.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use signage_protocol::{Mode, RenderState, VideoPhase, VideoState};
use signage_runtime::{Signal, find_executable, signal_group, terminate_child};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::player::{PlayerCommand, PlayerIpc, ipc_socket_path};
use super::playlist;
use super::{RenderContext, Renderer};
use crate::config::VideoConfig;
use crate::error::RenderError;
use crate::stop::StopHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const IPC_WAIT_ATTEMPTS: u32 = 10;
const IPC_WAIT_STEP: Duration = Duration::from_millis(100);

pub struct VideoRenderer {
	config: VideoConfig,
	explicit: Option<Vec<PathBuf>>,
	stop: StopHandle,
	state: Mutex<VideoState>,
}

impl VideoRenderer {
	pub fn new(config: VideoConfig, explicit: Option<Vec<PathBuf>>) -> Self {
		Self {
			config,
			explicit,
			stop: StopHandle::default(),
			state: Mutex::new(VideoState::default()),
		}
	}

	fn set_phase(&self, phase: VideoPhase) {
		self.state.lock().phase = phase;
	}

	fn finish(&self, crashed: bool) {
		let mut state = self.state.lock();
		state.phase = VideoPhase::Stopped;
		state.pid = None;
		state.crashed = crashed;
	}
}

#[async_trait]
impl Renderer for VideoRenderer {
	fn mode(&self) -> Mode {
		Mode::Video
	}

	async fn run(&self, mut ctx: RenderContext) -> Result<(), RenderError> {
		let output = ctx.display().clone();
		let mut stop = self.stop.subscribe();

		self.set_phase(VideoPhase::Loading);
		let (explicit, config) = (self.explicit.clone(), self.config.clone());
		let playlist = tokio::task::spawn_blocking(move || playlist::video_playlist(explicit.as_deref(), &config))
			.await
			.map_err(|err| RenderError::Task(err.to_string()))??;
		let files: Vec<PathBuf> = playlist.items().iter().map(|item| item.path.clone()).collect();
		{
			let mut state = self.state.lock();
			state.playlist_len = files.len();
			state.current_file = files.first().map(|f| f.display().to_string());
		}

		let _lease = ctx.acquire_output()?;
		let program = find_executable(&[&self.config.player]).ok_or(RenderError::ExecutableNotFound { what: "video player" })?;

		let ipc = PlayerIpc::new(ipc_socket_path(&output));
		let _ = tokio::fs::remove_file(ipc.socket()).await;
		let player = PlayerCommand::new(&program, &output, &self.config.hwdec, &self.config.extra_args);
		let mut child = player.looping(ipc.socket(), &files).spawn().map_err(|source| RenderError::Launch {
			program: program.display().to_string(),
			source,
		})?;
		let pid = child.id();
		self.state.lock().pid = pid;
		info!(target = "signage.video", display = %output.id(), pid = ?pid, items = files.len(), "player launched");

		let grace = Duration::from_millis(self.config.grace_ms);
		let mut ipc_ready = false;
		for _ in 0..IPC_WAIT_ATTEMPTS {
			if let Some(status) = child.try_wait()? {
				self.finish(true);
				return Err(RenderError::BackendExited {
					what: "video player",
					status: status.to_string(),
				});
			}
			if ipc.is_ready().await {
				ipc_ready = true;
				break;
			}
			if stop.sleep(IPC_WAIT_STEP).await {
				terminate_child(&mut child, grace).await?;
				self.finish(false);
				return Ok(());
			}
		}
		if !ipc_ready {
			warn!(target = "signage.video", display = %output.id(), "player IPC unavailable; playback position will not be reported");
		}

		self.set_phase(VideoPhase::Playing);
		ctx.mark_running();

		let mut poll = tokio::time::interval(POLL_INTERVAL);
		poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
		let result = loop {
			tokio::select! {
				biased;
				_ = stop.stopped() => {
					if ipc_ready {
						if let Err(err) = ipc.quit().await {
							debug!(target = "signage.video", error = %err, "IPC quit failed");
						}
					}
					let termination = terminate_child(&mut child, grace).await?;
					debug!(target = "signage.video", display = %output.id(), forced = termination.was_forced(), "player stopped");
					self.finish(false);
					break Ok(());
				}
				status = child.wait() => {
					let status = status?;
					warn!(target = "signage.video", display = %output.id(), %status, "player exited unexpectedly");
					self.finish(true);
					break Err(RenderError::BackendExited { what: "video player", status: status.to_string() });
				}
				_ = poll.tick(), if ipc_ready => {
					match ipc.playback().await {
						Ok(playback) => {
							let mut state = self.state.lock();
							if playback.path.is_some() {
								state.current_file = playback.path;
							}
							state.position_secs = playback.position_secs;
							state.duration_secs = playback.duration_secs;
						}
						Err(err) => debug!(target = "signage.video", error = %err, "playback poll failed"),
					}
				}
			}
		};

		let _ = tokio::fs::remove_file(ipc.socket()).await;
		result
	}

	fn request_stop(&self) {
		self.stop.request_stop();
	}

	fn force_stop(&self) {
		if let Some(pid) = self.state.lock().pid {
			warn!(target = "signage.video", pid, "force-killing player");
			let _ = signal_group(pid, Signal::Kill);
		}
	}

	fn snapshot(&self) -> RenderState {
		RenderState::Video(self.state.lock().clone())
	}
}
