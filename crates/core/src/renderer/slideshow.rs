//! Mixed image and video playlist with transitions.
//!
//! Images are letterboxed onto the display surface, revealed with the next
//! transition style in rotation, and held for their duration while the stop
//! signal is checked at sub-second granularity. Videos are handed to the
//! player and block the loop until they finish or a stop terminates the
//! player. Items that fail to load or play are logged and skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::imageops::FilterType;
use parking_lot::Mutex;
use signage_protocol::{MediaKind, Mode, RenderState, SlideshowPhase, SlideshowState};
use signage_runtime::{Signal, find_executable, signal_group, terminate_child};
use tracing::{debug, info, warn};

use super::player::PlayerCommand;
use super::playlist::{self, PlaylistItem};
use super::transition::{self, TransitionCycle};
use super::{RenderContext, Renderer};
use crate::config::SlideshowConfig;
use crate::display::Display;
use crate::display::surface::{Frame, Surface};
use crate::error::RenderError;
use crate::stop::{StopHandle, StopSignal};

const HOLD_SLICE: Duration = Duration::from_millis(250);

/// Decodes `path` and centres it on a black `width` x `height` frame, preserving aspect ratio.
pub fn load_slide(path: &Path, width: u32, height: u32) -> Result<Frame, RenderError> {
	let image = image::open(path).map_err(|source| RenderError::Image {
		path: path.to_path_buf(),
		source,
	})?;
	let fitted = image.resize(width, height, FilterType::Triangle).to_rgba8();
	let x = i64::from(width.saturating_sub(fitted.width()) / 2);
	let y = i64::from(height.saturating_sub(fitted.height()) / 2);

	let mut frame = Frame::new(width, height);
	frame.blend_straight(fitted.as_raw(), fitted.width(), fitted.height(), x, y);
	Ok(frame)
}

enum ItemOutcome {
	Shown,
	Skipped(String),
	Stopped,
}

pub struct SlideshowRenderer {
	config: SlideshowConfig,
	explicit: Option<Vec<PathBuf>>,
	stop: StopHandle,
	state: Mutex<SlideshowState>,
	player_pid: Arc<AtomicU32>,
}

impl SlideshowRenderer {
	pub fn new(config: SlideshowConfig, explicit: Option<Vec<PathBuf>>) -> Self {
		Self {
			config,
			explicit,
			stop: StopHandle::default(),
			state: Mutex::new(SlideshowState::default()),
			player_pid: Arc::new(AtomicU32::new(0)),
		}
	}

	async fn show_image(
		&self,
		item: &PlaylistItem,
		surface: &mut dyn Surface,
		transitions: &mut TransitionCycle,
		stop: &mut StopSignal,
	) -> Result<ItemOutcome, RenderError> {
		let (width, height) = surface.size();
		let path = item.path.clone();
		let target = match tokio::task::spawn_blocking(move || load_slide(&path, width, height)).await {
			Ok(Ok(frame)) => frame,
			Ok(Err(err)) => return Ok(ItemOutcome::Skipped(err.to_string())),
			Err(err) => return Ok(ItemOutcome::Skipped(format!("decoder task failed: {err}"))),
		};

		let style = transitions.next_style();
		let steps = transition::reveals(style, self.config.fade_steps, width);
		let step_delay = Duration::from_millis(self.config.fade_duration_ms) / steps.len().max(1) as u32;
		let mut frame = Frame::new(width, height);
		for reveal in steps {
			reveal.compose(&target, &mut frame);
			surface.present(&frame)?;
			if stop.sleep(step_delay).await {
				return Ok(ItemOutcome::Stopped);
			}
		}

		let hold = item.duration.unwrap_or(Duration::from_millis(self.config.image_duration_ms));
		let started = Instant::now();
		loop {
			let elapsed = started.elapsed();
			self.state.lock().elapsed_ms = elapsed.as_millis() as u64;
			if elapsed >= hold {
				return Ok(ItemOutcome::Shown);
			}
			if stop.sleep(HOLD_SLICE.min(hold - elapsed)).await {
				return Ok(ItemOutcome::Stopped);
			}
		}
	}

	async fn play_video(&self, item: &PlaylistItem, player: Option<&Path>, output: &Display, stop: &mut StopSignal) -> ItemOutcome {
		let Some(program) = player else {
			return ItemOutcome::Skipped("no video player available".to_string());
		};
		let command = PlayerCommand::new(program, output, &self.config.hwdec, &self.config.player_args);
		let mut child = match command.single(&item.path).spawn() {
			Ok(child) => child,
			Err(err) => return ItemOutcome::Skipped(format!("failed to launch {}: {err}", program.display())),
		};
		self.player_pid.store(child.id().unwrap_or(0), Ordering::Release);

		let started = Instant::now();
		let outcome = tokio::select! {
			status = child.wait() => match status {
				Ok(status) if status.success() => ItemOutcome::Shown,
				Ok(status) => ItemOutcome::Skipped(format!("player exited with {status}")),
				Err(err) => ItemOutcome::Skipped(err.to_string()),
			},
			_ = stop.stopped() => {
				let grace = Duration::from_millis(self.config.grace_ms);
				match terminate_child(&mut child, grace).await {
					Ok(termination) => debug!(target = "signage.slideshow", forced = termination.was_forced(), "player stopped"),
					Err(err) => warn!(target = "signage.slideshow", error = %err, "player teardown failed"),
				}
				ItemOutcome::Stopped
			}
		};
		self.player_pid.store(0, Ordering::Release);
		self.state.lock().elapsed_ms = started.elapsed().as_millis() as u64;

		if stop.is_stopped() { ItemOutcome::Stopped } else { outcome }
	}
}

#[async_trait]
impl Renderer for SlideshowRenderer {
	fn mode(&self) -> Mode {
		Mode::Slideshow
	}

	async fn run(&self, mut ctx: RenderContext) -> Result<(), RenderError> {
		let output = ctx.display().clone();
		let mut stop = self.stop.subscribe();

		let (explicit, config) = (self.explicit.clone(), self.config.clone());
		let playlist = tokio::task::spawn_blocking(move || playlist::slideshow_playlist(explicit.as_deref(), &config))
			.await
			.map_err(|err| RenderError::Task(err.to_string()))??;
		let lease = ctx.acquire_output()?;
		let mut surface = ctx.open_surface(&lease)?;

		let player = if playlist.contains_kind(MediaKind::Video) {
			let found = find_executable(&[&self.config.player]);
			if found.is_none() {
				warn!(target = "signage.slideshow", player = %self.config.player, "video player not found; video items will be skipped");
			}
			found
		} else {
			None
		};

		let mut transitions = TransitionCycle::new(&self.config.transitions);
		{
			let mut state = self.state.lock();
			state.phase = SlideshowPhase::Playing;
			state.item_count = playlist.len();
		}
		info!(target = "signage.slideshow", display = %output.id(), items = playlist.len(), "slideshow playing");
		ctx.mark_running();

		let mut index = 0;
		let mut shown_this_cycle = false;
		while !stop.is_stopped() {
			let item = playlist.get(index);
			{
				let mut state = self.state.lock();
				state.index = index;
				state.current = Some(item.file_name());
				state.kind = Some(item.kind);
				state.elapsed_ms = 0;
			}
			debug!(target = "signage.slideshow", display = %output.id(), index, item = %item.path.display(), "showing item");

			let outcome = match item.kind {
				MediaKind::Image => self.show_image(item, surface.as_mut(), &mut transitions, &mut stop).await?,
				MediaKind::Video => self.play_video(item, player.as_deref(), &output, &mut stop).await,
			};
			match outcome {
				ItemOutcome::Shown => {
					shown_this_cycle = true;
					self.state.lock().items_shown += 1;
				}
				ItemOutcome::Skipped(reason) => {
					warn!(target = "signage.slideshow", item = %item.path.display(), %reason, "skipping item");
					self.state.lock().skipped += 1;
				}
				ItemOutcome::Stopped => break,
			}

			index = playlist.next_index(index);
			if index == 0 {
				if !shown_this_cycle {
					warn!(target = "signage.slideshow", display = %output.id(), "no item could be shown this cycle; backing off");
					if stop.sleep(Duration::from_millis(self.config.image_duration_ms)).await {
						break;
					}
				}
				shown_this_cycle = false;
			}
		}

		let (width, height) = surface.size();
		let _ = surface.present(&Frame::new(width, height));
		self.state.lock().phase = SlideshowPhase::Stopped;
		debug!(target = "signage.slideshow", display = %output.id(), "stopped");
		Ok(())
	}

	fn request_stop(&self) {
		self.stop.request_stop();
	}

	fn force_stop(&self) {
		let pid = self.player_pid.load(Ordering::Acquire);
		if pid != 0 {
			warn!(target = "signage.slideshow", pid, "force-killing embedded player");
			let _ = signal_group(pid, Signal::Kill);
		}
	}

	fn snapshot(&self) -> RenderState {
		RenderState::Slideshow(self.state.lock().clone())
	}
}
