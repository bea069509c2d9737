//! Scrolling recognition text.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use signage_protocol::{Mode, RecognitionState, RenderState};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::text::{self, TextBlock};
use super::{RenderContext, Renderer};
use crate::config::RecognitionConfig;
use crate::display::surface::{Frame, parse_hex_color};
use crate::error::RenderError;
use crate::stop::StopHandle;

/// Vertical scroll position of the text block.
///
/// The block starts just below the bottom edge and moves up `step` pixels per
/// frame. Once its last row passes the top edge it restarts below the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
	screen_height: i64,
	block_height: i64,
	step: i64,
	offset: i64,
	wraps: u64,
}

impl ScrollState {
	pub fn new(screen_height: u32, block_height: u32, step: u32) -> Self {
		Self {
			screen_height: i64::from(screen_height),
			block_height: i64::from(block_height),
			step: i64::from(step.max(1)),
			offset: i64::from(screen_height),
			wraps: 0,
		}
	}

	pub fn offset(&self) -> i64 {
		self.offset
	}

	pub fn wraps(&self) -> u64 {
		self.wraps
	}

	/// Pixels travelled between two wraps.
	pub fn travel(&self) -> i64 {
		self.screen_height + self.block_height
	}

	pub fn advance(&mut self) {
		self.offset -= self.step;
		if self.offset + self.block_height <= 0 {
			self.offset = self.screen_height;
			self.wraps += 1;
		}
	}
}

pub struct RecognitionRenderer {
	config: RecognitionConfig,
	lines: Option<Vec<String>>,
	stop: StopHandle,
	state: Mutex<RecognitionState>,
}

impl RecognitionRenderer {
	pub fn new(config: RecognitionConfig, lines: Option<Vec<String>>) -> Self {
		Self {
			config,
			lines,
			stop: StopHandle::default(),
			state: Mutex::new(RecognitionState::default()),
		}
	}

	/// Names from the start request, else from the configured names file.
	async fn names(&self) -> Result<Vec<String>, RenderError> {
		if let Some(lines) = &self.lines {
			return Ok(lines.clone());
		}
		let Some(path) = &self.config.names_file else {
			return Ok(Vec::new());
		};
		let content = tokio::fs::read_to_string(path).await?;
		Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
	}
}

#[async_trait]
impl Renderer for RecognitionRenderer {
	fn mode(&self) -> Mode {
		Mode::Recognition
	}

	async fn run(&self, mut ctx: RenderContext) -> Result<(), RenderError> {
		let display_id = ctx.display().id();
		let names = self.names().await?;
		let lease = ctx.acquire_output()?;
		let mut surface = ctx.open_surface(&lease)?;
		let (width, height) = surface.size();

		let lines = text::compose_lines(&self.config, &names);
		let config = self.config.clone();
		let block = if lines.is_empty() {
			TextBlock::default()
		} else {
			tokio::task::spawn_blocking(move || {
				let options = text::system_font_options();
				text::render_block(&lines, &config, width, &options)
			})
			.await
			.map_err(|err| RenderError::Task(err.to_string()))??
		};

		let background = parse_hex_color(&self.config.background).unwrap_or([0, 0, 0]);
		let mut scroll = ScrollState::new(height, block.height(), self.config.scroll_step);
		*self.state.lock() = RecognitionState {
			offset: scroll.offset(),
			line_count: names.len(),
			block_height: block.height(),
			..RecognitionState::default()
		};

		let mut stop = self.stop.subscribe();
		let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(self.config.fps.max(1))));
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		let mut frame = Frame::new(width, height);

		info!(
			target = "signage.recognition",
			display = %display_id,
			names = names.len(),
			block_height = block.height(),
			fps = self.config.fps,
			"scrolling"
		);
		ctx.mark_running();

		loop {
			tokio::select! {
				biased;
				_ = stop.stopped() => break,
				_ = ticker.tick() => {}
			}

			frame.fill(background);
			block.draw(&mut frame, scroll.offset());
			surface.present(&frame)?;
			scroll.advance();

			let mut state = self.state.lock();
			if scroll.wraps() != state.wraps {
				debug!(target = "signage.recognition", display = %display_id, wraps = scroll.wraps(), "text block wrapped");
			}
			state.offset = scroll.offset();
			state.wraps = scroll.wraps();
			state.frames += 1;
		}

		frame.fill(background);
		let _ = surface.present(&frame);
		debug!(target = "signage.recognition", display = %display_id, "stopped");
		Ok(())
	}

	fn request_stop(&self) {
		self.stop.request_stop();
	}

	fn snapshot(&self) -> RenderState {
		RenderState::Recognition(self.state.lock().clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn offset_wraps_exactly_once_per_travel() {
		let mut scroll = ScrollState::new(100, 40, 2);
		let frames_per_cycle = scroll.travel() / 2;

		for _ in 0..frames_per_cycle - 1 {
			scroll.advance();
		}
		assert_eq!(scroll.wraps(), 0);
		assert_eq!(scroll.offset(), -38);

		scroll.advance();
		assert_eq!(scroll.wraps(), 1);
		assert_eq!(scroll.offset(), 100);

		// A further partial cycle does not wrap again.
		for _ in 0..frames_per_cycle - 1 {
			scroll.advance();
		}
		assert_eq!(scroll.wraps(), 1);
	}

	#[test]
	fn full_cycles_return_to_the_start_without_drift() {
		let mut scroll = ScrollState::new(1080, 517, 3);
		let start = scroll.offset();
		let mut frames = 0;
		while scroll.wraps() < 5 {
			scroll.advance();
			frames += 1;
		}
		assert_eq!(scroll.offset(), start);
		assert_eq!(frames % 5, 0);
	}

	#[test]
	fn zero_step_still_moves() {
		let mut scroll = ScrollState::new(10, 0, 0);
		scroll.advance();
		assert_eq!(scroll.offset(), 9);
	}
}
