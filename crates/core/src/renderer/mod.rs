//! Renderer contract and the static mode-to-renderer registry.

pub mod kiosk;
pub mod player;
pub mod playlist;
pub mod recognition;
pub mod slideshow;
pub mod text;
pub mod transition;
pub mod video;

use std::sync::Arc;

use async_trait::async_trait;
use signage_protocol::{Mode, ModeParams, RenderState};
use tokio::sync::oneshot;

use crate::config::Config;
use crate::display::surface::{Surface, SurfaceProvider};
use crate::display::{Display, OutputLease};
use crate::error::RenderError;

pub use kiosk::KioskRenderer;
pub use recognition::RecognitionRenderer;
pub use slideshow::SlideshowRenderer;
pub use video::VideoRenderer;

/// A mode-specific engine driving one display.
///
/// `run` is the renderer's loop and executes on its own task. It returns once
/// a stop is requested or an unrecoverable error occurs. `request_stop` and
/// `snapshot` may be called from any task while `run` is in progress.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
	fn mode(&self) -> Mode;

	async fn run(&self, ctx: RenderContext) -> Result<(), RenderError>;

	/// Idempotent. Makes `run` return promptly.
	fn request_stop(&self);

	/// Kills any process the renderer owns. Used after a stop times out.
	fn force_stop(&self) {}

	fn snapshot(&self) -> RenderState;
}

/// Everything a renderer's `run` needs from its session.
pub struct RenderContext {
	display: Arc<Display>,
	surfaces: Arc<dyn SurfaceProvider>,
	ready: Option<oneshot::Sender<()>>,
}

impl RenderContext {
	pub fn new(display: Arc<Display>, surfaces: Arc<dyn SurfaceProvider>, ready: oneshot::Sender<()>) -> Self {
		Self {
			display,
			surfaces,
			ready: Some(ready),
		}
	}

	pub fn display(&self) -> &Arc<Display> {
		&self.display
	}

	pub fn acquire_output(&self) -> Result<OutputLease, RenderError> {
		self.display.acquire_output()
	}

	pub fn open_surface(&self, lease: &OutputLease) -> Result<Box<dyn Surface>, RenderError> {
		self.surfaces.open(&self.display, lease)
	}

	/// Signals the session that the renderer entered its running state.
	pub fn mark_running(&mut self) {
		if let Some(ready) = self.ready.take() {
			let _ = ready.send(());
		}
	}
}

/// Builds the renderer for `params`.
pub fn build_renderer(params: ModeParams, config: &Config) -> Arc<dyn Renderer> {
	match params {
		ModeParams::Recognition { lines } => Arc::new(RecognitionRenderer::new(config.modes.recognition.clone(), lines)),
		ModeParams::Video { playlist } => Arc::new(VideoRenderer::new(config.modes.video.clone(), playlist)),
		ModeParams::Kiosk { url } => Arc::new(KioskRenderer::new(config.modes.kiosk.clone(), url)),
		ModeParams::Slideshow { playlist } => Arc::new(SlideshowRenderer::new(config.modes.slideshow.clone(), playlist)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registry_builds_the_requested_mode() {
		let config = Config::default();
		for mode in Mode::ALL {
			let renderer = build_renderer(ModeParams::defaults_for(mode), &config);
			assert_eq!(renderer.mode(), mode);
			assert_eq!(renderer.snapshot().mode(), mode);
		}
	}
}
