//! Session lifecycle and renderer progress snapshots.

use serde::{Deserialize, Serialize};

use crate::mode::{DisplayId, Mode};

/// Lifecycle status of a display session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	/// No renderer has ever been started on this display.
	#[default]
	Idle,
	/// A renderer task exists but has not reached its running state yet.
	Starting,
	/// The renderer is producing output.
	Running,
	/// A stop was requested and teardown is in progress.
	Stopping,
	/// The renderer exited after a stop, or the last start failed.
	Stopped,
	/// The renderer exited on its own with an error.
	Failed,
}

/// Kind of media a playlist item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
	Image,
	Video,
}

/// Progress of the scrolling text renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionState {
	/// Top edge of the text block relative to the top of the screen, in pixels.
	pub offset: i64,
	/// Number of times the block scrolled off the top and re-entered at the bottom.
	pub wraps: u64,
	/// Frames presented since the renderer entered its loop.
	pub frames: u64,
	pub line_count: usize,
	/// Height of the pre-rendered text block, in pixels.
	pub block_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoPhase {
	#[default]
	Idle,
	Loading,
	Playing,
	Stopped,
}

/// Progress of the looping video renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoState {
	pub phase: VideoPhase,
	pub playlist_len: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_file: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub position_secs: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_secs: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pid: Option<u32>,
	/// Set when the player exited while it was expected to keep playing.
	pub crashed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskPhase {
	#[default]
	NotStarted,
	Launching,
	Running,
	Terminating,
	Stopped,
}

/// Progress of the kiosk browser renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KioskState {
	pub phase: KioskPhase,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pid: Option<u32>,
	/// True iff a browser process exists and has not exited.
	pub running: bool,
	/// Set when teardown had to escalate to a forced kill.
	pub forced_kill: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideshowPhase {
	#[default]
	Building,
	Playing,
	Stopped,
}

/// Progress of the mixed-media slideshow renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideshowState {
	pub phase: SlideshowPhase,
	/// Playlist position currently on screen.
	pub index: usize,
	pub item_count: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub kind: Option<MediaKind>,
	/// Time spent on the current item, in milliseconds.
	pub elapsed_ms: u64,
	pub items_shown: u64,
	pub skipped: u64,
}

/// Variant-specific renderer progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderState {
	Recognition(RecognitionState),
	Video(VideoState),
	Kiosk(KioskState),
	Slideshow(SlideshowState),
}

impl RenderState {
	/// Returns the mode that produced this state.
	pub fn mode(&self) -> Mode {
		match self {
			RenderState::Recognition(_) => Mode::Recognition,
			RenderState::Video(_) => Mode::Video,
			RenderState::Kiosk(_) => Mode::Kiosk,
			RenderState::Slideshow(_) => Mode::Slideshow,
		}
	}
}

/// Point-in-time view of one display session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
	pub display: DisplayId,
	/// True while the session is running and its renderer is alive.
	pub running: bool,
	pub status: SessionStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mode: Option<Mode>,
	/// Live renderer progress, present only while running.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub render: Option<RenderState>,
	/// Renderer progress captured when the previous renderer exited.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_state: Option<RenderState>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_error: Option<String>,
	/// Number of renderers this session has started.
	pub generation: u64,
}

impl StatusSnapshot {
	/// Snapshot of a display that has never run anything.
	pub fn idle(display: DisplayId) -> Self {
		Self {
			display,
			running: false,
			status: SessionStatus::Idle,
			mode: None,
			render: None,
			last_state: None,
			last_error: None,
			generation: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn render_state_is_tagged_by_mode() {
		let state = RenderState::Kiosk(KioskState {
			phase: KioskPhase::Running,
			url: Some("https://example.com".into()),
			pid: Some(42),
			running: true,
			forced_kill: false,
		});
		let json = serde_json::to_value(&state).unwrap();
		assert_eq!(json["mode"], "kiosk");
		assert_eq!(json["phase"], "running");
		assert_eq!(json["pid"], 42);
		assert_eq!(state.mode(), Mode::Kiosk);
	}

	#[test]
	fn idle_snapshot_omits_optional_fields() {
		let json = serde_json::to_value(StatusSnapshot::idle(DisplayId(1))).unwrap();
		assert_eq!(json["display"], 1);
		assert_eq!(json["status"], "idle");
		assert_eq!(json["running"], false);
		assert!(json.get("render").is_none());
		assert!(json.get("mode").is_none());
	}
}
