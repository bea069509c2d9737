//! Static configuration loaded once at process start.
//!
//! The file is JSON with camelCase keys; every optional field has a default so
//! a minimal file only needs to describe the two displays.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use signage_protocol::{DisplayId, Mode};

use crate::display::surface::parse_hex_color;
use crate::error::ConfigError;
use crate::renderer::transition::TransitionStyle;

/// Number of physical outputs the orchestrator drives.
pub const DISPLAY_COUNT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
	#[serde(default = "default_displays")]
	pub displays: Vec<DisplayConfig>,
	#[serde(default = "default_start_timeout_ms")]
	pub start_timeout_ms: u64,
	#[serde(default = "default_stop_timeout_ms")]
	pub stop_timeout_ms: u64,
	#[serde(default = "default_force_grace_ms")]
	pub force_grace_ms: u64,
	#[serde(default)]
	pub modes: ModesConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			displays: default_displays(),
			start_timeout_ms: default_start_timeout_ms(),
			stop_timeout_ms: default_stop_timeout_ms(),
			force_grace_ms: default_force_grace_ms(),
			modes: ModesConfig::default(),
		}
	}
}

impl Config {
	/// Default location: `$XDG_CONFIG_HOME/signage/config.json`.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("signage").join("config.json"))
	}

	/// Reads, parses and validates the configuration at `path`.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Loads `path` when it exists, otherwise falls back to built-in defaults.
	pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
		if path.exists() {
			Self::load(path)
		} else {
			let config = Config::default();
			config.validate()?;
			Ok(config)
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.displays.len() != DISPLAY_COUNT {
			return Err(ConfigError::invalid(format!(
				"expected exactly {DISPLAY_COUNT} displays, found {}",
				self.displays.len()
			)));
		}
		let ids: HashSet<DisplayId> = self.displays.iter().map(|d| d.id).collect();
		if ids != HashSet::from([DisplayId(0), DisplayId(1)]) {
			return Err(ConfigError::invalid("display ids must be 0 and 1"));
		}
		for display in &self.displays {
			if display.width == 0 || display.height == 0 {
				return Err(ConfigError::invalid(format!("display {}: resolution must be non-zero", display.id)));
			}
			if display.refresh_hz == 0 {
				return Err(ConfigError::invalid(format!("display {}: refreshHz must be non-zero", display.id)));
			}
		}
		if self.start_timeout_ms == 0 || self.stop_timeout_ms == 0 || self.force_grace_ms == 0 {
			return Err(ConfigError::invalid("timeouts must be non-zero"));
		}

		let recognition = &self.modes.recognition;
		if recognition.fps == 0 || recognition.scroll_step == 0 {
			return Err(ConfigError::invalid("recognition: fps and scrollStep must be non-zero"));
		}
		if recognition.font_size == 0 || recognition.title_font_size == 0 {
			return Err(ConfigError::invalid("recognition: font sizes must be non-zero"));
		}
		if !(recognition.line_spacing.is_finite() && recognition.line_spacing > 0.0) {
			return Err(ConfigError::invalid("recognition: lineSpacing must be positive"));
		}
		for (key, value) in [("color", &recognition.color), ("background", &recognition.background)] {
			if parse_hex_color(value).is_none() {
				return Err(ConfigError::invalid(format!("recognition: {key} {value:?} is not a #rrggbb color")));
			}
		}

		let slideshow = &self.modes.slideshow;
		if slideshow.fade_steps == 0 {
			return Err(ConfigError::invalid("slideshow: fadeSteps must be at least 1"));
		}
		if slideshow.transitions.is_empty() {
			return Err(ConfigError::invalid("slideshow: at least one transition style is required"));
		}
		if slideshow.image_duration_ms == 0 {
			return Err(ConfigError::invalid("slideshow: imageDurationMs must be non-zero"));
		}

		Ok(())
	}

	pub fn display(&self, id: DisplayId) -> Option<&DisplayConfig> {
		self.displays.iter().find(|d| d.id == id)
	}

	pub fn mode_enabled(&self, mode: Mode) -> bool {
		match mode {
			Mode::Recognition => self.modes.recognition.enabled,
			Mode::Video => self.modes.video.enabled,
			Mode::Kiosk => self.modes.kiosk.enabled,
			Mode::Slideshow => self.modes.slideshow.enabled,
		}
	}

	pub fn start_timeout(&self) -> Duration {
		Duration::from_millis(self.start_timeout_ms)
	}

	pub fn stop_timeout(&self) -> Duration {
		Duration::from_millis(self.stop_timeout_ms)
	}

	pub fn force_grace(&self) -> Duration {
		Duration::from_millis(self.force_grace_ms)
	}
}

/// One physical output and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
	pub id: DisplayId,
	pub framebuffer: PathBuf,
	#[serde(default = "default_x11_display")]
	pub x11_display: String,
	#[serde(default)]
	pub x_offset: i32,
	pub width: u32,
	pub height: u32,
	#[serde(default = "default_refresh_hz")]
	pub refresh_hz: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModesConfig {
	pub recognition: RecognitionConfig,
	pub video: VideoConfig,
	pub kiosk: KioskConfig,
	pub slideshow: SlideshowConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecognitionConfig {
	pub enabled: bool,
	pub fps: u32,
	/// Pixels the text block moves up per frame.
	pub scroll_step: u32,
	pub title: Option<String>,
	pub title_font_size: u32,
	pub font_size: u32,
	/// Line advance as a multiple of the font size.
	pub line_spacing: f32,
	pub color: String,
	pub background: String,
	pub font_family: String,
	/// One name per line; used when a start request carries no lines.
	pub names_file: Option<PathBuf>,
}

impl Default for RecognitionConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			fps: 30,
			scroll_step: 2,
			title: Some("Thank You".to_string()),
			title_font_size: 72,
			font_size: 48,
			line_spacing: 1.4,
			color: "#ffffff".to_string(),
			background: "#000000".to_string(),
			font_family: "sans-serif".to_string(),
			names_file: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoConfig {
	pub enabled: bool,
	pub directory: PathBuf,
	pub extensions: Vec<String>,
	pub player: String,
	/// Passed to the player as `--hwdec=<hint>`.
	pub hwdec: String,
	pub extra_args: Vec<String>,
	pub grace_ms: u64,
}

impl Default for VideoConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			directory: media_root().join("videos"),
			extensions: default_video_extensions(),
			player: "mpv".to_string(),
			hwdec: "auto".to_string(),
			extra_args: Vec::new(),
			grace_ms: 3000,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KioskConfig {
	pub enabled: bool,
	/// Browser executable; discovered from a candidate list when unset.
	pub browser: Option<String>,
	/// Hosts (and their subdomains) the kiosk may open. Empty allows any host.
	pub allowed_domains: Vec<String>,
	pub home_url: Option<String>,
	pub profile_root: PathBuf,
	pub grace_ms: u64,
	/// How long a fresh browser must survive before the kiosk counts as running.
	pub launch_settle_ms: u64,
	pub extra_args: Vec<String>,
}

impl Default for KioskConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			browser: None,
			allowed_domains: Vec::new(),
			home_url: None,
			profile_root: dirs::cache_dir()
				.unwrap_or_else(std::env::temp_dir)
				.join("signage")
				.join("kiosk"),
			grace_ms: 3000,
			launch_settle_ms: 1500,
			extra_args: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlideshowConfig {
	pub enabled: bool,
	pub image_directory: PathBuf,
	pub video_directory: PathBuf,
	pub image_extensions: Vec<String>,
	pub video_extensions: Vec<String>,
	pub image_duration_ms: u64,
	pub fade_steps: u32,
	pub fade_duration_ms: u64,
	pub transitions: Vec<TransitionStyle>,
	pub player: String,
	pub hwdec: String,
	pub player_args: Vec<String>,
	/// Time a video item's player gets to exit after `SIGTERM` on stop.
	pub grace_ms: u64,
}

impl Default for SlideshowConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			image_directory: media_root().join("images"),
			video_directory: media_root().join("videos"),
			image_extensions: ["jpg", "jpeg", "png", "gif", "bmp", "webp"].map(String::from).to_vec(),
			video_extensions: default_video_extensions(),
			image_duration_ms: 5000,
			fade_steps: 30,
			fade_duration_ms: 1000,
			transitions: vec![TransitionStyle::Fade],
			player: "mpv".to_string(),
			hwdec: "auto".to_string(),
			player_args: Vec::new(),
			grace_ms: 3000,
		}
	}
}

fn media_root() -> PathBuf {
	PathBuf::from("/srv/signage")
}

fn default_video_extensions() -> Vec<String> {
	["mp4", "mkv", "mov", "avi", "webm"].map(String::from).to_vec()
}

fn default_displays() -> Vec<DisplayConfig> {
	(0..DISPLAY_COUNT as u8)
		.map(|id| DisplayConfig {
			id: DisplayId(id),
			framebuffer: PathBuf::from(format!("/dev/fb{id}")),
			x11_display: default_x11_display(),
			x_offset: i32::from(id) * 1920,
			width: 1920,
			height: 1080,
			refresh_hz: default_refresh_hz(),
		})
		.collect()
}

fn default_x11_display() -> String {
	":0".to_string()
}

fn default_refresh_hz() -> u32 {
	60
}

fn default_start_timeout_ms() -> u64 {
	15_000
}

fn default_stop_timeout_ms() -> u64 {
	5_000
}

fn default_force_grace_ms() -> u64 {
	2_000
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	const MINIMAL: &str = r#"{
		"displays": [
			{ "id": 0, "framebuffer": "/dev/fb0", "width": 1280, "height": 720 },
			{ "id": 1, "framebuffer": "/dev/fb1", "xOffset": 1280, "width": 1280, "height": 720 }
		]
	}"#;

	#[test]
	fn minimal_file_fills_defaults() {
		let config: Config = serde_json::from_str(MINIMAL).unwrap();
		config.validate().unwrap();

		let second = config.display(DisplayId(1)).unwrap();
		assert_eq!(second.x_offset, 1280);
		assert_eq!(second.x11_display, ":0");
		assert_eq!(second.refresh_hz, 60);
		assert_eq!(config.modes.recognition.fps, 30);
		assert_eq!(config.modes.slideshow.transitions, vec![TransitionStyle::Fade]);
		assert_eq!(config.modes.kiosk.grace_ms, 3000);
		assert!(Mode::ALL.iter().all(|mode| config.mode_enabled(*mode)));
	}

	#[test]
	fn mode_sections_use_camel_case_keys() {
		let json = r#"{
			"modes": {
				"kiosk": { "allowedDomains": ["example.com"], "homeUrl": "https://example.com/board" },
				"slideshow": { "imageDurationMs": 250, "fadeSteps": 4, "transitions": ["wipe", "cut"] },
				"video": { "enabled": false }
			}
		}"#;
		let config: Config = serde_json::from_str(json).unwrap();
		config.validate().unwrap();

		assert_eq!(config.modes.kiosk.allowed_domains, vec!["example.com"]);
		assert_eq!(config.modes.slideshow.image_duration_ms, 250);
		assert_eq!(config.modes.slideshow.transitions, vec![TransitionStyle::Wipe, TransitionStyle::Cut]);
		assert!(!config.mode_enabled(Mode::Video));
		assert!(config.mode_enabled(Mode::Kiosk));
	}

	#[test]
	fn display_set_must_be_exactly_zero_and_one() {
		let mut config = Config::default();
		config.displays[1].id = DisplayId(2);
		assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

		let mut config = Config::default();
		config.displays.pop();
		assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
	}

	#[test]
	fn rejects_zero_fade_steps_and_bad_colors() {
		let mut config = Config::default();
		config.modes.slideshow.fade_steps = 0;
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.modes.recognition.color = "white".into();
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.modes.slideshow.transitions.clear();
		assert!(config.validate().is_err());
	}

	#[test]
	fn load_reports_parse_errors_with_path() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("config.json");
		std::fs::write(&path, "{ not json").unwrap();

		let err = Config::load(&path).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
		assert!(err.to_string().contains("config.json"));
	}

	#[test]
	fn missing_file_falls_back_to_defaults() {
		let temp = TempDir::new().unwrap();
		let config = Config::load_or_default(&temp.path().join("absent.json")).unwrap();
		assert_eq!(config.displays.len(), DISPLAY_COUNT);
		assert_eq!(config.stop_timeout(), Duration::from_secs(5));
	}
}
