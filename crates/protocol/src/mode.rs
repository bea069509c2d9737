//! Display identifiers, rendering modes and per-mode start parameters.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordinal identifier of one physical display output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(pub u8);

impl DisplayId {
	/// Returns the ordinal as a `usize`, convenient for offsets and indexing.
	pub fn index(self) -> usize {
		usize::from(self.0)
	}
}

impl fmt::Display for DisplayId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for DisplayId {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse::<u8>().map(DisplayId).map_err(|_| format!("invalid display id: {s}"))
	}
}

impl From<u8> for DisplayId {
	fn from(value: u8) -> Self {
		DisplayId(value)
	}
}

/// Mutually exclusive rendering modes a display can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
	/// Scrolling text overlay.
	Recognition,
	/// Looping hardware-accelerated video playlist.
	Video,
	/// Full-screen browser pinned to one URL.
	Kiosk,
	/// Mixed image/video playlist with transitions.
	Slideshow,
}

impl Mode {
	/// Every mode, in declaration order.
	pub const ALL: [Mode; 4] = [Mode::Recognition, Mode::Video, Mode::Kiosk, Mode::Slideshow];

	/// Returns the lowercase name used on the wire and in configuration.
	pub fn as_str(self) -> &'static str {
		match self {
			Mode::Recognition => "recognition",
			Mode::Video => "video",
			Mode::Kiosk => "kiosk",
			Mode::Slideshow => "slideshow",
		}
	}
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Mode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"recognition" => Ok(Mode::Recognition),
			"video" => Ok(Mode::Video),
			"kiosk" => Ok(Mode::Kiosk),
			"slideshow" => Ok(Mode::Slideshow),
			_ => Err(format!("unknown mode: {s}")),
		}
	}
}

/// Start parameters, tagged by the mode they belong to.
///
/// Every field is optional; an absent value falls back to the mode's
/// configured default (names file, media directory, home URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeParams {
	Recognition {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		lines: Option<Vec<String>>,
	},
	Video {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		playlist: Option<Vec<PathBuf>>,
	},
	Kiosk {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		url: Option<String>,
	},
	Slideshow {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		playlist: Option<Vec<PathBuf>>,
	},
}

impl ModeParams {
	/// Parameters that defer entirely to configuration for `mode`.
	pub fn defaults_for(mode: Mode) -> Self {
		match mode {
			Mode::Recognition => ModeParams::Recognition { lines: None },
			Mode::Video => ModeParams::Video { playlist: None },
			Mode::Kiosk => ModeParams::Kiosk { url: None },
			Mode::Slideshow => ModeParams::Slideshow { playlist: None },
		}
	}

	/// Returns the mode these parameters start.
	pub fn mode(&self) -> Mode {
		match self {
			ModeParams::Recognition { .. } => Mode::Recognition,
			ModeParams::Video { .. } => Mode::Video,
			ModeParams::Kiosk { .. } => Mode::Kiosk,
			ModeParams::Slideshow { .. } => Mode::Slideshow,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mode_parses_case_insensitively() {
		assert_eq!("Slideshow".parse::<Mode>(), Ok(Mode::Slideshow));
		assert_eq!(" kiosk ".parse::<Mode>(), Ok(Mode::Kiosk));
		assert!("karaoke".parse::<Mode>().is_err());
	}

	#[test]
	fn params_are_tagged_by_mode() {
		let params: ModeParams = serde_json::from_str(r#"{"mode":"kiosk","url":"https://example.com"}"#).unwrap();
		assert_eq!(params.mode(), Mode::Kiosk);
		assert_eq!(
			params,
			ModeParams::Kiosk {
				url: Some("https://example.com".to_string())
			}
		);

		let bare: ModeParams = serde_json::from_str(r#"{"mode":"video"}"#).unwrap();
		assert_eq!(bare, ModeParams::defaults_for(Mode::Video));
	}

	#[test]
	fn display_id_rejects_garbage() {
		assert_eq!("1".parse::<DisplayId>(), Ok(DisplayId(1)));
		assert!("-1".parse::<DisplayId>().is_err());
		assert!("hdmi".parse::<DisplayId>().is_err());
	}
}
