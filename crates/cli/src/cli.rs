use std::path::PathBuf;

use clap::{Parser, Subcommand};
use signage_protocol::{DisplayId, Mode, ModeParams};

use crate::error::{CliError, Result};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "signage")]
#[command(about = "Signage display orchestrator: run the daemon or control it")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Control socket path (defaults to $XDG_RUNTIME_DIR/signage.sock)
	#[arg(long, global = true, value_name = "PATH")]
	pub socket: Option<PathBuf>,

	/// Output format for client commands
	#[arg(short, long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the control daemon in the foreground
	Serve {
		/// Configuration file (defaults to $XDG_CONFIG_HOME/signage/config.json)
		#[arg(short, long, value_name = "FILE")]
		config: Option<PathBuf>,
		/// Render into memory instead of framebuffer devices
		#[arg(long)]
		headless: bool,
	},

	/// Start a mode on a display, replacing whatever runs there
	Start {
		display: DisplayId,
		mode: Mode,
		/// Recognition text line (repeatable)
		#[arg(long = "line", value_name = "TEXT")]
		lines: Vec<String>,
		/// Video or slideshow playlist entry (repeatable)
		#[arg(long = "item", value_name = "FILE")]
		playlist: Vec<PathBuf>,
		/// Kiosk URL
		#[arg(long)]
		url: Option<String>,
	},

	/// Stop whatever runs on a display
	Stop { display: DisplayId },

	/// Show the status of one display, or all of them
	Status { display: Option<DisplayId> },

	/// Check whether the daemon is reachable
	Ping,

	/// Stop every display and shut the daemon down
	Shutdown,
}

/// Builds start parameters, rejecting options that belong to another mode.
pub fn mode_params(mode: Mode, lines: Vec<String>, playlist: Vec<PathBuf>, url: Option<String>) -> Result<ModeParams> {
	let stray = match mode {
		Mode::Recognition => (!playlist.is_empty()).then_some("--item").or(url.as_ref().map(|_| "--url")),
		Mode::Video | Mode::Slideshow => (!lines.is_empty()).then_some("--line").or(url.as_ref().map(|_| "--url")),
		Mode::Kiosk => (!lines.is_empty()).then_some("--line").or((!playlist.is_empty()).then_some("--item")),
	};
	if let Some(flag) = stray {
		return Err(CliError::InvalidArguments(format!("{flag} does not apply to {mode} mode")));
	}

	let non_empty_lines = (!lines.is_empty()).then_some(lines);
	let non_empty_playlist = (!playlist.is_empty()).then_some(playlist);
	Ok(match mode {
		Mode::Recognition => ModeParams::Recognition { lines: non_empty_lines },
		Mode::Video => ModeParams::Video {
			playlist: non_empty_playlist,
		},
		Mode::Kiosk => ModeParams::Kiosk { url },
		Mode::Slideshow => ModeParams::Slideshow {
			playlist: non_empty_playlist,
		},
	})
}
