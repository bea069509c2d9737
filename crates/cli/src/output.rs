use clap::ValueEnum;
use serde::Serialize;
use signage_protocol::{RenderState, StatusSnapshot};

/// Output format for client commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON (default)
	#[default]
	Json,
	/// Human-readable text
	Text,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

/// Prints `value` as JSON, or `text` when the text format is selected.
pub fn print_value<T: Serialize>(value: &T, text: impl FnOnce() -> String, format: OutputFormat) {
	match format {
		OutputFormat::Json => match serde_json::to_string_pretty(value) {
			Ok(json) => println!("{json}"),
			Err(err) => eprintln!("failed to serialize output: {err}"),
		},
		OutputFormat::Text => println!("{}", text()),
	}
}

pub fn print_statuses(list: &[StatusSnapshot], format: OutputFormat) {
	print_value(
		&list,
		|| list.iter().map(status_line).collect::<Vec<_>>().join("\n"),
		format,
	);
}

/// One-line summary of a display's status.
pub fn status_line(snapshot: &StatusSnapshot) -> String {
	let mut line = format!("display {}: {:?}", snapshot.display, snapshot.status).to_lowercase();
	if let Some(mode) = snapshot.mode {
		line.push_str(&format!(" [{mode}]"));
	}
	if let Some(detail) = snapshot.render.as_ref().and_then(render_detail) {
		line.push_str(&format!(" {detail}"));
	}
	if let Some(err) = &snapshot.last_error {
		line.push_str(&format!(" (last error: {err})"));
	}
	line
}

fn render_detail(state: &RenderState) -> Option<String> {
	match state {
		RenderState::Recognition(r) => Some(format!("offset={} wraps={}", r.offset, r.wraps)),
		RenderState::Video(v) => v.current_file.as_ref().map(|file| match (v.position_secs, v.duration_secs) {
			(Some(pos), Some(total)) => format!("{file} {pos:.0}/{total:.0}s"),
			_ => file.clone(),
		}),
		RenderState::Kiosk(k) => k.url.clone(),
		RenderState::Slideshow(s) => s
			.current
			.as_ref()
			.map(|current| format!("{}/{} {current}", s.index + 1, s.item_count)),
	}
}
