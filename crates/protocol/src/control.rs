//! Request/response envelopes for the control daemon.
//!
//! Messages are newline-delimited JSON, one request and one response per line.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mode::{DisplayId, ModeParams};
use crate::status::StatusSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
	Ping,
	Start { display: DisplayId, params: ModeParams },
	Stop { display: DisplayId },
	Status { display: DisplayId },
	StatusAll,
	Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
	Pong,
	Ok,
	Status { snapshot: StatusSnapshot },
	Statuses { list: Vec<StatusSnapshot> },
	Error { code: ErrorCode, message: String },
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidDisplay,
	UnknownDisplay,
	ModeDisabled,
	RendererStartFailed,
	StopTimeout,
	InvalidRequest,
	InternalError,
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ErrorCode::InvalidDisplay => write!(f, "INVALID_DISPLAY"),
			ErrorCode::UnknownDisplay => write!(f, "UNKNOWN_DISPLAY"),
			ErrorCode::ModeDisabled => write!(f, "MODE_DISABLED"),
			ErrorCode::RendererStartFailed => write!(f, "RENDERER_START_FAILED"),
			ErrorCode::StopTimeout => write!(f, "STOP_TIMEOUT"),
			ErrorCode::InvalidRequest => write!(f, "INVALID_REQUEST"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mode::Mode;

	#[test]
	fn start_request_nests_tagged_params() {
		let line = r#"{"type":"start","display":0,"params":{"mode":"slideshow","playlist":["/srv/a.png"]}}"#;
		let request: ControlRequest = serde_json::from_str(line).unwrap();
		let ControlRequest::Start { display, params } = request else {
			panic!("expected start request");
		};
		assert_eq!(display, DisplayId(0));
		assert_eq!(params.mode(), Mode::Slideshow);
	}

	#[test]
	fn error_code_display_matches_wire_name() {
		let json = serde_json::to_value(ErrorCode::RendererStartFailed).unwrap();
		assert_eq!(json, ErrorCode::RendererStartFailed.to_string());
	}
}
