//! Error taxonomy for configuration, renderers and the orchestrator.

use std::path::PathBuf;

use signage_protocol::{DisplayId, ErrorCode, Mode};

/// Result alias for orchestrator-level operations.
pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

/// Failures while loading or validating static configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid config: {0}")]
	Invalid(String),
}

impl ConfigError {
	pub(crate) fn invalid(msg: impl Into<String>) -> Self {
		Self::Invalid(msg.into())
	}
}

/// Failures raised by a renderer while starting or running.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
	#[error("cannot acquire display {display}: {reason}")]
	DisplayAcquireFailed { display: DisplayId, reason: String },

	#[error("display {0} output is held by another renderer")]
	DisplayBusy(DisplayId),

	#[error("playlist is empty: {0}")]
	EmptyPlaylist(String),

	#[error("url not allowed by kiosk allow-list: {0}")]
	UrlNotAllowed(String),

	#[error("invalid url {url:?}: {reason}")]
	InvalidUrl { url: String, reason: String },

	#[error("no usable {what} executable found")]
	ExecutableNotFound { what: &'static str },

	#[error("failed to launch {program}: {source}")]
	Launch {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{what} exited unexpectedly ({status})")]
	BackendExited { what: &'static str, status: String },

	#[error("image {path}: {source}")]
	Image {
		path: PathBuf,
		#[source]
		source: image::ImageError,
	},

	#[error("text rendering failed: {0}")]
	Text(String),

	#[error("renderer exited before reaching its running state")]
	ExitedBeforeRunning,

	#[error("renderer did not reach its running state within {0} ms")]
	StartTimeout(u64),

	#[error("renderer task failed: {0}")]
	Task(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Failures surfaced by the orchestrator's command surface.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
	#[error("invalid display {0}")]
	InvalidDisplay(DisplayId),

	#[error("unknown display {0}")]
	UnknownDisplay(DisplayId),

	#[error("mode {0} is disabled in configuration")]
	ModeDisabled(Mode),

	#[error("{mode} renderer failed to start on display {display}: {source}")]
	RendererStartFailed {
		display: DisplayId,
		mode: Mode,
		#[source]
		source: RenderError,
	},

	#[error("renderer on display {display} did not stop within the grace period (force-terminated: {forced})")]
	StopTimeout { display: DisplayId, forced: bool },
}

impl OrchestratorError {
	/// Stable machine-readable code for the control protocol.
	pub fn code(&self) -> ErrorCode {
		match self {
			OrchestratorError::InvalidDisplay(_) => ErrorCode::InvalidDisplay,
			OrchestratorError::UnknownDisplay(_) => ErrorCode::UnknownDisplay,
			OrchestratorError::ModeDisabled(_) => ErrorCode::ModeDisabled,
			OrchestratorError::RendererStartFailed { .. } => ErrorCode::RendererStartFailed,
			OrchestratorError::StopTimeout { .. } => ErrorCode::StopTimeout,
		}
	}

	/// Returns the renderer cause when a start failed.
	pub fn render_cause(&self) -> Option<&RenderError> {
		match self {
			OrchestratorError::RendererStartFailed { source, .. } => Some(source),
			_ => None,
		}
	}
}
