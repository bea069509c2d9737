use std::path::PathBuf;

use signage_protocol::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid arguments: {0}")]
	InvalidArguments(String),

	#[error("daemon error {code}: {message}")]
	Daemon { code: ErrorCode, message: String },

	#[error("daemon is not running (no listener on {})", .0.display())]
	DaemonNotRunning(PathBuf),

	#[error("daemon already listening on {}", .0.display())]
	AlreadyRunning(PathBuf),

	#[error("unexpected daemon response: {0}")]
	UnexpectedResponse(String),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),

	#[error(transparent)]
	Config(#[from] signage::ConfigError),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
