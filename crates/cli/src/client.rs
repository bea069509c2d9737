//! Client side of the control socket.

use std::path::{Path, PathBuf};

use signage_protocol::{ControlRequest, ControlResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::error::{CliError, Result};

const SOCKET_NAME: &str = "signage.sock";

/// `$XDG_RUNTIME_DIR/signage.sock`, falling back to the temp directory.
pub fn default_socket_path() -> PathBuf {
	dirs::runtime_dir().unwrap_or_else(std::env::temp_dir).join(SOCKET_NAME)
}

/// Sends one request and reads one response.
///
/// Returns `Ok(None)` when no daemon is listening on `socket`.
pub async fn send_request(socket: &Path, request: &ControlRequest) -> Result<Option<ControlResponse>> {
	let stream = match UnixStream::connect(socket).await {
		Ok(stream) => stream,
		Err(err) if is_not_running(&err) => return Ok(None),
		Err(err) => return Err(CliError::Io(err)),
	};
	exchange(stream, request).await.map(Some)
}

/// Like [`send_request`], but a missing daemon is an error.
pub async fn request(socket: &Path, request: &ControlRequest) -> Result<ControlResponse> {
	match send_request(socket, request).await? {
		Some(ControlResponse::Error { code, message }) => Err(CliError::Daemon { code, message }),
		Some(response) => Ok(response),
		None => Err(CliError::DaemonNotRunning(socket.to_path_buf())),
	}
}

pub(crate) fn is_not_running(err: &std::io::Error) -> bool {
	matches!(
		err.kind(),
		std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
	)
}

async fn exchange<S>(mut stream: S, request: &ControlRequest) -> Result<ControlResponse>
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
	let mut payload = serde_json::to_string(request)?;
	payload.push('\n');
	stream.write_all(payload.as_bytes()).await?;
	stream.flush().await?;

	let mut reader = BufReader::new(stream);
	let mut line = String::new();
	if reader.read_line(&mut line).await? == 0 {
		return Err(CliError::UnexpectedResponse("daemon closed the connection".into()));
	}
	Ok(serde_json::from_str(&line)?)
}
