//! Control daemon: exposes an [`Orchestrator`] on a Unix socket.
//!
//! Each connection carries newline-delimited JSON, one [`ControlRequest`]
//! per line answered by one [`ControlResponse`] line. Connections are served
//! concurrently; per-display ordering is the orchestrator's job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use signage::Orchestrator;
use signage_protocol::{ControlRequest, ControlResponse, ErrorCode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

pub struct Daemon {
	orchestrator: Arc<Orchestrator>,
	listener: UnixListener,
	socket: PathBuf,
	shutdown: Arc<Notify>,
}

impl Daemon {
	/// Binds `socket`, replacing a stale socket file left by a dead daemon.
	///
	/// # Errors
	///
	/// [`CliError::AlreadyRunning`] when another daemon answers on `socket`.
	pub async fn bind(orchestrator: Arc<Orchestrator>, socket: &Path) -> Result<Self> {
		if tokio::fs::try_exists(socket).await.unwrap_or(false) {
			match UnixStream::connect(socket).await {
				Ok(_) => return Err(CliError::AlreadyRunning(socket.to_path_buf())),
				Err(_) => {
					debug!(target = "signage.daemon", socket = %socket.display(), "removing stale socket");
					tokio::fs::remove_file(socket).await?;
				}
			}
		}
		if let Some(parent) = socket.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		let listener = UnixListener::bind(socket)?;
		info!(target = "signage.daemon", socket = %socket.display(), "listening");
		Ok(Self {
			orchestrator,
			listener,
			socket: socket.to_path_buf(),
			shutdown: Arc::new(Notify::new()),
		})
	}

	/// Handle that makes [`Daemon::run`] return as if `Shutdown` had been received.
	pub fn shutdown_handle(&self) -> Arc<Notify> {
		Arc::clone(&self.shutdown)
	}

	/// Serves until a `Shutdown` request or Ctrl-C, then stops every display.
	pub async fn run(self) -> Result<()> {
		loop {
			tokio::select! {
				accepted = self.listener.accept() => match accepted {
					Ok((stream, _)) => {
						let orchestrator = Arc::clone(&self.orchestrator);
						let shutdown = Arc::clone(&self.shutdown);
						tokio::spawn(async move {
							if let Err(err) = serve_connection(stream, &orchestrator, &shutdown).await {
								debug!(target = "signage.daemon", error = %err, "connection closed with error");
							}
						});
					}
					Err(err) => warn!(target = "signage.daemon", error = %err, "accept failed"),
				},
				_ = self.shutdown.notified() => {
					info!(target = "signage.daemon", "shutdown requested");
					break;
				}
				_ = tokio::signal::ctrl_c() => {
					info!(target = "signage.daemon", "interrupted");
					break;
				}
			}
		}

		for err in self.orchestrator.stop_all().await {
			warn!(target = "signage.daemon", error = %err, "display did not stop cleanly");
		}
		if let Err(err) = tokio::fs::remove_file(&self.socket).await {
			debug!(target = "signage.daemon", error = %err, "socket already gone");
		}
		Ok(())
	}
}

async fn serve_connection(stream: UnixStream, orchestrator: &Orchestrator, shutdown: &Notify) -> Result<()> {
	let (read, mut write) = stream.into_split();
	let mut lines = BufReader::new(read).lines();

	while let Some(line) = lines.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}
		let (response, stop_daemon) = match serde_json::from_str::<ControlRequest>(&line) {
			Ok(ControlRequest::Shutdown) => (ControlResponse::Ok, true),
			Ok(request) => (handle_request(orchestrator, request).await, false),
			Err(err) => (
				ControlResponse::Error {
					code: ErrorCode::InvalidRequest,
					message: err.to_string(),
				},
				false,
			),
		};

		let mut payload = serde_json::to_string(&response)?;
		payload.push('\n');
		write.write_all(payload.as_bytes()).await?;
		write.flush().await?;

		if stop_daemon {
			shutdown.notify_one();
			break;
		}
	}
	Ok(())
}

/// Maps one request onto the orchestrator. `Shutdown` only acknowledges;
/// stopping the listener is the connection loop's job.
pub async fn handle_request(orchestrator: &Orchestrator, request: ControlRequest) -> ControlResponse {
	debug!(target = "signage.daemon", ?request, "request");
	let result = match request {
		ControlRequest::Ping => return ControlResponse::Pong,
		ControlRequest::Shutdown => return ControlResponse::Ok,
		ControlRequest::StatusAll => {
			return ControlResponse::Statuses {
				list: orchestrator.status_all(),
			};
		}
		ControlRequest::Start { display, params } => orchestrator.start(display, params).await.map(|_| ControlResponse::Ok),
		ControlRequest::Stop { display } => orchestrator.stop(display).await.map(|_| ControlResponse::Ok),
		ControlRequest::Status { display } => orchestrator.status(display).map(|snapshot| ControlResponse::Status { snapshot }),
	};

	result.unwrap_or_else(|err| ControlResponse::Error {
		code: err.code(),
		message: err.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use signage::{Config, HeadlessProvider};
	use signage_protocol::{DisplayId, Mode, ModeParams, SessionStatus};

	use super::*;
	use crate::client::send_request;

	fn headless_orchestrator() -> Arc<Orchestrator> {
		let mut config = Config::default();
		config.modes.recognition.title = None;
		for display in &mut config.displays {
			display.width = 32;
			display.height = 24;
		}
		Arc::new(Orchestrator::with_surfaces(config, Arc::new(HeadlessProvider::new())))
	}

	#[tokio::test]
	async fn out_of_range_display_maps_to_invalid_display() {
		let orchestrator = headless_orchestrator();
		let response = handle_request(
			&orchestrator,
			ControlRequest::Start {
				display: DisplayId(2),
				params: ModeParams::defaults_for(Mode::Recognition),
			},
		)
		.await;
		assert!(matches!(response, ControlResponse::Error { code: ErrorCode::InvalidDisplay, .. }));

		let response = handle_request(&orchestrator, ControlRequest::Status { display: DisplayId(5) }).await;
		assert!(matches!(response, ControlResponse::Error { code: ErrorCode::UnknownDisplay, .. }));
	}

	#[tokio::test]
	async fn start_status_stop_round_trip() {
		let orchestrator = headless_orchestrator();
		let start = ControlRequest::Start {
			display: DisplayId(1),
			params: ModeParams::defaults_for(Mode::Recognition),
		};
		assert_eq!(handle_request(&orchestrator, start).await, ControlResponse::Ok);

		let ControlResponse::Status { snapshot } = handle_request(&orchestrator, ControlRequest::Status { display: DisplayId(1) }).await else {
			panic!("expected status");
		};
		assert!(snapshot.running);
		assert_eq!(snapshot.mode, Some(Mode::Recognition));

		assert_eq!(
			handle_request(&orchestrator, ControlRequest::Stop { display: DisplayId(1) }).await,
			ControlResponse::Ok
		);
		let ControlResponse::Statuses { list } = handle_request(&orchestrator, ControlRequest::StatusAll).await else {
			panic!("expected statuses");
		};
		assert_eq!(list.len(), 2);
		assert_eq!(list[0].status, SessionStatus::Idle);
		assert_eq!(list[1].status, SessionStatus::Stopped);
	}

	#[tokio::test]
	async fn socket_serves_until_shutdown() {
		let dir = tempfile::tempdir().unwrap();
		let socket = dir.path().join("run").join("signage.sock");
		let daemon = Daemon::bind(headless_orchestrator(), &socket).await.unwrap();
		let server = tokio::spawn(daemon.run());

		assert_eq!(send_request(&socket, &ControlRequest::Ping).await.unwrap(), Some(ControlResponse::Pong));
		assert!(matches!(
			Daemon::bind(headless_orchestrator(), &socket).await,
			Err(CliError::AlreadyRunning(_))
		));

		assert_eq!(send_request(&socket, &ControlRequest::Shutdown).await.unwrap(), Some(ControlResponse::Ok));
		server.await.unwrap().unwrap();
		assert!(!socket.exists());
		assert_eq!(send_request(&socket, &ControlRequest::Ping).await.unwrap(), None);
	}

	#[tokio::test]
	async fn malformed_lines_get_invalid_request() {
		let dir = tempfile::tempdir().unwrap();
		let socket = dir.path().join("signage.sock");
		let daemon = Daemon::bind(headless_orchestrator(), &socket).await.unwrap();
		let shutdown = daemon.shutdown_handle();
		let server = tokio::spawn(daemon.run());

		let mut stream = UnixStream::connect(&socket).await.unwrap();
		stream.write_all(b"{\"type\":\"launch\"}\n").await.unwrap();
		let mut reader = BufReader::new(stream);
		let mut line = String::new();
		reader.read_line(&mut line).await.unwrap();
		let response: ControlResponse = serde_json::from_str(&line).unwrap();
		assert!(matches!(response, ControlResponse::Error { code: ErrorCode::InvalidRequest, .. }));

		shutdown.notify_one();
		server.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn stale_socket_file_is_replaced() {
		let dir = tempfile::tempdir().unwrap();
		let socket = dir.path().join("signage.sock");
		drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
		assert!(socket.exists());

		let daemon = Daemon::bind(headless_orchestrator(), &socket).await.unwrap();
		let shutdown = daemon.shutdown_handle();
		let server = tokio::spawn(daemon.run());
		assert_eq!(send_request(&socket, &ControlRequest::Ping).await.unwrap(), Some(ControlResponse::Pong));
		shutdown.notify_one();
		server.await.unwrap().unwrap();
	}
}
