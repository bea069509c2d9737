//! External media player: command construction and its JSON IPC socket.
//!
//! The player is `mpv`-compatible. The looping video renderer talks to it over
//! `--input-ipc-server`; the slideshow only spawns it once per item.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use signage_runtime::prepare_command;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::Command;

use crate::display::Display;

const IPC_TIMEOUT: Duration = Duration::from_millis(400);

/// Builds player invocations for one display.
#[derive(Debug, Clone)]
pub struct PlayerCommand<'a> {
	program: &'a Path,
	display: &'a Display,
	hwdec: &'a str,
	extra_args: &'a [String],
}

impl<'a> PlayerCommand<'a> {
	pub fn new(program: &'a Path, display: &'a Display, hwdec: &'a str, extra_args: &'a [String]) -> Self {
		Self {
			program,
			display,
			hwdec,
			extra_args,
		}
	}

	/// Arguments shared by every invocation, excluding media files.
	pub fn base_args(&self) -> Vec<String> {
		let id = self.display.id();
		let mut args = vec![
			"--fs".to_string(),
			"--no-terminal".to_string(),
			"--really-quiet".to_string(),
			"--no-osc".to_string(),
			"--osd-level=0".to_string(),
			"--no-input-default-bindings".to_string(),
			format!("--hwdec={}", self.hwdec),
			format!("--screen={id}"),
			format!("--fs-screen={id}"),
		];
		args.extend(self.extra_args.iter().cloned());
		args
	}

	/// Loops `files` forever and listens for IPC on `ipc_socket`.
	pub fn looping(&self, ipc_socket: &Path, files: &[PathBuf]) -> Command {
		let mut args = self.base_args();
		args.push("--loop-playlist=inf".to_string());
		args.push("--idle=no".to_string());
		args.push(format!("--input-ipc-server={}", ipc_socket.display()));
		args.push("--".to_string());
		args.extend(files.iter().map(|f| f.display().to_string()));
		self.command(args)
	}

	/// Plays `file` once and exits.
	pub fn single(&self, file: &Path) -> Command {
		let mut args = self.base_args();
		args.push("--".to_string());
		args.push(file.display().to_string());
		self.command(args)
	}

	fn command(&self, args: Vec<String>) -> Command {
		let mut cmd = Command::new(self.program);
		prepare_command(&mut cmd);
		cmd.args(args).envs(self.display.environment());
		cmd
	}
}

/// Socket path for the player driving `display`, unique per orchestrator process.
pub fn ipc_socket_path(display: &Display) -> PathBuf {
	std::env::temp_dir().join(format!("signage-player-{}-{}.sock", std::process::id(), display.id()))
}

/// Playback position reported by the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playback {
	pub path: Option<String>,
	pub position_secs: Option<f64>,
	pub duration_secs: Option<f64>,
}

/// Client for the player's line-delimited JSON IPC.
#[derive(Debug, Clone)]
pub struct PlayerIpc {
	socket: PathBuf,
}

impl PlayerIpc {
	pub fn new(socket: impl Into<PathBuf>) -> Self {
		Self { socket: socket.into() }
	}

	pub fn socket(&self) -> &Path {
		&self.socket
	}

	/// Returns `true` once the player accepts connections.
	pub async fn is_ready(&self) -> bool {
		UnixStream::connect(&self.socket).await.is_ok()
	}

	/// Sends `commands` over one connection; each reply is `data` on success.
	pub async fn request(&self, commands: &[Value]) -> io::Result<Vec<Option<Value>>> {
		tokio::time::timeout(IPC_TIMEOUT, self.request_inner(commands))
			.await
			.map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "player IPC timed out"))?
	}

	async fn request_inner(&self, commands: &[Value]) -> io::Result<Vec<Option<Value>>> {
		let stream = UnixStream::connect(&self.socket).await?;
		let (reader, mut writer) = stream.into_split();

		let mut payload = String::new();
		for (i, command) in commands.iter().enumerate() {
			let line = json!({ "command": command, "request_id": i + 1 });
			payload.push_str(&line.to_string());
			payload.push('\n');
		}
		writer.write_all(payload.as_bytes()).await?;
		writer.flush().await?;

		let mut replies: Vec<Option<Value>> = vec![None; commands.len()];
		let mut pending = commands.len();
		let mut lines = BufReader::new(reader).lines();
		while pending > 0 {
			let Some(line) = lines.next_line().await? else {
				break;
			};
			let Some((id, data)) = parse_reply(&line) else {
				continue;
			};
			if let Some(slot) = id.checked_sub(1).and_then(|i| replies.get_mut(i)) {
				*slot = data;
				pending -= 1;
			}
		}
		Ok(replies)
	}

	pub async fn playback(&self) -> io::Result<Playback> {
		let replies = self
			.request(&[
				json!(["get_property", "path"]),
				json!(["get_property", "time-pos"]),
				json!(["get_property", "duration"]),
			])
			.await?;
		let mut replies = replies.into_iter();
		let mut next = || replies.next().flatten();
		Ok(Playback {
			path: next().and_then(|v| v.as_str().map(String::from)),
			position_secs: next().and_then(|v| v.as_f64()),
			duration_secs: next().and_then(|v| v.as_f64()),
		})
	}

	pub async fn quit(&self) -> io::Result<()> {
		let stream = UnixStream::connect(&self.socket).await?;
		let (_, mut writer) = stream.into_split();
		let line = format!("{}\n", json!({ "command": ["quit"] }));
		tokio::time::timeout(IPC_TIMEOUT, writer.write_all(line.as_bytes()))
			.await
			.map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "player IPC timed out"))?
	}
}

/// Extracts `(request_id, data)` from a reply line. Events and other lines yield `None`.
fn parse_reply(line: &str) -> Option<(usize, Option<Value>)> {
	let value: Value = serde_json::from_str(line).ok()?;
	let id = usize::try_from(value.get("request_id")?.as_u64()?).ok()?;
	let ok = value.get("error").and_then(Value::as_str) == Some("success");
	let data = value.get("data").filter(|_| ok).filter(|d| !d.is_null()).cloned();
	Some((id, data))
}
