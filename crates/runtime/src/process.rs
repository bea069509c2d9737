//! Process liveness, signalling and two-phase termination.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

#[cfg(unix)]
use nix::sys::signal::{Signal as NixSignal, kill, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::debug;

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if std::path::Path::new("/proc").join(pid.to_string()).exists() {
			return true;
		}

		match to_pid(pid) {
			Ok(pid) => kill(pid, None).is_ok(),
			Err(_) => false,
		}
	}

	#[cfg(not(unix))]
	{
		pid == std::process::id()
	}
}

/// Signals the teardown path sends to renderer processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
	/// Polite request to exit (`SIGTERM`).
	Terminate,
	/// Unconditional kill (`SIGKILL`).
	Kill,
}

#[cfg(unix)]
impl From<Signal> for NixSignal {
	fn from(signal: Signal) -> Self {
		match signal {
			Signal::Terminate => NixSignal::SIGTERM,
			Signal::Kill => NixSignal::SIGKILL,
		}
	}
}

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<Pid> {
	i32::try_from(pid)
		.map(Pid::from_raw)
		.map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))
}

/// Sends `signal` to the process group led by `pid`, falling back to `pid` alone.
///
/// Browsers and players fork helpers; signalling the group reaches all of them
/// as long as the child was spawned through [`prepare_command`].
pub fn signal_group(pid: u32, signal: Signal) -> io::Result<()> {
	#[cfg(unix)]
	{
		if pid == 0 {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "refusing to signal pid 0"));
		}
		let pid = to_pid(pid)?;
		if killpg(pid, NixSignal::from(signal)).is_ok() {
			return Ok(());
		}

		// Not a group leader; signal the process itself.
		kill(pid, NixSignal::from(signal)).map_err(io::Error::from)
	}

	#[cfg(not(unix))]
	{
		let _ = (pid, signal);
		Err(io::Error::new(io::ErrorKind::Unsupported, "process signalling requires unix"))
	}
}

/// Applies the spawn settings every renderer child shares.
///
/// The child gets its own process group, detached stdio, and is killed if
/// its handle is dropped without an explicit teardown.
pub fn prepare_command(cmd: &mut Command) -> &mut Command {
	cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);

	#[cfg(unix)]
	cmd.process_group(0);

	cmd
}

/// How a child process ended during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
	/// The process had already exited before teardown began.
	AlreadyExited(ExitStatus),
	/// The process exited within the grace period after `SIGTERM`.
	Graceful(ExitStatus),
	/// The grace period elapsed and the process group was killed.
	Forced(ExitStatus),
}

impl Termination {
	/// Returns `true` when teardown had to escalate to `SIGKILL`.
	pub fn was_forced(&self) -> bool {
		matches!(self, Termination::Forced(_))
	}

	pub fn status(&self) -> ExitStatus {
		match self {
			Termination::AlreadyExited(status) | Termination::Graceful(status) | Termination::Forced(status) => *status,
		}
	}
}

/// Terminates `child` in two phases: `SIGTERM`, then `SIGKILL` once `grace` elapses.
///
/// # Errors
///
/// Returns an error when the child's status cannot be collected.
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<Termination> {
	if let Some(status) = child.try_wait()? {
		return Ok(Termination::AlreadyExited(status));
	}

	let pid = child.id();
	if let Some(pid) = pid {
		if let Err(err) = signal_group(pid, Signal::Terminate) {
			debug!(target = "signage.process", pid, error = %err, "SIGTERM failed");
		}
	}

	if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
		return Ok(Termination::Graceful(status?));
	}

	debug!(
		target = "signage.process",
		pid = ?pid,
		grace_ms = grace.as_millis() as u64,
		"grace period elapsed; killing process group"
	);
	if let Some(pid) = pid {
		let _ = signal_group(pid, Signal::Kill);
	}
	if let Err(err) = child.start_kill() {
		debug!(target = "signage.process", pid = ?pid, error = %err, "start_kill after group kill failed");
	}
	let status = child.wait().await?;
	Ok(Termination::Forced(status))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn shell(script: &str) -> Child {
		let mut cmd = Command::new("sh");
		cmd.arg("-c").arg(script);
		prepare_command(&mut cmd).spawn().unwrap()
	}

	#[cfg(unix)]
	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[cfg(unix)]
	#[test]
	fn signalling_pid_zero_is_rejected() {
		let err = signal_group(0, Signal::Terminate).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn group_signal_reaches_the_child() {
		let mut child = shell("exec sleep 30");
		let pid = child.id().unwrap();
		assert!(pid_is_alive(pid));

		signal_group(pid, Signal::Kill).unwrap();
		let status = child.wait().await.unwrap();
		assert!(!status.success());
		assert!(!pid_is_alive(pid));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn cooperative_child_exits_gracefully() {
		let mut child = shell("exec sleep 30");
		let outcome = terminate_child(&mut child, Duration::from_secs(5)).await.unwrap();
		assert!(matches!(outcome, Termination::Graceful(_)), "outcome was {outcome:?}");
		assert!(!outcome.was_forced());
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn child_ignoring_sigterm_is_killed_after_grace() {
		let mut child = shell("trap '' TERM; sleep 30");
		tokio::time::sleep(Duration::from_millis(100)).await;

		let started = std::time::Instant::now();
		let outcome = terminate_child(&mut child, Duration::from_millis(300)).await.unwrap();
		assert!(outcome.was_forced(), "outcome was {outcome:?}");
		assert!(started.elapsed() < Duration::from_secs(5));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn exited_child_is_reported_without_signalling() {
		let mut child = shell("exit 3");
		tokio::time::sleep(Duration::from_millis(200)).await;

		let outcome = terminate_child(&mut child, Duration::from_secs(1)).await.unwrap();
		assert!(matches!(outcome, Termination::AlreadyExited(_)), "outcome was {outcome:?}");
		assert_eq!(outcome.status().code(), Some(3));
	}
}
