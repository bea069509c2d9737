//! Full-screen browser pinned to one URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use signage_protocol::{KioskPhase, KioskState, Mode, RenderState};
use signage_runtime::executable::BROWSER_CANDIDATES;
use signage_runtime::{Signal, find_executable, prepare_command, signal_group, terminate_child};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use super::{RenderContext, Renderer};
use crate::config::KioskConfig;
use crate::display::Display;
use crate::error::RenderError;
use crate::stop::StopHandle;

const SETTLE_STEP: Duration = Duration::from_millis(100);

/// Reduces an allow-list entry to a bare lowercase host.
///
/// Accepts `example.com`, `*.example.com`, `.example.com` or a full URL.
pub fn normalize_domain(entry: &str) -> Option<String> {
	let entry = entry.trim();
	if entry.is_empty() {
		return None;
	}
	if entry.contains("://") {
		return Url::parse(entry).ok()?.host_str().map(|h| h.trim_end_matches('.').to_ascii_lowercase());
	}
	let host = entry.trim_start_matches("*.").trim_start_matches('.');
	let host = host.split(['/', ':']).next().unwrap_or_default();
	let host = host.trim_end_matches('.').to_ascii_lowercase();
	(!host.is_empty()).then_some(host)
}

/// Exact host or subdomain match against `allowed`. An empty list allows any host.
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
	if allowed.is_empty() {
		return true;
	}
	let host = host.trim_end_matches('.').to_ascii_lowercase();
	allowed.iter().filter_map(|entry| normalize_domain(entry)).any(|domain| {
		host == domain || host.strip_suffix(domain.as_str()).is_some_and(|prefix| prefix.ends_with('.'))
	})
}

/// Parses `raw` and checks it against the allow-list.
///
/// # Errors
///
/// [`RenderError::InvalidUrl`] for unparseable or non-http(s) URLs,
/// [`RenderError::UrlNotAllowed`] when the host is not allowed.
pub fn validate_url(raw: &str, allowed: &[String]) -> Result<Url, RenderError> {
	let invalid = |reason: &str| RenderError::InvalidUrl {
		url: raw.to_string(),
		reason: reason.to_string(),
	};
	let url = Url::parse(raw.trim()).map_err(|err| invalid(&err.to_string()))?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(invalid("only http and https URLs can be shown"));
	}
	let host = url.host_str().ok_or_else(|| invalid("URL has no host"))?;
	if !host_allowed(host, allowed) {
		return Err(RenderError::UrlNotAllowed(url.to_string()));
	}
	Ok(url)
}

/// Browser flags for a locked-down kiosk window on `display`.
pub fn kiosk_args(url: &Url, display: &Display, profile_dir: &Path, extra: &[String]) -> Vec<String> {
	let config = display.config();
	let mut args = vec![
		"--kiosk".to_string(),
		format!("--window-position={},0", config.x_offset),
		format!("--window-size={},{}", config.width, config.height),
		format!("--user-data-dir={}", profile_dir.display()),
		"--noerrdialogs".to_string(),
		"--disable-infobars".to_string(),
		"--disable-session-crashed-bubble".to_string(),
		"--disable-component-update".to_string(),
		"--check-for-update-interval=31536000".to_string(),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
	];
	args.extend(extra.iter().cloned());
	args.push(url.to_string());
	args
}

pub struct KioskRenderer {
	config: KioskConfig,
	url: Option<String>,
	stop: StopHandle,
	state: Mutex<KioskState>,
}

impl KioskRenderer {
	pub fn new(config: KioskConfig, url: Option<String>) -> Self {
		Self {
			config,
			url,
			stop: StopHandle::default(),
			state: Mutex::new(KioskState::default()),
		}
	}

	fn browser(&self) -> Result<PathBuf, RenderError> {
		let found = match &self.config.browser {
			Some(browser) => find_executable(&[browser]),
			None => find_executable(BROWSER_CANDIDATES),
		};
		found.ok_or(RenderError::ExecutableNotFound { what: "browser" })
	}

	fn set_stopped(&self, forced_kill: bool) {
		let mut state = self.state.lock();
		state.phase = KioskPhase::Stopped;
		state.pid = None;
		state.running = false;
		state.forced_kill = forced_kill;
	}
}

#[async_trait]
impl Renderer for KioskRenderer {
	fn mode(&self) -> Mode {
		Mode::Kiosk
	}

	async fn run(&self, mut ctx: RenderContext) -> Result<(), RenderError> {
		let output = ctx.display().clone();
		let mut stop = self.stop.subscribe();

		let raw = self.url.as_deref().or(self.config.home_url.as_deref()).ok_or_else(|| RenderError::InvalidUrl {
			url: String::new(),
			reason: "no URL given and no homeUrl configured".to_string(),
		})?;
		let url = validate_url(raw, &self.config.allowed_domains)?;
		self.state.lock().url = Some(url.to_string());

		let _lease = ctx.acquire_output()?;
		let browser = self.browser()?;
		let profile_dir = self.config.profile_root.join(format!("display-{}", output.id()));
		tokio::fs::create_dir_all(&profile_dir).await?;

		self.state.lock().phase = KioskPhase::Launching;
		let mut cmd = Command::new(&browser);
		prepare_command(&mut cmd);
		cmd.args(kiosk_args(&url, &output, &profile_dir, &self.config.extra_args)).envs(output.environment());
		debug!(target = "signage.kiosk", browser = %browser.display(), %url, "launching browser");

		let mut child = cmd.spawn().map_err(|source| RenderError::Launch {
			program: browser.display().to_string(),
			source,
		})?;
		self.state.lock().pid = child.id();

		let grace = Duration::from_millis(self.config.grace_ms);
		let settle_steps = (self.config.launch_settle_ms / SETTLE_STEP.as_millis() as u64).max(1);
		for _ in 0..settle_steps {
			if let Some(status) = child.try_wait()? {
				self.set_stopped(false);
				return Err(RenderError::BackendExited {
					what: "browser",
					status: status.to_string(),
				});
			}
			if stop.sleep(SETTLE_STEP).await {
				let termination = terminate_child(&mut child, grace).await?;
				self.set_stopped(termination.was_forced());
				return Ok(());
			}
		}

		{
			let mut state = self.state.lock();
			state.phase = KioskPhase::Running;
			state.running = true;
		}
		info!(target = "signage.kiosk", display = %output.id(), pid = ?child.id(), %url, "kiosk running");
		ctx.mark_running();

		tokio::select! {
			_ = stop.stopped() => {
				self.state.lock().phase = KioskPhase::Terminating;
				let termination = terminate_child(&mut child, grace).await?;
				if termination.was_forced() {
					warn!(target = "signage.kiosk", display = %output.id(), grace_ms = self.config.grace_ms, "browser ignored SIGTERM; killed");
				}
				self.set_stopped(termination.was_forced());
				Ok(())
			}
			status = child.wait() => {
				let status = status?;
				warn!(target = "signage.kiosk", display = %output.id(), %status, "browser exited unexpectedly");
				self.set_stopped(false);
				Err(RenderError::BackendExited { what: "browser", status: status.to_string() })
			}
		}
	}

	fn request_stop(&self) {
		self.stop.request_stop();
	}

	fn force_stop(&self) {
		if let Some(pid) = self.state.lock().pid {
			warn!(target = "signage.kiosk", pid, "force-killing browser");
			let _ = signal_group(pid, Signal::Kill);
		}
	}

	fn snapshot(&self) -> RenderState {
		RenderState::Kiosk(self.state.lock().clone())
	}
}
