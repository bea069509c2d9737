#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use signage::protocol::{DisplayId, StatusSnapshot};
use signage::{Config, HeadlessProvider, Orchestrator};

/// Small displays, short timeouts and media directories under `root`.
pub fn test_config(root: &Path) -> Config {
	let mut config = Config::default();
	for display in &mut config.displays {
		display.width = 64;
		display.height = 48;
	}
	config.start_timeout_ms = 5_000;
	config.stop_timeout_ms = 3_000;
	config.force_grace_ms = 1_000;

	config.modes.recognition.title = None;
	config.modes.recognition.fps = 60;

	config.modes.video.directory = root.join("videos");
	config.modes.video.grace_ms = 500;

	config.modes.kiosk.profile_root = root.join("profiles");
	config.modes.kiosk.launch_settle_ms = 200;
	config.modes.kiosk.grace_ms = 300;

	config.modes.slideshow.image_directory = root.join("images");
	config.modes.slideshow.video_directory = root.join("slideshow-videos");
	config.modes.slideshow.image_duration_ms = 100;
	config.modes.slideshow.fade_steps = 2;
	config.modes.slideshow.fade_duration_ms = 20;

	for dir in ["videos", "images", "slideshow-videos", "profiles"] {
		std::fs::create_dir_all(root.join(dir)).unwrap();
	}
	config
}

pub fn headless(config: Config) -> (Orchestrator, Arc<HeadlessProvider>) {
	let surfaces = Arc::new(HeadlessProvider::new());
	(Orchestrator::with_surfaces(config, surfaces.clone()), surfaces)
}

/// Writes an executable `/bin/sh` script named `name` into `dir`.
pub fn fake_program(dir: &Path, name: &str, body: &str) -> PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
	path
}

/// Writes a solid-color PNG.
pub fn write_png(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
	let path = dir.join(name);
	image::RgbImage::from_pixel(8, 6, image::Rgb(rgb)).save(&path).unwrap();
	path
}

/// Polls `status` until `predicate` holds or `limit` elapses.
pub async fn wait_for_status(
	orchestrator: &Orchestrator,
	display: DisplayId,
	limit: Duration,
	predicate: impl Fn(&StatusSnapshot) -> bool,
) -> StatusSnapshot {
	let deadline = Instant::now() + limit;
	loop {
		let snapshot = orchestrator.status(display).unwrap();
		if predicate(&snapshot) {
			return snapshot;
		}
		assert!(Instant::now() < deadline, "condition not reached; last status: {snapshot:?}");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

/// Waits for a fake program to record its pid in `path` and returns it.
pub async fn wait_for_pid(path: &Path, limit: Duration) -> u32 {
	let deadline = Instant::now() + limit;
	loop {
		if let Some(pid) = std::fs::read_to_string(path)
			.ok()
			.and_then(|content| content.split_whitespace().next().and_then(|pid| pid.parse().ok()))
		{
			return pid;
		}
		assert!(Instant::now() < deadline, "{} never appeared", path.display());
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}
