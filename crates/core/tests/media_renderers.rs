mod common;

use std::time::{Duration, Instant};

use common::{fake_program, headless, test_config, wait_for_pid, wait_for_status, write_png};
use signage::protocol::{DisplayId, MediaKind, Mode, ModeParams, RenderState, SessionStatus, SlideshowState, VideoPhase};
use signage::{OrchestratorError, RenderError};
use tempfile::TempDir;

/// Slideshow whose only item is a video played by a long-running script.
/// `prelude` runs before the script records its pid.
fn video_only_slideshow(root: &std::path::Path, prelude: &str) -> (signage::Config, std::path::PathBuf) {
	let mut config = test_config(root);
	let pid_file = root.join("player.pid");
	let script = format!("{prelude}echo $$ > {}\nexec sleep 30", pid_file.display());
	let player = fake_program(root, "player", &script);
	config.modes.slideshow.player = player.display().to_string();
	std::fs::write(config.modes.slideshow.video_directory.join("clip.mp4"), b"").unwrap();
	(config, pid_file)
}

fn slideshow(status: &signage::protocol::StatusSnapshot) -> Option<&SlideshowState> {
	match &status.render {
		Some(RenderState::Slideshow(state)) => Some(state),
		_ => None,
	}
}

#[tokio::test]
async fn empty_directories_fail_with_empty_playlist() {
	let temp = TempDir::new().unwrap();
	let (orch, _surfaces) = headless(test_config(temp.path()));

	for mode in [Mode::Video, Mode::Slideshow] {
		let err = orch.start(DisplayId(0), ModeParams::defaults_for(mode)).await.unwrap_err();
		assert!(
			matches!(err.render_cause(), Some(RenderError::EmptyPlaylist(_))),
			"{mode}: unexpected error {err}"
		);

		let status = orch.status(DisplayId(0)).unwrap();
		assert!(!status.running);
		assert_eq!(status.status, SessionStatus::Stopped);
		assert!(status.last_error.as_deref().is_some_and(|e| e.contains("playlist is empty")));
	}
	assert!(!orch.registry().get(DisplayId(0)).unwrap().output_held());
}

#[tokio::test]
async fn slideshow_wraps_from_last_item_to_first() {
	let temp = TempDir::new().unwrap();
	let config = test_config(temp.path());
	let images = config.modes.slideshow.image_directory.clone();
	write_png(&images, "1.png", [255, 0, 0]);
	write_png(&images, "2.png", [0, 255, 0]);
	write_png(&images, "3.png", [0, 0, 255]);
	let (orch, surfaces) = headless(config);

	orch.start(DisplayId(1), ModeParams::defaults_for(Mode::Slideshow)).await.unwrap();

	let mut visited: Vec<usize> = Vec::new();
	let deadline = std::time::Instant::now() + Duration::from_secs(10);
	while visited.len() < 4 {
		assert!(std::time::Instant::now() < deadline, "visited only {visited:?}");
		let status = orch.status(DisplayId(1)).unwrap();
		if let Some(state) = slideshow(&status) {
			if visited.last() != Some(&state.index) {
				visited.push(state.index);
			}
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert_eq!(visited, vec![0, 1, 2, 0]);

	let status = orch.status(DisplayId(1)).unwrap();
	let state = slideshow(&status).unwrap();
	assert_eq!(state.item_count, 3);
	assert_eq!(state.kind, Some(MediaKind::Image));
	assert!(surfaces.record(DisplayId(1)).presents() >= 3);

	orch.stop(DisplayId(1)).await.unwrap();
}

#[tokio::test]
async fn corrupt_images_are_skipped_without_stopping_the_show() {
	let temp = TempDir::new().unwrap();
	let config = test_config(temp.path());
	let images = config.modes.slideshow.image_directory.clone();
	write_png(&images, "a.png", [10, 20, 30]);
	std::fs::write(images.join("b.png"), b"not a png").unwrap();
	let (orch, _surfaces) = headless(config);

	orch.start(DisplayId(0), ModeParams::defaults_for(Mode::Slideshow)).await.unwrap();
	let status = wait_for_status(&orch, DisplayId(0), Duration::from_secs(10), |s| {
		slideshow(s).is_some_and(|state| state.skipped >= 1 && state.items_shown >= 2)
	})
	.await;
	assert!(status.running);

	orch.stop(DisplayId(0)).await.unwrap();
}

#[tokio::test]
async fn slideshow_plays_video_items_through_the_player() {
	let temp = TempDir::new().unwrap();
	let mut config = test_config(temp.path());
	let marker = temp.path().join("played");
	let player = fake_program(temp.path(), "player", &format!("echo \"$@\" >> {}", marker.display()));
	config.modes.slideshow.player = player.display().to_string();
	let clip = config.modes.slideshow.video_directory.join("clip.mp4");
	std::fs::write(&clip, b"").unwrap();
	let (orch, _surfaces) = headless(config);

	orch.start(DisplayId(0), ModeParams::defaults_for(Mode::Slideshow)).await.unwrap();
	wait_for_status(&orch, DisplayId(0), Duration::from_secs(10), |s| {
		slideshow(s).is_some_and(|state| state.items_shown >= 2)
	})
	.await;
	orch.stop(DisplayId(0)).await.unwrap();

	let invocations = std::fs::read_to_string(&marker).unwrap();
	assert!(invocations.lines().count() >= 2);
	assert!(invocations.lines().all(|line| line.ends_with("clip.mp4") && line.contains("--fs")));
}

#[tokio::test]
async fn video_runs_until_stopped() {
	let temp = TempDir::new().unwrap();
	let mut config = test_config(temp.path());
	let player = fake_program(temp.path(), "player", "exec sleep 30");
	config.modes.video.player = player.display().to_string();
	std::fs::write(config.modes.video.directory.join("b.mp4"), b"").unwrap();
	std::fs::write(config.modes.video.directory.join("a.mkv"), b"").unwrap();
	let (orch, _surfaces) = headless(config);

	orch.start(DisplayId(0), ModeParams::defaults_for(Mode::Video)).await.unwrap();
	let status = orch.status(DisplayId(0)).unwrap();
	let Some(RenderState::Video(state)) = &status.render else {
		panic!("expected video state: {status:?}");
	};
	assert_eq!(state.phase, VideoPhase::Playing);
	assert_eq!(state.playlist_len, 2);
	assert!(state.current_file.as_deref().is_some_and(|f| f.ends_with("a.mkv")));
	let pid = state.pid.unwrap();

	orch.stop(DisplayId(0)).await.unwrap();
	assert!(!signage_runtime::pid_is_alive(pid));
	let status = orch.status(DisplayId(0)).unwrap();
	assert!(matches!(&status.last_state, Some(RenderState::Video(v)) if v.phase == VideoPhase::Stopped && !v.crashed));
}

#[tokio::test]
async fn video_backend_crash_surfaces_in_status() {
	let temp = TempDir::new().unwrap();
	let mut config = test_config(temp.path());
	let player = fake_program(temp.path(), "player", "sleep 2\nexit 3");
	config.modes.video.player = player.display().to_string();
	std::fs::write(config.modes.video.directory.join("a.mp4"), b"").unwrap();
	let (orch, _surfaces) = headless(config);

	orch.start(DisplayId(1), ModeParams::defaults_for(Mode::Video)).await.unwrap();
	let status = wait_for_status(&orch, DisplayId(1), Duration::from_secs(10), |s| s.status == SessionStatus::Failed).await;
	assert!(!status.running);
	assert!(status.last_error.as_deref().is_some_and(|e| e.contains("video player exited")));
	assert!(matches!(&status.last_state, Some(RenderState::Video(v)) if v.crashed));

	// A crashed session stops cleanly and can be restarted.
	orch.stop(DisplayId(1)).await.unwrap();
	assert!(matches!(
		orch.start(DisplayId(1), ModeParams::Video { playlist: Some(vec![]) }).await,
		Err(OrchestratorError::RendererStartFailed { .. })
	));
}

#[tokio::test]
async fn stopping_during_a_slideshow_video_terminates_the_player() {
	let temp = TempDir::new().unwrap();
	let (config, pid_file) = video_only_slideshow(temp.path(), "");
	let (orch, _surfaces) = headless(config);

	orch.start(DisplayId(0), ModeParams::defaults_for(Mode::Slideshow)).await.unwrap();
	let pid = wait_for_pid(&pid_file, Duration::from_secs(5)).await;

	let started = Instant::now();
	orch.stop(DisplayId(0)).await.unwrap();
	assert!(started.elapsed() < Duration::from_secs(2), "stop took {:?}", started.elapsed());
	assert!(!signage_runtime::pid_is_alive(pid));

	let status = orch.status(DisplayId(0)).unwrap();
	assert_eq!(status.status, SessionStatus::Stopped);
	assert!(status.last_error.is_none());
}

#[tokio::test]
async fn player_ignoring_sigterm_ends_in_forced_stop_timeout() {
	let temp = TempDir::new().unwrap();
	let (mut config, pid_file) = video_only_slideshow(temp.path(), "trap '' TERM\n");
	config.stop_timeout_ms = 500;
	config.force_grace_ms = 1_000;
	config.modes.slideshow.grace_ms = 10_000;
	let (orch, _surfaces) = headless(config);
	let display = orch.registry().get(DisplayId(1)).unwrap().clone();

	orch.start(DisplayId(1), ModeParams::defaults_for(Mode::Slideshow)).await.unwrap();
	// The pid file only appears once the trap is installed.
	let pid = wait_for_pid(&pid_file, Duration::from_secs(5)).await;

	let started = Instant::now();
	let err = orch.stop(DisplayId(1)).await.unwrap_err();
	let elapsed = started.elapsed();
	assert!(
		matches!(err, OrchestratorError::StopTimeout { forced: true, .. }),
		"unexpected error {err}"
	);
	assert!(elapsed >= Duration::from_millis(500), "stop returned after {elapsed:?}");
	assert!(elapsed < Duration::from_secs(3), "stop returned after {elapsed:?}");

	assert!(!signage_runtime::pid_is_alive(pid));
	assert!(!display.output_held());
	assert_eq!(orch.status(DisplayId(1)).unwrap().status, SessionStatus::Stopped);

	// The forced teardown released the session; stopping again is a no-op.
	orch.stop(DisplayId(1)).await.unwrap();
}
