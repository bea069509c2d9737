//! Playlist construction for the video and slideshow renderers.
//!
//! A playlist is either the explicit list from a start request or a
//! non-recursive scan of the configured media directories. Scans are sorted by
//! file name, match extensions case-insensitively and skip hidden files.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use signage_protocol::MediaKind;
use tracing::{debug, warn};

use crate::config::{SlideshowConfig, VideoConfig};
use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
	pub kind: MediaKind,
	pub path: PathBuf,
	/// Hold time for images; videos run to their natural end.
	pub duration: Option<Duration>,
}

impl PlaylistItem {
	pub fn image(path: PathBuf, duration: Duration) -> Self {
		Self {
			kind: MediaKind::Image,
			path,
			duration: Some(duration),
		}
	}

	pub fn video(path: PathBuf) -> Self {
		Self {
			kind: MediaKind::Video,
			path,
			duration: None,
		}
	}

	pub fn file_name(&self) -> String {
		self.path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| self.path.display().to_string())
	}
}

/// Ordered, non-empty sequence of media items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
	items: Vec<PlaylistItem>,
}

impl Playlist {
	/// # Errors
	///
	/// Returns [`RenderError::EmptyPlaylist`] naming `source` when `items` is empty.
	pub fn new(items: Vec<PlaylistItem>, source: impl Into<String>) -> Result<Self, RenderError> {
		if items.is_empty() {
			return Err(RenderError::EmptyPlaylist(source.into()));
		}
		Ok(Self { items })
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn items(&self) -> &[PlaylistItem] {
		&self.items
	}

	pub fn get(&self, index: usize) -> &PlaylistItem {
		&self.items[index % self.items.len()]
	}

	/// Index after `index`, wrapping to the start.
	pub fn next_index(&self, index: usize) -> usize {
		(index + 1) % self.items.len()
	}

	pub fn contains_kind(&self, kind: MediaKind) -> bool {
		self.items.iter().any(|item| item.kind == kind)
	}
}

pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| extensions.iter().any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext)))
}

/// Lists regular files in `dir` whose extension is in `extensions`.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		if entry.file_name().to_string_lossy().starts_with('.') {
			continue;
		}
		let path = entry.path();
		if path.is_file() && has_extension(&path, extensions) {
			files.push(path);
		}
	}
	files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
	Ok(files)
}

/// A missing directory scans as empty so the caller reports an empty playlist.
fn scan_or_empty(dir: &Path, extensions: &[String], log_target: &'static str) -> Result<Vec<PathBuf>, RenderError> {
	match scan_directory(dir, extensions) {
		Ok(files) => {
			debug!(target = log_target, dir = %dir.display(), count = files.len(), "scanned media directory");
			Ok(files)
		}
		Err(err) if err.kind() == io::ErrorKind::NotFound => {
			warn!(target = log_target, dir = %dir.display(), "media directory does not exist");
			Ok(Vec::new())
		}
		Err(err) => Err(err.into()),
	}
}

pub fn video_playlist(explicit: Option<&[PathBuf]>, config: &VideoConfig) -> Result<Playlist, RenderError> {
	match explicit {
		Some(paths) => Playlist::new(
			paths.iter().cloned().map(PlaylistItem::video).collect(),
			"no videos in request",
		),
		None => {
			let files = scan_or_empty(&config.directory, &config.extensions, "signage.video")?;
			Playlist::new(
				files.into_iter().map(PlaylistItem::video).collect(),
				format!("no videos in {}", config.directory.display()),
			)
		}
	}
}

/// Images first, then videos, unless an explicit list is given.
pub fn slideshow_playlist(explicit: Option<&[PathBuf]>, config: &SlideshowConfig) -> Result<Playlist, RenderError> {
	let image_duration = Duration::from_millis(config.image_duration_ms);
	match explicit {
		Some(paths) => {
			let mut items = Vec::with_capacity(paths.len());
			for path in paths {
				if has_extension(path, &config.image_extensions) {
					items.push(PlaylistItem::image(path.clone(), image_duration));
				} else if has_extension(path, &config.video_extensions) {
					items.push(PlaylistItem::video(path.clone()));
				} else {
					warn!(target = "signage.slideshow", path = %path.display(), "unrecognized media extension; dropped");
				}
			}
			Playlist::new(items, "no usable media in request")
		}
		None => {
			let images = scan_or_empty(&config.image_directory, &config.image_extensions, "signage.slideshow")?;
			let videos = scan_or_empty(&config.video_directory, &config.video_extensions, "signage.slideshow")?;
			let items = images
				.into_iter()
				.map(|path| PlaylistItem::image(path, image_duration))
				.chain(videos.into_iter().map(PlaylistItem::video))
				.collect();
			Playlist::new(
				items,
				format!(
					"no media in {} or {}",
					config.image_directory.display(),
					config.video_directory.display()
				),
			)
		}
	}
}
