//! Pixel frames and the surfaces renderers present them to.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use signage_protocol::DisplayId;
use tracing::debug;

use crate::display::{Display, OutputLease};
use crate::error::RenderError;

/// Parses `#rrggbb` (leading `#` optional) into RGB bytes.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
	let hex = value.trim().trim_start_matches('#');
	if hex.len() != 6 || !hex.is_ascii() {
		return None;
	}
	let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
	Some([channel(0)?, channel(2)?, channel(4)?])
}

/// An opaque RGBA8 frame, row-major, no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	width: u32,
	height: u32,
	pixels: Vec<u8>,
}

impl Frame {
	/// A black frame.
	pub fn new(width: u32, height: u32) -> Self {
		let mut pixels = vec![0u8; width as usize * height as usize * 4];
		for px in pixels.chunks_exact_mut(4) {
			px[3] = 255;
		}
		Self { width, height, pixels }
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn pixels(&self) -> &[u8] {
		&self.pixels
	}

	/// RGBA of the pixel at (`x`, `y`), or `None` outside the frame.
	pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
		if x >= self.width || y >= self.height {
			return None;
		}
		let i = (y as usize * self.width as usize + x as usize) * 4;
		Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
	}

	pub fn fill(&mut self, rgb: [u8; 3]) {
		for px in self.pixels.chunks_exact_mut(4) {
			px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
		}
	}

	/// Composites premultiplied RGBA `src` (`src_width` x `src_height`) over
	/// this frame with its top-left corner at (`x`, `y`). Parts outside the
	/// frame are clipped.
	pub fn blend_premultiplied(&mut self, src: &[u8], src_width: u32, src_height: u32, x: i64, y: i64) {
		let Some((cols, rows)) = self.clip(src_width, src_height, x, y) else {
			return;
		};
		for row in rows {
			let dst_y = (y + row as i64) as usize;
			for col in cols.clone() {
				let dst_x = (x + col as i64) as usize;
				let s = (row as usize * src_width as usize + col as usize) * 4;
				let alpha = u32::from(src[s + 3]);
				if alpha == 0 {
					continue;
				}
				let d = (dst_y * self.width as usize + dst_x) * 4;
				for c in 0..3 {
					let under = u32::from(self.pixels[d + c]) * (255 - alpha) / 255;
					self.pixels[d + c] = (u32::from(src[s + c]) + under).min(255) as u8;
				}
			}
		}
	}

	/// Copies straight-alpha RGBA `src` over this frame at (`x`, `y`).
	pub fn blend_straight(&mut self, src: &[u8], src_width: u32, src_height: u32, x: i64, y: i64) {
		let Some((cols, rows)) = self.clip(src_width, src_height, x, y) else {
			return;
		};
		for row in rows {
			let dst_y = (y + row as i64) as usize;
			for col in cols.clone() {
				let dst_x = (x + col as i64) as usize;
				let s = (row as usize * src_width as usize + col as usize) * 4;
				let alpha = u32::from(src[s + 3]);
				let d = (dst_y * self.width as usize + dst_x) * 4;
				for c in 0..3 {
					let over = u32::from(src[s + c]) * alpha;
					let under = u32::from(self.pixels[d + c]) * (255 - alpha);
					self.pixels[d + c] = ((over + under) / 255) as u8;
				}
			}
		}
	}

	/// Writes `target` scaled towards black by `opacity` (0.0 to 1.0).
	pub fn fade_from(&mut self, target: &Frame, opacity: f32) {
		let factor = (opacity.clamp(0.0, 1.0) * 256.0) as u32;
		for (dst, src) in self.pixels.chunks_exact_mut(4).zip(target.pixels.chunks_exact(4)) {
			for c in 0..3 {
				dst[c] = ((u32::from(src[c]) * factor) >> 8).min(255) as u8;
			}
			dst[3] = 255;
		}
	}

	/// Shows the leftmost `columns` of `target`; the rest is black.
	pub fn wipe_from(&mut self, target: &Frame, columns: u32) {
		let columns = columns.min(self.width) as usize;
		let stride = self.width as usize * 4;
		for (dst, src) in self.pixels.chunks_exact_mut(stride).zip(target.pixels.chunks_exact(stride)) {
			dst[..columns * 4].copy_from_slice(&src[..columns * 4]);
			for px in dst[columns * 4..].chunks_exact_mut(4) {
				px.copy_from_slice(&[0, 0, 0, 255]);
			}
		}
	}

	fn clip(&self, src_width: u32, src_height: u32, x: i64, y: i64) -> Option<(std::ops::Range<u32>, std::ops::Range<u32>)> {
		let col_start = (-x).clamp(0, i64::from(src_width)) as u32;
		let col_end = (i64::from(self.width) - x).clamp(0, i64::from(src_width)) as u32;
		let row_start = (-y).clamp(0, i64::from(src_height)) as u32;
		let row_end = (i64::from(self.height) - y).clamp(0, i64::from(src_height)) as u32;
		if col_start >= col_end || row_start >= row_end {
			return None;
		}
		Some((col_start..col_end, row_start..row_end))
	}
}

/// Where a renderer's frames end up.
pub trait Surface: Send {
	fn size(&self) -> (u32, u32);

	fn present(&mut self, frame: &Frame) -> Result<(), RenderError>;
}

/// Memory layout of a framebuffer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferLayout {
	/// Bytes per line, including any padding the driver adds.
	pub stride: usize,
	pub bits_per_pixel: u32,
}

impl FramebufferLayout {
	/// 32-bpp rows with no padding.
	pub fn packed(width: u32) -> Self {
		Self {
			stride: width as usize * 4,
			bits_per_pixel: 32,
		}
	}

	/// Reads `stride` and `bits_per_pixel` from a `/sys/class/graphics/fbN` directory.
	pub fn from_sysfs(dir: &Path) -> Option<Self> {
		let read = |name: &str| -> Option<u64> { std::fs::read_to_string(dir.join(name)).ok()?.trim().parse().ok() };
		Some(Self {
			stride: usize::try_from(read("stride")?).ok()?,
			bits_per_pixel: u32::try_from(read("bits_per_pixel")?).ok()?,
		})
	}

	/// Rejects layouts a 32-bpp BGRX writer of `width` pixels cannot fill.
	pub fn check(&self, width: u32) -> Result<(), String> {
		if self.bits_per_pixel != 32 {
			return Err(format!("{} bits per pixel, only 32 is supported", self.bits_per_pixel));
		}
		let row = width as usize * 4;
		if self.stride < row {
			return Err(format!("line stride {} is shorter than {width} pixels ({row} bytes)", self.stride));
		}
		Ok(())
	}
}

/// `/sys/class/graphics/fbN` for a `/dev/fbN` device path.
fn sysfs_dir(framebuffer: &Path) -> Option<PathBuf> {
	let name = framebuffer.file_name()?.to_str()?;
	name.starts_with("fb").then(|| Path::new("/sys/class/graphics").join(name))
}

/// Linux framebuffer device, 32 bits per pixel, BGRX byte order.
pub struct FramebufferSurface {
	display: DisplayId,
	file: File,
	width: u32,
	height: u32,
	layout: FramebufferLayout,
	scratch: Vec<u8>,
}

impl FramebufferSurface {
	pub fn open(display: &Display) -> Result<Self, RenderError> {
		let config = display.config();
		let acquire_failed = |reason: String| RenderError::DisplayAcquireFailed {
			display: display.id(),
			reason: format!("{}: {reason}", config.framebuffer.display()),
		};

		let file = OpenOptions::new()
			.write(true)
			.open(&config.framebuffer)
			.map_err(|err| acquire_failed(err.to_string()))?;
		let layout = match sysfs_dir(&config.framebuffer).and_then(|dir| FramebufferLayout::from_sysfs(&dir)) {
			Some(layout) => layout,
			None => {
				debug!(target = "signage.display", path = %config.framebuffer.display(), "no sysfs geometry; assuming packed 32 bpp");
				FramebufferLayout::packed(config.width)
			}
		};
		layout.check(config.width).map_err(acquire_failed)?;

		Ok(Self {
			display: display.id(),
			file,
			width: config.width,
			height: config.height,
			layout,
			scratch: Vec::new(),
		})
	}
}

impl Surface for FramebufferSurface {
	fn size(&self) -> (u32, u32) {
		(self.width, self.height)
	}

	fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
		use std::os::unix::fs::FileExt;

		if (frame.width, frame.height) != (self.width, self.height) {
			return Err(RenderError::DisplayAcquireFailed {
				display: self.display,
				reason: format!(
					"frame is {}x{}, framebuffer is {}x{}",
					frame.width, frame.height, self.width, self.height
				),
			});
		}
		let stride = self.layout.stride;
		self.scratch.clear();
		self.scratch.resize(stride * self.height as usize, 0);
		let row_bytes = self.width as usize * 4;
		for (src, dst) in frame.pixels.chunks_exact(row_bytes).zip(self.scratch.chunks_exact_mut(stride)) {
			for (px, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
				out.copy_from_slice(&[px[2], px[1], px[0], 0]);
			}
		}
		self.file.write_all_at(&self.scratch, 0)?;
		Ok(())
	}
}

/// Present counter and last frame shared by a [`MemorySurface`] and its observers.
#[derive(Debug, Default)]
pub struct MemoryRecord {
	presents: AtomicU64,
	last: Mutex<Option<Frame>>,
}

impl MemoryRecord {
	pub fn presents(&self) -> u64 {
		self.presents.load(Ordering::Acquire)
	}

	pub fn last_frame(&self) -> Option<Frame> {
		self.last.lock().clone()
	}
}

/// In-memory surface for headless operation and tests.
pub struct MemorySurface {
	width: u32,
	height: u32,
	record: Arc<MemoryRecord>,
}

impl MemorySurface {
	pub fn new(width: u32, height: u32) -> Self {
		Self::with_record(width, height, Arc::default())
	}

	pub fn with_record(width: u32, height: u32, record: Arc<MemoryRecord>) -> Self {
		Self { width, height, record }
	}

	pub fn record(&self) -> Arc<MemoryRecord> {
		Arc::clone(&self.record)
	}
}

impl Surface for MemorySurface {
	fn size(&self) -> (u32, u32) {
		(self.width, self.height)
	}

	fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
		*self.record.last.lock() = Some(frame.clone());
		self.record.presents.fetch_add(1, Ordering::AcqRel);
		Ok(())
	}
}

/// Opens the surface for a display. Callers must hold its output lease.
pub trait SurfaceProvider: Send + Sync {
	fn open(&self, display: &Display, lease: &OutputLease) -> Result<Box<dyn Surface>, RenderError>;
}

/// Opens the display's framebuffer device.
#[derive(Debug, Default)]
pub struct FramebufferProvider;

impl SurfaceProvider for FramebufferProvider {
	fn open(&self, display: &Display, _lease: &OutputLease) -> Result<Box<dyn Surface>, RenderError> {
		Ok(Box::new(FramebufferSurface::open(display)?))
	}
}

/// Hands out [`MemorySurface`]s, one record per display.
#[derive(Debug, Default)]
pub struct HeadlessProvider {
	records: Mutex<HashMap<DisplayId, Arc<MemoryRecord>>>,
}

impl HeadlessProvider {
	pub fn new() -> Self {
		Self::default()
	}

	/// The record surfaces for `display` write to.
	pub fn record(&self, display: DisplayId) -> Arc<MemoryRecord> {
		Arc::clone(self.records.lock().entry(display).or_default())
	}
}

impl SurfaceProvider for HeadlessProvider {
	fn open(&self, display: &Display, _lease: &OutputLease) -> Result<Box<dyn Surface>, RenderError> {
		let (width, height) = display.size();
		Ok(Box::new(MemorySurface::with_record(width, height, self.record(display.id()))))
	}
}
