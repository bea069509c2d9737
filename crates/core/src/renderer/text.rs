//! Text rasterization for the recognition renderer.
//!
//! Each line is laid out as a small SVG document and rendered once with
//! `resvg` against the system font database. The result is a stack of
//! premultiplied RGBA strips cropped to their inked columns.

use std::sync::Arc;

use resvg::tiny_skia::{Pixmap, Transform};

use crate::config::RecognitionConfig;
use crate::display::surface::Frame;
use crate::error::RenderError;

/// One rasterized line, placed relative to the block's top-left corner.
#[derive(Debug, Clone)]
struct LineRaster {
	x: u32,
	top: u32,
	width: u32,
	height: u32,
	premultiplied: Vec<u8>,
}

/// Pre-rendered title and name lines, stacked vertically.
#[derive(Debug, Clone, Default)]
pub struct TextBlock {
	width: u32,
	height: u32,
	lines: Vec<LineRaster>,
}

impl TextBlock {
	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	/// Draws the block with its top edge at `offset` (may be negative or past the bottom).
	pub fn draw(&self, frame: &mut Frame, offset: i64) {
		let frame_height = i64::from(frame.height());
		for line in &self.lines {
			let top = offset + i64::from(line.top);
			if top >= frame_height || top + i64::from(line.height) <= 0 {
				continue;
			}
			frame.blend_premultiplied(&line.premultiplied, line.width, line.height, i64::from(line.x), top);
		}
	}
}

/// A line to lay out, with its font size in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
	pub text: String,
	pub font_size: u32,
}

/// Title (when configured) followed by one line per name.
pub fn compose_lines(config: &RecognitionConfig, names: &[String]) -> Vec<TextLine> {
	let title = config.title.iter().filter(|t| !t.trim().is_empty()).map(|t| TextLine {
		text: t.clone(),
		font_size: config.title_font_size,
	});
	let names = names.iter().map(|name| TextLine {
		text: name.clone(),
		font_size: config.font_size,
	});
	title.chain(names).collect()
}

/// Vertical space a line occupies.
pub fn line_advance(font_size: u32, line_spacing: f32) -> u32 {
	((font_size as f32) * line_spacing).ceil().max(1.0) as u32
}

pub(crate) fn escape_xml(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&apos;"),
			c if c.is_control() => {}
			c => out.push(c),
		}
	}
	out
}

fn line_svg(line: &TextLine, width: u32, height: u32, config: &RecognitionConfig) -> String {
	// Baseline leaves the spacing surplus split above and below the glyphs.
	let baseline = (height as f32 - line.font_size as f32) / 2.0 + line.font_size as f32 * 0.8;
	format!(
		r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><text x="{x}" y="{baseline:.1}" text-anchor="middle" font-family="{family}" font-size="{size}" fill="{fill}">{text}</text></svg>"#,
		x = width / 2,
		family = escape_xml(&config.font_family),
		size = line.font_size,
		fill = escape_xml(&config.color),
		text = escape_xml(&line.text),
	)
}

pub fn system_font_options() -> usvg::Options<'static> {
	let mut db = usvg::fontdb::Database::new();
	db.load_system_fonts();
	usvg::Options {
		fontdb: Arc::new(db),
		..Default::default()
	}
}

/// Rasterizes `lines` for a display `width` pixels wide.
///
/// # Errors
///
/// Returns [`RenderError::Text`] when a line cannot be parsed or allocated.
pub fn render_block(lines: &[TextLine], config: &RecognitionConfig, width: u32, options: &usvg::Options<'_>) -> Result<TextBlock, RenderError> {
	let mut block = TextBlock {
		width,
		height: 0,
		lines: Vec::with_capacity(lines.len()),
	};

	for line in lines {
		let advance = line_advance(line.font_size, config.line_spacing);
		let top = block.height;
		block.height += advance;
		if line.text.trim().is_empty() {
			continue;
		}

		let svg = line_svg(line, width, advance, config);
		let tree = usvg::Tree::from_str(&svg, options).map_err(|err| RenderError::Text(format!("{:?}: {err}", line.text)))?;
		let mut pixmap = Pixmap::new(width, advance).ok_or_else(|| RenderError::Text(format!("cannot allocate {width}x{advance} pixmap")))?;
		resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

		if let Some(raster) = crop_columns(pixmap.data(), width, advance) {
			block.lines.push(LineRaster { top, ..raster });
		}
	}

	Ok(block)
}

/// Crops a premultiplied strip to its non-transparent column range.
fn crop_columns(data: &[u8], width: u32, height: u32) -> Option<LineRaster> {
	let stride = width as usize * 4;
	let inked = |col: usize| (0..height as usize).any(|row| data[row * stride + col * 4 + 3] != 0);
	let first = (0..width as usize).find(|&col| inked(col))?;
	let last = (first..width as usize).rev().find(|&col| inked(col))?;

	let cropped_width = last - first + 1;
	let mut premultiplied = Vec::with_capacity(cropped_width * height as usize * 4);
	for row in 0..height as usize {
		let start = row * stride + first * 4;
		premultiplied.extend_from_slice(&data[start..start + cropped_width * 4]);
	}

	Some(LineRaster {
		x: first as u32,
		top: 0,
		width: cropped_width as u32,
		height,
		premultiplied,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn title_precedes_names_and_blank_title_is_dropped() {
		let config = RecognitionConfig::default();
		let lines = compose_lines(&config, &["Ada".into(), "Grace".into()]);
		assert_eq!(lines.len(), 3);
		assert_eq!(lines[0].font_size, config.title_font_size);
		assert_eq!(lines[2].text, "Grace");

		let config = RecognitionConfig {
			title: Some("  ".into()),
			..RecognitionConfig::default()
		};
		assert_eq!(compose_lines(&config, &["Ada".into()]).len(), 1);
	}

	#[test]
	fn xml_special_characters_are_escaped() {
		assert_eq!(escape_xml(r#"Tom & "Jerry" <3"#), "Tom &amp; &quot;Jerry&quot; &lt;3");
		assert_eq!(escape_xml("a\u{7}b"), "ab");
	}

	#[test]
	fn block_height_sums_line_advances() {
		let config = RecognitionConfig {
			font_size: 20,
			title_font_size: 40,
			line_spacing: 1.5,
			..RecognitionConfig::default()
		};
		let lines = compose_lines(&config, &["".into(), " ".into()]);
		// Blank lines occupy space without needing a font.
		let block = render_block(&lines[1..], &config, 200, &usvg::Options::default()).unwrap();
		assert_eq!(block.height(), 60);
		assert_eq!(line_advance(40, 1.5), 60);
	}

	#[test]
	fn crop_keeps_only_inked_columns() {
		let (width, height) = (6u32, 2u32);
		let mut data = vec![0u8; (width * height * 4) as usize];
		// Ink at column 2, row 1 and column 3, row 0.
		data[(width as usize + 2) * 4 + 3] = 255;
		data[3 * 4 + 3] = 128;

		let raster = crop_columns(&data, width, height).unwrap();
		assert_eq!((raster.x, raster.width, raster.height), (2, 2, 2));
		assert!(crop_columns(&vec![0u8; 16], 2, 2).is_none());
	}
}
