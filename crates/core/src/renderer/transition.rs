//! Slide transitions.

use serde::{Deserialize, Serialize};

use crate::display::surface::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
	/// Opacity ramp from black.
	Fade,
	/// Left-to-right column reveal.
	Wipe,
	/// Immediate switch.
	Cut,
}

/// One intermediate step of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reveal {
	Opacity(f32),
	Columns(u32),
}

impl Reveal {
	pub fn compose(self, target: &Frame, out: &mut Frame) {
		match self {
			Reveal::Opacity(opacity) => out.fade_from(target, opacity),
			Reveal::Columns(columns) => out.wipe_from(target, columns),
		}
	}
}

/// Steps to present for `style`; the last step always shows the full image.
pub fn reveals(style: TransitionStyle, steps: u32, width: u32) -> Vec<Reveal> {
	let steps = steps.max(1);
	match style {
		TransitionStyle::Fade => (1..=steps).map(|i| Reveal::Opacity(i as f32 / steps as f32)).collect(),
		TransitionStyle::Wipe => (1..=steps)
			.map(|i| Reveal::Columns((u64::from(width) * u64::from(i) / u64::from(steps)) as u32))
			.collect(),
		TransitionStyle::Cut => vec![Reveal::Opacity(1.0)],
	}
}

/// Round-robin over the enabled styles.
#[derive(Debug, Clone)]
pub struct TransitionCycle {
	styles: Vec<TransitionStyle>,
	next: usize,
}

impl TransitionCycle {
	pub fn new(styles: &[TransitionStyle]) -> Self {
		let styles = if styles.is_empty() { vec![TransitionStyle::Fade] } else { styles.to_vec() };
		Self { styles, next: 0 }
	}

	pub fn next_style(&mut self) -> TransitionStyle {
		let style = self.styles[self.next];
		self.next = (self.next + 1) % self.styles.len();
		style
	}
}
