//! Display resource registry.
//!
//! Displays are created once from configuration and never destroyed. Each owns
//! an output slot; a renderer must hold the slot's [`OutputLease`] before it
//! draws to the display or hands it to a child process.

pub mod surface;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signage_protocol::DisplayId;
use tracing::trace;

use crate::config::{Config, DisplayConfig};
use crate::error::RenderError;

#[derive(Debug)]
pub struct Display {
	config: DisplayConfig,
	slot: Arc<AtomicBool>,
}

impl Display {
	pub fn new(config: DisplayConfig) -> Self {
		Self {
			config,
			slot: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn id(&self) -> DisplayId {
		self.config.id
	}

	pub fn config(&self) -> &DisplayConfig {
		&self.config
	}

	pub fn size(&self) -> (u32, u32) {
		(self.config.width, self.config.height)
	}

	/// Environment a child process needs to appear on this display.
	pub fn environment(&self) -> Vec<(&'static str, String)> {
		vec![("DISPLAY", self.config.x11_display.clone())]
	}

	/// Claims the output slot.
	///
	/// # Errors
	///
	/// Returns [`RenderError::DisplayBusy`] while another lease is alive.
	pub fn acquire_output(&self) -> Result<OutputLease, RenderError> {
		self.slot
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.map_err(|_| RenderError::DisplayBusy(self.id()))?;
		trace!(target = "signage.display", display = %self.id(), "output leased");
		Ok(OutputLease {
			display: self.id(),
			slot: Arc::clone(&self.slot),
		})
	}

	/// Returns `true` while some renderer holds the output.
	pub fn output_held(&self) -> bool {
		self.slot.load(Ordering::Acquire)
	}
}

/// Proof of exclusive access to a display's output; released on drop.
#[derive(Debug)]
pub struct OutputLease {
	display: DisplayId,
	slot: Arc<AtomicBool>,
}

impl OutputLease {
	pub fn display(&self) -> DisplayId {
		self.display
	}
}

impl Drop for OutputLease {
	fn drop(&mut self) {
		self.slot.store(false, Ordering::Release);
		trace!(target = "signage.display", display = %self.display, "output released");
	}
}

/// The fixed set of displays, indexed by id.
#[derive(Debug, Clone)]
pub struct DisplayRegistry {
	displays: Vec<Arc<Display>>,
}

impl DisplayRegistry {
	pub fn from_config(config: &Config) -> Self {
		let mut displays: Vec<Arc<Display>> = config.displays.iter().cloned().map(|d| Arc::new(Display::new(d))).collect();
		displays.sort_by_key(|d| d.id());
		Self { displays }
	}

	pub fn get(&self, id: DisplayId) -> Option<&Arc<Display>> {
		self.displays.iter().find(|d| d.id() == id)
	}

	pub fn ids(&self) -> impl Iterator<Item = DisplayId> + '_ {
		self.displays.iter().map(|d| d.id())
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<Display>> {
		self.displays.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_lease_is_refused_until_first_drops() {
		let registry = DisplayRegistry::from_config(&Config::default());
		let display = registry.get(DisplayId(0)).unwrap();

		let lease = display.acquire_output().unwrap();
		assert!(display.output_held());
		assert!(matches!(display.acquire_output(), Err(RenderError::DisplayBusy(DisplayId(0)))));

		// Other displays are independent.
		let other = registry.get(DisplayId(1)).unwrap().acquire_output().unwrap();
		assert_eq!(other.display(), DisplayId(1));

		drop(lease);
		assert!(!display.output_held());
		assert!(display.acquire_output().is_ok());
	}

	#[test]
	fn registry_lists_configured_ids_in_order() {
		let mut config = Config::default();
		config.displays.reverse();
		let registry = DisplayRegistry::from_config(&config);
		assert_eq!(registry.ids().collect::<Vec<_>>(), vec![DisplayId(0), DisplayId(1)]);
		assert!(registry.get(DisplayId(5)).is_none());
	}
}
