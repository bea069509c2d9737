//! Cross-task stop signalling for renderer loops.

use std::time::Duration;

use tokio::sync::watch;

/// Creates a linked stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
	let (tx, rx) = watch::channel(false);
	(StopHandle { tx }, StopSignal { rx })
}

/// Sending half, owned by the renderer and triggered by `request_stop`.
#[derive(Debug)]
pub struct StopHandle {
	tx: watch::Sender<bool>,
}

impl Default for StopHandle {
	fn default() -> Self {
		stop_channel().0
	}
}

impl StopHandle {
	/// Idempotent; later calls are no-ops.
	pub fn request_stop(&self) {
		self.tx.send_replace(true);
	}

	pub fn is_requested(&self) -> bool {
		*self.tx.borrow()
	}

	pub fn subscribe(&self) -> StopSignal {
		StopSignal { rx: self.tx.subscribe() }
	}
}

/// Receiving half handed to a run loop.
///
/// A dropped [`StopHandle`] counts as a stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
	rx: watch::Receiver<bool>,
}

impl StopSignal {
	pub fn is_stopped(&self) -> bool {
		*self.rx.borrow() || self.rx.has_changed().is_err()
	}

	/// Resolves once a stop is requested.
	pub async fn stopped(&mut self) {
		let _ = self.rx.wait_for(|stop| *stop).await;
	}

	/// Sleeps for `duration` unless stopped first. Returns `true` when stopped.
	pub async fn sleep(&mut self, duration: Duration) -> bool {
		if self.is_stopped() {
			return true;
		}
		tokio::select! {
			_ = self.stopped() => true,
			_ = tokio::time::sleep(duration) => self.is_stopped(),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Instant;

	use super::*;

	#[tokio::test]
	async fn stop_wakes_a_long_sleep() {
		let (handle, mut signal) = stop_channel();
		let started = Instant::now();
		let waiter = tokio::spawn(async move { signal.sleep(Duration::from_secs(30)).await });

		tokio::time::sleep(Duration::from_millis(20)).await;
		handle.request_stop();
		handle.request_stop();

		assert!(waiter.await.unwrap());
		assert!(started.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn late_subscribers_observe_an_earlier_stop() {
		let handle = StopHandle::default();
		handle.request_stop();
		let mut signal = handle.subscribe();
		assert!(signal.is_stopped());
		signal.stopped().await;
	}

	#[tokio::test]
	async fn sleep_without_stop_runs_to_completion() {
		let (_handle, mut signal) = stop_channel();
		assert!(!signal.sleep(Duration::from_millis(10)).await);
	}

	#[tokio::test]
	async fn dropped_handle_counts_as_stop() {
		let (handle, mut signal) = stop_channel();
		drop(handle);
		assert!(signal.is_stopped());
		assert!(signal.sleep(Duration::from_secs(30)).await);
	}
}
