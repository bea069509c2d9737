//! Display session orchestrator for two-display signage devices.
//!
//! Each physical display runs at most one renderer at a time: scrolling
//! recognition text, a looping video playlist, a kiosk browser or a mixed
//! image/video slideshow. The [`Orchestrator`] owns one [`Session`] per
//! display and exposes start, stop and status operations over them.
//!
//! # Example
//!
//! ```ignore
//! use signage::{Config, Orchestrator};
//! use signage_protocol::{DisplayId, ModeParams};
//!
//! let orchestrator = Orchestrator::new(Config::load(&path)?);
//! orchestrator
//!     .start(DisplayId(0), ModeParams::Kiosk { url: Some("https://example.com".into()) })
//!     .await?;
//! println!("{:?}", orchestrator.status(DisplayId(0))?);
//! orchestrator.stop(DisplayId(0)).await?;
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod orchestrator;
pub mod renderer;
pub mod session;
pub mod stop;

pub use config::Config;
pub use display::surface::{FramebufferProvider, HeadlessProvider, SurfaceProvider};
pub use display::{Display, DisplayRegistry, OutputLease};
pub use error::{ConfigError, OrchestratorError, RenderError, Result};
pub use orchestrator::Orchestrator;
pub use renderer::{Renderer, build_renderer};
pub use session::Session;
pub use stop::{StopHandle, StopSignal, stop_channel};

pub use signage_protocol as protocol;
