//! Process lifecycle helpers shared by the renderers that drive external programs.
//!
//! The kiosk browser, the video player and the slideshow's embedded player are
//! all child processes. This crate spawns them into their own process group
//! and tears them down with a polite signal first and a kill after a grace period.

pub mod executable;
pub mod process;

pub use executable::find_executable;
pub use process::{Signal, Termination, pid_is_alive, prepare_command, signal_group, terminate_child};
