//! Command-line front end for the signage orchestrator.
//!
//! `signage serve` runs the control daemon in the foreground; every other
//! subcommand is a thin client talking to it over the control socket.

pub mod cli;
pub mod client;
pub mod commands;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod output;
