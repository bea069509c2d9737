use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use signage::{Config, HeadlessProvider, Orchestrator};
use signage_protocol::{ControlRequest, ControlResponse, DisplayId};
use tracing::info;

use crate::cli::{Cli, Commands, mode_params};
use crate::client::{default_socket_path, request, send_request};
use crate::daemon::Daemon;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, print_statuses, print_value, status_line};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let socket = cli.socket.unwrap_or_else(default_socket_path);
	let format = cli.format;

	match cli.command {
		Commands::Serve { config, headless } => serve(&socket, config, headless).await,
		Commands::Start {
			display,
			mode,
			lines,
			playlist,
			url,
		} => {
			let params = mode_params(mode, lines, playlist, url)?;
			request(&socket, &ControlRequest::Start { display, params }).await?;
			print_value(
				&json!({ "display": display, "mode": mode, "started": true }),
				|| format!("display {display}: started {mode}"),
				format,
			);
			Ok(())
		}
		Commands::Stop { display } => {
			request(&socket, &ControlRequest::Stop { display }).await?;
			print_value(
				&json!({ "display": display, "stopped": true }),
				|| format!("display {display}: stopped"),
				format,
			);
			Ok(())
		}
		Commands::Status { display } => status(&socket, display, format).await,
		Commands::Ping => {
			let running = matches!(send_request(&socket, &ControlRequest::Ping).await?, Some(ControlResponse::Pong));
			print_running(running, format);
			Ok(())
		}
		Commands::Shutdown => {
			let stopped = match send_request(&socket, &ControlRequest::Shutdown).await? {
				None => false,
				Some(ControlResponse::Ok) => true,
				Some(ControlResponse::Error { code, message }) => return Err(CliError::Daemon { code, message }),
				Some(other) => return Err(CliError::UnexpectedResponse(format!("{other:?}"))),
			};
			print_value(
				&json!({ "stopped": stopped }),
				|| if stopped { "daemon stopped" } else { "daemon not running" }.to_string(),
				format,
			);
			Ok(())
		}
	}
}

async fn serve(socket: &Path, config: Option<PathBuf>, headless: bool) -> Result<()> {
	let config = match config.or_else(Config::default_path) {
		Some(path) => Config::load_or_default(&path)?,
		None => {
			let config = Config::default();
			config.validate()?;
			config
		}
	};

	let orchestrator = if headless {
		info!(target = "signage.daemon", "rendering headless");
		Orchestrator::with_surfaces(config, Arc::new(HeadlessProvider::new()))
	} else {
		Orchestrator::new(config)
	};

	let daemon = Daemon::bind(Arc::new(orchestrator), socket)
		.await
		.map_err(|err| match err {
			CliError::Io(io) => CliError::Anyhow(anyhow::Error::new(io).context(format!("failed to bind {}", socket.display()))),
			other => other,
		})?;
	daemon.run().await.context("control daemon failed").map_err(CliError::from)
}

async fn status(socket: &Path, display: Option<DisplayId>, format: OutputFormat) -> Result<()> {
	let query = match display {
		Some(display) => ControlRequest::Status { display },
		None => ControlRequest::StatusAll,
	};

	match send_request(socket, &query).await? {
		None => {
			print_running(false, format);
			Ok(())
		}
		Some(ControlResponse::Status { snapshot }) => {
			print_value(&snapshot, || status_line(&snapshot), format);
			Ok(())
		}
		Some(ControlResponse::Statuses { list }) => {
			print_statuses(&list, format);
			Ok(())
		}
		Some(ControlResponse::Error { code, message }) => Err(CliError::Daemon { code, message }),
		Some(other) => Err(CliError::UnexpectedResponse(format!("{other:?}"))),
	}
}

fn print_running(running: bool, format: OutputFormat) {
	print_value(
		&json!({ "running": running }),
		|| if running { "daemon running" } else { "daemon not running" }.to_string(),
		format,
	);
}
