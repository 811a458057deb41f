use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use sluice_dispatch::{Destination, FieldEqMatcher, OnComplete};

use crate::webhook::webhook_destination;

mod webhook;

/// Sluice - routes analytics events to partner destinations
#[derive(Parser)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to a JSON settings file (subscriptions plus destination settings)
  #[arg(long, global = true)]
  settings: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Send one event through the built-in webhook destination
  Send {
    /// Print a stats record per subscription as it settles
    #[arg(long)]
    stats: bool,
  },

  /// Verify destination settings against the authentication hook
  TestAuth,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = read_settings(cli.settings.as_deref())?;

  match cli.command {
    Some(Commands::Send { stats }) => send(settings, stats)?,
    Some(Commands::TestAuth) => test_auth(settings)?,
    None => {
      println!("sluice - use --help to see available commands");
    }
  }

  Ok(())
}

fn send(settings: Value, stats: bool) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { send_async(settings, stats).await })
}

async fn send_async(settings: Value, stats: bool) -> Result<()> {
  // Read the event from stdin
  let event = read_event_from_stdin()?;
  eprintln!("Event: {}", event);

  let destination = Destination::new(webhook_destination(), Arc::new(FieldEqMatcher))
    .context("failed to build webhook destination")?;

  let on_complete: Option<OnComplete> = stats.then(|| {
    let on_complete: OnComplete = Arc::new(|stats| {
      if let Ok(line) = serde_json::to_string(stats) {
        eprintln!("{}", line);
      }
    });
    on_complete
  });

  let results = destination
    .on_event(&event, &settings, on_complete)
    .await
    .context("event dispatch failed")?;

  eprintln!("Steps executed: {}", results.len());

  // Print results as JSON
  println!("{}", serde_json::to_string_pretty(&results)?);

  Ok(())
}

fn test_auth(settings: Value) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let destination = Destination::new(webhook_destination(), Arc::new(FieldEqMatcher))
      .context("failed to build webhook destination")?;

    destination
      .test_authentication(&settings)
      .await
      .context("authentication failed")?;

    eprintln!("Authentication ok");
    Ok(())
  })
}

fn read_settings(path: Option<&Path>) -> Result<Value> {
  match path {
    Some(path) => {
      let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse settings file: {}", path.display()))
    }
    None => Ok(serde_json::json!({})),
  }
}

fn read_event_from_stdin() -> Result<Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read event from stdin")?;
    serde_json::from_str(&input).context("failed to parse event as JSON")
  }
}
