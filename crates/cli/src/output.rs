//! CLI output formatting.
//!
//! Colored status lines, JSON output and the progress printer used while
//! reconciling.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use hoist_lib::reconcile::{Phase, Progress};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Prints reconcile progress to stderr.
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
  fn on_phase(&self, phase: Phase) {
    match phase {
      Phase::InstallingLinks => eprintln!("Installing components ..."),
      Phase::PruningStaleLinks => eprintln!("Cleaning up ..."),
      _ => {}
    }
  }

  fn on_download(&self, component: &str, url: &str) {
    eprintln!("Downloading component: {}", component);
    eprintln!(
      " - fetching: {} ...",
      url.if_supports_color(Stream::Stderr, |s| s.dimmed())
    );
  }
}
