use anyhow::Result;
use std::io::{self, IsTerminal, Write};

/// Ask a yes/no question where an empty answer means yes.
///
/// Returns `None` without asking when stdin is not a terminal.
pub fn confirm_default_yes(message: &str) -> Result<Option<bool>> {
  if !io::stdin().is_terminal() {
    return Ok(None);
  }

  write!(io::stderr(), "{} [Y/n] ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;
  eprintln!();

  Ok(Some(is_yes(&input)))
}

fn is_yes(input: &str) -> bool {
  matches!(input.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes")
}
