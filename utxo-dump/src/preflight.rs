use std::io::{self, BufRead, Write};
use std::process::{Command, Stdio};

use anyhow::Result;

/// A node answering `bitcoin-cli getnetworkinfo` may be writing to the chainstate.
fn node_is_running() -> bool {
    Command::new("bitcoin-cli")
        .arg("getnetworkinfo")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn ask_to_continue<R: BufRead>(mut input: R) -> Result<bool> {
    print!("Do you wish to continue anyway? [y/n] (default n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

/// Returns whether the dump should go ahead.
pub(crate) fn check_node_stopped() -> Result<bool> {
    if !node_is_running() {
        return Ok(true);
    }
    println!(
        "Bitcoin is running. You should shut it down with `bitcoin-cli stop` first. \
         We don't want to access the chainstate LevelDB while Bitcoin is running."
    );
    println!(
        "Note: If you do stop bitcoind, make sure that it won't auto-restart \
         (e.g. if it's running as a systemd service)."
    );
    ask_to_continue(io::stdin().lock())
}
