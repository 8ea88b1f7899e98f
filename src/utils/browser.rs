use anyhow::{anyhow, Context, Result};
use std::process::Command;

fn opener(url: &str) -> Option<Command> {
    let mut cmd = match std::env::consts::OS {
        "windows" => {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        }
        "macos" => Command::new("open"),
        "linux" | "freebsd" | "openbsd" => Command::new("xdg-open"),
        _ => return None,
    };
    cmd.arg(url);
    Some(cmd)
}

pub fn open_browser(url: &str) -> Result<()> {
    let mut cmd = opener(url)
        .ok_or_else(|| anyhow!("Unsupported OS for opening browser: {}", std::env::consts::OS))?;
    cmd.spawn()
        .with_context(|| format!("Failed to launch {:?}", cmd.get_program()))?;
    Ok(())
}
