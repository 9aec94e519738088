use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{parse_sessions, Env, LiveSession, Multiplexer, SplitDirection};
use crate::error::{Error, Result};

const LIST_FORMAT: &str = "#{session_name}\t#{session_attached}\t#{session_path}";

/// Client for interacting with tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
        }
    }

    /// Run one tmux command to completion and return its trimmed stdout.
    async fn run(&self, step: &'static str, args: Vec<String>) -> Result<String> {
        debug!("tmux {}", args.join(" "));

        let output = Command::new(&self.tmux_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Materialize {
                step,
                message: format!("failed to execute tmux: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::Materialize {
                step,
                message: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a command that takes over the caller's terminal.
    async fn run_interactive(&self, command: &'static str, session: &str) -> Result<()> {
        debug!("tmux {command} -t {session}");

        let status = Command::new(&self.tmux_path)
            .args([command, "-t", exact(session).as_str()])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::Activation {
                command,
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(Error::Activation {
                command,
                message: status.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplexer for TmuxClient {
    async fn list_sessions(&self) -> Vec<LiveSession> {
        let output = match Command::new(&self.tmux_path)
            .args(["list-sessions", "-F", LIST_FORMAT])
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("failed to execute tmux list-sessions: {e}");
                return Vec::new();
            }
        };

        // Usually just "no server running"
        if !output.status.success() {
            debug!(
                "tmux list-sessions: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Vec::new();
        }

        parse_sessions(&String::from_utf8_lossy(&output.stdout))
    }

    async fn new_session(&self, name: &str, path: &Path, env: &Env) -> Result<String> {
        let mut args = strings(&["new-session", "-d", "-s", name]);
        args.extend(strings(&["-c", path.to_string_lossy().as_ref()]));
        args.extend(strings(&["-P", "-F", "#{pane_id}"]));
        args.extend(env_args(env));
        self.run("new-session", args).await
    }

    async fn send_keys(&self, target: &str, keys: &str) -> Result<()> {
        self.run("send-keys", strings(&["send-keys", "-t", target, "-l", "--", keys]))
            .await?;
        self.run("send-keys", strings(&["send-keys", "-t", target, "Enter"]))
            .await?;
        Ok(())
    }

    async fn split_pane(
        &self,
        target: &str,
        direction: SplitDirection,
        size: &str,
        path: &Path,
        env: &Env,
    ) -> Result<String> {
        let mut args = strings(&["split-window", direction.flag(), "-t", target, "-l", size]);
        args.extend(strings(&["-c", path.to_string_lossy().as_ref()]));
        args.extend(strings(&["-P", "-F", "#{pane_id}"]));
        args.extend(env_args(env));
        self.run("split-window", args).await
    }

    async fn select_pane(&self, target: &str) -> Result<()> {
        self.run("select-pane", strings(&["select-pane", "-t", target]))
            .await
            .map(|_| ())
    }

    async fn new_window(&self, session: &str, path: &Path, env: &Env) -> Result<String> {
        let last_window = format!("{}:{{end}}", exact(session));
        let mut args = strings(&["new-window", "-a", "-d", "-t", last_window.as_str()]);
        args.extend(strings(&["-c", path.to_string_lossy().as_ref()]));
        args.extend(strings(&["-P", "-F", "#{window_id}"]));
        args.extend(env_args(env));
        self.run("new-window", args).await
    }

    async fn switch_client(&self, session: &str) -> Result<()> {
        self.run_interactive("switch-client", session).await
    }

    async fn attach(&self, session: &str) -> Result<()> {
        self.run_interactive("attach-session", session).await
    }
}

/// Target a session by exact name rather than tmux's prefix matching.
fn exact(session: &str) -> String {
    format!("={session}")
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn env_args(env: &Env) -> Vec<String> {
    env.iter()
        .flat_map(|(key, value)| ["-e".to_string(), format!("{key}={value}")])
        .collect()
}
