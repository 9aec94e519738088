mod client;
mod materialize;

pub use client::TmuxClient;
pub use materialize::{inside_tmux, Materializer, SessionRequest, SessionTemplate};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment passed to tmux as `-e KEY=VALUE` pairs, in key order
pub type Env = BTreeMap<String, String>;

/// A session as reported by `tmux list-sessions`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    /// Session name, unique within the tmux server
    pub name: String,
    /// Working directory the session was started in
    pub path: PathBuf,
    /// Whether any client is attached
    pub attached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

impl SplitDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "h" | "horizontal" => Some(Self::Horizontal),
            "v" | "vertical" => Some(Self::Vertical),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::Horizontal => "-h",
            Self::Vertical => "-v",
        }
    }
}

/// The tmux operations the rest of the program relies on.
///
/// Pane and window ids returned here (`%3`, `@2`) are what later calls
/// target, so user base-index settings never matter.
#[allow(async_fn_in_trait)]
pub trait Multiplexer {
    /// Running sessions. A server that is not running has none.
    async fn list_sessions(&self) -> Vec<LiveSession>;

    /// Create a detached session and return its first pane id.
    async fn new_session(&self, name: &str, path: &Path, env: &Env) -> Result<String>;

    /// Type `keys` literally into `target`, then press Enter.
    async fn send_keys(&self, target: &str, keys: &str) -> Result<()>;

    /// Split `target` and return the new pane id.
    async fn split_pane(
        &self,
        target: &str,
        direction: SplitDirection,
        size: &str,
        path: &Path,
        env: &Env,
    ) -> Result<String>;

    async fn select_pane(&self, target: &str) -> Result<()>;

    /// Append a window after the session's last one without focusing it,
    /// returning the window id.
    async fn new_window(&self, session: &str, path: &Path, env: &Env) -> Result<String>;

    /// Move the current client to `session` (only valid inside tmux).
    async fn switch_client(&self, session: &str) -> Result<()>;

    /// Attach the caller's terminal to `session`.
    async fn attach(&self, session: &str) -> Result<()>;
}

/// Turn arbitrary text into a name tmux will keep as-is.
///
/// tmux rewrites `.` and `:` in session names to `_`; doing it up front
/// keeps lookups by name in agreement with what tmux reports back.
pub fn session_name(raw: &str) -> String {
    raw.trim().replace(['.', ':'], "_")
}

/// Parse `#{session_name}\t#{session_attached}\t#{session_path}` lines.
///
/// tmux escapes tabs in session names, so the first two tabs always
/// delimit the fields. Names and paths may contain spaces, and the path
/// keeps anything after the second tab. Lines that don't fit are skipped.
pub fn parse_sessions(output: &str) -> Vec<LiveSession> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let name = fields.next()?;
            let attached = fields.next()?;
            let path = fields.next()?;
            if name.is_empty() || path.is_empty() {
                return None;
            }
            let attached: u32 = attached.trim().parse().ok()?;
            Some(LiveSession {
                name: name.to_string(),
                path: PathBuf::from(path),
                attached: attached > 0,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    /// One observed call against [`RecordingTmux`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        NewSession { name: String, path: PathBuf, env: Env },
        SendKeys { target: String, keys: String },
        Split {
            target: String,
            direction: SplitDirection,
            size: String,
            path: PathBuf,
            env: Env,
        },
        SelectPane(String),
        NewWindow { session: String, path: PathBuf, env: Env },
        SwitchClient(String),
        Attach(String),
    }

    /// In-memory tmux that records every call and remembers created sessions.
    #[derive(Default)]
    pub struct RecordingTmux {
        pub calls: Mutex<Vec<Call>>,
        pub sessions: Mutex<Vec<LiveSession>>,
        /// Step name that should fail, e.g. `"split-window"`
        pub fail_step: Option<&'static str>,
        pub next_id: Mutex<u32>,
    }

    impl RecordingTmux {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, step: &'static str, call: Call) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail_step == Some(step) {
                return Err(Error::Materialize {
                    step,
                    message: "simulated failure".to_string(),
                });
            }
            Ok(())
        }

        fn id(&self, prefix: char) -> String {
            let mut next = self.next_id.lock().unwrap();
            let id = format!("{prefix}{next}");
            *next += 1;
            id
        }
    }

    impl Multiplexer for RecordingTmux {
        async fn list_sessions(&self) -> Vec<LiveSession> {
            self.sessions.lock().unwrap().clone()
        }

        async fn new_session(&self, name: &str, path: &Path, env: &Env) -> Result<String> {
            self.record(
                "new-session",
                Call::NewSession {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                    env: env.clone(),
                },
            )?;
            self.sessions.lock().unwrap().push(LiveSession {
                name: name.to_string(),
                path: path.to_path_buf(),
                attached: false,
            });
            Ok(self.id('%'))
        }

        async fn send_keys(&self, target: &str, keys: &str) -> Result<()> {
            self.record(
                "send-keys",
                Call::SendKeys {
                    target: target.to_string(),
                    keys: keys.to_string(),
                },
            )
        }

        async fn split_pane(
            &self,
            target: &str,
            direction: SplitDirection,
            size: &str,
            path: &Path,
            env: &Env,
        ) -> Result<String> {
            self.record(
                "split-window",
                Call::Split {
                    target: target.to_string(),
                    direction,
                    size: size.to_string(),
                    path: path.to_path_buf(),
                    env: env.clone(),
                },
            )?;
            Ok(self.id('%'))
        }

        async fn select_pane(&self, target: &str) -> Result<()> {
            self.record("select-pane", Call::SelectPane(target.to_string()))
        }

        async fn new_window(&self, session: &str, path: &Path, env: &Env) -> Result<String> {
            self.record(
                "new-window",
                Call::NewWindow {
                    session: session.to_string(),
                    path: path.to_path_buf(),
                    env: env.clone(),
                },
            )?;
            Ok(self.id('@'))
        }

        async fn switch_client(&self, session: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::SwitchClient(session.to_string()));
            if self.fail_step == Some("switch-client") {
                return Err(Error::Activation {
                    command: "switch-client",
                    message: "simulated failure".to_string(),
                });
            }
            Ok(())
        }

        async fn attach(&self, session: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Attach(session.to_string()));
            if self.fail_step == Some("attach-session") {
                return Err(Error::Activation {
                    command: "attach-session",
                    message: "simulated failure".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sessions() {
        let output = "api\t0\t/home/me/code/api\nnotes\t1\t/home/me/My Notes\nbusy\t2\t/srv\n";
        let sessions = parse_sessions(output);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].name, "api");
        assert_eq!(sessions[0].path, PathBuf::from("/home/me/code/api"));
        assert!(!sessions[0].attached);
        assert_eq!(sessions[1].path, PathBuf::from("/home/me/My Notes"));
        assert!(sessions[1].attached);
        assert!(sessions[2].attached);
    }

    #[test]
    fn test_parse_sessions_spaced_name() {
        let output = "my proj\t0\t/tmp\nwork stuff\t1\t/home/me/a b\n";
        let sessions = parse_sessions(output);
        assert_eq!(
            sessions,
            vec![
                LiveSession {
                    name: "my proj".to_string(),
                    path: PathBuf::from("/tmp"),
                    attached: false,
                },
                LiveSession {
                    name: "work stuff".to_string(),
                    path: PathBuf::from("/home/me/a b"),
                    attached: true,
                },
            ]
        );
    }

    #[test]
    fn test_parse_sessions_path_keeps_tabs() {
        let sessions = parse_sessions("odd\t0\t/tmp/a\tb\n");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].path, PathBuf::from("/tmp/a\tb"));
    }

    #[test]
    fn test_parse_sessions_skips_malformed() {
        let output = "\nonlyname\nname\tnotanumber\t/path\nold style /p 0\n\t0\t/p\nok\t0\t/p\n";
        let sessions = parse_sessions(output);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "ok");
    }

    #[test]
    fn test_session_name() {
        assert_eq!(session_name("my.app"), "my_app");
        assert_eq!(session_name("  host:8080 "), "host_8080");
        assert_eq!(session_name("plain name"), "plain name");
        assert_eq!(session_name("   "), "");
    }

    #[test]
    fn test_split_direction() {
        assert_eq!(SplitDirection::parse("h"), Some(SplitDirection::Horizontal));
        assert_eq!(
            SplitDirection::parse("vertical"),
            Some(SplitDirection::Vertical)
        );
        assert_eq!(SplitDirection::parse("diagonal"), None);
        assert_eq!(SplitDirection::Vertical.flag(), "-v");
    }
}
