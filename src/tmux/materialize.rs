use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::{session_name, Env, LiveSession, Multiplexer, SplitDirection};
use crate::catalog::paths::{expand_home, expand_home_path};
use crate::config::{PaneSplit, SessionSource, WindowConfig};
use crate::error::{Error, Result};

/// `20` lines/columns or `30%`
static RE_SPLIT_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+%?$").unwrap());

/// What to build inside a freshly created session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTemplate {
    pub env: Env,
    pub command: Option<String>,
    pub split: Option<PaneSplit>,
    pub windows: Vec<WindowConfig>,
}

impl SessionTemplate {
    /// Copy a source's session settings, expanding `~/` in each path and
    /// env value on its own.
    pub fn from_source(source: &SessionSource, home: &Path) -> Self {
        let expand_env = |env: &Env| -> Env {
            env.iter()
                .map(|(key, value)| (key.clone(), expand_home(value, home)))
                .collect()
        };

        Self {
            env: expand_env(&source.env),
            command: source.command.clone(),
            split: source.split.as_ref().map(|split| PaneSplit {
                path: split.path.as_deref().map(|p| expand_home_path(p, home)),
                env: expand_env(&split.env),
                ..split.clone()
            }),
            windows: source
                .windows
                .iter()
                .map(|window| WindowConfig {
                    path: window.path.as_deref().map(|p| expand_home_path(p, home)),
                    env: expand_env(&window.env),
                    command: window.command.clone(),
                })
                .collect(),
        }
    }
}

/// A session to reuse or create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub name: String,
    pub path: PathBuf,
    pub template: SessionTemplate,
}

impl SessionRequest {
    /// A bare session named after whatever the user typed, normalised the
    /// way tmux would store it. Blank input asks for nothing.
    pub fn from_query(query: &str, path: PathBuf) -> Option<Self> {
        let name = session_name(query);
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            path,
            template: SessionTemplate::default(),
        })
    }
}

/// A validated split, ready to hand to tmux
struct SplitPlan<'a> {
    direction: SplitDirection,
    size: &'a str,
    path: &'a Path,
    env: Env,
    command: Option<&'a str>,
}

/// Creates sessions that don't exist yet and moves the user into them.
pub struct Materializer<'a, M> {
    tmux: &'a M,
}

impl<'a, M: Multiplexer> Materializer<'a, M> {
    pub fn new(tmux: &'a M) -> Self {
        Self { tmux }
    }

    /// Return the live session called `request.name`, creating it first if
    /// `live` has none. Existing sessions are never modified.
    ///
    /// Creation stops at the first failing tmux call; whatever was already
    /// built stays in place.
    pub async fn ensure_session(
        &self,
        request: &SessionRequest,
        live: &[LiveSession],
    ) -> Result<LiveSession> {
        if let Some(existing) = live.iter().find(|s| s.name == request.name) {
            info!("reusing tmux session {}", existing.name);
            return Ok(existing.clone());
        }

        self.create(request).await?;
        info!(
            "created tmux session {} at {}",
            request.name,
            request.path.display()
        );

        Ok(LiveSession {
            name: request.name.clone(),
            path: request.path.clone(),
            attached: false,
        })
    }

    async fn create(&self, request: &SessionRequest) -> Result<()> {
        let template = &request.template;
        // Validate up front so a bad split never leaves a half-built session
        let split = template
            .split
            .as_ref()
            .map(|split| plan_split(split, &request.path, &template.env))
            .transpose()?;

        let first_pane = self
            .tmux
            .new_session(&request.name, &request.path, &template.env)
            .await?;

        if let Some(command) = non_empty(&template.command) {
            self.tmux.send_keys(&first_pane, command).await?;
        }

        if let Some(split) = split {
            let pane = self
                .tmux
                .split_pane(&first_pane, split.direction, split.size, split.path, &split.env)
                .await?;
            if let Some(command) = split.command {
                self.tmux.send_keys(&pane, command).await?;
            }
            self.tmux.select_pane(&first_pane).await?;
        }

        for window in &template.windows {
            let path = window.path.as_deref().unwrap_or(&request.path);
            let env = merge_env(&template.env, &window.env);
            let id = self.tmux.new_window(&request.name, path, &env).await?;
            if let Some(command) = non_empty(&window.command) {
                self.tmux.send_keys(&id, command).await?;
            }
        }

        Ok(())
    }

    /// Switch to the session when already inside tmux, attach otherwise.
    /// Failure is only logged: the session exists either way.
    pub async fn activate(&self, session: &LiveSession, inside_tmux: bool) {
        let result = if inside_tmux {
            self.tmux.switch_client(&session.name).await
        } else {
            self.tmux.attach(&session.name).await
        };

        if let Err(e) = result {
            warn!("{e}; attach manually with `tmux attach -t {}`", session.name);
        }
    }
}

/// Whether this process runs inside a tmux client
pub fn inside_tmux() -> bool {
    std::env::var_os("TMUX").is_some_and(|value| !value.is_empty())
}

fn plan_split<'a>(split: &'a PaneSplit, base_path: &'a Path, base_env: &Env) -> Result<SplitPlan<'a>> {
    let direction = SplitDirection::parse(&split.direction).ok_or_else(|| Error::Materialize {
        step: "split-window",
        message: format!("invalid split direction {:?}", split.direction),
    })?;

    let size = split
        .size
        .as_deref()
        .filter(|size| RE_SPLIT_SIZE.is_match(size))
        .ok_or_else(|| Error::Materialize {
            step: "split-window",
            message: format!("split size must be N or N%, got {:?}", split.size),
        })?;

    Ok(SplitPlan {
        direction,
        size,
        path: split.path.as_deref().unwrap_or(base_path),
        env: merge_env(base_env, &split.env),
        command: non_empty(&split.command),
    })
}

/// Base env with `overrides` winning on key collisions
fn merge_env(base: &Env, overrides: &Env) -> Env {
    let mut env = base.clone();
    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
