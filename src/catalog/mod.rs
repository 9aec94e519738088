pub mod glob;
pub mod paths;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::tmux::{session_name, LiveSession, SessionRequest, SessionTemplate};

/// One entry offered in the picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSession {
    pub path: PathBuf,
    /// Directory name, or the live session's name once it exists
    pub name: String,
    /// What the picker shows
    pub label: String,
    /// Already running in tmux
    pub exists: bool,
    pub attached: bool,
    /// Running, but not produced by any configured source
    pub scratch: bool,
    /// Applied only if the session still has to be created
    pub template: SessionTemplate,
}

impl CandidateSession {
    /// A configured directory, matched against the live sessions.
    fn from_path(
        path: PathBuf,
        template: SessionTemplate,
        live: &[LiveSession],
        home: &Path,
    ) -> Self {
        let name = derive_name(&path);
        let display_path = paths::abbreviate(&path, home);

        match live.iter().find(|s| s.path == path && s.name == name) {
            Some(session) => Self {
                label: format!("tmux: {} [{}]", session.name, display_path),
                name: session.name.clone(),
                exists: true,
                attached: session.attached,
                scratch: false,
                path,
                template,
            },
            None => Self {
                label: display_path,
                name,
                exists: false,
                attached: false,
                scratch: false,
                path,
                template,
            },
        }
    }

    /// A live session no configured source accounts for.
    fn scratch(session: &LiveSession) -> Self {
        Self {
            path: session.path.clone(),
            name: session.name.clone(),
            label: format!("scratch: {}", session.name),
            exists: true,
            attached: session.attached,
            scratch: true,
            template: SessionTemplate::default(),
        }
    }

    pub fn request(&self) -> SessionRequest {
        SessionRequest {
            name: self.name.clone(),
            path: self.path.clone(),
            template: self.template.clone(),
        }
    }
}

/// Session name for a directory: its base name, normalised by
/// [`session_name`].
pub fn derive_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    session_name(&base)
}

/// Candidates keyed by path, keeping the position of first insertion.
#[derive(Default)]
struct Catalog {
    entries: Vec<CandidateSession>,
    index: HashMap<PathBuf, usize>,
}

impl Catalog {
    /// Insert, or replace an existing entry for the same path in place.
    fn upsert(&mut self, candidate: CandidateSession) {
        match self.index.get(&candidate.path) {
            Some(&position) => self.entries[position] = candidate,
            None => {
                self.index
                    .insert(candidate.path.clone(), self.entries.len());
                self.entries.push(candidate);
            }
        }
    }
}

/// Build the picker catalog from the configured sources and live sessions.
///
/// A directory reached by several sources appears once, at the position it
/// was first found, carrying the settings of the last source that found it.
/// Live sessions not matched by any directory are appended as scratch
/// entries. Attached sessions are dropped afterwards when hidden, and the
/// result is ordered for display by [`sort_for_display`].
pub fn resolve(settings: &Settings, live: &[LiveSession]) -> Vec<CandidateSession> {
    let mut catalog = Catalog::default();

    for source in &settings.sources {
        let template = SessionTemplate::from_source(source, &settings.home);
        for pattern in source.patterns() {
            for path in expand_dirs(pattern, &settings.home) {
                catalog.upsert(CandidateSession::from_path(
                    path,
                    template.clone(),
                    live,
                    &settings.home,
                ));
            }
        }
    }

    let mut candidates = catalog.entries;

    let scratch: Vec<_> = live
        .iter()
        .filter(|session| {
            !candidates
                .iter()
                .any(|c| c.exists && c.name == session.name && c.path == session.path)
        })
        .map(CandidateSession::scratch)
        .collect();
    candidates.extend(scratch);

    if settings.hide_attached {
        candidates.retain(|c| !c.attached);
    }

    sort_for_display(&mut candidates);
    debug!("resolved {} candidates", candidates.len());
    candidates
}

/// Directories matched by one pattern. A bad pattern is logged and matches
/// nothing.
///
/// The picker speaks one label per line, so a path containing a newline
/// can't be offered and is skipped.
fn expand_dirs(pattern: &str, home: &Path) -> Vec<PathBuf> {
    let expanded = paths::expand_home(pattern, home);
    match glob::expand(&expanded) {
        Ok(found) => found
            .into_iter()
            .filter(|path| path.is_dir())
            .filter(|path| {
                let offerable = !path.to_string_lossy().contains('\n');
                if !offerable {
                    warn!("skipping directory with a newline in its path: {path:?}");
                }
                offerable
            })
            .collect(),
        Err(e) => {
            warn!("unable to parse glob: {e}");
            Vec::new()
        }
    }
}

/// Not-yet-created directories first, then running sessions, then scratch
/// sessions. Order within each group is kept.
pub fn sort_for_display(candidates: &mut [CandidateSession]) {
    candidates.sort_by_key(|c| (c.scratch, c.exists));
}
