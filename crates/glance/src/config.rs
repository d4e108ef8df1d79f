//! Environment-driven configuration, read once at startup.

use std::path::PathBuf;

pub(crate) const ENV_DIR: &str = "GLANCE_DIR";
pub(crate) const ENV_FILE_LINE: &str = "GLANCE_FILE_LINE";
pub(crate) const ENV_MAX_FRAMES: &str = "GLANCE_MAX_FRAMES";
pub(crate) const ENV_MODULES: &str = "GLANCE_MODULES";
pub(crate) const ENV_SIGNAL: &str = "GLANCE_SIGNAL";

/// Rendered-frame cap when `GLANCE_MAX_FRAMES` is unset; high enough to
/// mean "everything" for any realistic stack.
const DEFAULT_MAX_FRAMES: usize = 9999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Output directory for per-process dump files. `None` leaves the
    /// instrument entirely inactive.
    pub dir: Option<PathBuf>,
    /// Prefix each frame label with a colorized `basename:line` tag.
    pub file_line: bool,
    /// Upper bound on rendered frames per dump, most-recent-first.
    pub max_frames: usize,
    /// Module-path prefixes that stop the outward frame walk. The default
    /// single empty prefix matches every frame immediately.
    pub module_prefixes: Vec<String>,
    /// Signal that triggers a dump.
    pub signal: i32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let dir = get(ENV_DIR).filter(|v| !v.is_empty()).map(PathBuf::from);
        let file_line = get(ENV_FILE_LINE).is_some_and(|v| !v.is_empty());
        let max_frames = get(ENV_MAX_FRAMES)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_FRAMES);
        let module_prefixes = get(ENV_MODULES)
            .unwrap_or_default()
            .split(',')
            .map(|prefix| prefix.to_owned())
            .collect();
        let signal = get(ENV_SIGNAL)
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_signal);
        Self {
            dir,
            file_line,
            max_frames,
            module_prefixes,
            signal,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(unix)]
fn default_signal() -> i32 {
    libc::SIGUSR1
}

#[cfg(not(unix))]
fn default_signal() -> i32 {
    0
}
