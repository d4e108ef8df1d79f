//! Signal-triggered stack dumps rendered as logical source lines.
//!
//! Link this crate into a process and point `GLANCE_DIR` at a directory:
//! every time the trigger signal (default `SIGUSR1`) arrives, the current
//! call stack is filtered to the configured module-path prefixes, each
//! retained frame is rendered as one *logical* source statement (statements
//! spanning several physical lines are consolidated via a speculative
//! parse), and the result is appended as a single flushed line to
//! `<GLANCE_DIR>/<pid>`. An external tool (typically a sampling profiler
//! signalling many processes) tails those files; they are deleted at
//! normal process exit.
//!
//! No init call is needed: glance initializes itself via `ctor` and stays
//! a complete no-op while `GLANCE_DIR` is unset.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `GLANCE_DIR` | Output directory; unset leaves the instrument inactive. |
//! | `GLANCE_FILE_LINE` | Non-empty: prefix each frame with a colorized `basename:line` tag. |
//! | `GLANCE_MAX_FRAMES` | Rendered-frame cap per dump, most-recent-first (default 9999). |
//! | `GLANCE_MODULES` | Comma-separated module-path prefixes; the frame walk stops at the first match (default: match everything). |
//! | `GLANCE_SIGNAL` | Trigger signal number (default `SIGUSR1`). |
//!
//! The instrument must never be observable by its host beyond the output
//! files: every failure inside a dump is swallowed at [`dump_now`]'s
//! boundary. The handler allocates and takes locks, so it is not
//! async-signal-safe in the formal sense, and a second signal delivered
//! while a dump is in flight is an accepted reentrancy hazard.

use std::error::Error;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use ctor::{ctor, dtor};
use glance_capture::{CaptureError, CaptureOptions, capture_current};
use glance_source::{LineCache, SyntaxOracle};
use tracing::{debug, warn};

mod config;
mod output;
mod render;
mod trace;

pub use config::Config;

use output::{OutputError, OutputFile};

/// Unwind depth requested from the capture backend. Stacks deeper than
/// this lose outermost frames first, which only shortens the rendered tail.
const CAPTURE_DEPTH: usize = 1024;

static INSTRUMENT: OnceLock<Instrument> = OnceLock::new();

/// Process-wide context: configuration, the open output file, and the
/// caches that outlive individual dumps.
struct Instrument {
    config: Config,
    output: OutputFile,
    cache: LineCache,
    oracle: SyntaxOracle,
}

impl Instrument {
    fn dump(&self) -> Result<(), DumpError> {
        let options = CaptureOptions {
            max_frames: NonZeroUsize::new(CAPTURE_DEPTH)
                .expect("invariant violated: capture depth must be non-zero"),
            skip_frames: 0,
        };
        let frames = capture_current(options)?;
        let frames = trace::trim_handler_noise(&frames);
        let chain = trace::extract_chain(frames, &self.config.module_prefixes);
        let line = render::render_trace(chain, &self.cache, &self.oracle, &self.config);
        self.output.append_line(&line)?;
        Ok(())
    }
}

/// Initialize from the environment. A no-op when `GLANCE_DIR` is unset or
/// the instrument is already active.
pub fn init() {
    let config = Config::from_env();
    if config.dir.is_none() {
        debug!("glance inactive: {} not set", config::ENV_DIR);
        return;
    }
    init_with(config);
}

/// Initialize with an explicit configuration instead of the environment.
/// A no-op when `config.dir` is `None` or the instrument is already active.
pub fn init_with(config: Config) {
    let Some(dir) = config.dir.clone() else {
        return;
    };
    if INSTRUMENT.get().is_some() {
        return;
    }
    let output = match OutputFile::create(&dir) {
        Ok(output) => output,
        Err(err) => {
            warn!("glance disabled: {err}");
            return;
        }
    };
    let output_path = output.path().display().to_string();
    let signal = config.signal;
    let instrument = Instrument {
        config,
        output,
        cache: LineCache::new(),
        oracle: SyntaxOracle::rust(),
    };
    // A concurrent init may have won the race; the loser's freshly opened
    // file handle is simply dropped.
    if INSTRUMENT.set(instrument).is_ok() {
        platform::install_signal_handler(signal);
        debug!(path = %output_path, signal, "glance active");
    }
}

/// Trigger one dump immediately, exactly as if the signal had arrived.
pub fn dump_now() {
    dump_current();
}

/// The dump boundary: everything a signal can trigger funnels through
/// here, and no error or panic escapes into the host process.
fn dump_current() {
    let Some(instrument) = INSTRUMENT.get() else {
        return;
    };
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = instrument.dump();
    }));
}

/// Delete the per-process output file. Idempotent and tolerant of the file
/// already being gone; the exit-time hook calls this as well.
pub fn shutdown() {
    if let Some(instrument) = INSTRUMENT.get()
        && let Err(err) = instrument.output.remove()
    {
        debug!("glance cleanup failed: {err}");
    }
}

#[ctor]
fn init_on_load() {
    init();
}

#[dtor]
fn cleanup_on_exit() {
    shutdown();
}

#[derive(Debug)]
enum DumpError {
    Capture(CaptureError),
    Output(OutputError),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture(err) => write!(f, "stack capture failed: {err}"),
            Self::Output(err) => write!(f, "dump write failed: {err}"),
        }
    }
}

impl Error for DumpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Capture(err) => Some(err),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<CaptureError> for DumpError {
    fn from(err: CaptureError) -> Self {
        Self::Capture(err)
    }
}

impl From<OutputError> for DumpError {
    fn from(err: OutputError) -> Self {
        Self::Output(err)
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::c_void;

    pub(crate) fn install_signal_handler(signal: i32) {
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = on_signal as *const () as usize;
            sa.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
            libc::sigemptyset(&mut sa.sa_mask);
            libc::sigaction(signal, &sa, std::ptr::null_mut());
        }
    }

    extern "C" fn on_signal(_sig: libc::c_int, _info: *mut libc::siginfo_t, _ctx: *mut c_void) {
        super::dump_current();
    }
}

#[cfg(not(unix))]
mod platform {
    pub(crate) fn install_signal_handler(_signal: i32) {}
}
