//! Call-stack introspection capability.
//!
//! [`capture_current`] walks the active call stack and returns it as an
//! ordered, root-first list of [`Frame`]s, each carrying the source location
//! and demangled module path its program counter resolves to. The pipeline
//! that consumes these frames never talks to the unwinder directly, so the
//! backend can be swapped without touching it.
//!
//! The Unix backend leans on the `backtrace` crate, which takes a global
//! lock while unwinding. Capturing from inside a signal handler that
//! interrupted another capture can therefore deadlock; callers accept that
//! hazard and bound it by swallowing failures at their outermost entry
//! point.

use compact_str::CompactString;
use std::error::Error;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub max_frames: NonZeroUsize,
    pub skip_frames: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_frames: NonZeroUsize::new(256)
                .expect("invariant violated: default max_frames must be non-zero"),
            skip_frames: 0,
        }
    }
}

/// One level of the active call stack at the instant of capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Source file this frame's program counter maps to, when debug info
    /// is available.
    pub file: Option<PathBuf>,
    /// 1-based source line, when debug info is available.
    pub line: Option<u32>,
    /// Demangled symbol path with the trailing hash segment removed,
    /// e.g. `app::worker::run`. Empty when the symbol did not resolve.
    pub module_path: CompactString,
}

impl Frame {
    fn unresolved() -> Self {
        Self {
            file: None,
            line: None,
            module_path: CompactString::new(""),
        }
    }
}

#[derive(Debug)]
pub enum CaptureError {
    UnsupportedPlatform { target_os: &'static str },
    EmptyStack,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPlatform { target_os } => {
                write!(
                    f,
                    "unsupported platform for stack capture backend: {target_os}; only Unix targets are implemented"
                )
            }
            Self::EmptyStack => {
                write!(f, "invariant violated: captured stack must be non-empty")
            }
        }
    }
}

impl Error for CaptureError {}

/// Capture the current call stack, root-first.
///
/// At most `options.max_frames` frames are kept, counted from the innermost
/// frame after `options.skip_frames` have been discarded; on stacks deeper
/// than the cap it is the outermost frames that are lost, which only
/// shortens the tail a renderer would show.
pub fn capture_current(options: CaptureOptions) -> Result<Vec<Frame>, CaptureError> {
    platform::capture_current_impl(options)
}

/// Strip the trailing `::h0123456789abcdef` disambiguator rustc appends to
/// mangled symbols, leaving the human-meaningful path.
fn strip_symbol_hash(name: &str) -> &str {
    if let Some((head, tail)) = name.rsplit_once("::")
        && tail.len() == 17
        && tail.starts_with('h')
        && tail[1..].bytes().all(|b| b.is_ascii_hexdigit())
    {
        return head;
    }
    name
}

#[cfg(unix)]
mod platform {
    use super::{CaptureError, CaptureOptions, Frame, strip_symbol_hash};
    use compact_str::CompactString;
    use std::path::Path;

    pub fn capture_current_impl(options: CaptureOptions) -> Result<Vec<Frame>, CaptureError> {
        let mut leaf_first: Vec<Frame> = Vec::new();
        let mut skip_remaining = options.skip_frames;

        backtrace::trace(|frame| {
            if skip_remaining > 0 {
                skip_remaining -= 1;
                return true;
            }
            if leaf_first.len() >= options.max_frames.get() {
                return false;
            }

            let mut resolved: Option<Frame> = None;
            backtrace::resolve_frame(frame, |symbol| {
                // A frame can resolve to several symbols when calls were
                // inlined; the first one is the innermost.
                if resolved.is_some() {
                    return;
                }
                let module_path = symbol
                    .name()
                    .map(|name| CompactString::from(strip_symbol_hash(&name.to_string())))
                    .unwrap_or_default();
                resolved = Some(Frame {
                    file: symbol.filename().map(Path::to_path_buf),
                    line: symbol.lineno(),
                    module_path,
                });
            });

            leaf_first.push(resolved.unwrap_or_else(Frame::unresolved));
            true
        });

        if leaf_first.is_empty() {
            return Err(CaptureError::EmptyStack);
        }

        leaf_first.reverse();
        Ok(leaf_first)
    }
}

#[cfg(not(unix))]
mod platform {
    use super::{CaptureError, CaptureOptions, Frame};

    pub fn capture_current_impl(_options: CaptureOptions) -> Result<Vec<Frame>, CaptureError> {
        Err(CaptureError::UnsupportedPlatform {
            target_os: std::env::consts::OS,
        })
    }
}
