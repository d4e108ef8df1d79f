//! Trace rendering: most-recent-first frame labels joined into one line.

use glance_capture::Frame;
use glance_source::{CompletenessOracle, LineCache, consolidate};

use crate::config::Config;

/// Visual separator between frame labels, reading "called from".
pub(crate) const SEPARATOR: &str = " \x1b[0;34m←\x1b[0m ";

const TAG_COLOR: &str = "\x1b[0;34m";
const COLOR_RESET: &str = "\x1b[0m";

/// Label for frames with no resolvable source location.
const UNKNOWN_STATEMENT: &str = "?";

/// Map the extracted chain (root-first) to one line of text: most recent
/// call first, truncated to `config.max_frames` labels.
pub(crate) fn render_trace(
    frames: &[Frame],
    cache: &LineCache,
    oracle: &dyn CompletenessOracle,
    config: &Config,
) -> String {
    let labels: Vec<String> = frames
        .iter()
        .rev()
        .take(config.max_frames)
        .map(|frame| frame_label(frame, cache, oracle, config.file_line))
        .collect();
    labels.join(SEPARATOR)
}

fn frame_label(
    frame: &Frame,
    cache: &LineCache,
    oracle: &dyn CompletenessOracle,
    file_line: bool,
) -> String {
    let statement = match (frame.file.as_deref(), frame.line) {
        (Some(file), Some(line)) => consolidate(cache, oracle, file, line),
        _ => UNKNOWN_STATEMENT.to_owned(),
    };
    if !file_line {
        return statement;
    }
    match (frame.file.as_deref(), frame.line) {
        (Some(file), Some(line)) => {
            let basename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            format!("{TAG_COLOR}{basename}:{line}{COLOR_RESET} {statement}")
                .trim_end()
                .to_owned()
        }
        _ => statement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glance_source::SyntaxOracle;
    use std::path::{Path, PathBuf};

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.rs");
        std::fs::write(&path, "alpha();\nbeta();\ngamma();\n").unwrap();
        (dir, path)
    }

    fn frame(path: &Path, line: u32) -> Frame {
        Frame {
            file: Some(path.to_path_buf()),
            line: Some(line),
            module_path: "app::main".into(),
        }
    }

    fn config(max_frames: usize, file_line: bool) -> Config {
        Config {
            max_frames,
            file_line,
            ..Config::default()
        }
    }

    #[test]
    fn renders_most_recent_frame_first() {
        let (_dir, path) = fixture();
        let frames = [frame(&path, 1), frame(&path, 2), frame(&path, 3)];
        let line = render_trace(&frames, &LineCache::new(), &SyntaxOracle::rust(), &config(9999, false));
        assert_eq!(
            line,
            format!("gamma();{SEPARATOR}beta();{SEPARATOR}alpha();")
        );
    }

    #[test]
    fn truncates_to_the_configured_frame_count() {
        let (_dir, path) = fixture();
        let frames = [frame(&path, 1), frame(&path, 2), frame(&path, 3)];
        let line = render_trace(&frames, &LineCache::new(), &SyntaxOracle::rust(), &config(2, false));
        assert_eq!(line, format!("gamma();{SEPARATOR}beta();"));
    }

    #[test]
    fn tags_frames_with_basename_and_line_when_asked() {
        let (_dir, path) = fixture();
        let frames = [frame(&path, 2)];
        let line = render_trace(&frames, &LineCache::new(), &SyntaxOracle::rust(), &config(9999, true));
        assert_eq!(line, format!("{TAG_COLOR}app.rs:2{COLOR_RESET} beta();"));
    }

    #[test]
    fn unresolved_frames_render_as_question_mark() {
        let unresolved = Frame {
            file: None,
            line: None,
            module_path: "app::main".into(),
        };
        let line = render_trace(
            &[unresolved],
            &LineCache::new(),
            &SyntaxOracle::rust(),
            &config(9999, true),
        );
        assert_eq!(line, UNKNOWN_STATEMENT);
    }

    #[test]
    fn missing_source_renders_the_placeholder_label() {
        let frames = [frame(Path::new("/does/not/exist.rs"), 1)];
        let line = render_trace(
            &frames,
            &LineCache::new(),
            &SyntaxOracle::rust(),
            &config(9999, false),
        );
        assert_eq!(line, glance_source::SOURCE_UNAVAILABLE);
    }
}
