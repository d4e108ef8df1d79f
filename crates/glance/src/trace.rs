//! Frame filtering and call-chain extraction.
//!
//! Frames are root-first throughout: index 0 is the process's outermost
//! captured frame, the last index is the frame that was executing when the
//! signal arrived.

use glance_capture::Frame;

/// Innermost frames that belong to the dump machinery rather than the host:
/// this workspace's own crates, the unwinder, and the signal trampoline.
/// They are dropped before filtering so dumps start at host code.
const HANDLER_NOISE: &[&str] = &[
    "glance",
    "backtrace::",
    "std::backtrace",
    "std::panicking",
    "std::panic",
    "__",
    "_sigtramp",
];

/// Whether `module_path` matches the configured prefix set. An empty set,
/// or one containing the empty string, matches everything.
pub(crate) fn matches_prefixes(module_path: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty()
        || prefixes
            .iter()
            .any(|prefix| module_path.starts_with(prefix.as_str()))
}

/// Drop innermost frames produced by the dump machinery itself.
pub(crate) fn trim_handler_noise(frames: &[Frame]) -> &[Frame] {
    let mut end = frames.len();
    while end > 0
        && HANDLER_NOISE
            .iter()
            .any(|noise| frames[end - 1].module_path.starts_with(noise))
    {
        end -= 1;
    }
    &frames[..end]
}

/// Walk from the innermost frame toward the root and return the full chain
/// from the outermost frame down to the first frame whose module path
/// matches `prefixes`, or down to the outermost frame alone when the walk
/// is exhausted without a match. The filter only chooses where the chain
/// ends; every ancestor above the stopping frame is retained.
pub(crate) fn extract_chain<'a>(frames: &'a [Frame], prefixes: &[String]) -> &'a [Frame] {
    if frames.is_empty() {
        return frames;
    }
    let stop = frames
        .iter()
        .rposition(|frame| matches_prefixes(&frame.module_path, prefixes))
        .unwrap_or(0);
    &frames[..=stop]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(module_path: &str) -> Frame {
        Frame {
            file: None,
            line: None,
            module_path: module_path.into(),
        }
    }

    fn modules(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.module_path.as_str()).collect()
    }

    fn prefixes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn stops_at_innermost_matching_frame() {
        let frames = [
            frame("app::main"),
            frame("app::worker::run"),
            frame("serde_json::de::from_str"),
            frame("std::sys::pal::unix"),
        ];
        let chain = extract_chain(&frames, &prefixes(&["app"]));
        assert_eq!(modules(chain), ["app::main", "app::worker::run"]);
    }

    #[test]
    fn falls_back_to_outermost_frame_without_a_match() {
        let frames = [
            frame("tokio::runtime::park"),
            frame("serde_json::de::from_str"),
        ];
        let chain = extract_chain(&frames, &prefixes(&["app"]));
        assert_eq!(modules(chain), ["tokio::runtime::park"]);
    }

    #[test]
    fn empty_prefix_set_matches_the_innermost_frame() {
        let frames = [frame("app::main"), frame("serde_json::de::from_str")];
        for degenerate in [prefixes(&[]), prefixes(&[""])] {
            let chain = extract_chain(&frames, &degenerate);
            assert_eq!(
                modules(chain),
                ["app::main", "serde_json::de::from_str"],
                "prefixes {degenerate:?} must match every frame"
            );
        }
    }

    #[test]
    fn later_prefixes_match_too() {
        let frames = [frame("app::main"), frame("jobs::dispatch")];
        let chain = extract_chain(&frames, &prefixes(&["app", "jobs"]));
        assert_eq!(modules(chain), ["app::main", "jobs::dispatch"]);
    }

    #[test]
    fn trims_dump_machinery_from_the_innermost_end() {
        let frames = [
            frame("app::main"),
            frame("__restore_rt"),
            frame("glance::platform::on_signal"),
            frame("backtrace::backtrace::trace"),
        ];
        let trimmed = trim_handler_noise(&frames);
        assert_eq!(modules(trimmed), ["app::main"]);
    }

    #[test]
    fn keeps_host_frames_below_noise_untouched() {
        let frames = [
            frame("app::main"),
            frame("glance_capture::platform"),
            frame("app::worker::run"),
        ];
        // Noise trimming only strips from the innermost end.
        let trimmed = trim_handler_noise(&frames);
        assert_eq!(
            modules(trimmed),
            ["app::main", "glance_capture::platform", "app::worker::run"]
        );
    }

    #[test]
    fn all_noise_trims_to_empty() {
        let frames = [frame("glance::dump"), frame("backtrace::trace")];
        assert!(trim_handler_noise(&frames).is_empty());
        assert!(extract_chain(&[], &prefixes(&[])).is_empty());
    }
}
