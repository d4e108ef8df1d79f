//! Source-line loading and speculative statement consolidation.
//!
//! Stack frames frequently point at the first physical line of a statement
//! that spans several lines (a long argument list, a chained call). Rendered
//! alone, that line is a meaningless fragment. [`consolidate`] instead grows
//! a window of physical lines until the accumulated text parses as one
//! syntactically complete statement, using a throwaway tree-sitter parse as
//! the validity test.
//!
//! Lines come from a process-lifetime [`LineCache`]: each file is read and
//! split once, and the cached content is never invalidated even if the file
//! changes on disk afterwards. A stale read beats re-reading the file on
//! every dump.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arborium::tree_sitter;

/// Returned by [`consolidate`] when the source text cannot be produced at
/// all (unreadable file, line number out of range).
pub const SOURCE_UNAVAILABLE: &str = "<source unavailable>";

type Loader = Box<dyn Fn(&Path) -> io::Result<String> + Send + Sync>;

/// Memoized per-file store of trimmed physical source lines.
pub struct LineCache {
    loader: Loader,
    files: Mutex<HashMap<PathBuf, Arc<[String]>>>,
}

impl LineCache {
    pub fn new() -> Self {
        Self::with_loader(Box::new(|path| fs::read_to_string(path)))
    }

    /// Build a cache around a custom loader. Tests use this seam to count
    /// reads and inject failures; it also serves deployments whose source
    /// lives somewhere other than the local filesystem.
    pub fn with_loader(loader: Loader) -> Self {
        Self {
            loader,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// The file's physical lines, each trimmed of surrounding whitespace.
    ///
    /// The first call for a path reads and splits the file; later calls
    /// return the memoized result without touching storage. Read failures
    /// are returned to the caller and NOT cached, so a transient failure
    /// does not poison the path for the rest of the process.
    pub fn lines(&self, path: &Path) -> Result<Arc<[String]>, SourceError> {
        if let Some(cached) = self.files.lock().unwrap().get(path) {
            return Ok(cached.clone());
        }
        let content = (self.loader)(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let lines: Arc<[String]> = content.lines().map(|line| line.trim().to_owned()).collect();
        Ok(self
            .files
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_insert(lines)
            .clone())
    }
}

impl Default for LineCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub enum SourceError {
    Read { path: PathBuf, source: io::Error },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read source file {}: {source}", path.display())
            }
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
        }
    }
}

/// Decides whether a piece of text forms one syntactically complete
/// statement on its own. Swappable per deployment: the consolidation
/// algorithm is language-agnostic, only the oracle knows the grammar.
pub trait CompletenessOracle {
    fn is_complete(&self, text: &str) -> bool;
}

/// [`CompletenessOracle`] backed by a throwaway tree-sitter parse of the
/// candidate text, for any language arborium knows.
pub struct SyntaxOracle {
    lang_name: &'static str,
}

impl SyntaxOracle {
    pub fn new(lang_name: &'static str) -> Self {
        Self { lang_name }
    }

    pub fn rust() -> Self {
        Self::new("rust")
    }
}

impl CompletenessOracle for SyntaxOracle {
    fn is_complete(&self, text: &str) -> bool {
        let Some(ts_lang) = arborium::get_language(self.lang_name) else {
            return false;
        };
        let mut parser = tree_sitter::Parser::new();
        if parser.set_language(&ts_lang).is_err() {
            return false;
        }
        let wrapped = wrap_as_statement_body(self.lang_name, text);
        match parser.parse(wrapped.as_bytes(), None) {
            Some(tree) => !tree.root_node().has_error(),
            None => false,
        }
    }
}

/// Embed candidate text in a minimal enclosing context so bare statements
/// and expressions parse in isolation. For Rust that context is the body of
/// an empty async fn, which admits expressions, `let` bindings, `.await`,
/// and nested items alike. The parse is purely a validity probe; the tree
/// is discarded.
fn wrap_as_statement_body(lang_name: &str, text: &str) -> String {
    match lang_name {
        "rust" => format!("async fn __probe() {{ {text} }}"),
        _ => text.to_owned(),
    }
}

/// Render the logical source statement that starts at `line_number`
/// (1-based) in `file`.
///
/// Physical lines are appended one at a time, trailing line comments
/// stripped, until `oracle` accepts the accumulated text as a complete
/// statement. Growth is bounded only by file length; when the file is
/// exhausted without a successful parse, the single original line is
/// returned unmodified. Any failure to produce text at all yields
/// [`SOURCE_UNAVAILABLE`] instead of propagating.
pub fn consolidate(
    cache: &LineCache,
    oracle: &dyn CompletenessOracle,
    file: &Path,
    line_number: u32,
) -> String {
    match try_consolidate(cache, oracle, file, line_number) {
        Some(text) => text,
        None => SOURCE_UNAVAILABLE.to_owned(),
    }
}

fn try_consolidate(
    cache: &LineCache,
    oracle: &dyn CompletenessOracle,
    file: &Path,
    line_number: u32,
) -> Option<String> {
    let lines = cache.lines(file).ok()?;
    let original_index = (line_number as usize).checked_sub(1)?;
    let original = lines.get(original_index)?;

    let mut text = original.clone();
    let mut index = original_index;
    while !oracle.is_complete(&text) {
        index += 1;
        let Some(next) = lines.get(index) else {
            // File exhausted without a complete parse: best-effort
            // fallback, not an error.
            return Some(original.clone());
        };
        let appended = strip_line_comment(next).trim();
        if appended.is_empty() {
            continue;
        }
        text.push(' ');
        text.push_str(appended);
    }
    Some(text)
}

/// Naive end-of-line comment strip: splits on the first `//`, which also
/// splits a `//` inside a string literal. Known limitation, kept as-is.
fn strip_line_comment(line: &str) -> &str {
    match line.split_once("//") {
        Some((code, _)) => code,
        None => line,
    }
}
