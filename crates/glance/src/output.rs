//! Per-process output file management.

use std::error::Error;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The process's dump file: `<dir>/<pid>`, append-per-dump, deleted at
/// normal exit.
pub(crate) struct OutputFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl OutputFile {
    /// Create `dir` (idempotent) and open `<dir>/<pid>` read/write,
    /// truncating any leftover from an earlier process with the same pid.
    pub fn create(dir: &Path) -> Result<Self, OutputError> {
        fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
            dir: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(std::process::id().to_string());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| OutputError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush so external tails observe it without
    /// buffering delay.
    pub fn append_line(&self, line: &str) -> Result<(), OutputError> {
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{line}")
            .and_then(|()| file.flush())
            .map_err(|source| OutputError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Delete the output file, tolerating prior absence.
    pub fn remove(&self) -> Result<(), OutputError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OutputError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[derive(Debug)]
pub(crate) enum OutputError {
    CreateDir { dir: PathBuf, source: io::Error },
    Open { path: PathBuf, source: io::Error },
    Write { path: PathBuf, source: io::Error },
    Remove { path: PathBuf, source: io::Error },
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { dir, source } => {
                write!(
                    f,
                    "failed to create output directory {}: {source}",
                    dir.display()
                )
            }
            Self::Open { path, source } => {
                write!(f, "failed to open output file {}: {source}", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "failed to write to {}: {source}", path.display())
            }
            Self::Remove { path, source } => {
                write!(f, "failed to remove {}: {source}", path.display())
            }
        }
    }
}

impl Error for OutputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. }
            | Self::Open { source, .. }
            | Self::Write { source, .. }
            | Self::Remove { source, .. } => Some(source),
        }
    }
}
