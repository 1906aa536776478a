use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{ARTIFACT_EXTENSION, ARTIFACT_PREFIX};

/// How many generated audio files survive in the static directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    KeepAll,
    KeepLatest(usize),
}

impl RetentionPolicy {
    /// `0` means no limit.
    pub fn keep_latest(max_files: usize) -> Self {
        match max_files {
            0 => RetentionPolicy::KeepAll,
            n => RetentionPolicy::KeepLatest(n),
        }
    }

    /// Deletes the oldest generated artifacts in `dir` beyond the limit.
    /// `just_written` is never deleted. Returns how many files were removed.
    pub fn prune(&self, dir: &Path, just_written: &str) -> io::Result<usize> {
        let max_files = match *self {
            RetentionPolicy::KeepAll => return Ok(0),
            RetentionPolicy::KeepLatest(n) => n,
        };

        let mut others: Vec<(SystemTime, String, PathBuf)> = Vec::new();
        let mut includes_just_written = false;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_artifact(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            if name == just_written {
                includes_just_written = true;
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            others.push((modified, name, entry.path()));
        }

        let allowed = if includes_just_written {
            max_files.saturating_sub(1)
        } else {
            max_files
        };
        if others.len() <= allowed {
            return Ok(0);
        }

        // newest first
        others.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        let mut removed = 0;
        for (_, name, path) in others.into_iter().skip(allowed) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed expired audio artifact {}", name);
                    removed += 1;
                }
                Err(e) => tracing::warn!("Could not remove audio artifact {}: {}", name, e),
            }
        }

        Ok(removed)
    }
}

fn is_artifact(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_EXTENSION)
}
