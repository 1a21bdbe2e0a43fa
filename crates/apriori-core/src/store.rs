//! Artifact materialization: deterministic on-disk locations for go.mod
//! files and source archives.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while persisting artifacts.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to save go.mod to {path}: {source}")]
    GoMod {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to save source archive to {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Destination paths of one materialized pair.
#[derive(Debug, Clone)]
pub struct SavedArtifacts {
    pub gomod_path: PathBuf,
    pub archive_path: PathBuf,
}

/// Writes per-version artifacts under two root directories.
///
/// Layout is deterministic: `<gomod_dir>/<module path>/<version>.mod` and
/// `<src_dir>/<module path>/<version>.zip`.
#[derive(Debug, Clone)]
pub struct Store {
    gomod_dir: PathBuf,
    src_dir: PathBuf,
}

impl Store {
    /// Create a store rooted at the two artifact directories.
    pub fn new(gomod_dir: impl Into<PathBuf>, src_dir: impl Into<PathBuf>) -> Self {
        Self {
            gomod_dir: gomod_dir.into(),
            src_dir: src_dir.into(),
        }
    }

    /// Destination of the go.mod file for `path@version`.
    #[must_use]
    pub fn gomod_path(&self, path: &str, version: &str) -> PathBuf {
        self.gomod_dir.join(path).join(format!("{version}.mod"))
    }

    /// Destination of the source archive for `path@version`.
    #[must_use]
    pub fn archive_path(&self, path: &str, version: &str) -> PathBuf {
        self.src_dir.join(path).join(format!("{version}.zip"))
    }

    /// Write both artifacts for `path@version`, creating parent directories
    /// as needed. The archive is stream-copied; the reader is consumed and
    /// dropped on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or either file
    /// cannot be written. Failures are fatal for the generation run.
    pub fn save(
        &self,
        path: &str,
        version: &str,
        gomod: &[u8],
        archive: impl Read,
    ) -> Result<SavedArtifacts, PersistError> {
        let gomod_path = self.gomod_path(path, version);
        write_full(&gomod_path, gomod).map_err(|source| PersistError::GoMod {
            path: gomod_path.clone(),
            source,
        })?;

        let archive_path = self.archive_path(path, version);
        copy_stream(&archive_path, archive).map_err(|source| PersistError::Archive {
            path: archive_path.clone(),
            source,
        })?;

        Ok(SavedArtifacts {
            gomod_path,
            archive_path,
        })
    }
}

fn ensure_parent(dest: &Path) -> io::Result<()> {
    match dest.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn write_full(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    ensure_parent(dest)?;
    let mut file = File::create(dest)?;
    file.write_all(bytes)?;
    Ok(())
}

fn copy_stream(dest: &Path, mut reader: impl Read) -> io::Result<()> {
    ensure_parent(dest)?;
    let mut file = File::create(dest)?;
    io::copy(&mut reader, &mut file)?;
    Ok(())
}
