//! Implementation of the `apriori generate` command.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use apriori_core::{Generator, GoProxyClient, Mapping, SourceRequests, Store};
use tracing::info;

/// Options for generating apriori data.
pub struct GenerateOptions {
    /// Upstream goproxy URL.
    pub goproxy: String,
    /// Modules list file; `None` reads stdin.
    pub source: Option<PathBuf>,
    /// Destination file for the manifest; `None` writes stdout.
    pub dest: Option<PathBuf>,
    /// Directory for go.mod files.
    pub gomod_dir: PathBuf,
    /// Directory for source archives.
    pub source_dir: PathBuf,
    /// Whether to download dependencies transitively.
    pub recursive: bool,
}

/// Run the generation pipeline and write the manifest document.
///
/// The manifest is only written when the whole run succeeds; a failed run
/// leaves the destination untouched.
pub fn run(options: &GenerateOptions) -> Result<()> {
    check_dir("invalid go modules directory (--gomod-dir)", &options.gomod_dir)?;
    check_dir("invalid source directory (--source-dir)", &options.source_dir)?;

    let (label, reader): (String, Box<dyn BufRead>) = match &options.source {
        None => ("stdin".to_string(), Box::new(BufReader::new(io::stdin()))),
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open source {}", path.display()))?;
            (path.display().to_string(), Box::new(BufReader::new(file)))
        }
    };

    let registry = GoProxyClient::new(&options.goproxy)?;
    let store = Store::new(&options.gomod_dir, &options.source_dir);
    let generator = Generator::new(&registry, &store, options.recursive);

    let mut mapping = Mapping::new();
    generator
        .run(SourceRequests::new(label, reader), &mut mapping)
        .context("failed to generate apriori info")?;

    let document = mapping.to_json()?;
    match &options.dest {
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("failed to save apriori info to {}", path.display()))?;
        }
    }
    info!(modules = mapping.len(), "apriori generation done");
    Ok(())
}

/// Require that `path` exists and is a directory.
fn check_dir(error_prefix: &str, path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            bail!("{error_prefix}: directory `{}` does not exist", path.display())
        }
        Err(e) => bail!("{error_prefix}: cannot access `{}`: {e}", path.display()),
        Ok(meta) if !meta.is_dir() => {
            bail!("{error_prefix}: `{}` is not a directory", path.display())
        }
        Ok(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dir_accepts_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_dir("invalid dir", dir.path()).is_ok());
    }

    #[test]
    fn test_check_dir_rejects_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_dir("invalid dir", &dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_check_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        let err = check_dir("invalid dir", &file).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }
}
