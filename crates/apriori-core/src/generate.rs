//! The recursive orchestrator: drives request streams to completion against
//! one shared manifest mapping.
//!
//! Processing is strictly sequential; at most one resolution and one
//! materialization is in flight at any time. Recursion is depth-first: a
//! module's full transitive closure is resolved before its siblings. Cycles
//! terminate only because an already-recorded pair is never re-expanded.

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::gomod::{GoMod, GoModError};
use crate::manifest::{Mapping, ModuleInfo};
use crate::registry::{Registry, RegistryError};
use crate::request::{RequestError, RequestResult};
use crate::resolver::{Resolved, ResolveError, Resolver};
use crate::store::{PersistError, Store};

/// Which artifact fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Revision descriptor (`.info`).
    Stat,
    /// Dependency-declaration bytes (`.mod`).
    GoMod,
    /// Source archive stream (`.zip`).
    Archive,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stat => write!(f, "revision info"),
            Self::GoMod => write!(f, "go.mod"),
            Self::Archive => write!(f, "source archive"),
        }
    }
}

/// Errors that abort a generation run.
///
/// There is no partial-success mode: the first error stops the walk and no
/// manifest document is written. Artifacts persisted before the failure are
/// left in place; they are addressed by version and harmless orphans.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The input stream produced a terminal parse error.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A request could not be pinned to concrete coordinates.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// An artifact fetch failed after coordinates were fixed.
    #[error("failed to get {stage} for {path}@{version}: {source}")]
    Fetch {
        stage: FetchStage,
        path: String,
        version: String,
        #[source]
        source: RegistryError,
    },

    /// Writing artifacts to disk failed.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// A fetched go.mod could not be parsed for recursive expansion.
    #[error("failed to parse dependencies: {0}")]
    GoMod(#[from] GoModError),
}

/// Drives request streams through resolution, materialization and manifest
/// accumulation, recursing into dependency files when enabled.
pub struct Generator<'a> {
    registry: &'a dyn Registry,
    store: &'a Store,
    recursive: bool,
}

impl<'a> Generator<'a> {
    pub fn new(registry: &'a dyn Registry, store: &'a Store, recursive: bool) -> Self {
        Self {
            registry,
            store,
            recursive,
        }
    }

    /// Run one generation pass over `stream`, accumulating into `mapping`.
    ///
    /// The mapping is only valid for serialization if this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Any stream, resolution, fetch or persistence failure aborts the run.
    pub fn run(
        &self,
        stream: impl IntoIterator<Item = RequestResult>,
        mapping: &mut Mapping,
    ) -> Result<(), GenerateError> {
        let mut resolver = Resolver::new(self.registry);
        self.drive(&mut resolver, stream, mapping)
    }

    fn drive(
        &self,
        resolver: &mut Resolver<'_>,
        stream: impl IntoIterator<Item = RequestResult>,
        mapping: &mut Mapping,
    ) -> Result<(), GenerateError> {
        for item in stream {
            let request = item?;
            let Resolved {
                path,
                version,
                handle,
            } = resolver.resolve(&request)?;

            // Dedup before any fetch: sibling and descendant resolutions
            // share this mapping, so a pair seen anywhere in the walk is
            // never refetched.
            if mapping.has(&path, &version) {
                continue;
            }

            let fetch = |stage: FetchStage, source: RegistryError| GenerateError::Fetch {
                stage,
                path: path.clone(),
                version: version.clone(),
                source,
            };
            let rev_info = handle
                .stat(&version)
                .map_err(|e| fetch(FetchStage::Stat, e))?;
            let gomod_bytes = handle
                .go_mod(&version)
                .map_err(|e| fetch(FetchStage::GoMod, e))?;
            let archive = handle
                .zip(&version)
                .map_err(|e| fetch(FetchStage::Archive, e))?;

            let saved = self.store.save(&path, &version, &gomod_bytes, archive)?;
            mapping.record(
                &path,
                &version,
                ModuleInfo {
                    rev_info,
                    gomod_path: saved.gomod_path,
                    archive_path: saved.archive_path,
                },
            );
            info!(module = %path, version = %version, "done");

            if self.recursive {
                let doc = GoMod::parse(&format!("{path}@{version}/go.mod"), &gomod_bytes)?;
                self.drive(resolver, doc.requests(), mapping)?;
            }
        }
        Ok(())
    }
}
