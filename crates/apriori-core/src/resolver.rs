//! Turning requests into concrete (module, version) coordinates.

use std::collections::HashMap;

use thiserror::Error;

use crate::registry::{ModuleHandle, Registry, RegistryError};
use crate::request::Request;
use crate::version::Version;

/// Errors that can occur while resolving a request.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The registry cannot satisfy the requested module path.
    #[error("failed to resolve module {path}: {source}")]
    Resolution {
        path: String,
        #[source]
        source: RegistryError,
    },

    /// The registry listed a version that is not valid semver.
    #[error("invalid semver value {literal} listed for module {path}")]
    InvalidVersion { path: String, literal: String },

    /// The registry knows the module but lists no versions at all.
    #[error("no versions available for module {path}")]
    NoVersions { path: String },
}

/// A request pinned to concrete coordinates, with the handle to fetch from.
pub struct Resolved {
    pub path: String,
    pub version: String,
    pub handle: Box<dyn ModuleHandle>,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("path", &self.path)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Resolves requests against one registry.
///
/// "Latest" answers are cached per run: once a newest version has been
/// chosen for a path, later `Latest` requests for the same path reuse it
/// instead of re-listing.
pub struct Resolver<'r> {
    registry: &'r dyn Registry,
    latest: HashMap<String, String>,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r dyn Registry) -> Self {
        Self {
            registry,
            latest: HashMap::new(),
        }
    }

    /// Resolve `request` to a module handle and a concrete version.
    ///
    /// # Errors
    ///
    /// Returns an error when no provider serves the path, when a `Latest`
    /// request meets an empty or invalid version list, or when listing
    /// versions fails.
    pub fn resolve(&mut self, request: &Request) -> Result<Resolved, ResolveError> {
        let path = request.path();
        let handle = self
            .registry
            .module(path)
            .map_err(|source| ResolveError::Resolution {
                path: path.to_string(),
                source,
            })?;

        let version = match request {
            Request::Module { version, .. } => version.clone(),
            Request::Latest { path } => match self.latest.get(path) {
                Some(cached) => cached.clone(),
                None => {
                    let chosen = newest_version(path, handle.as_ref())?;
                    self.latest.insert(path.clone(), chosen.clone());
                    chosen
                }
            },
        };

        Ok(Resolved {
            path: path.to_string(),
            version,
            handle,
        })
    }
}

/// List all versions and pick the maximum under semver ordering.
fn newest_version(path: &str, handle: &dyn ModuleHandle) -> Result<String, ResolveError> {
    let listed = handle
        .versions()
        .map_err(|source| ResolveError::Resolution {
            path: path.to_string(),
            source,
        })?;

    let mut newest: Option<(Version, String)> = None;
    for literal in listed {
        let parsed = Version::parse(&literal).map_err(|_| ResolveError::InvalidVersion {
            path: path.to_string(),
            literal: literal.clone(),
        })?;
        if newest.as_ref().map_or(true, |(best, _)| parsed > *best) {
            newest = Some((parsed, literal));
        }
    }
    newest
        .map(|(_, literal)| literal)
        .ok_or_else(|| ResolveError::NoVersions {
            path: path.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::registry::RevInfo;

    struct StubHandle {
        versions: Vec<String>,
        list_calls: Arc<AtomicUsize>,
    }

    impl ModuleHandle for StubHandle {
        fn versions(&self) -> Result<Vec<String>, RegistryError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.versions.clone())
        }

        fn stat(&self, version: &str) -> Result<RevInfo, RegistryError> {
            Ok(RevInfo {
                version: version.to_string(),
                time: "2024-03-01T12:00:00Z".parse().unwrap(),
            })
        }

        fn go_mod(&self, _version: &str) -> Result<Vec<u8>, RegistryError> {
            Ok(b"module stub\n".to_vec())
        }

        fn zip(&self, _version: &str) -> Result<Box<dyn Read + Send>, RegistryError> {
            Ok(Box::new(std::io::Cursor::new(Vec::new())))
        }
    }

    struct StubRegistry {
        versions: Vec<String>,
        list_calls: Arc<AtomicUsize>,
    }

    impl Registry for StubRegistry {
        fn module(&self, path: &str) -> Result<Box<dyn ModuleHandle>, RegistryError> {
            if path == "missing.example/mod" {
                return Err(RegistryError::NoProvider {
                    path: path.to_string(),
                });
            }
            Ok(Box::new(StubHandle {
                versions: self.versions.clone(),
                list_calls: Arc::clone(&self.list_calls),
            }))
        }
    }

    fn stub(versions: &[&str]) -> StubRegistry {
        StubRegistry {
            versions: versions.iter().map(|v| (*v).to_string()).collect(),
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn test_exact_request_passes_through() {
        let registry = stub(&[]);
        let mut resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve(&Request::Module {
                path: "example.com/foo".to_string(),
                version: "v1.2.0".to_string(),
            })
            .unwrap();
        assert_eq!(resolved.version, "v1.2.0");
        assert_eq!(registry.list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_latest_picks_semver_maximum() {
        let registry = stub(&["v1.9.0", "v1.10.0", "v0.3.0"]);
        let mut resolver = Resolver::new(&registry);
        let resolved = resolver
            .resolve(&Request::Latest {
                path: "example.com/foo".to_string(),
            })
            .unwrap();
        // Lexicographically "v1.9.0" would win; semver says v1.10.0 is newer.
        assert_eq!(resolved.version, "v1.10.0");
    }

    #[test]
    fn test_latest_cached_per_run() {
        let registry = stub(&["v1.0.0"]);
        let mut resolver = Resolver::new(&registry);
        let latest = Request::Latest {
            path: "example.com/foo".to_string(),
        };
        resolver.resolve(&latest).unwrap();
        resolver.resolve(&latest).unwrap();
        assert_eq!(registry.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_latest_empty_version_list_fails() {
        let registry = stub(&[]);
        let mut resolver = Resolver::new(&registry);
        let err = resolver
            .resolve(&Request::Latest {
                path: "example.com/foo".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoVersions { .. }));
    }

    #[test]
    fn test_latest_invalid_listed_version_fails() {
        let registry = stub(&["v1.0.0", "not-a-version"]);
        let mut resolver = Resolver::new(&registry);
        let err = resolver
            .resolve(&Request::Latest {
                path: "example.com/foo".to_string(),
            })
            .unwrap_err();
        match err {
            ResolveError::InvalidVersion { literal, .. } => {
                assert_eq!(literal, "not-a-version");
            }
            other => panic!("expected InvalidVersion, got {other}"),
        }
    }

    #[test]
    fn test_unknown_module_fails_resolution() {
        let registry = stub(&[]);
        let mut resolver = Resolver::new(&registry);
        let err = resolver
            .resolve(&Request::Latest {
                path: "missing.example/mod".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ResolveError::Resolution { .. }));
    }
}
