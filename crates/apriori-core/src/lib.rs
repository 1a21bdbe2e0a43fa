//! Resolution and materialization pipeline for the apriori Go module proxy.
//!
//! This crate provides:
//! - Parsing of `module[@version]` input lines into resolution requests
//! - A minimal go.mod model for recursive dependency expansion
//! - The upstream registry abstraction and a goproxy-protocol client
//! - Version resolution ("latest" picks the semver maximum)
//! - Artifact materialization at deterministic on-disk locations
//! - The manifest mapping serialized for the serving side

mod generate;
mod gomod;
mod manifest;
mod registry;
mod request;
mod resolver;
mod source;
mod store;
mod version;

pub use generate::{FetchStage, GenerateError, Generator};
pub use gomod::{GoMod, GoModError, Replacement, Requirement};
pub use manifest::{ManifestError, Mapping, ModuleInfo};
pub use registry::{
    escape_path, unescape_path, GoProxyClient, ModuleHandle, Registry, RegistryError, RevInfo,
};
pub use request::{Request, RequestError, RequestResult};
pub use resolver::{Resolved, ResolveError, Resolver};
pub use source::SourceRequests;
pub use store::{PersistError, SavedArtifacts, Store};
pub use version::{Version, VersionError};
