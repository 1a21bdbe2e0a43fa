//! Implementation of the `apriori serve` command.
//!
//! Answers the goproxy GET endpoints (`/{module}/@v/list`,
//! `@v/{version}.info`, `.mod`, `.zip` and `/{module}/@latest`) from a
//! previously generated apriori file, falling back to the upstream proxy for
//! pairs the file does not cover.

use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tracing::{info, warn};

use apriori_core::{
    unescape_path, GoProxyClient, Mapping, ModuleHandle, Registry, RegistryError, Request,
    Resolver, RevInfo, Version,
};

/// Options for serving a generated apriori file.
pub struct ServeOptions {
    /// Upstream goproxy used for modules absent from the apriori file.
    pub goproxy: String,
    /// Address to listen on.
    pub listen: String,
    /// Path to the apriori manifest document.
    pub apriori: PathBuf,
}

struct ProxyState {
    mapping: Mapping,
    registry: GoProxyClient,
}

/// Load the manifest and serve it until interrupted.
pub fn run(options: &ServeOptions) -> Result<()> {
    let file = File::open(&options.apriori)
        .with_context(|| format!("failed to open apriori file {}", options.apriori.display()))?;
    let mapping = Mapping::from_reader(file).context("failed to load apriori info")?;
    let registry = GoProxyClient::new(&options.goproxy)?;

    let addr: SocketAddr = options
        .listen
        .parse()
        .with_context(|| format!("invalid listen address `{}`", options.listen))?;
    let state = Arc::new(ProxyState { mapping, registry });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(state, addr))
}

async fn serve(state: Arc<ProxyState>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving apriori go modules proxy as http://{addr}");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("server stopped on signal");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(Arc::clone(&state), req));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        warn!("connection error: {e}");
                    }
                });
            }
        }
    }
}

async fn handle(
    state: Arc<ProxyState>,
    req: hyper::Request<Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let path = req.uri().path().to_string();
    let reply = tokio::task::spawn_blocking(move || respond(&state, &path)).await;
    let response = match reply {
        Ok(Ok(reply)) => build_response(StatusCode::OK, reply.content_type, reply.body),
        Ok(Err(failure)) => build_response(
            failure.status(),
            "text/plain; charset=utf-8",
            failure.to_string().into_bytes(),
        ),
        Err(join_err) => build_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain; charset=utf-8",
            join_err.to_string().into_bytes(),
        ),
    };
    Ok(response)
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(content_type),
    );
    response
}

struct Reply {
    content_type: &'static str,
    body: Vec<u8>,
}

#[derive(Error, Debug)]
enum Failure {
    #[error("not found")]
    NotFound,

    #[error("bad request")]
    BadRequest,

    #[error("upstream error: {0}")]
    Upstream(RegistryError),

    #[error("local artifact unreadable: {0}")]
    Local(std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(serde_json::Error),
}

impl Failure {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Local(_) | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What a proxy URL asks for.
enum Query {
    List,
    Latest,
    Info(String),
    GoMod(String),
    Zip(String),
}

fn parse_proxy_path(path: &str) -> Option<(String, Query)> {
    let path = path.strip_prefix('/')?;
    if let Some(module) = path.strip_suffix("/@latest") {
        return Some((unescape_path(module)?, Query::Latest));
    }
    let (module, rest) = path.split_once("/@v/")?;
    let module = unescape_path(module)?;
    if rest == "list" {
        return Some((module, Query::List));
    }
    if let Some(version) = rest.strip_suffix(".info") {
        return Some((module, Query::Info(version.to_string())));
    }
    if let Some(version) = rest.strip_suffix(".mod") {
        return Some((module, Query::GoMod(version.to_string())));
    }
    if let Some(version) = rest.strip_suffix(".zip") {
        return Some((module, Query::Zip(version.to_string())));
    }
    None
}

fn respond(state: &ProxyState, path: &str) -> Result<Reply, Failure> {
    let (module, query) = parse_proxy_path(path).ok_or(Failure::BadRequest)?;
    match query {
        Query::List => list(state, &module),
        Query::Latest => latest(state, &module),
        Query::Info(version) => info_reply(state, &module, &version),
        Query::GoMod(version) => gomod_reply(state, &module, &version),
        Query::Zip(version) => zip_reply(state, &module, &version),
    }
}

fn list(state: &ProxyState, module: &str) -> Result<Reply, Failure> {
    let versions = match state.mapping.versions(module) {
        Some(versions) => versions.into_iter().map(str::to_string).collect::<Vec<_>>(),
        None => fallback(state, module)?.versions().map_err(upstream)?,
    };
    let mut body = versions.join("\n");
    body.push('\n');
    Ok(Reply {
        content_type: "text/plain; charset=utf-8",
        body: body.into_bytes(),
    })
}

fn latest(state: &ProxyState, module: &str) -> Result<Reply, Failure> {
    // Newest recorded version under semver ordering; fall back to asking
    // the upstream when the module is not in the apriori file.
    let recorded = state.mapping.versions(module).and_then(|versions| {
        versions
            .into_iter()
            .filter_map(|v| Version::parse(v).ok().map(|parsed| (parsed, v.to_string())))
            .max()
            .map(|(_, literal)| literal)
    });
    match recorded {
        Some(version) => info_reply(state, module, &version),
        None => {
            let mut resolver = Resolver::new(&state.registry);
            let resolved = resolver
                .resolve(&Request::Latest {
                    path: module.to_string(),
                })
                .map_err(|_| Failure::NotFound)?;
            let info = resolved.handle.stat(&resolved.version).map_err(upstream)?;
            json_reply(&info)
        }
    }
}

fn info_reply(state: &ProxyState, module: &str, version: &str) -> Result<Reply, Failure> {
    match state.mapping.get(module, version) {
        Some(entry) => json_reply(&entry.rev_info),
        None => {
            let info = fallback(state, module)?.stat(version).map_err(upstream)?;
            json_reply(&info)
        }
    }
}

fn gomod_reply(state: &ProxyState, module: &str, version: &str) -> Result<Reply, Failure> {
    let body = match state.mapping.get(module, version) {
        Some(entry) => std::fs::read(&entry.gomod_path).map_err(Failure::Local)?,
        None => fallback(state, module)?.go_mod(version).map_err(upstream)?,
    };
    Ok(Reply {
        content_type: "text/plain; charset=utf-8",
        body,
    })
}

fn zip_reply(state: &ProxyState, module: &str, version: &str) -> Result<Reply, Failure> {
    let body = match state.mapping.get(module, version) {
        Some(entry) => std::fs::read(&entry.archive_path).map_err(Failure::Local)?,
        None => {
            let mut archive = fallback(state, module)?.zip(version).map_err(upstream)?;
            let mut body = Vec::new();
            archive.read_to_end(&mut body).map_err(Failure::Local)?;
            body
        }
    };
    Ok(Reply {
        content_type: "application/zip",
        body,
    })
}

fn fallback(state: &ProxyState, module: &str) -> Result<Box<dyn ModuleHandle>, Failure> {
    warn!(module, "not in apriori info, falling back to upstream");
    state.registry.module(module).map_err(upstream)
}

fn json_reply(info: &RevInfo) -> Result<Reply, Failure> {
    Ok(Reply {
        content_type: "application/json",
        body: serde_json::to_vec(info).map_err(Failure::Encode)?,
    })
}

fn upstream(e: RegistryError) -> Failure {
    match e {
        RegistryError::NotFound { .. } | RegistryError::NoProvider { .. } => Failure::NotFound,
        other => Failure::Upstream(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let (module, query) = parse_proxy_path("/example.com/foo/@v/list").unwrap();
        assert_eq!(module, "example.com/foo");
        assert!(matches!(query, Query::List));
    }

    #[test]
    fn test_parse_latest() {
        let (module, query) = parse_proxy_path("/example.com/foo/@latest").unwrap();
        assert_eq!(module, "example.com/foo");
        assert!(matches!(query, Query::Latest));
    }

    #[test]
    fn test_parse_artifacts() {
        let (_, query) = parse_proxy_path("/example.com/foo/@v/v1.2.0.info").unwrap();
        assert!(matches!(query, Query::Info(v) if v == "v1.2.0"));
        let (_, query) = parse_proxy_path("/example.com/foo/@v/v1.2.0.mod").unwrap();
        assert!(matches!(query, Query::GoMod(v) if v == "v1.2.0"));
        let (_, query) = parse_proxy_path("/example.com/foo/@v/v1.2.0.zip").unwrap();
        assert!(matches!(query, Query::Zip(v) if v == "v1.2.0"));
    }

    #[test]
    fn test_parse_unescapes_module_path() {
        let (module, _) = parse_proxy_path("/github.com/!azure/thing/@v/list").unwrap();
        assert_eq!(module, "github.com/Azure/thing");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_proxy_path("/example.com/foo").is_none());
        assert!(parse_proxy_path("/example.com/foo/@v/v1.0.0.exe").is_none());
        assert!(parse_proxy_path("").is_none());
    }
}
