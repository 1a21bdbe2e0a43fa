//! Minimal go.mod document parsing and dependency extraction.
//!
//! Covers the directives the pipeline cares about: `module`, `require`
//! (single and block form) and `replace` (single and block form). Directives
//! that carry no fetchable coordinates (`go`, `toolchain`, `exclude`,
//! `retract`) are recognized and skipped.

use thiserror::Error;

use crate::request::{Request, RequestResult};

/// Errors that can occur when parsing a go.mod document.
#[derive(Error, Debug)]
pub enum GoModError {
    #[error("{name}:{line}: {reason}")]
    Parse {
        name: String,
        line: usize,
        reason: String,
    },

    #[error("{name}: go.mod is not valid UTF-8")]
    Encoding { name: String },
}

/// A direct requirement: module path at an explicit version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
}

/// The target of a `replace` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Redirects to another module at a pinned version.
    Module { path: String, version: String },
    /// Redirects to a local directory; carries no fetchable coordinates.
    Directory { path: String },
}

/// A parsed go.mod document.
#[derive(Debug, Clone, Default)]
pub struct GoMod {
    /// The declaring module's path.
    pub module: String,
    /// Direct requirements.
    pub require: Vec<Requirement>,
    /// Replacement targets, in declaration order.
    pub replace: Vec<Replacement>,
}

/// Parser state for `(` ... `)` directive blocks.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Require,
    Replace,
    Ignored,
}

impl GoMod {
    /// Parse go.mod bytes. `name` labels parse errors (typically
    /// `module@version/go.mod`).
    ///
    /// # Errors
    ///
    /// Returns an error on malformed directives or non-UTF-8 input.
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self, GoModError> {
        let text = std::str::from_utf8(bytes).map_err(|_| GoModError::Encoding {
            name: name.to_string(),
        })?;

        let mut doc = Self::default();
        let mut block = Block::None;

        for (idx, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let fail = |reason: String| GoModError::Parse {
                name: name.to_string(),
                line: idx + 1,
                reason,
            };

            if block != Block::None {
                if line == ")" {
                    block = Block::None;
                    continue;
                }
                match block {
                    Block::Require => doc.require.push(parse_requirement(line).map_err(fail)?),
                    Block::Replace => doc.replace.push(parse_replacement(line).map_err(fail)?),
                    Block::Ignored => {}
                    Block::None => unreachable!(),
                }
                continue;
            }

            let (directive, rest) = match line.split_once(char::is_whitespace) {
                Some((d, r)) => (d, r.trim()),
                None => (line, ""),
            };
            match directive {
                "module" => {
                    if rest.is_empty() {
                        return Err(fail("module directive requires a path".to_string()));
                    }
                    doc.module = unquote(rest).to_string();
                }
                "require" => {
                    if rest == "(" {
                        block = Block::Require;
                    } else {
                        doc.require.push(parse_requirement(rest).map_err(fail)?);
                    }
                }
                "replace" => {
                    if rest == "(" {
                        block = Block::Replace;
                    } else {
                        doc.replace.push(parse_replacement(rest).map_err(fail)?);
                    }
                }
                "go" | "toolchain" => {}
                "exclude" | "retract" => {
                    if rest == "(" {
                        block = Block::Ignored;
                    }
                }
                other => {
                    return Err(fail(format!("unknown directive `{other}`")));
                }
            }
        }

        Ok(doc)
    }

    /// Produce a resolution request per requirement and per versioned
    /// replacement target. Directory replacements are skipped; they point at
    /// local paths with nothing to fetch. No dedup happens here.
    pub fn requests(&self) -> impl Iterator<Item = RequestResult> + '_ {
        let required = self.require.iter().map(|req| {
            Ok(Request::Module {
                path: req.path.clone(),
                version: req.version.clone(),
            })
        });
        let replaced = self.replace.iter().filter_map(|rep| match rep {
            Replacement::Module { path, version } => Some(Ok(Request::Module {
                path: path.clone(),
                version: version.clone(),
            })),
            Replacement::Directory { .. } => None,
        });
        required.chain(replaced)
    }
}

/// Strip a trailing `//` comment.
fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Strip surrounding double quotes, if any.
fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}

fn parse_requirement(entry: &str) -> Result<Requirement, String> {
    let mut fields = entry.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(path), Some(version), None) => Ok(Requirement {
            path: unquote(path).to_string(),
            version: version.to_string(),
        }),
        _ => Err(format!("malformed require entry `{entry}`")),
    }
}

fn parse_replacement(entry: &str) -> Result<Replacement, String> {
    let (_, target) = entry
        .split_once("=>")
        .ok_or_else(|| format!("malformed replace entry `{entry}`"))?;
    let mut fields = target.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(path), Some(version), None) => Ok(Replacement::Module {
            path: unquote(path).to_string(),
            version: version.to_string(),
        }),
        (Some(path), None, None) => Ok(Replacement::Directory {
            path: unquote(path).to_string(),
        }),
        _ => Err(format!("malformed replace entry `{entry}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
module example.com/app

go 1.21

require example.com/single v1.0.0

require (
    example.com/foo v1.2.3
    example.com/bar v0.1.0 // indirect
)

replace (
    example.com/foo => example.com/foo-fork v1.2.4
    example.com/local => ../local
)

exclude example.com/foo v1.2.2
"#;

    #[test]
    fn test_parse_full_document() {
        let doc = GoMod::parse("go.mod", SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc.module, "example.com/app");
        assert_eq!(doc.require.len(), 3);
        assert_eq!(doc.require[1].path, "example.com/foo");
        assert_eq!(doc.require[2].version, "v0.1.0");
        assert_eq!(doc.replace.len(), 2);
    }

    #[test]
    fn test_single_line_replace() {
        let doc = GoMod::parse(
            "go.mod",
            b"module m\nreplace a.com/x => b.com/y v2.0.0\n",
        )
        .unwrap();
        assert_eq!(
            doc.replace,
            vec![Replacement::Module {
                path: "b.com/y".to_string(),
                version: "v2.0.0".to_string(),
            }]
        );
    }

    #[test]
    fn test_requests_skip_directory_replacements() {
        let doc = GoMod::parse("go.mod", SAMPLE.as_bytes()).unwrap();
        let requests: Vec<_> = doc.requests().map(Result::unwrap).collect();
        assert_eq!(requests.len(), 4); // 3 requires + 1 versioned replace
        assert!(requests.iter().all(|r| matches!(r, Request::Module { .. })));
        assert!(requests
            .iter()
            .any(|r| r.path() == "example.com/foo-fork"));
        assert!(!requests.iter().any(|r| r.path() == "../local"));
    }

    #[test]
    fn test_malformed_require() {
        let err = GoMod::parse("go.mod", b"module m\nrequire onlypath\n").unwrap_err();
        assert!(err.to_string().contains("malformed require entry"));
    }

    #[test]
    fn test_unknown_directive() {
        let err = GoMod::parse("go.mod", b"frobnicate all\n").unwrap_err();
        assert!(err.to_string().contains("unknown directive"));
    }

    #[test]
    fn test_quoted_module_path() {
        let doc = GoMod::parse("go.mod", b"module \"example.com/q\"\n").unwrap();
        assert_eq!(doc.module, "example.com/q");
    }
}
