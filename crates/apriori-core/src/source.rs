//! Line-oriented request source.
//!
//! Each non-empty input line is either `module` (resolve latest) or
//! `module@version` (exact coordinates). Empty lines are skipped but still
//! counted for error positions.

use std::io::BufRead;

use crate::request::{Request, RequestError, RequestResult};
use crate::version::Version;

/// Lazy iterator of resolution requests over a line-oriented reader.
///
/// The stream ends immediately after the first error item: a malformed
/// version aborts the scan, remaining input is never read.
pub struct SourceRequests<R> {
    label: String,
    reader: R,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> SourceRequests<R> {
    /// Create a request stream over `reader`, using `label` (typically the
    /// file name) in error messages.
    pub fn new(label: impl Into<String>, reader: R) -> Self {
        Self {
            label: label.into(),
            reader,
            line_no: 0,
            done: false,
        }
    }

    fn parse_line(&self, line: &str) -> RequestResult {
        match line.find('@') {
            None => Ok(Request::Latest {
                path: line.to_string(),
            }),
            Some(pos) => {
                let literal = &line[pos + 1..];
                if Version::is_valid(literal) {
                    Ok(Request::Module {
                        path: line[..pos].to_string(),
                        version: literal.to_string(),
                    })
                } else {
                    Err(RequestError::InvalidSemver {
                        label: self.label.clone(),
                        line: self.line_no,
                        literal: literal.to_string(),
                    })
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for SourceRequests<R> {
    type Item = RequestResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(source) => {
                    self.done = true;
                    return Some(Err(RequestError::Io {
                        label: self.label.clone(),
                        source,
                    }));
                }
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                self.line_no += 1;
                continue;
            }
            let item = self.parse_line(trimmed);
            self.line_no += 1;
            if item.is_err() {
                self.done = true;
            }
            return Some(item);
        }
    }
}
