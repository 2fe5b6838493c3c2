use crate::source::{read_source, SourceError};
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no source named {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Supplies the text of an included source by name. Resolution may be asynchronous, e.g. a
/// fetch in the browser.
pub trait SourceResolver {
    fn resolve<'a>(&'a mut self, name: &'a str) -> LocalBoxFuture<'a, Result<String, ResolveError>>;
}

/// Rejects every include that is not a built-in library
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIncludes;

impl SourceResolver for NoIncludes {
    fn resolve<'a>(&'a mut self, name: &'a str) -> LocalBoxFuture<'a, Result<String, ResolveError>> {
        future::ready(Err(ResolveError::NotFound(name.to_string()))).boxed_local()
    }
}

impl SourceResolver for HashMap<String, String> {
    fn resolve<'a>(&'a mut self, name: &'a str) -> LocalBoxFuture<'a, Result<String, ResolveError>> {
        let text = self
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.to_string()));
        future::ready(text).boxed_local()
    }
}

/// Resolves names as paths relative to a directory, trying `name` and then `name.wsa`
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
}

impl FileResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> FileResolver {
        FileResolver { root: root.into() }
    }
}

impl SourceResolver for FileResolver {
    fn resolve<'a>(&'a mut self, name: &'a str) -> LocalBoxFuture<'a, Result<String, ResolveError>> {
        let exact = self.root.join(name);
        let path = if exact.is_file() {
            exact
        } else {
            self.root.join(format!("{}.wsa", name))
        };
        future::ready(read_source(&path).map_err(ResolveError::from)).boxed_local()
    }
}
