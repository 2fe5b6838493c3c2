use memmap::Mmap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to memory map file {path}: {source}")]
    Map { path: PathBuf, source: io::Error },
    #[error("file {0} is not valid utf-8")]
    Encoding(PathBuf),
}

/// Reads a whole source file through a memory map
pub fn read_source(path: &Path) -> Result<String, SourceError> {
    let open_error = |source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(open_error)?;
    // mapping an empty file fails on some platforms
    if file.metadata().map_err(open_error)?.len() == 0 {
        return Ok(String::new());
    }

    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| SourceError::Map {
        path: path.to_path_buf(),
        source,
    })?;
    std::str::from_utf8(&mmap)
        .map(str::to_string)
        .map_err(|_| SourceError::Encoding(path.to_path_buf()))
}
