use std::{
    collections::HashMap,
    fs::File,
    io,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use crossbeam::sync::ShardedLock;
use memmap2::Mmap;
use url::Url;

/// Errors raised while loading tiles and the buffers they refer to.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("expected file, found directory: {0:?}")]
    IsADirectory(PathBuf),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("expected local file path; instead, found: {0:?}")]
    UnsupportedUriScheme(String),
    #[error("not an absolute file path: {0:?}")]
    NotAFilePath(String),
    #[error("buffer cache lock poisoned")]
    Poisoned,
}

/// A read-only memory map of a whole file.
#[derive(Debug)]
pub struct BufferFile {
    data: Mmap,
}

impl BufferFile {
    #[allow(unsafe_code)]
    pub fn new(path: impl AsRef<Path>) -> Result<Self, BufferError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(BufferError::IsADirectory(path.to_owned()));
        }
        tracing::trace!(path = ?path, "memory-mapping file");
        let file = File::options().read(true).write(false).open(path)?;
        // the mapping stays valid after `file` is closed
        Ok(Self {
            data: unsafe { Mmap::map(&file)? },
        })
    }
}

impl Deref for BufferFile {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// External glTF buffers, shared between every tile of a run.
///
/// Tiles of one tileset frequently refer to the same `.bin` files, so each file is mapped once.
#[derive(Debug, Default)]
pub struct BufferCache {
    data: ShardedLock<HashMap<Url, Arc<BufferFile>>>,
}

impl BufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `uri` against the location of the document at `doc_path`, and map the file it
    /// names.
    #[tracing::instrument(skip(self), fields(doc = ?doc_path))]
    pub fn load(&self, doc_path: &Path, uri: &str) -> Result<Arc<BufferFile>, BufferError> {
        let base = doc_path.canonicalize()?;
        let base = Url::from_file_path(&base)
            .map_err(|_| BufferError::NotAFilePath(base.display().to_string()))?;
        let url = Url::options().base_url(Some(&base)).parse(uri)?;
        if url.scheme() != "file" {
            return Err(BufferError::UnsupportedUriScheme(url.scheme().to_owned()));
        }

        if let Some(data) = self
            .data
            .read()
            .map_err(|_| BufferError::Poisoned)?
            .get(&url)
            .cloned()
        {
            tracing::trace!(url = url.as_str(), "already loaded glTF buffer");
            return Ok(data);
        }

        tracing::debug!(url = url.as_str(), "loading glTF buffer");
        let path = url
            .to_file_path()
            .map_err(|_| BufferError::NotAFilePath(url.to_string()))?;
        let data = Arc::new(BufferFile::new(path)?);
        // another thread may have won the race; either mapping is fine
        self.data
            .write()
            .map_err(|_| BufferError::Poisoned)?
            .entry(url)
            .or_insert_with(|| data.clone());
        Ok(data)
    }
}
