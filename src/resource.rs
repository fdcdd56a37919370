//! Texture resource identifiers and byte-stream resolution.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

/// A texture resource identifier, either `path/to/file.png` or
/// `namespace:path/to/file.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(namespace, path)`; the namespace is empty when absent.
    pub fn split(&self) -> (&str, &str) {
        match self.0.split_once(':') {
            Some((ns, path)) => (ns, path),
            None => ("", &self.0),
        }
    }

    /// Insert `prefix` as a directory in front of the file name.
    ///
    /// `models/loco/body.png` with prefix `red` becomes
    /// `models/loco/red/body.png`.
    pub fn with_prefix(&self, prefix: &str) -> Identifier {
        if prefix.is_empty() {
            return self.clone();
        }
        let split = self.0.rfind(['/', ':']).map(|i| i + 1).unwrap_or(0);
        let (dir, file) = self.0.split_at(split);
        Identifier(format!("{dir}{prefix}/{file}"))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier(s)
    }
}

/// Failure to open a resource.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("resource not found: {0}")]
    NotFound(Identifier),
    #[error("failed to read {id}: {source}")]
    Io {
        id: Identifier,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }
}

/// Supplies raw texture bytes for identifiers.
pub trait ResourceResolver {
    fn open(&self, id: &Identifier) -> Result<Box<dyn Read + '_>, ResolveError>;
}

/// Resolves identifiers against a directory on disk.
///
/// A namespace, when present, is treated as a subdirectory of the root.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &Identifier) -> PathBuf {
        let (ns, path) = id.split();
        let mut full = self.root.clone();
        if !ns.is_empty() {
            full.push(ns);
        }
        full.push(path);
        full
    }
}

impl ResourceResolver for DirectoryResolver {
    fn open(&self, id: &Identifier) -> Result<Box<dyn Read + '_>, ResolveError> {
        let path = self.path_of(id);
        debug!(id = %id, path = %path.display(), "Opening resource");
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ResolveError::NotFound(id.clone())),
            Err(source) => Err(ResolveError::Io {
                id: id.clone(),
                source,
            }),
        }
    }
}

/// In-memory resolver, for hosts that ship textures inside an archive.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    entries: HashMap<Identifier, Vec<u8>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<Identifier>, bytes: Vec<u8>) {
        self.entries.insert(id.into(), bytes);
    }
}

impl ResourceResolver for MemoryResolver {
    fn open(&self, id: &Identifier) -> Result<Box<dyn Read + '_>, ResolveError> {
        self.entries
            .get(id)
            .map(|bytes| Box::new(Cursor::new(bytes.as_slice())) as Box<dyn Read + '_>)
            .ok_or_else(|| ResolveError::NotFound(id.clone()))
    }
}
