use crate::{error::SchemaError, traits::SchemaLoader};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Loads schema files from a list of search roots.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    roots: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        FsLoader { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The name a file is known by in a session: its path relative to the
    /// first search root containing it, with `/` separators, or the path as
    /// given when no root contains it.
    pub fn identify(&self, path: &Path) -> String {
        for root in &self.roots {
            if let Some(relative) = relative_to(path, root) {
                return slash_path(&relative);
            }
        }
        slash_path(path)
    }

    /// Search roots first, then `name` as a direct path.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(name))
            .chain(std::iter::once(PathBuf::from(name)))
            .find(|candidate| candidate.is_file())
    }
}

impl SchemaLoader for FsLoader {
    fn load(&self, name: &str) -> Result<Option<String>, SchemaError> {
        let Some(path) = self.locate(name) else {
            return Ok(None);
        };
        debug!("loading {} from {}", name, path.display());
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| SchemaError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(root) {
        return Some(relative.to_path_buf());
    }
    let path = path.canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(Path::to_path_buf)
}

fn slash_path(path: &Path) -> String {
    let mut rooted = false;
    let parts = path
        .components()
        .filter_map(|c| match c {
            Component::RootDir => {
                rooted = true;
                None
            }
            Component::CurDir => None,
            other => Some(other.as_os_str().to_string_lossy().into_owned()),
        })
        .collect::<Vec<_>>()
        .join("/");
    if rooted {
        format!("/{}", parts)
    } else {
        parts
    }
}

/// Schema text held in memory, for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        self.files.insert(name.to_string(), text.to_string());
    }
}

impl SchemaLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<Option<String>, SchemaError> {
        Ok(self.files.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identify_relative_to_root() {
        let loader = FsLoader::new(vec![PathBuf::from("protos")]);
        assert_eq!(loader.identify(Path::new("protos/acme/billing.proto")), "acme/billing.proto");
        assert_eq!(loader.identify(Path::new("./other/x.proto")), "other/x.proto");
    }

    #[cfg(unix)]
    #[test]
    fn test_identify_absolute_outside_roots() {
        let loader = FsLoader::new(vec![PathBuf::from("protos")]);
        assert_eq!(loader.identify(Path::new("/abs/x.proto")), "/abs/x.proto");
        assert_eq!(loader.identify(Path::new("/abs/./y.proto")), "/abs/y.proto");
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with("a.proto", "syntax = \"proto3\";");
        assert_eq!(loader.load("a.proto").unwrap().as_deref(), Some("syntax = \"proto3\";"));
        assert_eq!(loader.load("b.proto").unwrap(), None);
    }
}
