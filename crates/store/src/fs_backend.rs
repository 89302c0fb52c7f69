use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{SlotBackend, StoreResult};

/// One file per name inside a single directory.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl SlotBackend for FsBackend {
    fn get(&self, name: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, name: &str, contents: &str) -> StoreResult<()> {
        fs::write(self.path(name), contents)?;
        debug!(name, bytes = contents.len(), "wrote slot file");
        Ok(())
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.path(name).try_exists()?)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        fs::rename(self.path(from), self.path(to))?;
        debug!(from, to, "renamed slot file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("nope.json").unwrap(), None);
        assert!(!backend.exists("nope.json").unwrap());
    }

    #[test]
    fn put_list_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path().join("markers")).unwrap();
        backend.put("a-markers.json", "{}").unwrap();
        backend.put("b-markers.json", "[]").unwrap();
        fs::create_dir(backend.root().join("a-markers-dir")).unwrap();

        assert_eq!(backend.list("a-").unwrap(), vec!["a-markers.json".to_string()]);

        backend.rename("a-markers.json", "a-markers01.json").unwrap();
        assert_eq!(backend.get("a-markers01.json").unwrap().as_deref(), Some("{}"));
        assert!(!backend.exists("a-markers.json").unwrap());
        assert!(backend.rename("a-markers.json", "a-markers02.json").is_err());
    }
}
