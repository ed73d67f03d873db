//! File-backed [`AddressCache`].
//!
//! The file holds one IP address followed by a newline. Writes go to a
//! temporary file in the same directory which is then renamed over the old
//! one, so a reader in another process sees either the old or the new address
//! and never a partial write.

use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::application::select_server::{AddressCache, CacheError};

/// Address cache stored at a fixed path.
#[derive(Debug, Clone)]
pub struct FileAddressCache {
    path: PathBuf,
}

impl FileAddressCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AddressCache for FileAddressCache {
    fn save(&self, address: IpAddr) -> Result<(), CacheError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        writeln!(tmp, "{address}").map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<IpAddr>, CacheError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some).map_err(|_| CacheError::Parse {
            path: self.path.clone(),
            content: trimmed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileAddressCache::new(dir.path().join("cache.txt"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_returns_address() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = FileAddressCache::new(dir.path().join("nested").join("cache.txt"));
        let address: IpAddr = "192.168.1.20".parse().unwrap();

        // Act
        cache.save(address).unwrap();

        // Assert
        assert_eq!(cache.load().unwrap(), Some(address));
        let raw = std::fs::read_to_string(cache.path()).unwrap();
        assert_eq!(raw, "192.168.1.20\n");
    }

    #[test]
    fn test_save_replaces_previous_address() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileAddressCache::new(dir.path().join("cache.txt"));
        cache.save("10.0.0.1".parse().unwrap()).unwrap();
        cache.save("fe80::1".parse().unwrap()).unwrap();
        assert_eq!(cache.load().unwrap(), Some("fe80::1".parse().unwrap()));
    }

    #[test]
    fn test_garbage_content_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.txt");
        std::fs::write(&path, "not an address").unwrap();
        let cache = FileAddressCache::new(&path);
        assert!(matches!(cache.load(), Err(CacheError::Parse { .. })));
    }

    #[test]
    fn test_blank_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.txt");
        std::fs::write(&path, "\n").unwrap();
        assert!(FileAddressCache::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_save_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileAddressCache::new(dir.path().join("cache.txt"));
        cache.save("10.0.0.1".parse().unwrap()).unwrap();
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
