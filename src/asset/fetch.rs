//! Reading persisted asset files

use crate::asset::AssetFile;
use crate::error::{KvinstallError, KvinstallResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Source of previously written asset files
pub trait FileFetcher {
    /// Read one file by its asset-relative name. `Ok(None)` when absent.
    fn fetch_by_name(&self, name: &str) -> KvinstallResult<Option<AssetFile>>;

    /// Directory names are resolved against
    fn root(&self) -> &Path;
}

/// Fetches files from the asset directory on disk
pub struct DiskFetcher {
    dir: PathBuf,
}

impl DiskFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileFetcher for DiskFetcher {
    fn fetch_by_name(&self, name: &str) -> KvinstallResult<Option<AssetFile>> {
        let path = self.dir.join(name);
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(AssetFile::new(name, data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KvinstallError::io(
                format!("reading {}", path.display()),
                e,
            )),
        }
    }

    fn root(&self) -> &Path {
        &self.dir
    }
}
