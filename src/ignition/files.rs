//! Building node files and folding them into a config
//!
//! A config never carries two entries for the same path: every insertion
//! goes through [`replace_or_append`], so the last write for a path wins and
//! keeps the position of the first.

use crate::asset::{Asset, AssetKind, Parents};
use crate::error::KvinstallResult;
use crate::ignition::dataurl;
use crate::ignition::types::{Config, File, NodeUser, Resource};
use std::path::Path;

/// Replace the entry with the same path in place, or append
pub fn replace_or_append(files: &mut Vec<File>, file: File) {
    match files.iter_mut().find(|f| f.path == file.path) {
        Some(existing) => *existing = file,
        None => files.push(file),
    }
}

/// File with inline contents
pub fn file_from_bytes(path: &str, user: &str, mode: u32, data: &[u8]) -> File {
    File {
        path: path.to_string(),
        overwrite: Some(true),
        user: NodeUser {
            name: Some(user.to_string()),
        },
        mode: Some(mode),
        contents: Resource::from_source(dataurl::encode(data)),
        append: Vec::new(),
    }
}

pub fn file_from_string(path: &str, user: &str, mode: u32, contents: &str) -> File {
    file_from_bytes(path, user, mode, contents.as_bytes())
}

/// File fetched by the node from `url`
pub fn file_from_url(path: &str, user: &str, mode: u32, url: &str) -> File {
    File {
        path: path.to_string(),
        overwrite: Some(true),
        user: NodeUser {
            name: Some(user.to_string()),
        },
        mode: Some(mode),
        contents: Resource::from_source(url),
        append: Vec::new(),
    }
}

/// An asset's output files placed under `root` on the node
pub fn files_from_asset(root: &str, user: &str, mode: u32, asset: &dyn Asset) -> Vec<File> {
    asset
        .files()
        .into_iter()
        .map(|f| {
            let path = Path::new(root).join(&f.filename);
            file_from_bytes(&path.to_string_lossy(), user, mode, &f.data)
        })
        .collect()
}

/// Copy the files of each parent into the config under `root`
pub fn add_parent_files(
    config: &mut Config,
    parents: &Parents,
    root: &str,
    user: &str,
    mode: u32,
    kinds: &[AssetKind],
) -> KvinstallResult<()> {
    for kind in kinds {
        let asset = parents.get_dyn(*kind)?;
        for file in files_from_asset(root, user, mode, asset) {
            replace_or_append(&mut config.storage.files, file);
        }
    }
    Ok(())
}
