//! Load-or-generate driver for a set of target assets

use crate::asset::{resolve_all, Asset, AssetKind, DiskFetcher, FileFetcher, Parents};
use crate::data::TemplateTree;
use crate::error::{KvinstallError, KvinstallResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Asset directory plus the templates used to render node files
pub struct AssetStore {
    fetcher: DiskFetcher,
    templates: Arc<TemplateTree>,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>, templates: TemplateTree) -> Self {
        Self {
            fetcher: DiskFetcher::new(dir),
            templates: Arc::new(templates),
        }
    }

    pub fn dir(&self) -> &Path {
        self.fetcher.dir()
    }

    /// Produce every target, loading from disk where possible
    ///
    /// Assets are visited dependents-first to decide what is needed: an
    /// asset found on disk does not pull in its own dependencies. Needed
    /// assets that were not found are then generated in dependency order.
    ///
    /// An on-disk copy is discarded when one of its dependencies is
    /// regenerated in the same run, so a rerun never mixes old and new key
    /// material. Discarding a copy can pull in more dependencies, so the
    /// plan is repeated until no further copy goes stale.
    pub fn fetch(&self, targets: Vec<Box<dyn Asset>>) -> KvinstallResult<Parents> {
        let target_kinds: HashSet<AssetKind> = targets.iter().map(|t| t.kind()).collect();
        let mut ordered = resolve_all(targets);
        let deps: Vec<Vec<AssetKind>> = ordered
            .iter()
            .map(|a| a.dependencies().iter().map(|d| d.kind()).collect())
            .collect();

        let mut attempted: Vec<Option<bool>> = vec![None; ordered.len()];
        let mut stale: HashSet<AssetKind> = HashSet::new();

        let (needed, loaded) = loop {
            let (needed, loaded) =
                self.plan(&mut ordered, &deps, &target_kinds, &stale, &mut attempted)?;

            let newly_stale = stale_copies(&ordered, &deps, &needed, &loaded);
            if newly_stale.is_empty() {
                break (needed, loaded);
            }
            for kind in newly_stale {
                warn!(
                    "Discarding the on-disk copy of {}: a dependency was regenerated",
                    kind
                );
                stale.insert(kind);
            }
        };

        let mut parents = Parents::with_templates(self.templates.clone());
        for (mut asset, was_loaded) in ordered.into_iter().zip(loaded) {
            if !needed.contains(&asset.kind()) {
                debug!("Skipping {}: satisfied by a loaded dependent", asset.name());
                continue;
            }

            if !was_loaded {
                debug!("Generating {}", asset.name());
                asset
                    .generate(&parents)
                    .map_err(|e| KvinstallError::generate(asset.name(), e))?;
            }
            parents.insert(asset)?;
        }

        Ok(parents)
    }

    /// Dependents-first pass deciding which assets are needed and which of
    /// them come from disk. Each asset is read at most once across passes.
    fn plan(
        &self,
        ordered: &mut [Box<dyn Asset>],
        deps: &[Vec<AssetKind>],
        targets: &HashSet<AssetKind>,
        stale: &HashSet<AssetKind>,
        attempted: &mut [Option<bool>],
    ) -> KvinstallResult<(HashSet<AssetKind>, Vec<bool>)> {
        let mut needed = targets.clone();
        let mut loaded = vec![false; ordered.len()];

        for (index, asset) in ordered.iter_mut().enumerate().rev() {
            let kind = asset.kind();
            if !needed.contains(&kind) {
                continue;
            }

            if !stale.contains(&kind) {
                let found = match attempted[index] {
                    Some(found) => found,
                    None => {
                        debug!("Fetching {}", asset.name());
                        let found = asset.load(&self.fetcher)?;
                        if found {
                            info!("Loaded {} from the asset directory", asset.name());
                        }
                        attempted[index] = Some(found);
                        found
                    }
                };
                if found {
                    loaded[index] = true;
                    continue;
                }
            }

            needed.extend(deps[index].iter().copied());
        }

        Ok((needed, loaded))
    }

    /// Write the files of the given assets into the asset directory
    pub fn persist(&self, parents: &Parents, kinds: &[AssetKind]) -> KvinstallResult<Vec<PathBuf>> {
        let mut written = Vec::new();

        for kind in kinds {
            for file in parents.get_dyn(*kind)?.files() {
                let path = self.dir().join(&file.filename);
                write_file(&path, &file.data)?;
                debug!("Wrote {}", path.display());
                written.push(path);
            }
        }

        Ok(written)
    }
}

fn write_file(path: &Path, data: &[u8]) -> KvinstallResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            KvinstallError::io(format!("creating directory {}", parent.display()), e)
        })?;
    }

    std::fs::write(path, data)
        .map_err(|e| KvinstallError::io(format!("writing {}", path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o640)).map_err(|e| {
            KvinstallError::io(format!("setting permissions on {}", path.display()), e)
        })?;
    }

    Ok(())
}

/// Loaded assets with a dependency that will be regenerated
///
/// Freshly generated assets taint their dependents. Derived kinds only do
/// so when one of their own parents is tainted.
fn stale_copies(
    ordered: &[Box<dyn Asset>],
    deps: &[Vec<AssetKind>],
    needed: &HashSet<AssetKind>,
    loaded: &[bool],
) -> Vec<AssetKind> {
    let mut dirty: HashSet<AssetKind> = HashSet::new();
    let mut stale = Vec::new();

    for (index, asset) in ordered.iter().enumerate() {
        let kind = asset.kind();
        if !needed.contains(&kind) {
            continue;
        }

        let parent_dirty = deps[index].iter().any(|d| dirty.contains(d));
        if loaded[index] {
            if parent_dirty {
                stale.push(kind);
            }
        } else if parent_dirty || !kind.is_derived() {
            dirty.insert(kind);
        }
    }

    stale
}
