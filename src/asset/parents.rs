//! Generated-asset store handed to each `generate` call

use crate::asset::{Asset, AssetKind, AssetType};
use crate::data::TemplateTree;
use crate::error::{KvinstallError, KvinstallResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Assets generated (or loaded) so far in one fetch, keyed by kind
///
/// Each kind is written once. Asking for a kind that is not present means
/// the requesting asset did not declare it as a dependency.
pub struct Parents {
    assets: HashMap<AssetKind, Box<dyn Asset>>,
    templates: Arc<TemplateTree>,
}

impl Parents {
    /// Empty store using the built-in templates
    pub fn new() -> Self {
        Self::with_templates(Arc::new(TemplateTree::embedded()))
    }

    pub fn with_templates(templates: Arc<TemplateTree>) -> Self {
        Self {
            assets: HashMap::new(),
            templates,
        }
    }

    /// Record a generated asset
    pub fn insert(&mut self, asset: Box<dyn Asset>) -> KvinstallResult<()> {
        let kind = asset.kind();
        if self.assets.contains_key(&kind) {
            return Err(KvinstallError::Internal(format!(
                "asset {} stored twice",
                kind
            )));
        }
        self.assets.insert(kind, asset);
        Ok(())
    }

    /// Typed access to a generated dependency
    pub fn get<T: AssetType>(&self) -> KvinstallResult<&T> {
        self.get_dyn(T::KIND)?.downcast_ref::<T>().ok_or_else(|| {
            KvinstallError::Internal(format!("asset {} has an unexpected type", T::KIND))
        })
    }

    /// Remove a generated asset, handing ownership to the caller
    pub fn take<T: AssetType>(&mut self) -> KvinstallResult<T> {
        let asset = self.assets.remove(&T::KIND).ok_or_else(|| {
            KvinstallError::Internal(format!("asset {} requested before generation", T::KIND))
        })?;
        asset
            .into_any()
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| KvinstallError::Internal(format!("asset {} has an unexpected type", T::KIND)))
    }

    /// Untyped access to a generated dependency
    pub fn get_dyn(&self, kind: AssetKind) -> KvinstallResult<&dyn Asset> {
        self.assets
            .get(&kind)
            .map(|asset| asset.as_ref())
            .ok_or_else(|| {
                KvinstallError::Internal(format!("asset {} requested before generation", kind))
            })
    }

    pub fn contains(&self, kind: AssetKind) -> bool {
        self.assets.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = AssetKind> + '_ {
        self.assets.keys().copied()
    }

    /// Template tree for assets that render node files
    pub fn templates(&self) -> &TemplateTree {
        &self.templates
    }
}

impl Default for Parents {
    fn default() -> Self {
        Self::new()
    }
}
