//! Dependency resolution
//!
//! Depth-first, post-order walk of the asset graph. Every dependency comes
//! before its dependents and each kind appears once. Siblings are visited in
//! the order their parent declares them.

use crate::asset::{Asset, AssetKind};
use std::collections::HashSet;
use tracing::debug;

/// Order the graph rooted at `root`
pub fn resolve(root: Box<dyn Asset>) -> Vec<Box<dyn Asset>> {
    resolve_all(vec![root])
}

/// Order the union of the graphs rooted at `roots`
///
/// Nodes are marked when first entered, not when finished, so a cyclic
/// graph terminates. The resulting order is then not guaranteed to put
/// dependencies first; cycles are a programming error in the asset
/// declarations.
pub fn resolve_all(roots: Vec<Box<dyn Asset>>) -> Vec<Box<dyn Asset>> {
    let mut visited = HashSet::new();
    let mut ordered = Vec::new();

    for root in roots {
        visit(root, &mut visited, &mut ordered);
    }

    debug!("Resolved {} assets", ordered.len());
    ordered
}

fn visit(
    asset: Box<dyn Asset>,
    visited: &mut HashSet<AssetKind>,
    ordered: &mut Vec<Box<dyn Asset>>,
) {
    if !visited.insert(asset.kind()) {
        return;
    }

    for dependency in asset.dependencies() {
        visit(dependency, visited, ordered);
    }

    ordered.push(asset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::testing::FakeAsset;
    use std::rc::Rc;

    fn kinds(assets: &[Box<dyn Asset>]) -> Vec<AssetKind> {
        assets.iter().map(|a| a.kind()).collect()
    }

    #[test]
    fn dependencies_come_first() {
        let order = kinds(&resolve(Box::new(FakeAsset::new(AssetKind::Bootstrap))));
        assert_eq!(
            order,
            vec![
                AssetKind::ClusterId,
                AssetKind::RootCa,
                AssetKind::EtcdSigner,
                AssetKind::Bootstrap,
            ]
        );
    }

    #[test]
    fn shared_dependency_appears_once() {
        let order = kinds(&resolve_all(vec![
            Box::new(FakeAsset::new(AssetKind::Bootstrap)),
            Box::new(FakeAsset::new(AssetKind::Aio)),
        ]));

        let mut unique = order.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), order.len());
        assert_eq!(order.last(), Some(&AssetKind::Aio));
        assert_eq!(order.iter().filter(|k| **k == AssetKind::ClusterId).count(), 1);
    }

    #[test]
    fn siblings_keep_declaration_order() {
        let graph: Rc<dyn Fn(AssetKind) -> Vec<AssetKind>> = Rc::new(|kind| match kind {
            AssetKind::Manifests => vec![AssetKind::Proxy, AssetKind::ClusterId, AssetKind::RootCa],
            _ => vec![],
        });
        let order = kinds(&resolve(Box::new(FakeAsset::with_graph(
            AssetKind::Manifests,
            graph,
        ))));
        assert_eq!(
            order,
            vec![
                AssetKind::Proxy,
                AssetKind::ClusterId,
                AssetKind::RootCa,
                AssetKind::Manifests,
            ]
        );
    }

    #[test]
    fn cycle_terminates() {
        let graph: Rc<dyn Fn(AssetKind) -> Vec<AssetKind>> = Rc::new(|kind| match kind {
            AssetKind::Master => vec![AssetKind::Worker],
            AssetKind::Worker => vec![AssetKind::Master],
            _ => vec![],
        });
        let order = kinds(&resolve(Box::new(FakeAsset::with_graph(AssetKind::Master, graph))));
        assert_eq!(order, vec![AssetKind::Worker, AssetKind::Master]);
    }
}
