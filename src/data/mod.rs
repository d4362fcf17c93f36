//! Node file templates
//!
//! Templates ship inside the binary. A directory on disk can override them
//! path by path (config `assets.templates_dir`), which is how site-specific
//! files are added without rebuilding.

use crate::error::{KvinstallError, KvinstallResult};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

macro_rules! embed {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../../data/", $path)))),*]
    };
}

const EMBEDDED: &[(&str, &str)] = embed![
    "bootstrap/files/etc/NetworkManager/dispatcher.d/30-local-dns-prepender",
    "bootstrap/files/etc/containers/registries.conf.template",
    "bootstrap/files/etc/motd",
    "bootstrap/files/etc/pki/ca-trust/source/anchors/ca.crt.template",
    "bootstrap/files/etc/profile.d/proxy.sh.template",
    "bootstrap/files/root/.docker/config.json.template",
    "bootstrap/files/usr/local/bin/approve-csr.sh",
    "bootstrap/files/usr/local/bin/bootkube.sh.template",
    "bootstrap/files/usr/local/bin/release-image.sh.template",
    "bootstrap/files/usr/local/bin/report-progress.sh",
    "bootstrap/systemd/units/approve-csr.service",
    "bootstrap/systemd/units/bootkube.service",
    "bootstrap/systemd/units/chown-gatewayd-key.service",
    "bootstrap/systemd/units/crio.service.d/10-default-env.conf.template",
    "bootstrap/systemd/units/kubelet.service.template",
    "bootstrap/systemd/units/progress.service",
    "bootstrap/systemd/units/release-image.service.template",
    "bootstrap/systemd/units/systemd-journal-gatewayd.socket",
    "bootstrap/baremetal/files/etc/keepalived/keepalived.conf.template",
    "bootstrap/baremetal/files/usr/local/bin/startironic.sh.template",
    "bootstrap/baremetal/systemd/units/ironic.service",
    "bootstrap/baremetal/systemd/units/keepalived.service",
    "aio/files/etc/kubernetes/kubelet.conf.template",
    "aio/files/root/.docker/config.json.template",
    "aio/files/usr/local/bin/aiokube.sh.template",
    "aio/files/usr/local/bin/approve-csr.sh",
    "aio/systemd/units/aiokube.service",
    "aio/systemd/units/approve-csr.service",
    "aio/systemd/units/kube-proxy.service.template",
    "aio/systemd/units/kubelet.service",
];

/// Immediate child of a template directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Entry {
    Dir(String),
    File(String),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Self::Dir(name) | Self::File(name) => name,
        }
    }
}

/// Virtual directory of template files keyed by slash-separated path
#[derive(Debug, Clone, Default)]
pub struct TemplateTree {
    files: BTreeMap<String, String>,
}

impl TemplateTree {
    /// Templates compiled into the binary
    pub fn embedded() -> Self {
        let mut tree = Self::default();
        for (path, content) in EMBEDDED {
            tree.insert(path, *content);
        }
        tree
    }

    /// Built-in templates, overridden by `override_dir` when given
    pub fn load(override_dir: Option<&Path>) -> KvinstallResult<Self> {
        let tree = Self::embedded();
        match override_dir {
            Some(dir) => Ok(tree.overlay(Self::from_dir(dir)?)),
            None => Ok(tree),
        }
    }

    /// Read every file below `root`
    pub fn from_dir(root: &Path) -> KvinstallResult<Self> {
        let mut tree = Self::default();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| KvinstallError::Template {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|e| {
                KvinstallError::Internal(format!("walked outside {}: {}", root.display(), e))
            })?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(entry.path()).map_err(|e| {
                KvinstallError::io(format!("reading template {}", entry.path().display()), e)
            })?;
            tree.insert(&key, content);
        }

        debug!("Read {} templates from {}", tree.len(), root.display());
        Ok(tree)
    }

    /// Entries of `other` replace entries at the same path
    pub fn overlay(mut self, other: TemplateTree) -> Self {
        self.files.extend(other.files);
        self
    }

    pub fn insert(&mut self, path: &str, content: impl Into<String>) {
        self.files.insert(normalize(path).to_string(), content.into());
    }

    pub fn read(&self, path: &str) -> Option<&str> {
        self.files.get(normalize(path)).map(String::as_str)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(normalize(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let prefix = dir_prefix(path);
        self.files.keys().any(|k| k.starts_with(&prefix))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// Immediate children of `dir`, sorted by name
    pub fn children(&self, dir: &str) -> Vec<Entry> {
        let prefix = dir_prefix(dir);
        let mut entries: Vec<Entry> = self
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((child, _)) => Entry::Dir(child.to_string()),
                None => Entry::File(rest.to_string()),
            })
            .collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries.dedup();
        entries
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn dir_prefix(dir: &str) -> String {
    let dir = normalize(dir);
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    }
}
