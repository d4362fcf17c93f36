//! Rendering template directories into storage files and systemd units

use crate::data::{Entry, TemplateTree};
use crate::error::{KvinstallError, KvinstallResult};
use crate::ignition::files::{file_from_string, replace_or_append};
use crate::ignition::types::{Config, Dropin, Unit};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

const TEMPLATE_SUFFIX: &str = ".template";

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

/// Render one template source against `data`
pub fn render<S: Serialize>(name: &str, source: &str, data: &S) -> KvinstallResult<String> {
    environment()
        .render_named_str(name, source, data)
        .map_err(|e| KvinstallError::Template {
            path: name.to_string(),
            reason: e.to_string(),
        })
}

/// Read a template file, rendering it when its name ends in `.template`.
/// Returns the name without the suffix and the contents.
fn read_file<S: Serialize>(
    tree: &TemplateTree,
    uri: &str,
    name: &str,
    data: &S,
) -> KvinstallResult<(String, String)> {
    let raw = tree
        .read(uri)
        .ok_or_else(|| KvinstallError::TemplateNotFound(uri.to_string()))?;

    match name.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stripped) => Ok((stripped.to_string(), render(uri, raw, data)?)),
        None => Ok((name.to_string(), raw.to_string())),
    }
}

/// Add every file below template directory `uri` to the config, placing
/// each at `base` joined with its path relative to `uri`
pub fn add_storage_files<S: Serialize>(
    config: &mut Config,
    tree: &TemplateTree,
    base: &str,
    uri: &str,
    data: &S,
) -> KvinstallResult<()> {
    if tree.is_file(uri) {
        return add_storage_file(config, tree, base, uri, data);
    }
    if !tree.is_dir(uri) {
        return Err(KvinstallError::TemplateNotFound(uri.to_string()));
    }

    for child in tree.children(uri) {
        let name = child.name();
        add_storage_files(
            config,
            tree,
            &join(base, name),
            &join(uri, name),
            data,
        )?;
    }
    Ok(())
}

fn add_storage_file<S: Serialize>(
    config: &mut Config,
    tree: &TemplateTree,
    base: &str,
    uri: &str,
    data: &S,
) -> KvinstallResult<()> {
    let (path, contents) = read_file(tree, uri, base, data)?;
    let node_path = Path::new(&path);

    let parent_dir = node_path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let file_name = node_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let mut mode = 0o600;
    if parent_dir == "bin" || parent_dir == "dispatcher.d" {
        mode = 0o555;
    }
    let append = file_name == "motd";
    if append {
        mode = 0o644;
    }

    let mut file = file_from_string(&path, "root", mode, &contents);
    if append {
        file.append = vec![std::mem::take(&mut file.contents)];
    }

    debug!("Adding node file {} (mode {:o})", path, mode);
    replace_or_append(&mut config.storage.files, file);
    Ok(())
}

/// Add one systemd unit per entry of template directory `uri`
///
/// A file is a unit; a directory `<unit>.d` carries drop-ins for `<unit>`.
/// Only units named in `enabled` are marked enabled.
pub fn add_systemd_units<S: Serialize>(
    config: &mut Config,
    tree: &TemplateTree,
    uri: &str,
    data: &S,
    enabled: &[&str],
) -> KvinstallResult<()> {
    if !tree.is_dir(uri) {
        return Err(KvinstallError::TemplateNotFound(uri.to_string()));
    }

    for child in tree.children(uri) {
        let child_uri = join(uri, child.name());

        let mut unit = match &child {
            Entry::Dir(dir_name) => {
                let mut dropins = Vec::new();
                for dropin in tree.children(&child_uri) {
                    if let Entry::File(file_name) = dropin {
                        let (name, contents) =
                            read_file(tree, &join(&child_uri, &file_name), &file_name, data)?;
                        dropins.push(Dropin {
                            name,
                            contents: Some(contents),
                        });
                    }
                }
                Unit {
                    name: dir_name.trim_end_matches(".d").to_string(),
                    dropins,
                    ..Default::default()
                }
            }
            Entry::File(file_name) => {
                let (name, contents) = read_file(tree, &child_uri, file_name, data)?;
                Unit {
                    name,
                    contents: Some(contents),
                    ..Default::default()
                }
            }
        };

        if enabled.contains(&unit.name.as_str()) {
            unit.enabled = Some(true);
        }
        debug!("Adding systemd unit {}", unit.name);
        config.systemd.units.push(unit);
    }
    Ok(())
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}
