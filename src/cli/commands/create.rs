//! Create command - generate install assets into the asset directory

use super::asset_dir;
use super::validate::check_infra;
use crate::asset::{Asset, AssetKind, AssetStore};
use crate::cli::args::{CreateArgs, CreateTarget};
use crate::config::Config;
use crate::data::TemplateTree;
use crate::error::KvinstallResult;
use crate::ignition::{Aio, Bootstrap, MasterIgnition, WorkerIgnition};
use crate::installconfig::read_install_config;
use crate::kubeconfig::KubeconfigAsset;
use crate::machines::{Master, Worker};
use crate::manifests::Manifests;
use crate::metadata::Metadata;
use crate::tls;
use crate::ui::{self, UiContext};
use std::path::Path;
use tracing::info;

/// Execute the create command
pub async fn execute(args: CreateArgs, config: &Config) -> KvinstallResult<()> {
    let ctx = UiContext::detect();
    let dir_args = args.target.dir_args();
    let dir = asset_dir(dir_args.dir.as_deref(), config);

    ui::intro(&ctx, title(&args.target));

    let install_config = read_install_config(&dir)?;
    if dir_args.skip_infra_validation {
        ui::step_info(&ctx, "Infra cluster checks skipped");
    } else if check_infra(&install_config, config).await? {
        ui::step_ok(&ctx, "Infra cluster checks passed");
    }

    let templates = TemplateTree::load(config.assets.templates_dir.as_deref())?;
    let written = generate(&dir, templates, &args.target)?;

    for path in &written {
        let shown = path.strip_prefix(&dir).unwrap_or(path);
        ui::step_ok(&ctx, &shown.display().to_string());
    }
    ui::outro_success(
        &ctx,
        &format!("Wrote {} files to {}", written.len(), dir.display()),
    );
    Ok(())
}

/// Fetch the target assets and write them into `dir`, together with the
/// cluster ID and every certificate and key pair involved so later runs
/// reuse them
pub fn generate(
    dir: &Path,
    templates: TemplateTree,
    target: &CreateTarget,
) -> KvinstallResult<Vec<std::path::PathBuf>> {
    let store = AssetStore::new(dir, templates);
    let targets = targets(target);
    let mut kinds: Vec<AssetKind> = targets.iter().map(|t| t.kind()).collect();

    let parents = store.fetch(targets)?;
    kinds.extend(
        parents
            .kinds()
            .filter(|k| *k == AssetKind::ClusterId || tls::is_tls(*k)),
    );
    kinds.sort();
    kinds.dedup();

    info!("Writing {} assets to {}", kinds.len(), dir.display());
    store.persist(&parents, &kinds)
}

fn title(target: &CreateTarget) -> &'static str {
    match target {
        CreateTarget::Manifests(_) => "Creating manifests",
        CreateTarget::IgnitionConfigs(_) => "Creating Ignition configs",
        CreateTarget::SingleNodeIgnitionConfig(_) => "Creating single node Ignition config",
    }
}

fn targets(target: &CreateTarget) -> Vec<Box<dyn Asset>> {
    match target {
        CreateTarget::Manifests(_) => vec![
            Box::new(Manifests::default()),
            Box::new(Master::default()),
            Box::new(Worker::default()),
        ],
        CreateTarget::IgnitionConfigs(_) => vec![
            KubeconfigAsset::boxed(AssetKind::KubeconfigAdminClient),
            Box::new(Bootstrap::default()),
            Box::new(MasterIgnition::default()),
            Box::new(WorkerIgnition::default()),
            Box::new(Metadata::default()),
        ],
        CreateTarget::SingleNodeIgnitionConfig(_) => vec![
            KubeconfigAsset::boxed(AssetKind::KubeconfigAdminClient),
            Box::new(Aio::default()),
            Box::new(Metadata::default()),
        ],
    }
}
