//! Validate command - structural and infra cluster checks

use super::asset_dir;
use crate::cli::args::AssetDirArgs;
use crate::config::Config;
use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::read_install_config;
use crate::installconfig::types::InstallConfig;
use crate::kubevirt::{self, InfraClient, KubectlClient};
use crate::ui::{self, UiContext};
use tracing::{debug, info};

/// Execute the validate command
pub async fn execute(args: AssetDirArgs, config: &Config) -> KvinstallResult<()> {
    let ctx = UiContext::detect();
    let dir = asset_dir(args.dir.as_deref(), config);

    ui::intro(&ctx, "Validating install config");

    let install_config = read_install_config(&dir)?;
    ui::step_ok_detail(
        &ctx,
        "install-config.yaml is valid",
        &format!("platform {}", install_config.platform.name()),
    );

    if args.skip_infra_validation {
        ui::step_info(&ctx, "Infra cluster checks skipped");
    } else if check_infra(&install_config, config).await? {
        ui::step_ok(&ctx, "Infra cluster checks passed");
    }

    ui::outro_success(&ctx, "Validation passed");
    Ok(())
}

/// Run the KubeVirt infra cluster checks when the config targets KubeVirt.
/// Returns whether any checks ran.
pub(crate) async fn check_infra(
    install_config: &InstallConfig,
    config: &Config,
) -> KvinstallResult<bool> {
    if install_config.platform.kubevirt.is_none() {
        debug!(
            "Platform {} has no infra cluster checks",
            install_config.platform.name()
        );
        return Ok(false);
    }

    info!("Validating KubeVirt platform against the infra cluster");
    let infra = config.infra.clone();
    kubevirt::validate(install_config, move || {
        Ok(Box::new(KubectlClient::new(&infra)) as Box<dyn InfraClient>)
    })
    .await
    .map_err(KvinstallError::Validation)?;

    Ok(true)
}
