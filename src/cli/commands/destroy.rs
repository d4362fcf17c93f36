//! Destroy command - tear down cluster resources in the infra cluster

use super::asset_dir;
use crate::cli::args::{DestroyArgs, DestroyTarget};
use crate::config::Config;
use crate::error::KvinstallResult;
use crate::kubevirt::{ClusterUninstaller, KubectlClient};
use crate::metadata::read_metadata;
use crate::ui::{self, UiContext};

/// Execute the destroy command
pub async fn execute(args: DestroyArgs, config: &Config) -> KvinstallResult<()> {
    let ctx = UiContext::detect();
    let DestroyTarget::Cluster { dir } = args.target;
    let dir = asset_dir(dir.as_deref(), config);

    let metadata = read_metadata(&dir)?;
    ui::intro(&ctx, &format!("Destroying cluster {}", metadata.cluster_name));
    ui::key_value(&ctx, "Infra ID", &metadata.infra_id);

    let client = KubectlClient::connect(&config.infra).await?;
    let uninstaller = ClusterUninstaller::new(&metadata, Box::new(client))?;
    uninstaller.run().await?;

    ui::outro_success(&ctx, "Cluster resources deleted");
    Ok(())
}
