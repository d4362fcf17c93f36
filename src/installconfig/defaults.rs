//! Defaults applied to a freshly loaded install config

use crate::installconfig::types::{
    ClusterNetworkEntry, InstallConfig, MachineNetworkEntry, MachinePool,
};
use crate::kubevirt::platform::set_platform_defaults;

pub const DEFAULT_MACHINE_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_CLUSTER_CIDR: &str = "10.128.0.0/14";
pub const DEFAULT_HOST_PREFIX: u8 = 23;
pub const DEFAULT_SERVICE_CIDR: &str = "172.30.0.0/16";
pub const DEFAULT_NETWORK_TYPE: &str = "OpenShiftSDN";
const DEFAULT_REPLICAS: i64 = 3;

pub fn set_install_config_defaults(config: &mut InstallConfig) {
    if config.api_version.is_empty() {
        config.api_version = "v1".to_string();
    }

    let networking = &mut config.networking;
    if networking.network_type.is_empty() {
        networking.network_type = DEFAULT_NETWORK_TYPE.to_string();
    }
    if networking.machine_network.is_empty() {
        networking.machine_network.push(MachineNetworkEntry {
            cidr: DEFAULT_MACHINE_CIDR.to_string(),
        });
    }
    if networking.cluster_network.is_empty() {
        networking.cluster_network.push(ClusterNetworkEntry {
            cidr: DEFAULT_CLUSTER_CIDR.to_string(),
            host_prefix: DEFAULT_HOST_PREFIX,
        });
    }
    if networking.service_network.is_empty() {
        networking
            .service_network
            .push(DEFAULT_SERVICE_CIDR.to_string());
    }

    let control_plane = config.control_plane.get_or_insert_with(MachinePool::default);
    set_pool_defaults(control_plane, "master");

    if config.compute.is_empty() {
        config.compute.push(MachinePool::default());
    }
    for pool in &mut config.compute {
        set_pool_defaults(pool, "worker");
    }

    if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
        set_platform_defaults(kubevirt);
    }
}

fn set_pool_defaults(pool: &mut MachinePool, name: &str) {
    if pool.name.is_empty() {
        pool.name = name.to_string();
    }
    if pool.replicas.is_none() {
        pool.replicas = Some(DEFAULT_REPLICAS);
    }
    if pool.hyperthreading.is_none() {
        pool.hyperthreading = Some("Enabled".to_string());
    }
}
