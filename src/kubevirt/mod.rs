//! KubeVirt platform: install config section, infra cluster checks,
//! cloud provider config and teardown

pub mod client;
pub mod cloudprovider;
pub mod destroy;
pub mod kubectl;
pub mod machineconfig;
pub mod platform;
pub mod validation;

pub use client::{InfraClient, Labels};
pub use cloudprovider::CloudProviderConfig;
pub use destroy::ClusterUninstaller;
pub use kubectl::KubectlClient;
pub use validation::validate;
