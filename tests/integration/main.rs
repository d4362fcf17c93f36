//! Integration tests for kvinstall

use std::path::Path;
use tempfile::TempDir;

const NONE_INSTALL_CONFIG: &str = r#"apiVersion: v1
metadata:
  name: demo
baseDomain: example.com
sshKey: ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIDemo demo@example
pullSecret: '{"auths":{"quay.io":{"auth":"Zm9vOmJhcg=="}}}'
networking:
  machineNetwork:
  - cidr: 10.0.0.0/16
platform:
  none: {}
"#;

const KUBEVIRT_INSTALL_CONFIG: &str = r#"apiVersion: v1
metadata:
  name: tenant
baseDomain: example.com
pullSecret: '{"auths":{"quay.io":{"auth":"Zm9vOmJhcg=="}}}'
networking:
  machineNetwork:
  - cidr: 192.168.123.0/24
platform:
  kubevirt:
    namespace: tenant-ns
    storageClass: standard
    networkName: tenant-net
    apiVIP: 192.168.123.15
    ingressVIP: 192.168.123.20
    infraClusterAPIURL: https://api.infra.example.com:6443
"#;

/// Asset directory holding the given install config, plus an isolated
/// config file path so the user's own config is never read
fn workspace(install_config: &str) -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("install-config.yaml"), install_config).unwrap();
    (temp, assets)
}

fn config_path(temp: &Path) -> std::path::PathBuf {
    temp.join("kvinstall.toml")
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn kvinstall(temp: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("kvinstall");
        cmd.env("KVINSTALL_CONFIG", config_path(temp)).env("CI", "1");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("create"))
            .stdout(predicate::str::contains("destroy"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kvinstall"));
    }

    #[test]
    fn config_path_follows_env() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kvinstall.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[infra]"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .args(["config", "init"])
            .assert()
            .success();
        assert!(config_path(temp.path()).exists());
    }

    #[test]
    fn create_without_install_config_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .args(["create", "manifests", "--dir"])
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("install-config.yaml not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn invalid_install_config_is_rejected() {
        let (temp, assets) = workspace("metadata:\n  name: Bad_Name\nplatform:\n  none: {}\n");
        kvinstall(temp.path())
            .args(["validate", "--dir"])
            .arg(&assets)
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid install config"));
    }

    #[test]
    fn validate_none_platform() {
        let (temp, assets) = workspace(NONE_INSTALL_CONFIG);
        kvinstall(temp.path())
            .args(["validate", "--dir"])
            .arg(&assets)
            .assert()
            .success()
            .stdout(predicate::str::contains("install-config.yaml is valid"));
    }

    #[test]
    fn kubevirt_validation_reports_unreachable_infra() {
        let (temp, assets) = workspace(KUBEVIRT_INSTALL_CONFIG);
        std::fs::write(
            config_path(temp.path()),
            "[infra]\nkubectl = \"/nonexistent/kubectl\"\n",
        )
        .unwrap();

        kvinstall(temp.path())
            .args(["validate", "--dir"])
            .arg(&assets)
            .assert()
            .failure()
            .stderr(predicate::str::contains("platform validation failed"))
            .stderr(predicate::str::contains("InfraCluster"));
    }

    #[test]
    fn destroy_without_metadata_fails() {
        let temp = TempDir::new().unwrap();
        kvinstall(temp.path())
            .args(["destroy", "cluster", "--dir"])
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("metadata.json not found"));
    }

    #[test]
    fn create_manifests() {
        let (temp, assets) = workspace(NONE_INSTALL_CONFIG);
        kvinstall(temp.path())
            .args(["create", "manifests", "--dir"])
            .arg(&assets)
            .assert()
            .success()
            .stdout(predicate::str::contains("manifests/cluster-config.yaml"));

        assert!(assets.join("manifests/cluster-dns-02-config.yml").exists());
        assert!(assets
            .join("openshift/99_openshift-machineconfig_99-worker-ssh.yaml")
            .exists());
    }
}

mod pipeline_tests {
    use super::*;
    use assert_cmd::cargo::cargo_bin_cmd;

    fn create(temp: &Path, assets: &Path, target: &str) {
        cargo_bin_cmd!("kvinstall")
            .env("KVINSTALL_CONFIG", config_path(temp))
            .env("CI", "1")
            .args(["create", target, "--skip-infra-validation", "--dir"])
            .arg(assets)
            .assert()
            .success();
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn ignition_configs_for_kubevirt() {
        let (temp, assets) = workspace(KUBEVIRT_INSTALL_CONFIG);
        create(temp.path(), &assets, "ignition-configs");

        let bootstrap = read_json(&assets.join("bootstrap.ign"));
        assert_eq!(bootstrap["ignition"]["version"], "3.1.0");
        let paths: Vec<&str> = bootstrap["storage"]["files"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["path"].as_str())
            .collect();
        assert!(paths.contains(&"/opt/openshift/tls/root-ca.crt"));
        assert!(paths.contains(&"/opt/openshift/manifests/cloud-provider-config.yaml"));

        let master = read_json(&assets.join("master.ign"));
        assert_eq!(
            master["ignition"]["config"]["merge"][0]["source"],
            "https://api-int.tenant.example.com:22623/config/master"
        );

        let metadata = read_json(&assets.join("metadata.json"));
        assert_eq!(metadata["clusterName"], "tenant");
        assert_eq!(metadata["kubevirt"]["namespace"], "tenant-ns");
        let infra_id = metadata["infraID"].as_str().unwrap();
        assert!(infra_id.starts_with("tenant-"));
        assert_eq!(
            metadata["kubevirt"]["labels"][format!("tenantcluster-{}-machine.openshift.io", infra_id)],
            "owned"
        );

        assert!(assets.join("auth/kubeconfig").exists());
    }

    #[test]
    fn manifests_then_ignition_configs_reuse_manifests() {
        let (temp, assets) = workspace(NONE_INSTALL_CONFIG);
        create(temp.path(), &assets, "manifests");

        let custom = assets.join("manifests/cluster-ingress-02-config.yml");
        let edited = std::fs::read_to_string(&custom)
            .unwrap()
            .replace("apps.demo.example.com", "apps.custom.example.com");
        std::fs::write(&custom, &edited).unwrap();

        create(temp.path(), &assets, "ignition-configs");

        let bootstrap = read_json(&assets.join("bootstrap.ign"));
        let ingress = bootstrap["storage"]["files"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["path"] == "/opt/openshift/manifests/cluster-ingress-02-config.yml")
            .unwrap();
        let source = ingress["contents"]["source"].as_str().unwrap();
        let data = kvinstall::ignition::dataurl::decode(source).unwrap();
        assert!(String::from_utf8(data)
            .unwrap()
            .contains("apps.custom.example.com"));
    }
}
