//! MachineConfig that keeps the infra cluster credentials fresh on KubeVirt nodes
//!
//! The infra cluster's service account token and CA are exposed to each VM
//! as a disk. A timer logs in with them every minute and stores the
//! resulting kubeconfig as the `kubevirt-credentials` secret.

use crate::ignition::dataurl;
use crate::ignition::types::{Config, File, NodeUser, Resource, Unit};
use crate::machines::MachineConfig;

const MOUNT_PATH: &str = "/var/mnt/serviceaccount";
const CREDS_SECRET_NAME: &str = "kubevirt-credentials";
const CRED_SECRET_SCRIPT_PATH: &str = "/root/creds_secret.sh";
const CRED_SECRET_SERVICE_NAME: &str = "infraCredsSecret";
const LOCALHOST_KUBECONFIG: &str =
    "/etc/kubernetes/static-pod-resources/kube-apiserver-certs/secrets/node-kubeconfigs/localhost.kubeconfig";

fn mount_unit() -> String {
    format!(
        "[Unit]\n\
         Before=local-fs.target\n\
         [Mount]\n\
         What=/dev/disk/by-id/virtio-SERVICEACCOUNT\n\
         Where={}\n\
         [Install]\n\
         WantedBy=local-fs.target\n",
        MOUNT_PATH
    )
}

fn update_secret_script(api_url: &str) -> String {
    let escaped = MOUNT_PATH.replace('/', "\\/");
    format!(
        "set -e\n\
         oc login {api} --certificate-authority={mount}/ca.crt --token=`cat {mount}/token`\n\
         sed -i \"s/certificate-authority: {escaped}\\/ca.crt/certificate-authority-data: \\b`cat {mount}/ca.crt`\\b/g\" /root/.kube/config\n\
         oc --kubeconfig={local} -n kube-system delete secret {secret} || true\n\
         oc --kubeconfig={local} -n kube-system create secret generic {secret} --from-file=kubeconfig=/root/.kube/config\n\
         rm /root/.kube/config\n",
        api = api_url,
        mount = MOUNT_PATH,
        escaped = escaped,
        local = LOCALHOST_KUBECONFIG,
        secret = CREDS_SECRET_NAME,
    )
}

fn update_secret_service() -> String {
    format!(
        "[Service]\nUser=0\nType=oneshot\nExecStart=/bin/bash {}\n",
        CRED_SECRET_SCRIPT_PATH
    )
}

const UPDATE_SECRET_TIMER: &str = "[Timer]\n\
OnUnitActiveSec=60s\n\
OnBootSec=60s\n\
[Install]\n\
WantedBy=timers.target\n";

/// `var-mnt-serviceaccount.mount`
fn mount_unit_name() -> String {
    format!(
        "{}.mount",
        MOUNT_PATH.trim_start_matches('/').replace('/', "-")
    )
}

fn enabled_unit(name: String, contents: String) -> Unit {
    Unit {
        name,
        enabled: Some(true),
        contents: Some(contents),
        dropins: Vec::new(),
    }
}

/// Infra service-account MachineConfig for one role
pub fn for_infra_service_account(role: &str, infra_api_url: &str) -> MachineConfig {
    let mut config = Config::new();

    config.storage.files.push(File {
        path: CRED_SECRET_SCRIPT_PATH.to_string(),
        overwrite: Some(true),
        user: NodeUser::default(),
        mode: Some(0o500),
        contents: Resource::from_source(dataurl::encode(
            update_secret_script(infra_api_url).as_bytes(),
        )),
        append: Vec::new(),
    });

    config.systemd.units = vec![
        enabled_unit(mount_unit_name(), mount_unit()),
        enabled_unit(
            format!("{}.service", CRED_SECRET_SERVICE_NAME),
            update_secret_service(),
        ),
        enabled_unit(
            format!("{}.timer", CRED_SECRET_SERVICE_NAME),
            UPDATE_SECRET_TIMER.to_string(),
        ),
    ];

    MachineConfig::for_role(role, &format!("99-{}-infra-service-account", role), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_and_script_are_wired() {
        let mc = for_infra_service_account("master", "https://api.infra.example.com:6443");

        assert_eq!(mc.metadata.name, "99-master-infra-service-account");
        assert_eq!(
            mc.metadata.labels.get("machineconfiguration.openshift.io/role").map(String::as_str),
            Some("master")
        );

        let units: Vec<_> = mc.spec.config.systemd.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            units,
            vec!["var-mnt-serviceaccount.mount", "infraCredsSecret.service", "infraCredsSecret.timer"]
        );

        let file = &mc.spec.config.storage.files[0];
        assert_eq!(file.mode, Some(0o500));
        let script = dataurl::decode(file.contents.source.as_deref().unwrap()).unwrap();
        let script = String::from_utf8(script).unwrap();
        assert!(script.contains("oc login https://api.infra.example.com:6443"));
        assert!(script.contains("certificate-authority: \\/var\\/mnt\\/serviceaccount\\/ca.crt"));
    }

    #[test]
    fn service_runs_script() {
        assert!(update_secret_service().contains("ExecStart=/bin/bash /root/creds_secret.sh"));
    }
}
