//! Deployment definition: the role's main container plus the log-shipping
//! side-car, sharing an `emptyDir` log volume.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, HTTPGetAction, KeyToPath, NodeAffinity, NodeSelector, NodeSelectorRequirement,
    NodeSelectorTerm, ObjectFieldSelector, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use stackgrid_core::config::SchedulingConfig;
use stackgrid_core::{LogicalStackId, ResourceDescriptor, Role, StackConfig};

use super::{named, pod_labels, selector_labels};

const CONFIG_VOLUME: &str = "config-volume";
const SIDECAR_CONFIG_VOLUME: &str = "sidecar-config-volume";
const LOG_VOLUME: &str = "log-volume";

/// Build the deployment for one stack role.
///
/// `health_path` enables the readiness probe when non-empty.
pub fn deployment(
    config: &StackConfig,
    id: &LogicalStackId,
    image: &str,
    health_path: Option<&str>,
) -> Deployment {
    let names = ResourceDescriptor::for_stack(id);
    let role = config.role(id.role);
    let labels = pod_labels(id, &names);

    let mut main = Container {
        name: names.container_name.clone(),
        image: Some(image.to_string()),
        command: (!role.command.is_empty()).then(|| role.command.clone()),
        ports: Some(vec![ContainerPort {
            container_port: role.port,
            ..ContainerPort::default()
        }]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: CONFIG_VOLUME.to_string(),
                mount_path: config.app.settings_mount_path.clone(),
                sub_path: Some(config.app.settings_file_name.clone()),
                ..VolumeMount::default()
            },
            VolumeMount {
                name: LOG_VOLUME.to_string(),
                mount_path: config.app.log_mount_path.clone(),
                ..VolumeMount::default()
            },
        ]),
        resources: Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(config.rollout.request_cpu.clone())),
                ("memory".to_string(), Quantity(config.rollout.request_memory.clone())),
            ])),
            ..ResourceRequirements::default()
        }),
        ..Container::default()
    };
    if id.role == Role::HostSilo {
        main.env = Some(silo_env(&id.tenant_id));
    }
    if let Some(path) = health_path.filter(|p| !p.is_empty()) {
        main.readiness_probe = Some(readiness_probe(path, role.port));
    }

    let sidecar = Container {
        name: config.sidecar.container_name.clone(),
        image: Some(config.sidecar.image.clone()),
        args: Some(vec![
            "-c".to_string(),
            config.sidecar.config_mount_path.clone(),
            "-e".to_string(),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: LOG_VOLUME.to_string(),
                mount_path: config.app.log_mount_path.clone(),
                ..VolumeMount::default()
            },
            VolumeMount {
                name: SIDECAR_CONFIG_VOLUME.to_string(),
                mount_path: config.sidecar.config_mount_path.clone(),
                sub_path: Some(config.sidecar.config_file_name.clone()),
                ..VolumeMount::default()
            },
        ]),
        ..Container::default()
    };

    let volumes = vec![
        config_volume(
            CONFIG_VOLUME,
            &names.app_setting_config_map_name,
            &config.app.settings_file_name,
        ),
        config_volume(
            SIDECAR_CONFIG_VOLUME,
            &names.side_car_config_map_name,
            &config.sidecar.config_file_name,
        ),
        Volume {
            name: LOG_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Volume::default()
        },
    ];

    let (affinity, tolerations) = match &config.scheduling {
        Some(s) => (Some(node_affinity(s)), Some(vec![toleration(s)])),
        None => (None, None),
    };

    Deployment {
        metadata: named(&names.deployment_name, labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(config.rollout.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&names)),
                ..LabelSelector::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDeployment {
                    max_surge: Some(int_or_string(&config.rollout.max_surge)),
                    max_unavailable: Some(int_or_string(&config.rollout.max_unavailable)),
                }),
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    affinity,
                    tolerations,
                    containers: vec![main, sidecar],
                    volumes: Some(volumes),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// `"3"` becomes an integer, anything else (e.g. `"25%"`) stays a string.
pub fn int_or_string(raw: &str) -> IntOrString {
    match raw.trim().parse::<i32>() {
        Ok(n) => IntOrString::Int(n),
        Err(_) => IntOrString::String(raw.trim().to_string()),
    }
}

/// Silo cluster identity plus downward-API pod coordinates.
fn silo_env(tenant_id: &str) -> Vec<EnvVar> {
    let tenant = tenant_id.to_lowercase();
    let field = |name: &str, path: &str| EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: path.to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    };

    vec![
        EnvVar {
            name: "ORLEANS_SERVICE_ID".to_string(),
            value: Some(format!("{tenant}BasicService")),
            ..EnvVar::default()
        },
        EnvVar {
            name: "ORLEANS_CLUSTER_ID".to_string(),
            value: Some(format!("{tenant}SiloCluster")),
            ..EnvVar::default()
        },
        field("POD_NAMESPACE", "metadata.namespace"),
        field("POD_NAME", "metadata.name"),
        field("POD_IP", "status.podIP"),
    ]
}

fn readiness_probe(path: &str, port: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port),
            ..HTTPGetAction::default()
        }),
        initial_delay_seconds: Some(5),
        period_seconds: Some(5),
        timeout_seconds: Some(1),
        success_threshold: Some(2),
        failure_threshold: Some(10),
        ..Probe::default()
    }
}

fn config_volume(volume: &str, config_map: &str, file_name: &str) -> Volume {
    Volume {
        name: volume.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            items: Some(vec![KeyToPath {
                key: file_name.to_string(),
                path: file_name.to_string(),
                ..KeyToPath::default()
            }]),
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    }
}

fn node_affinity(scheduling: &SchedulingConfig) -> Affinity {
    let requirement = |key: &str| NodeSelectorRequirement {
        key: key.to_string(),
        operator: "In".to_string(),
        values: Some(vec![scheduling.node_affinity_value.clone()]),
    };
    Affinity {
        node_affinity: Some(NodeAffinity {
            required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                node_selector_terms: vec![NodeSelectorTerm {
                    match_expressions: Some(vec![requirement("resource"), requirement("app")]),
                    ..NodeSelectorTerm::default()
                }],
            }),
            ..NodeAffinity::default()
        }),
        ..Affinity::default()
    }
}

fn toleration(scheduling: &SchedulingConfig) -> Toleration {
    Toleration {
        effect: Some("NoSchedule".to_string()),
        key: Some(scheduling.toleration_key.clone()),
        operator: Some("Equal".to_string()),
        value: Some(scheduling.toleration_value.clone()),
        ..Toleration::default()
    }
}
