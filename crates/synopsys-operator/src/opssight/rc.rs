//! Replication controllers of the OpsSight processes and the metrics deployment

use super::config::{config_map_name, metrics_config_map_name, secret_name};
use super::rbac::{processor_service_account, scanner_service_account, skyfire_service_account};
use super::{get_label, resource_name};
use crate::crds::OpsSight;
use crate::error::Result;
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::*;
use crate::types::{ContainerName, PodResource};
use crate::util::{
    config_map_volume, empty_dir_volume, env_from_secret, image_pull_secrets, object_meta,
    parse_quantity, volume_mount,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container as PodContainer, ContainerPort, HostPathVolumeSource, PodSpec, PodTemplateSpec,
    ReplicationController, ReplicationControllerSpec, ResourceRequirements, SecurityContext,
    Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;
use std::collections::BTreeMap;

const DOCKER_SOCKET: &str = "/var/run/docker.sock";
const IMAGES_VOLUME: &str = "var-images";

pub(super) fn register(store: &mut ComponentStore<OpsSight>) -> Result<()> {
    store.register_rc(OPSSIGHT_CORE_RC_V1, core)?;
    store.register_rc(OPSSIGHT_POD_PROCESSOR_RC_V1, pod_processor)?;
    store.register_rc(OPSSIGHT_IMAGE_PROCESSOR_RC_V1, image_processor)?;
    store.register_rc(OPSSIGHT_SCANNER_RC_V1, scanner)?;
    store.register_rc(SKYFIRE_RC_V1, skyfire)?;
    store.register_deployment(OPSSIGHT_METRICS_DEPLOYMENT_V1, metrics)?;
    Ok(())
}

/// CPU and memory requests of a container, unset fields are left out
fn requests(cpu: &str, mem: &str) -> Result<Option<ResourceRequirements>> {
    let mut map = BTreeMap::new();
    if !cpu.is_empty() {
        map.insert("cpu".to_string(), parse_quantity(cpu)?);
    }
    if !mem.is_empty() {
        map.insert("memory".to_string(), parse_quantity(mem)?);
    }
    if map.is_empty() {
        return Ok(None);
    }
    Ok(Some(ResourceRequirements {
        requests: Some(map),
        ..Default::default()
    }))
}

/// Container reading its settings from `/etc/<name>/<config map>.json`
fn process_container(
    cr: &OpsSight,
    pod: &PodResource,
    container: ContainerName,
    name: &str,
    port: i32,
    resources: Option<ResourceRequirements>,
) -> PodContainer {
    let config_dir = format!("/etc/{}", name);
    PodContainer {
        name: name.to_string(),
        image: Some(pod.image(container)),
        image_pull_policy: Some("Always".to_string()),
        command: Some(vec![format!("./{}", name)]),
        args: Some(vec![format!("{}/{}.json", config_dir, cr.spec.config_map_name)]),
        ports: Some(vec![ContainerPort {
            container_port: port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![volume_mount(name, &config_dir)]),
        resources,
        ..Default::default()
    }
}

fn config_volume(cr: &OpsSight, name: &str) -> Volume {
    config_map_volume(name, &config_map_name(cr))
}

fn pod_spec(
    cr: &OpsSight,
    containers: Vec<PodContainer>,
    volumes: Vec<Volume>,
    service_account: Option<String>,
) -> PodSpec {
    PodSpec {
        containers,
        volumes: Some(volumes),
        service_account_name: service_account,
        image_pull_secrets: image_pull_secrets(cr.spec.registry_configuration.as_ref()),
        ..Default::default()
    }
}

fn replication_controller(
    pod: &PodResource,
    cr: &OpsSight,
    component: &str,
    spec: PodSpec,
) -> ReplicationController {
    let labels = get_label(component, &cr.name_any());
    ReplicationController {
        metadata: object_meta(&resource_name(cr, component), &pod.namespace, labels.clone()),
        spec: Some(ReplicationControllerSpec {
            replicas: Some(pod.replicas),
            selector: Some(labels.clone()),
            template: Some(PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(spec),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn core(
    pod: &PodResource,
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let spec = &cr.spec;
    let name = &spec.perceptor.name;

    let mut container = process_container(
        cr,
        pod,
        OPSSIGHT_CORE_CONTAINER,
        name,
        spec.perceptor.port,
        requests(&spec.default_cpu, &spec.default_mem)?,
    );
    container.env_from = Some(vec![env_from_secret(&secret_name(cr))]);

    let pod_spec = pod_spec(cr, vec![container], vec![config_volume(cr, name)], None);
    Ok(Some(replication_controller(pod, cr, name, pod_spec)))
}

fn processor(
    pod: &PodResource,
    cr: &OpsSight,
    container: ContainerName,
    name: &str,
) -> Result<ReplicationController> {
    let spec = &cr.spec;
    let mut container = process_container(
        cr,
        pod,
        container,
        name,
        spec.perceiver.port,
        requests(&spec.default_cpu, &spec.default_mem)?,
    );
    container
        .volume_mounts
        .get_or_insert_with(Vec::new)
        .push(volume_mount("logs", "/tmp"));

    let pod_spec = pod_spec(
        cr,
        vec![container],
        vec![config_volume(cr, name), empty_dir_volume("logs")],
        Some(processor_service_account(cr)),
    );
    Ok(replication_controller(pod, cr, name, pod_spec))
}

fn pod_processor(
    pod: &PodResource,
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    if !cr.spec.perceiver.enable_pod_perceiver {
        return Ok(None);
    }
    let name = &cr.spec.perceiver.pod_perceiver_name;
    processor(pod, cr, OPSSIGHT_POD_PROCESSOR_CONTAINER, name).map(Some)
}

fn image_processor(
    pod: &PodResource,
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    if !cr.spec.perceiver.enable_image_perceiver {
        return Ok(None);
    }
    let name = &cr.spec.perceiver.image_perceiver_name;
    processor(pod, cr, OPSSIGHT_IMAGE_PROCESSOR_CONTAINER, name).map(Some)
}

/// Scanner and image getter sharing the pulled images directory
fn scanner(
    pod: &PodResource,
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let spec = &cr.spec;
    let scanner_pod = &spec.scanner_pod;
    let images_mount = volume_mount(IMAGES_VOLUME, &scanner_pod.image_directory);

    let mut scanner = process_container(
        cr,
        pod,
        OPSSIGHT_SCANNER_CONTAINER,
        &scanner_pod.scanner.name,
        scanner_pod.scanner.port,
        requests(&spec.scanner_cpu, &spec.scanner_mem)?,
    );
    scanner.env_from = Some(vec![env_from_secret(&secret_name(cr))]);
    scanner
        .volume_mounts
        .get_or_insert_with(Vec::new)
        .push(images_mount.clone());

    let facade = &scanner_pod.image_facade;
    let mut image_getter = process_container(
        cr,
        pod,
        OPSSIGHT_IMAGE_GETTER_CONTAINER,
        &facade.name,
        facade.port,
        requests(&spec.scanner_cpu, &spec.scanner_mem)?,
    );
    image_getter.env_from = Some(vec![env_from_secret(&secret_name(cr))]);
    let getter_mounts = image_getter.volume_mounts.get_or_insert_with(Vec::new);
    getter_mounts.push(images_mount);

    let mut volumes = vec![
        config_volume(cr, &scanner_pod.scanner.name),
        config_volume(cr, &facade.name),
        empty_dir_volume(IMAGES_VOLUME),
    ];

    // Pulling through the docker daemon needs its socket
    if !facade.image_puller_type.eq_ignore_ascii_case("skopeo") {
        getter_mounts.push(volume_mount("dir-docker-socket", DOCKER_SOCKET));
        image_getter.security_context = Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        });
        volumes.push(Volume {
            name: "dir-docker-socket".to_string(),
            host_path: Some(HostPathVolumeSource {
                path: DOCKER_SOCKET.to_string(),
                type_: None,
            }),
            ..Default::default()
        });
    }

    let mut pod = pod.clone();
    if scanner_pod.replica_count > 0 {
        pod.replicas = scanner_pod.replica_count;
    }

    let pod_spec = pod_spec(
        cr,
        vec![scanner, image_getter],
        volumes,
        Some(scanner_service_account(cr)),
    );
    Ok(Some(replication_controller(&pod, cr, &scanner_pod.name, pod_spec)))
}

fn skyfire(
    pod: &PodResource,
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let spec = &cr.spec;
    if !spec.enable_skyfire {
        return Ok(None);
    }
    let name = &spec.skyfire.name;

    let mut container = process_container(
        cr,
        pod,
        SKYFIRE_CONTAINER,
        name,
        spec.skyfire.port,
        requests(&spec.default_cpu, &spec.default_mem)?,
    );
    container.command = Some(vec!["python3".to_string()]);
    container.args = Some(vec![
        "src/main.py".to_string(),
        format!("/etc/{}/{}.json", name, spec.config_map_name),
    ]);
    container.ports.get_or_insert_with(Vec::new).push(ContainerPort {
        container_port: spec.skyfire.prometheus_port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    });
    container.env_from = Some(vec![env_from_secret(&secret_name(cr))]);
    container
        .volume_mounts
        .get_or_insert_with(Vec::new)
        .push(volume_mount("logs", "/tmp"));

    let pod_spec = pod_spec(
        cr,
        vec![container],
        vec![config_volume(cr, name), empty_dir_volume("logs")],
        Some(skyfire_service_account(cr)),
    );
    Ok(Some(replication_controller(pod, cr, name, pod_spec)))
}

/// Prometheus scraping every OpsSight process
fn metrics(
    pod: &PodResource,
    ctx: &GenerationContext<'_, OpsSight>,
) -> Result<Option<Deployment>> {
    let cr = ctx.cr;
    if !cr.spec.enable_metrics {
        return Ok(None);
    }
    let name = &cr.spec.prometheus.name;
    let labels = get_label(name, &cr.name_any());

    let container = PodContainer {
        name: name.clone(),
        image: Some(pod.image(OPSSIGHT_METRICS_CONTAINER)),
        args: Some(
            [
                "--log.level=debug",
                "--config.file=/etc/prometheus/prometheus.yml",
                "--storage.tsdb.path=/tmp/data/",
                "--storage.tsdb.retention=120d",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .collect(),
        ),
        ports: Some(vec![ContainerPort {
            name: Some("web".to_string()),
            container_port: cr.spec.prometheus.port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![
            volume_mount("data", "/data"),
            volume_mount(name, "/etc/prometheus"),
        ]),
        ..Default::default()
    };

    let volumes = vec![
        empty_dir_volume("data"),
        config_map_volume(name, &metrics_config_map_name(cr)),
    ];

    Ok(Some(Deployment {
        metadata: object_meta(&resource_name(cr, name), &pod.namespace, labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(pod.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec(cr, vec![container], volumes, None)),
            },
            ..Default::default()
        }),
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::opssight;
    use super::*;
    use crate::types::Container;
    use crate::OperatorConfig;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::HashMap;

    fn pod(containers: &[(ContainerName, &str)]) -> PodResource {
        PodResource {
            namespace: "ops".to_string(),
            replicas: 1,
            containers: containers
                .iter()
                .map(|(name, image)| (*name, Container::with_size(image.to_string(), None)))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn template_spec(rc: &ReplicationController) -> PodSpec {
        rc.spec
            .as_ref()
            .and_then(|s| s.template.as_ref())
            .and_then(|t| t.spec.clone())
            .unwrap()
    }

    #[test]
    fn test_core_reads_config_and_secret() {
        let config = OperatorConfig::default();
        let cr = opssight("ops", "2.2.4");
        let ctx = GenerationContext::new(&config, None, &cr);

        let rc = core(&pod(&[(OPSSIGHT_CORE_CONTAINER, "core:1")]), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(rc.metadata.name.as_deref(), Some("ops-opssight-opssight-core"));
        let spec = template_spec(&rc);
        let container = &spec.containers[0];
        assert_eq!(container.command, Some(vec!["./opssight-core".to_string()]));
        assert_eq!(
            container.args,
            Some(vec!["/etc/opssight-core/opssight.json".to_string()])
        );
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 3001);
        let secret = container.env_from.as_ref().unwrap()[0].secret_ref.as_ref().unwrap();
        assert_eq!(secret.name.as_deref(), Some("ops-opssight-blackduck"));
        let requests = container.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests["cpu"], Quantity("300m".to_string()));
        assert_eq!(requests["memory"], Quantity("1300Mi".to_string()));
        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert_eq!(
            volume.config_map.as_ref().unwrap().name.as_deref(),
            Some("ops-opssight-opssight")
        );
    }

    #[test]
    fn test_invalid_request_rejected() {
        let config = OperatorConfig::default();
        let mut cr = opssight("ops", "2.2.4");
        cr.spec.default_mem = "a lot".to_string();
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(core(&pod(&[(OPSSIGHT_CORE_CONTAINER, "core:1")]), &ctx).is_err());
    }

    #[test]
    fn test_processors_are_optional() {
        let config = OperatorConfig::default();
        let mut cr = opssight("ops", "2.2.4");
        let ctx = GenerationContext::new(&config, None, &cr);
        let processor_pod = pod(&[
            (OPSSIGHT_POD_PROCESSOR_CONTAINER, "pod:1"),
            (OPSSIGHT_IMAGE_PROCESSOR_CONTAINER, "image:1"),
        ]);

        let rc = pod_processor(&processor_pod, &ctx).unwrap().unwrap();
        let spec = template_spec(&rc);
        assert_eq!(
            spec.service_account_name.as_deref(),
            Some("ops-opssight-opssight-processor")
        );
        assert_eq!(spec.containers[0].volume_mounts.as_ref().unwrap().len(), 2);
        assert!(image_processor(&processor_pod, &ctx).unwrap().is_none());

        cr.spec.perceiver.enable_pod_perceiver = false;
        cr.spec.perceiver.enable_image_perceiver = true;
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(pod_processor(&processor_pod, &ctx).unwrap().is_none());
        let rc = image_processor(&processor_pod, &ctx).unwrap().unwrap();
        assert_eq!(
            rc.metadata.name.as_deref(),
            Some("ops-opssight-opssight-image-processor")
        );
    }

    #[test]
    fn test_scanner_pod() {
        let config = OperatorConfig::default();
        let mut cr = opssight("ops", "2.2.4");
        let scanner_pod = pod(&[
            (OPSSIGHT_SCANNER_CONTAINER, "scanner:1"),
            (OPSSIGHT_IMAGE_GETTER_CONTAINER, "getter:1"),
        ]);

        let ctx = GenerationContext::new(&config, None, &cr);
        let rc = scanner(&scanner_pod, &ctx).unwrap().unwrap();
        assert_eq!(rc.spec.as_ref().unwrap().replicas, Some(1));
        let spec = template_spec(&rc);
        assert_eq!(spec.containers.len(), 2);
        assert_eq!(spec.volumes.as_ref().unwrap().len(), 3);
        assert!(spec.containers[1].security_context.is_none());
        assert_eq!(
            spec.service_account_name.as_deref(),
            Some("ops-opssight-opssight-scanner")
        );

        cr.spec.scanner_pod.replica_count = 4;
        cr.spec.scanner_pod.image_facade.image_puller_type = "docker".to_string();
        let ctx = GenerationContext::new(&config, None, &cr);
        let rc = scanner(&scanner_pod, &ctx).unwrap().unwrap();
        assert_eq!(rc.spec.as_ref().unwrap().replicas, Some(4));
        let spec = template_spec(&rc);
        let getter = &spec.containers[1];
        assert_eq!(
            getter.security_context.as_ref().and_then(|s| s.privileged),
            Some(true)
        );
        assert!(spec
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .any(|v| v.host_path.as_ref().map(|h| h.path.as_str()) == Some(DOCKER_SOCKET)));
    }

    #[test]
    fn test_skyfire_and_metrics_toggles() {
        let config = OperatorConfig::default();
        let mut cr = opssight("ops", "2.2.4");
        let skyfire_pod = pod(&[(SKYFIRE_CONTAINER, "skyfire:1")]);
        let metrics_pod = pod(&[(OPSSIGHT_METRICS_CONTAINER, "prom:1")]);

        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(skyfire(&skyfire_pod, &ctx).unwrap().is_none());
        let deployment = metrics(&metrics_pod, &ctx).unwrap().unwrap();
        assert_eq!(
            deployment.metadata.name.as_deref(),
            Some("ops-opssight-prometheus")
        );

        cr.spec.enable_skyfire = true;
        cr.spec.enable_metrics = false;
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(metrics(&metrics_pod, &ctx).unwrap().is_none());
        let rc = skyfire(&skyfire_pod, &ctx).unwrap().unwrap();
        let container = &template_spec(&rc).containers[0];
        assert_eq!(container.command, Some(vec!["python3".to_string()]));
        assert_eq!(container.ports.as_ref().unwrap().len(), 2);
    }
}
