//! Cluster services of the OpsSight processes, optionally exposed

use super::{get_label, resource_name};
use crate::crds::OpsSight;
use crate::error::Result;
use crate::orchestrator::CustomResourceSpec;
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::*;
use crate::util::{labels, object_meta, tcp_port};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use kube::ResourceExt;

pub(super) fn register(store: &mut ComponentStore<OpsSight>) -> Result<()> {
    store.register_service(OPSSIGHT_CORE_SERVICE_V1, |ctx| {
        let perceptor = &ctx.cr.spec.perceptor;
        Ok(vec![cluster_ip(ctx.cr, &perceptor.name, &perceptor.name, perceptor.port)])
    })?;
    store.register_service(OPSSIGHT_EXPOSE_CORE_SERVICE_V1, |ctx| {
        let perceptor = &ctx.cr.spec.perceptor;
        Ok(exposed(ctx.cr, &perceptor.name, &perceptor.expose, vec![port(perceptor.port)]))
    })?;
    store.register_service(OPSSIGHT_POD_PROCESSOR_SERVICE_V1, |ctx| {
        let perceiver = &ctx.cr.spec.perceiver;
        Ok(optional(perceiver.enable_pod_perceiver, || {
            let name = &perceiver.pod_perceiver_name;
            cluster_ip(ctx.cr, name, name, perceiver.port)
        }))
    })?;
    store.register_service(OPSSIGHT_IMAGE_PROCESSOR_SERVICE_V1, |ctx| {
        let perceiver = &ctx.cr.spec.perceiver;
        Ok(optional(perceiver.enable_image_perceiver, || {
            let name = &perceiver.image_perceiver_name;
            cluster_ip(ctx.cr, name, name, perceiver.port)
        }))
    })?;
    store.register_service(OPSSIGHT_IMAGE_GETTER_SERVICE_V1, |ctx| {
        let scanner_pod = &ctx.cr.spec.scanner_pod;
        let facade = &scanner_pod.image_facade;
        Ok(vec![cluster_ip(ctx.cr, &facade.name, &scanner_pod.name, facade.port)])
    })?;
    store.register_service(OPSSIGHT_SCANNER_SERVICE_V1, |ctx| {
        let scanner_pod = &ctx.cr.spec.scanner_pod;
        let scanner = &scanner_pod.scanner;
        Ok(vec![cluster_ip(ctx.cr, &scanner.name, &scanner_pod.name, scanner.port)])
    })?;
    store.register_service(OPSSIGHT_METRICS_SERVICE_V1, metrics)?;
    store.register_service(OPSSIGHT_EXPOSE_METRICS_SERVICE_V1, |ctx| {
        let spec = &ctx.cr.spec;
        if !spec.enable_metrics {
            return Ok(Vec::new());
        }
        let prometheus = &spec.prometheus;
        Ok(exposed(ctx.cr, &prometheus.name, &prometheus.expose, vec![metrics_port(prometheus.port)]))
    })?;
    store.register_service(SKYFIRE_SERVICE_V1, skyfire)?;
    Ok(())
}

fn optional(enabled: bool, service: impl FnOnce() -> Service) -> Vec<Service> {
    if enabled {
        vec![service()]
    } else {
        Vec::new()
    }
}

fn port(port: i32) -> ServicePort {
    tcp_port(&format!("port-{}", port), port)
}

fn metrics_port(port: i32) -> ServicePort {
    tcp_port("web", port)
}

fn service(
    cr: &OpsSight,
    name: &str,
    component: &str,
    service_type: &str,
    ports: Vec<ServicePort>,
) -> Service {
    let instance = cr.name_any();
    Service {
        metadata: object_meta(name, &cr.target_namespace(), get_label(component, &instance)),
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(get_label(component, &instance)),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `<cr>-opssight-<name>` in front of the `selector` pods
fn cluster_ip(cr: &OpsSight, name: &str, selector: &str, target: i32) -> Service {
    let mut svc = service(cr, &resource_name(cr, name), selector, "ClusterIP", vec![port(target)]);
    svc.metadata.labels = Some(get_label(name, &cr.name_any()));
    svc
}

/// `<cr>-opssight-<component>-exposed` as a node port or load balancer
fn exposed(cr: &OpsSight, component: &str, expose: &str, ports: Vec<ServicePort>) -> Vec<Service> {
    let service_type = match expose.to_ascii_uppercase().as_str() {
        "NODEPORT" => "NodePort",
        "LOADBALANCER" => "LoadBalancer",
        _ => return Vec::new(),
    };
    let name = resource_name(cr, &format!("{}-exposed", component));
    vec![service(cr, &name, component, service_type, ports)]
}

fn metrics(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<Service>> {
    let cr = ctx.cr;
    if !cr.spec.enable_metrics {
        return Ok(Vec::new());
    }
    let prometheus = &cr.spec.prometheus;
    let mut svc = service(
        cr,
        &resource_name(cr, &prometheus.name),
        &prometheus.name,
        "ClusterIP",
        vec![metrics_port(prometheus.port)],
    );
    svc.metadata.annotations = Some(labels([("prometheus.io/scrape", "true")]));
    Ok(vec![svc])
}

fn skyfire(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<Service>> {
    let cr = ctx.cr;
    if !cr.spec.enable_skyfire {
        return Ok(Vec::new());
    }
    let skyfire = &cr.spec.skyfire;
    Ok(vec![service(
        cr,
        &resource_name(cr, &skyfire.name),
        &skyfire.name,
        "ClusterIP",
        vec![port(skyfire.port), port(skyfire.prometheus_port)],
    )])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::opssight;
    use super::*;
    use crate::OperatorConfig;

    fn generate(cr: &OpsSight) -> Vec<Service> {
        let config = OperatorConfig::default();
        let mut store = ComponentStore::new();
        register(&mut store).unwrap();
        let ctx = GenerationContext::new(&config, None, cr);
        [
            OPSSIGHT_CORE_SERVICE_V1,
            OPSSIGHT_EXPOSE_CORE_SERVICE_V1,
            OPSSIGHT_POD_PROCESSOR_SERVICE_V1,
            OPSSIGHT_IMAGE_PROCESSOR_SERVICE_V1,
            OPSSIGHT_IMAGE_GETTER_SERVICE_V1,
            OPSSIGHT_SCANNER_SERVICE_V1,
            OPSSIGHT_METRICS_SERVICE_V1,
            OPSSIGHT_EXPOSE_METRICS_SERVICE_V1,
            SKYFIRE_SERVICE_V1,
        ]
        .iter()
        .flat_map(|name| store.service(*name).unwrap()(&ctx).unwrap())
        .collect()
    }

    fn names(services: &[Service]) -> Vec<String> {
        services
            .iter()
            .filter_map(|svc| svc.metadata.name.clone())
            .collect()
    }

    #[test]
    fn test_default_services() {
        let services = generate(&opssight("ops", "2.2.4"));
        assert_eq!(
            names(&services),
            vec![
                "ops-opssight-opssight-core",
                "ops-opssight-opssight-pod-processor",
                "ops-opssight-opssight-image-getter",
                "ops-opssight-opssight-scanner",
                "ops-opssight-prometheus",
            ]
        );

        let getter = &services[2];
        let spec = getter.spec.as_ref().unwrap();
        assert_eq!(spec.selector.as_ref().unwrap()["component"], "opssight-scanner");
        assert_eq!(spec.ports.as_ref().unwrap()[0].port, 3004);
        assert_eq!(
            getter.metadata.labels.as_ref().unwrap()["component"],
            "opssight-image-getter"
        );

        let metrics = &services[4];
        assert_eq!(
            metrics.metadata.annotations.as_ref().unwrap()["prometheus.io/scrape"],
            "true"
        );
    }

    #[test]
    fn test_exposed_services() {
        let mut cr = opssight("ops", "2.2.4");
        cr.spec.perceptor.expose = "nodeport".to_string();
        cr.spec.prometheus.expose = "LOADBALANCER".to_string();
        cr.spec.enable_skyfire = true;

        let services = generate(&cr);
        let find = |name: &str| {
            services
                .iter()
                .find(|svc| svc.metadata.name.as_deref() == Some(name))
                .and_then(|svc| svc.spec.clone())
                .unwrap()
        };
        assert_eq!(
            find("ops-opssight-opssight-core-exposed").type_.as_deref(),
            Some("NodePort")
        );
        assert_eq!(
            find("ops-opssight-prometheus-exposed").type_.as_deref(),
            Some("LoadBalancer")
        );
        assert_eq!(find("ops-opssight-skyfire").ports.unwrap().len(), 2);
    }
}
