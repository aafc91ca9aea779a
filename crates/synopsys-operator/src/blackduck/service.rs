//! Cluster services of the sub-components and the optional exposed web server

use super::{get_label, resource_name};
use crate::crds::Blackduck;
use crate::error::Result;
use crate::orchestrator::{CustomResourceSpec, DATABASE_COMPONENT};
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::*;
use crate::util::{object_meta, tcp_port};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

pub(super) fn register(store: &mut ComponentStore<Blackduck>) -> Result<()> {
    store.register_service(BLACKDUCK_AUTHENTICATION_SERVICE_V1, |ctx| {
        simple(ctx, "authentication", "authentication", &[8443])
    })?;
    store.register_service(BLACKDUCK_CFSSL_SERVICE_V1, |ctx| simple(ctx, "cfssl", "cfssl", &[8888]))?;
    store.register_service(BLACKDUCK_DOCUMENTATION_SERVICE_V1, |ctx| {
        simple(ctx, "documentation", "documentation", &[8443])
    })?;
    store.register_service(BLACKDUCK_POSTGRES_SERVICE_V1, |ctx| {
        simple(ctx, DATABASE_COMPONENT, DATABASE_COMPONENT, &[5432])
    })?;
    store.register_service(BLACKDUCK_RABBITMQ_SERVICE_V1, |ctx| {
        simple(ctx, "rabbitmq", "rabbitmq", &[5671])
    })?;
    store.register_service(BLACKDUCK_REGISTRATION_SERVICE_V1, |ctx| {
        simple(ctx, "registration", "registration", &[8443])
    })?;
    store.register_service(BLACKDUCK_SCAN_SERVICE_V1, |ctx| simple(ctx, "scan", "scan", &[8443]))?;
    store.register_service(BLACKDUCK_SOLR_SERVICE_V1, |ctx| simple(ctx, "solr", "solr", &[8983]))?;
    store.register_service(BLACKDUCK_UPLOADCACHE_SERVICE_V1, |ctx| {
        simple(ctx, "uploadcache", "uploadcache", &[9443, 9444])
    })?;
    store.register_service(BLACKDUCK_WEBAPP_SERVICE_V1, |ctx| {
        simple(ctx, "webapp", "webapp-logstash", &[8443])
    })?;
    store.register_service(BLACKDUCK_LOGSTASH_SERVICE_V1, |ctx| {
        simple(ctx, "logstash", "webapp-logstash", &[5044])
    })?;
    store.register_service(BLACKDUCK_WEBSERVER_SERVICE_V1, webserver)?;
    store.register_service(BLACKDUCK_ZOOKEEPER_SERVICE_V1, |ctx| {
        simple(ctx, "zookeeper", "zookeeper", &[2181])
    })?;
    store.register_service(BLACKDUCK_EXPOSE_SERVICE_V1, exposed)?;
    Ok(())
}

fn service(
    cr: &Blackduck,
    name: &str,
    component: &str,
    selector: &str,
    service_type: &str,
    ports: Vec<ServicePort>,
) -> Service {
    let instance = cr.name_any();
    Service {
        metadata: object_meta(name, &cr.target_namespace(), get_label(component, &instance)),
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(get_label(selector, &instance)),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ClusterIP service `<cr>-blackduck-<component>` in front of the `selector` pods
fn simple(
    ctx: &GenerationContext<'_, Blackduck>,
    component: &str,
    selector: &str,
    ports: &[i32],
) -> Result<Vec<Service>> {
    let cr = ctx.cr;
    let ports = ports
        .iter()
        .map(|port| tcp_port(&format!("port-{}", port), *port))
        .collect();
    Ok(vec![service(
        cr,
        &resource_name(cr, component),
        component,
        selector,
        "ClusterIP",
        ports,
    )])
}

/// Port 443 routed to the web server's 8443
fn webserver_port() -> ServicePort {
    ServicePort {
        target_port: Some(IntOrString::Int(8443)),
        ..tcp_port("port-443", 443)
    }
}

fn webserver(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Service>> {
    let cr = ctx.cr;
    Ok(vec![service(
        cr,
        &resource_name(cr, "webserver"),
        "webserver",
        "webserver",
        "ClusterIP",
        vec![webserver_port()],
    )])
}

/// Web server exposed as a node port or load balancer, per `exposeService`
fn exposed(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<Service>> {
    let cr = ctx.cr;
    let service_type = match cr.spec.expose_service.to_ascii_uppercase().as_str() {
        "NODEPORT" => "NodePort",
        "LOADBALANCER" => "LoadBalancer",
        _ => return Ok(Vec::new()),
    };
    Ok(vec![service(
        cr,
        &resource_name(cr, "webserver-exposed"),
        "webserver",
        "webserver",
        service_type,
        vec![webserver_port()],
    )])
}
