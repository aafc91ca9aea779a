//! OpsSight settings, the prometheus scrape configuration and the Black Duck
//! credentials secret

use super::{get_label, resource_name};
use crate::crds::OpsSight;
use crate::error::Result;
use crate::orchestrator::CustomResourceSpec;
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::{OPSSIGHT_CONFIGMAP_V1, OPSSIGHT_METRICS_CONFIGMAP_V1, OPSSIGHT_SECRET_V1};
use crate::util::object_meta;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Key of the secured registries document in the secret
pub(super) const SECURED_REGISTRIES_KEY: &str = "securedRegistries.json";

pub(super) fn register(store: &mut ComponentStore<OpsSight>) -> Result<()> {
    store.register_config_map(OPSSIGHT_CONFIGMAP_V1, settings)?;
    store.register_config_map(OPSSIGHT_METRICS_CONFIGMAP_V1, metrics)?;
    store.register_secret(OPSSIGHT_SECRET_V1, credentials)?;
    Ok(())
}

pub(super) fn config_map_name(cr: &OpsSight) -> String {
    resource_name(cr, &cr.spec.config_map_name)
}

pub(super) fn metrics_config_map_name(cr: &OpsSight) -> String {
    resource_name(cr, &cr.spec.prometheus.name)
}

pub(super) fn secret_name(cr: &OpsSight) -> String {
    resource_name(cr, &cr.spec.secret_name)
}

/// Settings document shared by every OpsSight process
fn settings_document(cr: &OpsSight) -> Value {
    let spec = &cr.spec;
    let perceptor = &spec.perceptor;
    let scanner_pod = &spec.scanner_pod;
    let perceiver = &spec.perceiver;
    let skyfire = &spec.skyfire;

    json!({
        "LogLevel": spec.log_level,
        "BlackDuck": {
            "ConnectionsEnvironmentVariableName": spec.blackduck.connections_environment_variable_name,
            "TLSVerification": spec.blackduck.tls_verification,
        },
        "ImageFacade": {
            "Host": "localhost",
            "Port": scanner_pod.image_facade.port,
            "ImagePullerType": scanner_pod.image_facade.image_puller_type,
            "CreateImagesOnly": false,
        },
        "Perceiver": {
            "Image": {},
            "Pod": { "NamespaceFilter": perceiver.namespace_filter },
            "AnnotationIntervalSeconds": perceiver.annotation_interval_seconds,
            "DumpIntervalMinutes": perceiver.dump_interval_minutes,
            "Port": perceiver.port,
        },
        "Perceptor": {
            "Timings": {
                "CheckForStalledScansPauseHours": perceptor.check_for_stalled_scans_pause_hours,
                "StalledScanClientTimeoutHours": perceptor.stalled_scan_client_timeout_hours,
                "ModelMetricsPauseSeconds": perceptor.model_metrics_pause_seconds,
                "UnknownImagePauseMilliseconds": perceptor.unknown_image_pause_milliseconds,
                "ClientTimeoutMilliseconds": perceptor.client_timeout_milliseconds,
            },
            "Host": resource_name(cr, &perceptor.name),
            "Port": perceptor.port,
            "UseMockMode": false,
        },
        "Scanner": {
            "Port": scanner_pod.scanner.port,
            "ImageDirectory": scanner_pod.image_directory,
            "BlackDuckClientTimeoutSeconds": scanner_pod.scanner.client_timeout_seconds,
        },
        "Skyfire": {
            "UseInClusterConfig": true,
            "Port": skyfire.port,
            "PrometheusPort": skyfire.prometheus_port,
            "BlackDuckClientTimeoutSeconds": skyfire.hub_client_timeout_seconds,
            "BlackDuckDumpPauseSeconds": skyfire.hub_dump_pause_seconds,
            "KubeDumpIntervalSeconds": skyfire.kube_dump_interval_seconds,
            "PerceptorDumpIntervalSeconds": skyfire.perceptor_dump_interval_seconds,
        },
    })
}

fn settings(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ConfigMap>> {
    let cr = ctx.cr;
    let document = serde_json::to_string(&settings_document(cr))?;
    let key = format!("{}.json", cr.spec.config_map_name);
    Ok(vec![ConfigMap {
        metadata: object_meta(
            &config_map_name(cr),
            &cr.target_namespace(),
            get_label(&cr.spec.config_map_name, &cr.name_any()),
        ),
        data: Some(BTreeMap::from([(key, document)])),
        ..Default::default()
    }])
}

/// `host:port` of every process prometheus scrapes
fn scrape_targets(cr: &OpsSight) -> Vec<String> {
    let spec = &cr.spec;
    let target = |name: &str, port: i32| format!("{}:{}", resource_name(cr, name), port);

    let mut targets = vec![
        target(&spec.perceptor.name, spec.perceptor.port),
        target(&spec.scanner_pod.scanner.name, spec.scanner_pod.scanner.port),
        target(&spec.scanner_pod.image_facade.name, spec.scanner_pod.image_facade.port),
    ];
    if spec.perceiver.enable_image_perceiver {
        targets.push(target(&spec.perceiver.image_perceiver_name, spec.perceiver.port));
    }
    if spec.perceiver.enable_pod_perceiver {
        targets.push(target(&spec.perceiver.pod_perceiver_name, spec.perceiver.port));
    }
    if spec.enable_skyfire {
        targets.push(target(&spec.skyfire.name, spec.skyfire.prometheus_port));
    }
    targets
}

fn metrics(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<ConfigMap>> {
    let cr = ctx.cr;
    if !cr.spec.enable_metrics {
        return Ok(Vec::new());
    }
    let document = json!({
        "global": { "scrape_interval": "5s" },
        "scrape_configs": [{
            "job_name": "perceptor-scrape",
            "scrape_interval": "5s",
            "static_configs": [{ "targets": scrape_targets(cr) }],
        }],
    });

    Ok(vec![ConfigMap {
        metadata: object_meta(
            &metrics_config_map_name(cr),
            &cr.target_namespace(),
            get_label(&cr.spec.prometheus.name, &cr.name_any()),
        ),
        data: Some(BTreeMap::from([(
            "prometheus.yml".to_string(),
            serde_json::to_string(&document)?,
        )])),
        ..Default::default()
    }])
}

/// Black Duck hosts keyed by domain and secured registries keyed by url
fn credentials(ctx: &GenerationContext<'_, OpsSight>) -> Result<Vec<Secret>> {
    let cr = ctx.cr;
    let spec = &cr.spec;

    let hosts: Map<String, Value> = spec
        .blackduck
        .external_hosts
        .iter()
        .map(|host| Ok((host.domain.clone(), serde_json::to_value(host)?)))
        .collect::<Result<_>>()?;
    let registries: Map<String, Value> = spec
        .scanner_pod
        .image_facade
        .internal_registries
        .iter()
        .map(|registry| Ok((registry.url.clone(), serde_json::to_value(registry)?)))
        .collect::<Result<_>>()?;

    let data = BTreeMap::from([
        (
            spec.blackduck.connections_environment_variable_name.clone(),
            ByteString(serde_json::to_vec(&hosts)?),
        ),
        (
            SECURED_REGISTRIES_KEY.to_string(),
            ByteString(serde_json::to_vec(&registries)?),
        ),
    ]);

    Ok(vec![Secret {
        metadata: object_meta(
            &secret_name(cr),
            &cr.target_namespace(),
            get_label(&spec.secret_name, &cr.name_any()),
        ),
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::opssight;
    use super::*;
    use crate::crds::{Host, RegistryAuth};
    use crate::OperatorConfig;

    #[test]
    fn test_settings_document() {
        let config = OperatorConfig::default();
        let cr = opssight("ops", "2.2.4");
        let ctx = GenerationContext::new(&config, None, &cr);

        let maps = settings(&ctx).unwrap();
        assert_eq!(maps[0].metadata.name.as_deref(), Some("ops-opssight-opssight"));
        let raw = &maps[0].data.as_ref().unwrap()["opssight.json"];
        let document: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(document["LogLevel"], "info");
        assert_eq!(document["Perceptor"]["Host"], "ops-opssight-opssight-core");
        assert_eq!(document["Perceptor"]["Port"], 3001);
        assert_eq!(document["Scanner"]["ImageDirectory"], "/var/images");
        assert_eq!(
            document["BlackDuck"]["ConnectionsEnvironmentVariableName"],
            "blackduck.json"
        );
    }

    #[test]
    fn test_scrape_targets_follow_features() {
        let mut cr = opssight("ops", "2.2.4");
        assert_eq!(
            scrape_targets(&cr),
            vec![
                "ops-opssight-opssight-core:3001",
                "ops-opssight-opssight-scanner:3003",
                "ops-opssight-opssight-image-getter:3004",
                "ops-opssight-opssight-pod-processor:3002",
            ]
        );

        cr.spec.enable_skyfire = true;
        cr.spec.perceiver.enable_image_perceiver = true;
        let targets = scrape_targets(&cr);
        assert_eq!(targets.len(), 6);
        assert!(targets.contains(&"ops-opssight-skyfire:3006".to_string()));
    }

    #[test]
    fn test_metrics_config_disabled() {
        let config = OperatorConfig::default();
        let mut cr = opssight("ops", "2.2.4");
        let ctx = GenerationContext::new(&config, None, &cr);
        let maps = metrics(&ctx).unwrap();
        assert!(maps[0].data.as_ref().unwrap()["prometheus.yml"].contains("perceptor-scrape"));

        cr.spec.enable_metrics = false;
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(metrics(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_credentials() {
        let config = OperatorConfig::default();
        let mut cr = opssight("ops", "2.2.4");
        cr.spec.blackduck.external_hosts = vec![Host {
            scheme: "https".to_string(),
            domain: "hub.example.com".to_string(),
            port: 443,
            user: "sysadmin".to_string(),
            password: "secret".to_string(),
            concurrent_scan_limit: 2,
        }];
        cr.spec.scanner_pod.image_facade.internal_registries = vec![RegistryAuth {
            url: "registry.local".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        }];
        let ctx = GenerationContext::new(&config, None, &cr);

        let secrets = credentials(&ctx).unwrap();
        let secret = &secrets[0];
        assert_eq!(secret.metadata.name.as_deref(), Some("ops-opssight-blackduck"));
        let data = secret.data.as_ref().unwrap();

        let hosts: Value = serde_json::from_slice(&data["blackduck.json"].0).unwrap();
        assert_eq!(hosts["hub.example.com"]["concurrentScanLimit"], 2);
        let registries: Value = serde_json::from_slice(&data[SECURED_REGISTRIES_KEY].0).unwrap();
        assert_eq!(registries["registry.local"]["Url"], "registry.local");
    }
}
