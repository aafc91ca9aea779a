//! Global and database config maps

use super::{get_version_label, resource_name};
use crate::crds::Blackduck;
use crate::error::Result;
use crate::orchestrator::{CustomResourceSpec, DATABASE_COMPONENT};
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::{BLACKDUCK_DATABASE_CONFIGMAP_V1, BLACKDUCK_GLOBAL_CONFIGMAP_V1};
use crate::util::{object_meta, parse_environs};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Suffix of the global config map name
pub(super) const GLOBAL_CONFIG: &str = "config";
/// Suffix of the database config map name
pub(super) const DATABASE_CONFIG: &str = "db-config";

pub(super) fn register(store: &mut ComponentStore<Blackduck>) -> Result<()> {
    store.register_config_map(BLACKDUCK_GLOBAL_CONFIGMAP_V1, global)?;
    store.register_config_map(BLACKDUCK_DATABASE_CONFIGMAP_V1, database)?;
    Ok(())
}

/// Product settings every instance starts from
pub fn default_knobs() -> BTreeMap<String, String> {
    [
        ("IPV4_ONLY", "0"),
        ("USE_ALERT", "0"),
        ("USE_BINARY_UPLOADS", "0"),
        ("RABBIT_MQ_PORT", "5671"),
        ("BROKER_USE_SSL", "yes"),
        ("SCANNER_CONCURRENCY", "1"),
        ("HTTPS_VERIFY_CERTS", "yes"),
        ("RABBITMQ_DEFAULT_VHOST", "protecodesc"),
        ("RABBITMQ_SSL_FAIL_IF_NO_PEER_CERT", "false"),
        ("ENABLE_SOURCE_UPLOADS", "false"),
        ("DATA_RETENTION_IN_DAYS", "180"),
        ("MAX_TOTAL_SOURCE_SIZE_MB", "4000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Service host names the containers reach each other through
fn host_entries(cr: &Blackduck) -> Vec<(&'static str, String)> {
    let host = |component: &str| resource_name(cr, component);
    vec![
        ("CLIENT_CERT_CN", host("binaryscanner")),
        ("CFSSL", format!("{}:8888", host("cfssl"))),
        ("HUB_CFSSL_HOST", host("cfssl")),
        ("BLACKDUCK_CFSSL_HOST", host("cfssl")),
        ("BLACKDUCK_CFSSL_PORT", "8888".to_string()),
        ("HUB_DOC_HOST", host("documentation")),
        ("HUB_JOBRUNNER_HOST", host("jobrunner")),
        ("HUB_LOGSTASH_HOST", host("logstash")),
        ("RABBIT_MQ_HOST", host("rabbitmq")),
        ("BROKER_URL", format!("amqps://{}/protecodesc", host("rabbitmq"))),
        ("HUB_REGISTRATION_HOST", host("registration")),
        ("HUB_SCAN_HOST", host("scan")),
        ("HUB_SOLR_HOST", host("solr")),
        ("HUB_UPLOAD_CACHE_HOST", host("uploadcache")),
        ("HUB_WEBAPP_HOST", host("webapp")),
        ("HUB_WEBSERVER_HOST", host("webserver")),
        ("HUB_ZOOKEEPER_HOST", host("zookeeper")),
    ]
}

/// Default knobs, host names and version, overlaid with the custom resource's
/// environs. An environ with an empty value removes the key.
fn global(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<ConfigMap>> {
    let cr = ctx.cr;
    let mut data = default_knobs();
    data.insert("RUN_SECRETS_DIR".to_string(), "/tmp/secrets".to_string());
    data.insert("HUB_VERSION".to_string(), cr.spec.version.clone());
    for (key, value) in host_entries(cr) {
        data.insert(key.to_string(), value);
    }

    for (key, value) in parse_environs(&cr.spec.environs) {
        if value.is_empty() {
            data.remove(&key);
        } else {
            data.insert(key, value);
        }
    }

    let labels = get_version_label("configmap", &cr.name_any(), &cr.spec.version);
    Ok(vec![ConfigMap {
        metadata: object_meta(
            &resource_name(cr, GLOBAL_CONFIG),
            &cr.target_namespace(),
            labels,
        ),
        data: Some(data),
        ..Default::default()
    }])
}

/// Connection settings of the bundled or the external database
fn database(ctx: &GenerationContext<'_, Blackduck>) -> Result<Vec<ConfigMap>> {
    let cr = ctx.cr;
    let mut data = BTreeMap::new();
    match &cr.spec.external_postgres {
        Some(external) => {
            data.insert("HUB_POSTGRES_ADMIN".to_string(), external.postgres_admin.clone());
            data.insert("HUB_POSTGRES_USER".to_string(), external.postgres_user.clone());
            data.insert("HUB_POSTGRES_PORT".to_string(), external.postgres_port.to_string());
            data.insert("HUB_POSTGRES_HOST".to_string(), external.postgres_host.clone());
            data.insert(
                "HUB_POSTGRES_ENABLE_SSL".to_string(),
                external.postgres_ssl.to_string(),
            );
        }
        None => {
            data.insert("HUB_POSTGRES_ADMIN".to_string(), "blackduck".to_string());
            data.insert("HUB_POSTGRES_USER".to_string(), "blackduck_user".to_string());
            data.insert("HUB_POSTGRES_PORT".to_string(), "5432".to_string());
            data.insert(
                "HUB_POSTGRES_HOST".to_string(),
                resource_name(cr, DATABASE_COMPONENT),
            );
            data.insert("HUB_POSTGRES_ENABLE_SSL".to_string(), "false".to_string());
        }
    }
    data.insert(
        "HUB_POSTGRES_ENABLE_SSL_CERT_AUTH".to_string(),
        "false".to_string(),
    );

    let labels = get_version_label(DATABASE_COMPONENT, &cr.name_any(), &cr.spec.version);
    Ok(vec![ConfigMap {
        metadata: object_meta(
            &resource_name(cr, DATABASE_CONFIG),
            &cr.target_namespace(),
            labels,
        ),
        data: Some(data),
        ..Default::default()
    }])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::blackduck;
    use super::*;
    use crate::crds::PostgresExternalDbConfig;
    use crate::OperatorConfig;

    fn data(map: &ConfigMap) -> &BTreeMap<String, String> {
        map.data.as_ref().unwrap()
    }

    #[test]
    fn test_global_config_map() {
        let config = OperatorConfig::default();
        let cr = blackduck("hub", "2019.6.0");
        let ctx = GenerationContext::new(&config, None, &cr);

        let maps = global(&ctx).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].metadata.name.as_deref(), Some("hub-blackduck-config"));
        let data = data(&maps[0]);
        assert_eq!(data["HUB_VERSION"], "2019.6.0");
        assert_eq!(data["SCANNER_CONCURRENCY"], "1");
        assert_eq!(data["BROKER_URL"], "amqps://hub-blackduck-rabbitmq/protecodesc");
        assert_eq!(data["CFSSL"], "hub-blackduck-cfssl:8888");
    }

    #[test]
    fn test_environs_override_and_remove() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.environs = vec![
            "SCANNER_CONCURRENCY:4".to_string(),
            "IPV4_ONLY:".to_string(),
            "HUB_PROXY_HOST:proxy.local".to_string(),
        ];
        let ctx = GenerationContext::new(&config, None, &cr);

        let maps = global(&ctx).unwrap();
        let data = data(&maps[0]);
        assert_eq!(data["SCANNER_CONCURRENCY"], "4");
        assert!(!data.contains_key("IPV4_ONLY"));
        assert_eq!(data["HUB_PROXY_HOST"], "proxy.local");
    }

    #[test]
    fn test_database_config_internal() {
        let config = OperatorConfig::default();
        let cr = blackduck("hub", "2019.6.0");
        let ctx = GenerationContext::new(&config, None, &cr);

        let maps = database(&ctx).unwrap();
        assert_eq!(maps[0].metadata.labels.as_ref().unwrap()["component"], "postgres");
        let data = data(&maps[0]);
        assert_eq!(data["HUB_POSTGRES_HOST"], "hub-blackduck-postgres");
        assert_eq!(data["HUB_POSTGRES_ENABLE_SSL"], "false");
    }

    #[test]
    fn test_database_config_external() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.external_postgres = Some(PostgresExternalDbConfig {
            postgres_host: "db.example.com".to_string(),
            postgres_port: 6543,
            postgres_admin: "admin".to_string(),
            postgres_user: "user".to_string(),
            postgres_ssl: true,
            ..Default::default()
        });
        let ctx = GenerationContext::new(&config, None, &cr);

        let maps = database(&ctx).unwrap();
        let data = data(&maps[0]);
        assert_eq!(data["HUB_POSTGRES_HOST"], "db.example.com");
        assert_eq!(data["HUB_POSTGRES_PORT"], "6543");
        assert_eq!(data["HUB_POSTGRES_ENABLE_SSL"], "true");
    }
}
