//! Replication controllers of every Black Duck sub-component

use super::configmap::{DATABASE_CONFIG, GLOBAL_CONFIG};
use super::secret::{
    AUTH_CUSTOM_CA, AUTH_CUSTOM_CA_KEY, DB_CREDS, PROXY_CERTIFICATE, PROXY_CERTIFICATE_KEY,
    UPLOAD_CACHE, UPLOAD_CACHE_SEAL_KEY, WEB_CERTIFICATE, WEB_CERTIFICATE_CERT_KEY,
    WEB_CERTIFICATE_KEY_KEY,
};
use super::{get_label, get_pvc_name, get_version_label, is_binary_analysis_enabled, resource_name};
use crate::crds::Blackduck;
use crate::error::Result;
use crate::orchestrator::DATABASE_COMPONENT;
use crate::store::{ComponentStore, GenerationContext};
use crate::types::names::*;
use crate::types::{ContainerName, PodResource};
use crate::util::{
    empty_dir_volume, env_from_config_map, env_var, image_pull_secrets, object_meta, pvc_volume,
    resource_requirements, volume_mount,
};
use k8s_openapi::api::core::v1::{
    Container as PodContainer, ContainerPort, EnvVar, EnvVarSource, ExecAction, KeyToPath,
    PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    ReplicationController, ReplicationControllerSpec, SecretKeySelector, SecretVolumeSource,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

const SECRETS_DIR: &str = "/tmp/secrets";
const HEALTHCHECK: &str = "/usr/local/bin/docker-healthcheck.sh";
const DB_PASSWORDS_VOLUME: &str = "db-passwords";
const ADMIN_PASSWORD_FILE: &str = "HUB_POSTGRES_ADMIN_PASSWORD_FILE";
const USER_PASSWORD_FILE: &str = "HUB_POSTGRES_USER_PASSWORD_FILE";
const POSTGRES_PASSWORD_FILE: &str = "HUB_POSTGRES_POSTGRES_PASSWORD_FILE";

pub(super) fn register(store: &mut ComponentStore<Blackduck>) -> Result<()> {
    store.register_rc(BLACKDUCK_AUTHENTICATION_RC_V1, authentication)?;
    store.register_rc(BLACKDUCK_BINARYSCANNER_RC_V1, binaryscanner)?;
    store.register_rc(BLACKDUCK_CFSSL_RC_V1, cfssl)?;
    store.register_rc(BLACKDUCK_DOCUMENTATION_RC_V1, documentation)?;
    store.register_rc(BLACKDUCK_JOBRUNNER_RC_V1, jobrunner)?;
    store.register_rc(BLACKDUCK_POSTGRES_RC_V1, postgres)?;
    store.register_rc(BLACKDUCK_RABBITMQ_RC_V1, rabbitmq)?;
    store.register_rc(BLACKDUCK_REGISTRATION_RC_V1, registration)?;
    store.register_rc(BLACKDUCK_SCAN_RC_V1, scan)?;
    store.register_rc(BLACKDUCK_SOLR_RC_V1, solr)?;
    store.register_rc(BLACKDUCK_UPLOADCACHE_RC_V1, uploadcache)?;
    store.register_rc(BLACKDUCK_WEBAPP_LOGSTASH_RC_V1, webapp_logstash)?;
    store.register_rc(BLACKDUCK_WEBSERVER_RC_V1, webserver)?;
    store.register_rc(BLACKDUCK_ZOOKEEPER_RC_V1, zookeeper)?;
    Ok(())
}

/// Builder over the pod container of one sub-component
struct ContainerBuilder {
    inner: PodContainer,
}

impl ContainerBuilder {
    fn new(name: ContainerName, pod: &PodResource) -> Self {
        let resolved = pod.container(name);
        Self {
            inner: PodContainer {
                name: name.as_str().to_string(),
                image: Some(pod.image(name)),
                image_pull_policy: Some("Always".to_string()),
                resources: resolved.and_then(resource_requirements),
                ..Default::default()
            },
        }
    }

    fn port(mut self, port: i32) -> Self {
        self.inner
            .ports
            .get_or_insert_with(Vec::new)
            .push(ContainerPort {
                container_port: port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            });
        self
    }

    fn env_from_config_map(mut self, config_map: &str) -> Self {
        self.inner
            .env_from
            .get_or_insert_with(Vec::new)
            .push(env_from_config_map(config_map));
        self
    }

    fn env(mut self, var: EnvVar) -> Self {
        self.inner.env.get_or_insert_with(Vec::new).push(var);
        self
    }

    fn mounts<I: IntoIterator<Item = VolumeMount>>(mut self, mounts: I) -> Self {
        self.inner
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .extend(mounts);
        self
    }

    fn mount(self, mount: VolumeMount) -> Self {
        self.mounts([mount])
    }

    fn liveness(mut self, probe: Option<Probe>) -> Self {
        self.inner.liveness_probe = probe;
        self
    }

    fn build(self) -> PodContainer {
        self.inner
    }
}

/// Exec probe, only when the custom resource enables liveness probes
fn liveness(cr: &Blackduck, command: &[&str], initial_delay: i32) -> Option<Probe> {
    if !cr.spec.liveness_probes {
        return None;
    }
    Some(Probe {
        exec: Some(ExecAction {
            command: Some(command.iter().map(|part| part.to_string()).collect()),
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(30),
        timeout_seconds: Some(10),
        failure_threshold: Some(10),
        ..Default::default()
    })
}

/// `-Xmx` for the java services, 512 MiB below the container limit
fn hub_max_memory(pod: &PodResource, name: ContainerName) -> EnvVar {
    let max_mem = pod.container(name).and_then(|c| c.max_mem).unwrap_or_default();
    let value = if max_mem > 512 {
        format!("{}m", max_mem - 512)
    } else {
        "2048m".to_string()
    };
    env_var("HUB_MAX_MEMORY", &value)
}

/// Claim backed volume when storage is persistent, `emptyDir` otherwise
fn data_volume(cr: &Blackduck, volume: &str, claim: &str, with_claim: bool) -> Volume {
    if cr.spec.persistent_storage && with_claim {
        pvc_volume(volume, &get_pvc_name(claim, cr))
    } else {
        empty_dir_volume(volume)
    }
}

fn sub_path_mount(volume: &str, mount_path: &str, sub_path: &str) -> VolumeMount {
    VolumeMount {
        sub_path: Some(sub_path.to_string()),
        ..volume_mount(volume, mount_path)
    }
}

fn secret_file_mount(volume: &str, key: &str) -> VolumeMount {
    sub_path_mount(volume, &format!("{}/{}", SECRETS_DIR, key), key)
}

fn secret_items_volume(volume: &str, secret: &str, keys: &[&str]) -> Volume {
    Volume {
        name: volume.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            items: Some(
                keys.iter()
                    .map(|key| KeyToPath {
                        key: key.to_string(),
                        path: key.to_string(),
                        mode: Some(420),
                    })
                    .collect(),
            ),
            default_mode: Some(420),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn db_passwords_volume(cr: &Blackduck) -> Volume {
    secret_items_volume(
        DB_PASSWORDS_VOLUME,
        &resource_name(cr, DB_CREDS),
        &[ADMIN_PASSWORD_FILE, USER_PASSWORD_FILE],
    )
}

fn db_passwords_mounts() -> Vec<VolumeMount> {
    vec![
        secret_file_mount(DB_PASSWORDS_VOLUME, ADMIN_PASSWORD_FILE),
        secret_file_mount(DB_PASSWORDS_VOLUME, USER_PASSWORD_FILE),
    ]
}

/// Secret file volume and its mount, present when `value` is set
fn optional_secret_file(
    cr: &Blackduck,
    value: &str,
    volume: &str,
    secret: &str,
    key: &str,
) -> Option<(Volume, VolumeMount)> {
    if value.is_empty() {
        return None;
    }
    Some((
        secret_items_volume(volume, &resource_name(cr, secret), &[key]),
        secret_file_mount(volume, key),
    ))
}

fn proxy_certificate(cr: &Blackduck) -> Option<(Volume, VolumeMount)> {
    optional_secret_file(
        cr,
        &cr.spec.proxy_certificate,
        "blackduck-proxy-certificate",
        PROXY_CERTIFICATE,
        PROXY_CERTIFICATE_KEY,
    )
}

fn auth_custom_ca(cr: &Blackduck) -> Option<(Volume, VolumeMount)> {
    optional_secret_file(
        cr,
        &cr.spec.auth_custom_ca,
        "blackduck-auth-custom-ca",
        AUTH_CUSTOM_CA,
        AUTH_CUSTOM_CA_KEY,
    )
}

/// Splits optional volume and mount pairs into the two lists
fn with_optional(
    volumes: &mut Vec<Volume>,
    mounts: &mut Vec<VolumeMount>,
    extras: impl IntoIterator<Item = Option<(Volume, VolumeMount)>>,
) {
    for (volume, mount) in extras.into_iter().flatten() {
        volumes.push(volume);
        mounts.push(mount);
    }
}

fn replication_controller(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
    component: &str,
    containers: Vec<PodContainer>,
    volumes: Vec<Volume>,
) -> ReplicationController {
    let cr = ctx.cr;
    let name = cr.name_any();
    let labels = get_version_label(component, &name, &cr.spec.version);

    let image_pull_secrets = image_pull_secrets(cr.spec.registry_configuration.as_ref());

    let security_context = if ctx.config.is_openshift {
        None
    } else {
        Some(PodSecurityContext {
            fs_group: Some(0),
            ..Default::default()
        })
    };

    ReplicationController {
        metadata: object_meta(&resource_name(cr, component), &pod.namespace, labels.clone()),
        spec: Some(ReplicationControllerSpec {
            replicas: Some(pod.replicas),
            selector: Some(get_label(component, &name)),
            template: Some(PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    volumes: if volumes.is_empty() { None } else { Some(volumes) },
                    image_pull_secrets,
                    security_context,
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn authentication(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let security = "/opt/blackduck/hub/hub-authentication/security";
    let mut volumes = vec![
        data_volume(cr, "dir-authentication", "authentication", true),
        empty_dir_volume("dir-authentication-security"),
        db_passwords_volume(cr),
    ];
    let mut mounts = vec![
        volume_mount("dir-authentication", "/opt/blackduck/hub/hub-authentication/ldap"),
        volume_mount("dir-authentication-security", security),
    ];
    mounts.extend(db_passwords_mounts());
    with_optional(&mut volumes, &mut mounts, [proxy_certificate(cr), auth_custom_ca(cr)]);

    let container = ContainerBuilder::new(BLACKDUCK_AUTHENTICATION_CONTAINER, pod)
        .port(8443)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .env_from_config_map(&resource_name(cr, DATABASE_CONFIG))
        .env(hub_max_memory(pod, BLACKDUCK_AUTHENTICATION_CONTAINER))
        .mounts(mounts)
        .liveness(liveness(
            cr,
            &[
                HEALTHCHECK,
                "https://127.0.0.1:8443/api/health-checks/liveness",
                &format!("{}/root.crt", security),
                &format!("{}/blackduck_system.crt", security),
                &format!("{}/blackduck_system.key", security),
            ],
            240,
        ))
        .build();

    Ok(Some(replication_controller(pod, ctx, "authentication", vec![container], volumes)))
}

fn binaryscanner(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    if !is_binary_analysis_enabled(cr) {
        return Ok(None);
    }

    let container = ContainerBuilder::new(BLACKDUCK_BINARYSCANNER_CONTAINER, pod)
        .port(3001)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .build();

    Ok(Some(replication_controller(pod, ctx, "binaryscanner", vec![container], Vec::new())))
}

fn cfssl(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let container = ContainerBuilder::new(BLACKDUCK_CFSSL_CONTAINER, pod)
        .port(8888)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mount(volume_mount("dir-cfssl", "/etc/cfssl"))
        .liveness(liveness(
            cr,
            &[HEALTHCHECK, "http://localhost:8888/api/v1/cfssl/scaninfo"],
            240,
        ))
        .build();

    Ok(Some(replication_controller(
        pod,
        ctx,
        "cfssl",
        vec![container],
        vec![data_volume(cr, "dir-cfssl", "cfssl", true)],
    )))
}

fn documentation(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let container = ContainerBuilder::new(BLACKDUCK_DOCUMENTATION_CONTAINER, pod)
        .port(8443)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .liveness(liveness(
            cr,
            &[
                HEALTHCHECK,
                "https://127.0.0.1:8443/hubdoc/health-checks/liveness",
                "/opt/blackduck/hub/hub-documentation/security/root.crt",
            ],
            240,
        ))
        .build();

    Ok(Some(replication_controller(pod, ctx, "documentation", vec![container], Vec::new())))
}

fn jobrunner(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let mut volumes = vec![db_passwords_volume(cr)];
    let mut mounts = db_passwords_mounts();
    with_optional(&mut volumes, &mut mounts, [proxy_certificate(cr)]);

    let container = ContainerBuilder::new(BLACKDUCK_JOBRUNNER_CONTAINER, pod)
        .port(3001)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .env_from_config_map(&resource_name(cr, DATABASE_CONFIG))
        .env(hub_max_memory(pod, BLACKDUCK_JOBRUNNER_CONTAINER))
        .mounts(mounts)
        .liveness(liveness(cr, &[HEALTHCHECK], 240))
        .build();

    Ok(Some(replication_controller(pod, ctx, "jobrunner", vec![container], volumes)))
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: Some(secret.to_string()),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

/// Bundled database; nothing to run when an external one is configured
fn postgres(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    if cr.spec.external_postgres.is_some() {
        return Ok(None);
    }

    let creds = resource_name(cr, DB_CREDS);
    let container = ContainerBuilder::new(BLACKDUCK_POSTGRES_CONTAINER, pod)
        .port(5432)
        .env_from_config_map(&resource_name(cr, DATABASE_CONFIG))
        .env(env_var("POSTGRESQL_MAX_CONNECTIONS", "300"))
        .env(env_var("POSTGRESQL_SHARED_BUFFERS", "1024MB"))
        .env(env_var("POSTGRESQL_DATABASE", "blackduck"))
        .env(env_var("POSTGRESQL_USER", "blackduck"))
        .env(secret_env("POSTGRESQL_PASSWORD", &creds, ADMIN_PASSWORD_FILE))
        .env(secret_env("POSTGRESQL_ADMIN_PASSWORD", &creds, POSTGRES_PASSWORD_FILE))
        .mount(volume_mount("postgres-persistent-vol", "/var/lib/pgsql/data"))
        .build();

    Ok(Some(replication_controller(
        pod,
        ctx,
        DATABASE_COMPONENT,
        vec![container],
        vec![data_volume(cr, "postgres-persistent-vol", "postgres", true)],
    )))
}

fn rabbitmq(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let container = ContainerBuilder::new(BLACKDUCK_RABBITMQ_CONTAINER, pod)
        .port(5671)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mount(volume_mount("dir-rabbitmq-security", "/opt/blackduck/rabbitmq/security"))
        .build();

    Ok(Some(replication_controller(
        pod,
        ctx,
        "rabbitmq",
        vec![container],
        vec![data_volume(
            cr,
            "dir-rabbitmq-security",
            "rabbitmq",
            is_binary_analysis_enabled(cr),
        )],
    )))
}

fn registration(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let mut volumes = vec![
        data_volume(cr, "dir-registration", "registration", true),
        empty_dir_volume("dir-registration-security"),
    ];
    let mut mounts = vec![
        volume_mount("dir-registration", "/opt/blackduck/hub/hub-registration/config"),
        volume_mount("dir-registration-security", "/opt/blackduck/hub/hub-registration/security"),
    ];
    with_optional(&mut volumes, &mut mounts, [proxy_certificate(cr)]);

    let container = ContainerBuilder::new(BLACKDUCK_REGISTRATION_CONTAINER, pod)
        .port(8443)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mounts(mounts)
        .liveness(liveness(
            cr,
            &[
                HEALTHCHECK,
                "https://localhost:8443/registration/health-checks/liveness",
                "/opt/blackduck/hub/hub-registration/security/root.crt",
            ],
            240,
        ))
        .build();

    Ok(Some(replication_controller(pod, ctx, "registration", vec![container], volumes)))
}

fn scan(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let security = "/opt/blackduck/hub/hub-scan/security";
    let mut volumes = vec![empty_dir_volume("dir-scan"), db_passwords_volume(cr)];
    let mut mounts = vec![volume_mount("dir-scan", security)];
    mounts.extend(db_passwords_mounts());
    with_optional(&mut volumes, &mut mounts, [proxy_certificate(cr)]);

    let container = ContainerBuilder::new(BLACKDUCK_SCAN_CONTAINER, pod)
        .port(8443)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .env_from_config_map(&resource_name(cr, DATABASE_CONFIG))
        .env(hub_max_memory(pod, BLACKDUCK_SCAN_CONTAINER))
        .mounts(mounts)
        .liveness(liveness(
            cr,
            &[
                HEALTHCHECK,
                "https://127.0.0.1:8443/api/health-checks/liveness",
                &format!("{}/root.crt", security),
                &format!("{}/blackduck_system.crt", security),
                &format!("{}/blackduck_system.key", security),
            ],
            240,
        ))
        .build();

    Ok(Some(replication_controller(pod, ctx, "scan", vec![container], volumes)))
}

fn solr(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let container = ContainerBuilder::new(BLACKDUCK_SOLR_CONTAINER, pod)
        .port(8983)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mount(volume_mount("dir-solr", "/opt/blackduck/hub/solr/cores.data"))
        .liveness(liveness(
            cr,
            &[HEALTHCHECK, "http://localhost:8983/solr/project/admin/ping?wt=json"],
            240,
        ))
        .build();

    Ok(Some(replication_controller(
        pod,
        ctx,
        "solr",
        vec![container],
        vec![data_volume(cr, "dir-solr", "solr", true)],
    )))
}

fn uploadcache(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let data = "dir-uploadcache-data";
    let volumes = vec![
        empty_dir_volume("dir-uploadcache-security"),
        data_volume(cr, data, "uploadcache-data", is_binary_analysis_enabled(cr)),
        secret_items_volume(
            "dir-uploadcache-seal-key",
            &resource_name(cr, UPLOAD_CACHE),
            &[UPLOAD_CACHE_SEAL_KEY],
        ),
    ];

    let container = ContainerBuilder::new(BLACKDUCK_UPLOADCACHE_CONTAINER, pod)
        .port(9443)
        .port(9444)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mounts([
            volume_mount("dir-uploadcache-security", "/opt/blackduck/hub/hub-upload-cache/security"),
            sub_path_mount(data, "/opt/blackduck/hub/blackduck-upload-cache/uploads", "uploads"),
            sub_path_mount(data, "/opt/blackduck/hub/blackduck-upload-cache/keys", "keys"),
            secret_file_mount("dir-uploadcache-seal-key", UPLOAD_CACHE_SEAL_KEY),
        ])
        .liveness(liveness(
            cr,
            &[
                "curl",
                "--insecure",
                "-X",
                "GET",
                "--verbose",
                "http://localhost:8086/live?full=1",
            ],
            240,
        ))
        .build();

    Ok(Some(replication_controller(pod, ctx, "uploadcache", vec![container], volumes)))
}

fn webapp_logstash(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let security = "/opt/blackduck/hub/hub-webapp/security";
    let mut volumes = vec![
        data_volume(cr, "dir-webapp", "webapp", true),
        empty_dir_volume("dir-webapp-security"),
        data_volume(cr, "dir-logstash", "logstash", true),
        db_passwords_volume(cr),
    ];
    let mut mounts = vec![
        volume_mount("dir-webapp", "/opt/blackduck/hub/hub-webapp/ldap"),
        volume_mount("dir-webapp-security", security),
        volume_mount("dir-logstash", "/opt/blackduck/hub/logs"),
    ];
    mounts.extend(db_passwords_mounts());
    with_optional(&mut volumes, &mut mounts, [proxy_certificate(cr)]);

    let webapp = ContainerBuilder::new(BLACKDUCK_WEBAPP_CONTAINER, pod)
        .port(8443)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .env_from_config_map(&resource_name(cr, DATABASE_CONFIG))
        .env(hub_max_memory(pod, BLACKDUCK_WEBAPP_CONTAINER))
        .mounts(mounts)
        .liveness(liveness(
            cr,
            &[
                HEALTHCHECK,
                "https://127.0.0.1:8443/api/health-checks/liveness",
                &format!("{}/root.crt", security),
                &format!("{}/blackduck_system.crt", security),
                &format!("{}/blackduck_system.key", security),
            ],
            360,
        ))
        .build();

    let logstash = ContainerBuilder::new(BLACKDUCK_LOGSTASH_CONTAINER, pod)
        .port(5044)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mount(volume_mount("dir-logstash", "/var/lib/logstash/data"))
        .liveness(liveness(cr, &[HEALTHCHECK, "http://localhost:9600/"], 240))
        .build();

    Ok(Some(replication_controller(
        pod,
        ctx,
        "webapp-logstash",
        vec![webapp, logstash],
        volumes,
    )))
}

fn webserver(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let mut volumes = vec![empty_dir_volume("dir-webserver")];
    let mut mounts = vec![volume_mount("dir-webserver", "/opt/blackduck/hub/webserver/security")];

    if !cr.spec.certificate.is_empty() && !cr.spec.certificate_key.is_empty() {
        let volume = "blackduck-webserver-certificate";
        volumes.push(secret_items_volume(
            volume,
            &resource_name(cr, WEB_CERTIFICATE),
            &[WEB_CERTIFICATE_CERT_KEY, WEB_CERTIFICATE_KEY_KEY],
        ));
        mounts.push(secret_file_mount(volume, WEB_CERTIFICATE_CERT_KEY));
        mounts.push(secret_file_mount(volume, WEB_CERTIFICATE_KEY_KEY));
    }
    with_optional(&mut volumes, &mut mounts, [auth_custom_ca(cr)]);

    let container = ContainerBuilder::new(BLACKDUCK_WEBSERVER_CONTAINER, pod)
        .port(8443)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mounts(mounts)
        .liveness(liveness(
            cr,
            &[
                HEALTHCHECK,
                "https://localhost:8443/health-checks/liveness",
                "/opt/blackduck/hub/webserver/security/root.crt",
            ],
            240,
        ))
        .build();

    Ok(Some(replication_controller(pod, ctx, "webserver", vec![container], volumes)))
}

fn zookeeper(
    pod: &PodResource,
    ctx: &GenerationContext<'_, Blackduck>,
) -> Result<Option<ReplicationController>> {
    let cr = ctx.cr;
    let container = ContainerBuilder::new(BLACKDUCK_ZOOKEEPER_CONTAINER, pod)
        .port(2181)
        .env_from_config_map(&resource_name(cr, GLOBAL_CONFIG))
        .mounts([
            volume_mount("dir-zookeeper-data", "/opt/blackduck/zookeeper/data"),
            volume_mount("dir-zookeeper-datalog", "/opt/blackduck/zookeeper/datalog"),
        ])
        .liveness(liveness(
            cr,
            &["zkServer.sh", "status", "/opt/blackduck/zookeeper/conf/zoo.cfg"],
            240,
        ))
        .build();

    Ok(Some(replication_controller(
        pod,
        ctx,
        "zookeeper",
        vec![container],
        vec![
            data_volume(cr, "dir-zookeeper-data", "zookeeper-data", true),
            data_volume(cr, "dir-zookeeper-datalog", "zookeeper-datalog", true),
        ],
    )))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::blackduck;
    use super::*;
    use crate::crds::{PostgresExternalDbConfig, RegistryConfiguration};
    use crate::types::Container;
    use crate::OperatorConfig;
    use std::collections::HashMap;

    fn pod(name: ContainerName, max_mem: Option<i32>) -> PodResource {
        PodResource {
            namespace: "bd-ns".to_string(),
            replicas: 1,
            containers: HashMap::from([(
                name,
                Container {
                    image: format!("blackducksoftware/{}:1.0", name),
                    max_mem,
                    ..Default::default()
                },
            )]),
        }
    }

    fn pod_spec(rc: &ReplicationController) -> &PodSpec {
        rc.spec
            .as_ref()
            .and_then(|s| s.template.as_ref())
            .and_then(|t| t.spec.as_ref())
            .unwrap()
    }

    fn env_value(container: &PodContainer, name: &str) -> Option<String> {
        container
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.clone())
    }

    #[test]
    fn test_postgres_rc() {
        let config = OperatorConfig::default();
        let cr = blackduck("hub", "2019.6.0");
        let ctx = GenerationContext::new(&config, None, &cr);

        let rc = postgres(&pod(BLACKDUCK_POSTGRES_CONTAINER, None), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(rc.metadata.name.as_deref(), Some("hub-blackduck-postgres"));
        assert_eq!(rc.metadata.namespace.as_deref(), Some("bd-ns"));
        assert_eq!(rc.metadata.labels.as_ref().unwrap()["component"], "postgres");

        let spec = pod_spec(&rc);
        let container = &spec.containers[0];
        assert_eq!(env_value(container, "POSTGRESQL_DATABASE").as_deref(), Some("blackduck"));
        let password = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .find(|e| e.name == "POSTGRESQL_PASSWORD")
            .unwrap();
        let selector = password
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.name.as_deref(), Some("hub-blackduck-db-creds"));
        assert_eq!(selector.key, ADMIN_PASSWORD_FILE);

        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert!(volume.empty_dir.is_some());
        assert_eq!(spec.security_context.as_ref().unwrap().fs_group, Some(0));
    }

    #[test]
    fn test_postgres_skipped_for_external_database() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.external_postgres = Some(PostgresExternalDbConfig::default());
        let ctx = GenerationContext::new(&config, None, &cr);

        assert!(postgres(&pod(BLACKDUCK_POSTGRES_CONTAINER, None), &ctx)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_persistent_storage_uses_claims() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;
        let ctx = GenerationContext::new(&config, None, &cr);

        let rc = zookeeper(&pod(BLACKDUCK_ZOOKEEPER_CONTAINER, None), &ctx)
            .unwrap()
            .unwrap();
        let claims: Vec<String> = pod_spec(&rc)
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .map(|c| c.claim_name.clone())
            .collect();
        assert_eq!(
            claims,
            vec!["hub-blackduck-zookeeper-data", "hub-blackduck-zookeeper-datalog"]
        );
    }

    #[test]
    fn test_binaryscanner_follows_environs() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        let pod = pod(BLACKDUCK_BINARYSCANNER_CONTAINER, None);

        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(binaryscanner(&pod, &ctx).unwrap().is_none());

        cr.spec.environs = vec!["USE_BINARY_UPLOADS:1".to_string()];
        let ctx = GenerationContext::new(&config, None, &cr);
        assert!(binaryscanner(&pod, &ctx).unwrap().is_some());
    }

    #[test]
    fn test_liveness_probes_optional() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        let pod = pod(BLACKDUCK_CFSSL_CONTAINER, None);

        let ctx = GenerationContext::new(&config, None, &cr);
        let rc = cfssl(&pod, &ctx).unwrap().unwrap();
        assert!(pod_spec(&rc).containers[0].liveness_probe.is_none());

        cr.spec.liveness_probes = true;
        let ctx = GenerationContext::new(&config, None, &cr);
        let rc = cfssl(&pod, &ctx).unwrap().unwrap();
        let probe = pod_spec(&rc).containers[0].liveness_probe.clone().unwrap();
        let command = probe.exec.unwrap().command.unwrap();
        assert_eq!(command[1], "http://localhost:8888/api/v1/cfssl/scaninfo");
    }

    #[test]
    fn test_webapp_memory_and_containers() {
        let config = OperatorConfig::default();
        let cr = blackduck("hub", "2019.6.0");
        let ctx = GenerationContext::new(&config, None, &cr);

        let mut pod = pod(BLACKDUCK_WEBAPP_CONTAINER, Some(3072));
        pod.containers.insert(
            BLACKDUCK_LOGSTASH_CONTAINER,
            Container {
                image: "blackducksoftware/blackduck-logstash:1.0.4".to_string(),
                ..Default::default()
            },
        );
        let rc = webapp_logstash(&pod, &ctx).unwrap().unwrap();
        let spec = pod_spec(&rc);
        assert_eq!(spec.containers.len(), 2);
        assert_eq!(env_value(&spec.containers[0], "HUB_MAX_MEMORY").as_deref(), Some("2560m"));
        assert_eq!(
            rc.spec.as_ref().unwrap().selector.as_ref().unwrap()["component"],
            "webapp-logstash"
        );
    }

    #[test]
    fn test_openshift_and_pull_secrets() {
        let config = OperatorConfig {
            is_openshift: true,
            ..Default::default()
        };
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.registry_configuration = Some(RegistryConfiguration {
            pull_secrets: vec!["regcred".to_string()],
            ..Default::default()
        });
        let ctx = GenerationContext::new(&config, None, &cr);

        let rc = documentation(&pod(BLACKDUCK_DOCUMENTATION_CONTAINER, None), &ctx)
            .unwrap()
            .unwrap();
        let spec = pod_spec(&rc);
        assert!(spec.security_context.is_none());
        assert_eq!(
            spec.image_pull_secrets.as_ref().unwrap()[0].name.as_deref(),
            Some("regcred")
        );
    }

    #[test]
    fn test_webserver_certificate_mounted_when_provided() {
        let config = OperatorConfig::default();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.certificate = "CERT".to_string();
        cr.spec.certificate_key = "KEY".to_string();
        let ctx = GenerationContext::new(&config, None, &cr);

        let rc = webserver(&pod(BLACKDUCK_WEBSERVER_CONTAINER, None), &ctx)
            .unwrap()
            .unwrap();
        let mounts = pod_spec(&rc).containers[0].volume_mounts.clone().unwrap();
        assert!(mounts
            .iter()
            .any(|m| m.mount_path == "/tmp/secrets/WEBSERVER_CUSTOM_CERT_FILE"));
    }
}
