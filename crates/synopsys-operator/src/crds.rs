//! # Custom Resource Definitions
//!
//! Kubernetes CRDs for the Synopsys operator

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation that marks Black Duck instances created before 2019.6.0
pub const CREATED_BY_ANNOTATION: &str = "synopsys.com/created.by";
pub const PRE_2019_6_0: &str = "pre-2019.6.0";

/// Blackduck CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "synopsys.com",
    version = "v1",
    kind = "Blackduck",
    plural = "blackducks",
    shortname = "bd",
    derive = "Default",
    derive = "PartialEq",
    namespaced
)]
#[kube(status = "BlackduckStatus")]
#[serde(rename_all = "camelCase", default)]
pub struct BlackduckSpec {
    /// Namespace the instance is deployed into
    pub namespace: String,

    /// Size tier (small, medium, large, x-large)
    pub size: String,

    /// Black Duck version, empty selects the latest supported one
    pub version: String,

    /// How the webserver is exposed: NODEPORT, LOADBALANCER or NONE
    pub expose_service: String,

    /// Instance to clone the database from
    pub db_prototype: String,

    /// Use an external postgres instead of the bundled one
    pub external_postgres: Option<PostgresExternalDbConfig>,

    /// Storage class used by claims that don't set their own
    pub pvc_storage_class: String,

    pub liveness_probes: bool,

    pub scan_type: String,

    pub persistent_storage: bool,

    /// Claim overrides; names must match a default claim
    pub pvc: Vec<Pvc>,

    pub certificate_name: String,

    /// PEM web server certificate
    pub certificate: String,

    /// PEM web server key
    pub certificate_key: String,

    pub proxy_certificate: String,

    pub auth_custom_ca: String,

    #[serde(rename = "type")]
    pub type_: String,

    /// Empty, `STOP` or `DbMigrate`
    pub desired_state: String,

    /// `KEY:VALUE` entries added to the global config map
    pub environs: Vec<String>,

    /// Full image references that replace the default image with the same name
    pub image_registries: Vec<String>,

    pub license_key: String,

    pub registry_configuration: Option<RegistryConfiguration>,

    /// Base64 encoded postgres admin password
    pub admin_password: String,

    /// Base64 encoded postgres user password
    pub user_password: String,

    /// Base64 encoded postgres superuser password
    pub postgres_password: String,

    /// Base64 encoded 32 byte key sealing the upload cache master key.
    /// Empty uses the operator's key.
    pub seal_key: String,
}

/// External postgres connection
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PostgresExternalDbConfig {
    pub postgres_host: String,
    pub postgres_port: i32,
    pub postgres_admin: String,
    pub postgres_user: String,
    pub postgres_ssl: bool,
    /// Base64 encoded
    pub postgres_admin_password: String,
    /// Base64 encoded
    pub postgres_user_password: String,
}

/// Persistent volume claim override
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Pvc {
    pub name: String,
    pub size: String,
    pub storage_class: String,
    pub volume_name: String,
}

/// Private registry the default images are mirrored to
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfiguration {
    pub registry: String,
    pub namespace: String,
    pub pull_secrets: Vec<String>,
}

/// Blackduck status
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BlackduckStatus {
    pub state: String,
    pub ip: String,
    pub fqdn: String,
    pub pvc_volume_name: BTreeMap<String, String>,
    pub error_message: String,
    pub last_update: Option<String>,
}

/// OpsSight CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "synopsys.com",
    version = "v1",
    kind = "OpsSight",
    plural = "opssights",
    shortname = "ops",
    derive = "Default",
    derive = "PartialEq",
    namespaced
)]
#[kube(status = "OpsSightStatus")]
#[serde(rename_all = "camelCase", default)]
pub struct OpsSightSpec {
    pub namespace: String,

    /// OpsSight version, empty selects the latest supported one
    pub version: String,

    /// Size tier; only the scanner replica count depends on it
    pub size: String,

    pub perceptor: Perceptor,
    pub scanner_pod: ScannerPod,
    pub perceiver: Perceiver,

    pub config_map_name: String,

    pub secret_name: String,

    /// CPU request of the processing containers (e.g. "300m")
    pub default_cpu: String,
    pub default_mem: String,
    pub scanner_cpu: String,
    pub scanner_mem: String,

    pub log_level: String,

    pub enable_metrics: bool,
    pub prometheus: Prometheus,

    pub enable_skyfire: bool,
    pub skyfire: Skyfire,

    pub blackduck: BlackduckHosts,

    pub desired_state: String,

    pub image_registries: Vec<String>,
    pub registry_configuration: Option<RegistryConfiguration>,
}

impl Default for OpsSightSpec {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            version: String::new(),
            size: "small".to_string(),
            perceptor: Perceptor::default(),
            scanner_pod: ScannerPod::default(),
            perceiver: Perceiver::default(),
            config_map_name: "opssight".to_string(),
            secret_name: "blackduck".to_string(),
            default_cpu: "300m".to_string(),
            default_mem: "1300Mi".to_string(),
            scanner_cpu: "300m".to_string(),
            scanner_mem: "1300Mi".to_string(),
            log_level: "info".to_string(),
            enable_metrics: true,
            prometheus: Prometheus::default(),
            enable_skyfire: false,
            skyfire: Skyfire::default(),
            blackduck: BlackduckHosts::default(),
            desired_state: String::new(),
            image_registries: Vec::new(),
            registry_configuration: None,
        }
    }
}

/// Core (perceptor) settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Perceptor {
    pub name: String,
    pub port: i32,
    /// NODEPORT or LOADBALANCER exposes the core outside the cluster
    pub expose: String,
    pub check_for_stalled_scans_pause_hours: i32,
    pub stalled_scan_client_timeout_hours: i32,
    pub model_metrics_pause_seconds: i32,
    pub unknown_image_pause_milliseconds: i32,
    pub client_timeout_milliseconds: i32,
}

impl Default for Perceptor {
    fn default() -> Self {
        Self {
            name: "opssight-core".to_string(),
            port: 3001,
            expose: String::new(),
            check_for_stalled_scans_pause_hours: 999999,
            stalled_scan_client_timeout_hours: 999999,
            model_metrics_pause_seconds: 15,
            unknown_image_pause_milliseconds: 15000,
            client_timeout_milliseconds: 100000,
        }
    }
}

/// Scanner pod made of the image getter and the scanner
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerPod {
    pub name: String,
    pub scanner: Scanner,
    pub image_facade: ImageFacade,
    /// Overrides the replica count of the size table when non-zero
    #[serde(rename = "scannerReplicaCount")]
    pub replica_count: i32,
    pub image_directory: String,
}

impl Default for ScannerPod {
    fn default() -> Self {
        Self {
            name: "opssight-scanner".to_string(),
            scanner: Scanner::default(),
            image_facade: ImageFacade::default(),
            replica_count: 0,
            image_directory: "/var/images".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Scanner {
    pub name: String,
    pub port: i32,
    pub client_timeout_seconds: i32,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            name: "opssight-scanner".to_string(),
            port: 3003,
            client_timeout_seconds: 600,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageFacade {
    pub name: String,
    pub port: i32,
    pub internal_registries: Vec<RegistryAuth>,
    pub image_puller_type: String,
    pub service_account: String,
}

impl Default for ImageFacade {
    fn default() -> Self {
        Self {
            name: "opssight-image-getter".to_string(),
            port: 3004,
            internal_registries: Vec::new(),
            image_puller_type: "skopeo".to_string(),
            service_account: "opssight-scanner".to_string(),
        }
    }
}

/// Credentials of a secured registry the image getter pulls from
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(default)]
pub struct RegistryAuth {
    #[serde(rename = "Url")]
    pub url: String,
    pub user: String,
    pub password: String,
}

/// Pod and image processors
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Perceiver {
    pub enable_image_perceiver: bool,
    pub enable_pod_perceiver: bool,
    pub image_perceiver_name: String,
    pub pod_perceiver_name: String,
    pub namespace_filter: String,
    pub annotation_interval_seconds: i32,
    pub dump_interval_minutes: i32,
    pub service_account: String,
    pub port: i32,
}

impl Default for Perceiver {
    fn default() -> Self {
        Self {
            enable_image_perceiver: false,
            enable_pod_perceiver: true,
            image_perceiver_name: "opssight-image-processor".to_string(),
            pod_perceiver_name: "opssight-pod-processor".to_string(),
            namespace_filter: String::new(),
            annotation_interval_seconds: 30,
            dump_interval_minutes: 30,
            service_account: "opssight-processor".to_string(),
            port: 3002,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Prometheus {
    pub name: String,
    pub port: i32,
    pub expose: String,
}

impl Default for Prometheus {
    fn default() -> Self {
        Self {
            name: "prometheus".to_string(),
            port: 9090,
            expose: String::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Skyfire {
    pub name: String,
    pub port: i32,
    pub prometheus_port: i32,
    pub service_account: String,
    pub hub_client_timeout_seconds: i32,
    pub hub_dump_pause_seconds: i32,
    pub kube_dump_interval_seconds: i32,
    pub perceptor_dump_interval_seconds: i32,
}

impl Default for Skyfire {
    fn default() -> Self {
        Self {
            name: "skyfire".to_string(),
            port: 3005,
            prometheus_port: 3006,
            service_account: "skyfire".to_string(),
            hub_client_timeout_seconds: 120,
            hub_dump_pause_seconds: 240,
            kube_dump_interval_seconds: 60,
            perceptor_dump_interval_seconds: 60,
        }
    }
}

/// Black Duck instances OpsSight reports to
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BlackduckHosts {
    pub external_hosts: Vec<Host>,
    pub connections_environment_variable_name: String,
    pub tls_verification: bool,
}

impl Default for BlackduckHosts {
    fn default() -> Self {
        Self {
            external_hosts: Vec::new(),
            connections_environment_variable_name: "blackduck.json".to_string(),
            tls_verification: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Host {
    pub scheme: String,
    pub domain: String,
    pub port: i32,
    pub user: String,
    pub password: String,
    pub concurrent_scan_limit: i32,
}

/// OpsSight status
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OpsSightStatus {
    pub state: String,
    pub error_message: String,
    pub last_update: Option<String>,
}
