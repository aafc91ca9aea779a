//! # Component Types
//!
//! Identifiers, sizing values and version manifests shared by the registry,
//! the orchestrator and every product generator.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identifier of a registered generator (e.g. `blackDuckPostgresRCV1`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentName(&'static str);

impl ComponentName {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Name of a container inside a pod template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContainerName(&'static str);

impl ContainerName {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Optional CPU (cores) and memory (MiB) bounds for one container.
/// `None` leaves the matching request or limit unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContainerSize {
    pub min_cpu: Option<i32>,
    pub max_cpu: Option<i32>,
    pub min_mem: Option<i32>,
    pub max_mem: Option<i32>,
}

impl ContainerSize {
    /// Same value for request and limit
    pub fn fixed(cpu: Option<i32>, mem: Option<i32>) -> Self {
        Self {
            min_cpu: cpu,
            max_cpu: cpu,
            min_mem: mem,
            max_mem: mem,
        }
    }
}

/// Replica count and container bounds for one sub-component in one tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Size {
    pub replica: i32,
    pub containers: HashMap<ContainerName, ContainerSize>,
}

impl Size {
    pub fn new(replica: i32) -> Self {
        Self {
            replica,
            containers: HashMap::new(),
        }
    }

    pub fn with_container(mut self, name: ContainerName, size: ContainerSize) -> Self {
        self.containers.insert(name, size);
        self
    }
}

/// Resolved container settings handed to a pod generator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub image: String,
    pub min_cpu: Option<i32>,
    pub max_cpu: Option<i32>,
    pub min_mem: Option<i32>,
    pub max_mem: Option<i32>,
}

impl Container {
    pub fn with_size(image: String, size: Option<&ContainerSize>) -> Self {
        let size = size.copied().unwrap_or_default();
        Self {
            image,
            min_cpu: size.min_cpu,
            max_cpu: size.max_cpu,
            min_mem: size.min_mem,
            max_mem: size.max_mem,
        }
    }
}

/// Pod-level input of replication controller and deployment generators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodResource {
    pub namespace: String,
    pub replicas: i32,
    pub containers: HashMap<ContainerName, Container>,
}

impl PodResource {
    pub fn container(&self, name: ContainerName) -> Option<&Container> {
        self.containers.get(&name)
    }

    /// Image of a container, empty when the version does not declare it
    pub fn image(&self, name: ContainerName) -> String {
        self.containers
            .get(&name)
            .map(|c| c.image.clone())
            .unwrap_or_default()
    }
}

/// Generator identifier plus the default image of every container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPodResource {
    pub identifier: ComponentName,
    pub containers: BTreeMap<ContainerName, String>,
}

impl PublicPodResource {
    pub fn new<I, S>(identifier: ComponentName, containers: I) -> Self
    where
        I: IntoIterator<Item = (ContainerName, S)>,
        S: Into<String>,
    {
        Self {
            identifier,
            containers: containers.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

/// Manifest naming the registered components that make up one product version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicVersion {
    pub size: ComponentName,
    pub rcs: BTreeMap<String, PublicPodResource>,
    pub deployments: BTreeMap<String, PublicPodResource>,
    pub services: Vec<ComponentName>,
    pub config_maps: Vec<ComponentName>,
    pub secrets: Vec<ComponentName>,
    pub pvcs: Vec<ComponentName>,
    pub service_accounts: Vec<ComponentName>,
    pub cluster_roles: Vec<ComponentName>,
    pub cluster_role_bindings: Vec<ComponentName>,
}

impl PublicVersion {
    pub fn new(size: ComponentName) -> Self {
        Self {
            size,
            rcs: BTreeMap::new(),
            deployments: BTreeMap::new(),
            services: Vec::new(),
            config_maps: Vec::new(),
            secrets: Vec::new(),
            pvcs: Vec::new(),
            service_accounts: Vec::new(),
            cluster_roles: Vec::new(),
            cluster_role_bindings: Vec::new(),
        }
    }

    /// Every component identifier the manifest refers to, size table included
    pub fn component_names(&self) -> Vec<ComponentName> {
        let mut names = vec![self.size];
        names.extend(self.rcs.values().map(|rc| rc.identifier));
        names.extend(self.deployments.values().map(|d| d.identifier));
        for list in [
            &self.services,
            &self.config_maps,
            &self.secrets,
            &self.pvcs,
            &self.service_accounts,
            &self.cluster_roles,
            &self.cluster_role_bindings,
        ] {
            names.extend(list.iter().copied());
        }
        names
    }
}

/// Registry identifiers and container names
pub mod names {
    use super::{ComponentName, ContainerName};

    macro_rules! component_names {
        ($($ident:ident = $value:literal;)*) => {
            $(pub const $ident: ComponentName = ComponentName::new($value);)*
        };
    }

    macro_rules! container_names {
        ($($ident:ident = $value:literal;)*) => {
            $(pub const $ident: ContainerName = ContainerName::new($value);)*
        };
    }

    // Black Duck
    component_names! {
        BLACKDUCK_SIZE_V1 = "blackDuckSizeV1";

        BLACKDUCK_AUTHENTICATION_RC_V1 = "blackDuckAuthenticationRCV1";
        BLACKDUCK_BINARYSCANNER_RC_V1 = "blackDuckBinaryscannerRCV1";
        BLACKDUCK_CFSSL_RC_V1 = "blackDuckCfsslRCV1";
        BLACKDUCK_DOCUMENTATION_RC_V1 = "blackDuckDocumentationRCV1";
        BLACKDUCK_JOBRUNNER_RC_V1 = "blackDuckJobRunnerRCV1";
        BLACKDUCK_POSTGRES_RC_V1 = "blackDuckPostgresRCV1";
        BLACKDUCK_RABBITMQ_RC_V1 = "blackDuckRabbitMQRCV1";
        BLACKDUCK_REGISTRATION_RC_V1 = "blackDuckRegistrationRCV1";
        BLACKDUCK_SCAN_RC_V1 = "blackDuckScanRCV1";
        BLACKDUCK_SOLR_RC_V1 = "blackDuckSolrRCV1";
        BLACKDUCK_UPLOADCACHE_RC_V1 = "blackDuckUploadCacheRCV1";
        BLACKDUCK_WEBAPP_LOGSTASH_RC_V1 = "blackDuckWebappLogstashRCV1";
        BLACKDUCK_WEBSERVER_RC_V1 = "blackDuckWebserverRCV1";
        BLACKDUCK_ZOOKEEPER_RC_V1 = "blackDuckZookeeperRCV1";

        BLACKDUCK_AUTHENTICATION_SERVICE_V1 = "blackDuckAuthenticationServiceV1";
        BLACKDUCK_CFSSL_SERVICE_V1 = "blackDuckCfsslServiceV1";
        BLACKDUCK_DOCUMENTATION_SERVICE_V1 = "blackDuckDocumentationServiceV1";
        BLACKDUCK_POSTGRES_SERVICE_V1 = "blackDuckPostgresServiceV1";
        BLACKDUCK_RABBITMQ_SERVICE_V1 = "blackDuckRabbitMQServiceV1";
        BLACKDUCK_REGISTRATION_SERVICE_V1 = "blackDuckRegistrationServiceV1";
        BLACKDUCK_SCAN_SERVICE_V1 = "blackDuckScanServiceV1";
        BLACKDUCK_SOLR_SERVICE_V1 = "blackDuckSolrServiceV1";
        BLACKDUCK_UPLOADCACHE_SERVICE_V1 = "blackDuckUploadCacheServiceV1";
        BLACKDUCK_WEBAPP_SERVICE_V1 = "blackDuckWebappServiceV1";
        BLACKDUCK_LOGSTASH_SERVICE_V1 = "blackDuckLogstashServiceV1";
        BLACKDUCK_WEBSERVER_SERVICE_V1 = "blackDuckWebserverServiceV1";
        BLACKDUCK_ZOOKEEPER_SERVICE_V1 = "blackDuckZookeeperServiceV1";
        BLACKDUCK_EXPOSE_SERVICE_V1 = "blackDuckExposeServiceV1";

        BLACKDUCK_GLOBAL_CONFIGMAP_V1 = "blackDuckGlobalConfigmapV1";
        BLACKDUCK_DATABASE_CONFIGMAP_V1 = "blackDuckDatabaseConfigmapV1";

        BLACKDUCK_WEB_CERTIFICATE_SECRET_V1 = "blackDuckWebCertificateSecretV1";
        BLACKDUCK_AUTH_CERTIFICATE_SECRET_V1 = "blackDuckAuthCertificateSecretV1";
        BLACKDUCK_PROXY_CERTIFICATE_SECRET_V1 = "blackDuckProxyCertificateSecretV1";
        BLACKDUCK_UPLOADCACHE_SECRET_V1 = "blackDuckUploadCacheSecretV1";
        BLACKDUCK_POSTGRES_SECRET_V1 = "blackDuckPostgresSecretV1";

        BLACKDUCK_PVC_V1 = "blackDuckPVCV1";
        BLACKDUCK_PVC_V2 = "blackDuckPVCV2";
    }

    container_names! {
        BLACKDUCK_AUTHENTICATION_CONTAINER = "authentication";
        BLACKDUCK_BINARYSCANNER_CONTAINER = "binaryscanner";
        BLACKDUCK_CFSSL_CONTAINER = "cfssl";
        BLACKDUCK_DOCUMENTATION_CONTAINER = "documentation";
        BLACKDUCK_JOBRUNNER_CONTAINER = "jobrunner";
        BLACKDUCK_RABBITMQ_CONTAINER = "rabbitmq";
        BLACKDUCK_REGISTRATION_CONTAINER = "registration";
        BLACKDUCK_SCAN_CONTAINER = "scan";
        BLACKDUCK_SOLR_CONTAINER = "solr";
        BLACKDUCK_UPLOADCACHE_CONTAINER = "uploadcache";
        BLACKDUCK_WEBAPP_CONTAINER = "webapp";
        BLACKDUCK_LOGSTASH_CONTAINER = "logstash";
        BLACKDUCK_WEBSERVER_CONTAINER = "webserver";
        BLACKDUCK_ZOOKEEPER_CONTAINER = "zookeeper";
        BLACKDUCK_POSTGRES_CONTAINER = "postgres";
    }

    // OpsSight
    component_names! {
        OPSSIGHT_SIZE_V1 = "opsSightSizeV1";

        OPSSIGHT_CORE_RC_V1 = "opsSightCoreRCV1";
        OPSSIGHT_POD_PROCESSOR_RC_V1 = "opsSightPodProcessorRCV1";
        OPSSIGHT_IMAGE_PROCESSOR_RC_V1 = "opsSightImageProcessorRCV1";
        OPSSIGHT_SCANNER_RC_V1 = "opsSightScannerRCV1";
        SKYFIRE_RC_V1 = "skyfireRCV1";

        OPSSIGHT_METRICS_DEPLOYMENT_V1 = "opsSightMetricsDeploymentV1";

        OPSSIGHT_CORE_SERVICE_V1 = "opsSightCoreServiceV1";
        OPSSIGHT_EXPOSE_CORE_SERVICE_V1 = "opsSightExposeCoreServiceV1";
        OPSSIGHT_POD_PROCESSOR_SERVICE_V1 = "opsSightPodProcessorServiceV1";
        OPSSIGHT_IMAGE_PROCESSOR_SERVICE_V1 = "opsSightImageProcessorServiceV1";
        OPSSIGHT_IMAGE_GETTER_SERVICE_V1 = "opsSightImageGetterServiceV1";
        OPSSIGHT_SCANNER_SERVICE_V1 = "opsSightScannerServiceV1";
        OPSSIGHT_METRICS_SERVICE_V1 = "opsSightMetricsServiceV1";
        OPSSIGHT_EXPOSE_METRICS_SERVICE_V1 = "opsSightExposeMetricsServiceV1";
        SKYFIRE_SERVICE_V1 = "skyfireServiceV1";

        OPSSIGHT_CONFIGMAP_V1 = "opsSightConfigMapV1";
        OPSSIGHT_METRICS_CONFIGMAP_V1 = "opsSightMetricsConfigMapV1";

        OPSSIGHT_SECRET_V1 = "opsSightSecretV1";

        OPSSIGHT_POD_PROCESSOR_CLUSTER_ROLE_V1 = "opsSightPodProcessorClusterRoleV1";
        OPSSIGHT_IMAGE_PROCESSOR_CLUSTER_ROLE_V1 = "opsSightImageProcessorClusterRoleV1";
        SKYFIRE_CLUSTER_ROLE_V1 = "skyfireClusterRoleV1";

        OPSSIGHT_POD_PROCESSOR_CLUSTER_ROLE_BINDING_V1 = "opsSightPodProcessorClusterRoleBindingV1";
        OPSSIGHT_IMAGE_PROCESSOR_CLUSTER_ROLE_BINDING_V1 = "opsSightImageProcessorClusterRoleBindingV1";
        OPSSIGHT_SCANNER_CLUSTER_ROLE_BINDING_V1 = "opsSightScannerClusterRoleBindingV1";
        SKYFIRE_CLUSTER_ROLE_BINDING_V1 = "skyfireClusterRoleBindingV1";

        OPSSIGHT_POD_PROCESSOR_SERVICE_ACCOUNT_V1 = "opsSightPodProcessorServiceAccountV1";
        OPSSIGHT_IMAGE_PROCESSOR_SERVICE_ACCOUNT_V1 = "opsSightImageProcessorServiceAccountV1";
        OPSSIGHT_SCANNER_SERVICE_ACCOUNT_V1 = "opsSightScannerServiceAccountV1";
        SKYFIRE_SERVICE_ACCOUNT_V1 = "skyfireServiceAccountV1";
    }

    container_names! {
        OPSSIGHT_CORE_CONTAINER = "opssight-core";
        OPSSIGHT_POD_PROCESSOR_CONTAINER = "opssight-pod-processor";
        OPSSIGHT_IMAGE_PROCESSOR_CONTAINER = "opssight-image-processor";
        OPSSIGHT_IMAGE_GETTER_CONTAINER = "opssight-image-getter";
        OPSSIGHT_SCANNER_CONTAINER = "opssight-scanner";
        OPSSIGHT_METRICS_CONTAINER = "prometheus";
        SKYFIRE_CONTAINER = "skyfire";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name_display() {
        assert_eq!(names::BLACKDUCK_POSTGRES_RC_V1.to_string(), "blackDuckPostgresRCV1");
        assert_eq!(names::BLACKDUCK_WEBAPP_CONTAINER.as_str(), "webapp");
    }

    #[test]
    fn test_container_with_size() {
        let size = ContainerSize::fixed(Some(2), Some(8192));
        let container = Container::with_size("img:1".to_string(), Some(&size));
        assert_eq!(container.min_cpu, Some(2));
        assert_eq!(container.max_mem, Some(8192));

        let bare = Container::with_size("img:1".to_string(), None);
        assert_eq!(bare.min_cpu, None);
        assert_eq!(bare.max_mem, None);
    }

    #[test]
    fn test_public_version_component_names() {
        let mut version = PublicVersion::new(names::BLACKDUCK_SIZE_V1);
        version.rcs.insert(
            "postgres".to_string(),
            PublicPodResource::new(
                names::BLACKDUCK_POSTGRES_RC_V1,
                [(names::BLACKDUCK_POSTGRES_CONTAINER, "postgres:9.6")],
            ),
        );
        version.secrets.push(names::BLACKDUCK_POSTGRES_SECRET_V1);

        let names_used = version.component_names();
        assert_eq!(names_used.len(), 3);
        assert!(names_used.contains(&names::BLACKDUCK_SIZE_V1));
        assert!(names_used.contains(&names::BLACKDUCK_POSTGRES_SECRET_V1));
    }
}
